//! Destinations for encoded exports.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use matte_common::error::{MatteError, MatteResult};

/// Receives finished export files.
pub trait ExportSink: Send + Sync {
    /// Store `bytes` under `file_name`, returning where they landed.
    ///
    /// A failed delivery must not leave a file under the final name.
    fn deliver(&self, file_name: &str, bytes: &[u8]) -> MatteResult<PathBuf>;

    /// Remove a previously delivered file (used to undo half of a combined
    /// export).
    fn retract(&self, path: &Path) -> MatteResult<()>;

    /// Sink name for logs.
    fn name(&self) -> &str;
}

/// Writes exports into a directory.
///
/// Bytes go to a hidden `.part` file first and are renamed into place, so
/// readers never see a half-written image under the final name. An existing
/// file is never replaced: a taken name gets a `-1`, `-2`, ... suffix.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    seq: Arc<AtomicU64>,
}

/// Suffixes tried before giving up on a name.
const MAX_NAME_ATTEMPTS: u32 = 1000;

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Atomically reserve the first free name derived from `file_name`.
    fn claim(&self, file_name: &str) -> MatteResult<PathBuf> {
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = self.dir.join(numbered_name(file_name, attempt));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(path),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(MatteError::export(format!(
                        "Failed to create {}: {e}",
                        path.display()
                    )))
                }
            }
        }
        Err(MatteError::export(format!(
            "No free file name for {file_name} in {}",
            self.dir.display()
        )))
    }
}

/// `composite_5.png` -> `composite_5-2.png` for `n = 2`; `n = 0` keeps it.
fn numbered_name(file_name: &str, n: u32) -> String {
    if n == 0 {
        return file_name.to_string();
    }
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{n}.{ext}"),
        _ => format!("{file_name}-{n}"),
    }
}

impl ExportSink for DirectorySink {
    fn deliver(&self, file_name: &str, bytes: &[u8]) -> MatteResult<PathBuf> {
        if file_name.is_empty() || file_name.contains(['/', '\\']) {
            return Err(MatteError::export(format!(
                "Invalid export file name: {file_name:?}"
            )));
        }

        std::fs::create_dir_all(&self.dir).map_err(|e| {
            MatteError::export(format!(
                "Failed to create export directory {}: {e}",
                self.dir.display()
            ))
        })?;

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let part_path = self
            .dir
            .join(format!(".{file_name}.{}-{seq}.part", std::process::id()));

        if let Err(e) = std::fs::write(&part_path, bytes) {
            let _ = std::fs::remove_file(&part_path);
            return Err(MatteError::export(format!(
                "Failed to write {}: {e}",
                part_path.display()
            )));
        }

        let final_path = match self.claim(file_name) {
            Ok(path) => path,
            Err(e) => {
                let _ = std::fs::remove_file(&part_path);
                return Err(e);
            }
        };

        // Replaces only the empty placeholder claimed above.
        if let Err(e) = std::fs::rename(&part_path, &final_path) {
            let _ = std::fs::remove_file(&part_path);
            let _ = std::fs::remove_file(&final_path);
            return Err(MatteError::export(format!(
                "Failed to move export into place at {}: {e}",
                final_path.display()
            )));
        }

        tracing::debug!(path = %final_path.display(), bytes = bytes.len(), "delivered export");
        Ok(final_path)
    }

    fn retract(&self, path: &Path) -> MatteResult<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MatteError::export(format!(
                "Failed to remove {}: {e}",
                path.display()
            ))),
        }
    }

    fn name(&self) -> &str {
        "directory"
    }
}
