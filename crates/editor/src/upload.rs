//! Image uploads: validation, decoding, and display metadata.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use image::ImageFormat;
use serde::Serialize;

use matte_common::error::{MatteError, MatteResult};
use matte_model::geometry::Size;
use matte_render_engine::Raster;

const INVALID_TYPE: &str = "Please upload a valid image file";

/// Which layer an image is loaded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Background,
    Foreground,
}

impl Slot {
    /// Capitalized name used in notices.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Background => "Background",
            Self::Foreground => "Foreground",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Background => "background",
            Self::Foreground => "foreground",
        })
    }
}

impl FromStr for Slot {
    type Err = MatteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bg" | "background" => Ok(Self::Background),
            "fg" | "foreground" => Ok(Self::Foreground),
            other => Err(MatteError::invalid_input(format!(
                "Unknown image slot: {other}. Use: bg, fg"
            ))),
        }
    }
}

/// Raw bytes handed over by whoever picked the file.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    /// Declared media type, e.g. `image/png`. Sniffed from the bytes when
    /// absent.
    pub media_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: None,
            bytes,
        }
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Read a file from disk. The media type comes from a known image
    /// extension; anything else is left to sniffing.
    pub fn from_path(path: &Path) -> MatteResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MatteError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => MatteError::Io(e),
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let media_type = ImageFormat::from_path(path)
            .ok()
            .map(|format| format.to_mime_type().to_string());

        Ok(Self {
            name,
            media_type,
            bytes,
        })
    }

    pub fn byte_len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Check size and media type without decoding.
    ///
    /// Returns the label shown next to the image (`PNG`, `JPEG`, ...).
    pub fn validate(&self, max_bytes: u64) -> MatteResult<String> {
        if self.byte_len() > max_bytes {
            return Err(MatteError::invalid_input(format!(
                "File size must be less than {}",
                format_limit(max_bytes)
            )));
        }

        match &self.media_type {
            Some(declared) => {
                let declared = declared.trim().to_ascii_lowercase();
                match declared.strip_prefix("image/") {
                    Some(subtype) if !subtype.is_empty() => Ok(subtype.to_ascii_uppercase()),
                    _ => Err(MatteError::invalid_input(INVALID_TYPE)),
                }
            }
            None => {
                let format = image::guess_format(&self.bytes)
                    .map_err(|_| MatteError::invalid_input(INVALID_TYPE))?;
                Ok(mime_label(format.to_mime_type()))
            }
        }
    }
}

fn mime_label(mime: &str) -> String {
    mime.split('/').nth(1).unwrap_or(mime).to_ascii_uppercase()
}

/// Display metadata for a loaded image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageInfo {
    pub name: String,
    pub size: Size,
    pub byte_len: u64,
    pub format: String,
}

impl ImageInfo {
    pub fn formatted_size(&self) -> String {
        format_file_size(self.byte_len)
    }
}

impl fmt::Display for ImageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} x {}, {}, {})",
            self.name,
            self.size.width,
            self.size.height,
            self.format,
            self.formatted_size()
        )
    }
}

/// A decoded image ready to be placed in a slot.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    pub raster: Arc<Raster>,
    pub info: ImageInfo,
}

impl ImageAsset {
    /// Validate, then decode on the blocking pool.
    pub async fn decode(upload: Upload, max_bytes: u64) -> MatteResult<Self> {
        let format = upload.validate(max_bytes)?;
        let Upload { name, bytes, .. } = upload;
        let byte_len = bytes.len() as u64;

        let raster = tokio::task::spawn_blocking(move || Raster::decode(&bytes))
            .await
            .map_err(|e| MatteError::decode(format!("Decode task failed: {e}")))??;

        let info = ImageInfo {
            name,
            size: raster.size(),
            byte_len,
            format,
        };
        Ok(Self {
            raster: Arc::new(raster),
            info,
        })
    }
}

/// Human-readable byte count: `Bytes`, `KB`, `MB`, or `GB` with at most two
/// decimals and no trailing zeros.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let text = format!("{value:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{text} {}", UNITS[unit])
}

fn format_limit(max_bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    if max_bytes > 0 && max_bytes % MIB == 0 {
        format!("{}MB", max_bytes / MIB)
    } else {
        format_file_size(max_bytes)
    }
}
