//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Largest upload accepted by default (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Preview canvas settings.
    pub preview: PreviewConfig,

    /// Upload limits.
    pub upload: UploadConfig,

    /// Default export settings.
    pub export: ExportDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Preview canvas and zoom parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Maximum display canvas width in pixels.
    pub max_width: u32,

    /// Maximum display canvas height in pixels.
    pub max_height: u32,

    /// Smallest on-screen magnification.
    pub min_zoom: f64,

    /// Largest on-screen magnification.
    pub max_zoom: f64,

    /// Multiplicative step per zoom-in/zoom-out action.
    pub zoom_step: f64,
}

/// Upload validation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Maximum accepted file size in bytes.
    pub max_bytes: u64,
}

/// Default export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Directory exported files are written to.
    pub output_dir: PathBuf,

    /// Composite format: "png" or "jpg".
    pub format: String,

    /// JPEG quality (1-100).
    pub jpeg_quality: u8,

    /// File name prefix for composites.
    pub composite_prefix: String,

    /// File name prefix for masks.
    pub mask_prefix: String,

    /// Foreground alpha must be strictly greater than this to count as
    /// covered in the mask.
    pub alpha_threshold: u8,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "matte=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            preview: PreviewConfig::default(),
            upload: UploadConfig::default(),
            export: ExportDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            max_width: 800,
            max_height: 600,
            min_zoom: 0.5,
            max_zoom: 3.0,
            zoom_step: 1.2,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            output_dir: dirs_default_exports(),
            format: "png".to_string(),
            jpeg_quality: 90,
            composite_prefix: "composite".to_string(),
            mask_prefix: "mask".to_string(),
            alpha_threshold: 128,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &std::path::Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<PathBuf, std::io::Error> {
        let config_path = config_file_path();
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, config_path: &std::path::Path) -> Result<(), std::io::Error> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("matte").join("config.json")
}

/// Default export directory.
fn dirs_default_exports() -> PathBuf {
    let base = std::env::var("XDG_PICTURES_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join("Pictures")
        });
    base.join("matte")
}
