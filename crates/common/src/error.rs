//! Error types shared across Matte crates.

use std::path::PathBuf;

/// Top-level error type for Matte operations.
#[derive(Debug, thiserror::Error)]
pub enum MatteError {
    /// Upload rejected before any state was touched (media type, size).
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Bytes were accepted but could not be decoded into a raster.
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// A render or export was requested without the images it needs.
    #[error("Render unavailable: {message}")]
    RenderUnavailable { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    /// Encoding or delivery failed after a successful render.
    #[error("Export error: {message}")]
    Export { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using MatteError.
pub type MatteResult<T> = Result<T, MatteError>;

impl MatteError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            message: msg.into(),
        }
    }

    pub fn render_unavailable(msg: impl Into<String>) -> Self {
        Self::RenderUnavailable {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Short text suitable for a transient notification, without the
    /// category prefix used by `Display`.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidInput { message }
            | Self::Decode { message }
            | Self::RenderUnavailable { message }
            | Self::Render { message }
            | Self::Export { message }
            | Self::Config { message } => message.clone(),
            Self::FileNotFound { path } => format!("File not found: {}", path.display()),
            Self::Io(e) => e.to_string(),
            Self::Json(e) => e.to_string(),
            Self::Other(e) => e.to_string(),
        }
    }
}
