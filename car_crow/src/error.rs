//! Error types for the detection engine and its I/O boundaries.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for detection operations.
pub type CrowResult<T> = Result<T, CrowError>;

/// Errors that can occur while loading, scanning or publishing frames.
#[derive(Debug, Error)]
pub enum CrowError {
    #[error("Frame size mismatch: before is {before:?}, after is {after:?}")]
    FrameSizeMismatch {
        before: (u32, u32),
        after: (u32, u32),
    },

    #[error("Failed to load frame {path}: {source}")]
    FrameLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{tool} not found in PATH")]
    ToolNotFound { tool: String },

    #[error("External tool failed: {message}")]
    ExternalTool {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("No frames were extracted from {0}")]
    NoFramesExtracted(PathBuf),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl CrowError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an invalid region error.
    pub fn invalid_region(message: impl Into<String>) -> Self {
        Self::InvalidRegion(message.into())
    }

    /// Create an external tool failure.
    pub fn external_tool(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::ExternalTool {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// True for errors raised while validating inputs, before any scan starts.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::InvalidRegion(_)
                | Self::InvalidTimestamp { .. }
                | Self::JsonParse(_)
        )
    }

    /// True for failures of the frame extraction boundary.
    pub fn is_external_tool(&self) -> bool {
        matches!(
            self,
            Self::ToolNotFound { .. } | Self::ExternalTool { .. } | Self::NoFramesExtracted(_)
        )
    }
}
