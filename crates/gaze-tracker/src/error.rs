//! Error types for tracking operations.

use thiserror::Error;

/// Result type for tracking operations.
pub type TrackingResult<T> = Result<T, TrackingError>;

/// Errors that can occur inside the tracking engine.
///
/// None of these cross the public control API: the engine turns them into
/// log lines, status fields or a `false` from `initialize`.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("Frame source failed: {0}")]
    FrameSource(String),

    #[error("Face detection failed: {0}")]
    Detection(String),

    #[error("Servo command failed: {0}")]
    Servo(String),

    #[error("{operation} timed out after {after_ms} ms")]
    Timeout { operation: String, after_ms: u64 },

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidConfig { field: String, message: String },

    #[error("Tracking engine is not initialized")]
    NotInitialized,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrackingError {
    /// Create a frame source failure error.
    pub fn frame_source(message: impl Into<String>) -> Self {
        Self::FrameSource(message.into())
    }

    /// Create a detection failure error.
    pub fn detection(message: impl Into<String>) -> Self {
        Self::Detection(message.into())
    }

    /// Create a servo failure error.
    pub fn servo(message: impl Into<String>) -> Self {
        Self::Servo(message.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from a call exceeding its time budget.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
