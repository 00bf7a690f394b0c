//! Error types for the frame pipeline.

use thiserror::Error;

/// Error type returned by port implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while talking to the external decoding tool.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("decoding tool is not available: {0}")]
    ToolUnavailable(String),

    #[error("duration probe failed: {0}")]
    ProbeFailed(String),

    #[error("frame extraction at {frame_timestamp:.3}s failed: {cause}")]
    ExtractionFailed { frame_timestamp: f64, cause: String },
}

impl FrameError {
    pub fn extraction_failed(frame_timestamp: f64, cause: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            frame_timestamp,
            cause: cause.into(),
        }
    }
}

/// Pipeline-level failures. Any of these turns a job FAILED.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("processor unavailable")]
    ProcessorUnavailable,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("job panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Internal(String),
}
