//! ReelCast Error Definitions
//!
//! Defines error types used throughout the engine.

use thiserror::Error;

use super::ffmpeg::FFmpegError;
use super::TimeSec;

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Caption Errors
    // =========================================================================
    #[error("Word alignment unavailable: {0}")]
    AlignmentUnavailable(String),

    #[error("No caption text provided")]
    EmptyScript,

    // =========================================================================
    // Media Errors
    // =========================================================================
    #[error("Invalid media '{path}': {reason}")]
    InvalidMedia { path: String, reason: String },

    #[error("No usable slides: every input image failed to stage")]
    NoUsableSlides,

    #[error("Computed duration {requested:.3}s is below the minimum {floor:.3}s")]
    DurationBelowMinimum { requested: TimeSec, floor: TimeSec },

    // =========================================================================
    // Plan Errors
    // =========================================================================
    #[error("Invalid filter graph: {0}")]
    InvalidGraph(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown configuration option: {0}")]
    UnknownConfigOption(String),

    // =========================================================================
    // Render Errors
    // =========================================================================
    #[error("Render engine failure: {message} (plan saved to {plan_path})")]
    RenderEngineFailure { message: String, plan_path: String },

    #[error("Rendered output truncated: expected {expected:.3}s, got {actual:.3}s")]
    TruncatedOutput { expected: TimeSec, actual: TimeSec },

    #[error("FFmpeg error: {0}")]
    FFmpeg(#[from] FFmpegError),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Shorthand for an [`CoreError::InvalidMedia`] from any displayable reason
    pub fn invalid_media(path: impl AsRef<std::path::Path>, reason: impl ToString) -> Self {
        Self::InvalidMedia {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether the pipeline may recover by falling back or dropping a source
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::AlignmentUnavailable(_)
                | Self::InvalidMedia { .. }
                | Self::DurationBelowMinimum { .. }
                | Self::Timeout(_)
        )
    }
}
