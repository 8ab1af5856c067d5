//! FFmpeg Integration Module
//!
//! Locates the FFmpeg/FFprobe binaries and runs probes. Rendering itself lives in
//! `core::render`, which drives FFmpeg with a typed filter graph.
//!
//! Binaries come from explicit config paths first, then common install locations,
//! then `PATH`.

mod detection;
mod probe;
mod runner;

pub use detection::*;
pub use probe::MediaProbe;
pub use runner::{AudioStreamInfo, FFmpegRunner, MediaInfo, VideoStreamInfo};

/// FFmpeg-related error types
#[derive(Debug, thiserror::Error)]
pub enum FFmpegError {
    #[error("FFmpeg not found. Please install FFmpeg or set render.ffmpegPath.")]
    NotFound,

    #[error("FFmpeg execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Invalid input file: {0}")]
    InvalidInput(String),

    #[error("FFprobe error: {0}")]
    ProbeError(String),

    #[error("Process error: {0}")]
    ProcessError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type FFmpegResult<T> = Result<T, FFmpegError>;
