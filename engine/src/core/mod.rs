//! ReelCast Core Engine
//!
//! Caption timing, slide planning, filter graph construction, and rendering.

pub mod audio;
pub mod captions;
pub mod composition;
pub mod config;
pub mod ffmpeg;
pub mod fs;
pub mod graph;
pub mod motion;
pub mod pipeline;
pub mod process;
pub mod render;
pub mod staging;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;

#[cfg(test)]
mod tests_invariants;
