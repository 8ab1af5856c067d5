//! Render Module
//!
//! Executes a [`CompositionPlan`](crate::core::composition::CompositionPlan)
//! with an external renderer.
//!
//! - `invoker`: the [`RenderInvoker`] seam and its FFmpeg implementation
//! - `progress`: `-progress pipe:1` parsing

mod invoker;
mod progress;

pub use invoker::{FfmpegRenderInvoker, RenderInvoker, RenderReport};
pub use progress::{parse_progress_line, progress_from_state, ProgressState, RenderProgress};
