//! ReelCast Core Type Definitions
//!
//! Defines fundamental types used throughout the engine.

use serde::{Deserialize, Serialize};
use tracing::warn;

// =============================================================================
// Time Types
// =============================================================================

/// Time in seconds (floating point)
pub type TimeSec = f64;

/// Time in frames (integer)
pub type Frame = u64;

/// Converts a duration to a whole frame count at the given rate.
///
/// Rounds to the nearest frame and never returns zero for a positive duration,
/// so every slide branch has at least one frame to animate.
pub fn frames_for(duration: TimeSec, fps: u32) -> Frame {
    if !duration.is_finite() || duration <= 0.0 || fps == 0 {
        return 0;
    }
    ((duration * fps as f64).round() as Frame).max(1)
}

// =============================================================================
// Spatial Types
// =============================================================================

/// 2D size in pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size2D {
    pub width: u32,
    pub height: u32,
}

impl Size2D {
    pub fn new(width: u32, height: u32) -> Self {
        if width == 0 || height == 0 {
            warn!("Size2D created with zero dimension ({}x{}), clamping to 1", width, height);
        }
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Vertical 1080x1920 raster used for shorts/reels
    pub fn vertical_1080p() -> Self {
        Self::new(1080, 1920)
    }

    /// Aspect ratio (width / height)
    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Rounds both dimensions down to even values (required by yuv420p encoders)
    pub fn even(&self) -> Self {
        Self::new((self.width / 2 * 2).max(2), (self.height / 2 * 2).max(2))
    }

    /// Size obtained by scaling `self` up (or down) until it fully covers `target`,
    /// preserving aspect ratio, then multiplying by `extra`.
    ///
    /// Matches FFmpeg's `scale=W*extra:H*extra:force_original_aspect_ratio=increase`.
    pub fn cover(&self, target: Size2D, extra: f64) -> Size2D {
        let tw = target.width as f64 * extra;
        let th = target.height as f64 * extra;
        let factor = (tw / self.width as f64).max(th / self.height as f64);
        let w = (self.width as f64 * factor).round().max(tw.round());
        let h = (self.height as f64 * factor).round().max(th.round());
        Size2D::new(w as u32, h as u32)
    }
}

impl Default for Size2D {
    fn default() -> Self {
        Self::vertical_1080p()
    }
}

impl std::fmt::Display for Size2D {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
