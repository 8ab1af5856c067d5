//! Caption Timeline Fixer
//!
//! Repairs raw caption blocks into a timeline the overlay stage can burn in directly:
//! sorted, non-overlapping, spaced by at least `gap_sec`, each block lasting between
//! `min_dur_sec` and `max_dur_sec`, indexed 1..N.

use tracing::debug;

use crate::core::config::CaptionSettings;
use crate::core::{CoreError, CoreResult, TimeSec};

use super::models::CaptionBlock;

/// Enforces spacing and duration bounds on a caption timeline
#[derive(Debug, Clone, Copy)]
pub struct CaptionTimelineFixer {
    min_dur: TimeSec,
    max_dur: TimeSec,
    gap: TimeSec,
}

impl CaptionTimelineFixer {
    /// Creates a fixer, rejecting bounds that cannot be satisfied.
    pub fn new(min_dur: TimeSec, max_dur: TimeSec, gap: TimeSec) -> CoreResult<Self> {
        if !(min_dur.is_finite() && max_dur.is_finite() && gap.is_finite()) {
            return Err(CoreError::InvalidConfig(
                "caption timing bounds must be finite".to_string(),
            ));
        }
        if min_dur <= 0.0 || min_dur > max_dur {
            return Err(CoreError::InvalidConfig(format!(
                "caption duration bounds invalid: min {:.3}s, max {:.3}s",
                min_dur, max_dur
            )));
        }
        if gap < 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "caption gap must be non-negative, got {:.3}s",
                gap
            )));
        }
        Ok(Self {
            min_dur,
            max_dur,
            gap,
        })
    }

    pub fn from_settings(settings: &CaptionSettings) -> CoreResult<Self> {
        Self::new(settings.min_dur_sec, settings.max_dur_sec, settings.gap_sec)
    }

    /// Returns the repaired timeline.
    ///
    /// Starts only ever move later; ends are clamped into
    /// `[start + min_dur, start + max_dur]`. Blocks with blank text are removed.
    pub fn fix(&self, blocks: &[CaptionBlock]) -> Vec<CaptionBlock> {
        let mut raw: Vec<&CaptionBlock> =
            blocks.iter().filter(|b| !b.text.trim().is_empty()).collect();
        raw.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut fixed: Vec<CaptionBlock> = Vec::with_capacity(raw.len());
        for block in raw {
            let raw_start = if block.start.is_finite() { block.start } else { 0.0 };
            let mut start = match fixed.last() {
                None => raw_start.max(0.0),
                Some(prev) => (prev.end + self.gap).max(raw_start),
            };
            let mut end = self.clamp_end(block.end, start);

            if let Some(prev) = fixed.last() {
                if start < prev.end + self.gap {
                    start = prev.end + self.gap;
                    end = self.clamp_end(block.end, start);
                }
            }

            fixed.push(CaptionBlock::new(0, start, end, block.text.trim()));
        }

        for (i, block) in fixed.iter_mut().enumerate() {
            block.index = i + 1;
        }

        debug!(
            "Fixed caption timeline: {} raw -> {} blocks",
            blocks.len(),
            fixed.len()
        );
        fixed
    }

    fn clamp_end(&self, raw_end: TimeSec, start: TimeSec) -> TimeSec {
        let lo = start + self.min_dur;
        let hi = start + self.max_dur;
        if raw_end.is_finite() {
            raw_end.clamp(lo, hi)
        } else {
            lo
        }
    }
}
