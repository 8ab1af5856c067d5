//! Composition Module
//!
//! Turns staged images, a caption timeline, and audio into a [`CompositionPlan`]:
//! slide timing, crossfades, caption overlays, the audio mix, and the filter graph
//! that renders them.
//!
//! Plans are pure values. The same input always produces the same plan, and a
//! plan survives a JSON round trip unchanged.

mod planner;

pub use planner::{CompositionInput, CompositionPlanner};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::audio::AudioMixPlan;
use crate::core::captions::{CaptionBlock, CaptionStyle};
use crate::core::config::OutputSettings;
use crate::core::graph::FilterGraph;
use crate::core::motion::MotionKind;
use crate::core::{CoreResult, Frame, Size2D, TimeSec};

/// Encoder-facing output description
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSpec {
    pub size: Size2D,
    pub fps: u32,
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub pixel_format: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl From<&OutputSettings> for OutputSpec {
    fn from(settings: &OutputSettings) -> Self {
        Self {
            size: settings.size(),
            fps: settings.fps,
            video_codec: settings.video_codec.clone(),
            preset: settings.preset.clone(),
            crf: settings.crf,
            pixel_format: settings.pixel_format.clone(),
            audio_codec: settings.audio_codec.clone(),
            audio_bitrate: settings.audio_bitrate.clone(),
        }
    }
}

/// One slide branch
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlidePlan {
    pub index: usize,
    /// Source image; staged copies are substituted only at render time
    pub image_path: PathBuf,
    pub source_size: Size2D,
    /// Rendered branch length: display slot plus the following crossfade overlap
    pub duration: TimeSec,
    pub motion: MotionKind,
    pub frame_count: Frame,
}

/// Crossfade between slide `k` and `k + 1`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionPlan {
    pub kind: String,
    pub duration: TimeSec,
    /// Start of the fade on the composed timeline
    pub offset: TimeSec,
}

/// Record of a duration cap being applied
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Truncation {
    pub requested: TimeSec,
    pub cap: TimeSec,
    pub dropped_captions: usize,
    pub clipped_captions: usize,
}

/// Non-fatal adjustment made while preparing a plan
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum PlanWarning {
    SlideDropped { path: String, reason: String },
    SlideCountClamped { requested: usize, kept: usize },
    DurationClamped { requested: TimeSec, floor: TimeSec },
    Truncated { requested: TimeSec, cap: TimeSec },
    /// Narration runs past the caption-derived length and is cut at `total`
    NarrationTrimmed { voice: TimeSec, total: TimeSec },
    AudioSourceDropped { path: String, reason: String },
    CaptionsDropped { reason: String },
}

/// Complete, renderable composition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionPlan {
    pub output: OutputSpec,
    pub slides: Vec<SlidePlan>,
    pub transitions: Vec<TransitionPlan>,
    pub captions: Vec<CaptionBlock>,
    pub caption_style: CaptionStyle,
    pub total_duration: TimeSec,
    pub per_slide_duration: TimeSec,
    pub transition_duration: TimeSec,
    pub audio_mix: AudioMixPlan,
    pub graph: FilterGraph,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncation: Option<Truncation>,
    #[serde(default)]
    pub warnings: Vec<PlanWarning>,
}

impl CompositionPlan {
    pub fn to_json_pretty(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// The graph as an FFmpeg `-filter_complex` string
    pub fn filter_complex(&self) -> String {
        self.graph.to_filter_complex()
    }
}
