//! Composer Configuration
//!
//! One explicit configuration object injected into every component at construction.
//! There is no process-wide mutable state: callers load a JSON file, apply
//! `key=value` overrides from the enumerated [`ConfigOption`] set, and pass the
//! normalized result down.
//!
//! JSON layout (camelCase, every section optional):
//!
//! ```json
//! {
//!   "captions": { "maxWords": 3, "hardGapSec": 0.55 },
//!   "motion": { "zoomMax": 1.22 },
//!   "output": { "width": 1080, "height": 1920 }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::captions::CaptionStyle;
use crate::core::{CoreError, CoreResult, Size2D, TimeSec};

/// Config schema version
pub const CONFIG_VERSION: u32 = 1;

/// Complete engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComposerConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub captions: CaptionSettings,
    #[serde(default)]
    pub motion: MotionSettings,
    #[serde(default)]
    pub composition: CompositionSettings,
    #[serde(default)]
    pub audio: AudioSettings,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub caption_style: CaptionStyle,
    #[serde(default)]
    pub alignment: AlignmentSettings,
    #[serde(default)]
    pub render: RendererSettings,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            captions: CaptionSettings::default(),
            motion: MotionSettings::default(),
            composition: CompositionSettings::default(),
            audio: AudioSettings::default(),
            output: OutputSettings::default(),
            caption_style: CaptionStyle::default(),
            alignment: AlignmentSettings::default(),
            render: RendererSettings::default(),
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

/// Caption chunking and timeline repair settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptionSettings {
    /// Minimum words before punctuation/soft-gap rules may flush
    pub min_words: usize,
    /// Hard cap on words per caption block
    pub max_words: usize,
    /// Silence that always starts a new block
    pub hard_gap_sec: TimeSec,
    /// Silence to the next word that ends a block once `min_words` is reached
    pub soft_gap_sec: TimeSec,
    /// Shortest on-screen time of a block
    pub min_dur_sec: TimeSec,
    /// Longest on-screen time of a block
    pub max_dur_sec: TimeSec,
    /// Enforced spacing between consecutive blocks
    pub gap_sec: TimeSec,
    /// Synthetic chunk duration when no alignment and no duration hint exist
    pub fallback_chunk_sec: TimeSec,
    /// Synthetic spacing between fallback chunks
    pub fallback_gap_sec: TimeSec,
    /// Token length (chars) that switches fallback chunks from 3 to 2 words
    pub long_token_chars: usize,
}

impl Default for CaptionSettings {
    fn default() -> Self {
        Self {
            min_words: 2,
            max_words: 3,
            hard_gap_sec: 0.55,
            soft_gap_sec: 0.30,
            min_dur_sec: 0.60,
            max_dur_sec: 2.40,
            gap_sec: 0.04,
            fallback_chunk_sec: 1.60,
            fallback_gap_sec: 0.10,
            long_token_chars: 10,
        }
    }
}

/// Ken-Burns / pan motion settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MotionSettings {
    /// Frame rate the motion curves are sampled at
    pub fps: u32,
    /// Peak zoom for Ken-Burns in/out
    pub zoom_max: f64,
    /// Constant zoom while panning
    pub pan_zoom: f64,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            fps: 30,
            zoom_max: 1.22,
            pan_zoom: 1.12,
        }
    }
}

/// Slide timing and overall duration policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CompositionSettings {
    pub max_slides: usize,
    /// Tail kept after the last caption
    pub caption_margin_sec: TimeSec,
    /// Tail kept after the narration audio
    pub audio_margin_sec: TimeSec,
    /// Duration used when neither captions nor narration exist
    pub fallback_duration_sec: TimeSec,
    /// Floor for the computed total duration
    pub min_total_sec: TimeSec,
    /// Hard cap on output duration; longer plans are truncated explicitly
    pub max_duration_sec: TimeSec,
    pub transition_min_sec: TimeSec,
    pub transition_max_sec: TimeSec,
    /// Fraction of the per-slide duration spent crossfading
    pub transition_ratio: f64,
    /// xfade transition name
    pub transition_kind: String,
}

impl Default for CompositionSettings {
    fn default() -> Self {
        Self {
            max_slides: 10,
            caption_margin_sec: 0.40,
            audio_margin_sec: 0.30,
            fallback_duration_sec: 12.0,
            min_total_sec: 1.0,
            max_duration_sec: 59.0,
            transition_min_sec: 0.50,
            transition_max_sec: 0.90,
            transition_ratio: 0.12,
            transition_kind: default_transition_kind(),
        }
    }
}

fn default_transition_kind() -> String {
    "fade".to_string()
}

/// Loudness normalization target (EBU R128 parameters)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoudnessTarget {
    /// Integrated loudness (LUFS)
    pub integrated: f64,
    /// True peak (dBTP)
    pub true_peak: f64,
    /// Loudness range (LU)
    pub lra: f64,
}

impl Default for LoudnessTarget {
    fn default() -> Self {
        Self {
            integrated: -15.0,
            true_peak: -1.0,
            lra: 11.0,
        }
    }
}

/// Voice/background mixing settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioSettings {
    pub normalize_voice: bool,
    pub loudness: LoudnessTarget,
    pub voice_gain_db: f64,
    pub bg_gain_db: f64,
    pub sample_rate: u32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            normalize_voice: true,
            loudness: LoudnessTarget::default(),
            voice_gain_db: 0.0,
            bg_gain_db: -20.0,
            sample_rate: 44_100,
        }
    }
}

/// Output raster and encoder settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub pixel_format: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
            video_codec: "libx264".to_string(),
            preset: "medium".to_string(),
            crf: 20,
            pixel_format: "yuv420p".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
        }
    }
}

impl OutputSettings {
    /// Output raster (always even-sized)
    pub fn size(&self) -> Size2D {
        Size2D::new(self.width, self.height).even()
    }
}

/// Word alignment settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AlignmentSettings {
    /// Upper bound on a single alignment call
    pub timeout_sec: u64,
    /// Language code or "auto"
    pub language: String,
    /// Whisper model file (whisper feature only)
    pub model_path: Option<PathBuf>,
    /// Inference threads (0 = all cores)
    pub threads: u32,
}

impl Default for AlignmentSettings {
    fn default() -> Self {
        Self {
            timeout_sec: 120,
            language: "auto".to_string(),
            model_path: None,
            threads: 0,
        }
    }
}

/// Renderer invocation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RendererSettings {
    /// Explicit ffmpeg binary (otherwise detected)
    pub ffmpeg_path: Option<PathBuf>,
    /// Explicit ffprobe binary (otherwise detected)
    pub ffprobe_path: Option<PathBuf>,
    /// Allowed shortfall of the rendered duration before it counts as truncated
    pub duration_tolerance_sec: TimeSec,
    /// Directory for staging temp files (system temp dir when unset)
    pub staging_root: Option<PathBuf>,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            duration_tolerance_sec: 0.25,
            staging_root: None,
        }
    }
}

// =============================================================================
// Loading and Normalization
// =============================================================================

impl ComposerConfig {
    /// Loads a config file and normalizes it.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: ComposerConfig = serde_json::from_str(&raw).map_err(|e| {
            CoreError::InvalidConfig(format!("{}: {}", path.display(), e))
        })?;
        if config.version > CONFIG_VERSION {
            warn!(
                "Config {} has newer version {} (supported: {}); unknown fields are ignored",
                path.display(),
                config.version,
                CONFIG_VERSION
            );
        }
        config.normalize();
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Normalizes and clamps values so downstream arithmetic is always well-defined.
    ///
    /// Tolerant: corrects bad values instead of failing.
    pub fn normalize(&mut self) {
        self.version = CONFIG_VERSION;

        let c = &mut self.captions;
        c.max_words = c.max_words.clamp(1, 12);
        c.min_words = c.min_words.clamp(1, c.max_words);
        c.hard_gap_sec = clamp_f64(c.hard_gap_sec, 0.0, 10.0, 0.55);
        c.soft_gap_sec = clamp_f64(c.soft_gap_sec, 0.0, c.hard_gap_sec, 0.30);
        c.min_dur_sec = clamp_f64(c.min_dur_sec, 0.05, 10.0, 0.60);
        c.max_dur_sec = clamp_f64(c.max_dur_sec, c.min_dur_sec, 30.0, 2.40);
        c.gap_sec = clamp_f64(c.gap_sec, 0.0, 2.0, 0.04);
        c.fallback_chunk_sec = clamp_f64(c.fallback_chunk_sec, c.min_dur_sec, c.max_dur_sec, 1.60);
        c.fallback_gap_sec = clamp_f64(c.fallback_gap_sec, 0.0, 2.0, 0.10);
        c.long_token_chars = c.long_token_chars.clamp(1, 64);

        let m = &mut self.motion;
        m.fps = m.fps.clamp(1, 120);
        m.zoom_max = clamp_f64(m.zoom_max, 1.0, 3.0, 1.22);
        m.pan_zoom = clamp_f64(m.pan_zoom, 1.0, 3.0, 1.12);

        let p = &mut self.composition;
        p.max_slides = p.max_slides.clamp(1, 10);
        p.caption_margin_sec = clamp_f64(p.caption_margin_sec, 0.0, 10.0, 0.40);
        p.audio_margin_sec = clamp_f64(p.audio_margin_sec, 0.0, 10.0, 0.30);
        p.min_total_sec = clamp_f64(p.min_total_sec, 0.1, 60.0, 1.0);
        p.max_duration_sec = clamp_f64(p.max_duration_sec, p.min_total_sec, 3600.0, 59.0);
        p.fallback_duration_sec =
            clamp_f64(p.fallback_duration_sec, p.min_total_sec, p.max_duration_sec, 12.0);
        p.transition_min_sec = clamp_f64(p.transition_min_sec, 0.0, 5.0, 0.50);
        p.transition_max_sec = clamp_f64(p.transition_max_sec, p.transition_min_sec, 5.0, 0.90);
        p.transition_ratio = clamp_f64(p.transition_ratio, 0.0, 0.5, 0.12);
        if p.transition_kind.trim().is_empty()
            || !p
                .transition_kind
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            p.transition_kind = default_transition_kind();
        }

        let a = &mut self.audio;
        a.loudness.integrated = clamp_f64(a.loudness.integrated, -70.0, -5.0, -15.0);
        a.loudness.true_peak = clamp_f64(a.loudness.true_peak, -9.0, 0.0, -1.0);
        a.loudness.lra = clamp_f64(a.loudness.lra, 1.0, 50.0, 11.0);
        a.voice_gain_db = clamp_f64(a.voice_gain_db, -60.0, 20.0, 0.0);
        a.bg_gain_db = clamp_f64(a.bg_gain_db, -60.0, 20.0, -20.0);
        a.sample_rate = a.sample_rate.clamp(8_000, 192_000);

        let o = &mut self.output;
        o.width = o.width.clamp(16, 7680);
        o.height = o.height.clamp(16, 7680);
        o.fps = o.fps.clamp(1, 120);
        o.crf = o.crf.min(51);

        self.caption_style.normalize();

        self.alignment.timeout_sec = self.alignment.timeout_sec.clamp(1, 3600);
        self.render.duration_tolerance_sec =
            clamp_f64(self.render.duration_tolerance_sec, 0.0, 5.0, 0.25);
    }

    /// Applies one `key=value` override and re-normalizes.
    pub fn set_option(&mut self, key: &str, value: &str) -> CoreResult<()> {
        let option = ConfigOption::from_str(key)?;
        option.apply(self, value.trim())?;
        self.normalize();
        Ok(())
    }

    /// Applies a `key=value` assignment string.
    pub fn apply_assignment(&mut self, assignment: &str) -> CoreResult<()> {
        let (key, value) = assignment.split_once('=').ok_or_else(|| {
            CoreError::InvalidConfig(format!("expected key=value, got '{}'", assignment))
        })?;
        self.set_option(key.trim(), value)
    }
}

fn clamp_f64(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if !value.is_finite() {
        return fallback;
    }
    value.clamp(min, max)
}

// =============================================================================
// Enumerated Options
// =============================================================================

/// Every option recognized by `--set key=value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOption {
    CaptionsMinWords,
    CaptionsMaxWords,
    CaptionsHardGapSec,
    CaptionsSoftGapSec,
    CaptionsMinDurSec,
    CaptionsMaxDurSec,
    CaptionsGapSec,
    MotionFps,
    MotionZoomMax,
    MotionPanZoom,
    CompositionMaxSlides,
    CompositionFallbackDurationSec,
    CompositionMaxDurationSec,
    CompositionTransitionKind,
    AudioNormalizeVoice,
    AudioVoiceGainDb,
    AudioBgGainDb,
    OutputWidth,
    OutputHeight,
    OutputFps,
    OutputCrf,
    OutputPreset,
    CaptionStyleFontFamily,
    CaptionStyleFontSize,
    AlignmentTimeoutSec,
    AlignmentLanguage,
    AlignmentModelPath,
    RendererFfmpegPath,
    RendererFfprobePath,
}

impl ConfigOption {
    pub const ALL: [ConfigOption; 29] = [
        Self::CaptionsMinWords,
        Self::CaptionsMaxWords,
        Self::CaptionsHardGapSec,
        Self::CaptionsSoftGapSec,
        Self::CaptionsMinDurSec,
        Self::CaptionsMaxDurSec,
        Self::CaptionsGapSec,
        Self::MotionFps,
        Self::MotionZoomMax,
        Self::MotionPanZoom,
        Self::CompositionMaxSlides,
        Self::CompositionFallbackDurationSec,
        Self::CompositionMaxDurationSec,
        Self::CompositionTransitionKind,
        Self::AudioNormalizeVoice,
        Self::AudioVoiceGainDb,
        Self::AudioBgGainDb,
        Self::OutputWidth,
        Self::OutputHeight,
        Self::OutputFps,
        Self::OutputCrf,
        Self::OutputPreset,
        Self::CaptionStyleFontFamily,
        Self::CaptionStyleFontSize,
        Self::AlignmentTimeoutSec,
        Self::AlignmentLanguage,
        Self::AlignmentModelPath,
        Self::RendererFfmpegPath,
        Self::RendererFfprobePath,
    ];

    /// Dotted key as accepted on the command line
    pub fn key(&self) -> &'static str {
        match self {
            Self::CaptionsMinWords => "captions.minWords",
            Self::CaptionsMaxWords => "captions.maxWords",
            Self::CaptionsHardGapSec => "captions.hardGapSec",
            Self::CaptionsSoftGapSec => "captions.softGapSec",
            Self::CaptionsMinDurSec => "captions.minDurSec",
            Self::CaptionsMaxDurSec => "captions.maxDurSec",
            Self::CaptionsGapSec => "captions.gapSec",
            Self::MotionFps => "motion.fps",
            Self::MotionZoomMax => "motion.zoomMax",
            Self::MotionPanZoom => "motion.panZoom",
            Self::CompositionMaxSlides => "composition.maxSlides",
            Self::CompositionFallbackDurationSec => "composition.fallbackDurationSec",
            Self::CompositionMaxDurationSec => "composition.maxDurationSec",
            Self::CompositionTransitionKind => "composition.transitionKind",
            Self::AudioNormalizeVoice => "audio.normalizeVoice",
            Self::AudioVoiceGainDb => "audio.voiceGainDb",
            Self::AudioBgGainDb => "audio.bgGainDb",
            Self::OutputWidth => "output.width",
            Self::OutputHeight => "output.height",
            Self::OutputFps => "output.fps",
            Self::OutputCrf => "output.crf",
            Self::OutputPreset => "output.preset",
            Self::CaptionStyleFontFamily => "captionStyle.fontFamily",
            Self::CaptionStyleFontSize => "captionStyle.fontSize",
            Self::AlignmentTimeoutSec => "alignment.timeoutSec",
            Self::AlignmentLanguage => "alignment.language",
            Self::AlignmentModelPath => "alignment.modelPath",
            Self::RendererFfmpegPath => "render.ffmpegPath",
            Self::RendererFfprobePath => "render.ffprobePath",
        }
    }

    fn apply(&self, config: &mut ComposerConfig, value: &str) -> CoreResult<()> {
        match self {
            Self::CaptionsMinWords => config.captions.min_words = parse_value(self, value)?,
            Self::CaptionsMaxWords => config.captions.max_words = parse_value(self, value)?,
            Self::CaptionsHardGapSec => config.captions.hard_gap_sec = parse_value(self, value)?,
            Self::CaptionsSoftGapSec => config.captions.soft_gap_sec = parse_value(self, value)?,
            Self::CaptionsMinDurSec => config.captions.min_dur_sec = parse_value(self, value)?,
            Self::CaptionsMaxDurSec => config.captions.max_dur_sec = parse_value(self, value)?,
            Self::CaptionsGapSec => config.captions.gap_sec = parse_value(self, value)?,
            Self::MotionFps => config.motion.fps = parse_value(self, value)?,
            Self::MotionZoomMax => config.motion.zoom_max = parse_value(self, value)?,
            Self::MotionPanZoom => config.motion.pan_zoom = parse_value(self, value)?,
            Self::CompositionMaxSlides => {
                config.composition.max_slides = parse_value(self, value)?
            }
            Self::CompositionFallbackDurationSec => {
                config.composition.fallback_duration_sec = parse_value(self, value)?
            }
            Self::CompositionMaxDurationSec => {
                config.composition.max_duration_sec = parse_value(self, value)?
            }
            Self::CompositionTransitionKind => {
                config.composition.transition_kind = value.to_string()
            }
            Self::AudioNormalizeVoice => config.audio.normalize_voice = parse_bool(self, value)?,
            Self::AudioVoiceGainDb => config.audio.voice_gain_db = parse_value(self, value)?,
            Self::AudioBgGainDb => config.audio.bg_gain_db = parse_value(self, value)?,
            Self::OutputWidth => config.output.width = parse_value(self, value)?,
            Self::OutputHeight => config.output.height = parse_value(self, value)?,
            Self::OutputFps => config.output.fps = parse_value(self, value)?,
            Self::OutputCrf => config.output.crf = parse_value(self, value)?,
            Self::OutputPreset => config.output.preset = value.to_string(),
            Self::CaptionStyleFontFamily => config.caption_style.font_family = value.to_string(),
            Self::CaptionStyleFontSize => config.caption_style.font_size = parse_value(self, value)?,
            Self::AlignmentTimeoutSec => config.alignment.timeout_sec = parse_value(self, value)?,
            Self::AlignmentLanguage => config.alignment.language = value.to_string(),
            Self::AlignmentModelPath => config.alignment.model_path = optional_path(value),
            Self::RendererFfmpegPath => config.render.ffmpeg_path = optional_path(value),
            Self::RendererFfprobePath => config.render.ffprobe_path = optional_path(value),
        }
        Ok(())
    }
}

impl FromStr for ConfigOption {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|o| o.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::UnknownConfigOption(s.to_string()))
    }
}

fn parse_value<T: FromStr>(option: &ConfigOption, value: &str) -> CoreResult<T> {
    value.parse::<T>().map_err(|_| {
        CoreError::InvalidConfig(format!("invalid value '{}' for {}", value, option.key()))
    })
}

fn parse_bool(option: &ConfigOption, value: &str) -> CoreResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(CoreError::InvalidConfig(format!(
            "invalid boolean '{}' for {}",
            value,
            option.key()
        ))),
    }
}

fn optional_path(value: &str) -> Option<PathBuf> {
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_survive_normalization() {
        let mut config = ComposerConfig::default();
        let before = config.clone();
        config.normalize();
        assert_eq!(config, before);
    }

    #[test]
    fn empty_json_yields_defaults() {
        let config: ComposerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ComposerConfig::default());
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: ComposerConfig =
            serde_json::from_str(r#"{"captions": {"maxWords": 4}}"#).unwrap();
        assert_eq!(config.captions.max_words, 4);
        assert_eq!(config.captions.min_words, 2);
        assert_eq!(config.motion.zoom_max, 1.22);
    }

    #[test]
    fn normalize_repairs_inverted_duration_bounds() {
        let mut config = ComposerConfig::default();
        config.captions.min_dur_sec = 3.0;
        config.captions.max_dur_sec = 1.0;
        config.normalize();
        assert!(config.captions.min_dur_sec <= config.captions.max_dur_sec);
    }

    #[test]
    fn normalize_replaces_nan() {
        let mut config = ComposerConfig::default();
        config.motion.zoom_max = f64::NAN;
        config.captions.gap_sec = f64::INFINITY;
        config.normalize();
        assert_eq!(config.motion.zoom_max, 1.22);
        assert_eq!(config.captions.gap_sec, 0.04);
    }

    #[test]
    fn normalize_rejects_injection_in_transition_kind() {
        let mut config = ComposerConfig::default();
        config.composition.transition_kind = "fade[x];[y]".to_string();
        config.normalize();
        assert_eq!(config.composition.transition_kind, "fade");
    }

    #[test]
    fn set_option_known_keys() {
        let mut config = ComposerConfig::default();
        config.set_option("captions.maxWords", "4").unwrap();
        config.set_option("motion.zoomMax", "1.3").unwrap();
        config.set_option("audio.normalizeVoice", "off").unwrap();
        config.apply_assignment("output.width=720").unwrap();
        assert_eq!(config.captions.max_words, 4);
        assert_eq!(config.motion.zoom_max, 1.3);
        assert!(!config.audio.normalize_voice);
        assert_eq!(config.output.width, 720);
    }

    #[test]
    fn set_option_unknown_key_is_rejected() {
        let mut config = ComposerConfig::default();
        let err = config.set_option("captions.bogus", "1").unwrap_err();
        assert!(matches!(err, CoreError::UnknownConfigOption(_)));
    }

    #[test]
    fn set_option_bad_value_is_rejected() {
        let mut config = ComposerConfig::default();
        let err = config.set_option("output.fps", "fast").unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
        assert!(config.apply_assignment("no-equals-sign").is_err());
    }

    #[test]
    fn every_option_key_round_trips() {
        for option in ConfigOption::ALL {
            assert_eq!(ConfigOption::from_str(option.key()).unwrap(), option);
        }
    }

    #[test]
    fn load_reads_and_normalizes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"motion": {"fps": 0}, "output": {"crf": 99}}"#).unwrap();
        let config = ComposerConfig::load(&path).unwrap();
        assert_eq!(config.motion.fps, 1);
        assert_eq!(config.output.crf, 51);
    }

    #[test]
    fn load_invalid_json_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ComposerConfig::load(&path),
            Err(CoreError::InvalidConfig(_))
        ));
    }
}
