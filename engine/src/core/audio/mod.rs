//! Audio Mix Module
//!
//! Decides how narration and background music combine and emits the audio half
//! of the filter graph. Every mode yields exactly the planned duration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::config::{AudioSettings, LoudnessTarget};
use crate::core::graph::{num, Filter, FilterGraph, MediaKind, Stage};
use crate::core::TimeSec;

/// A probed audio source
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioTrack {
    pub path: PathBuf,
    pub duration: TimeSec,
}

impl AudioTrack {
    pub fn new(path: impl Into<PathBuf>, duration: TimeSec) -> Self {
        Self {
            path: path.into(),
            duration,
        }
    }
}

/// Mixing mode, derived from which tracks are present
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AudioMode {
    VoiceOnly,
    BgOnly,
    Mixed,
    Silent,
}

impl AudioMode {
    pub fn from_presence(voice: bool, background: bool) -> Self {
        match (voice, background) {
            (true, true) => AudioMode::Mixed,
            (true, false) => AudioMode::VoiceOnly,
            (false, true) => AudioMode::BgOnly,
            (false, false) => AudioMode::Silent,
        }
    }
}

/// Resolved audio mix
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioMixPlan {
    pub voice_path: Option<PathBuf>,
    pub bg_path: Option<PathBuf>,
    pub voice_gain_db: f64,
    pub bg_gain_db: f64,
    pub mode: AudioMode,
    /// Voice loudness normalization target, when enabled and voice is present
    pub loudness: Option<LoudnessTarget>,
    /// Output length; every mode pads and trims to it
    pub duration: TimeSec,
    pub voice_duration: Option<TimeSec>,
    pub bg_duration: Option<TimeSec>,
    pub sample_rate: u32,
}

/// Plans voice/background mixing
#[derive(Clone, Debug, Default)]
pub struct AudioMixPlanner {
    settings: AudioSettings,
}

impl AudioMixPlanner {
    pub fn new(settings: AudioSettings) -> Self {
        Self { settings }
    }

    pub fn plan(
        &self,
        voice: Option<&AudioTrack>,
        background: Option<&AudioTrack>,
        duration: TimeSec,
    ) -> AudioMixPlan {
        let mode = AudioMode::from_presence(voice.is_some(), background.is_some());
        debug!("Audio mix mode {:?} for {:.3}s", mode, duration);

        AudioMixPlan {
            voice_path: voice.map(|t| t.path.clone()),
            bg_path: background.map(|t| t.path.clone()),
            voice_gain_db: self.settings.voice_gain_db,
            bg_gain_db: self.settings.bg_gain_db,
            mode,
            loudness: (voice.is_some() && self.settings.normalize_voice)
                .then_some(self.settings.loudness),
            duration,
            voice_duration: voice.map(|t| t.duration),
            bg_duration: background.map(|t| t.duration),
            sample_rate: self.settings.sample_rate,
        }
    }
}

impl AudioMixPlan {
    /// Adds audio inputs and stages to `graph`, ending in `output_label`.
    pub fn apply(&self, graph: &mut FilterGraph, output_label: &str) {
        let voice = self.voice_path.as_ref().map(|path| {
            let index = graph.add_input(MediaKind::Audio, path.clone(), Vec::new());
            FilterGraph::stream_label(index, 'a')
        });
        // The background loops so short music beds still fill the whole video
        let background = self.bg_path.as_ref().map(|path| {
            let index = graph.add_input(
                MediaKind::Audio,
                path.clone(),
                vec![("-stream_loop".to_string(), "-1".to_string())],
            );
            FilterGraph::stream_label(index, 'a')
        });

        match (voice, background) {
            (Some(voice), Some(background)) => {
                graph.push_stage(Stage::new(
                    vec![voice],
                    self.voice_filters(),
                    vec!["voice".to_string()],
                ));
                graph.push_stage(Stage::new(
                    vec![background],
                    self.background_filters(),
                    vec!["bg".to_string()],
                ));
                let mut mix = vec![Filter::new("amix")
                    .lit("inputs", 2)
                    .lit("duration", "longest")
                    .lit("normalize", 0)];
                mix.extend(self.finish_filters());
                graph.push_stage(Stage::new(
                    vec!["voice".to_string(), "bg".to_string()],
                    mix,
                    vec![output_label.to_string()],
                ));
            }
            (Some(voice), None) => {
                let mut filters = self.voice_filters();
                filters.extend(self.finish_filters());
                graph.push_stage(Stage::new(
                    vec![voice],
                    filters,
                    vec![output_label.to_string()],
                ));
            }
            (None, Some(background)) => {
                let mut filters = self.background_filters();
                filters.extend(self.finish_filters());
                graph.push_stage(Stage::new(
                    vec![background],
                    filters,
                    vec![output_label.to_string()],
                ));
            }
            (None, None) => {
                let mut filters = vec![Filter::new("anullsrc")
                    .lit("r", self.sample_rate)
                    .lit("cl", "stereo")];
                filters.push(Filter::new("atrim").number("duration", self.duration));
                graph.push_stage(Stage::new(
                    Vec::new(),
                    filters,
                    vec![output_label.to_string()],
                ));
            }
        }
    }

    fn voice_filters(&self) -> Vec<Filter> {
        let mut filters = Vec::new();
        if let Some(target) = &self.loudness {
            filters.push(
                Filter::new("loudnorm")
                    .number("I", target.integrated)
                    .number("TP", target.true_peak)
                    .number("LRA", target.lra),
            );
        }
        filters.push(Filter::new("volume").lit("volume", format!("{}dB", num(self.voice_gain_db))));
        filters.push(self.format_filter());
        filters
    }

    fn background_filters(&self) -> Vec<Filter> {
        vec![
            Filter::new("volume").lit("volume", format!("{}dB", num(self.bg_gain_db))),
            self.format_filter(),
        ]
    }

    fn format_filter(&self) -> Filter {
        Filter::new("aformat")
            .lit("sample_rates", self.sample_rate)
            .lit("channel_layouts", "stereo")
    }

    fn finish_filters(&self) -> Vec<Filter> {
        vec![
            Filter::new("apad"),
            Filter::new("atrim").number("duration", self.duration),
            Filter::new("asetpts").positional("PTS-STARTPTS"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::ArgValue;

    fn finish(graph: &mut FilterGraph) {
        graph.push_stage(Stage::new(
            Vec::new(),
            vec![Filter::new("color").lit("s", "16x16").number("d", 1.0)],
            vec!["vout".to_string()],
        ));
        graph.video_out = "vout".to_string();
        graph.audio_out = "aout".to_string();
    }

    #[test]
    fn test_mode_from_presence() {
        assert_eq!(AudioMode::from_presence(true, true), AudioMode::Mixed);
        assert_eq!(AudioMode::from_presence(true, false), AudioMode::VoiceOnly);
        assert_eq!(AudioMode::from_presence(false, true), AudioMode::BgOnly);
        assert_eq!(AudioMode::from_presence(false, false), AudioMode::Silent);
    }

    #[test]
    fn test_background_only_fills_total_duration() {
        let bg = AudioTrack::new("/music/bed.mp3", 3.0);
        let plan = AudioMixPlanner::default().plan(None, Some(&bg), 12.0);
        assert_eq!(plan.mode, AudioMode::BgOnly);
        assert_eq!(plan.duration, 12.0);
        assert!(plan.loudness.is_none());

        let mut graph = FilterGraph::new();
        plan.apply(&mut graph, "aout");
        assert_eq!(
            graph.inputs[0].options,
            vec![("-stream_loop".to_string(), "-1".to_string())]
        );
        let stage = &graph.stages[0];
        let trim = stage.filters.iter().find(|f| f.name == "atrim").unwrap();
        assert_eq!(trim.arg("duration"), Some(&ArgValue::Literal("12".into())));
        assert!(stage.filters.iter().any(|f| f.name == "apad"));

        finish(&mut graph);
        graph.validate().unwrap();
    }

    #[test]
    fn test_mixed_normalizes_voice_and_attenuates_bed() {
        let voice = AudioTrack::new("/tts/voice.wav", 8.0);
        let bg = AudioTrack::new("/music/bed.mp3", 60.0);
        let plan = AudioMixPlanner::default().plan(Some(&voice), Some(&bg), 8.3);
        assert_eq!(plan.mode, AudioMode::Mixed);

        let mut graph = FilterGraph::new();
        plan.apply(&mut graph, "aout");
        let fc = graph.to_filter_complex();
        assert!(fc.contains("loudnorm=I=-15:TP=-1:LRA=11"), "{}", fc);
        assert!(fc.contains("volume=volume=-20dB"), "{}", fc);
        assert!(fc.contains("amix=inputs=2:duration=longest:normalize=0"), "{}", fc);

        finish(&mut graph);
        graph.validate().unwrap();
    }

    #[test]
    fn test_voice_without_normalization() {
        let settings = AudioSettings {
            normalize_voice: false,
            ..Default::default()
        };
        let voice = AudioTrack::new("/tts/voice.wav", 5.0);
        let plan = AudioMixPlanner::new(settings).plan(Some(&voice), None, 5.3);
        assert_eq!(plan.mode, AudioMode::VoiceOnly);
        assert!(plan.loudness.is_none());

        let mut graph = FilterGraph::new();
        plan.apply(&mut graph, "aout");
        assert!(!graph.to_filter_complex().contains("loudnorm"));
    }

    #[test]
    fn test_silent_uses_source_stage() {
        let plan = AudioMixPlanner::default().plan(None, None, 6.0);
        assert_eq!(plan.mode, AudioMode::Silent);

        let mut graph = FilterGraph::new();
        plan.apply(&mut graph, "aout");
        assert!(graph.inputs.is_empty());
        assert_eq!(
            graph.to_filter_complex(),
            "anullsrc=r=44100:cl=stereo,atrim=duration=6[aout]"
        );

        finish(&mut graph);
        graph.validate().unwrap();
    }
}
