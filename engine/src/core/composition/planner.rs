//! Composition planning: durations, transitions, captions, and the filter graph.

use tracing::{debug, info, warn};

use super::{CompositionPlan, OutputSpec, PlanWarning, SlidePlan, TransitionPlan, Truncation};
use crate::core::audio::{AudioMixPlanner, AudioTrack};
use crate::core::captions::{timeline_end, CaptionBlock, CaptionStyle};
use crate::core::config::{CompositionSettings, ComposerConfig};
use crate::core::graph::{num, Filter, FilterGraph, MediaKind, Stage};
use crate::core::motion::{MotionChoice, MotionCurveBuilder};
use crate::core::staging::StagedImage;
use crate::core::{CoreError, CoreResult, TimeSec};

const VIDEO_OUT: &str = "vout";
const AUDIO_OUT: &str = "aout";

/// Everything a plan is computed from
#[derive(Clone, Debug, Default)]
pub struct CompositionInput {
    pub slides: Vec<StagedImage>,
    pub captions: Vec<CaptionBlock>,
    pub voice: Option<AudioTrack>,
    pub background: Option<AudioTrack>,
    pub motion: MotionChoice,
    /// Overrides the configured caption style
    pub caption_style: Option<CaptionStyle>,
    /// Warnings raised before planning (dropped slides or audio)
    pub warnings: Vec<PlanWarning>,
}

/// Builds [`CompositionPlan`]s from configuration
#[derive(Clone, Debug)]
pub struct CompositionPlanner {
    settings: CompositionSettings,
    output: OutputSpec,
    caption_style: CaptionStyle,
    min_caption_dur: TimeSec,
    motion: MotionCurveBuilder,
    audio: AudioMixPlanner,
}

impl CompositionPlanner {
    pub fn new(config: &ComposerConfig) -> Self {
        let output = OutputSpec::from(&config.output);
        Self {
            settings: config.composition.clone(),
            motion: MotionCurveBuilder::new(output.size, &config.motion),
            audio: AudioMixPlanner::new(config.audio.clone()),
            caption_style: config.caption_style.clone(),
            min_caption_dur: config.captions.min_dur_sec,
            output,
        }
    }

    /// Target length before flooring and capping
    fn target_duration(&self, input: &CompositionInput) -> TimeSec {
        if let Some(end) = timeline_end(&input.captions) {
            return end + self.settings.caption_margin_sec;
        }
        if let Some(voice) = &input.voice {
            return voice.duration + self.settings.audio_margin_sec;
        }
        self.settings.fallback_duration_sec
    }

    /// Transition length for a slot of `per_slide` seconds
    pub fn transition_duration(&self, slide_count: usize, per_slide: TimeSec) -> TimeSec {
        if slide_count < 2 {
            return 0.0;
        }
        (self.settings.transition_ratio * per_slide)
            .clamp(self.settings.transition_min_sec, self.settings.transition_max_sec)
    }

    pub fn plan(&self, input: CompositionInput) -> CoreResult<CompositionPlan> {
        let mut warnings = input.warnings.clone();

        let mut slides = input.slides.clone();
        if slides.is_empty() {
            return Err(CoreError::NoUsableSlides);
        }
        if slides.len() > self.settings.max_slides {
            warn!(
                "Using the first {} of {} slides",
                self.settings.max_slides,
                slides.len()
            );
            warnings.push(PlanWarning::SlideCountClamped {
                requested: slides.len(),
                kept: self.settings.max_slides,
            });
            slides.truncate(self.settings.max_slides);
        }

        // Duration: floor, then cap
        let requested = self.target_duration(&input);
        let floor = self.settings.min_total_sec.max(self.min_caption_dur);
        let mut total = requested;
        if !total.is_finite() || total < floor {
            let err = CoreError::DurationBelowMinimum {
                requested: total,
                floor,
            };
            warn!("{}; clamping", err);
            warnings.push(PlanWarning::DurationClamped {
                requested: total,
                floor,
            });
            total = floor;
        }

        let mut captions = input.captions.clone();
        let mut truncation = None;
        let cap = self.settings.max_duration_sec;
        if total > cap {
            let (kept, dropped, clipped) = clip_captions(&captions, cap, self.min_caption_dur);
            warn!(
                "Capping {:.3}s to {:.3}s ({} captions dropped, {} clipped)",
                total, cap, dropped, clipped
            );
            warnings.push(PlanWarning::Truncated {
                requested: total,
                cap,
            });
            truncation = Some(Truncation {
                requested: total,
                cap,
                dropped_captions: dropped,
                clipped_captions: clipped,
            });
            captions = kept;
            total = cap;
        }

        if let Some(voice) = input
            .voice
            .as_ref()
            .filter(|v| truncation.is_none() && v.duration > total)
        {
            warn!(
                "Narration ({:.3}s) is cut at {:.3}s",
                voice.duration, total
            );
            warnings.push(PlanWarning::NarrationTrimmed {
                voice: voice.duration,
                total,
            });
        }

        // Slide timing
        let count = slides.len();
        let per_slide = total / count as f64;
        let transition = self.transition_duration(count, per_slide);
        let kinds = input.motion.assign(count);

        let slide_plans: Vec<SlidePlan> = slides
            .iter()
            .zip(kinds)
            .enumerate()
            .map(|(k, (image, motion))| {
                let duration = if k + 1 < count {
                    per_slide + transition
                } else {
                    per_slide
                };
                SlidePlan {
                    index: k,
                    image_path: image.source.clone(),
                    source_size: image.size,
                    duration,
                    motion,
                    frame_count: self.motion.frame_count(duration),
                }
            })
            .collect();

        let transitions: Vec<TransitionPlan> = (0..count.saturating_sub(1))
            .map(|k| TransitionPlan {
                kind: self.settings.transition_kind.clone(),
                duration: transition,
                offset: per_slide * (k + 1) as f64,
            })
            .collect();

        let caption_style = input
            .caption_style
            .clone()
            .unwrap_or_else(|| self.caption_style.clone());
        let audio_mix = self
            .audio
            .plan(input.voice.as_ref(), input.background.as_ref(), total);

        // Graph
        let mut graph = FilterGraph::new();
        for slide in &slide_plans {
            let index = graph.add_input(
                MediaKind::Image,
                slide.image_path.clone(),
                vec![
                    ("-loop".to_string(), "1".to_string()),
                    ("-framerate".to_string(), self.motion.fps().to_string()),
                    ("-t".to_string(), num(slide.duration)),
                ],
            );
            graph.push_stage(Stage::new(
                vec![FilterGraph::stream_label(index, 'v')],
                self.motion
                    .branch_filters(slide.motion, slide.duration, self.output.fps),
                vec![format!("v{}", slide.index)],
            ));
        }

        let mut current = "v0".to_string();
        for (k, t) in transitions.iter().enumerate() {
            let next = format!("x{}", k + 1);
            graph.push_stage(Stage::new(
                vec![current, format!("v{}", k + 1)],
                vec![Filter::new("xfade")
                    .lit("transition", &t.kind)
                    .number("duration", t.duration)
                    .number("offset", t.offset)],
                vec![next.clone()],
            ));
            current = next;
        }

        let mut overlay: Vec<Filter> = captions
            .iter()
            .map(|block| caption_filter(block, &caption_style))
            .collect();
        if overlay.is_empty() {
            overlay.push(Filter::new("null"));
        }
        graph.push_stage(Stage::new(
            vec![current],
            overlay,
            vec![VIDEO_OUT.to_string()],
        ));

        audio_mix.apply(&mut graph, AUDIO_OUT);
        graph.video_out = VIDEO_OUT.to_string();
        graph.audio_out = AUDIO_OUT.to_string();
        graph.validate()?;

        info!(
            "Planned {} slides, {:.3}s total ({:.3}s per slide, {:.3}s fades), {} captions, audio {:?}",
            count,
            total,
            per_slide,
            transition,
            captions.len(),
            audio_mix.mode
        );
        debug!("filter_complex: {}", graph.to_filter_complex());

        Ok(CompositionPlan {
            output: self.output.clone(),
            slides: slide_plans,
            transitions,
            captions,
            caption_style,
            total_duration: total,
            per_slide_duration: per_slide,
            transition_duration: transition,
            audio_mix,
            graph,
            truncation,
            warnings,
        })
    }
}

/// Drops captions starting at or after `cap`, clips those straddling it, and
/// drops clipped blocks shorter than `min_dur`. Returns `(kept, dropped, clipped)`.
fn clip_captions(
    blocks: &[CaptionBlock],
    cap: TimeSec,
    min_dur: TimeSec,
) -> (Vec<CaptionBlock>, usize, usize) {
    let mut kept = Vec::with_capacity(blocks.len());
    let mut dropped = 0;
    let mut clipped = 0;

    for block in blocks {
        if block.start >= cap {
            dropped += 1;
        } else if block.end > cap {
            if cap - block.start < min_dur {
                dropped += 1;
            } else {
                clipped += 1;
                kept.push(CaptionBlock::new(0, block.start, cap, block.text.clone()));
            }
        } else {
            kept.push(block.clone());
        }
    }

    for (i, block) in kept.iter_mut().enumerate() {
        block.index = i + 1;
    }
    (kept, dropped, clipped)
}

/// drawtext overlay visible within `[start, end)`
fn caption_filter(block: &CaptionBlock, style: &CaptionStyle) -> Filter {
    let mut filter = Filter::new("drawtext");
    filter = match &style.font_file {
        Some(path) => filter.lit("fontfile", path.display()),
        None => filter.lit("font", style.font_pattern()),
    };
    filter = filter
        .text("text", block.text.clone())
        .lit("fontsize", style.font_size)
        .lit("fontcolor", style.color.to_ffmpeg());
    if let Some(outline) = &style.outline_color {
        if style.outline_width > 0 {
            filter = filter
                .lit("borderw", style.outline_width)
                .lit("bordercolor", outline.to_ffmpeg());
        }
    }
    if let Some(box_color) = &style.box_color {
        filter = filter
            .lit("box", 1)
            .lit("boxcolor", box_color.to_ffmpeg())
            .lit("boxborderw", (style.font_size / 4).max(1));
    }
    filter
        .expr("x", "(w-text_w)/2")
        .expr("y", format!("h*{}-text_h/2", num(style.vertical_ratio)))
        .expr(
            "enable",
            format!("gte(t,{})*lt(t,{})", num(block.start), num(block.end)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::AudioMode;
    use crate::core::graph::ArgValue;
    use crate::core::motion::MotionKind;
    use crate::core::Size2D;
    use std::path::PathBuf;

    fn slides(n: usize) -> Vec<StagedImage> {
        (0..n)
            .map(|i| StagedImage {
                source_index: i,
                source: PathBuf::from(format!("/src/{}.jpg", i)),
                path: PathBuf::from(format!("/stage/slide_{}.jpg", i)),
                size: Size2D::new(1600, 1200),
            })
            .collect()
    }

    fn planner() -> CompositionPlanner {
        CompositionPlanner::new(&ComposerConfig::default())
    }

    fn block(index: usize, start: f64, end: f64, text: &str) -> CaptionBlock {
        CaptionBlock::new(index, start, end, text)
    }

    #[test]
    fn test_three_slides_over_twelve_seconds() {
        let plan = planner()
            .plan(CompositionInput {
                slides: slides(3),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(plan.total_duration, 12.0);
        assert_eq!(plan.per_slide_duration, 4.0);
        assert!(plan.transition_duration >= 0.5 && plan.transition_duration <= 0.9);
        assert_eq!(plan.transitions.len(), 2);
        assert!(plan.transitions[1].offset > plan.transitions[0].offset);
        assert_eq!(plan.transitions[0].offset, 4.0);
        assert_eq!(plan.transitions[1].offset, 8.0);

        // Composed length: last branch starts at the final offset
        let last = plan.slides.last().unwrap();
        assert_eq!(plan.transitions[1].offset + last.duration, 12.0);
        assert_eq!(plan.audio_mix.mode, AudioMode::Silent);
        assert_eq!(plan.slides[0].frame_count, 135);
    }

    #[test]
    fn test_single_slide_has_no_transition() {
        let plan = planner()
            .plan(CompositionInput {
                slides: slides(1),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(plan.transition_duration, 0.0);
        assert!(plan.transitions.is_empty());
        assert_eq!(plan.slides[0].duration, plan.total_duration);
        assert!(!plan.filter_complex().contains("xfade"));
    }

    #[test]
    fn test_no_slides_is_an_error() {
        let err = planner().plan(CompositionInput::default()).unwrap_err();
        assert!(matches!(err, CoreError::NoUsableSlides));
    }

    #[test]
    fn test_slide_count_clamped_to_ten() {
        let plan = planner()
            .plan(CompositionInput {
                slides: slides(12),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(plan.slides.len(), 10);
        assert!(plan.warnings.contains(&PlanWarning::SlideCountClamped {
            requested: 12,
            kept: 10
        }));
    }

    #[test]
    fn test_duration_priority() {
        let captions = vec![block(1, 0.0, 1.0, "Hello there"), block(2, 1.1, 4.6, "friend")];
        let voice = AudioTrack::new("/tts/v.wav", 9.0);

        let with_captions = planner()
            .plan(CompositionInput {
                slides: slides(2),
                captions: captions.clone(),
                voice: Some(voice.clone()),
                ..Default::default()
            })
            .unwrap();
        assert!((with_captions.total_duration - 5.0).abs() < 1e-9);

        let voice_only = planner()
            .plan(CompositionInput {
                slides: slides(2),
                voice: Some(voice),
                ..Default::default()
            })
            .unwrap();
        assert!((voice_only.total_duration - 9.3).abs() < 1e-9);
        assert_eq!(voice_only.audio_mix.mode, AudioMode::VoiceOnly);
    }

    #[test]
    fn test_short_duration_is_floored() {
        let voice = AudioTrack::new("/tts/v.wav", 0.1);
        let plan = planner()
            .plan(CompositionInput {
                slides: slides(1),
                voice: Some(voice),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(plan.total_duration, 1.0);
        assert!(matches!(
            plan.warnings[0],
            PlanWarning::DurationClamped { floor, .. } if floor == 1.0
        ));
    }

    #[test]
    fn test_long_timeline_is_truncated_explicitly() {
        let captions = vec![
            block(1, 10.0, 12.0, "early words"),
            block(2, 57.0, 58.5, "still fits"),
            block(3, 58.6, 60.5, "straddles cap"),
            block(4, 58.8, 59.9, "too short"),
            block(5, 61.0, 62.0, "past cap"),
        ];
        let plan = planner()
            .plan(CompositionInput {
                slides: slides(2),
                captions,
                ..Default::default()
            })
            .unwrap();

        assert_eq!(plan.total_duration, 59.0);
        let truncation = plan.truncation.as_ref().unwrap();
        assert!((truncation.requested - 62.4).abs() < 1e-9);
        assert_eq!(truncation.cap, 59.0);
        assert_eq!(truncation.dropped_captions, 3);
        assert_eq!(truncation.clipped_captions, 0);
        assert_eq!(plan.captions.len(), 2);
        assert_eq!(plan.captions[1].index, 2);
        assert!(plan.captions.iter().all(|c| c.end <= 59.0));
    }

    #[test]
    fn test_straddling_caption_is_clipped() {
        let captions = vec![block(1, 58.0, 61.0, "long tail")];
        let (kept, dropped, clipped) = clip_captions(&captions, 59.0, 0.6);
        assert_eq!((dropped, clipped), (0, 1));
        assert_eq!(kept[0].end, 59.0);
    }

    #[test]
    fn test_captions_burn_within_window() {
        let captions = vec![block(1, 0.5, 1.3, "Hi, 100%")];
        let plan = planner()
            .plan(CompositionInput {
                slides: slides(1),
                captions,
                ..Default::default()
            })
            .unwrap();
        let overlay = plan
            .graph
            .stages
            .iter()
            .find(|s| s.outputs == vec![VIDEO_OUT.to_string()])
            .unwrap();
        let drawtext = &overlay.filters[0];
        assert_eq!(drawtext.name, "drawtext");
        assert_eq!(
            drawtext.arg("enable"),
            Some(&ArgValue::Expr("gte(t,0.5)*lt(t,1.3)".into()))
        );
        assert_eq!(
            drawtext.arg("font"),
            Some(&ArgValue::Literal("DejaVu Sans:style=Bold".into()))
        );
        assert!(plan.filter_complex().contains(r"text=Hi\, 100\\\\%"));
    }

    #[test]
    fn test_plan_is_deterministic_and_round_trips() {
        let input = CompositionInput {
            slides: slides(4),
            captions: vec![block(1, 0.0, 1.2, "one two"), block(2, 1.3, 2.5, "three")],
            voice: Some(AudioTrack::new("/tts/v.wav", 3.0)),
            background: Some(AudioTrack::new("/music/bed.mp3", 30.0)),
            motion: MotionChoice::Random { seed: 9 },
            ..Default::default()
        };

        let a = planner().plan(input.clone()).unwrap();
        let b = planner().plan(input).unwrap();
        let json = a.to_json_pretty().unwrap();
        assert_eq!(json, b.to_json_pretty().unwrap());

        let parsed = CompositionPlan::from_json(&json).unwrap();
        assert_eq!(parsed, a);
        parsed.graph.validate().unwrap();
    }

    #[test]
    fn test_motion_choice_applies_per_slide() {
        let plan = planner()
            .plan(CompositionInput {
                slides: slides(2),
                motion: MotionChoice::Fixed {
                    kind: MotionKind::PanUD,
                },
                ..Default::default()
            })
            .unwrap();
        assert!(plan.slides.iter().all(|s| s.motion == MotionKind::PanUD));
    }

    #[test]
    fn test_narration_cut_by_short_captions_is_reported() {
        let plan = planner()
            .plan(CompositionInput {
                slides: slides(2),
                captions: vec![block(1, 0.0, 2.4, "only a few words")],
                voice: Some(AudioTrack::new("/tts/v.wav", 10.0)),
                ..Default::default()
            })
            .unwrap();

        assert!((plan.total_duration - 2.8).abs() < 1e-9);
        assert!(plan.truncation.is_none());
        assert!(plan.warnings.iter().any(|w| matches!(
            w,
            PlanWarning::NarrationTrimmed { voice, total }
                if *voice == 10.0 && (*total - 2.8).abs() < 1e-9
        )));

        let covered = planner()
            .plan(CompositionInput {
                slides: slides(2),
                voice: Some(AudioTrack::new("/tts/v.wav", 10.0)),
                ..Default::default()
            })
            .unwrap();
        assert!(covered.warnings.is_empty());
    }

    #[test]
    fn test_plan_references_source_images() {
        let plan = planner()
            .plan(CompositionInput {
                slides: slides(2),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(plan.slides[1].image_path, PathBuf::from("/src/1.jpg"));
        let inputs: Vec<_> = plan.graph.inputs.iter().map(|i| i.path.clone()).collect();
        assert_eq!(inputs, vec![PathBuf::from("/src/0.jpg"), PathBuf::from("/src/1.jpg")]);
    }
}
