//! Cross-module invariants
//!
//! Checks that hold for any input: caption timelines, motion curves, slide timing,
//! and plan serialization. Inputs are drawn from a seeded RNG so failures reproduce.

use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::audio::{AudioMode, AudioTrack};
use crate::core::captions::{CaptionBlock, CaptionChunker, CaptionTimelineFixer, Word};
use crate::core::composition::{CompositionInput, CompositionPlan, CompositionPlanner};
use crate::core::config::{CaptionSettings, ComposerConfig, MotionSettings};
use crate::core::motion::{MotionChoice, MotionCurveBuilder, MotionKind};
use crate::core::staging::StagedImage;
use crate::core::Size2D;

const EPS: f64 = 1e-9;
const WORDS: &[&str] = &[
    "the", "quick", "brown", "fox,", "jumps", "over", "lazy", "dogs.", "really?", "yes!",
    "extraordinarily", "ok;",
];

fn random_words(rng: &mut StdRng, count: usize) -> Vec<Word> {
    let mut t = rng.gen_range(0.0..0.5);
    (0..count)
        .map(|_| {
            // Mostly tight speech, with occasional pauses
            t += if rng.gen_bool(0.15) {
                rng.gen_range(0.3..1.5)
            } else {
                rng.gen_range(0.0..0.08)
            };
            let start = t;
            t += rng.gen_range(0.05..0.6);
            Word::new(start, t, WORDS[rng.gen_range(0..WORDS.len())])
        })
        .collect()
}

fn fixed_timeline(words: &[Word]) -> Vec<CaptionBlock> {
    let settings = CaptionSettings::default();
    let fixer = CaptionTimelineFixer::from_settings(&settings).unwrap();
    fixer.fix(&CaptionChunker::new(settings).chunk_words(words))
}

fn staged(n: usize) -> Vec<StagedImage> {
    (0..n)
        .map(|i| StagedImage {
            source_index: i,
            source: PathBuf::from(format!("/in/{}.png", i)),
            path: PathBuf::from(format!("/stage/slide_{}.png", i)),
            size: Size2D::new(1200 + 100 * i as u32, 1600),
        })
        .collect()
}

#[test]
fn test_fixed_timeline_respects_spacing_and_durations() {
    let settings = CaptionSettings::default();
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..200 {
        let count = rng.gen_range(1..40);
        let blocks = fixed_timeline(&random_words(&mut rng, count));
        assert!(!blocks.is_empty());

        for (i, block) in blocks.iter().enumerate() {
            assert_eq!(block.index, i + 1);
            assert!(block.start >= 0.0);
            assert!(block.duration() >= settings.min_dur_sec - EPS, "{:?}", block);
            assert!(block.duration() <= settings.max_dur_sec + EPS, "{:?}", block);
            assert!(block.word_count() <= settings.max_words, "{:?}", block);
            assert!(!block.text.trim().is_empty());
        }
        for pair in blocks.windows(2) {
            assert!(
                pair[1].start >= pair[0].end + settings.gap_sec - EPS,
                "{:?} overlaps {:?}",
                pair[0],
                pair[1]
            );
        }
    }
}

#[test]
fn test_fixer_is_idempotent() {
    let fixer = CaptionTimelineFixer::from_settings(&CaptionSettings::default()).unwrap();
    let mut rng = StdRng::seed_from_u64(11);

    for _ in 0..100 {
        let count = rng.gen_range(1..30);
        let once = fixed_timeline(&random_words(&mut rng, count));
        assert_eq!(fixer.fix(&once), once);
    }
}

#[test]
fn test_pause_splits_short_phrase() {
    let words = vec![
        Word::new(0.0, 0.3, "A"),
        Word::new(0.3, 0.6, "B"),
        Word::new(0.6, 0.9, "C"),
        Word::new(2.0, 2.3, "D"),
    ];
    let blocks = fixed_timeline(&words);

    let texts: Vec<&str> = blocks.iter().map(|b| b.text.as_str()).collect();
    assert_eq!(texts, vec!["A B C", "D"]);
    assert!((blocks[0].start - 0.0).abs() < EPS);
    assert!((blocks[0].end - 0.9).abs() < EPS);
    assert!((blocks[1].start - 2.0).abs() < EPS);
    // Single word padded to the minimum duration
    assert!((blocks[1].end - 2.6).abs() < EPS);
}

#[test]
fn test_motion_curves_stay_inside_the_frame() {
    let output = Size2D::new(1080, 1920);
    let settings = MotionSettings::default();
    let builder = MotionCurveBuilder::new(output, &settings);
    let (w, h) = (output.width as f64, output.height as f64);

    for source in [Size2D::new(4000, 3000), Size2D::new(800, 2400), Size2D::new(1080, 1920)] {
        for kind in MotionKind::ANIMATED {
            let curve = builder.curve(kind, source, 120);
            assert_eq!(curve.frames.len(), 120);

            for frame in &curve.frames {
                assert!(frame.zoom >= 1.0 - EPS && frame.zoom <= settings.zoom_max + EPS);
                assert!(frame.x >= -EPS && frame.y >= -EPS);
                match kind {
                    MotionKind::KenBurnsIn | MotionKind::KenBurnsOut => {
                        assert!(frame.x <= w - w / frame.zoom + EPS);
                        assert!(frame.y <= h - h / frame.zoom + EPS);
                    }
                    _ => {
                        let cover = source.cover(output, settings.pan_zoom);
                        assert!(frame.x <= cover.width as f64 - w + EPS);
                        assert!(frame.y <= cover.height as f64 - h + EPS);
                    }
                }
            }
        }
    }
}

#[test]
fn test_ken_burns_zoom_is_monotonic() {
    let builder = MotionCurveBuilder::new(Size2D::new(1080, 1920), &MotionSettings::default());
    let source = Size2D::new(3000, 4000);

    let zin = builder.curve(MotionKind::KenBurnsIn, source, 90);
    assert_eq!(zin.zoom_at(0), Some(1.0));
    assert!(zin.frames.windows(2).all(|p| p[1].zoom >= p[0].zoom));

    let zout = builder.curve(MotionKind::KenBurnsOut, source, 90);
    assert!((zout.zoom_at(0).unwrap() - 1.22).abs() < EPS);
    assert!(zout.frames.windows(2).all(|p| p[1].zoom <= p[0].zoom));
    assert!(zout.zoom_at(90).is_none());
}

#[test]
fn test_slide_timing_composes_to_total() {
    let planner = CompositionPlanner::new(&ComposerConfig::default());
    let mut rng = StdRng::seed_from_u64(3);

    for _ in 0..50 {
        let n = rng.gen_range(1..=12);
        let voice = AudioTrack::new("/in/voice.wav", rng.gen_range(2.0..70.0));
        let plan = planner
            .plan(CompositionInput {
                slides: staged(n),
                voice: Some(voice),
                motion: MotionChoice::Random { seed: n as u64 },
                ..Default::default()
            })
            .unwrap();

        let kept = n.min(10);
        assert_eq!(plan.slides.len(), kept);
        assert_eq!(plan.transitions.len(), kept - 1);
        assert!(plan.total_duration <= 59.0 + EPS);

        // Crossfades overlap each branch by exactly the transition length
        let branches: f64 = plan.slides.iter().map(|s| s.duration).sum();
        let overlap: f64 = plan.transitions.iter().map(|t| t.duration).sum();
        assert!((branches - overlap - plan.total_duration).abs() < 1e-6);

        let mut prev = 0.0;
        for t in &plan.transitions {
            assert!(t.offset > prev && t.offset < plan.total_duration);
            prev = t.offset;
        }
        assert!(plan.graph.validate().is_ok());
    }
}

#[test]
fn test_background_only_covers_whole_video() {
    let plan = CompositionPlanner::new(&ComposerConfig::default())
        .plan(CompositionInput {
            slides: staged(3),
            background: Some(AudioTrack::new("/in/bed.mp3", 4.0)),
            ..Default::default()
        })
        .unwrap();

    assert_eq!(plan.audio_mix.mode, AudioMode::BgOnly);
    assert_eq!(plan.audio_mix.duration, plan.total_duration);
    let args: Vec<String> = plan
        .graph
        .input_args()
        .into_iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    assert!(args.windows(2).any(|p| p[0] == "-stream_loop" && p[1] == "-1"));
    assert!(plan.filter_complex().contains(&format!(
        "atrim=duration={}",
        crate::core::graph::num(plan.total_duration)
    )));
}

#[test]
fn test_plans_are_reproducible() {
    let planner = CompositionPlanner::new(&ComposerConfig::default());
    let words = random_words(&mut StdRng::seed_from_u64(5), 25);
    let input = CompositionInput {
        slides: staged(4),
        captions: fixed_timeline(&words),
        voice: Some(AudioTrack::new("/in/voice.wav", 9.5)),
        background: Some(AudioTrack::new("/in/bed.mp3", 30.0)),
        motion: MotionChoice::Random { seed: 42 },
        ..Default::default()
    };

    let first = planner.plan(input.clone()).unwrap();
    let second = planner.plan(input).unwrap();
    assert_eq!(first.to_json_pretty().unwrap(), second.to_json_pretty().unwrap());

    let restored = CompositionPlan::from_json(&first.to_json_pretty().unwrap()).unwrap();
    assert_eq!(restored, first);
    assert_eq!(restored.filter_complex(), first.filter_complex());
}
