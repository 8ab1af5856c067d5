//! Slide Motion Module
//!
//! Deterministic Ken-Burns and pan curves for still images. Every curve is
//! available both as numeric per-frame samples and as the renderer filter chain
//! that expresses the same formula.

use std::str::FromStr;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::core::config::MotionSettings;
use crate::core::graph::{num, Filter};
use crate::core::{frames_for, CoreError, Frame, Size2D, TimeSec};

// =============================================================================
// Motion Kinds
// =============================================================================

/// Per-slide animation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MotionKind {
    /// Fit inside the raster with letterbox padding, static
    None,
    /// Zoom from 1.0 towards the configured maximum
    KenBurnsIn,
    /// Zoom from the configured maximum back to 1.0
    KenBurnsOut,
    /// Horizontal pan, left to right
    #[serde(rename = "panLR")]
    PanLR,
    /// Vertical pan, top to bottom
    #[serde(rename = "panUD")]
    PanUD,
}

impl MotionKind {
    /// Animated kinds in cycle order
    pub const ANIMATED: [MotionKind; 4] = [
        MotionKind::KenBurnsIn,
        MotionKind::KenBurnsOut,
        MotionKind::PanLR,
        MotionKind::PanUD,
    ];

    pub fn is_animated(&self) -> bool {
        !matches!(self, MotionKind::None)
    }
}

impl FromStr for MotionKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "none" | "static" => Ok(MotionKind::None),
            "kenburnsin" | "zoomin" => Ok(MotionKind::KenBurnsIn),
            "kenburnsout" | "zoomout" => Ok(MotionKind::KenBurnsOut),
            "panlr" | "panleftright" => Ok(MotionKind::PanLR),
            "panud" | "panupdown" => Ok(MotionKind::PanUD),
            _ => Err(CoreError::InvalidConfig(format!("unknown motion kind '{}'", s))),
        }
    }
}

/// How motion kinds are assigned to slides
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "mode")]
pub enum MotionChoice {
    Fixed { kind: MotionKind },
    /// Rotate through [`MotionKind::ANIMATED`] by slide index
    #[default]
    Cycle,
    /// Seeded pick per slide; the same seed always yields the same kinds
    Random { seed: u64 },
}

impl MotionChoice {
    /// Motion kind for each of `count` slides
    pub fn assign(&self, count: usize) -> Vec<MotionKind> {
        match self {
            MotionChoice::Fixed { kind } => vec![*kind; count],
            MotionChoice::Cycle => (0..count)
                .map(|i| MotionKind::ANIMATED[i % MotionKind::ANIMATED.len()])
                .collect(),
            MotionChoice::Random { seed } => {
                let mut rng = StdRng::seed_from_u64(*seed);
                (0..count)
                    .map(|_| {
                        MotionKind::ANIMATED
                            .choose(&mut rng)
                            .copied()
                            .unwrap_or(MotionKind::KenBurnsIn)
                    })
                    .collect()
            }
        }
    }
}

impl FromStr for MotionChoice {
    type Err = CoreError;

    /// `cycle`, `random`, `random:<seed>`, or a motion kind name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower == "cycle" {
            return Ok(MotionChoice::Cycle);
        }
        if lower == "random" {
            return Ok(MotionChoice::Random { seed: 0 });
        }
        if let Some(seed) = lower.strip_prefix("random:") {
            let seed = seed
                .trim()
                .parse::<u64>()
                .map_err(|_| CoreError::InvalidConfig(format!("invalid motion seed '{}'", seed)))?;
            return Ok(MotionChoice::Random { seed });
        }
        Ok(MotionChoice::Fixed {
            kind: trimmed.parse()?,
        })
    }
}

// =============================================================================
// Curves
// =============================================================================

/// Cubic ease `3p² − 2p³`, with `p` clamped to `[0, 1]`
pub fn smoothstep(p: f64) -> f64 {
    let p = if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 };
    p * p * (3.0 - 2.0 * p)
}

/// The same ease as an FFmpeg expression over `var`
fn smoothstep_expr(var: &str) -> String {
    format!("(3*{v}*{v}-2*{v}*{v}*{v})", v = var)
}

/// Camera state for one output frame
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotionFrame {
    pub frame: Frame,
    pub zoom: f64,
    /// Top-left of the visible window in the scaled source
    pub x: f64,
    pub y: f64,
}

/// Sampled camera path of one slide
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionCurve {
    pub kind: MotionKind,
    pub frame_count: Frame,
    pub frames: Vec<MotionFrame>,
}

impl MotionCurve {
    pub fn zoom_at(&self, frame: Frame) -> Option<f64> {
        self.frames.get(frame as usize).map(|f| f.zoom)
    }
}

/// Builds motion curves and renderer branches for a fixed output raster
#[derive(Clone, Debug)]
pub struct MotionCurveBuilder {
    output: Size2D,
    fps: u32,
    zoom_max: f64,
    pan_zoom: f64,
}

impl MotionCurveBuilder {
    pub fn new(output: Size2D, settings: &MotionSettings) -> Self {
        Self {
            output,
            fps: settings.fps.max(1),
            zoom_max: settings.zoom_max.max(1.0),
            pan_zoom: settings.pan_zoom.max(1.0),
        }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn frame_count(&self, duration: TimeSec) -> Frame {
        frames_for(duration, self.fps)
    }

    fn zoom(&self, kind: MotionKind, s: f64) -> f64 {
        match kind {
            MotionKind::None => 1.0,
            MotionKind::KenBurnsIn => 1.0 + (self.zoom_max - 1.0) * s,
            MotionKind::KenBurnsOut => self.zoom_max + (1.0 - self.zoom_max) * s,
            MotionKind::PanLR | MotionKind::PanUD => self.pan_zoom,
        }
    }

    /// Samples the camera path for `frame_count` frames of `source`
    pub fn curve(&self, kind: MotionKind, source: Size2D, frame_count: Frame) -> MotionCurve {
        let w = self.output.width as f64;
        let h = self.output.height as f64;
        let panned = source.cover(self.output, self.pan_zoom);
        let slack_x = (panned.width as f64 - w).max(0.0);
        let slack_y = (panned.height as f64 - h).max(0.0);

        let frames = (0..frame_count)
            .map(|frame| {
                let s = smoothstep(frame as f64 / frame_count as f64);
                let zoom = self.zoom(kind, s);
                let (x, y) = match kind {
                    MotionKind::None => (0.0, 0.0),
                    MotionKind::KenBurnsIn | MotionKind::KenBurnsOut => {
                        ((w - w / zoom) / 2.0, (h - h / zoom) / 2.0)
                    }
                    MotionKind::PanLR => (slack_x * s, slack_y / 2.0),
                    MotionKind::PanUD => (slack_x / 2.0, slack_y * s),
                };
                MotionFrame { frame, zoom, x, y }
            })
            .collect();

        MotionCurve {
            kind,
            frame_count,
            frames,
        }
    }

    /// Filter chain turning a looped still into exactly `duration` seconds of
    /// `W×H` video at the output rate.
    pub fn branch_filters(&self, kind: MotionKind, duration: TimeSec, output_fps: u32) -> Vec<Filter> {
        let (w, h) = (self.output.width, self.output.height);
        let frame_count = self.frame_count(duration).max(1);
        let progress = format!("(on/{})", frame_count);
        let ease = smoothstep_expr(&progress);

        let mut filters = match kind {
            MotionKind::None => vec![
                Filter::new("scale")
                    .lit("w", w)
                    .lit("h", h)
                    .lit("force_original_aspect_ratio", "decrease"),
                Filter::new("pad")
                    .lit("w", w)
                    .lit("h", h)
                    .expr("x", "(ow-iw)/2")
                    .expr("y", "(oh-ih)/2")
                    .lit("color", "black"),
            ],
            MotionKind::KenBurnsIn | MotionKind::KenBurnsOut => {
                let z = num(self.zoom_max);
                let zoom = if kind == MotionKind::KenBurnsIn {
                    format!("1+({}-1)*{}", z, ease)
                } else {
                    format!("{}-({}-1)*{}", z, z, ease)
                };
                vec![
                    Filter::new("scale")
                        .lit("w", w)
                        .lit("h", h)
                        .lit("force_original_aspect_ratio", "increase"),
                    Filter::new("crop").lit("w", w).lit("h", h),
                    Filter::new("zoompan")
                        .expr("z", zoom)
                        .expr("x", "iw/2-(iw/zoom/2)")
                        .expr("y", "ih/2-(ih/zoom/2)")
                        .lit("d", 1)
                        .lit("s", self.output)
                        .lit("fps", self.fps),
                ]
            }
            MotionKind::PanLR | MotionKind::PanUD => {
                let scaled_w = (w as f64 * self.pan_zoom).round() as u32;
                let scaled_h = (h as f64 * self.pan_zoom).round() as u32;
                let pan = smoothstep_expr(&format!("(n/{})", frame_count));
                let (x, y) = if kind == MotionKind::PanLR {
                    (format!("(iw-ow)*{}", pan), "(ih-oh)/2".to_string())
                } else {
                    ("(iw-ow)/2".to_string(), format!("(ih-oh)*{}", pan))
                };
                vec![
                    Filter::new("scale")
                        .lit("w", scaled_w)
                        .lit("h", scaled_h)
                        .lit("force_original_aspect_ratio", "increase"),
                    Filter::new("crop").lit("w", w).lit("h", h).expr("x", x).expr("y", y),
                ]
            }
        };

        filters.extend([
            Filter::new("trim").number("duration", duration),
            Filter::new("setpts").positional("PTS-STARTPTS"),
            Filter::new("fps").lit("fps", output_fps.max(1)),
            Filter::new("format").lit("pix_fmts", "yuv420p"),
            Filter::new("setsar").positional(1),
        ]);
        filters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::ArgValue;

    fn builder() -> MotionCurveBuilder {
        MotionCurveBuilder::new(Size2D::vertical_1080p(), &MotionSettings::default())
    }

    #[test]
    fn test_smoothstep_endpoints() {
        assert_eq!(smoothstep(0.0), 0.0);
        assert_eq!(smoothstep(1.0), 1.0);
        assert!((smoothstep(0.5) - 0.5).abs() < 1e-12);
        assert_eq!(smoothstep(2.0), 1.0);
        assert_eq!(smoothstep(f64::NAN), 0.0);
    }

    #[test]
    fn test_ken_burns_in_curve() {
        let curve = builder().curve(MotionKind::KenBurnsIn, Size2D::new(1600, 1200), 30);
        assert_eq!(curve.frames.len(), 30);
        assert_eq!(curve.zoom_at(0), Some(1.0));
        let last = curve.zoom_at(29).unwrap();
        assert!((last - 1.22).abs() < 0.01, "zoom(29) = {}", last);
        for pair in curve.frames.windows(2) {
            assert!(pair[1].zoom >= pair[0].zoom);
        }
    }

    #[test]
    fn test_ken_burns_out_starts_zoomed() {
        let curve = builder().curve(MotionKind::KenBurnsOut, Size2D::new(800, 800), 30);
        assert!((curve.zoom_at(0).unwrap() - 1.22).abs() < 1e-12);
        for pair in curve.frames.windows(2) {
            assert!(pair[1].zoom <= pair[0].zoom);
        }
    }

    #[test]
    fn test_pan_stays_inside_scaled_source() {
        let source = Size2D::new(4000, 3000);
        let b = builder();
        let curve = b.curve(MotionKind::PanLR, source, 60);
        let scaled = source.cover(Size2D::vertical_1080p(), 1.12);
        let max_x = (scaled.width - 1080) as f64;
        assert_eq!(curve.frames[0].x, 0.0);
        for f in &curve.frames {
            assert!((f.zoom - 1.12).abs() < 1e-12);
            assert!(f.x >= 0.0 && f.x <= max_x);
        }
        assert!(curve.frames[59].x > curve.frames[30].x);
    }

    #[test]
    fn test_branch_normalizes_rate_and_duration() {
        for kind in [
            MotionKind::None,
            MotionKind::KenBurnsIn,
            MotionKind::KenBurnsOut,
            MotionKind::PanLR,
            MotionKind::PanUD,
        ] {
            let filters = builder().branch_filters(kind, 4.5, 30);
            let names: Vec<&str> = filters.iter().map(|f| f.name.as_str()).collect();
            assert_eq!(
                &names[names.len() - 5..],
                &["trim", "setpts", "fps", "format", "setsar"],
                "{:?}",
                kind
            );
            assert_eq!(
                filters[names.len() - 5].arg("duration"),
                Some(&ArgValue::Literal("4.5".into()))
            );
        }
    }

    #[test]
    fn test_zoompan_expression_matches_formula() {
        let filters = builder().branch_filters(MotionKind::KenBurnsIn, 1.0, 30);
        let zoompan = filters.iter().find(|f| f.name == "zoompan").unwrap();
        assert_eq!(
            zoompan.arg("z"),
            Some(&ArgValue::Expr(
                "1+(1.22-1)*(3*(on/30)*(on/30)-2*(on/30)*(on/30)*(on/30))".into()
            ))
        );
        assert_eq!(zoompan.arg("s"), Some(&ArgValue::Literal("1080x1920".into())));
    }

    #[test]
    fn test_choice_assignment() {
        assert_eq!(
            MotionChoice::Cycle.assign(5),
            vec![
                MotionKind::KenBurnsIn,
                MotionKind::KenBurnsOut,
                MotionKind::PanLR,
                MotionKind::PanUD,
                MotionKind::KenBurnsIn
            ]
        );
        let fixed = MotionChoice::Fixed {
            kind: MotionKind::None,
        };
        assert_eq!(fixed.assign(2), vec![MotionKind::None; 2]);

        let random = MotionChoice::Random { seed: 42 };
        let first = random.assign(8);
        assert_eq!(first, random.assign(8));
        assert!(first.iter().all(MotionKind::is_animated));
    }

    #[test]
    fn test_parse_choice() {
        assert_eq!("cycle".parse::<MotionChoice>().unwrap(), MotionChoice::Cycle);
        assert_eq!(
            "random:7".parse::<MotionChoice>().unwrap(),
            MotionChoice::Random { seed: 7 }
        );
        assert_eq!(
            "ken-burns-out".parse::<MotionChoice>().unwrap(),
            MotionChoice::Fixed {
                kind: MotionKind::KenBurnsOut
            }
        );
        assert_eq!(
            "pan_lr".parse::<MotionKind>().unwrap(),
            MotionKind::PanLR
        );
        assert!("spin".parse::<MotionChoice>().is_err());
    }

    #[test]
    fn test_kind_serde_names() {
        assert_eq!(
            serde_json::to_string(&MotionKind::PanLR).unwrap(),
            "\"panLR\""
        );
        assert_eq!(
            serde_json::to_string(&MotionKind::KenBurnsIn).unwrap(),
            "\"kenBurnsIn\""
        );
    }
}
