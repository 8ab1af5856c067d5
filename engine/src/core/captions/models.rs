//! Caption Data Models
//!
//! Word timings produced by alignment, the caption blocks built from them, and the
//! logical style used when burning blocks into the video.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::TimeSec;

const CLOSING_MARKS: &[char] = &['"', '\'', '”', '’', ')', ']', '»'];

// =============================================================================
// Words
// =============================================================================

/// A single aligned word (or token) with timing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Word {
    /// Start time in seconds
    pub start: TimeSec,
    /// End time in seconds
    pub end: TimeSec,
    /// Token text, trimmed
    pub text: String,
}

impl Word {
    /// Creates a word, swapping inverted times and clamping negative times to zero.
    pub fn new(start: TimeSec, end: TimeSec, text: &str) -> Self {
        let (start, end) = if end < start { (end, start) } else { (start, end) };
        Self {
            start: finite_or_zero(start).max(0.0),
            end: finite_or_zero(end).max(0.0),
            text: text.trim().to_string(),
        }
    }

    /// Re-applies the construction invariants to a deserialized word
    pub fn normalized(self) -> Self {
        Self::new(self.start, self.end, &self.text)
    }

    pub fn duration(&self) -> TimeSec {
        self.end - self.start
    }

    /// Last character of the token, skipping closing quotes and brackets (`done."`)
    pub fn terminal_char(&self) -> Option<char> {
        self.text.chars().rev().find(|c| !CLOSING_MARKS.contains(c))
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Sorts words by start time and drops the ones with empty text.
pub fn normalize_words(words: Vec<Word>) -> Vec<Word> {
    let mut words: Vec<Word> = words
        .into_iter()
        .map(Word::normalized)
        .filter(|w| !w.text.is_empty())
        .collect();
    words.sort_by(|a, b| a.start.total_cmp(&b.start));
    words
}

// =============================================================================
// Caption Blocks
// =============================================================================

/// A caption block shown on screen for `[start, end)`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaptionBlock {
    /// 1-based position in the timeline
    pub index: usize,
    pub start: TimeSec,
    pub end: TimeSec,
    pub text: String,
}

impl CaptionBlock {
    pub fn new(index: usize, start: TimeSec, end: TimeSec, text: impl Into<String>) -> Self {
        Self {
            index,
            start,
            end,
            text: text.into(),
        }
    }

    /// Returns the duration of this block in seconds
    pub fn duration(&self) -> TimeSec {
        self.end - self.start
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// End of the last block, or `None` for an empty timeline
pub fn timeline_end(blocks: &[CaptionBlock]) -> Option<TimeSec> {
    blocks.iter().map(|b| b.end).reduce(f64::max)
}

// =============================================================================
// Caption Styling
// =============================================================================

/// RGBA color value (0-255 for each component)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Creates a new color from RGBA components
    pub fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Creates an opaque color from RGB components
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    pub fn white() -> Self {
        Self::rgb(255, 255, 255)
    }

    pub fn black() -> Self {
        Self::rgb(0, 0, 0)
    }

    /// Converts to FFmpeg color syntax (`0xRRGGBB` or `0xRRGGBB@alpha`)
    pub fn to_ffmpeg(&self) -> String {
        let hex = format!("0x{:02X}{:02X}{:02X}", self.r, self.g, self.b);
        if self.a == 255 {
            hex
        } else {
            format!("{}@{:.3}", hex, self.a as f64 / 255.0)
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::white()
    }
}

/// Font weight
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FontWeight {
    Normal,
    #[default]
    Bold,
    Light,
}

/// Logical caption style.
///
/// Fonts are addressed by family and style rather than a file path so the renderer's
/// font matcher resolves the face; `font_file` overrides that when set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptionStyle {
    /// Font family name
    pub font_family: String,
    /// Explicit font file, bypassing family lookup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_file: Option<PathBuf>,
    /// Font size in pixels
    pub font_size: u32,
    pub font_weight: FontWeight,
    pub italic: bool,
    /// Text color
    pub color: Color,
    /// Outline/stroke color (None = no outline)
    pub outline_color: Option<Color>,
    /// Outline width in pixels
    pub outline_width: u32,
    /// Background box color (None = no box)
    pub box_color: Option<Color>,
    /// Vertical center of the text as a fraction of frame height
    pub vertical_ratio: f64,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_family: "DejaVu Sans".to_string(),
            font_file: None,
            font_size: 64,
            font_weight: FontWeight::Bold,
            italic: false,
            color: Color::white(),
            outline_color: Some(Color::black()),
            outline_width: 4,
            box_color: None,
            vertical_ratio: 0.72,
        }
    }
}

impl CaptionStyle {
    /// Clamps sizes and ratios into drawable ranges.
    pub fn normalize(&mut self) {
        if self.font_family.trim().is_empty() {
            self.font_family = Self::default().font_family;
        }
        self.font_size = self.font_size.clamp(8, 400);
        self.outline_width = self.outline_width.min(40);
        if !self.vertical_ratio.is_finite() {
            self.vertical_ratio = Self::default().vertical_ratio;
        }
        self.vertical_ratio = self.vertical_ratio.clamp(0.0, 1.0);
    }

    /// Fontconfig style name, e.g. `Bold Italic`
    pub fn style_name(&self) -> String {
        let weight = match self.font_weight {
            FontWeight::Normal => "",
            FontWeight::Bold => "Bold",
            FontWeight::Light => "Light",
        };
        match (weight.is_empty(), self.italic) {
            (true, false) => "Regular".to_string(),
            (true, true) => "Italic".to_string(),
            (false, false) => weight.to_string(),
            (false, true) => format!("{} Italic", weight),
        }
    }

    /// Fontconfig pattern for the family and style (`DejaVu Sans:style=Bold`)
    pub fn font_pattern(&self) -> String {
        format!("{}:style={}", self.font_family.trim(), self.style_name())
    }
}

// =============================================================================
// Tests
// =============================================================================
