//! Caption Synchronization Module
//!
//! Turns narration into a burn-in ready caption timeline.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Caption System                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  models.rs     - Word, CaptionBlock, CaptionStyle               │
//! │  alignment.rs  - WordAligner seam + strategy chain              │
//! │  whisper.rs    - Whisper word aligner (feature `whisper`)       │
//! │  audio.rs      - 16kHz extraction, WAV loading                  │
//! │  chunker.rs    - words/text -> 2-3 word blocks                  │
//! │  fixer.rs      - spacing and duration repair                    │
//! │  formats.rs    - SRT export/import                              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust,ignore
//! let chain = CaptionSourceChain::new(chunker, fixer, timeout)
//!     .with_aligner(Arc::new(PrecomputedWordsAligner::new("words.json")))
//!     .with_heuristic();
//! let outcome = chain.resolve(&request, Some(narration_secs)).await?;
//! std::fs::write("captions.srt", export_srt(&outcome.blocks))?;
//! ```

mod alignment;
pub mod audio;
mod chunker;
mod fixer;
mod formats;
mod models;
pub mod whisper;

pub use alignment::{
    parse_words_json, AlignmentRequest, CaptionOutcome, CaptionSourceChain, CaptionSourceKind,
    CaptionStrategy, PrecomputedWordsAligner, WordAligner,
};
pub use chunker::CaptionChunker;
pub use fixer::CaptionTimelineFixer;
pub use formats::{export_srt, format_srt_timestamp, parse_srt, ParseError};
pub use models::{normalize_words, timeline_end, CaptionBlock, CaptionStyle, Color, FontWeight, Word};
pub use whisper::{is_whisper_available, WhisperAligner};
