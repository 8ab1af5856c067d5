//! Caption Chunker
//!
//! Groups aligned words into short caption blocks, or splits raw script text into
//! evenly timed synthetic blocks when no alignment is available.
//!
//! Rules are evaluated per incoming word in this order:
//!
//! 1. A silence of at least `hard_gap_sec` since the previous word flushes the buffer.
//! 2. The word is appended.
//! 3. `max_words` buffered words flush.
//! 4. Hard punctuation (`.!?…`) flushes once `min_words` is reached.
//! 5. A buffer spanning `max_dur_sec` flushes without padding.
//! 6. Once `min_words` is reached, a silence of `soft_gap_sec` before the next word
//!    or soft punctuation (`,;:`) flushes.
//!
//! Every flush except rule 5 pads the block to at least `min_dur_sec`.

use tracing::debug;

use crate::core::config::CaptionSettings;
use crate::core::{CoreError, CoreResult, TimeSec};

use super::models::{normalize_words, CaptionBlock, Word};

const HARD_PUNCTUATION: &[char] = &['.', '!', '?', '…'];
const SOFT_PUNCTUATION: &[char] = &[',', ';', ':'];

/// Word-to-block grouping with configurable thresholds
#[derive(Debug, Clone)]
pub struct CaptionChunker {
    settings: CaptionSettings,
}

impl CaptionChunker {
    pub fn new(settings: CaptionSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &CaptionSettings {
        &self.settings
    }

    /// Groups aligned words into caption blocks.
    ///
    /// Words are normalized first (sorted, empty tokens dropped). Returns an empty
    /// timeline for empty input; callers fall back to [`Self::chunk_text`].
    pub fn chunk_words(&self, words: &[Word]) -> Vec<CaptionBlock> {
        let words = normalize_words(words.to_vec());
        let mut blocks = Vec::new();
        let mut buffer: Vec<&Word> = Vec::new();

        for (i, word) in words.iter().enumerate() {
            if let Some(prev) = buffer.last() {
                if word.start - prev.end >= self.settings.hard_gap_sec {
                    self.flush(&mut buffer, &mut blocks, true);
                }
            }

            buffer.push(word);
            let count = buffer.len();
            let terminal = word.terminal_char();

            if count >= self.settings.max_words {
                self.flush(&mut buffer, &mut blocks, true);
                continue;
            }

            let reached_min = count >= self.settings.min_words;
            if reached_min && terminal.is_some_and(|c| HARD_PUNCTUATION.contains(&c)) {
                self.flush(&mut buffer, &mut blocks, true);
                continue;
            }

            if buffer_span(&buffer) >= self.settings.max_dur_sec {
                self.flush(&mut buffer, &mut blocks, false);
                continue;
            }

            if reached_min {
                let gap_to_next = words.get(i + 1).map(|next| next.start - word.end);
                let soft_gap = gap_to_next.is_some_and(|g| g >= self.settings.soft_gap_sec);
                let soft_punct = terminal.is_some_and(|c| SOFT_PUNCTUATION.contains(&c));
                if soft_gap || soft_punct {
                    self.flush(&mut buffer, &mut blocks, true);
                }
            }
        }

        self.flush(&mut buffer, &mut blocks, true);
        debug!("Chunked {} words into {} caption blocks", words.len(), blocks.len());
        blocks
    }

    /// Splits raw text into synthetic, evenly spaced blocks.
    ///
    /// Chunks hold 3 tokens, or 2 when any token reaches `long_token_chars`. With a
    /// duration hint the chunks spread across it; otherwise each lasts
    /// `fallback_chunk_sec`.
    pub fn chunk_text(
        &self,
        text: &str,
        duration_hint: Option<TimeSec>,
    ) -> CoreResult<Vec<CaptionBlock>> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.is_empty() {
            return Err(CoreError::EmptyScript);
        }

        let has_long_token = tokens
            .iter()
            .any(|t| t.chars().count() >= self.settings.long_token_chars);
        let base_size: usize = if has_long_token { 2 } else { 3 };
        let chunk_size = base_size.min(self.settings.max_words).max(1);
        let chunks: Vec<String> = tokens.chunks(chunk_size).map(|c| c.join(" ")).collect();

        let n = chunks.len() as f64;
        let gap = self.settings.fallback_gap_sec;
        let per_chunk = match duration_hint.filter(|h| h.is_finite() && *h > 0.0) {
            Some(hint) => ((hint - gap * (n - 1.0)) / n)
                .clamp(self.settings.min_dur_sec, self.settings.max_dur_sec),
            None => self.settings.fallback_chunk_sec,
        };

        let blocks: Vec<CaptionBlock> = chunks
            .into_iter()
            .enumerate()
            .map(|(k, text)| {
                let start = k as f64 * (per_chunk + gap);
                CaptionBlock::new(k + 1, start, start + per_chunk, text)
            })
            .collect();

        debug!(
            "Heuristic captions: {} tokens -> {} blocks of {:.3}s",
            tokens.len(),
            blocks.len(),
            per_chunk
        );
        Ok(blocks)
    }

    fn flush(&self, buffer: &mut Vec<&Word>, blocks: &mut Vec<CaptionBlock>, force: bool) {
        let (Some(first), Some(last)) = (buffer.first(), buffer.last()) else {
            return;
        };

        let start = first.start;
        let mut end = last.end;
        if force {
            end = end.max(start + self.settings.min_dur_sec);
        }
        let text = buffer
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        blocks.push(CaptionBlock::new(blocks.len() + 1, start, end, text));
        buffer.clear();
    }
}

impl Default for CaptionChunker {
    fn default() -> Self {
        Self::new(CaptionSettings::default())
    }
}

fn buffer_span(buffer: &[&Word]) -> TimeSec {
    match (buffer.first(), buffer.last()) {
        (Some(first), Some(last)) => last.end - first.start,
        _ => 0.0,
    }
}
