//! Word alignment seam and the caption source chain.
//!
//! A [`WordAligner`] turns narration into timed words. The [`CaptionSourceChain`]
//! tries its strategies in order (alignment first, heuristic text split last) and
//! returns the first one that yields a non-empty timeline. Alignment failures and
//! timeouts are logged and never fatal while a later strategy remains.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::{CoreError, CoreResult, TimeSec};

use super::chunker::CaptionChunker;
use super::fixer::CaptionTimelineFixer;
use super::models::{normalize_words, CaptionBlock, Word};

// =============================================================================
// Aligner Seam
// =============================================================================

/// Input to a word aligner
#[derive(Debug, Clone, Default)]
pub struct AlignmentRequest {
    /// Narration audio, if any
    pub audio_path: Option<PathBuf>,
    /// Script text the narration reads
    pub script: String,
}

/// Speech-to-text producing ordered, timed words.
#[async_trait]
pub trait WordAligner: Send + Sync {
    /// Short name used in logs and reports
    fn name(&self) -> &str;

    /// Aligns the request. Errors map to [`CoreError::AlignmentUnavailable`].
    async fn align(&self, request: &AlignmentRequest) -> CoreResult<Vec<Word>>;
}

/// Reads words from a JSON file: `[{"start": 0.0, "end": 0.3, "text": "A"}, ...]`.
#[derive(Debug, Clone)]
pub struct PrecomputedWordsAligner {
    path: PathBuf,
}

impl PrecomputedWordsAligner {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parses a JSON word list and normalizes it.
pub fn parse_words_json(raw: &str) -> CoreResult<Vec<Word>> {
    let words: Vec<Word> = serde_json::from_str(raw)?;
    Ok(normalize_words(words))
}

#[async_trait]
impl WordAligner for PrecomputedWordsAligner {
    fn name(&self) -> &str {
        "precomputed"
    }

    async fn align(&self, _request: &AlignmentRequest) -> CoreResult<Vec<Word>> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            CoreError::AlignmentUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        parse_words_json(&raw).map_err(|e| {
            CoreError::AlignmentUnavailable(format!("{}: {}", self.path.display(), e))
        })
    }
}

// =============================================================================
// Strategy Chain
// =============================================================================

/// One step of the caption source chain
#[derive(Clone)]
pub enum CaptionStrategy {
    Alignment(Arc<dyn WordAligner>),
    Heuristic,
}

impl std::fmt::Debug for CaptionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alignment(aligner) => write!(f, "Alignment({})", aligner.name()),
            Self::Heuristic => write!(f, "Heuristic"),
        }
    }
}

/// Which strategy produced a timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum CaptionSourceKind {
    Aligned { aligner: String },
    Heuristic,
}

/// Result of resolving captions
#[derive(Debug, Clone)]
pub struct CaptionOutcome {
    pub source: CaptionSourceKind,
    /// Aligned words (empty for heuristic captions)
    pub words: Vec<Word>,
    /// Repaired caption timeline
    pub blocks: Vec<CaptionBlock>,
}

/// Ordered caption strategies with a shared chunker and fixer
#[derive(Debug, Clone)]
pub struct CaptionSourceChain {
    strategies: Vec<CaptionStrategy>,
    chunker: CaptionChunker,
    fixer: CaptionTimelineFixer,
    timeout: Duration,
}

impl CaptionSourceChain {
    pub fn new(chunker: CaptionChunker, fixer: CaptionTimelineFixer, timeout: Duration) -> Self {
        Self {
            strategies: Vec::new(),
            chunker,
            fixer,
            timeout,
        }
    }

    /// Appends an aligner ahead of any later strategies.
    pub fn with_aligner(mut self, aligner: Arc<dyn WordAligner>) -> Self {
        self.strategies.push(CaptionStrategy::Alignment(aligner));
        self
    }

    /// Appends the heuristic text split.
    pub fn with_heuristic(mut self) -> Self {
        self.strategies.push(CaptionStrategy::Heuristic);
        self
    }

    pub fn strategies(&self) -> &[CaptionStrategy] {
        &self.strategies
    }

    /// Runs the chain; the first strategy that yields blocks wins.
    ///
    /// `duration_hint` spreads heuristic captions over the narration length.
    pub async fn resolve(
        &self,
        request: &AlignmentRequest,
        duration_hint: Option<TimeSec>,
    ) -> CoreResult<CaptionOutcome> {
        let mut last_error = None;

        for strategy in &self.strategies {
            match strategy {
                CaptionStrategy::Alignment(aligner) => {
                    match self.try_align(aligner.as_ref(), request).await {
                        Ok(outcome) => return Ok(outcome),
                        Err(e) => {
                            warn!("Caption strategy '{}' failed: {}", aligner.name(), e);
                            last_error = Some(e);
                        }
                    }
                }
                CaptionStrategy::Heuristic => {
                    match self.chunker.chunk_text(&request.script, duration_hint) {
                        Ok(raw) => {
                            let blocks = self.fixer.fix(&raw);
                            info!("Using heuristic captions ({} blocks)", blocks.len());
                            return Ok(CaptionOutcome {
                                source: CaptionSourceKind::Heuristic,
                                words: Vec::new(),
                                blocks,
                            });
                        }
                        Err(e) => last_error = Some(e),
                    }
                }
            }
        }

        Err(last_error.unwrap_or(CoreError::EmptyScript))
    }

    async fn try_align(
        &self,
        aligner: &dyn WordAligner,
        request: &AlignmentRequest,
    ) -> CoreResult<CaptionOutcome> {
        let words = tokio::time::timeout(self.timeout, aligner.align(request))
            .await
            .map_err(|_| {
                CoreError::Timeout(format!(
                    "alignment '{}' exceeded {:?}",
                    aligner.name(),
                    self.timeout
                ))
            })??;

        let raw = self.chunker.chunk_words(&words);
        if raw.is_empty() {
            return Err(CoreError::AlignmentUnavailable(format!(
                "aligner '{}' returned no words",
                aligner.name()
            )));
        }

        let blocks = self.fixer.fix(&raw);
        debug!(
            "Aligner '{}' produced {} words, {} blocks",
            aligner.name(),
            words.len(),
            blocks.len()
        );
        Ok(CaptionOutcome {
            source: CaptionSourceKind::Aligned {
                aligner: aligner.name().to_string(),
            },
            words,
            blocks,
        })
    }
}
