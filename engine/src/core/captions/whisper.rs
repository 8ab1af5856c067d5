//! Whisper Word Alignment
//!
//! Word-level timestamps from whisper.cpp via whisper-rs. Segments are limited to a
//! single word (`max_len = 1` with word splitting), so every segment maps to one
//! [`Word`]. The engine is compiled only with the `whisper` feature; without it the
//! aligner reports itself unavailable and the caption chain falls through.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use super::alignment::{AlignmentRequest, WordAligner};
use super::audio;
use super::models::Word;
use crate::core::config::AlignmentSettings;
use crate::core::{CoreError, CoreResult};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during alignment
#[derive(Error, Debug)]
pub enum WhisperError {
    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    #[error("Failed to load model: {0}")]
    ModelLoadError(String),

    #[error("Failed to read audio: {0}")]
    AudioReadError(String),

    #[error("Transcription failed: {0}")]
    TranscriptionError(String),

    #[error("Whisper feature not enabled. Rebuild with --features whisper")]
    FeatureNotEnabled,
}

/// Result type for whisper operations
pub type WhisperResult<T> = Result<T, WhisperError>;

impl From<WhisperError> for CoreError {
    fn from(e: WhisperError) -> Self {
        CoreError::AlignmentUnavailable(e.to_string())
    }
}

// =============================================================================
// Models and Options
// =============================================================================

/// Available Whisper model sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhisperModel {
    Tiny,
    #[default]
    Base,
    Small,
    Medium,
    Large,
}

impl WhisperModel {
    /// Returns the filename for this model size
    pub fn filename(&self) -> &'static str {
        match self {
            WhisperModel::Tiny => "ggml-tiny.bin",
            WhisperModel::Base => "ggml-base.bin",
            WhisperModel::Small => "ggml-small.bin",
            WhisperModel::Medium => "ggml-medium.bin",
            WhisperModel::Large => "ggml-large.bin",
        }
    }
}

impl std::str::FromStr for WhisperModel {
    type Err = WhisperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tiny" => Ok(WhisperModel::Tiny),
            "base" => Ok(WhisperModel::Base),
            "small" => Ok(WhisperModel::Small),
            "medium" => Ok(WhisperModel::Medium),
            "large" => Ok(WhisperModel::Large),
            _ => Err(WhisperError::ModelLoadError(format!(
                "Unknown model size: {}",
                s
            ))),
        }
    }
}

/// Inference options
#[derive(Debug, Clone)]
pub struct AlignmentOptions {
    /// Language code or "auto"
    pub language: String,
    /// Number of threads (0 = all cores)
    pub threads: u32,
    /// Script text used as the initial prompt
    pub initial_prompt: Option<String>,
}

impl Default for AlignmentOptions {
    fn default() -> Self {
        Self {
            language: "auto".to_string(),
            threads: 0,
            initial_prompt: None,
        }
    }
}

impl AlignmentOptions {
    fn effective_threads(&self) -> u32 {
        if self.threads > 0 {
            self.threads
        } else {
            num_cpus::get().clamp(1, 8) as u32
        }
    }
}

// =============================================================================
// Engine - Feature-gated Implementation
// =============================================================================

#[cfg(feature = "whisper")]
mod engine_impl {
    use super::*;
    use crate::core::captions::models::normalize_words;
    use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

    /// Whisper context producing word-level segments
    pub struct WhisperWordEngine {
        context: WhisperContext,
    }

    impl WhisperWordEngine {
        pub fn new(model_path: &Path) -> WhisperResult<Self> {
            if !model_path.exists() {
                return Err(WhisperError::ModelNotFound(
                    model_path.to_string_lossy().to_string(),
                ));
            }

            let params = WhisperContextParameters::default();
            let context =
                WhisperContext::new_with_params(model_path.to_str().unwrap_or_default(), params)
                    .map_err(|e| WhisperError::ModelLoadError(e.to_string()))?;

            Ok(Self { context })
        }

        /// Transcribes 16kHz mono samples into timed words
        pub fn transcribe_words(
            &self,
            samples: &[f32],
            options: &AlignmentOptions,
        ) -> WhisperResult<Vec<Word>> {
            let mut state = self
                .context
                .create_state()
                .map_err(|e| WhisperError::TranscriptionError(e.to_string()))?;

            let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
            if options.language != "auto" {
                params.set_language(Some(&options.language));
            }
            params.set_print_progress(false);
            params.set_print_realtime(false);
            params.set_print_timestamps(false);
            params.set_n_threads(options.effective_threads() as i32);
            params.set_token_timestamps(true);
            params.set_split_on_word(true);
            params.set_max_len(1);
            if let Some(ref prompt) = options.initial_prompt {
                params.set_initial_prompt(prompt);
            }

            state
                .full(params, samples)
                .map_err(|e| WhisperError::TranscriptionError(e.to_string()))?;

            let num_segments = state
                .full_n_segments()
                .map_err(|e| WhisperError::TranscriptionError(e.to_string()))?;

            let mut words = Vec::with_capacity(num_segments as usize);
            for i in 0..num_segments {
                // Segment times are in centiseconds
                let start = state
                    .full_get_segment_t0(i)
                    .map_err(|e| WhisperError::TranscriptionError(e.to_string()))?
                    as f64
                    / 100.0;
                let end = state
                    .full_get_segment_t1(i)
                    .map_err(|e| WhisperError::TranscriptionError(e.to_string()))?
                    as f64
                    / 100.0;
                let text = state
                    .full_get_segment_text(i)
                    .map_err(|e| WhisperError::TranscriptionError(e.to_string()))?;

                words.push(Word::new(start, end, &text));
            }

            Ok(normalize_words(words))
        }
    }
}

#[cfg(feature = "whisper")]
pub use engine_impl::WhisperWordEngine;

// =============================================================================
// Stub Implementation (when whisper feature is disabled)
// =============================================================================

#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperWordEngine;

#[cfg(not(feature = "whisper"))]
impl WhisperWordEngine {
    pub fn new(_model_path: &Path) -> WhisperResult<Self> {
        Err(WhisperError::FeatureNotEnabled)
    }

    pub fn transcribe_words(
        &self,
        _samples: &[f32],
        _options: &AlignmentOptions,
    ) -> WhisperResult<Vec<Word>> {
        Err(WhisperError::FeatureNotEnabled)
    }
}

// =============================================================================
// Aligner
// =============================================================================

/// [`WordAligner`] backed by a local Whisper model
#[derive(Debug, Clone)]
pub struct WhisperAligner {
    model_path: PathBuf,
    ffmpeg_path: PathBuf,
    options: AlignmentOptions,
}

impl WhisperAligner {
    pub fn new(model_path: PathBuf, ffmpeg_path: PathBuf, options: AlignmentOptions) -> Self {
        Self {
            model_path,
            ffmpeg_path,
            options,
        }
    }

    /// Builds an aligner from settings, defaulting to the base model in the
    /// shared models directory.
    pub fn from_settings(settings: &AlignmentSettings, ffmpeg_path: PathBuf) -> Self {
        let model_path = settings
            .model_path
            .clone()
            .unwrap_or_else(|| default_models_dir().join(WhisperModel::Base.filename()));
        Self::new(
            model_path,
            ffmpeg_path,
            AlignmentOptions {
                language: settings.language.clone(),
                threads: settings.threads,
                initial_prompt: None,
            },
        )
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

#[async_trait]
impl WordAligner for WhisperAligner {
    fn name(&self) -> &str {
        "whisper"
    }

    async fn align(&self, request: &AlignmentRequest) -> CoreResult<Vec<Word>> {
        if !is_whisper_available() {
            return Err(WhisperError::FeatureNotEnabled.into());
        }
        let audio_path = request.audio_path.as_ref().ok_or_else(|| {
            CoreError::AlignmentUnavailable("no narration audio to align".to_string())
        })?;
        if !self.model_path.exists() {
            return Err(
                WhisperError::ModelNotFound(self.model_path.display().to_string()).into(),
            );
        }

        // The temp dir lives until alignment finishes
        let scratch = tempfile::Builder::new().prefix("reelcast-align").tempdir()?;
        let wav_path = scratch.path().join("narration-16k.wav");
        audio::extract_for_alignment(&self.ffmpeg_path, audio_path, &wav_path)
            .await
            .map_err(|e| WhisperError::AudioReadError(e.to_string()))?;

        let model_path = self.model_path.clone();
        let mut options = self.options.clone();
        if !request.script.trim().is_empty() {
            options.initial_prompt = Some(request.script.clone());
        }

        info!("Aligning {} with {}", audio_path.display(), model_path.display());
        let words = tokio::task::spawn_blocking(move || -> WhisperResult<Vec<Word>> {
            let samples = audio::load_audio_samples(&wav_path)
                .map_err(|e| WhisperError::AudioReadError(e.to_string()))?;
            let engine = WhisperWordEngine::new(&model_path)?;
            engine.transcribe_words(&samples, &options)
        })
        .await
        .map_err(|e| CoreError::Internal(format!("alignment task failed: {}", e)))??;

        debug!("Whisper produced {} words", words.len());
        drop(scratch);
        Ok(words)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Checks if whisper alignment is compiled in
pub fn is_whisper_available() -> bool {
    cfg!(feature = "whisper")
}

/// Returns the default model directory
pub fn default_models_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("reelcast")
        .join("models")
        .join("whisper")
}
