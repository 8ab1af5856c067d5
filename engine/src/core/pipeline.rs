//! Short video pipeline.
//!
//! Stateless orchestration of one request:
//! probe audio → resolve captions → stage images → plan → render.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::audio::AudioTrack;
use crate::core::captions::{
    AlignmentRequest, CaptionChunker, CaptionOutcome, CaptionSourceChain, CaptionStyle,
    CaptionTimelineFixer, PrecomputedWordsAligner, WhisperAligner, WordAligner,
};
use crate::core::composition::{CompositionInput, CompositionPlan, CompositionPlanner, PlanWarning};
use crate::core::config::ComposerConfig;
use crate::core::ffmpeg::{detect_ffmpeg, FFmpegError, FFmpegRunner, MediaProbe};
use crate::core::motion::MotionChoice;
use crate::core::render::{FfmpegRenderInvoker, RenderInvoker, RenderReport};
use crate::core::staging::{ImageStager, StagingSession};
use crate::core::{CoreError, CoreResult};

/// One short video to produce
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortVideoRequest {
    pub images: Vec<PathBuf>,
    #[serde(default)]
    pub motion: MotionChoice,
    /// Narration script; also the heuristic caption source
    #[serde(default)]
    pub script: String,
    /// Precomputed word timings (JSON)
    #[serde(default)]
    pub words_file: Option<PathBuf>,
    #[serde(default)]
    pub narration_audio: Option<PathBuf>,
    #[serde(default)]
    pub background_audio: Option<PathBuf>,
    pub output_path: PathBuf,
    #[serde(default)]
    pub caption_style: Option<CaptionStyle>,
}

/// A plan together with the staged images it references
#[derive(Debug)]
pub struct PreparedComposition {
    pub plan: CompositionPlan,
    /// `None` when captions were dropped
    pub captions: Option<CaptionOutcome>,
    staging: StagingSession,
}

impl PreparedComposition {
    /// Directory holding the staged images; removed when this value drops
    pub fn staging_dir(&self) -> &Path {
        self.staging.dir()
    }

    pub fn staging(&self) -> &StagingSession {
        &self.staging
    }
}

/// Runs requests against a fixed configuration
pub struct VideoPipeline {
    config: ComposerConfig,
    probe: MediaProbe,
    aligners: Vec<Arc<dyn WordAligner>>,
    invoker: Option<Arc<dyn RenderInvoker>>,
}

impl VideoPipeline {
    /// Pipeline without FFmpeg: WAV-only probing, no aligners, no renderer
    pub fn new(config: ComposerConfig) -> Self {
        Self {
            config,
            probe: MediaProbe::default(),
            aligners: Vec::new(),
            invoker: None,
        }
    }

    /// Detects FFmpeg and wires the probe, renderer, and (when compiled in)
    /// the Whisper aligner. Missing FFmpeg leaves a planning-only pipeline.
    pub fn from_config(config: ComposerConfig) -> Self {
        let mut pipeline = Self::new(config);
        match detect_ffmpeg(&pipeline.config.render) {
            Ok(info) => {
                info!("Using FFmpeg {} at {}", info.version, info.ffmpeg_path.display());
                let runner = FFmpegRunner::new(info);
                if crate::core::captions::is_whisper_available() {
                    let aligner = WhisperAligner::from_settings(
                        &pipeline.config.alignment,
                        runner.ffmpeg_path().to_path_buf(),
                    );
                    pipeline.aligners.push(Arc::new(aligner));
                }
                let invoker = FfmpegRenderInvoker::new(runner.clone(), &pipeline.config.render);
                pipeline.probe = MediaProbe::new(Some(runner));
                pipeline.invoker = Some(Arc::new(invoker));
            }
            Err(e) => warn!("FFmpeg unavailable ({}); rendering disabled", e),
        }
        pipeline
    }

    pub fn with_probe(mut self, probe: MediaProbe) -> Self {
        self.probe = probe;
        self
    }

    /// Adds an aligner tried after a request's words file
    pub fn with_aligner(mut self, aligner: Arc<dyn WordAligner>) -> Self {
        self.aligners.push(aligner);
        self
    }

    pub fn with_invoker(mut self, invoker: Arc<dyn RenderInvoker>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// FFmpeg runner found by [`Self::from_config`], if any
    pub fn runner(&self) -> Option<&FFmpegRunner> {
        self.probe.runner()
    }

    pub async fn probe_audio(&self, path: &Path) -> CoreResult<AudioTrack> {
        let duration = self.probe.probe_duration(path).await?;
        Ok(AudioTrack::new(path, duration))
    }

    /// Probes an optional audio source; unusable sources are dropped with a warning.
    async fn probe_track(
        &self,
        path: Option<&Path>,
        warnings: &mut Vec<PlanWarning>,
    ) -> CoreResult<Option<AudioTrack>> {
        let Some(path) = path else {
            return Ok(None);
        };
        match self.probe_audio(path).await {
            Ok(track) => Ok(Some(track)),
            Err(e) if e.is_recoverable() => {
                warn!("Dropping audio {}: {}", path.display(), e);
                warnings.push(PlanWarning::AudioSourceDropped {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                });
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Resolves the caption timeline: words file, configured aligners, then the
    /// heuristic split spread over the narration.
    pub async fn resolve_captions(
        &self,
        script: &str,
        words_file: Option<&Path>,
        narration: Option<&AudioTrack>,
    ) -> CoreResult<CaptionOutcome> {
        let fixer = CaptionTimelineFixer::from_settings(&self.config.captions)?;
        let mut chain = CaptionSourceChain::new(
            CaptionChunker::new(self.config.captions.clone()),
            fixer,
            Duration::from_secs(self.config.alignment.timeout_sec),
        );
        if let Some(path) = words_file {
            chain = chain.with_aligner(Arc::new(PrecomputedWordsAligner::new(path)));
        }
        for aligner in &self.aligners {
            chain = chain.with_aligner(aligner.clone());
        }
        chain = chain.with_heuristic();

        let request = AlignmentRequest {
            audio_path: narration.map(|t| t.path.clone()),
            script: script.to_string(),
        };
        chain.resolve(&request, narration.map(|t| t.duration)).await
    }

    /// Everything up to rendering. The returned value keeps staged images alive.
    pub async fn plan_only(&self, request: &ShortVideoRequest) -> CoreResult<PreparedComposition> {
        let mut warnings = Vec::new();
        let voice = self
            .probe_track(request.narration_audio.as_deref(), &mut warnings)
            .await?;
        let background = self
            .probe_track(request.background_audio.as_deref(), &mut warnings)
            .await?;

        let captions = match self
            .resolve_captions(&request.script, request.words_file.as_deref(), voice.as_ref())
            .await
        {
            Ok(outcome) => Some(outcome),
            Err(e) if e.is_recoverable() || matches!(e, CoreError::EmptyScript) => {
                warn!("Rendering without captions: {}", e);
                warnings.push(PlanWarning::CaptionsDropped {
                    reason: e.to_string(),
                });
                None
            }
            Err(e) => return Err(e),
        };

        let staging = ImageStager::new(self.config.render.staging_root.clone())
            .with_limit(self.config.composition.max_slides)
            .stage(&request.images)
            .await?;
        warnings.extend(staging.warnings().iter().cloned());

        let plan = CompositionPlanner::new(&self.config).plan(CompositionInput {
            slides: staging.images().to_vec(),
            captions: captions
                .as_ref()
                .map(|c| c.blocks.clone())
                .unwrap_or_default(),
            voice,
            background,
            motion: request.motion,
            caption_style: request.caption_style.clone(),
            warnings,
        })?;

        Ok(PreparedComposition {
            plan,
            captions,
            staging,
        })
    }

    /// Plans and renders `request` to its output path
    pub async fn compose(&self, request: &ShortVideoRequest) -> CoreResult<RenderReport> {
        let invoker = self
            .invoker
            .clone()
            .ok_or(CoreError::FFmpeg(FFmpegError::NotFound))?;
        let prepared = self.plan_only(request).await?;
        let report = invoker
            .render(&prepared.plan, Some(prepared.staging()), &request.output_path)
            .await?;
        drop(prepared);
        Ok(report)
    }
}
