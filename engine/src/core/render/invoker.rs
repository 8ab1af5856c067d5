//! Render invocation.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::sync::mpsc::Sender;
use tracing::{debug, error, info, warn};

use super::progress::{parse_progress_line, progress_from_state, ProgressState, RenderProgress};
use crate::core::audio::AudioMode;
use crate::core::composition::{CompositionPlan, PlanWarning};
use crate::core::config::RendererSettings;
use crate::core::ffmpeg::FFmpegRunner;
use crate::core::fs::{
    atomic_replace, atomic_write_json_pretty, remove_file_if_exists, unique_sibling_path,
    with_appended_suffix,
};
use crate::core::graph::num;
use crate::core::process::tool_command;
use crate::core::staging::StagingSession;
use crate::core::{frames_for, CoreError, CoreResult, TimeSec};

/// Filter graphs longer than this go through `-filter_complex_script`
const INLINE_FILTER_LIMIT: usize = 30_000;

/// Stderr lines kept for failure messages
const STDERR_TAIL_LINES: usize = 20;

/// Summary of a finished render
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderReport {
    pub output_path: PathBuf,
    pub planned_duration: TimeSec,
    /// Duration probed from the written file
    pub actual_duration: TimeSec,
    pub file_size: u64,
    pub encoding_time_sec: f64,
    pub slide_count: usize,
    pub caption_count: usize,
    pub audio_mode: AudioMode,
    pub warnings: Vec<PlanWarning>,
    pub finished_at: DateTime<Utc>,
}

/// Executes composition plans. One attempt per call; no retries.
///
/// The plan references source images; when `staging` is given, its copies are
/// read instead. A plan persisted on failure keeps the source paths.
#[async_trait]
pub trait RenderInvoker: Send + Sync {
    async fn render(
        &self,
        plan: &CompositionPlan,
        staging: Option<&StagingSession>,
        output: &Path,
    ) -> CoreResult<RenderReport>;
}

/// Where the filter graph is passed to FFmpeg
enum FilterSource {
    Inline(String),
    Script(PathBuf),
}

/// FFmpeg-backed [`RenderInvoker`]
#[derive(Clone, Debug)]
pub struct FfmpegRenderInvoker {
    runner: FFmpegRunner,
    tolerance: TimeSec,
    inline_limit: usize,
    progress: Option<Sender<RenderProgress>>,
}

impl FfmpegRenderInvoker {
    pub fn new(runner: FFmpegRunner, settings: &RendererSettings) -> Self {
        Self {
            runner,
            tolerance: settings.duration_tolerance_sec,
            inline_limit: INLINE_FILTER_LIMIT,
            progress: None,
        }
    }

    /// Sends progress events to `tx` during each render
    pub fn with_progress(mut self, tx: Sender<RenderProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Graphs longer than `limit` characters are written to a script file
    pub fn with_inline_limit(mut self, limit: usize) -> Self {
        self.inline_limit = limit;
        self
    }

    fn build_args(
        &self,
        plan: &CompositionPlan,
        staging: Option<&StagingSession>,
        filter: &FilterSource,
        target: &Path,
    ) -> Vec<OsString> {
        let out = &plan.output;
        let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-y", "-loglevel", "error"]
            .into_iter()
            .map(OsString::from)
            .collect();

        args.extend(plan.graph.input_args_with(|path| {
            staging
                .and_then(|s| s.staged_path(path))
                .unwrap_or(path)
                .to_path_buf()
        }));

        match filter {
            FilterSource::Inline(graph) => {
                args.push("-filter_complex".into());
                args.push(graph.into());
            }
            FilterSource::Script(path) => {
                args.push("-filter_complex_script".into());
                args.push(path.clone().into_os_string());
            }
        }
        args.extend(plan.graph.map_args().into_iter().map(OsString::from));

        let mut push = |flag: &str, value: String| {
            args.push(flag.into());
            args.push(value.into());
        };
        push("-c:v", out.video_codec.clone());
        if out.video_codec.starts_with("libx26") {
            push("-preset", out.preset.clone());
            push("-crf", out.crf.to_string());
        }
        push("-pix_fmt", out.pixel_format.clone());
        push("-r", out.fps.to_string());
        push("-c:a", out.audio_codec.clone());
        push("-b:a", out.audio_bitrate.clone());
        push("-ar", plan.audio_mix.sample_rate.to_string());
        push("-t", num(plan.total_duration));
        push("-movflags", "+faststart".to_string());
        if target.extension().is_none() {
            push("-f", "mp4".to_string());
        }
        push("-progress", "pipe:1".to_string());

        args.push("-nostats".into());
        args.push(target.as_os_str().to_os_string());
        args
    }

    /// Runs FFmpeg to completion; `Err` carries the tail of stderr.
    async fn run_ffmpeg(&self, args: &[OsString], duration: TimeSec, fps: u32) -> Result<(), String> {
        let total_frames = frames_for(duration, fps);

        let mut child = tool_command(self.runner.ffmpeg_path())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("Failed to spawn FFmpeg: {}", e))?;

        // Drain stderr concurrently so a full pipe never stalls FFmpeg
        let stderr_handle = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf).await;
                String::from_utf8_lossy(&buf).to_string()
            })
        });

        if let Some(tx) = &self.progress {
            let _ = tx.send(RenderProgress::started(total_frames)).await;
        }

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            let mut state = ProgressState::default();
            while let Ok(Some(line)) = lines.next_line().await {
                if !parse_progress_line(&line, &mut state) {
                    continue;
                }
                if let Some(tx) = &self.progress {
                    // A closed receiver only stops reporting, not the render
                    let _ = tx
                        .send(progress_from_state(&state, duration, total_frames))
                        .await;
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| format!("Failed to wait for FFmpeg: {}", e))?;
        let stderr = match stderr_handle {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            let tail: Vec<&str> = stderr
                .lines()
                .filter(|l| !l.trim().is_empty())
                .collect();
            let start = tail.len().saturating_sub(STDERR_TAIL_LINES);
            let detail = tail[start..].join("\n");
            return Err(if detail.is_empty() {
                format!("FFmpeg exited with status: {}", status)
            } else {
                format!("FFmpeg exited with status {}: {}", status, detail)
            });
        }

        if let Some(tx) = &self.progress {
            let _ = tx.send(RenderProgress::finished(total_frames, duration)).await;
        }
        Ok(())
    }

    /// Writes the plan next to the output for debugging; returns its path.
    fn persist_plan(&self, plan: &CompositionPlan, output: &Path) -> String {
        let path = with_appended_suffix(output, ".plan.json");
        match atomic_write_json_pretty(&path, plan) {
            Ok(()) => info!("Saved failed plan to {}", path.display()),
            Err(e) => error!("Failed to save plan to {}: {}", path.display(), e),
        }
        path.display().to_string()
    }

    fn fail(&self, plan: &CompositionPlan, output: &Path, partial: &Path, message: String) -> CoreError {
        if let Err(e) = remove_file_if_exists(partial) {
            warn!("Failed to remove partial output {}: {}", partial.display(), e);
        }
        error!("Render of {} failed: {}", output.display(), message);
        CoreError::RenderEngineFailure {
            message,
            plan_path: self.persist_plan(plan, output),
        }
    }
}

#[async_trait]
impl RenderInvoker for FfmpegRenderInvoker {
    async fn render(
        &self,
        plan: &CompositionPlan,
        staging: Option<&StagingSession>,
        output: &Path,
    ) -> CoreResult<RenderReport> {
        plan.graph.validate()?;
        let started = Instant::now();

        let parent = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        tokio::fs::create_dir_all(&parent).await?;

        let filter_complex = plan.filter_complex();
        // Held until FFmpeg exits; the script file is removed on drop
        let mut script_file = None;
        let filter = if filter_complex.len() > self.inline_limit {
            let mut file = tempfile::Builder::new()
                .prefix("filter_complex")
                .suffix(".txt")
                .tempfile_in(&parent)?;
            file.write_all(filter_complex.as_bytes())?;
            file.flush()?;
            let path = file.path().to_path_buf();
            script_file = Some(file);
            debug!("Filter graph ({} chars) written to {}", filter_complex.len(), path.display());
            FilterSource::Script(path)
        } else {
            FilterSource::Inline(filter_complex)
        };

        let partial = unique_sibling_path(output, "partial");
        let args = self.build_args(plan, staging, &filter, &partial);
        info!(
            "Rendering {:.3}s ({} slides) to {}",
            plan.total_duration,
            plan.slides.len(),
            output.display()
        );

        let result = self
            .run_ffmpeg(&args, plan.total_duration, plan.output.fps)
            .await;
        drop(script_file);
        if let Err(message) = result {
            return Err(self.fail(plan, output, &partial, message));
        }

        let probed = match self.runner.probe(&partial).await {
            Ok(info) => info,
            Err(e) => {
                return Err(self.fail(
                    plan,
                    output,
                    &partial,
                    format!("output could not be probed: {}", e),
                ))
            }
        };

        let expected = plan.total_duration;
        if probed.duration_sec < expected - self.tolerance {
            remove_file_if_exists(&partial)?;
            let plan_path = self.persist_plan(plan, output);
            error!(
                "Output {} is {:.3}s, expected {:.3}s (plan: {})",
                output.display(),
                probed.duration_sec,
                expected,
                plan_path
            );
            return Err(CoreError::TruncatedOutput {
                expected,
                actual: probed.duration_sec,
            });
        }

        if let Err(e) = atomic_replace(output, &partial) {
            let _ = remove_file_if_exists(&partial);
            return Err(e);
        }

        let file_size = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
        let report = RenderReport {
            output_path: output.to_path_buf(),
            planned_duration: expected,
            actual_duration: probed.duration_sec,
            file_size,
            encoding_time_sec: started.elapsed().as_secs_f64(),
            slide_count: plan.slides.len(),
            caption_count: plan.captions.len(),
            audio_mode: plan.audio_mix.mode,
            warnings: plan.warnings.clone(),
            finished_at: Utc::now(),
        };
        info!(
            "Rendered {} ({:.3}s, {} bytes) in {:.1}s",
            output.display(),
            report.actual_duration,
            report.file_size,
            report.encoding_time_sec
        );
        Ok(report)
    }
}
