//! `reelcast` command line interface.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use reelcast_lib::core::captions::{export_srt, CaptionStyle};
use reelcast_lib::core::config::{ComposerConfig, ConfigOption};
use reelcast_lib::core::fs::{atomic_write_bytes, atomic_write_json_pretty};
use reelcast_lib::core::motion::MotionChoice;
use reelcast_lib::core::pipeline::{ShortVideoRequest, VideoPipeline};
use reelcast_lib::core::render::{FfmpegRenderInvoker, RenderProgress};

#[derive(Parser, Debug)]
#[command(name = "reelcast")]
#[command(about = "Compose caption-synchronized vertical short videos", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override a configuration option (repeatable), e.g. `--set motion.fps=25`
    #[arg(long = "set", value_name = "KEY=VALUE", global = true)]
    overrides: Vec<String>,

    /// Also write daily rolling log files to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a short video
    Render {
        #[command(flatten)]
        input: InputArgs,

        /// Output video path
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print or save the composition plan without rendering
    Plan {
        #[command(flatten)]
        input: InputArgs,

        /// Write the plan JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the filter_complex script here
        #[arg(long)]
        graph_script: Option<PathBuf>,
    },
    /// Resolve captions and print them as SRT
    Captions {
        #[command(flatten)]
        script: ScriptArgs,

        /// Narration audio; spreads heuristic captions over its length
        #[arg(long)]
        narration: Option<PathBuf>,

        /// Write the SRT here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List recognized `--set` keys
    Options,
}

#[derive(Args, Debug)]
struct ScriptArgs {
    /// Narration script text
    #[arg(long, conflicts_with = "script_file")]
    script: Option<String>,

    /// File containing the narration script
    #[arg(long)]
    script_file: Option<PathBuf>,

    /// Precomputed word timings: `[{"start":0.0,"end":0.3,"text":"A"}, ...]`
    #[arg(long)]
    words: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Slide image (repeatable, in display order)
    #[arg(short, long = "image", required = true)]
    images: Vec<PathBuf>,

    #[command(flatten)]
    script: ScriptArgs,

    #[arg(long)]
    narration: Option<PathBuf>,

    /// Background music; looped to the video length
    #[arg(long)]
    background: Option<PathBuf>,

    /// `cycle`, `random`, `random:<seed>`, or a motion kind such as `kenBurnsIn`
    #[arg(long, default_value = "cycle")]
    motion: MotionChoice,

    /// Caption style JSON overriding the configured style
    #[arg(long)]
    caption_style: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.log_dir.as_deref())?;

    let config = load_config(cli.config.as_deref(), &cli.overrides)?;

    match cli.command {
        Command::Render { input, output } => render(config, input, output).await,
        Command::Plan {
            input,
            output,
            graph_script,
        } => plan(config, input, output, graph_script).await,
        Command::Captions {
            script,
            narration,
            output,
        } => captions(config, script, narration, output).await,
        Command::Options => {
            for option in ConfigOption::ALL {
                println!("{}", option.key());
            }
            Ok(())
        }
    }
}

/// Installs stderr logging plus an optional daily file layer.
///
/// The returned guard flushes the file writer on drop.
fn init_logging(
    log_dir: Option<&Path>,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log dir {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "reelcast.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install logger")?;
    Ok(guard)
}

fn load_config(path: Option<&Path>, overrides: &[String]) -> anyhow::Result<ComposerConfig> {
    let mut config = match path {
        Some(path) => ComposerConfig::load(path)?,
        None => ComposerConfig::default(),
    };
    for assignment in overrides {
        config
            .apply_assignment(assignment)
            .with_context(|| format!("Invalid --set '{}'", assignment))?;
    }
    Ok(config)
}

async fn read_script(args: &ScriptArgs) -> anyhow::Result<String> {
    match (&args.script, &args.script_file) {
        (Some(text), _) => Ok(text.clone()),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read script {}", path.display())),
        (None, None) => Ok(String::new()),
    }
}

async fn build_request(input: InputArgs, output_path: PathBuf) -> anyhow::Result<ShortVideoRequest> {
    let script = read_script(&input.script).await?;
    if script.trim().is_empty() && input.script.words.is_none() {
        warn!("No script or words file given; the video will have no captions");
    }

    let caption_style = match &input.caption_style {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read caption style {}", path.display()))?;
            let mut style: CaptionStyle = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid caption style {}", path.display()))?;
            style.normalize();
            Some(style)
        }
        None => None,
    };

    Ok(ShortVideoRequest {
        images: input.images,
        motion: input.motion,
        script,
        words_file: input.script.words,
        narration_audio: input.narration,
        background_audio: input.background,
        output_path,
        caption_style,
    })
}

async fn render(config: ComposerConfig, input: InputArgs, output: PathBuf) -> anyhow::Result<()> {
    let request = build_request(input, output).await?;
    let mut pipeline = VideoPipeline::from_config(config);

    let Some(runner) = pipeline.runner().cloned() else {
        bail!("FFmpeg not found. Install FFmpeg or set render.ffmpegPath.");
    };
    let (tx, mut rx) = mpsc::channel::<RenderProgress>(64);
    let invoker = FfmpegRenderInvoker::new(runner, &pipeline.config().render).with_progress(tx);
    pipeline = pipeline.with_invoker(Arc::new(invoker));

    let progress = tokio::spawn(async move {
        let mut last_step = None;
        while let Some(event) = rx.recv().await {
            let step = (event.percent / 10.0).floor() as u32;
            if last_step != Some(step) {
                last_step = Some(step);
                info!(
                    "{:5.1}% {} (eta {}s)",
                    event.percent, event.message, event.eta_seconds
                );
            }
        }
    });

    let result = pipeline.compose(&request).await;
    drop(pipeline);
    let _ = progress.await;
    let report = result?;

    for warning in &report.warnings {
        warn!("{:?}", warning);
    }
    info!(
        "Wrote {} ({:.2}s, {} slides, {} captions, {:.1}s encoding)",
        report.output_path.display(),
        report.actual_duration,
        report.slide_count,
        report.caption_count,
        report.encoding_time_sec
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn plan(
    config: ComposerConfig,
    input: InputArgs,
    output: Option<PathBuf>,
    graph_script: Option<PathBuf>,
) -> anyhow::Result<()> {
    let request = build_request(input, PathBuf::from("reelcast.mp4")).await?;
    let pipeline = VideoPipeline::from_config(config);
    let prepared = pipeline.plan_only(&request).await?;

    if let Some(path) = graph_script {
        atomic_write_bytes(&path, prepared.plan.filter_complex().as_bytes())?;
        info!("Wrote filter graph to {}", path.display());
    }
    match output {
        Some(path) => {
            atomic_write_json_pretty(&path, &prepared.plan)?;
            info!("Wrote plan to {}", path.display());
        }
        None => println!("{}", prepared.plan.to_json_pretty()?),
    }
    Ok(())
}

async fn captions(
    config: ComposerConfig,
    script: ScriptArgs,
    narration: Option<PathBuf>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let text = read_script(&script).await?;
    let pipeline = VideoPipeline::from_config(config);

    let narration = match narration {
        Some(path) => Some(pipeline.probe_audio(&path).await?),
        None => None,
    };
    let outcome = pipeline
        .resolve_captions(&text, script.words.as_deref(), narration.as_ref())
        .await?;
    info!("{} caption blocks from {:?}", outcome.blocks.len(), outcome.source);

    let srt = export_srt(&outcome.blocks);
    match output {
        Some(path) => atomic_write_bytes(&path, srt.as_bytes())?,
        None => print!("{}", srt),
    }
    Ok(())
}
