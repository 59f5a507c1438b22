use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use layercast::composite::overlay::{OverlayPlacement, StaticOverlay};
use layercast::{
    DocumentSource as _, FfmpegEncoder, JobConfig, JobState, ManifestDocumentSource, RenderInputs,
    RenderJob, StrategyKind, TracingProgress, World,
};

#[derive(Parser, Debug)]
#[command(name = "layercast", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the planned timeline as JSON.
    Plan(PlanArgs),
    /// Render a single instant as a PNG.
    Frame(FrameArgs),
    /// Render an MP4 video (requires `ffmpeg` on PATH).
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct JobArgs {
    /// Layer manifest JSON.
    #[arg(long)]
    manifest: PathBuf,

    /// Job configuration JSON; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct PlanArgs {
    #[command(flatten)]
    job: JobArgs,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    #[command(flatten)]
    job: JobArgs,

    /// Time in seconds.
    #[arg(long)]
    time: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Editor chrome PNG blended over the frame.
    #[arg(long)]
    chrome: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    #[command(flatten)]
    job: JobArgs,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Overrides the configured strategy.
    #[arg(long, value_enum)]
    strategy: Option<StrategyChoice>,

    /// Worker threads for the optimized strategy.
    #[arg(long)]
    workers: Option<usize>,

    /// Editor chrome PNG blended over every frame.
    #[arg(long)]
    chrome: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyChoice {
    Cpu,
    Optimized,
    Gpu,
}

impl From<StrategyChoice> for StrategyKind {
    fn from(c: StrategyChoice) -> Self {
        match c {
            StrategyChoice::Cpu => StrategyKind::Cpu,
            StrategyChoice::Optimized => StrategyKind::Optimized,
            StrategyChoice::Gpu => StrategyKind::Gpu,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Plan(args) => cmd_plan(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Render(args) => cmd_render(args),
    }
}

fn load_job(args: &JobArgs) -> anyhow::Result<(JobConfig, World)> {
    let cfg = match &args.config {
        Some(path) => JobConfig::from_path(path)?,
        None => JobConfig::default(),
    };
    let doc = ManifestDocumentSource
        .load(&args.manifest)
        .with_context(|| format!("load manifest '{}'", args.manifest.display()))?;
    let world = World::from_document(doc)?;
    Ok((cfg, world))
}

fn with_chrome(inputs: RenderInputs, chrome: Option<&Path>) -> anyhow::Result<RenderInputs> {
    Ok(match chrome {
        Some(path) => {
            let overlay = StaticOverlay::from_path(path, OverlayPlacement::Over)?;
            inputs.with_overlay(Arc::new(overlay))
        }
        None => inputs,
    })
}

fn cmd_plan(args: PlanArgs) -> anyhow::Result<()> {
    let (cfg, world) = load_job(&args.job)?;
    let timeline = cfg
        .planner
        .plan(&world)?
        .with_camera_moves(cfg.camera.moves.clone())?;
    let json = serde_json::to_string_pretty(&timeline).context("serialize timeline")?;
    println!("{json}");
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let (cfg, world) = load_job(&args.job)?;
    let inputs = with_chrome(cfg.prepare(world)?, args.chrome.as_deref())?;
    let strategy = cfg.create_strategy()?;
    let compositor = inputs.compositor(strategy.processor())?;
    let frame = layercast::render_still(&compositor, &inputs, args.time)?;
    for id in &frame.diagnostics.missing_assets {
        tracing::warn!(layer = %id, "layer has no raster");
    }

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    frame
        .image
        .to_straight_image()?
        .save_with_format(&args.out, image::ImageFormat::Png)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let (mut cfg, world) = load_job(&args.job)?;
    if let Some(choice) = args.strategy {
        cfg.strategy = choice.into();
    }
    if args.workers.is_some() {
        cfg.optimized.workers = args.workers;
    }
    cfg.validate()?;

    let inputs = with_chrome(cfg.prepare(world)?, args.chrome.as_deref())?;
    let strategy = cfg.create_strategy()?;
    let report = RenderJob::new(inputs, strategy, Arc::new(FfmpegEncoder))
        .with_progress(Arc::new(TracingProgress))
        .with_opts(cfg.render.clone())
        .run(args.out.clone())?;

    match report.state {
        JobState::Completed => eprintln!(
            "wrote {} ({} frames, {} composited, {} reused)",
            args.out.display(),
            report.frames_written,
            report.stats.frames_rendered,
            report.stats.frames_elided + report.stats.frames_skipped,
        ),
        other => anyhow::bail!("render ended in state {other}"),
    }
    Ok(())
}
