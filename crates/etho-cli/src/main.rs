mod batch;
mod config;
mod pipeline;
mod stopwatch;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};

use etho_endpoints::{doctor as endpoints_doctor, report_rows, report_stem};
use etho_grid::doctor as grid_doctor;
use etho_vision::doctor as vision_doctor;

use crate::batch::{log_progress, run_batch, Progress};
use crate::config::{load_config, Config};

#[derive(Debug, Parser)]
#[command(name = "etho", version, about = "EthoGrid - multi-cell behaviour tracking from detection feeds")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the config file.
    Doctor,
    /// Assign cells, keep the top K per cell and write detections, timelines,
    /// centroid tables and heat-map points.
    Process(BatchArgs),
    /// Link sampled centroids into persistent tracks.
    Track(BatchArgs),
    /// Compute per-cell endpoints and write one report for all inputs.
    Analyze(BatchArgs),
}

#[derive(Debug, clap::Args)]
struct BatchArgs {
    /// JSON detection feeds.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    #[arg(long, default_value = ".")]
    out: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Process(args) => process(cfg, args).await?,
        Command::Track(args) => track(cfg, args).await?,
        Command::Analyze(args) => analyze(cfg, args).await?,
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    grid_doctor::check_grid(&cfg.grid_spec(), &cfg.grid.transform, &cfg.video_size())?;
    grid_doctor::check_fps(cfg.video.fps)?;
    vision_doctor::check_filter(cfg.filter.max_animals_per_cell)?;
    vision_doctor::check_tracking(
        cfg.tracking.frame_sample_rate,
        cfg.tracking.time_gap_seconds,
        cfg.tracking.max_distance_fraction,
    )?;
    endpoints_doctor::check_analysis(&cfg.analysis)?;

    let n = cfg.grid_spec().cell_count();
    for key in cfg.analysis.cells.keys() {
        if let Ok(id) = key.parse::<u32>() {
            if id > n {
                warn!("analysis.cells.{} is outside the {}-cell grid", key, n);
            }
        }
    }
    if (cfg.analysis.frame_rate - cfg.video.fps).abs() > 1e-9 {
        warn!("analysis.frame_rate {} differs from video.fps {}", cfg.analysis.frame_rate, cfg.video.fps);
    }

    info!("doctor: OK");
    Ok(())
}

/// Ctrl-C sets the flag; the batch stops before its next file.
fn cancel_on_ctrl_c() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let f = flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing current file");
            f.store(true, Ordering::Relaxed);
        }
    });
    flag
}

async fn run_files<T, F>(args: &BatchArgs, work: F) -> Result<Vec<(PathBuf, T)>>
where
    T: Send + 'static,
    F: Fn(&Path) -> Result<T> + Send + Sync + 'static,
{
    tokio::fs::create_dir_all(&args.out)
        .await
        .with_context(|| format!("create output dir {}", args.out.display()))?;

    let (tx, rx) = mpsc::channel::<Progress>(32);
    let logger = tokio::spawn(log_progress(rx));
    let out = run_batch(args.inputs.clone(), cancel_on_ctrl_c(), tx, work).await;
    let _ = logger.await;
    Ok(out)
}

async fn process(cfg: Config, args: BatchArgs) -> Result<()> {
    let cfg = Arc::new(cfg);
    let out_dir = args.out.clone();
    let done = run_files(&args, move |p| pipeline::process_file(&cfg, p, &out_dir)).await?;

    let kept: usize = done.iter().map(|(_, n)| n).sum();
    info!("process: {} files, {} detections kept", done.len(), kept);
    Ok(())
}

async fn track(cfg: Config, args: BatchArgs) -> Result<()> {
    let cfg = Arc::new(cfg);
    let out_dir = args.out.clone();
    let done = run_files(&args, move |p| pipeline::track_file(&cfg, p, &out_dir)).await?;

    for (path, paths) in &done {
        info!("track: {} -> {} tracks", batch::file_name(path), paths.len());
    }
    Ok(())
}

async fn analyze(cfg: Config, args: BatchArgs) -> Result<()> {
    let cfg = Arc::new(cfg);
    let done = run_files(&args, move |p| pipeline::analyze_file(&cfg, p)).await?;
    anyhow::ensure!(!done.is_empty(), "no input file could be analysed");

    let names: Vec<String> = done.iter().map(|(p, _)| batch::file_name(p)).collect();
    let files: Vec<_> = done.into_iter().map(|(_, r)| r).collect();
    let rows = report_rows(&files);

    let name = format!("{}_endpoints.json", report_stem(&names));
    let path = pipeline::write_json(&args.out, &name, &names.join(","), &rows)?;
    info!("analyze: {} rows written to {}", rows.len(), path.display());
    Ok(())
}
