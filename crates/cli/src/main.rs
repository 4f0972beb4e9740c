//! Catchment CLI - catchment area and stream length from a DEM

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use catchment_algorithms::catchment::{
    AreaPolicy, CatchmentConfig, CatchmentMetrics, CatchmentPaths, CatchmentPipeline,
    D8Delineator, GdalWarpClipper,
};
use catchment_core::io::read_geotiff;
use catchment_core::Raster;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "catchment")]
#[command(author, version, about = "Catchment area and stream length from a DEM", long_about = None)]
struct Cli {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Area and stream length of the catchment draining to one outlet
    Metrics {
        /// Outlet point layer (GeoJSON, one point)
        #[arg(short, long)]
        outlet: PathBuf,
        /// Directory for intermediate files
        #[arg(short, long, default_value = "temp")]
        work_dir: PathBuf,
        /// Prefix intermediate file names with this id
        #[arg(long)]
        run_id: Option<String>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// One catchment per outlet layer; intermediate files are named after
    /// each outlet file
    Batch {
        /// Outlet point layers (GeoJSON)
        #[arg(required = true)]
        outlets: Vec<PathBuf>,
        /// Directory for intermediate files
        #[arg(short, long)]
        work_dir: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },
}

/// Arguments shared by `metrics` and `batch`
#[derive(Args)]
struct RunArgs {
    /// Filled, projected DEM (GeoTIFF)
    #[arg(short, long)]
    dem: PathBuf,
    /// Search radius in cells for snapping the outlet to a stream
    #[arg(short, long, default_value = "10")]
    snap_distance: usize,
    /// Minimum contributing cell count for a stream cell
    #[arg(short, long, default_value = "10")]
    flow_threshold: usize,
    /// Area of a multi-feature watershed: last, sum, single
    #[arg(short, long, default_value = "last")]
    area_policy: AreaPolicy,
    /// Clip with an external gdalwarp process instead of in-process
    #[arg(long)]
    gdalwarp: bool,
    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

impl RunArgs {
    fn config(&self) -> CatchmentConfig {
        CatchmentConfig {
            snap_distance: self.snap_distance,
            flow_threshold: self.flow_threshold,
            area_policy: self.area_policy,
        }
    }

    fn run(&self, outlet: &Path, paths: &CatchmentPaths) -> catchment_core::Result<CatchmentMetrics> {
        let config = self.config();
        if self.gdalwarp {
            CatchmentPipeline::new(D8Delineator, GdalWarpClipper::new(), config)
                .run(outlet, &self.dem, paths)
        } else {
            CatchmentPipeline::with_config(config).run(outlet, &self.dem, paths)
        }
    }
}

#[derive(Serialize)]
struct Record<'a> {
    outlet: &'a Path,
    #[serde(flatten)]
    metrics: Option<CatchmentMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

// ─── Helpers ────────────────────────────────────────────────────────────

/// `RUST_LOG` when set, otherwise `debug` with `-v` and `info` without
fn log_directives(verbose: bool, rust_log: Option<String>) -> String {
    match rust_log {
        Some(directives) if !directives.trim().is_empty() => directives,
        _ if verbose => "debug".to_string(),
        _ => "info".to_string(),
    }
}

fn setup_logging(verbose: bool) -> Result<()> {
    let directives = log_directives(verbose, std::env::var("RUST_LOG").ok());
    let filter = EnvFilter::try_new(&directives)
        .with_context(|| format!("invalid log filter {directives:?}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("setting default subscriber failed: {e}"))
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_raster(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> = read_geotiff(path)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    Ok(raster)
}

fn print_metrics(outlet: &Path, metrics: &CatchmentMetrics, json: bool) -> Result<()> {
    if json {
        let record = Record { outlet, metrics: Some(*metrics), error: None };
        println!("{}", serde_json::to_string(&record)?);
    } else {
        println!("Outlet: {}", outlet.display());
        println!("  Stream length: {:.2}", metrics.stream_length);
        println!("  Area: {:.2}", metrics.area);
        if !metrics.is_defined() {
            println!("  (clip failed, metrics undefined)");
        }
    }
    Ok(())
}

fn print_failure(outlet: &Path, err: &catchment_core::Error, json: bool) -> Result<()> {
    if json {
        let record = Record { outlet, metrics: None, error: Some(err.to_string()) };
        println!("{}", serde_json::to_string(&record)?);
    } else {
        println!("Outlet: {}", outlet.display());
        println!("  Failed: {}", err);
    }
    Ok(())
}

/// Run id for a batch entry: the outlet file stem
fn batch_run_id(outlet: &Path, index: usize) -> String {
    outlet
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("outlet{index}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let raster = read_raster(&input)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.transform().mean_cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!("  Sum: {:.4}", stats.sum);
            if !raster.is_empty() {
                println!(
                    "  Valid cells: {} ({:.1}%)",
                    stats.valid_count,
                    100.0 * stats.valid_count as f64 / raster.len() as f64
                );
            }
        }

        // ── Metrics ──────────────────────────────────────────────────
        Commands::Metrics {
            outlet,
            work_dir,
            run_id,
            run,
        } => {
            let paths = match &run_id {
                Some(id) => CatchmentPaths::for_run(&work_dir, id),
                None => CatchmentPaths::in_dir(&work_dir),
            };

            let start = Instant::now();
            let pb = spinner("Computing catchment metrics...");
            let result = run.run(&outlet, &paths);
            pb.finish_and_clear();

            let metrics = result.with_context(|| {
                format!("Failed to compute catchment metrics for {}", outlet.display())
            })?;
            print_metrics(&outlet, &metrics, run.json)?;
            info!("Processing time: {:.2?}", start.elapsed());
        }

        // ── Batch ────────────────────────────────────────────────────
        Commands::Batch {
            outlets,
            work_dir,
            run,
        } => {
            let start = Instant::now();
            let mut failed = 0usize;

            for (index, outlet) in outlets.iter().enumerate() {
                let paths = CatchmentPaths::for_run(&work_dir, &batch_run_id(outlet, index));
                let pb = spinner(&format!("Outlet {}/{}...", index + 1, outlets.len()));
                let result = run.run(outlet, &paths);
                pb.finish_and_clear();

                match result {
                    Ok(metrics) => print_metrics(outlet, &metrics, run.json)?,
                    Err(e) => {
                        error!(outlet = %outlet.display(), error = %e, "catchment failed");
                        print_failure(outlet, &e, run.json)?;
                        failed += 1;
                    }
                }
            }

            info!(
                "{} outlets in {:.2?}",
                outlets.len(),
                start.elapsed()
            );
            if failed > 0 {
                bail!("{} of {} outlets failed", failed, outlets.len());
            }
        }
    }

    Ok(())
}
