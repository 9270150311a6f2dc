//! Wine-quality trainer CLI
//!
//! Trains a regression model on the wine-quality dataset and records the run
//! to a local tracking directory.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use wineq_trainer::{run_experiment, ExperimentConfig, ModelConfig};

#[derive(Parser, Debug)]
#[command(name = "wineq-train")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deterministic trainer for wine-quality regression models", long_about = None)]
struct Args {
    /// Model family: "elasticnet" or "knn"
    #[arg(short, long)]
    model: String,

    /// Overall regularization strength (elasticnet)
    #[arg(long, default_value = "0.5")]
    alpha: f64,

    /// L1/L2 mixing ratio in [0, 1] (elasticnet)
    #[arg(long, default_value = "0.5")]
    l1_ratio: f64,

    /// Number of neighbors (knn)
    #[arg(long, default_value = "5")]
    n_neighbors: usize,

    /// Input CSV dataset path (header row, "quality" target column)
    #[arg(short, long, default_value = "data/winequality-red.csv")]
    input: PathBuf,

    /// Fraction of rows held out for testing, in (0, 1)
    #[arg(long, default_value = "0.25")]
    test_size: f64,

    /// Random seed for the deterministic split
    #[arg(long, default_value = "123456")]
    seed: i64,

    /// Root directory of the tracking store
    #[arg(long, default_value = "mlruns")]
    tracking_dir: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Wine-quality trainer v{}", env!("CARGO_PKG_VERSION"));
    info!("Tracking directory: {}", args.tracking_dir.display());

    let model = ModelConfig::from_family(&args.model, args.alpha, args.l1_ratio, args.n_neighbors)?;

    let config = ExperimentConfig {
        data_path: args.input,
        test_size: args.test_size,
        seed: args.seed,
        model,
        tracking_dir: args.tracking_dir,
    };

    let summary = run_experiment(&config)?;

    info!("Run {} completed", summary.run_id);
    info!("  Model artifact: {}", summary.model_path.display());
    info!(
        "  Test metrics: mse={} mae={} r2={}",
        summary.test.mse, summary.test.mae, summary.test.r2
    );

    Ok(())
}
