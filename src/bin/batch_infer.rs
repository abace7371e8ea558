//! batch-infer — 批量推理命令行工具
//!
//! Usage:
//!   batch-infer --config <yaml> --input-file <jsonl> --results-file <jsonl> [--stats-file <json>] [-v]

use anyhow::Context;
use batch_infer::runner::BatchRunner;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

/// Batch inference against an OpenAI-style server or the Gemini API.
#[derive(Parser)]
#[command(name = "batch-infer")]
#[command(version)]
#[command(about = "Run a JSONL batch of prompts against a model endpoint under bounded concurrency")]
struct Cli {
    /// YAML config file
    #[arg(short, long)]
    config: PathBuf,

    /// JSONL file with input prompts
    #[arg(short, long)]
    input_file: PathBuf,

    /// Output file for results (JSONL)
    #[arg(short, long)]
    results_file: PathBuf,

    /// Output file for statistics (default: <input-stem>_stats.json)
    #[arg(short, long)]
    stats_file: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let runner = BatchRunner::from_config_path(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    let report = runner
        .run(&cli.input_file, &cli.results_file, cli.stats_file)
        .await
        .context("batch run failed")?;

    println!(
        "{}/{} requests succeeded in {:.1}s ({:.2} req/s). Results: {}  Stats: {}",
        report.stats.successful_requests,
        report.stats.total_requests,
        report.stats.elapsed_time,
        report.stats.throughput,
        report.results_file.display(),
        report.stats_file.display(),
    );
    Ok(())
}
