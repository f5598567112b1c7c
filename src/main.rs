//! parquet-dedup-cleaner - Streaming Parquet Cleaner and Deduplicator
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use parquet_dedup_cleaner::config::{CleanConfig, CliArgs};
use parquet_dedup_cleaner::pipeline::{Cleaner, RunStats};
use parquet_dedup_cleaner::progress::{print_header, print_summary, ProgressReporter};
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Document written to the run log when a run completes
#[derive(Serialize)]
struct RunLog<'a> {
    started_at: DateTime<Utc>,
    elapsed_secs: f64,
    input_dir: &'a Path,
    output_dir: &'a Path,
    #[serde(flatten)]
    stats: &'a RunStats,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = CliArgs::parse();

    setup_logging(args.verbose)?;

    let config = CleanConfig::from_args(args).context("Invalid configuration")?;

    if config.show_progress {
        print_header(&config);
    }

    let started_at = Utc::now();
    let start = Instant::now();

    let mut cleaner = Cleaner::new(config.clone()).context("Failed to initialize cleaner")?;
    let progress = config.show_progress.then(ProgressReporter::new);
    if let Some(ref p) = progress {
        p.set_status("Scanning input files...");
        let reporter = p.clone();
        cleaner = cleaner.on_progress(move |chunks, rows| reporter.update(chunks, rows));
    }

    let stats = cleaner.run().context("Cleaning run failed")?;
    let elapsed = start.elapsed();

    if let Some(ref p) = progress {
        p.finish_and_clear();
    }

    write_run_log(&config, &stats, started_at, elapsed.as_secs_f64())
        .with_context(|| format!("Failed to write run log {}", config.log_file.display()))?;

    if config.show_progress {
        print_summary(&stats, elapsed, &config.log_file);
    }

    info!(
        rows_written = stats.rows_written,
        removed = stats.total_removed(),
        "Run complete"
    );

    Ok(())
}

fn write_run_log(
    config: &CleanConfig,
    stats: &RunStats,
    started_at: DateTime<Utc>,
    elapsed_secs: f64,
) -> Result<()> {
    if let Some(parent) = config.log_file.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let log = RunLog {
        started_at,
        elapsed_secs,
        input_dir: &config.input_dir,
        output_dir: &config.output_dir,
        stats,
    };

    let file = File::create(&config.log_file)?;
    serde_json::to_writer_pretty(BufWriter::new(file), &log)?;
    info!(path = %config.log_file.display(), "Wrote run log");
    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("parquet_dedup_cleaner=debug,warn")
    } else {
        EnvFilter::new("parquet_dedup_cleaner=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
