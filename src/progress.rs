//! Terminal progress and run summary
//!
//! A spinner tracks batches while the run is going; a styled summary of the
//! final [`RunStats`] is printed once it completes.

use crate::config::CleanConfig;
use crate::pipeline::RunStats;
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::{Duration, Instant};

/// Spinner showing batches processed and rows written
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
    started: Instant,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        let spinner = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        bar.set_style(spinner);
        bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            bar,
            started: Instant::now(),
        }
    }

    /// Update the progress display
    pub fn update(&self, chunks_processed: u64, rows_written: u64) {
        let secs = self.started.elapsed().as_secs_f64();
        let rate = if secs > 0.0 {
            rows_written as f64 / secs
        } else {
            0.0
        };

        self.bar.set_message(format!(
            "Batches: {} | Rows written: {} | Rate: {:.0} rows/s",
            format_number(chunks_processed),
            format_number(rows_written),
            rate,
        ));
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut out = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Share of `part` in `whole` as a percentage
fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// Print a header at the start of the run
pub fn print_header(config: &CleanConfig) {
    println!();
    println!(
        "{} {}",
        style("parquet-dedup-cleaner").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Input:").bold(), config.input_dir.display());
    println!("  {} {}", style("Output:").bold(), config.output_dir.display());
    println!(
        "  {} {}",
        style("Batch size:").bold(),
        format_number(config.batch_size as u64)
    );
    println!("  {} {}", style("Error rate:").bold(), config.error_rate);
    println!();
}

/// Print a summary of the run
pub fn print_summary(stats: &RunStats, duration: Duration, log_file: &Path) {
    let secs = duration.as_secs_f64();
    let rate = if secs > 0.0 {
        stats.rows_read as f64 / secs
    } else {
        0.0
    };

    println!();
    println!("{}", style("Cleaning Complete").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Files:").bold(),
        format_number(stats.files_processed)
    );
    println!(
        "  {} {} ({:.0} rows/sec)",
        style("Rows read:").bold(),
        format_number(stats.rows_read),
        rate
    );
    println!(
        "  {} {} ({:.1}%)",
        style("Rows written:").bold(),
        format_number(stats.rows_written),
        percent(stats.rows_written, stats.rows_read)
    );
    println!(
        "  {} {}",
        style("Duplicates:").bold(),
        format_number(stats.duplicates_removed)
    );
    println!(
        "  {} {}",
        style("Incomplete:").bold(),
        format_number(stats.missing_removed)
    );
    for (column, removed) in &stats.outliers_removed {
        println!(
            "  {} {} ({})",
            style("Outliers:").bold(),
            format_number(*removed),
            column
        );
    }
    println!(
        "  {} {} written, {} skipped empty ({})",
        style("Chunks:").bold(),
        format_number(stats.chunks_written),
        format_number(stats.empty_chunks_skipped),
        format_size(stats.bytes_written, BINARY)
    );
    if stats.blob_parse_failures > 0 || stats.degraded_batches > 0 {
        println!(
            "  {} {} unparsable blobs, {} degraded batches",
            style("Purchases:").yellow().bold(),
            format_number(stats.blob_parse_failures),
            format_number(stats.degraded_batches)
        );
    }
    for (column, failures) in &stats.cast_failures {
        println!(
            "  {} {} kept its original type in {} batch(es)",
            style("Cast:").yellow().bold(),
            column,
            format_number(*failures)
        );
    }
    println!("  {} {:.1}s", style("Duration:").bold(), secs);
    println!("  {} {}", style("Run log:").bold(), log_file.display());
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
        assert_eq!(format_number(1234567890), "1,234,567,890");
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(1, 0), 0.0);
        assert_eq!(percent(25, 100), 25.0);
    }
}
