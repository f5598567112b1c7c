//! Cleaning run orchestration
//!
//! The cleaner pulls batches from the [`RecordSource`] one at a time and
//! pushes each through the stages in a fixed order:
//!
//! ```text
//! source ─► normalize ─► select ─► dedup ─► completeness ─► outliers ─► chunk
//! ```
//!
//! Everything that outlives a single batch (the dedup filter, the next chunk
//! index and the counters) lives in one [`RunContext`], so a run can never
//! mix state with another one.

use crate::clean::{filter_quality, normalize_batch, select_columns};
use crate::config::{validate_error_rate, CleanConfig};
use crate::dedup::{dedup_batch, MembershipFilter, ScalableBloomFilter};
use crate::error::Result;
use crate::sink::ChunkWriter;
use crate::source::{RecordSource, SourceBatch};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Counters for one cleaning run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    /// Input files opened
    pub files_processed: u64,

    /// Rows decoded from the input
    pub rows_read: u64,

    /// Rows written to chunks
    pub rows_written: u64,

    /// Rows dropped as probable duplicates
    pub duplicates_removed: u64,

    /// Rows dropped for missing mandatory values
    pub missing_removed: u64,

    /// Rows dropped per outlier column
    pub outliers_removed: BTreeMap<String, u64>,

    /// Batches pulled from the source
    pub chunks_processed: u64,

    /// Chunk files written
    pub chunks_written: u64,

    /// Batches that ended up empty and were not written
    pub empty_chunks_skipped: u64,

    /// Bytes written across all chunk files
    pub bytes_written: u64,

    /// Rows whose purchase blob did not parse
    pub blob_parse_failures: u64,

    /// Batches that lost their purchase columns entirely
    pub degraded_batches: u64,

    /// Batches in which a column kept its original type, per column
    pub cast_failures: BTreeMap<String, u64>,
}

impl RunStats {
    /// Rows dropped by the outlier pass, all columns together
    pub fn total_outliers(&self) -> u64 {
        self.outliers_removed.values().sum()
    }

    /// Rows dropped by any stage
    pub fn total_removed(&self) -> u64 {
        self.duplicates_removed + self.missing_removed + self.total_outliers()
    }
}

/// State shared by every batch of one run
#[derive(Debug)]
pub struct RunContext<F> {
    /// Fingerprints seen so far
    pub filter: F,

    /// Index of the next chunk file
    pub next_chunk: usize,

    /// Running counters
    pub stats: RunStats,
}

impl<F> RunContext<F> {
    pub fn new(filter: F) -> Self {
        Self {
            filter,
            next_chunk: 0,
            stats: RunStats::default(),
        }
    }
}

/// Called after every batch with `(chunks_processed, rows_written)`
pub type ProgressCallback = Box<dyn FnMut(u64, u64)>;

/// Drives one cleaning pass over an input directory
pub struct Cleaner<F: MembershipFilter = ScalableBloomFilter> {
    config: CleanConfig,
    ctx: RunContext<F>,
    progress: Option<ProgressCallback>,
}

impl Cleaner<ScalableBloomFilter> {
    /// Cleaner backed by a scalable bloom filter at the configured error rate.
    pub fn new(config: CleanConfig) -> Result<Self> {
        validate_error_rate(config.error_rate)?;
        let filter = ScalableBloomFilter::new(config.error_rate);
        Ok(Self::with_filter(config, filter))
    }
}

impl<F: MembershipFilter> Cleaner<F> {
    /// Cleaner backed by any membership filter.
    pub fn with_filter(config: CleanConfig, filter: F) -> Self {
        Self {
            config,
            ctx: RunContext::new(filter),
            progress: None,
        }
    }

    /// Register a callback invoked after each batch.
    pub fn on_progress(mut self, callback: impl FnMut(u64, u64) + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Configuration this cleaner runs with
    pub fn config(&self) -> &CleanConfig {
        &self.config
    }

    /// Run the whole pass and return the final counters.
    ///
    /// Source, batch and sink failures abort the run. Data problems inside a
    /// batch are counted and the run continues.
    pub fn run(mut self) -> Result<RunStats> {
        let start = Instant::now();
        info!(
            input = %self.config.input_dir.display(),
            output = %self.config.output_dir.display(),
            batch_size = self.config.batch_size,
            error_rate = self.config.error_rate,
            "Starting cleaning run"
        );

        let writer = ChunkWriter::create(&self.config.output_dir, self.config.compression)?;
        let mut source = RecordSource::open(
            &self.config.input_dir,
            Some(self.config.columns.clone()),
            self.config.batch_size,
        )?;

        while let Some(next) = source.next() {
            let batch = next?;
            self.ctx.stats.files_processed = source.files_opened() as u64;
            self.process_batch(batch, &writer)?;

            if let Some(callback) = self.progress.as_mut() {
                callback(
                    self.ctx.stats.chunks_processed,
                    self.ctx.stats.rows_written,
                );
            }
        }
        self.ctx.stats.files_processed = source.files_opened() as u64;

        info!(
            rows_read = self.ctx.stats.rows_read,
            rows_written = self.ctx.stats.rows_written,
            chunks = self.ctx.stats.chunks_written,
            fingerprints = self.ctx.filter.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Cleaning run complete"
        );

        Ok(self.ctx.stats)
    }

    fn process_batch(&mut self, source_batch: SourceBatch, writer: &ChunkWriter) -> Result<()> {
        let SourceBatch {
            file,
            batch,
            expand,
            ..
        } = source_batch;
        let stats = &mut self.ctx.stats;
        let rows_in = batch.num_rows();

        stats.chunks_processed += 1;
        stats.rows_read += rows_in as u64;
        stats.blob_parse_failures += expand.parse_failures as u64;
        if expand.degraded {
            stats.degraded_batches += 1;
        }

        let (batch, casts) = normalize_batch(batch);
        for outcome in casts.iter().filter(|o| o.is_failure()) {
            *stats
                .cast_failures
                .entry(outcome.column().to_string())
                .or_default() += 1;
        }

        let batch = select_columns(&batch, &self.config.columns)?;

        let deduped = dedup_batch(batch, &mut self.ctx.filter)?;
        let stats = &mut self.ctx.stats;
        stats.duplicates_removed += deduped.duplicates as u64;

        let (batch, report) = filter_quality(
            deduped.batch,
            &self.config.mandatory,
            &self.config.outlier_columns,
        )?;
        stats.missing_removed += report.missing as u64;
        for (column, dropped) in report.outliers {
            *stats.outliers_removed.entry(column).or_default() += dropped as u64;
        }

        debug!(
            file = %file.display(),
            rows_in,
            duplicates = deduped.duplicates,
            missing = report.missing,
            rows_out = batch.num_rows(),
            "Batch cleaned"
        );

        if batch.num_rows() == 0 && !self.config.write_empty_chunks {
            stats.empty_chunks_skipped += 1;
            warn!(file = %file.display(), rows_in, "Batch empty after cleaning, skipped");
            return Ok(());
        }

        let index = self.ctx.next_chunk;
        let bytes = writer.write_chunk(index, &batch)?;
        self.ctx.next_chunk += 1;

        let stats = &mut self.ctx.stats;
        stats.chunks_written += 1;
        stats.rows_written += batch.num_rows() as u64;
        stats.bytes_written += bytes;

        info!(
            chunk = index,
            rows = batch.num_rows(),
            path = %writer.chunk_path(index).display(),
            "Wrote chunk"
        );
        Ok(())
    }
}
