//! Error types for parquet-dedup-cleaner
//!
//! This module defines the error hierarchy for the cleaning run:
//! - Source errors (listing and decoding input Parquet files)
//! - Batch errors (Arrow compute failures while cleaning a batch)
//! - Sink errors (writing cleaned chunks)
//! - Configuration and CLI errors
//!
//! Only structural failures are errors. Per-row and per-batch data problems
//! (unparsable purchase blobs, failed casts, missing fields, outliers) are
//! reported as outcome values and folded into the run statistics.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for a cleaning run
#[derive(Error, Debug)]
pub enum CleanerError {
    /// Input side errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// A cleaning stage failed on an in-memory batch
    #[error("Batch error: {0}")]
    Batch(#[from] arrow::error::ArrowError),

    /// Output side errors
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while listing or reading input files
#[derive(Error, Debug)]
pub enum SourceError {
    /// Input directory could not be listed
    #[error("Failed to read input directory '{path}': {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input file could not be opened
    #[error("Failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Parquet footer or metadata is unreadable
    #[error("Corrupt Parquet file '{path}': {source}")]
    Corrupt {
        path: PathBuf,
        source: parquet::errors::ParquetError,
    },

    /// A row group failed to decode
    #[error("Failed to decode batch from '{path}': {source}")]
    Decode {
        path: PathBuf,
        source: arrow::error::ArrowError,
    },
}

/// Errors raised while writing cleaned chunks
#[derive(Error, Debug)]
pub enum SinkError {
    /// Output directory could not be created
    #[error("Failed to create output directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Chunk file could not be created
    #[error("Failed to create chunk '{path}': {source}")]
    CreateFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Parquet writer error
    #[error("Failed to write chunk '{path}': {source}")]
    Write {
        path: PathBuf,
        source: parquet::errors::ParquetError,
    },
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid batch size
    #[error("Invalid batch size {size}: must be between {min} and {max}")]
    InvalidBatchSize { size: usize, min: usize, max: usize },

    /// Invalid false-positive rate
    #[error("Invalid error rate {rate}: must be strictly between 0 and 1")]
    InvalidErrorRate { rate: f64 },

    /// A column list resolved to nothing
    #[error("Column list '{name}' must not be empty")]
    EmptyColumnList { name: &'static str },

    /// Input directory missing
    #[error("Input directory '{path}' does not exist or is not a directory")]
    MissingInputDir { path: PathBuf },

    /// Codec level out of range
    #[error("Invalid {codec} compression level {level}: {reason}")]
    InvalidCompressionLevel {
        codec: &'static str,
        level: i32,
        reason: String,
    },
}

/// Batch-level failures of purchase blob expansion
///
/// These never abort a run: the batch continues without purchase columns.
#[derive(Error, Debug)]
pub enum ExpandError {
    /// Blob column cannot be read as text
    #[error("purchase_history has unsupported type {data_type}: {reason}")]
    UnsupportedBlobType {
        data_type: arrow::datatypes::DataType,
        reason: String,
    },

    /// Expanded columns could not be assembled into a batch
    #[error("Failed to assemble expanded batch: {0}")]
    Assemble(#[from] arrow::error::ArrowError),
}

/// Result type alias for CleanerError
pub type Result<T> = std::result::Result<T, CleanerError>;

/// Result type alias for SourceError
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Result type alias for SinkError
pub type SinkResult<T> = std::result::Result<T, SinkError>;

/// Outcome of coercing one column to its canonical type
#[derive(Debug, Clone, PartialEq)]
pub enum CastOutcome {
    /// Column already had the canonical type
    Unchanged { column: String },

    /// Column was converted to the canonical type
    Cast { column: String },

    /// Conversion failed; column keeps its original type
    Failed { column: String, reason: String },
}

impl CastOutcome {
    /// Returns true if the cast failed
    pub fn is_failure(&self) -> bool {
        matches!(self, CastOutcome::Failed { .. })
    }

    /// Returns the column this outcome refers to
    pub fn column(&self) -> &str {
        match self {
            CastOutcome::Unchanged { column } => column,
            CastOutcome::Cast { column } => column,
            CastOutcome::Failed { column, .. } => column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_outcome_failure() {
        let failed = CastOutcome::Failed {
            column: "age".into(),
            reason: "overflow".into(),
        };
        assert!(failed.is_failure());
        assert_eq!(failed.column(), "age");

        let ok = CastOutcome::Cast { column: "id".into() };
        assert!(!ok.is_failure());
    }

    #[test]
    fn test_error_conversion() {
        let cfg_err = ConfigError::InvalidErrorRate { rate: 2.0 };
        let err: CleanerError = cfg_err.into();
        assert!(matches!(err, CleanerError::Config(_)));
        assert!(err.to_string().contains("2"));
    }

    #[test]
    fn test_stage_failure_is_batch_error() {
        let arrow_err = arrow::error::ArrowError::ComputeError("mask length".into());
        let err: CleanerError = arrow_err.into();
        assert!(matches!(err, CleanerError::Batch(_)));
        assert!(err.to_string().starts_with("Batch error:"));
        assert!(!err.to_string().contains("Sink"));
    }
}
