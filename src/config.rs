//! Configuration types for parquet-dedup-cleaner
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - Output codec selection

use crate::error::ConfigError;
use crate::schema;
use clap::{Parser, ValueEnum};
use parquet::basic::{BrotliLevel, Compression, ZstdLevel};
use std::path::PathBuf;

/// Default rows per batch
pub const DEFAULT_BATCH_SIZE: usize = 5_000_000;

/// Default dedup false-positive rate
pub const DEFAULT_ERROR_RATE: f64 = 1e-4;

/// Batch size limits
const MIN_BATCH_SIZE: usize = 1;
const MAX_BATCH_SIZE: usize = 50_000_000;

/// Streaming cleaner and approximate deduplicator for Parquet datasets
#[derive(Parser, Debug, Clone)]
#[command(
    name = "parquet-dedup-cleaner",
    version,
    about = "Clean, deduplicate and outlier-filter large Parquet user/purchase datasets",
    long_about = "Streams every Parquet file in INPUT_DIR batch by batch, expands the nested \
                  purchase_history blob when present, coerces columns to narrow types, drops \
                  probable duplicates with a scalable bloom filter, removes rows with missing \
                  mandatory fields and IQR outliers, and writes one clean_<n>.parquet per batch.",
    after_help = "EXAMPLES:\n    \
        parquet-dedup-cleaner ./data -o ./outputs/cleaned_chunks\n    \
        parquet-dedup-cleaner ./data -b 1000000 --error-rate 0.001\n    \
        parquet-dedup-cleaner ./data --compression brotli --compression-level 5 -v"
)]
pub struct CliArgs {
    /// Directory of input Parquet files
    #[arg(value_name = "INPUT_DIR", default_value = "./data")]
    pub input_dir: PathBuf,

    /// Directory for cleaned chunks
    #[arg(short, long, default_value = "./outputs/cleaned_chunks", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Rows per batch
    #[arg(short = 'b', long, default_value_t = DEFAULT_BATCH_SIZE, value_name = "NUM")]
    pub batch_size: usize,

    /// Target false-positive rate for the dedup filter
    #[arg(long, default_value_t = DEFAULT_ERROR_RATE, value_name = "RATE")]
    pub error_rate: f64,

    /// Columns to keep (comma separated, output order)
    #[arg(long, value_delimiter = ',', value_name = "COLS")]
    pub columns: Option<Vec<String>>,

    /// Columns that must be present for a row to survive
    #[arg(long, value_delimiter = ',', value_name = "COLS")]
    pub mandatory: Option<Vec<String>>,

    /// Numeric columns screened with the IQR rule
    #[arg(long = "outlier-columns", value_delimiter = ',', value_name = "COLS")]
    pub outlier_columns: Option<Vec<String>>,

    /// Output compression codec
    #[arg(long, value_enum, default_value_t = Codec::Zstd)]
    pub compression: Codec,

    /// Codec level (zstd 1-22, brotli 0-11)
    #[arg(long, value_name = "LEVEL")]
    pub compression_level: Option<i32>,

    /// Write a chunk file even when every row of a batch was dropped
    #[arg(long)]
    pub write_empty_chunks: bool,

    /// Run log path (JSON)
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Output compression codec
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Zstd,
    Brotli,
    Snappy,
    #[value(name = "none")]
    Uncompressed,
}

impl Codec {
    fn name(self) -> &'static str {
        match self {
            Codec::Zstd => "zstd",
            Codec::Brotli => "brotli",
            Codec::Snappy => "snappy",
            Codec::Uncompressed => "none",
        }
    }

    /// Resolve to a Parquet compression setting
    pub fn to_compression(self, level: Option<i32>) -> Result<Compression, ConfigError> {
        let invalid = |level: i32, reason: String| ConfigError::InvalidCompressionLevel {
            codec: self.name(),
            level,
            reason,
        };

        match self {
            Codec::Zstd => {
                let zstd = match level {
                    Some(level) => {
                        ZstdLevel::try_new(level).map_err(|e| invalid(level, e.to_string()))?
                    }
                    None => ZstdLevel::default(),
                };
                Ok(Compression::ZSTD(zstd))
            }
            Codec::Brotli => {
                let brotli = match level {
                    Some(level) => {
                        let raw = u32::try_from(level).map_err(|e| invalid(level, e.to_string()))?;
                        BrotliLevel::try_new(raw).map_err(|e| invalid(level, e.to_string()))?
                    }
                    None => BrotliLevel::default(),
                };
                Ok(Compression::BROTLI(brotli))
            }
            Codec::Snappy => Ok(Compression::SNAPPY),
            Codec::Uncompressed => Ok(Compression::UNCOMPRESSED),
        }
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct CleanConfig {
    /// Directory of input Parquet files
    pub input_dir: PathBuf,

    /// Directory for cleaned chunks
    pub output_dir: PathBuf,

    /// Rows per batch
    pub batch_size: usize,

    /// Dedup filter false-positive rate
    pub error_rate: f64,

    /// Output column set, in order
    pub columns: Vec<String>,

    /// Mandatory columns
    pub mandatory: Vec<String>,

    /// IQR-screened columns, in filtering order
    pub outlier_columns: Vec<String>,

    /// Output codec
    pub compression: Compression,

    /// Write zero-row chunks instead of skipping them
    pub write_empty_chunks: bool,

    /// Run log path
    pub log_file: PathBuf,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl CleanConfig {
    /// Configuration with the default column sets, for library use.
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        Self {
            input_dir: input_dir.into(),
            log_file: default_log_file(&output_dir),
            output_dir,
            batch_size: DEFAULT_BATCH_SIZE,
            error_rate: DEFAULT_ERROR_RATE,
            columns: schema::owned(&schema::TARGET_COLUMNS),
            mandatory: schema::owned(&schema::MANDATORY_COLUMNS),
            outlier_columns: schema::owned(&schema::OUTLIER_COLUMNS),
            compression: Compression::ZSTD(ZstdLevel::default()),
            write_empty_chunks: false,
            show_progress: false,
            verbose: false,
        }
    }

    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        if args.batch_size < MIN_BATCH_SIZE || args.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::InvalidBatchSize {
                size: args.batch_size,
                min: MIN_BATCH_SIZE,
                max: MAX_BATCH_SIZE,
            });
        }

        validate_error_rate(args.error_rate)?;

        if !args.input_dir.is_dir() {
            return Err(ConfigError::MissingInputDir {
                path: args.input_dir,
            });
        }

        let columns = column_list("columns", args.columns, &schema::TARGET_COLUMNS)?;
        let mandatory = column_list("mandatory", args.mandatory, &schema::MANDATORY_COLUMNS)?;
        // An empty outlier list is allowed: it disables the IQR pass.
        let outlier_columns = args
            .outlier_columns
            .map(clean_names)
            .unwrap_or_else(|| schema::owned(&schema::OUTLIER_COLUMNS));

        let compression = args.compression.to_compression(args.compression_level)?;
        let log_file = args
            .log_file
            .unwrap_or_else(|| default_log_file(&args.output_dir));

        Ok(Self {
            input_dir: args.input_dir,
            output_dir: args.output_dir,
            batch_size: args.batch_size,
            error_rate: args.error_rate,
            columns,
            mandatory,
            outlier_columns,
            compression,
            write_empty_chunks: args.write_empty_chunks,
            log_file,
            show_progress: !args.quiet,
            verbose: args.verbose,
        })
    }
}

/// Reject rates outside (0, 1)
pub fn validate_error_rate(rate: f64) -> Result<(), ConfigError> {
    if rate.is_finite() && rate > 0.0 && rate < 1.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidErrorRate { rate })
    }
}

/// The run log sits next to the chunk directory
fn default_log_file(output_dir: &std::path::Path) -> PathBuf {
    output_dir
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.join("cleaning_log.json"))
        .unwrap_or_else(|| PathBuf::from("cleaning_log.json"))
}

fn clean_names(names: Vec<String>) -> Vec<String> {
    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}

fn column_list(
    name: &'static str,
    given: Option<Vec<String>>,
    default: &[&str],
) -> Result<Vec<String>, ConfigError> {
    match given {
        None => Ok(schema::owned(default)),
        Some(list) => {
            let list = clean_names(list);
            if list.is_empty() {
                Err(ConfigError::EmptyColumnList { name })
            } else {
                Ok(list)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn args_for(input: &std::path::Path) -> CliArgs {
        CliArgs::parse_from([
            "parquet-dedup-cleaner",
            input.to_str().unwrap(),
            "-o",
            "out/chunks",
        ])
    }

    #[test]
    fn test_defaults() {
        let dir = tempdir().unwrap();
        let config = CleanConfig::from_args(args_for(dir.path())).unwrap();

        assert_eq!(config.batch_size, 5_000_000);
        assert_eq!(config.error_rate, 1e-4);
        assert_eq!(config.columns.len(), 15);
        assert_eq!(config.mandatory, vec!["id", "last_login", "user_name", "age", "income"]);
        assert_eq!(config.outlier_columns, vec!["age", "income", "purchase_avg_price"]);
        assert_eq!(config.log_file, PathBuf::from("out/cleaning_log.json"));
        assert!(config.show_progress);
        assert!(!config.write_empty_chunks);
    }

    #[test]
    fn test_column_lists_parse() {
        let dir = tempdir().unwrap();
        let args = CliArgs::parse_from([
            "parquet-dedup-cleaner",
            dir.path().to_str().unwrap(),
            "--columns",
            "id, last_login,user_name",
            "--outlier-columns",
            "",
        ]);
        let config = CleanConfig::from_args(args).unwrap();
        assert_eq!(config.columns, vec!["id", "last_login", "user_name"]);
        assert!(config.outlier_columns.is_empty());
    }

    #[test]
    fn test_invalid_batch_size() {
        let dir = tempdir().unwrap();
        let mut args = args_for(dir.path());
        args.batch_size = 0;
        assert!(matches!(
            CleanConfig::from_args(args),
            Err(ConfigError::InvalidBatchSize { .. })
        ));
    }

    #[test]
    fn test_invalid_error_rate() {
        assert!(validate_error_rate(1e-4).is_ok());
        assert!(validate_error_rate(0.0).is_err());
        assert!(validate_error_rate(1.0).is_err());
        assert!(validate_error_rate(f64::NAN).is_err());
    }

    #[test]
    fn test_missing_input_dir() {
        let args = args_for(std::path::Path::new("/definitely/not/here"));
        assert!(matches!(
            CleanConfig::from_args(args),
            Err(ConfigError::MissingInputDir { .. })
        ));
    }

    #[test]
    fn test_empty_column_list_rejected() {
        let dir = tempdir().unwrap();
        let mut args = args_for(dir.path());
        args.mandatory = Some(vec![" ".to_string()]);
        assert!(matches!(
            CleanConfig::from_args(args),
            Err(ConfigError::EmptyColumnList { name: "mandatory" })
        ));
    }

    #[test]
    fn test_codec_levels() {
        assert!(matches!(
            Codec::Zstd.to_compression(None).unwrap(),
            Compression::ZSTD(_)
        ));
        assert!(Codec::Zstd.to_compression(Some(99)).is_err());
        assert!(Codec::Brotli.to_compression(Some(-1)).is_err());
        assert_eq!(
            Codec::Uncompressed.to_compression(None).unwrap(),
            Compression::UNCOMPRESSED
        );
    }
}
