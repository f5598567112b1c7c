//! parquet-dedup-cleaner - Streaming Parquet Cleaner and Deduplicator
//!
//! Reads a directory of Parquet files holding user and purchase records,
//! flattens the nested purchase blob, coerces columns to compact types,
//! drops probable duplicates across the whole dataset, filters incomplete
//! rows and IQR outliers, and writes the result as numbered Parquet chunks.
//!
//! # Features
//!
//! - **Bounded Memory**: Files are decoded one batch at a time with column
//!   pruning, so peak memory is one batch plus the dedup filter.
//!
//! - **Global Deduplication**: A scalable bloom filter over SHA-256
//!   fingerprints of `(id, last_login, user_name)` catches duplicates across
//!   batches and files, with a configurable false-positive rate.
//!
//! - **Mixed Input Shapes**: Raw files with a JSON `purchase_history` column
//!   and already-flattened files can live side by side.
//!
//! - **Outcome Accounting**: Unparsable blobs, failed casts, and every
//!   dropped row are counted in [`RunStats`] instead of aborting the run.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Input Directory (*.parquet)                     │
//! │                   sorted by file name                            │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │
//!                               │ projected row groups
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       RecordSource                               │
//! │   ExtractionMode::Raw ──► expand purchase_history                │
//! │   ExtractionMode::Clean ─► pass through                          │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ one batch at a time
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Cleaner                                 │
//! │  ┌───────────┐  ┌────────┐  ┌─────────┐  ┌──────────────────┐   │
//! │  │ normalize │─►│ select │─►│  dedup  │─►│ completeness/IQR │   │
//! │  └───────────┘  └────────┘  └────┬────┘  └────────┬─────────┘   │
//! │                                  │                │             │
//! │                    ┌─────────────┴──────┐         │             │
//! │                    │ ScalableBloomFilter│         │             │
//! │                    │   (run-scoped)     │         │             │
//! │                    └────────────────────┘         │             │
//! └───────────────────────────────────────────────────┼─────────────┘
//!                                                     │
//!                                                     ▼
//!                                     ┌──────────────────────────┐
//!                                     │  clean_0.parquet, ...    │
//!                                     │  + cleaning_log.json     │
//!                                     └──────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Clean ./data into ./outputs/cleaned_chunks
//! parquet-dedup-cleaner ./data -o ./outputs/cleaned_chunks
//!
//! # Smaller batches, tighter dedup error rate, brotli output
//! parquet-dedup-cleaner ./data -b 1000000 --error-rate 1e-6 --compression brotli
//! ```

pub mod clean;
pub mod config;
pub mod dedup;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod schema;
pub mod sink;
pub mod source;

pub use config::{CleanConfig, CliArgs, Codec};
pub use dedup::{BloomFilter, Fingerprint, MembershipFilter, ScalableBloomFilter};
pub use error::{CleanerError, Result};
pub use pipeline::{Cleaner, RunContext, RunStats};
pub use source::{ExtractionMode, RecordSource, SourceBatch};
