//! Streaming Parquet record source
//!
//! Lists the input directory once, then opens files lazily in name order and
//! decodes them batch by batch. Only the current file's reader is alive at
//! any time, and only the projected columns are decoded.

use super::expand::{expand_purchases, ExpandReport};
use crate::error::{SourceError, SourceResult};
use crate::schema::{is_purchase_derived, PURCHASE_HISTORY};
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use parquet::arrow::ProjectionMask;
use std::collections::VecDeque;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// How a file's columns are extracted, resolved once from its schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    /// File still carries the nested `purchase_history` blob
    Raw,
    /// Purchase fields are already flat columns
    Clean,
}

impl ExtractionMode {
    /// Pick the mode for a file schema
    pub fn detect(schema: &Schema) -> Self {
        if schema.index_of(PURCHASE_HISTORY).is_ok() {
            ExtractionMode::Raw
        } else {
            ExtractionMode::Clean
        }
    }

    /// Top-level column indices to decode from a file with this schema.
    ///
    /// `targets` of `None` means every column. Targets missing from the file
    /// are skipped.
    pub fn projection(self, schema: &Schema, targets: Option<&[String]>) -> Vec<usize> {
        let Some(targets) = targets else {
            return (0..schema.fields().len()).collect();
        };

        let wanted: Vec<&str> = match self {
            ExtractionMode::Clean => targets.iter().map(String::as_str).collect(),
            ExtractionMode::Raw => {
                let mut cols: Vec<&str> = targets
                    .iter()
                    .map(String::as_str)
                    .filter(|c| !is_purchase_derived(c))
                    .collect();
                if targets.iter().any(|c| is_purchase_derived(c)) {
                    cols.push(PURCHASE_HISTORY);
                }
                cols
            }
        };

        let mut indices: Vec<usize> = wanted
            .iter()
            .filter_map(|name| schema.index_of(name).ok())
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// One decoded batch and where it came from
#[derive(Debug)]
pub struct SourceBatch {
    /// File the batch was read from
    pub file: PathBuf,

    /// Extraction mode of that file
    pub mode: ExtractionMode,

    /// Decoded (and, for raw files, expanded) rows
    pub batch: RecordBatch,

    /// Purchase blob expansion outcome (default for clean files)
    pub expand: ExpandReport,
}

struct OpenFile {
    path: PathBuf,
    mode: ExtractionMode,
    reader: ParquetRecordBatchReader,
}

/// Lazy sequence of batches over a directory of Parquet files
pub struct RecordSource {
    pending: VecDeque<PathBuf>,
    columns: Option<Vec<String>>,
    batch_size: usize,
    current: Option<OpenFile>,
    files_opened: usize,
}

impl RecordSource {
    /// List `*.parquet` files under `dir`, sorted by file name.
    pub fn open(
        dir: impl AsRef<Path>,
        columns: Option<Vec<String>>,
        batch_size: usize,
    ) -> SourceResult<Self> {
        let files = list_parquet_files(dir.as_ref())?;
        info!(
            "Found {} Parquet file(s) in {}",
            files.len(),
            dir.as_ref().display()
        );
        Ok(Self {
            pending: files.into(),
            columns,
            batch_size: batch_size.max(1),
            current: None,
            files_opened: 0,
        })
    }

    /// Files not yet opened
    pub fn remaining_files(&self) -> usize {
        self.pending.len()
    }

    /// Files opened so far
    pub fn files_opened(&self) -> usize {
        self.files_opened
    }

    fn open_file(&self, path: PathBuf) -> SourceResult<OpenFile> {
        let file = File::open(&path).map_err(|source| SourceError::Open {
            path: path.clone(),
            source,
        })?;
        let builder =
            ParquetRecordBatchReaderBuilder::try_new(file).map_err(|source| SourceError::Corrupt {
                path: path.clone(),
                source,
            })?;

        let mode = ExtractionMode::detect(builder.schema());
        let indices = mode.projection(builder.schema(), self.columns.as_deref());
        let mask = ProjectionMask::roots(builder.parquet_schema(), indices.iter().copied());

        info!(
            file = %path.display(),
            mode = ?mode,
            rows = builder.metadata().file_metadata().num_rows(),
            columns = indices.len(),
            "Reading file"
        );

        let reader = builder
            .with_projection(mask)
            .with_batch_size(self.batch_size)
            .build()
            .map_err(|source| SourceError::Corrupt {
                path: path.clone(),
                source,
            })?;

        Ok(OpenFile { path, mode, reader })
    }
}

impl Iterator for RecordSource {
    type Item = SourceResult<SourceBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                let path = self.pending.pop_front()?;
                match self.open_file(path) {
                    Ok(open) => {
                        self.files_opened += 1;
                        self.current = Some(open);
                    }
                    Err(e) => return Some(Err(e)),
                }
            }

            let open = self.current.as_mut()?;
            match open.reader.next() {
                Some(Ok(batch)) => {
                    debug!(file = %open.path.display(), rows = batch.num_rows(), "Decoded batch");
                    let (batch, expand) = match open.mode {
                        ExtractionMode::Raw => expand_purchases(batch, self.columns.as_deref()),
                        ExtractionMode::Clean => (batch, ExpandReport::default()),
                    };
                    return Some(Ok(SourceBatch {
                        file: open.path.clone(),
                        mode: open.mode,
                        batch,
                        expand,
                    }));
                }
                Some(Err(source)) => {
                    let path = open.path.clone();
                    self.current = None;
                    return Some(Err(SourceError::Decode { path, source }));
                }
                None => {
                    self.current = None;
                }
            }
        }
    }
}

/// List all .parquet files in a directory, sorted by name.
pub fn list_parquet_files(dir: &Path) -> SourceResult<Vec<PathBuf>> {
    let read_dir = |source| SourceError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_dir)? {
        let path = entry.map_err(read_dir)?.path();
        let is_parquet = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"));
        if is_parquet && path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
