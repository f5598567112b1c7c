//! Chunk writer
//!
//! Each cleaned batch becomes one self-contained Parquet file named
//! `clean_{index}.parquet`. Dictionary encoding is disabled so categorical
//! columns are stored as plain strings that any reader can open.

use crate::error::{SinkError, SinkResult};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes numbered chunk files into one output directory
#[derive(Debug)]
pub struct ChunkWriter {
    output_dir: PathBuf,
    compression: Compression,
}

impl ChunkWriter {
    /// Create the output directory (and parents) if needed.
    pub fn create(output_dir: impl Into<PathBuf>, compression: Compression) -> SinkResult<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir).map_err(|source| SinkError::CreateDir {
            path: output_dir.clone(),
            source,
        })?;
        Ok(Self {
            output_dir,
            compression,
        })
    }

    /// Output directory
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path of the chunk with the given index
    pub fn chunk_path(&self, index: usize) -> PathBuf {
        self.output_dir.join(format!("clean_{}.parquet", index))
    }

    /// Write one batch as chunk `index`, replacing any existing file.
    ///
    /// Returns the size of the written file in bytes.
    pub fn write_chunk(&self, index: usize, batch: &RecordBatch) -> SinkResult<u64> {
        let path = self.chunk_path(index);
        let file = File::create(&path).map_err(|source| SinkError::CreateFile {
            path: path.clone(),
            source,
        })?;

        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_dictionary_enabled(false)
            .build();

        let write_err = |source| SinkError::Write {
            path: path.clone(),
            source,
        };

        let mut writer =
            ArrowWriter::try_new(file, batch.schema(), Some(props)).map_err(write_err)?;
        writer.write(batch).map_err(write_err)?;
        writer.close().map_err(write_err)?;

        let bytes = fs::metadata(&path)
            .map_err(|source| SinkError::CreateFile {
                path: path.clone(),
                source,
            })?
            .len();

        debug!(chunk = index, rows = batch.num_rows(), bytes, "Wrote chunk");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, DictionaryArray, Int32Array, StringArray};
    use arrow::datatypes::Int32Type;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use parquet::basic::{Encoding, ZstdLevel};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn sample_batch() -> RecordBatch {
        let gender: DictionaryArray<Int32Type> = vec!["F", "M", "F"].into_iter().collect();
        RecordBatch::try_from_iter(vec![
            ("id", Arc::new(Int32Array::from(vec![1, 2, 3])) as ArrayRef),
            ("gender", Arc::new(gender) as ArrayRef),
            (
                "user_name",
                Arc::new(StringArray::from(vec!["alice", "bob", "carol"])) as ArrayRef,
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_creates_nested_output_dir() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("outputs").join("cleaned_chunks");
        let writer = ChunkWriter::create(&out, Compression::SNAPPY).unwrap();
        assert!(out.is_dir());
        assert_eq!(writer.chunk_path(7), out.join("clean_7.parquet"));
    }

    #[test]
    fn test_chunk_reads_back() {
        let dir = tempdir().unwrap();
        let writer =
            ChunkWriter::create(dir.path(), Compression::ZSTD(ZstdLevel::default())).unwrap();
        let batch = sample_batch();

        let bytes = writer.write_chunk(0, &batch).unwrap();
        assert!(bytes > 0);

        let file = File::open(writer.chunk_path(0)).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 3);
        assert_eq!(batches[0].schema().field(0).name(), "id");
    }

    #[test]
    fn test_dictionary_encoding_disabled() {
        let dir = tempdir().unwrap();
        let writer = ChunkWriter::create(dir.path(), Compression::UNCOMPRESSED).unwrap();
        writer.write_chunk(1, &sample_batch()).unwrap();

        let file = File::open(writer.chunk_path(1)).unwrap();
        let builder = ParquetRecordBatchReaderBuilder::try_new(file).unwrap();
        let column = builder.metadata().row_group(0).column(1);
        let uses_dictionary = column
            .encodings()
            .iter()
            .any(|e| matches!(e, Encoding::RLE_DICTIONARY | Encoding::PLAIN_DICTIONARY));
        assert!(!uses_dictionary);
    }

    #[test]
    fn test_empty_batch_writes_valid_file() {
        let dir = tempdir().unwrap();
        let writer = ChunkWriter::create(dir.path(), Compression::SNAPPY).unwrap();
        let empty = sample_batch().slice(0, 0);
        writer.write_chunk(2, &empty).unwrap();

        let file = File::open(writer.chunk_path(2)).unwrap();
        let builder = ParquetRecordBatchReaderBuilder::try_new(file).unwrap();
        assert_eq!(builder.metadata().file_metadata().num_rows(), 0);
    }
}
