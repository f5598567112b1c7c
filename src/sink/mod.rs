//! Output side: numbered Parquet chunk files

pub mod writer;

pub use writer::ChunkWriter;
