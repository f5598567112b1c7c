//! Input side: streaming Parquet decoding and purchase blob expansion

pub mod expand;
pub mod reader;

pub use expand::{expand_purchases, ExpandReport};
pub use reader::{list_parquet_files, ExtractionMode, RecordSource, SourceBatch};
