//! Per-batch cleaning stages
//!
//! - `normalize`: coerce recognized columns to narrow canonical types
//! - `quality`: drop incomplete rows and IQR outliers

pub mod normalize;
pub mod quality;

pub use normalize::normalize_batch;
pub use quality::{filter_quality, FilterReport, IqrBounds};

use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

/// Keep only the target columns present in the batch, in target order.
pub fn select_columns(batch: &RecordBatch, targets: &[String]) -> Result<RecordBatch, ArrowError> {
    let schema = batch.schema();
    let indices: Vec<usize> = targets
        .iter()
        .filter_map(|name| schema.index_of(name).ok())
        .collect();
    batch.project(&indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Int32Array};
    use std::sync::Arc;

    #[test]
    fn test_select_columns_orders_and_filters() {
        let col = |v: i32| Arc::new(Int32Array::from(vec![v])) as ArrayRef;
        let batch = RecordBatch::try_from_iter(vec![
            ("extra", col(0)),
            ("age", col(1)),
            ("id", col(2)),
        ])
        .unwrap();

        let targets: Vec<String> = ["id", "user_name", "age"].iter().map(|s| s.to_string()).collect();
        let out = select_columns(&batch, &targets).unwrap();
        let names: Vec<&str> = out
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect();
        assert_eq!(names, vec!["id", "age"]);
    }
}
