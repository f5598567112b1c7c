//! Narrow-type coercion
//!
//! Every recognized column is cast to its canonical type (see
//! [`crate::schema::canonical_type`]). Casts are strict: a value that
//! overflows or cannot be parsed fails the whole column, which then keeps
//! its original type. Nothing here drops rows or returns an error.

use crate::error::CastOutcome;
use crate::schema::canonical_type;
use arrow::array::ArrayRef;
use arrow::compute::{cast_with_options, CastOptions};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use std::sync::Arc;
use tracing::{debug, warn};

/// Coerce the recognized columns of a batch.
///
/// Returns the (possibly) retyped batch plus one outcome per recognized
/// column present. Unrecognized columns are not reported.
pub fn normalize_batch(batch: RecordBatch) -> (RecordBatch, Vec<CastOutcome>) {
    let schema = batch.schema();
    let mut outcomes = Vec::new();
    let mut fields = Vec::with_capacity(schema.fields().len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(batch.num_columns());
    let mut changed = false;

    let options = CastOptions {
        safe: false,
        ..Default::default()
    };

    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        let name = field.name();
        let Some(target) = canonical_type(name) else {
            fields.push(field.clone());
            columns.push(column.clone());
            continue;
        };

        if field.data_type() == &target {
            outcomes.push(CastOutcome::Unchanged {
                column: name.clone(),
            });
            fields.push(field.clone());
            columns.push(column.clone());
            continue;
        }

        match cast_with_options(column.as_ref(), &target, &options) {
            Ok(cast) => {
                debug!(column = %name, from = %field.data_type(), to = %target, "Column cast");
                outcomes.push(CastOutcome::Cast {
                    column: name.clone(),
                });
                fields.push(Arc::new(
                    Field::new(name, target, field.is_nullable())
                        .with_metadata(field.metadata().clone()),
                ));
                columns.push(cast);
                changed = true;
            }
            Err(e) => {
                warn!(column = %name, from = %field.data_type(), to = %target, error = %e, "Cast failed, keeping original type");
                outcomes.push(CastOutcome::Failed {
                    column: name.clone(),
                    reason: e.to_string(),
                });
                fields.push(field.clone());
                columns.push(column.clone());
            }
        }
    }

    if !changed {
        return (batch, outcomes);
    }

    let new_schema = Arc::new(Schema::new_with_metadata(
        fields,
        schema.metadata().clone(),
    ));
    let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
    match RecordBatch::try_new_with_options(new_schema, columns, &options) {
        Ok(normalized) => (normalized, outcomes),
        Err(e) => {
            // Casts preserve length, so this only trips on a broken invariant.
            warn!(error = %e, "Could not assemble normalized batch, keeping original");
            (batch, outcomes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::categorical;
    use arrow::array::{Array, Float64Array, Int64Array, StringArray};
    use arrow::datatypes::DataType;

    fn batch_of(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
        RecordBatch::try_from_iter(columns).unwrap()
    }

    #[test]
    fn test_casts_recognized_columns() {
        let batch = batch_of(vec![
            ("id", Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef),
            ("age", Arc::new(Int64Array::from(vec![30, 41])) as ArrayRef),
            ("income", Arc::new(Float64Array::from(vec![1.5, 2.5])) as ArrayRef),
            ("country", Arc::new(StringArray::from(vec!["DE", "DE"])) as ArrayRef),
            ("is_active", Arc::new(StringArray::from(vec!["true", "false"])) as ArrayRef),
            ("user_name", Arc::new(StringArray::from(vec!["a", "b"])) as ArrayRef),
        ]);

        let (out, outcomes) = normalize_batch(batch);
        let schema = out.schema();
        assert_eq!(schema.field_with_name("id").unwrap().data_type(), &DataType::UInt32);
        assert_eq!(schema.field_with_name("age").unwrap().data_type(), &DataType::UInt8);
        assert_eq!(schema.field_with_name("income").unwrap().data_type(), &DataType::Float32);
        assert_eq!(schema.field_with_name("country").unwrap().data_type(), &categorical());
        assert_eq!(schema.field_with_name("is_active").unwrap().data_type(), &DataType::Boolean);
        assert_eq!(schema.field_with_name("user_name").unwrap().data_type(), &DataType::Utf8);

        assert_eq!(outcomes.len(), 5);
        assert!(outcomes.iter().all(|o| matches!(o, CastOutcome::Cast { .. })));
    }

    #[test]
    fn test_overflow_keeps_original_type() {
        let batch = batch_of(vec![
            ("age", Arc::new(Int64Array::from(vec![30, 300])) as ArrayRef),
            ("id", Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef),
        ]);

        let (out, outcomes) = normalize_batch(batch);
        assert_eq!(out.num_rows(), 2);
        assert_eq!(out.schema().field(0).data_type(), &DataType::Int64);
        assert_eq!(out.schema().field(1).data_type(), &DataType::UInt32);

        let failed: Vec<&str> = outcomes
            .iter()
            .filter(|o| o.is_failure())
            .map(|o| o.column())
            .collect();
        assert_eq!(failed, vec!["age"]);
    }

    #[test]
    fn test_unparsable_strings_fail_column() {
        let batch = batch_of(vec![(
            "income",
            Arc::new(StringArray::from(vec!["12.5", "lots"])) as ArrayRef,
        )]);
        let (out, outcomes) = normalize_batch(batch);
        assert_eq!(out.schema().field(0).data_type(), &DataType::Utf8);
        assert!(outcomes[0].is_failure());
    }

    #[test]
    fn test_already_canonical_is_unchanged() {
        let batch = batch_of(vec![(
            "income",
            Arc::new(arrow::array::Float32Array::from(vec![1.0f32])) as ArrayRef,
        )]);
        let (_, outcomes) = normalize_batch(batch);
        assert_eq!(
            outcomes,
            vec![CastOutcome::Unchanged {
                column: "income".into()
            }]
        );
    }

    #[test]
    fn test_nulls_survive_cast() {
        let batch = batch_of(vec![(
            "age",
            Arc::new(Int64Array::from(vec![Some(20), None])) as ArrayRef,
        )]);
        let (out, _) = normalize_batch(batch);
        assert_eq!(out.column(0).null_count(), 1);
        assert_eq!(out.schema().field(0).data_type(), &DataType::UInt8);
    }
}
