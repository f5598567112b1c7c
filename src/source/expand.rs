//! Nested purchase blob expansion
//!
//! Raw-shaped files carry a `purchase_history` text column holding one JSON
//! object per row. This module flattens it into the purchase columns named in
//! [`PURCHASE_RENAMES`]. A row whose blob does not parse loses its purchase
//! data but is otherwise kept; a batch whose blob column cannot be processed
//! at all is returned without the blob column.

use crate::error::ExpandError;
use crate::schema::{PURCHASE_HISTORY, PURCHASE_RENAMES};
use arrow::array::{
    Array, ArrayRef, AsArray, Float64Builder, ListBuilder, StringArray, StringBuilder,
};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// What happened to the blob column of one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpandReport {
    /// Rows whose blob was present but not a JSON object
    pub parse_failures: usize,

    /// The whole batch fell back to dropping the blob column
    pub degraded: bool,
}

/// Expand `purchase_history` into flat purchase columns.
///
/// Only flattened columns listed in `requested` are kept (all of them when
/// `requested` is `None`). Batches without a blob column pass through.
pub fn expand_purchases(
    batch: RecordBatch,
    requested: Option<&[String]>,
) -> (RecordBatch, ExpandReport) {
    if batch.schema().index_of(PURCHASE_HISTORY).is_err() {
        return (batch, ExpandReport::default());
    }

    match try_expand(&batch, requested) {
        Ok((expanded, parse_failures)) => {
            if parse_failures > 0 {
                debug!(parse_failures, "Unparsable purchase blobs dropped");
            }
            (
                expanded,
                ExpandReport {
                    parse_failures,
                    degraded: false,
                },
            )
        }
        Err(e) => {
            warn!(error = %e, rows = batch.num_rows(), "Purchase expansion failed, dropping blob column");
            (
                drop_column(&batch, PURCHASE_HISTORY),
                ExpandReport {
                    parse_failures: 0,
                    degraded: true,
                },
            )
        }
    }
}

/// Remove a column by name; the batch is returned unchanged if it is absent.
pub fn drop_column(batch: &RecordBatch, name: &str) -> RecordBatch {
    let schema = batch.schema();
    let indices: Vec<usize> = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| f.name() != name)
        .map(|(i, _)| i)
        .collect();
    // Projecting existing indices of a valid batch cannot fail.
    batch.project(&indices).unwrap_or_else(|_| batch.clone())
}

/// Builders for the flattened purchase columns, one slot per row.
struct PurchaseColumns {
    avg_price: Float64Builder,
    categories: StringBuilder,
    items: ListBuilder<StringBuilder>,
    payment_method: StringBuilder,
    payment_status: StringBuilder,
    purchase_date: StringBuilder,
}

impl PurchaseColumns {
    fn with_capacity(rows: usize) -> Self {
        Self {
            avg_price: Float64Builder::with_capacity(rows),
            categories: StringBuilder::with_capacity(rows, rows * 8),
            items: ListBuilder::new(StringBuilder::new()),
            payment_method: StringBuilder::with_capacity(rows, rows * 8),
            payment_status: StringBuilder::with_capacity(rows, rows * 8),
            purchase_date: StringBuilder::with_capacity(rows, rows * 10),
        }
    }

    fn append_null(&mut self) {
        self.avg_price.append_null();
        self.categories.append_null();
        self.items.append_null();
        self.payment_method.append_null();
        self.payment_status.append_null();
        self.purchase_date.append_null();
    }

    fn append_object(&mut self, obj: &Map<String, Value>) {
        self.avg_price.append_option(obj.get("avg_price").and_then(number));
        self.categories.append_option(obj.get("categories").and_then(text));
        append_items(&mut self.items, obj.get("items"));
        self.payment_method.append_option(obj.get("payment_method").and_then(text));
        self.payment_status.append_option(obj.get("payment_status").and_then(text));
        self.purchase_date.append_option(obj.get("purchase_date").and_then(text));
    }

    /// Finished arrays keyed by flattened column name
    fn finish(mut self) -> Vec<(&'static str, ArrayRef)> {
        let arrays: [ArrayRef; 6] = [
            Arc::new(self.avg_price.finish()),
            Arc::new(self.categories.finish()),
            Arc::new(self.items.finish()),
            Arc::new(self.payment_method.finish()),
            Arc::new(self.payment_status.finish()),
            Arc::new(self.purchase_date.finish()),
        ];
        PURCHASE_RENAMES
            .iter()
            .map(|(_, flat)| *flat)
            .zip(arrays)
            .collect()
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Items become a list of item ids; object elements contribute their `id`.
fn append_items(builder: &mut ListBuilder<StringBuilder>, value: Option<&Value>) {
    match value {
        Some(Value::Array(items)) => {
            for item in items {
                let id = match item {
                    Value::Object(obj) => obj.get("id").and_then(text),
                    other => text(other),
                };
                if let Some(id) = id {
                    builder.values().append_value(id);
                }
            }
            builder.append(true);
        }
        _ => builder.append_null(),
    }
}

fn blob_strings(column: &ArrayRef) -> Result<StringArray, ExpandError> {
    match column.data_type() {
        DataType::Utf8 => Ok(column.as_string::<i32>().clone()),
        DataType::LargeUtf8 | DataType::Utf8View | DataType::Binary | DataType::LargeBinary => {
            let converted = cast(column.as_ref(), &DataType::Utf8).map_err(|e| {
                ExpandError::UnsupportedBlobType {
                    data_type: column.data_type().clone(),
                    reason: e.to_string(),
                }
            })?;
            Ok(converted.as_string::<i32>().clone())
        }
        other => Err(ExpandError::UnsupportedBlobType {
            data_type: other.clone(),
            reason: "expected a text column".to_string(),
        }),
    }
}

fn try_expand(
    batch: &RecordBatch,
    requested: Option<&[String]>,
) -> Result<(RecordBatch, usize), ExpandError> {
    let schema = batch.schema();
    let blob_idx = schema.index_of(PURCHASE_HISTORY)?;
    let blobs = blob_strings(batch.column(blob_idx))?;

    let mut purchases = PurchaseColumns::with_capacity(batch.num_rows());
    let mut parse_failures = 0;
    for row in blobs.iter() {
        match row {
            None => purchases.append_null(),
            Some(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(obj)) => purchases.append_object(&obj),
                Ok(Value::Null) => purchases.append_null(),
                _ => {
                    parse_failures += 1;
                    purchases.append_null();
                }
            },
        }
    }

    let mut fields: Vec<Arc<Field>> = Vec::with_capacity(schema.fields().len() + 6);
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len() + 6);
    for (i, field) in schema.fields().iter().enumerate() {
        if i != blob_idx {
            fields.push(field.clone());
            columns.push(batch.column(i).clone());
        }
    }

    for (name, array) in purchases.finish() {
        let wanted = requested.map_or(true, |cols| cols.iter().any(|c| c == name));
        if !wanted {
            continue;
        }
        if fields.iter().any(|f| f.name() == name) {
            warn!(column = name, "Flattened column already present, keeping original");
            continue;
        }
        fields.push(Arc::new(Field::new(name, array.data_type().clone(), true)));
        columns.push(array);
    }

    let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
    let expanded = RecordBatch::try_new_with_options(
        Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone())),
        columns,
        &options,
    )?;
    Ok((expanded, parse_failures))
}
