//! Completeness and outlier filtering
//!
//! Two passes over a deduplicated batch:
//! 1. rows missing any mandatory value are dropped;
//! 2. for each screened numeric column in turn, rows outside
//!    `[Q1 - 1.5*IQR, Q3 + 1.5*IQR]` are dropped, with the quartiles taken
//!    over the rows that survived the previous columns of this batch only.
//!
//! Quartiles use linear interpolation between closest ranks. Bounds are
//! inclusive, so a batch whose values are all equal (including a single
//! row) keeps every row.

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray};
use arrow::compute::{cast, filter_record_batch};
use arrow::datatypes::{DataType, Float32Type, Float64Type};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use tracing::{debug, warn};

/// IQR multiplier
const IQR_FACTOR: f64 = 1.5;

/// Rows dropped by each pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterReport {
    /// Rows with at least one missing mandatory value
    pub missing: usize,

    /// Outliers per screened column, in screening order
    pub outliers: Vec<(String, usize)>,
}

/// Admissible range for one column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqrBounds {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrBounds {
    /// Bounds from the non-NaN values of a column; `None` if there are none.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let q1 = quantile(&sorted, 0.25);
        let q3 = quantile(&sorted, 0.75);
        let iqr = q3 - q1;
        Some(Self {
            q1,
            q3,
            lower: q1 - IQR_FACTOR * iqr,
            upper: q3 + IQR_FACTOR * iqr,
        })
    }

    /// Inclusive range check
    pub fn admits(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Quantile of sorted data with linear interpolation at `(n - 1) * q`.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let pos = (sorted.len() - 1) as f64 * q;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (sorted[hi] - sorted[lo]) * frac
    }
}

/// Run both passes.
pub fn filter_quality(
    batch: RecordBatch,
    mandatory: &[String],
    outlier_columns: &[String],
) -> Result<(RecordBatch, FilterReport), ArrowError> {
    let (batch, missing) = drop_incomplete(batch, mandatory)?;
    let (batch, outliers) = drop_outliers(batch, outlier_columns)?;
    Ok((batch, FilterReport { missing, outliers }))
}

/// Drop rows with a null (or NaN) in any mandatory column.
///
/// A mandatory column absent from the batch is missing for every row.
pub fn drop_incomplete(
    batch: RecordBatch,
    mandatory: &[String],
) -> Result<(RecordBatch, usize), ArrowError> {
    let rows = batch.num_rows();
    if rows == 0 || mandatory.is_empty() {
        return Ok((batch, 0));
    }

    let mut keep = vec![true; rows];
    for name in mandatory {
        match batch.column_by_name(name) {
            Some(col) => mark_missing(col, &mut keep),
            None => {
                warn!(column = %name, "Mandatory column absent from batch, dropping all rows");
                keep.iter_mut().for_each(|k| *k = false);
                break;
            }
        }
    }

    let dropped = keep.iter().filter(|k| !**k).count();
    if dropped == 0 {
        return Ok((batch, 0));
    }
    debug!(dropped, "Dropping rows with missing mandatory fields");
    let batch = filter_record_batch(&batch, &BooleanArray::from(keep))?;
    Ok((batch, dropped))
}

fn mark_missing(col: &ArrayRef, keep: &mut [bool]) {
    match col.data_type() {
        DataType::Float32 => {
            let values = col.as_primitive::<Float32Type>();
            for (i, k) in keep.iter_mut().enumerate() {
                if values.is_null(i) || values.value(i).is_nan() {
                    *k = false;
                }
            }
        }
        DataType::Float64 => {
            let values = col.as_primitive::<Float64Type>();
            for (i, k) in keep.iter_mut().enumerate() {
                if values.is_null(i) || values.value(i).is_nan() {
                    *k = false;
                }
            }
        }
        _ => {
            if col.null_count() == 0 {
                return;
            }
            for (i, k) in keep.iter_mut().enumerate() {
                if col.is_null(i) {
                    *k = false;
                }
            }
        }
    }
}

/// Drop IQR outliers column by column.
///
/// Screened columns absent from the batch, or not numeric, are skipped.
/// A null or NaN value is never inside the bounds, so its row is dropped
/// and counted with the column. A column with no finite values at all has
/// no bounds and loses every row.
pub fn drop_outliers(
    mut batch: RecordBatch,
    columns: &[String],
) -> Result<(RecordBatch, Vec<(String, usize)>), ArrowError> {
    let mut report = Vec::with_capacity(columns.len());

    for name in columns {
        let Some(col) = batch.column_by_name(name) else {
            continue;
        };
        if !col.data_type().is_numeric() {
            warn!(column = %name, data_type = %col.data_type(), "Column is not numeric, skipping outlier screen");
            continue;
        }

        let values = cast(col.as_ref(), &DataType::Float64)?;
        let values = values.as_primitive::<Float64Type>();
        let present: Vec<f64> = values.iter().flatten().collect();
        let bounds = IqrBounds::from_values(&present);

        let keep: Vec<bool> = values
            .iter()
            .map(|v| match (v, &bounds) {
                (Some(v), Some(bounds)) => bounds.admits(v),
                _ => false,
            })
            .collect();
        let dropped = keep.iter().filter(|k| !**k).count();
        match &bounds {
            Some(b) => debug!(
                column = %name,
                q1 = b.q1,
                q3 = b.q3,
                lower = b.lower,
                upper = b.upper,
                dropped,
                "Outlier screen"
            ),
            None if dropped > 0 => {
                warn!(column = %name, dropped, "Column has no finite values, dropping all rows")
            }
            None => {}
        }

        if dropped > 0 {
            batch = filter_record_batch(&batch, &BooleanArray::from(keep))?;
        }
        report.push((name.clone(), dropped));
    }

    Ok((batch, report))
}
