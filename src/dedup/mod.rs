//! Approximate deduplication
//!
//! - `fingerprint`: SHA-256 digests of a record's identity fields
//! - `bloom`: fixed and scalable bloom filters over fingerprints
//!
//! The batch algorithm only depends on [`MembershipFilter`], so any
//! structure with the same contract (no false negatives, bounded false
//! positives) can stand in for the scalable bloom filter.

pub mod bloom;
pub mod fingerprint;

pub use bloom::{BloomFilter, ScalableBloomFilter};
pub use fingerprint::{fingerprint_batch, Fingerprint};

use arrow::array::BooleanArray;
use arrow::compute::filter_record_batch;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use tracing::{debug, warn};

/// Probabilistic set of fingerprints
///
/// Implementations must never forget an inserted fingerprint. They may
/// report an unseen fingerprint as present at their configured rate.
pub trait MembershipFilter {
    /// Returns true if `fp` was probably inserted before, then records it.
    fn contains_then_insert(&mut self, fp: &Fingerprint) -> bool;

    /// Number of distinct fingerprints recorded
    fn len(&self) -> usize;

    /// Returns true if nothing was recorded
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of deduplicating one batch
#[derive(Debug)]
pub struct DedupOutcome {
    /// Rows that were not seen before, in input order
    pub batch: RecordBatch,

    /// Rows dropped as probable duplicates
    pub duplicates: usize,

    /// False if the batch had no identity columns and passed through untouched
    pub checked: bool,
}

/// Drop every row whose fingerprint the filter has probably seen.
///
/// Rows repeated within the same batch are caught as well, since each row
/// is recorded before the next one is checked.
pub fn dedup_batch<F: MembershipFilter + ?Sized>(
    batch: RecordBatch,
    filter: &mut F,
) -> Result<DedupOutcome, ArrowError> {
    let fingerprints = match fingerprint_batch(&batch)? {
        Some(fps) => fps,
        None => {
            warn!(
                rows = batch.num_rows(),
                "Batch lacks identity columns, skipping deduplication"
            );
            return Ok(DedupOutcome {
                batch,
                duplicates: 0,
                checked: false,
            });
        }
    };

    let keep: Vec<bool> = fingerprints
        .iter()
        .map(|fp| !filter.contains_then_insert(fp))
        .collect();
    let duplicates = keep.iter().filter(|k| !**k).count();

    if duplicates == 0 {
        return Ok(DedupOutcome {
            batch,
            duplicates,
            checked: true,
        });
    }

    debug!(duplicates, rows = batch.num_rows(), "Dropping duplicate rows");
    let batch = filter_record_batch(&batch, &BooleanArray::from(keep))?;
    Ok(DedupOutcome {
        batch,
        duplicates,
        checked: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, AsArray, StringArray, UInt32Array};
    use arrow::datatypes::{DataType, Field, Schema, UInt32Type};
    use std::collections::HashSet;
    use std::sync::Arc;

    /// Exact set, for checking the batch algorithm in isolation
    #[derive(Default)]
    struct ExactSet(HashSet<Fingerprint>);

    impl MembershipFilter for ExactSet {
        fn contains_then_insert(&mut self, fp: &Fingerprint) -> bool {
            !self.0.insert(*fp)
        }

        fn len(&self) -> usize {
            self.0.len()
        }
    }

    fn users(ids: Vec<u32>, names: Vec<&str>) -> RecordBatch {
        let logins = vec!["2020-01-01"; ids.len()];
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::UInt32, true),
            Field::new("last_login", DataType::Utf8, true),
            Field::new("user_name", DataType::Utf8, true),
        ]));
        let columns: Vec<ArrayRef> = vec![
            Arc::new(UInt32Array::from(ids)),
            Arc::new(StringArray::from(logins)),
            Arc::new(StringArray::from(names)),
        ];
        RecordBatch::try_new(schema, columns).unwrap()
    }

    fn ids(batch: &RecordBatch) -> Vec<u32> {
        batch
            .column_by_name("id")
            .unwrap()
            .as_primitive::<UInt32Type>()
            .values()
            .to_vec()
    }

    #[test]
    fn test_duplicate_across_batches() {
        let mut filter = ScalableBloomFilter::new(1e-4);

        let first = dedup_batch(users(vec![1, 2], vec!["alice", "bob"]), &mut filter).unwrap();
        assert_eq!(first.duplicates, 0);
        assert_eq!(first.batch.num_rows(), 2);

        let second = dedup_batch(users(vec![3, 1], vec!["carol", "alice"]), &mut filter).unwrap();
        assert_eq!(second.duplicates, 1);
        assert_eq!(ids(&second.batch), vec![3]);
    }

    #[test]
    fn test_duplicate_within_batch_keeps_first() {
        let mut filter = ExactSet::default();
        let out = dedup_batch(
            users(vec![5, 6, 5, 7], vec!["e", "f", "e", "g"]),
            &mut filter,
        )
        .unwrap();
        assert_eq!(out.duplicates, 1);
        assert_eq!(ids(&out.batch), vec![5, 6, 7]);
        assert_eq!(filter.len(), 3);
    }

    #[test]
    fn test_order_preserved_without_duplicates() {
        let mut filter = ExactSet::default();
        let input = vec![9, 3, 7, 1, 8];
        let out = dedup_batch(
            users(input.clone(), vec!["a", "b", "c", "d", "e"]),
            &mut filter,
        )
        .unwrap();
        assert_eq!(ids(&out.batch), input);
    }

    #[test]
    fn test_batch_without_identity_passes_through() {
        let schema = Arc::new(Schema::new(vec![Field::new("age", DataType::UInt32, true)]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(UInt32Array::from(vec![1u32, 1])) as ArrayRef],
        )
        .unwrap();
        let mut filter = ExactSet::default();
        let out = dedup_batch(batch, &mut filter).unwrap();
        assert!(!out.checked);
        assert_eq!(out.batch.num_rows(), 2);
        assert!(filter.is_empty());
    }
}
