//! Record fingerprints
//!
//! A fingerprint is the SHA-256 digest of a record's identity fields joined
//! with `_`. Values are rendered with Arrow's display formatter so the same
//! identity hashes identically whatever batch or file it arrives in.

use crate::schema::IDENTITY_COLUMNS;
use arrow::array::Array;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use sha2::{Digest, Sha256};
use std::fmt::{self, Write};

/// Separator between identity values
const SEPARATOR: u8 = b'_';

/// Fixed-length digest of a record's identity fields
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Hash already-rendered identity values.
    pub fn from_parts<S: AsRef<str>>(parts: &[S]) -> Self {
        let mut hasher = Sha256::new();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                hasher.update([SEPARATOR]);
            }
            hasher.update(part.as_ref().as_bytes());
        }
        Self(hasher.finalize().into())
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded digest (64 characters)
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Two 64-bit words taken from the digest, used to derive filter indices
    pub fn hash_pair(&self) -> (u64, u64) {
        let mut a = [0u8; 8];
        let mut b = [0u8; 8];
        a.copy_from_slice(&self.0[0..8]);
        b.copy_from_slice(&self.0[8..16]);
        (u64::from_le_bytes(a), u64::from_le_bytes(b))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..16])
    }
}

/// Fingerprint every row of a batch.
///
/// Returns `Ok(None)` when the batch lacks one of the identity columns; such
/// a batch cannot be deduplicated.
pub fn fingerprint_batch(batch: &RecordBatch) -> Result<Option<Vec<Fingerprint>>, ArrowError> {
    let mut columns = Vec::with_capacity(IDENTITY_COLUMNS.len());
    for name in IDENTITY_COLUMNS {
        match batch.column_by_name(name) {
            Some(col) => columns.push(col.clone()),
            None => return Ok(None),
        }
    }

    let options = FormatOptions::default();
    let formatters = columns
        .iter()
        .map(|col| ArrayFormatter::try_new(col.as_ref() as &dyn Array, &options))
        .collect::<Result<Vec<_>, _>>()?;

    let mut key = String::new();
    let mut out = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        key.clear();
        for (i, formatter) in formatters.iter().enumerate() {
            if i > 0 {
                key.push(SEPARATOR as char);
            }
            write!(key, "{}", formatter.value(row))
                .map_err(|e| ArrowError::ComputeError(e.to_string()))?;
        }
        out.push(Fingerprint(Sha256::digest(key.as_bytes()).into()));
    }

    Ok(Some(out))
}
