//! Bloom filters over record fingerprints
//!
//! [`BloomFilter`] is a fixed-capacity partitioned filter: the bit array is
//! split into `k` equal slices and each element sets exactly one bit per
//! slice. [`ScalableBloomFilter`] chains such filters, opening a larger and
//! stricter layer whenever the active one reaches capacity, so the compound
//! false-positive rate stays below the configured bound however many
//! fingerprints are inserted.

use super::fingerprint::Fingerprint;
use super::MembershipFilter;

/// Default capacity of the first layer
pub const DEFAULT_INITIAL_CAPACITY: usize = 100;

/// Capacity multiplier between consecutive layers
pub const DEFAULT_GROWTH: usize = 2;

/// Error-rate multiplier between consecutive layers
pub const DEFAULT_TIGHTENING: f64 = 0.9;

/// Fixed-capacity partitioned bloom filter
#[derive(Debug, Clone)]
pub struct BloomFilter {
    capacity: usize,
    error_rate: f64,
    num_slices: usize,
    bits_per_slice: usize,
    seed: u64,
    bits: Vec<u64>,
    count: usize,
}

impl BloomFilter {
    /// Size a filter for `capacity` elements at false-positive rate `error_rate`.
    ///
    /// `seed` decorrelates the bit positions of filters that see the same
    /// fingerprints.
    pub fn new(capacity: usize, error_rate: f64, seed: u64) -> Self {
        let capacity = capacity.max(1);
        let error_rate = error_rate.clamp(f64::MIN_POSITIVE, 0.5);

        let num_slices = (1.0 / error_rate).log2().ceil().max(1.0) as usize;
        let ln2_sq = std::f64::consts::LN_2 * std::f64::consts::LN_2;
        let bits_per_slice =
            ((capacity as f64 * error_rate.ln().abs()) / (num_slices as f64 * ln2_sq)).ceil() as usize;
        let bits_per_slice = bits_per_slice.max(1);

        let total_bits = num_slices * bits_per_slice;
        Self {
            capacity,
            error_rate,
            num_slices,
            bits_per_slice,
            seed,
            bits: vec![0u64; total_bits.div_ceil(64)],
            count: 0,
        }
    }

    /// Maximum elements before the error bound no longer holds
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Configured false-positive rate
    pub fn error_rate(&self) -> f64 {
        self.error_rate
    }

    /// Elements inserted so far
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if nothing was inserted
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns true once the filter holds `capacity` elements
    pub fn is_full(&self) -> bool {
        self.count >= self.capacity
    }

    /// Number of hash slices (k)
    pub fn num_slices(&self) -> usize {
        self.num_slices
    }

    /// Total size of the bit array
    pub fn num_bits(&self) -> usize {
        self.num_slices * self.bits_per_slice
    }

    /// Check membership without inserting.
    pub fn contains(&self, fp: &Fingerprint) -> bool {
        self.positions(fp).all(|bit| self.bits[bit / 64] & (1u64 << (bit % 64)) != 0)
    }

    /// Insert a fingerprint. Returns true if every bit was already set.
    pub fn insert(&mut self, fp: &Fingerprint) -> bool {
        let mut present = true;
        let positions: Vec<usize> = self.positions(fp).collect();
        for bit in positions {
            let word = &mut self.bits[bit / 64];
            let mask = 1u64 << (bit % 64);
            if *word & mask == 0 {
                present = false;
                *word |= mask;
            }
        }
        if !present {
            self.count += 1;
        }
        present
    }

    /// Bit positions for a fingerprint, one per slice (enhanced double hashing).
    fn positions<'a>(&'a self, fp: &Fingerprint) -> impl Iterator<Item = usize> + 'a {
        let (h1, h2) = fp.hash_pair();
        let a = h1.wrapping_add(self.seed.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        let b = (h2 ^ self.seed.rotate_left(32)) | 1;
        let m = self.bits_per_slice as u64;

        (0..self.num_slices as u64).map(move |i| {
            let cubic = i.wrapping_mul(i).wrapping_mul(i).wrapping_sub(i) / 6;
            let h = a.wrapping_add(i.wrapping_mul(b)).wrapping_add(cubic);
            (i * m + h % m) as usize
        })
    }
}

/// Bloom filter that grows by adding layers
#[derive(Debug, Clone)]
pub struct ScalableBloomFilter {
    error_rate: f64,
    initial_capacity: usize,
    growth: usize,
    tightening: f64,
    layers: Vec<BloomFilter>,
}

impl ScalableBloomFilter {
    /// Filter with the default layer schedule.
    pub fn new(error_rate: f64) -> Self {
        Self::with_schedule(
            error_rate,
            DEFAULT_INITIAL_CAPACITY,
            DEFAULT_GROWTH,
            DEFAULT_TIGHTENING,
        )
    }

    /// Filter with an explicit layer schedule.
    ///
    /// Layer `i` holds `initial_capacity * growth^i` elements at rate
    /// `error_rate * (1 - tightening) * tightening^i`; the rates sum to at
    /// most `error_rate`.
    pub fn with_schedule(
        error_rate: f64,
        initial_capacity: usize,
        growth: usize,
        tightening: f64,
    ) -> Self {
        Self {
            error_rate,
            initial_capacity: initial_capacity.max(1),
            growth: growth.max(2),
            tightening: tightening.clamp(0.01, 0.99),
            layers: Vec::new(),
        }
    }

    /// Configured compound false-positive rate
    pub fn error_rate(&self) -> f64 {
        self.error_rate
    }

    /// Number of layers allocated so far
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Sum of layer capacities
    pub fn capacity(&self) -> usize {
        self.layers.iter().map(BloomFilter::capacity).sum()
    }

    /// Bytes held by all layers' bit arrays
    pub fn memory_bytes(&self) -> usize {
        self.layers.iter().map(|l| l.bits.len() * 8).sum()
    }

    /// Check membership without inserting.
    pub fn contains(&self, fp: &Fingerprint) -> bool {
        self.layers.iter().rev().any(|layer| layer.contains(fp))
    }

    fn active_layer(&mut self) -> &mut BloomFilter {
        let needs_layer = self.layers.last().map_or(true, BloomFilter::is_full);
        if needs_layer {
            let layer = match self.layers.last() {
                None => BloomFilter::new(
                    self.initial_capacity,
                    self.error_rate * (1.0 - self.tightening),
                    0,
                ),
                Some(last) => BloomFilter::new(
                    last.capacity() * self.growth,
                    last.error_rate() * self.tightening,
                    self.layers.len() as u64,
                ),
            };
            self.layers.push(layer);
        }
        let idx = self.layers.len() - 1;
        &mut self.layers[idx]
    }
}

impl MembershipFilter for ScalableBloomFilter {
    fn contains_then_insert(&mut self, fp: &Fingerprint) -> bool {
        if self.contains(fp) {
            return true;
        }
        self.active_layer().insert(fp);
        false
    }

    fn len(&self) -> usize {
        self.layers.iter().map(BloomFilter::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(n: u64) -> Fingerprint {
        Fingerprint::from_parts(&[n.to_string(), "2020-01-01".to_string(), "user".to_string()])
    }

    #[test]
    fn test_sizing() {
        let filter = BloomFilter::new(1000, 0.001, 0);
        // ceil(log2(1000)) = 10
        assert_eq!(filter.num_slices(), 10);
        // ~1.44 * log2(1/p) bits per element
        let bits_per_elem = filter.num_bits() as f64 / 1000.0;
        assert!(bits_per_elem > 14.0 && bits_per_elem < 15.0, "{bits_per_elem}");
    }

    #[test]
    fn test_insert_then_contains() {
        let mut filter = BloomFilter::new(100, 0.01, 0);
        assert!(filter.is_empty());
        assert!(!filter.insert(&fp(1)));
        assert!(filter.contains(&fp(1)));
        assert!(filter.insert(&fp(1)));
        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn test_no_false_negatives_across_layers() {
        let mut filter = ScalableBloomFilter::new(1e-4);
        for n in 0..5_000 {
            filter.contains_then_insert(&fp(n));
        }
        assert!(filter.num_layers() > 1);
        for n in 0..5_000 {
            assert!(filter.contains_then_insert(&fp(n)), "lost fingerprint {n}");
        }
    }

    #[test]
    fn test_layers_grow_and_tighten() {
        let mut filter = ScalableBloomFilter::with_schedule(0.01, 10, 2, 0.5);
        for n in 0..100 {
            filter.contains_then_insert(&fp(n));
        }
        let caps: Vec<usize> = filter.layers.iter().map(|l| l.capacity()).collect();
        assert_eq!(&caps[..3], &[10, 20, 40]);
        let rates: Vec<f64> = filter.layers.iter().map(|l| l.error_rate()).collect();
        assert!((rates[0] - 0.005).abs() < 1e-12);
        assert!((rates[1] - 0.0025).abs() < 1e-12);
        let total: f64 = rates.iter().sum();
        assert!(total <= 0.01);
    }

    #[test]
    fn test_bounded_false_positive_rate() {
        let error_rate = 1e-3;
        let mut filter = ScalableBloomFilter::new(error_rate);
        let inserted = 20_000u64;
        for n in 0..inserted {
            filter.contains_then_insert(&fp(n));
        }

        let probes = 20_000u64;
        let false_positives = (inserted..inserted + probes)
            .filter(|n| filter.contains(&fp(*n)))
            .count();
        let rate = false_positives as f64 / probes as f64;
        // Expected around 20 hits; allow a generous constant factor.
        assert!(rate <= error_rate * 5.0, "empirical rate {rate}");
    }

    #[test]
    fn test_len_counts_distinct_inserts() {
        let mut filter = ScalableBloomFilter::new(1e-4);
        let fresh = (0..250)
            .filter(|n| !filter.contains_then_insert(&fp(*n)))
            .count();
        assert!(fresh >= 249);
        assert!(filter.contains_then_insert(&fp(3)));
        assert_eq!(filter.len(), fresh);
        assert!(filter.capacity() >= 250);
        assert!(filter.memory_bytes() > 0);
    }
}
