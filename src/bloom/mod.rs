//! Bloom-filter encoding of indicator sets.
//!
//! Each party turns its indicator list into a fixed-size bit vector before
//! encryption. Index derivation is deterministic across parties and runs:
//!
//! ```text
//! index(item, round) = SHA-256(item || decimal(round)) mod size
//! ```
//!
//! with the 256-bit digest read as a big-endian integer. One hash family with a
//! per-round salt stands in for `hash_count` independent functions.
//!
//! INVARIANTS:
//! - `bits[i] == 1` iff some inserted item hashed to `i` in some round
//! - Bits are monotone; there is no deletion
//! - No false negatives: every inserted item is reported as contained

use crate::error::{OverlapError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Filter geometry shared by both parties of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloomParams {
    /// Bit-vector length (m)
    pub size: usize,
    /// Hash rounds per item (k)
    pub hash_count: usize,
}

impl BloomParams {
    pub const DEFAULT_SIZE: usize = 10_000;
    pub const DEFAULT_HASH_COUNT: usize = 5;

    /// Validated constructor; zero size or zero hash count is rejected.
    pub fn new(size: usize, hash_count: usize) -> Result<Self> {
        if size == 0 {
            return Err(OverlapError::InvalidParameter(
                "Bloom filter size must be positive".to_string(),
            ));
        }
        if hash_count == 0 {
            return Err(OverlapError::InvalidParameter(
                "Bloom filter hash_count must be positive".to_string(),
            ));
        }
        Ok(Self { size, hash_count })
    }
}

impl Default for BloomParams {
    fn default() -> Self {
        Self {
            size: Self::DEFAULT_SIZE,
            hash_count: Self::DEFAULT_HASH_COUNT,
        }
    }
}

/// Bloom filter over opaque string items
#[derive(Clone, PartialEq, Eq)]
pub struct BloomFilter {
    params: BloomParams,
    bits: Vec<u8>,
    /// Insertions, duplicates included
    item_count: usize,
}

/// Index of `item` for hash round `round` in a filter of `size` bits.
pub fn bit_index(item: &str, round: usize, size: usize) -> usize {
    let mut hasher = Sha256::new();
    hasher.update(item.as_bytes());
    hasher.update(round.to_string().as_bytes());
    let digest = hasher.finalize();

    // Horner reduction of the big-endian digest; the accumulator stays below
    // size * 256, which fits easily in u128.
    let modulus = size as u128;
    let reduced = digest
        .iter()
        .fold(0u128, |acc, &byte| (acc * 256 + byte as u128) % modulus);
    reduced as usize
}

impl BloomFilter {
    /// Create an empty filter.
    pub fn new(size: usize, hash_count: usize) -> Result<Self> {
        Ok(Self::with_params(BloomParams::new(size, hash_count)?))
    }

    /// Create an empty filter from already validated parameters.
    pub fn with_params(params: BloomParams) -> Self {
        Self {
            params,
            bits: vec![0; params.size],
            item_count: 0,
        }
    }

    /// Rebuild a filter from a 0/1 vector (e.g. a decrypted intersection).
    ///
    /// The item count of the rebuilt filter is unknown and reported as zero.
    pub fn from_bits(bits: &[u64], hash_count: usize) -> Result<Self> {
        let params = BloomParams::new(bits.len(), hash_count)?;
        if let Some(pos) = bits.iter().position(|&b| b > 1) {
            return Err(OverlapError::InvalidParameter(format!(
                "bit vector holds non-binary value {} at index {}",
                bits[pos], pos
            )));
        }

        Ok(Self {
            params,
            bits: bits.iter().map(|&b| b as u8).collect(),
            item_count: 0,
        })
    }

    pub fn params(&self) -> BloomParams {
        self.params
    }

    pub fn size(&self) -> usize {
        self.params.size
    }

    pub fn hash_count(&self) -> usize {
        self.params.hash_count
    }

    /// Number of insertions, duplicates counted.
    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// Same as [`BloomFilter::item_count`].
    pub fn len(&self) -> usize {
        self.item_count
    }

    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }

    fn indices<'a>(&self, item: &'a str) -> impl Iterator<Item = usize> + 'a {
        let size = self.params.size;
        (0..self.params.hash_count).map(move |round| bit_index(item, round, size))
    }

    /// Insert an item. Setting bits is idempotent; the item count is not.
    pub fn insert(&mut self, item: &str) {
        let indices: Vec<usize> = self.indices(item).collect();
        for index in indices {
            self.bits[index] = 1;
        }
        self.item_count += 1;
    }

    /// Insert every item of an iterator.
    pub fn insert_all<I, S>(&mut self, items: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for item in items {
            self.insert(item.as_ref());
        }
    }

    /// Probabilistic membership: false positives possible, false negatives not.
    pub fn contains(&self, item: &str) -> bool {
        self.indices(item).all(|index| self.bits[index] == 1)
    }

    /// Number of bits set to 1.
    pub fn set_bit_count(&self) -> usize {
        self.bits.iter().filter(|&&b| b == 1).count()
    }

    /// Closed-form false-positive estimate `(1 - e^(-k*n/m))^k`.
    pub fn false_positive_rate(&self) -> f64 {
        if self.item_count == 0 {
            return 0.0;
        }

        let k = self.params.hash_count as f64;
        let n = self.item_count as f64;
        let m = self.params.size as f64;
        (1.0 - (-k * n / m).exp()).powf(k)
    }

    /// Bit vector as plaintext integers, ready for encryption.
    pub fn bits(&self) -> Vec<u64> {
        self.bits.iter().map(|&b| b as u64).collect()
    }

    fn ensure_same_geometry(&self, other: &BloomFilter) -> Result<()> {
        if self.params != other.params {
            return Err(OverlapError::InvalidParameter(format!(
                "Bloom filters must share size and hash count ({:?} vs {:?})",
                self.params, other.params
            )));
        }
        Ok(())
    }

    /// Plaintext bitwise AND.
    pub fn intersect(&self, other: &BloomFilter) -> Result<BloomFilter> {
        self.ensure_same_geometry(other)?;
        Ok(Self {
            params: self.params,
            bits: self.bits.iter().zip(&other.bits).map(|(a, b)| a & b).collect(),
            item_count: 0,
        })
    }

    /// Plaintext bitwise OR.
    pub fn union(&self, other: &BloomFilter) -> Result<BloomFilter> {
        self.ensure_same_geometry(other)?;
        Ok(Self {
            params: self.params,
            bits: self.bits.iter().zip(&other.bits).map(|(a, b)| a | b).collect(),
            item_count: 0,
        })
    }
}

// Debug deliberately omits the bit vector; it is derived from private items.
impl fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BloomFilter")
            .field("size", &self.params.size)
            .field("hash_count", &self.params.hash_count)
            .field("item_count", &self.item_count)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for BloomFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BloomFilter(size={}, hash_count={}, items={}, set_bits={}, fpr={:.4})",
            self.params.size,
            self.params.hash_count,
            self.item_count,
            self.set_bit_count(),
            self.false_positive_rate()
        )
    }
}
