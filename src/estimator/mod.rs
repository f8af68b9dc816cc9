//! Overlap estimation from Bloom-filter bit counts.
//!
//! Pure arithmetic over integers and closed-form reals; nothing here sees a
//! ciphertext or an indicator.
//!
//! # Item-count back-estimation
//!
//! A filter of `m` bits and `k` rounds with `X` bits set holds roughly
//!
//! ```text
//! n̂(X) = -(m / k) * ln(1 - X / m)
//! ```
//!
//! items. The ratio `X / m` is clamped to `0.999` so a saturated filter yields
//! a large finite estimate instead of infinity.
//!
//! # Inclusion–exclusion
//!
//! The overlap is recovered from estimated item counts, not from raw bit
//! counts, which corrects for the bit-saturation curve:
//!
//! ```text
//! bits(A ∪ B) = bits(A) + bits(B) - bits(A ∩ B)
//! |A ∩ B|    ≈ n̂(bits(A)) + n̂(bits(B)) - n̂(bits(A ∪ B))
//! ```

use crate::bloom::BloomParams;
use crate::error::{OverlapError, Result};
use serde::{Deserialize, Serialize};

/// Highest fill ratio fed to the logarithm.
pub const MAX_FILL_RATIO: f64 = 0.999;

/// Similarity and overlap derived from one set of bit counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlapEstimate {
    pub jaccard_similarity: f64,
    pub estimated_item_overlap: u64,
}

/// Full aggregate statistics of one protocol run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlapStatistics {
    pub overlap_bits: usize,
    pub bloom1_bits: usize,
    pub bloom2_bits: usize,
    pub jaccard_similarity: f64,
    pub estimated_item_overlap: u64,
}

impl OverlapStatistics {
    /// Validate the counts and run the estimator.
    pub fn from_counts(
        overlap_bits: usize,
        bloom1_bits: usize,
        bloom2_bits: usize,
        params: BloomParams,
    ) -> Result<Self> {
        let estimate = estimate(
            overlap_bits,
            bloom1_bits,
            bloom2_bits,
            params.size,
            params.hash_count,
        )?;

        Ok(Self {
            overlap_bits,
            bloom1_bits,
            bloom2_bits,
            jaccard_similarity: estimate.jaccard_similarity,
            estimated_item_overlap: estimate.estimated_item_overlap,
        })
    }
}

/// Estimated number of distinct items behind `set_bits` set bits.
pub fn estimate_item_count(set_bits: usize, size: usize, hash_count: usize) -> f64 {
    if set_bits == 0 || size == 0 || hash_count == 0 {
        return 0.0;
    }

    let m = size as f64;
    let k = hash_count as f64;
    let ratio = (set_bits as f64 / m).min(MAX_FILL_RATIO);
    -(m / k) * (1.0 - ratio).ln()
}

/// Jaccard similarity of two filters' bit sets.
pub fn jaccard_similarity(overlap_bits: usize, bits1_set: usize, bits2_set: usize) -> f64 {
    let union_bits = (bits1_set + bits2_set).saturating_sub(overlap_bits);
    if union_bits == 0 {
        return 0.0;
    }
    overlap_bits as f64 / union_bits as f64
}

/// Estimate similarity and item overlap from bit counts.
///
/// Counts that cannot come from two real filters of this geometry (overlap
/// larger than either side, more set bits than the filter has) are rejected.
pub fn estimate(
    overlap_bits: usize,
    bits1_set: usize,
    bits2_set: usize,
    size: usize,
    hash_count: usize,
) -> Result<OverlapEstimate> {
    BloomParams::new(size, hash_count)?;

    if bits1_set > size || bits2_set > size {
        return Err(OverlapError::InvalidParameter(format!(
            "set-bit counts ({}, {}) exceed filter size {}",
            bits1_set, bits2_set, size
        )));
    }
    if overlap_bits > bits1_set.min(bits2_set) {
        return Err(OverlapError::InvalidParameter(format!(
            "overlap of {} bits exceeds the smaller filter's {} set bits",
            overlap_bits,
            bits1_set.min(bits2_set)
        )));
    }

    let union_bits = bits1_set + bits2_set - overlap_bits;
    let n1 = estimate_item_count(bits1_set, size, hash_count);
    let n2 = estimate_item_count(bits2_set, size, hash_count);
    let n_union = estimate_item_count(union_bits, size, hash_count);

    let overlap = (n1 + n2 - n_union).round().max(0.0);

    Ok(OverlapEstimate {
        jaccard_similarity: jaccard_similarity(overlap_bits, bits1_set, bits2_set),
        estimated_item_overlap: overlap as u64,
    })
}
