//! Externally visible protocol output.
//!
//! The serialized form is a stable schema consumed by reports and other
//! tooling. It carries aggregates only: counts, ratios and parameters.

use crate::bloom::BloomParams;
use crate::crypto::SchemeParameters;
use crate::estimator::OverlapStatistics;
use crate::protocol::party::PartyMetadata;
use serde::{Deserialize, Serialize};

/// Overlap figures released by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlapSummary {
    pub estimated_item_overlap: u64,
    pub jaccard_similarity: f64,
    pub overlap_bits: usize,
}

impl From<&OverlapStatistics> for OverlapSummary {
    fn from(stats: &OverlapStatistics) -> Self {
        Self {
            estimated_item_overlap: stats.estimated_item_overlap,
            jaccard_similarity: stats.jaccard_similarity,
            overlap_bits: stats.overlap_bits,
        }
    }
}

/// Per-party aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyInfo {
    pub name: String,
    pub ioc_count: usize,
    pub bloom_set_bits: usize,
}

impl From<&PartyMetadata> for PartyInfo {
    fn from(meta: &PartyMetadata) -> Self {
        Self {
            name: meta.name.clone(),
            ioc_count: meta.item_count,
            bloom_set_bits: meta.set_bits,
        }
    }
}

/// Exact cleartext figures from the audit path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub actual_overlap: usize,
    pub actual_jaccard_similarity: f64,
    pub set1_size: usize,
    pub set2_size: usize,
    pub union_size: usize,
}

/// Estimate versus exact overlap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Accuracy {
    pub estimated_overlap: u64,
    pub actual_overlap: usize,
    pub error: u64,
    /// Relative error in percent; 0 when the exact overlap is 0
    pub error_percentage: f64,
}

impl Accuracy {
    pub fn new(estimated_overlap: u64, actual_overlap: usize) -> Self {
        let error = estimated_overlap.abs_diff(actual_overlap as u64);
        let error_percentage = if actual_overlap > 0 {
            error as f64 / actual_overlap as f64 * 100.0
        } else {
            0.0
        };

        Self {
            estimated_overlap,
            actual_overlap,
            error,
            error_percentage,
        }
    }
}

/// Result of one protocol run.
///
/// The privacy flags are fixed at construction and have no setters.
/// Deserialization rejects a record whose flags differ from those values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ResultRecord")]
pub struct ProtocolResult {
    pub overlap_statistics: OverlapSummary,
    pub party1_info: PartyInfo,
    pub party2_info: PartyInfo,
    pub bloom_filter_params: BloomParams,
    pub scheme_parameters: SchemeParameters,
    privacy_preserved: bool,
    #[serde(rename = "raw_iocs_exposed")]
    raw_indicators_exposed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<Accuracy>,
}

impl ProtocolResult {
    pub(crate) fn new(
        statistics: &OverlapStatistics,
        party1: &PartyMetadata,
        party2: &PartyMetadata,
        bloom_filter_params: BloomParams,
        scheme_parameters: SchemeParameters,
    ) -> Self {
        Self {
            overlap_statistics: statistics.into(),
            party1_info: party1.into(),
            party2_info: party2.into(),
            bloom_filter_params,
            scheme_parameters,
            privacy_preserved: true,
            raw_indicators_exposed: false,
            verification: None,
            accuracy: None,
        }
    }

    pub fn privacy_preserved(&self) -> bool {
        self.privacy_preserved
    }

    pub fn raw_indicators_exposed(&self) -> bool {
        self.raw_indicators_exposed
    }
}

/// Wire shape of [`ProtocolResult`], checked before conversion.
#[derive(Deserialize)]
struct ResultRecord {
    overlap_statistics: OverlapSummary,
    party1_info: PartyInfo,
    party2_info: PartyInfo,
    bloom_filter_params: BloomParams,
    scheme_parameters: SchemeParameters,
    privacy_preserved: bool,
    #[serde(rename = "raw_iocs_exposed")]
    raw_indicators_exposed: bool,
    #[serde(default)]
    verification: Option<Verification>,
    #[serde(default)]
    accuracy: Option<Accuracy>,
}

impl TryFrom<ResultRecord> for ProtocolResult {
    type Error = String;

    fn try_from(record: ResultRecord) -> Result<Self, Self::Error> {
        if !record.privacy_preserved || record.raw_indicators_exposed {
            return Err(format!(
                "privacy flags must be privacy_preserved=true, raw_iocs_exposed=false; got {}, {}",
                record.privacy_preserved, record.raw_indicators_exposed
            ));
        }
        Ok(Self {
            overlap_statistics: record.overlap_statistics,
            party1_info: record.party1_info,
            party2_info: record.party2_info,
            bloom_filter_params: record.bloom_filter_params,
            scheme_parameters: record.scheme_parameters,
            privacy_preserved: true,
            raw_indicators_exposed: false,
            verification: record.verification,
            accuracy: record.accuracy,
        })
    }
}
