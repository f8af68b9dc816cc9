//! tioverlap - Privacy-Preserving Threat-Indicator Overlap
//!
//! Two parties learn how much their indicator-of-compromise sets overlap
//! without showing each other a single indicator.
//!
//! Key principles:
//! - Each party encodes its indicators into a Bloom filter and encrypts it
//! - The filters are intersected under homomorphic encryption
//! - Only aggregate counts are ever decrypted
//! - Raw indicators never appear in a result
//!
//! Pipeline:
//! indicators -> [`bloom`] -> [`crypto`] (encrypt, AND, sum, decrypt)
//! -> [`estimator`] -> [`protocol::ProtocolResult`]

pub mod bloom;
pub mod crypto;
pub mod dataset;
pub mod error;
pub mod estimator;
pub mod indicator;
pub mod protocol;

pub use error::{OverlapError, ProtocolPhase, ProtocolStage, Result};
