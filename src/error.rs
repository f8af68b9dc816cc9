//! Error taxonomy for the overlap protocol.
//!
//! Every error here is local and recoverable by the caller. Capability
//! failures raised while the orchestrator is running are wrapped in
//! [`OverlapError::ProtocolFailed`] together with the stage that failed, so a
//! caller can decide whether to retry or abandon the run.

use crate::crypto::HeError;
use std::fmt;
use thiserror::Error;

/// Result alias for core protocol operations.
pub type Result<T> = std::result::Result<T, OverlapError>;

/// Phases of the two-party protocol state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolPhase {
    Created,
    PartiesConfigured,
    FiltersEncrypted,
    Computed,
    Verified,
}

impl fmt::Display for ProtocolPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::PartiesConfigured => "parties-configured",
            Self::FiltersEncrypted => "filters-encrypted",
            Self::Computed => "computed",
            Self::Verified => "verified",
        };
        f.write_str(name)
    }
}

/// Protocol stage in which a capability call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolStage {
    KeyGeneration,
    Encryption,
    Intersection,
    Summation,
    Decryption,
}

impl fmt::Display for ProtocolStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::KeyGeneration => "key generation",
            Self::Encryption => "filter encryption",
            Self::Intersection => "homomorphic intersection",
            Self::Summation => "homomorphic summation",
            Self::Decryption => "decryption",
        };
        f.write_str(name)
    }
}

/// Overlap protocol errors
#[derive(Error, Debug)]
pub enum OverlapError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Protocol not ready: operation requires phase '{expected}', current phase is '{actual}'")]
    ProtocolNotReady {
        expected: ProtocolPhase,
        actual: ProtocolPhase,
    },

    #[error("Filter for party '{party}' is already encrypted; start a new run to change it")]
    AlreadyEncrypted { party: String },

    #[error(transparent)]
    Capability(#[from] HeError),

    #[error("Protocol failed during {stage}: {source}")]
    ProtocolFailed {
        stage: ProtocolStage,
        #[source]
        source: HeError,
    },
}

impl OverlapError {
    /// Wrap a capability failure with the stage it happened in.
    pub(crate) fn failed(stage: ProtocolStage) -> impl FnOnce(HeError) -> Self {
        move |source| Self::ProtocolFailed { stage, source }
    }

    /// Unwrap the capability error when this is a party-level failure that the
    /// orchestrator needs to re-attribute to a stage.
    pub(crate) fn into_stage(self, stage: ProtocolStage) -> Self {
        match self {
            Self::Capability(source) => Self::ProtocolFailed { stage, source },
            other => other,
        }
    }
}
