//! Homomorphic encryption capability boundary.
//!
//! The overlap protocol never implements a scheme itself. It consumes this
//! trait, which any batched-integer scheme (BFV-style, slot-wise arithmetic
//! over a plaintext modulus) can implement. Keys and ciphertexts are bound to
//! the key-generation context that produced them; mixing contexts is always an
//! error, never a silent wrong answer.

use crate::error::{OverlapError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Capability errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeError {
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    #[error("Scheme mismatch: {0}")]
    SchemeMismatch(String),

    #[error("Plaintext value {value} does not fit plaintext modulus {modulus}")]
    PlaintextOutOfRange { value: u64, modulus: u64 },

    #[error("Failed to generate key material: {0}")]
    KeyGeneration(String),
}

/// Result type for capability operations.
pub type HeResult<T> = std::result::Result<T, HeError>;

/// Identifier of one key-generation context (32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId([u8; 32]);

impl ContextId {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell contexts apart in logs.
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

/// Parameters every key and ciphertext of one context shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeParameters {
    /// Plaintext modulus; slot arithmetic is reduced modulo this value
    pub plain_modulus: u64,

    /// Ring degree of the underlying scheme (power of two)
    pub poly_modulus_degree: usize,

    /// Number of plaintext slots per ciphertext: the vector length rounded up
    /// to a power of two, independent of the ring degree
    pub slot_count: usize,
}

impl SchemeParameters {
    pub const DEFAULT_PLAIN_MODULUS: u64 = 1_032_193;
    pub const DEFAULT_POLY_MODULUS_DEGREE: usize = 8192;

    /// Derive parameters able to carry a vector of `vector_len` bits and any
    /// count of those bits without wrapping.
    pub fn for_vector_len(
        vector_len: usize,
        plain_modulus: u64,
        poly_modulus_degree: usize,
    ) -> Result<Self> {
        if vector_len == 0 {
            return Err(OverlapError::InvalidParameter(
                "vector length must be positive".to_string(),
            ));
        }
        if !poly_modulus_degree.is_power_of_two() {
            return Err(OverlapError::InvalidParameter(format!(
                "poly_modulus_degree must be a power of two, got {}",
                poly_modulus_degree
            )));
        }
        if plain_modulus <= vector_len as u64 {
            return Err(OverlapError::InvalidParameter(format!(
                "plain_modulus {} cannot hold a bit count of up to {}",
                plain_modulus, vector_len
            )));
        }

        Ok(Self {
            plain_modulus,
            poly_modulus_degree,
            slot_count: vector_len.next_power_of_two(),
        })
    }
}

/// Public half of a key pair. Anyone holding it can encrypt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    pub(crate) context: ContextId,
    pub(crate) params: SchemeParameters,
}

impl PublicKey {
    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn params(&self) -> SchemeParameters {
        self.params
    }
}

/// Private half of a key pair. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey {
    #[zeroize(skip)]
    pub(crate) context: ContextId,

    pub(crate) secret: Vec<u8>,
}

impl PrivateKey {
    pub fn context(&self) -> ContextId {
        self.context
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("context", &self.context)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Key pair produced by [`HeCapability::keygen`].
#[derive(Debug)]
pub struct KeyPair {
    pub public_key: PublicKey,
    pub private_key: PrivateKey,
}

/// Opaque ciphertext handle.
///
/// Holds the encrypted slots together with the context and parameters they
/// were produced under. Nothing outside the capability implementation can read
/// the slots.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedVector {
    pub(crate) context: ContextId,
    pub(crate) params: SchemeParameters,
    /// Declared (unpadded) plaintext length
    pub(crate) len: usize,
    pub(crate) slots: Vec<u64>,
}

impl EncryptedVector {
    /// Declared plaintext length.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn params(&self) -> SchemeParameters {
        self.params
    }

    /// Check that two operands can be combined slot-wise.
    pub fn ensure_compatible(&self, other: &EncryptedVector) -> HeResult<()> {
        if self.context != other.context {
            return Err(HeError::SchemeMismatch(format!(
                "operands belong to different key contexts ({} vs {})",
                self.context, other.context
            )));
        }
        if self.params != other.params {
            return Err(HeError::SchemeMismatch(
                "operands were encrypted under different scheme parameters".to_string(),
            ));
        }
        if self.len != other.len {
            return Err(HeError::SchemeMismatch(format!(
                "operand lengths differ ({} vs {})",
                self.len, other.len
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for EncryptedVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedVector")
            .field("context", &self.context)
            .field("len", &self.len)
            .field("slot_count", &self.params.slot_count)
            .finish_non_exhaustive()
    }
}

/// Homomorphic operations the overlap protocol consumes.
///
/// Implementations are synchronous and may be CPU-heavy. One instance serves
/// one set of [`SchemeParameters`]; a run that needs different parameters
/// builds its own instance.
pub trait HeCapability: Send + Sync {
    /// Parameters this capability encrypts under.
    fn parameters(&self) -> SchemeParameters;

    /// Generate a fresh key pair bound to a new context.
    fn keygen(&self) -> HeResult<KeyPair>;

    /// Encrypt a vector of plaintext integers (zero-padded to the slot count).
    fn encrypt(&self, public_key: &PublicKey, values: &[u64]) -> HeResult<EncryptedVector>;

    /// Decrypt to the declared-length plaintext vector.
    ///
    /// Fails with [`HeError::CapabilityUnavailable`] when `private_key` does not
    /// belong to the ciphertext's context.
    fn decrypt(&self, private_key: &PrivateKey, ciphertext: &EncryptedVector)
        -> HeResult<Vec<u64>>;

    /// Slot-wise product of two ciphertexts (bitwise AND on 0/1 vectors).
    fn multiply_elementwise(
        &self,
        lhs: &EncryptedVector,
        rhs: &EncryptedVector,
    ) -> HeResult<EncryptedVector>;

    /// Slot-wise sum of two ciphertexts.
    fn add(&self, lhs: &EncryptedVector, rhs: &EncryptedVector) -> HeResult<EncryptedVector>;

    /// Slot-wise product with a plaintext vector (zero-padded to the slot count).
    fn multiply_plain(&self, ciphertext: &EncryptedVector, plain: &[u64])
        -> HeResult<EncryptedVector>;

    /// Rotate all slots left by `steps` (slot `i` receives slot `i + steps`).
    fn rotate(&self, ciphertext: &EncryptedVector, steps: usize) -> HeResult<EncryptedVector>;

    /// Total of all slots, left in slot 0 with every other slot zeroed.
    ///
    /// Rotate-and-add folding doubles the covered window each round, so after
    /// `log2(slot_count)` rounds every slot holds the total. A one-hot mask
    /// then clears all slots but the first, which keeps the per-slot partial
    /// sums away from whoever decrypts.
    fn sum_slots(&self, ciphertext: &EncryptedVector) -> HeResult<EncryptedVector> {
        let slot_count = ciphertext.params().slot_count;
        let mut acc = ciphertext.clone();
        let mut step = 1;
        while step < slot_count {
            let rotated = self.rotate(&acc, step)?;
            acc = self.add(&acc, &rotated)?;
            step <<= 1;
        }

        let mut mask = vec![0u64; ciphertext.len().max(1)];
        mask[0] = 1;
        self.multiply_plain(&acc, &mask)
    }
}
