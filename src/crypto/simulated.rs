//! In-process simulated BFV capability.
//!
//! # Mock Implementation Note
//!
//! `SimulatedBfv` reproduces the *contract* of a batched BFV scheme (slot-wise
//! arithmetic modulo the plaintext modulus, context-bound keys, rotation) but
//! provides NO confidentiality: slots are held in the clear inside the opaque
//! [`EncryptedVector`] handle. It exists so the protocol, its tests and the CLI
//! run without a lattice backend. Production deployments plug a real scheme in
//! behind [`HeCapability`].

use super::capability::{
    ContextId, EncryptedVector, HeCapability, HeError, HeResult, KeyPair, PrivateKey, PublicKey,
    SchemeParameters,
};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Simulated BFV capability for one parameter set.
#[derive(Debug, Clone)]
pub struct SimulatedBfv {
    params: SchemeParameters,
}

impl SimulatedBfv {
    pub fn new(params: SchemeParameters) -> Self {
        Self { params }
    }

    /// Derive the public context id from secret key material.
    fn derive_context(secret: &[u8], params: &SchemeParameters) -> ContextId {
        let mut hasher = Sha256::new();
        hasher.update(secret);
        hasher.update(b"PUBLIC_CONTEXT_DERIVATION");
        hasher.update(params.plain_modulus.to_be_bytes());
        hasher.update((params.slot_count as u64).to_be_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        ContextId::from_bytes(bytes)
    }

    fn ensure_own_params(&self, params: &SchemeParameters) -> HeResult<()> {
        if *params != self.params {
            return Err(HeError::SchemeMismatch(format!(
                "capability is configured for {:?}, operand uses {:?}",
                self.params, params
            )));
        }
        Ok(())
    }

    /// Pad a plaintext vector to the slot count, checking range.
    fn encode(&self, values: &[u64]) -> HeResult<Vec<u64>> {
        if values.len() > self.params.slot_count {
            return Err(HeError::SchemeMismatch(format!(
                "vector of length {} exceeds slot count {}",
                values.len(),
                self.params.slot_count
            )));
        }
        if let Some(&value) = values.iter().find(|&&v| v >= self.params.plain_modulus) {
            return Err(HeError::PlaintextOutOfRange {
                value,
                modulus: self.params.plain_modulus,
            });
        }

        let mut slots = vec![0u64; self.params.slot_count];
        slots[..values.len()].copy_from_slice(values);
        Ok(slots)
    }

    fn mul_mod(&self, a: u64, b: u64) -> u64 {
        ((a as u128 * b as u128) % self.params.plain_modulus as u128) as u64
    }

    fn add_mod(&self, a: u64, b: u64) -> u64 {
        ((a as u128 + b as u128) % self.params.plain_modulus as u128) as u64
    }

    fn derived(&self, template: &EncryptedVector, slots: Vec<u64>) -> EncryptedVector {
        EncryptedVector {
            context: template.context,
            params: template.params,
            len: template.len,
            slots,
        }
    }
}

impl HeCapability for SimulatedBfv {
    fn parameters(&self) -> SchemeParameters {
        self.params
    }

    fn keygen(&self) -> HeResult<KeyPair> {
        let rng = SystemRandom::new();
        let mut secret = vec![0u8; 32];
        rng.fill(&mut secret)
            .map_err(|e| HeError::KeyGeneration(e.to_string()))?;

        let context = Self::derive_context(&secret, &self.params);
        debug!(%context, slot_count = self.params.slot_count, "generated key pair");

        Ok(KeyPair {
            public_key: PublicKey {
                context,
                params: self.params,
            },
            private_key: PrivateKey { context, secret },
        })
    }

    fn encrypt(&self, public_key: &PublicKey, values: &[u64]) -> HeResult<EncryptedVector> {
        self.ensure_own_params(&public_key.params)?;
        let slots = self.encode(values)?;

        Ok(EncryptedVector {
            context: public_key.context,
            params: public_key.params,
            len: values.len(),
            slots,
        })
    }

    fn decrypt(
        &self,
        private_key: &PrivateKey,
        ciphertext: &EncryptedVector,
    ) -> HeResult<Vec<u64>> {
        // The key must actually derive the ciphertext's context, not merely claim it.
        let derived = Self::derive_context(&private_key.secret, &ciphertext.params);
        if derived != ciphertext.context || private_key.context != ciphertext.context {
            return Err(HeError::CapabilityUnavailable(format!(
                "no private key held for context {}",
                ciphertext.context
            )));
        }

        Ok(ciphertext.slots[..ciphertext.len].to_vec())
    }

    fn multiply_elementwise(
        &self,
        lhs: &EncryptedVector,
        rhs: &EncryptedVector,
    ) -> HeResult<EncryptedVector> {
        lhs.ensure_compatible(rhs)?;
        self.ensure_own_params(&lhs.params)?;

        let slots = lhs
            .slots
            .iter()
            .zip(&rhs.slots)
            .map(|(&a, &b)| self.mul_mod(a, b))
            .collect();
        Ok(self.derived(lhs, slots))
    }

    fn add(&self, lhs: &EncryptedVector, rhs: &EncryptedVector) -> HeResult<EncryptedVector> {
        lhs.ensure_compatible(rhs)?;
        self.ensure_own_params(&lhs.params)?;

        let slots = lhs
            .slots
            .iter()
            .zip(&rhs.slots)
            .map(|(&a, &b)| self.add_mod(a, b))
            .collect();
        Ok(self.derived(lhs, slots))
    }

    fn multiply_plain(
        &self,
        ciphertext: &EncryptedVector,
        plain: &[u64],
    ) -> HeResult<EncryptedVector> {
        self.ensure_own_params(&ciphertext.params)?;
        let plain = self.encode(plain)?;

        let slots = ciphertext
            .slots
            .iter()
            .zip(&plain)
            .map(|(&a, &b)| self.mul_mod(a, b))
            .collect();
        Ok(self.derived(ciphertext, slots))
    }

    fn rotate(&self, ciphertext: &EncryptedVector, steps: usize) -> HeResult<EncryptedVector> {
        self.ensure_own_params(&ciphertext.params)?;

        let mut slots = ciphertext.slots.clone();
        if !slots.is_empty() {
            let shift = steps % slots.len();
            slots.rotate_left(shift);
        }
        Ok(self.derived(ciphertext, slots))
    }
}
