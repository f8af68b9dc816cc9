//! Two-party overlap protocol state machine.
//!
//! ```text
//! Created -> PartiesConfigured -> FiltersEncrypted -> Computed -> Verified
//! ```
//!
//! Each arrow is one method call. A call made in the wrong phase fails with
//! [`OverlapError::ProtocolNotReady`] and leaves the orchestrator untouched.
//! A capability failure fails with [`OverlapError::ProtocolFailed`] naming the
//! stage, and the phase does not advance, so the same call can be retried.
//!
//! # Key model
//!
//! One key pair is generated per run and shared by both parties. The holder of
//! the private key is a single trusted decryptor; this is not a two-key MPC
//! construction. The decryptor only ever sees the aggregate overlap-bit count,
//! because the intersection is summed homomorphically before decryption.

use crate::bloom::BloomParams;
use crate::crypto::{HeCapability, HeError, KeyPair};
use crate::error::{OverlapError, ProtocolPhase, ProtocolStage, Result};
use crate::estimator::OverlapStatistics;
use crate::protocol::party::PartyState;
use crate::protocol::result::{Accuracy, ProtocolResult, Verification};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Drives one protocol run between two parties.
pub struct ProtocolOrchestrator<H: HeCapability> {
    capability: H,
    phase: ProtocolPhase,
    bloom_params: Option<BloomParams>,
    keys: Option<KeyPair>,
    parties: Option<(PartyState, PartyState)>,
    result: Option<ProtocolResult>,
}

impl<H: HeCapability> ProtocolOrchestrator<H> {
    pub fn new(capability: H) -> Self {
        Self {
            capability,
            phase: ProtocolPhase::Created,
            bloom_params: None,
            keys: None,
            parties: None,
            result: None,
        }
    }

    pub fn phase(&self) -> ProtocolPhase {
        self.phase
    }

    pub fn capability(&self) -> &H {
        &self.capability
    }

    /// Result of the last successful `compute` (and `verify`, if called).
    pub fn result(&self) -> Option<&ProtocolResult> {
        self.result.as_ref()
    }

    fn require_phase(&self, expected: ProtocolPhase) -> Result<()> {
        if self.phase != expected {
            return Err(OverlapError::ProtocolNotReady {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    fn parties(&self) -> Result<&(PartyState, PartyState)> {
        self.parties
            .as_ref()
            .ok_or_else(|| OverlapError::NotReady("parties are not configured".to_string()))
    }

    /// Generate the run's key pair and build both parties' filters.
    ///
    /// `Created -> PartiesConfigured`
    pub fn configure_parties<I1, S1, I2, S2>(
        &mut self,
        name1: &str,
        items1: I1,
        name2: &str,
        items2: I2,
        bloom_size: usize,
        hash_count: usize,
    ) -> Result<()>
    where
        I1: IntoIterator<Item = S1>,
        S1: AsRef<str>,
        I2: IntoIterator<Item = S2>,
        S2: AsRef<str>,
    {
        self.require_phase(ProtocolPhase::Created)?;
        let bloom_params = BloomParams::new(bloom_size, hash_count)?;

        let scheme = self.capability.parameters();
        if scheme.slot_count < bloom_size {
            return Err(OverlapError::InvalidParameter(format!(
                "capability has {} slots, Bloom filter needs {}",
                scheme.slot_count, bloom_size
            )));
        }
        if scheme.plain_modulus <= bloom_size as u64 {
            return Err(OverlapError::InvalidParameter(format!(
                "plain modulus {} cannot hold a bit count of up to {}",
                scheme.plain_modulus, bloom_size
            )));
        }

        let mut party1 = PartyState::new(name1);
        party1.set_items(items1)?;
        party1.build_filter(bloom_size, hash_count)?;

        let mut party2 = PartyState::new(name2);
        party2.set_items(items2)?;
        party2.build_filter(bloom_size, hash_count)?;

        let keys = self
            .capability
            .keygen()
            .map_err(OverlapError::failed(ProtocolStage::KeyGeneration))?;
        debug!(context = %keys.public_key.context(), "Key pair generated");

        self.bloom_params = Some(bloom_params);
        self.keys = Some(keys);
        self.parties = Some((party1, party2));
        self.phase = ProtocolPhase::PartiesConfigured;
        info!(
            party1 = name1,
            party2 = name2,
            bloom_size,
            hash_count,
            "Parties configured"
        );
        Ok(())
    }

    /// Encrypt both parties' filters under the run's public key.
    ///
    /// `PartiesConfigured -> FiltersEncrypted`
    pub fn encrypt_filters(&mut self) -> Result<()> {
        self.require_phase(ProtocolPhase::PartiesConfigured)?;

        let public_key = match &self.keys {
            Some(keys) => &keys.public_key,
            None => return Err(OverlapError::NotReady("no key pair".to_string())),
        };
        let (party1, party2) = self
            .parties
            .as_mut()
            .ok_or_else(|| OverlapError::NotReady("parties are not configured".to_string()))?;

        for party in [party1, party2] {
            party
                .encrypt_filter(&self.capability, public_key)
                .map_err(|e| e.into_stage(ProtocolStage::Encryption))?;
        }

        self.phase = ProtocolPhase::FiltersEncrypted;
        info!("Filters encrypted");
        Ok(())
    }

    /// Configure both parties and encrypt their filters.
    ///
    /// `Created -> PartiesConfigured -> FiltersEncrypted`
    pub fn setup<I1, S1, I2, S2>(
        &mut self,
        name1: &str,
        items1: I1,
        name2: &str,
        items2: I2,
        bloom_size: usize,
        hash_count: usize,
    ) -> Result<()>
    where
        I1: IntoIterator<Item = S1>,
        S1: AsRef<str>,
        I2: IntoIterator<Item = S2>,
        S2: AsRef<str>,
    {
        self.configure_parties(name1, items1, name2, items2, bloom_size, hash_count)?;
        self.encrypt_filters()
    }

    /// Intersect the encrypted filters and estimate the overlap.
    ///
    /// The intersection is summed homomorphically and only the total is
    /// decrypted. `FiltersEncrypted -> Computed`
    pub fn compute(&mut self) -> Result<&ProtocolResult> {
        self.require_phase(ProtocolPhase::FiltersEncrypted)?;

        let bloom_params = self
            .bloom_params
            .ok_or_else(|| OverlapError::NotReady("Bloom parameters are not set".to_string()))?;
        let keys = self
            .keys
            .as_ref()
            .ok_or_else(|| OverlapError::NotReady("no key pair".to_string()))?;
        let (party1, party2) = self.parties()?;

        let (enc1, enc2) = match (party1.encrypted_filter(), party2.encrypted_filter()) {
            (Some(enc1), Some(enc2)) => (enc1, enc2),
            _ => {
                return Err(OverlapError::NotReady(
                    "both filters must be encrypted before compute".to_string(),
                ))
            }
        };

        let he = &self.capability;
        let intersection = he
            .multiply_elementwise(enc1, enc2)
            .map_err(OverlapError::failed(ProtocolStage::Intersection))?;
        let total = he
            .sum_slots(&intersection)
            .map_err(OverlapError::failed(ProtocolStage::Summation))?;
        let decrypted = he
            .decrypt(&keys.private_key, &total)
            .map_err(OverlapError::failed(ProtocolStage::Decryption))?;
        if decrypted.len() != bloom_params.size {
            return Err(OverlapError::ProtocolFailed {
                stage: ProtocolStage::Decryption,
                source: HeError::SchemeMismatch(format!(
                    "decrypted {} slots, expected {}",
                    decrypted.len(),
                    bloom_params.size
                )),
            });
        }
        let overlap_bits = decrypted[0] as usize;

        let meta1 = party1.metadata()?;
        let meta2 = party2.metadata()?;
        let statistics =
            OverlapStatistics::from_counts(overlap_bits, meta1.set_bits, meta2.set_bits, bloom_params)
                .map_err(|e| OverlapError::ProtocolFailed {
                    stage: ProtocolStage::Decryption,
                    source: HeError::SchemeMismatch(format!(
                        "decrypted count inconsistent with filters: {}",
                        e
                    )),
                })?;
        debug!(
            overlap_bits,
            bloom1_bits = meta1.set_bits,
            bloom2_bits = meta2.set_bits,
            "Overlap bits decrypted"
        );

        let result = ProtocolResult::new(&statistics, &meta1, &meta2, bloom_params, he.parameters());
        info!(
            estimated_overlap = statistics.estimated_item_overlap,
            jaccard = statistics.jaccard_similarity,
            "Overlap computed"
        );

        self.phase = ProtocolPhase::Computed;
        Ok(self.result.insert(result))
    }

    /// Attach exact cleartext overlap figures for accuracy auditing.
    ///
    /// AUDIT ONLY: this needs both parties' raw item lists in one place and
    /// therefore defeats the privacy property. Use it in simulations and tests,
    /// never between real parties. `Computed -> Verified`
    pub fn verify<A, B>(&mut self, items1: &[A], items2: &[B]) -> Result<&ProtocolResult>
    where
        A: AsRef<str>,
        B: AsRef<str>,
    {
        self.require_phase(ProtocolPhase::Computed)?;
        let result = self
            .result
            .as_mut()
            .ok_or_else(|| OverlapError::NotReady("no computed result".to_string()))?;

        warn!("Cleartext verification requested; raw item lists are compared in one place");

        let set1: HashSet<&str> = items1.iter().map(AsRef::as_ref).collect();
        let set2: HashSet<&str> = items2.iter().map(AsRef::as_ref).collect();
        let actual_overlap = set1.intersection(&set2).count();
        let union_size = set1.union(&set2).count();
        let actual_jaccard_similarity = if union_size > 0 {
            actual_overlap as f64 / union_size as f64
        } else {
            0.0
        };

        result.verification = Some(Verification {
            actual_overlap,
            actual_jaccard_similarity,
            set1_size: set1.len(),
            set2_size: set2.len(),
            union_size,
        });
        result.accuracy = Some(Accuracy::new(
            result.overlap_statistics.estimated_item_overlap,
            actual_overlap,
        ));

        self.phase = ProtocolPhase::Verified;
        info!(actual_overlap, "Verification attached");
        Ok(result)
    }
}

impl<H: HeCapability> std::fmt::Debug for ProtocolOrchestrator<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolOrchestrator")
            .field("phase", &self.phase)
            .field("bloom_params", &self.bloom_params)
            .field("parties", &self.parties)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{
        EncryptedVector, HeError, HeResult, PrivateKey, PublicKey, SchemeParameters,
        SimulatedBfv,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn capability(size: usize) -> SimulatedBfv {
        SimulatedBfv::new(
            SchemeParameters::for_vector_len(
                size,
                SchemeParameters::DEFAULT_PLAIN_MODULUS,
                SchemeParameters::DEFAULT_POLY_MODULUS_DEGREE,
            )
            .unwrap(),
        )
    }

    fn items(prefix: &str, range: std::ops::Range<usize>) -> Vec<String> {
        range.map(|i| format!("{}-{}.example", prefix, i)).collect()
    }

    /// Delegates to `SimulatedBfv`, failing the first `failures` calls of
    /// the chosen operation. A queued plaintext replaces the next decryption.
    struct Flaky {
        inner: SimulatedBfv,
        fail_encrypt: AtomicUsize,
        fail_multiply: AtomicUsize,
        forged_decrypt: Mutex<Option<Vec<u64>>>,
    }

    impl Flaky {
        fn new(size: usize) -> Self {
            Self {
                inner: capability(size),
                fail_encrypt: AtomicUsize::new(0),
                fail_multiply: AtomicUsize::new(0),
                forged_decrypt: Mutex::new(None),
            }
        }

        fn should_fail(counter: &AtomicUsize) -> bool {
            counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    impl HeCapability for Flaky {
        fn parameters(&self) -> SchemeParameters {
            self.inner.parameters()
        }

        fn keygen(&self) -> HeResult<KeyPair> {
            self.inner.keygen()
        }

        fn encrypt(&self, public_key: &PublicKey, values: &[u64]) -> HeResult<EncryptedVector> {
            if Self::should_fail(&self.fail_encrypt) {
                return Err(HeError::CapabilityUnavailable("backend busy".to_string()));
            }
            self.inner.encrypt(public_key, values)
        }

        fn decrypt(&self, private_key: &PrivateKey, ciphertext: &EncryptedVector) -> HeResult<Vec<u64>> {
            if let Some(forged) = self.forged_decrypt.lock().unwrap().take() {
                return Ok(forged);
            }
            self.inner.decrypt(private_key, ciphertext)
        }

        fn multiply_elementwise(&self, lhs: &EncryptedVector, rhs: &EncryptedVector) -> HeResult<EncryptedVector> {
            if Self::should_fail(&self.fail_multiply) {
                return Err(HeError::SchemeMismatch("injected".to_string()));
            }
            self.inner.multiply_elementwise(lhs, rhs)
        }

        fn add(&self, lhs: &EncryptedVector, rhs: &EncryptedVector) -> HeResult<EncryptedVector> {
            self.inner.add(lhs, rhs)
        }

        fn multiply_plain(&self, ciphertext: &EncryptedVector, plain: &[u64]) -> HeResult<EncryptedVector> {
            self.inner.multiply_plain(ciphertext, plain)
        }

        fn rotate(&self, ciphertext: &EncryptedVector, steps: usize) -> HeResult<EncryptedVector> {
            self.inner.rotate(ciphertext, steps)
        }
    }

    #[test]
    fn test_full_run_matches_plaintext_intersection() {
        let a = items("ioc", 0..60);
        let b = items("ioc", 30..90);

        let mut orchestrator = ProtocolOrchestrator::new(capability(4096));
        orchestrator.setup("ISP-A", &a, "ISP-B", &b, 4096, 4).unwrap();
        assert_eq!(orchestrator.phase(), ProtocolPhase::FiltersEncrypted);

        let result = orchestrator.compute().unwrap().clone();

        // Same overlap-bit count as the plaintext AND of the two filters
        let mut f1 = crate::bloom::BloomFilter::new(4096, 4).unwrap();
        f1.insert_all(&a);
        let mut f2 = crate::bloom::BloomFilter::new(4096, 4).unwrap();
        f2.insert_all(&b);
        let expected = f1.intersect(&f2).unwrap().set_bit_count();

        assert_eq!(result.overlap_statistics.overlap_bits, expected);
        assert_eq!(result.party1_info.ioc_count, 60);
        assert_eq!(result.party2_info.bloom_set_bits, f2.set_bit_count());
        assert!(result.privacy_preserved());
        assert!(!result.raw_indicators_exposed());
        assert_eq!(orchestrator.phase(), ProtocolPhase::Computed);
    }

    #[test]
    fn test_verify_attaches_exact_figures() {
        let a = items("ioc", 0..40);
        let b = items("ioc", 20..60);

        let mut orchestrator = ProtocolOrchestrator::new(capability(2048));
        orchestrator.setup("A", &a, "B", &b, 2048, 3).unwrap();
        orchestrator.compute().unwrap();
        let result = orchestrator.verify(&a, &b).unwrap();

        let verification = result.verification.unwrap();
        assert_eq!(verification.actual_overlap, 20);
        assert_eq!(verification.union_size, 60);
        assert!((verification.actual_jaccard_similarity - 20.0 / 60.0).abs() < 1e-12);

        let accuracy = result.accuracy.unwrap();
        assert_eq!(accuracy.actual_overlap, 20);
        assert_eq!(orchestrator.phase(), ProtocolPhase::Verified);
    }

    #[test]
    fn test_out_of_order_calls_are_rejected() {
        let mut orchestrator = ProtocolOrchestrator::new(capability(256));

        assert!(matches!(
            orchestrator.compute(),
            Err(OverlapError::ProtocolNotReady {
                expected: ProtocolPhase::FiltersEncrypted,
                actual: ProtocolPhase::Created,
            })
        ));
        assert!(matches!(
            orchestrator.encrypt_filters(),
            Err(OverlapError::ProtocolNotReady { .. })
        ));
        let none: [&str; 0] = [];
        assert!(matches!(
            orchestrator.verify(&none, &none),
            Err(OverlapError::ProtocolNotReady { .. })
        ));

        orchestrator
            .configure_parties("A", ["x"], "B", ["y"], 256, 2)
            .unwrap();
        assert!(matches!(
            orchestrator.compute(),
            Err(OverlapError::ProtocolNotReady {
                actual: ProtocolPhase::PartiesConfigured,
                ..
            })
        ));
        assert!(matches!(
            orchestrator.configure_parties("A", ["x"], "B", ["y"], 256, 2),
            Err(OverlapError::ProtocolNotReady { .. })
        ));
    }

    #[test]
    fn test_compute_twice_is_rejected() {
        let mut orchestrator = ProtocolOrchestrator::new(capability(256));
        orchestrator.setup("A", ["x"], "B", ["x"], 256, 2).unwrap();
        orchestrator.compute().unwrap();
        assert!(matches!(
            orchestrator.compute(),
            Err(OverlapError::ProtocolNotReady { .. })
        ));
    }

    #[test]
    fn test_bloom_size_must_fit_capability() {
        let mut orchestrator = ProtocolOrchestrator::new(capability(128));
        let result = orchestrator.setup("A", ["x"], "B", ["y"], 1000, 2);
        assert!(matches!(result, Err(OverlapError::InvalidParameter(_))));
        assert_eq!(orchestrator.phase(), ProtocolPhase::Created);
    }

    #[test]
    fn test_invalid_bloom_parameters() {
        let mut orchestrator = ProtocolOrchestrator::new(capability(128));
        assert!(matches!(
            orchestrator.setup("A", ["x"], "B", ["y"], 128, 0),
            Err(OverlapError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_failed_compute_keeps_phase_and_can_retry() {
        let he = Flaky::new(512);
        he.fail_multiply.store(1, Ordering::SeqCst);

        let mut orchestrator = ProtocolOrchestrator::new(he);
        orchestrator.setup("A", ["x", "y"], "B", ["y"], 512, 3).unwrap();

        let err = orchestrator.compute().unwrap_err();
        assert!(matches!(
            err,
            OverlapError::ProtocolFailed {
                stage: ProtocolStage::Intersection,
                ..
            }
        ));
        assert_eq!(orchestrator.phase(), ProtocolPhase::FiltersEncrypted);
        assert!(orchestrator.result().is_none());

        orchestrator.compute().unwrap();
        assert_eq!(orchestrator.phase(), ProtocolPhase::Computed);
    }

    #[test]
    fn test_failed_encryption_is_attributed_and_retryable() {
        let he = Flaky::new(512);
        let mut orchestrator = ProtocolOrchestrator::new(he);
        orchestrator
            .configure_parties("A", ["x"], "B", ["y"], 512, 3)
            .unwrap();

        orchestrator
            .capability()
            .fail_encrypt
            .store(1, Ordering::SeqCst);

        let err = orchestrator.encrypt_filters().unwrap_err();
        assert!(matches!(
            err,
            OverlapError::ProtocolFailed {
                stage: ProtocolStage::Encryption,
                source: HeError::CapabilityUnavailable(_),
            }
        ));
        assert_eq!(orchestrator.phase(), ProtocolPhase::PartiesConfigured);

        orchestrator.encrypt_filters().unwrap();
        assert_eq!(orchestrator.phase(), ProtocolPhase::FiltersEncrypted);
    }

    #[test]
    fn test_inconsistent_decryption_is_rejected() {
        let mut orchestrator = ProtocolOrchestrator::new(Flaky::new(1024));
        orchestrator.setup("A", ["x", "y"], "B", ["y"], 1024, 3).unwrap();

        // Two wrong lengths, then a count above either filter's set bits
        let mut oversized = vec![0u64; 1024];
        oversized[0] = 900;
        for forged in [vec![900], Vec::new(), oversized] {
            *orchestrator.capability().forged_decrypt.lock().unwrap() = Some(forged);

            let err = orchestrator.compute().unwrap_err();
            assert!(
                matches!(
                    err,
                    OverlapError::ProtocolFailed {
                        stage: ProtocolStage::Decryption,
                        source: HeError::SchemeMismatch(_),
                    }
                ),
                "unexpected error: {:?}",
                err
            );
            assert_eq!(orchestrator.phase(), ProtocolPhase::FiltersEncrypted);
            assert!(orchestrator.result().is_none());
        }

        let result = orchestrator.compute().unwrap();
        assert!(result.overlap_statistics.overlap_bits > 0);
        assert_eq!(orchestrator.phase(), ProtocolPhase::Computed);
    }
}
