//! Per-party protocol state.
//!
//! A party owns its indicator list, the Bloom filter derived from it and the
//! ciphertext of that filter. Only [`PartyMetadata`] leaves this module; the
//! item list and the plaintext bits stay private to the party.

use crate::bloom::{BloomFilter, BloomParams};
use crate::crypto::{EncryptedVector, HeCapability, PublicKey};
use crate::error::{OverlapError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Aggregate, shareable facts about one party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyMetadata {
    pub name: String,
    pub item_count: usize,
    pub set_bits: usize,
    pub false_positive_rate: f64,
}

/// One protocol participant.
///
/// Lifecycle: `set_items` -> `build_filter` -> `encrypt_filter`. Once the
/// filter is encrypted the party is frozen; changing its items requires a new
/// run.
pub struct PartyState {
    name: String,
    items: Option<Vec<String>>,
    filter: Option<BloomFilter>,
    encrypted_filter: Option<EncryptedVector>,
}

impl PartyState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: None,
            filter: None,
            encrypted_filter: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn ensure_not_encrypted(&self) -> Result<()> {
        if self.encrypted_filter.is_some() {
            return Err(OverlapError::AlreadyEncrypted {
                party: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Replace the party's items. Any previously built filter is discarded.
    pub fn set_items<I, S>(&mut self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ensure_not_encrypted()?;
        let items: Vec<String> = items.into_iter().map(|s| s.as_ref().to_string()).collect();
        debug!(party = %self.name, item_count = items.len(), "Items set");
        self.items = Some(items);
        self.filter = None;
        Ok(())
    }

    /// Encode the items into a fresh Bloom filter.
    pub fn build_filter(&mut self, size: usize, hash_count: usize) -> Result<&BloomFilter> {
        self.ensure_not_encrypted()?;
        let params = BloomParams::new(size, hash_count)?;
        let items = self.items.as_ref().ok_or_else(|| {
            OverlapError::NotReady(format!(
                "party '{}' has no items; call set_items before build_filter",
                self.name
            ))
        })?;

        let mut filter = BloomFilter::with_params(params);
        filter.insert_all(items);
        debug!(
            party = %self.name,
            set_bits = filter.set_bit_count(),
            "Bloom filter built"
        );
        Ok(self.filter.insert(filter))
    }

    /// Encrypt the filter under `public_key`.
    ///
    /// Calling this again after a successful encryption returns the existing
    /// ciphertext, so a caller can retry a partly failed run.
    pub fn encrypt_filter<H>(&mut self, capability: &H, public_key: &PublicKey) -> Result<&EncryptedVector>
    where
        H: HeCapability + ?Sized,
    {
        if self.encrypted_filter.is_none() {
            let filter = self.filter.as_ref().ok_or_else(|| {
                OverlapError::NotReady(format!(
                    "party '{}' has no Bloom filter; call build_filter before encrypt_filter",
                    self.name
                ))
            })?;

            let ciphertext = capability.encrypt(public_key, &filter.bits())?;
            debug!(party = %self.name, context = %ciphertext.context(), "Filter encrypted");
            self.encrypted_filter = Some(ciphertext);
        }

        self.encrypted_filter.as_ref().ok_or_else(|| {
            OverlapError::NotReady(format!("party '{}' has no encrypted filter", self.name))
        })
    }

    /// Ciphertext of the filter, once encrypted.
    pub fn encrypted_filter(&self) -> Option<&EncryptedVector> {
        self.encrypted_filter.as_ref()
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted_filter.is_some()
    }

    /// The only externally observable state of a party.
    pub fn metadata(&self) -> Result<PartyMetadata> {
        let filter = self.filter.as_ref().ok_or_else(|| {
            OverlapError::NotReady(format!("party '{}' has no Bloom filter yet", self.name))
        })?;

        Ok(PartyMetadata {
            name: self.name.clone(),
            item_count: self.items.as_ref().map_or(0, Vec::len),
            set_bits: filter.set_bit_count(),
            false_positive_rate: filter.false_positive_rate(),
        })
    }
}

// Items and filter bits are private; Debug reports only counts.
impl std::fmt::Debug for PartyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartyState")
            .field("name", &self.name)
            .field("item_count", &self.items.as_ref().map(Vec::len))
            .field("has_filter", &self.filter.is_some())
            .field("encrypted", &self.encrypted_filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{SchemeParameters, SimulatedBfv};

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

    #[test]
    fn test_build_filter_requires_items() {
        let mut party = PartyState::new("ISP-A");
        let result = party.build_filter(100, 3);
        assert!(matches!(result, Err(OverlapError::NotReady(_))));
    }

    #[test]
    fn test_encrypt_requires_filter() {
        let he = capability(100);
        let keys = he.keygen().unwrap();
        let mut party = PartyState::new("ISP-A");
        party.set_items(["10.0.0.1"]).unwrap();

        let result = party.encrypt_filter(&he, &keys.public_key);
        assert!(matches!(result, Err(OverlapError::NotReady(_))));
    }

    #[test]
    fn test_build_filter_rejects_zero_parameters() {
        let mut party = PartyState::new("ISP-A");
        party.set_items(["a"]).unwrap();
        assert!(matches!(
            party.build_filter(0, 3),
            Err(OverlapError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_metadata_reports_aggregates_only() {
        let mut party = PartyState::new("ISP-A");
        party.set_items(["a.example", "b.example", "a.example"]).unwrap();
        party.build_filter(1000, 4).unwrap();

        let meta = party.metadata().unwrap();
        assert_eq!(meta.name, "ISP-A");
        assert_eq!(meta.item_count, 3);
        assert!(meta.set_bits > 0 && meta.set_bits <= 8);
        assert!(meta.false_positive_rate > 0.0);
    }

    #[test]
    fn test_metadata_requires_filter() {
        let party = PartyState::new("ISP-A");
        assert!(matches!(party.metadata(), Err(OverlapError::NotReady(_))));
    }

    #[test]
    fn test_encrypted_party_is_frozen() {
        let he = capability(64);
        let keys = he.keygen().unwrap();
        let mut party = PartyState::new("ISP-B");
        party.set_items(["x", "y"]).unwrap();
        party.build_filter(64, 2).unwrap();
        party.encrypt_filter(&he, &keys.public_key).unwrap();

        assert!(party.is_encrypted());
        assert!(matches!(
            party.set_items(["z"]),
            Err(OverlapError::AlreadyEncrypted { .. })
        ));
        assert!(matches!(
            party.build_filter(64, 2),
            Err(OverlapError::AlreadyEncrypted { .. })
        ));
    }

    #[test]
    fn test_encrypt_twice_returns_same_ciphertext() {
        let he = capability(64);
        let keys = he.keygen().unwrap();
        let mut party = PartyState::new("ISP-B");
        party.set_items(["x"]).unwrap();
        party.build_filter(64, 2).unwrap();

        let first = party.encrypt_filter(&he, &keys.public_key).unwrap().clone();
        let second = party.encrypt_filter(&he, &keys.public_key).unwrap().clone();
        assert_eq!(first, second);
    }

    #[test]
    fn test_encrypted_filter_decrypts_to_bits() {
        let he = capability(128);
        let keys = he.keygen().unwrap();
        let mut party = PartyState::new("ISP-A");
        party.set_items(["evil.example"]).unwrap();
        let bits = party.build_filter(128, 3).unwrap().bits();
        let ciphertext = party.encrypt_filter(&he, &keys.public_key).unwrap();

        assert_eq!(he.decrypt(&keys.private_key, ciphertext).unwrap(), bits);
    }

    #[test]
    fn test_debug_hides_items() {
        let mut party = PartyState::new("ISP-A");
        party.set_items(["secret-indicator.example"]).unwrap();
        let rendered = format!("{:?}", party);
        assert!(!rendered.contains("secret-indicator"));
    }
}
