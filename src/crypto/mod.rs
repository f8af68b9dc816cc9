//! Homomorphic-encryption boundary for the overlap protocol
//!
//! This module implements:
//! - The capability trait the protocol consumes (keygen, encrypt, decrypt,
//!   slot-wise multiply/add, rotation, rotation-based slot summation)
//! - Context-bound key and ciphertext handles
//! - A simulated BFV backend for tests, benches and the CLI

pub mod capability;
pub mod simulated;

pub use capability::{
    ContextId, EncryptedVector, HeCapability, HeError, HeResult, KeyPair, PrivateKey, PublicKey,
    SchemeParameters,
};
pub use simulated::SimulatedBfv;
