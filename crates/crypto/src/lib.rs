//! Pairing-based primitives for timelock encryption.
//!
//! This crate implements Identity-Based Encryption (IBE) over the BLS12-381
//! curve together with verification of the threshold BLS beacon signatures
//! that act as the identities' private keys.
//!
//! # Overview
//!
//! The timelock scheme works as follows:
//!
//! 1. **Setup**: A beacon network holds a threshold-shared master secret s
//!    with public key pk = s·G1. It publishes one signature per round:
//!    σ_R = s·H1(SHA-256(R_be)).
//!
//! 2. **Encryption**: Anyone can encrypt to a future round R using only pk
//!    and R, by treating SHA-256(R_be) as an IBE identity.
//!
//! 3. **Decryption**: Once the network publishes σ_R, that signature is the
//!    IBE private key for round R and unlocks every ciphertext addressed to
//!    it. Until then, fewer than the threshold of nodes can learn nothing.
//!
//! Curve arithmetic, pairings, and hash-to-curve come from an audited
//! BLS12-381 implementation; this crate only composes them.

pub mod beacon;
pub mod error;
pub mod ibe;

pub use beacon::verify_beacon;
pub use error::CryptoError;
pub use ibe::{decrypt, encrypt, IbeCiphertext, IbeParams};
