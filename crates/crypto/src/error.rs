//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid G1 point encoding")]
    InvalidG1Point,

    #[error("Invalid G2 point encoding")]
    InvalidG2Point,

    #[error("Message too long: limit {limit}, got {got}")]
    MessageTooLong { limit: usize, got: usize },

    #[error("Ciphertext integrity check failed")]
    IntegrityCheckFailed,

    #[error("Beacon signature verification failed")]
    InvalidBeaconSignature,

    #[error("Key derivation failed")]
    KeyDerivationFailed,
}
