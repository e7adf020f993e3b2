//! Error types for timelock encryption and decryption.

use std::io;
use thiserror::Error;
use tlock_crypto::CryptoError;

/// Errors that can occur while building or opening a timelock envelope.
#[derive(Debug, Error)]
pub enum TlockError {
    /// The beacon has not yet published the signature for this round.
    ///
    /// This is the only retryable crypto-level error: callers waiting for a
    /// round to elapse should poll with [`TlockError::is_too_early`].
    #[error("too early: round {0} is not yet available")]
    TooEarly(u64),

    /// The stanza names a different beacon chain than the configured network.
    #[error("wrong chainhash")]
    WrongChain,

    /// The stanza is a valid envelope record but not a timelock stanza.
    #[error("not a timelock stanza")]
    WrongIdentity,

    /// The envelope framing is wrong: stanza arity, round encoding, body
    /// length, payload chunking, or the header MAC.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The retrieved round signature failed BLS verification. Fatal: the
    /// beacon endpoint is compromised or misbehaving.
    #[error("verify beacon: signature rejected for round {0}")]
    BeaconInvalid(u64),

    /// A pairing-layer failure: point unmarshalling, IBE encrypt/decrypt.
    #[error("{context}: {source}")]
    Crypto {
        context: &'static str,
        #[source]
        source: CryptoError,
    },

    /// AEAD failure on the payload stream.
    #[error("payload: {0}")]
    Aead(&'static str),

    /// Reader or writer failure.
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    /// Transport failure talking to the beacon network.
    #[error("network: {0}")]
    Network(String),

    /// The caller withdrew the operation mid-flight.
    #[error("operation cancelled")]
    Cancelled,
}

impl TlockError {
    pub fn crypto(context: &'static str, source: CryptoError) -> Self {
        Self::Crypto { context, source }
    }

    pub fn io(context: &'static str, source: io::Error) -> Self {
        Self::Io { context, source }
    }

    /// Whether this error is the "round not yet available" sentinel.
    ///
    /// The sentinel is the pivot for client retry loops; every other variant
    /// is terminal for the attempted operation.
    pub fn is_too_early(&self) -> bool {
        matches!(self, Self::TooEarly(_))
    }
}
