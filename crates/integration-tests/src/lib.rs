//! End-to-end tests for the timelock system.
//!
//! These tests exercise the full envelope lifecycle against an in-process
//! beacon network holding a real BLS keypair:
//! 1. Round selection by duration or absolute round
//! 2. Encryption into the envelope format (binary and armored)
//! 3. The too-early sentinel while the round is unpublished
//! 4. Decryption once the network "publishes" the round
//! 5. Envelope and beacon failure modes
//!
//! Publication is advanced explicitly instead of sleeping, so the scenarios
//! are deterministic.

use ff::Field;
use ic_bls12_381::{G1Affine, G1Projective, G2Affine, Scalar};
use rand::rngs::OsRng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tlock::{Network, TlockError};
use tlock_crypto::ibe::{compress_g1, compress_g2, hash_to_g2};
use tlock_types::{round_identity, ChainHash, G1Point, G2Point};

/// An in-process beacon network with a real BLS keypair.
///
/// Rounds up to the published horizon have signatures; everything later
/// reports not-ready. A forged network signs with a key unrelated to its
/// advertised public key, imitating a compromised endpoint.
pub struct FakeNetwork {
    signing_secret: Scalar,
    public_key: G1Point,
    chain_hash: ChainHash,
    period_secs: u64,
    published: AtomicU64,
}

impl FakeNetwork {
    pub fn new(chain_hash: ChainHash) -> Self {
        let secret = Scalar::random(&mut OsRng);
        Self::with_secrets(secret, secret, chain_hash)
    }

    /// A network whose published signatures do not verify under its
    /// advertised public key.
    pub fn forged(chain_hash: ChainHash) -> Self {
        let secret = Scalar::random(&mut OsRng);
        let unrelated = Scalar::random(&mut OsRng);
        Self::with_secrets(secret, unrelated, chain_hash)
    }

    fn with_secrets(master: Scalar, signing: Scalar, chain_hash: ChainHash) -> Self {
        let public_key = compress_g1(&G1Affine::from(G1Projective::generator() * master));
        Self {
            signing_secret: signing,
            public_key,
            chain_hash,
            period_secs: 3,
            published: AtomicU64::new(0),
        }
    }

    /// Mark every round up to and including `round` as published.
    pub fn publish(&self, round: u64) {
        self.published.fetch_max(round, Ordering::SeqCst);
    }

    fn sign(&self, round: u64) -> G2Point {
        let q = hash_to_g2(&round_identity(round));
        compress_g2(&G2Affine::from(q * self.signing_secret))
    }
}

impl Network for FakeNetwork {
    fn chain_hash(&self) -> ChainHash {
        self.chain_hash
    }

    fn public_key(&self) -> G1Point {
        self.public_key.clone()
    }

    fn round_number(&self, at: SystemTime) -> Result<u64, TlockError> {
        let at = at
            .duration_since(UNIX_EPOCH)
            .map_err(|_| TlockError::Network("timestamp before unix epoch".to_string()))?
            .as_secs();
        Ok(at.div_ceil(self.period_secs) + 1)
    }

    fn is_ready_to_decrypt(&self, round: u64) -> Result<Option<G2Point>, TlockError> {
        if round > self.published.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(self.sign(round)))
    }
}
