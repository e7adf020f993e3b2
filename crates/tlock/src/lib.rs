//! Timelock encryption against a threshold BLS randomness beacon.
//!
//! Data encrypted to a future beacon round becomes decryptable only once the
//! network publishes its signature for that round; until then the ciphertext
//! is useless to everyone, its creator included. The construction is a hybrid
//! envelope: a random 16-byte file key protects the payload through a chunked
//! AEAD stream, and the file key itself is identity-based-encrypted to
//! `SHA-256(round_be)` under the network public key. The round signature,
//! once published, is the identity's private key.
//!
//! The envelope rides the age file container: the encrypted file key travels
//! in a `tlock` stanza carrying the round number and chain hash, followed by
//! the standard chunked payload. Output can optionally be ASCII-armored.
//!
//! # Example
//!
//! ```no_run
//! use tlock::{Decrypter, Encrypter, Network};
//!
//! fn round_trip<N: Network>(network: N, round: u64) -> Result<(), tlock::TlockError> {
//!     let plaintext = b"decrypt me later".as_slice();
//!     let mut sealed = Vec::new();
//!     Encrypter::new(&network).encrypt(&mut sealed, plaintext, round, false)?;
//!
//!     // Once the network has published `round`:
//!     let mut opened = Vec::new();
//!     Decrypter::new(&network).decrypt(&mut opened, sealed.as_slice(), false)?;
//!     Ok(())
//! }
//! ```
//!
//! # Concurrency
//!
//! Every object here is read-only after construction. Any number of encrypt
//! and decrypt operations may run in parallel over one shared [`Network`]
//! handle; a single operation is synchronous and streams with O(1) memory in
//! the payload size.

pub mod armor;
pub mod dek;
pub mod error;
pub mod format;
pub mod stanza;
pub mod stream;

use std::io::{BufRead, BufReader, Read, Write};
use std::time::SystemTime;

use rand::rngs::OsRng;
use rand::RngCore;

use tlock_types::{ChainHash, G1Point, G2Point};

use crate::armor::{ArmorReader, ArmorWriter};
use crate::dek::{TimelockIdentity, TimelockRecipient};
pub use crate::error::TlockError;
pub use crate::stanza::{CipherDek, Stanza, STANZA_TAG};

/// A beacon network, answering the four questions timelock needs.
///
/// Implementations are long-lived and shared by concurrent operations; all
/// methods take `&self`. An implementation that supports cancellation or
/// deadlines returns [`TlockError::Cancelled`] from an aborted lookup, which
/// the core propagates unchanged.
pub trait Network {
    /// The chain hash identifying this beacon chain's configuration.
    fn chain_hash(&self) -> ChainHash;

    /// The network's G1 public key, constant per chain.
    fn public_key(&self) -> G1Point;

    /// The smallest round whose scheduled time is at or after `at`.
    fn round_number(&self, at: SystemTime) -> Result<u64, TlockError>;

    /// The signature for `round`, or `None` (not an error) while the round
    /// is still in the future.
    fn is_ready_to_decrypt(&self, round: u64) -> Result<Option<G2Point>, TlockError>;
}

impl<N: Network + ?Sized> Network for &N {
    fn chain_hash(&self) -> ChainHash {
        (**self).chain_hash()
    }

    fn public_key(&self) -> G1Point {
        (**self).public_key()
    }

    fn round_number(&self, at: SystemTime) -> Result<u64, TlockError> {
        (**self).round_number(at)
    }

    fn is_ready_to_decrypt(&self, round: u64) -> Result<Option<G2Point>, TlockError> {
        (**self).is_ready_to_decrypt(round)
    }
}

/// Streams plaintext into a timelock envelope.
pub struct Encrypter<N: Network> {
    network: N,
}

impl<N: Network> Encrypter<N> {
    pub fn new(network: N) -> Self {
        Self { network }
    }

    /// Encrypt `src` to `dst` so it can be decrypted once `round` elapses.
    ///
    /// The stanza header is written strictly before the first payload byte.
    /// With `armor` set the whole envelope is wrapped in PEM-style framing.
    pub fn encrypt<W: Write, R: Read>(
        &self,
        dst: W,
        src: R,
        round: u64,
        armor: bool,
    ) -> Result<(), TlockError> {
        tracing::debug!(round, armor, "encrypting to round");
        if armor {
            let mut armored = ArmorWriter::new(dst);
            self.encrypt_binary(&mut armored, src, round)?;
            armored
                .finish()
                .map_err(|e| TlockError::io("finish armor", e))?;
            Ok(())
        } else {
            self.encrypt_binary(dst, src, round)
        }
    }

    fn encrypt_binary<W: Write, R: Read>(
        &self,
        mut dst: W,
        src: R,
        round: u64,
    ) -> Result<(), TlockError> {
        let file_key = dek::generate_file_key();

        let recipient = TimelockRecipient::new(&self.network, round);
        let stanzas = recipient.wrap(&file_key)?;

        let covered = format::header_without_mac(&stanzas);
        let mac = format::header_mac(file_key.as_ref(), &covered);
        format::write_header(&mut dst, &stanzas, &mac)
            .map_err(|e| TlockError::io("write header", e))?;

        let mut nonce = [0u8; stream::PAYLOAD_NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        dst.write_all(&nonce)
            .map_err(|e| TlockError::io("write payload nonce", e))?;

        let payload_key = stream::payload_key(file_key.as_ref(), &nonce);
        stream::encrypt_payload(&payload_key, src, &mut dst)?;

        dst.flush().map_err(|e| TlockError::io("flush output", e))
    }
}

/// Streams a timelock envelope back into plaintext.
pub struct Decrypter<N: Network> {
    network: N,
}

impl<N: Network> Decrypter<N> {
    pub fn new(network: N) -> Self {
        Self { network }
    }

    /// Decrypt `src` to `dst`.
    ///
    /// The header is parsed and the file key unwrapped before a single
    /// payload byte is touched, so a failing envelope (wrong chain, too
    /// early, forged beacon) writes nothing to `dst`. Returns the
    /// [`TlockError::TooEarly`] sentinel while the round is unpublished.
    pub fn decrypt<W: Write, R: Read>(&self, dst: W, src: R, armor: bool) -> Result<(), TlockError> {
        let src = BufReader::new(src);
        if armor {
            self.decrypt_binary(dst, BufReader::new(ArmorReader::new(src)))
        } else {
            self.decrypt_binary(dst, src)
        }
    }

    fn decrypt_binary<W: Write, R: BufRead>(
        &self,
        mut dst: W,
        mut src: R,
    ) -> Result<(), TlockError> {
        let (stanzas, mac) = format::read_header(&mut src)?;

        let identity = TimelockIdentity::new(&self.network);
        let file_key = identity.unwrap(&stanzas)?;

        let covered = format::header_without_mac(&stanzas);
        format::verify_header_mac(file_key.as_ref(), &covered, &mac)?;

        let mut nonce = [0u8; stream::PAYLOAD_NONCE_LEN];
        src.read_exact(&mut nonce)
            .map_err(|e| TlockError::io("read payload nonce", e))?;

        let payload_key = stream::payload_key(file_key.as_ref(), &nonce);
        stream::decrypt_payload(&payload_key, src, &mut dst)?;

        dst.flush().map_err(|e| TlockError::io("flush output", e))
    }
}
