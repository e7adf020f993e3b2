//! IBE wrapping and unwrapping of the per-file data encryption key.
//!
//! The file key is the only IBE-encrypted material; the payload itself uses
//! symmetric crypto for throughput. Wrapping produces the single `tlock`
//! stanza; unwrapping walks the stanza checks in a fixed order, asks the
//! network for the round signature, verifies it, and only then runs IBE
//! decryption. Every failed check is terminal; there are no retries here.

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use tlock_crypto::ibe::{self, IbeCiphertext, IbeParams};
use tlock_crypto::verify_beacon;
use tlock_types::{round_identity, CIPHER_W_LEN, FILE_KEY_LEN};

use crate::error::TlockError;
use crate::stanza::{CipherDek, Stanza, STANZA_TAG};
use crate::Network;

/// The per-file data encryption key. Zeroed on drop.
pub type FileKey = Zeroizing<[u8; FILE_KEY_LEN]>;

/// Generate a fresh random file key.
pub(crate) fn generate_file_key() -> FileKey {
    let mut key = Zeroizing::new([0u8; FILE_KEY_LEN]);
    OsRng.fill_bytes(key.as_mut());
    key
}

/// Wraps file keys for a fixed round on a fixed network.
pub(crate) struct TimelockRecipient<'a, N: Network> {
    network: &'a N,
    round: u64,
}

impl<'a, N: Network> TimelockRecipient<'a, N> {
    pub(crate) fn new(network: &'a N, round: u64) -> Self {
        Self { network, round }
    }

    /// IBE-encrypt the file key to this round's identity and emit the stanza.
    pub(crate) fn wrap(&self, file_key: &FileKey) -> Result<Vec<Stanza>, TlockError> {
        let id = round_identity(self.round);

        let params = IbeParams::from_g1_point(&self.network.public_key())
            .map_err(|e| TlockError::crypto("parse network public key", e))?;
        let ciphertext = ibe::encrypt(&params, &id, file_key.as_ref(), &mut OsRng)
            .map_err(|e| TlockError::crypto("encrypt dek", e))?;

        let point = ibe::compress_g1(&ciphertext.u);
        let w: [u8; CIPHER_W_LEN] = ciphertext
            .w
            .as_slice()
            .try_into()
            .expect("W mirrors the 16-byte file key");

        let dek = CipherDek {
            point: point.0,
            v: ciphertext.v,
            w,
        };

        Ok(vec![dek.into_stanza(self.round, self.network.chain_hash())])
    }
}

/// Unwraps file keys from stanzas against a configured network.
pub(crate) struct TimelockIdentity<'a, N: Network> {
    network: &'a N,
}

impl<'a, N: Network> TimelockIdentity<'a, N> {
    pub(crate) fn new(network: &'a N) -> Self {
        Self { network }
    }

    /// Recover the file key from the envelope stanzas.
    ///
    /// Check order: stanza count, tag, arg count, round parse, chain hash,
    /// body length, round availability, beacon verification, IBE decryption.
    pub(crate) fn unwrap(&self, stanzas: &[Stanza]) -> Result<FileKey, TlockError> {
        let stanza = match stanzas {
            [stanza] => stanza,
            _ => {
                return Err(TlockError::MalformedEnvelope(format!(
                    "check stanzas length: exp: 1 got: {}",
                    stanzas.len()
                )))
            }
        };

        if stanza.tag != STANZA_TAG {
            return Err(TlockError::WrongIdentity);
        }

        if stanza.args.len() != 2 {
            return Err(TlockError::MalformedEnvelope(format!(
                "check stanza args: exp: 2 got: {}",
                stanza.args.len()
            )));
        }

        let round: u64 = stanza.args[0]
            .parse()
            .map_err(|_| TlockError::MalformedEnvelope("parse block round".to_string()))?;

        if stanza.args[1] != self.network.chain_hash().to_string() {
            return Err(TlockError::WrongChain);
        }

        let dek = CipherDek::from_bytes(&stanza.body)?;

        self.decrypt_dek(&dek, round)
    }

    /// Fetch and verify the round signature, then IBE-decrypt the file key.
    fn decrypt_dek(&self, dek: &CipherDek, round: u64) -> Result<FileKey, TlockError> {
        let signature = match self.network.is_ready_to_decrypt(round)? {
            Some(signature) => signature,
            None => return Err(TlockError::TooEarly(round)),
        };

        let public_key = ibe::decompress_g1(&self.network.public_key().0)
            .map_err(|e| TlockError::crypto("parse network public key", e))?;
        let signature = ibe::decompress_g2(&signature.0)
            .map_err(|e| TlockError::crypto("parse beacon signature", e))?;

        // The signature must verify against the network key before it is
        // allowed anywhere near the pairing-based decryption.
        verify_beacon(&public_key, round, &signature)
            .map_err(|_| TlockError::BeaconInvalid(round))?;

        let u = ibe::decompress_g1(&dek.point)
            .map_err(|e| TlockError::crypto("unmarshal G1 point", e))?;
        let ciphertext = IbeCiphertext {
            u,
            v: dek.v,
            w: dek.w.to_vec(),
        };

        let file_key = ibe::decrypt(&signature, &ciphertext)
            .map_err(|e| TlockError::crypto("decrypt dek", e))?;
        let file_key: [u8; FILE_KEY_LEN] = file_key
            .try_into()
            .expect("plaintext mirrors the 16-byte W field");

        Ok(Zeroizing::new(file_key))
    }
}
