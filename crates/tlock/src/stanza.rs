//! The timelock stanza and its fixed-length body codec.
//!
//! A stanza is one labeled record in the envelope header. The timelock stanza
//! carries the round number and chain hash as arguments and the IBE-encrypted
//! file key as its body: `U(48) ‖ V(16) ‖ W(16)`, exactly 80 bytes.

use tlock_types::{ChainHash, CIPHER_DEK_LEN, CIPHER_V_LEN, CIPHER_W_LEN, G1_POINT_LEN};

use crate::error::TlockError;

/// Stanza tag identifying a timelock record.
pub const STANZA_TAG: &str = "tlock";

/// A labeled envelope record: a tag, string arguments, and a binary body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stanza {
    pub tag: String,
    pub args: Vec<String>,
    pub body: Vec<u8>,
}

/// The encrypted file key, split into its three wire regions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CipherDek {
    /// Compressed IBE commitment U.
    pub point: [u8; G1_POINT_LEN],
    /// Masked sigma.
    pub v: [u8; CIPHER_V_LEN],
    /// Masked file key.
    pub w: [u8; CIPHER_W_LEN],
}

impl CipherDek {
    /// Serialize as `U ‖ V ‖ W`.
    pub fn to_bytes(&self) -> [u8; CIPHER_DEK_LEN] {
        let mut out = [0u8; CIPHER_DEK_LEN];
        out[..G1_POINT_LEN].copy_from_slice(&self.point);
        out[G1_POINT_LEN..G1_POINT_LEN + CIPHER_V_LEN].copy_from_slice(&self.v);
        out[G1_POINT_LEN + CIPHER_V_LEN..].copy_from_slice(&self.w);
        out
    }

    /// Slice a stanza body back into the three regions.
    ///
    /// Only the total length is validated here; whether `point` decompresses
    /// to a valid G1 element is the IBE engine's concern.
    pub fn from_bytes(body: &[u8]) -> Result<Self, TlockError> {
        if body.len() != CIPHER_DEK_LEN {
            return Err(TlockError::MalformedEnvelope(format!(
                "incorrect body length: exp: {} got: {}",
                CIPHER_DEK_LEN,
                body.len()
            )));
        }

        let point = body[..G1_POINT_LEN]
            .try_into()
            .expect("region length checked");
        let v = body[G1_POINT_LEN..G1_POINT_LEN + CIPHER_V_LEN]
            .try_into()
            .expect("region length checked");
        let w = body[G1_POINT_LEN + CIPHER_V_LEN..]
            .try_into()
            .expect("region length checked");

        Ok(Self { point, v, w })
    }

    /// Wrap into a `tlock` stanza addressed to `round` on `chain_hash`.
    pub fn into_stanza(self, round: u64, chain_hash: ChainHash) -> Stanza {
        Stanza {
            tag: STANZA_TAG.to_string(),
            args: vec![round.to_string(), chain_hash.to_string()],
            body: self.to_bytes().to_vec(),
        }
    }
}
