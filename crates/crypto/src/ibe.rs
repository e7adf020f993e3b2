//! Identity-Based Encryption using BLS12-381 pairings.
//!
//! This implements the Boneh-Franklin IBE scheme with the Fujisaki-Okamoto
//! transform, arranged so that an unchained beacon signature works directly as
//! the identity's private key.
//!
//! # Encryption
//!
//! To encrypt a message `m` to identity `id`:
//! 1. Compute Q_id = H1(id) ∈ G2
//! 2. Sample random 16-byte sigma
//! 3. Derive scalar r = H3(sigma || m)
//! 4. Compute U = r·G1 (ephemeral commitment)
//! 5. Compute shared = e(r·pk, Q_id)
//! 6. V = sigma XOR H2(shared), W = m XOR H4(sigma)
//!
//! # Decryption
//!
//! Given the decryption key σ (the BLS signature on id):
//! 1. Compute shared = e(U, σ)
//! 2. Recover sigma = V XOR H2(shared), then m = W XOR H4(sigma)
//! 3. Recompute r = H3(sigma || m) and reject unless U == r·G1
//!
//! H1 uses the same RFC 9380 hash-to-G2 map the beacon signs with, so
//! σ = sk·H1(id) is exactly the beacon's signature over `id`.

use hkdf::Hkdf;
use ic_bls12_381::hash_to_curve::{ExpandMsgXmd, HashToCurve, HashToField};
use ic_bls12_381::{pairing, G1Affine, G1Projective, G2Affine, G2Projective, Gt, Scalar};
use rand::{CryptoRng, RngCore};
use sha2::Sha256;

use tlock_types::{G1Point, G2Point, CIPHER_V_LEN};

use crate::error::CryptoError;

/// Domain separation tag for hashing an identity to G2.
///
/// This is the standard BLS signature DST, shared with the beacon so that a
/// round signature doubles as the IBE private key for that round's identity.
pub const H1_DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_NUL_";

const H2_INFO: &[u8] = b"IBE-H2";
const H3_DST: &[u8] = b"IBE-H3";
const H4_INFO: &[u8] = b"IBE-H4";

/// HKDF-SHA256 caps a single expansion at 255 blocks.
const MAX_MESSAGE_LEN: usize = 255 * 32;

/// Parameters for IBE encryption.
pub struct IbeParams {
    /// Network public key (pk = s·G1 where s is the master secret)
    pub public_key: G1Affine,
}

impl IbeParams {
    /// Create IBE params from a compressed G1 point.
    pub fn from_bytes(bytes: &[u8; 48]) -> Result<Self, CryptoError> {
        let public_key = decompress_g1(bytes)?;
        Ok(Self { public_key })
    }

    /// Create IBE params from the G1Point wire type.
    pub fn from_g1_point(point: &G1Point) -> Result<Self, CryptoError> {
        Self::from_bytes(&point.0)
    }
}

/// IBE ciphertext triple.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IbeCiphertext {
    /// Ephemeral commitment U = r·G1
    pub u: G1Affine,
    /// Masked sigma: V = sigma XOR H2(e(r·pk, Q_id))
    pub v: [u8; CIPHER_V_LEN],
    /// Masked message: W = m XOR H4(sigma), |W| = |m|
    pub w: Vec<u8>,
}

/// Encrypt a message to an identity.
///
/// # Arguments
/// * `params` - IBE parameters containing the network public key
/// * `identity` - The identity to encrypt to (for timelock, H(round))
/// * `message` - The message to encrypt; for the timelock use this is the
///   16-byte file key
/// * `rng` - Cryptographically secure random number generator
///
/// # Returns
/// A ciphertext decryptable with the BLS signature on `identity`
pub fn encrypt<R: RngCore + CryptoRng>(
    params: &IbeParams,
    identity: &[u8],
    message: &[u8],
    rng: &mut R,
) -> Result<IbeCiphertext, CryptoError> {
    if message.len() > MAX_MESSAGE_LEN {
        return Err(CryptoError::MessageTooLong {
            limit: MAX_MESSAGE_LEN,
            got: message.len(),
        });
    }

    // 1. Hash identity to G2
    let q_id = hash_to_g2(identity);

    // 2. Sample sigma and derive the encryption scalar from it (FO transform:
    //    r is a function of sigma and the message, re-checked on decryption)
    let mut sigma = [0u8; CIPHER_V_LEN];
    rng.fill_bytes(&mut sigma);
    let r = h3(&sigma, message);

    // 3. Ephemeral commitment U = r·G1
    let u = G1Affine::from(G1Projective::generator() * r);

    // 4. Shared secret: e(pk, Q_id)^r = e(r·pk, Q_id)
    let r_pub = G1Affine::from(params.public_key * r);
    let shared = pairing(&r_pub, &q_id);

    // 5. Mask sigma and the message
    let v = xor_sigma(&sigma, &h2(&shared));
    let w = xor(message, &h4(&sigma, message.len())?);

    Ok(IbeCiphertext { u, v, w })
}

/// Decrypt a ciphertext using the identity's decryption key.
///
/// # Arguments
/// * `signature` - The BLS signature σ = s·H1(id) acting as the private key
/// * `ciphertext` - Ciphertext to decrypt
///
/// # Returns
/// The decrypted message, or [`CryptoError::IntegrityCheckFailed`] if the
/// ciphertext does not pass the Fujisaki-Okamoto re-encryption check
pub fn decrypt(signature: &G2Affine, ciphertext: &IbeCiphertext) -> Result<Vec<u8>, CryptoError> {
    // 1. Shared secret: e(U, σ) = e(r·G1, s·Q_id) = e(pk, Q_id)^r
    let shared = pairing(&ciphertext.u, signature);

    // 2. Unmask sigma, then the message
    let sigma = xor_sigma(&ciphertext.v, &h2(&shared));
    let message = xor(&ciphertext.w, &h4(&sigma, ciphertext.w.len())?);

    // 3. Integrity: the sender must have derived U from this sigma and message
    let r = h3(&sigma, &message);
    let expected_u = G1Affine::from(G1Projective::generator() * r);
    if ciphertext.u != expected_u {
        return Err(CryptoError::IntegrityCheckFailed);
    }

    Ok(message)
}

/// Hash an identity to a G2 point using RFC 9380 hash-to-curve.
pub fn hash_to_g2(identity: &[u8]) -> G2Affine {
    let point =
        <G2Projective as HashToCurve<ExpandMsgXmd<Sha256>>>::hash_to_curve(identity, H1_DST);
    G2Affine::from(point)
}

/// H2: GT -> 16 bytes, masks sigma.
fn h2(shared: &Gt) -> [u8; CIPHER_V_LEN] {
    let hk = Hkdf::<Sha256>::new(None, &shared.to_bytes());
    let mut mask = [0u8; CIPHER_V_LEN];
    hk.expand(H2_INFO, &mut mask)
        .expect("16 bytes is a valid HKDF output length");
    mask
}

/// H3: (sigma, message) -> scalar, derives the encryption randomness.
fn h3(sigma: &[u8; CIPHER_V_LEN], message: &[u8]) -> Scalar {
    let mut input = Vec::with_capacity(sigma.len() + message.len());
    input.extend_from_slice(sigma);
    input.extend_from_slice(message);

    let mut out = [Scalar::zero()];
    <Scalar as HashToField>::hash_to_field::<ExpandMsgXmd<Sha256>>(&input, H3_DST, &mut out);
    out[0]
}

/// H4: sigma -> |message| bytes, masks the message.
fn h4(sigma: &[u8; CIPHER_V_LEN], len: usize) -> Result<Vec<u8>, CryptoError> {
    let hk = Hkdf::<Sha256>::new(None, sigma);
    let mut mask = vec![0u8; len];
    hk.expand(H4_INFO, &mut mask)
        .map_err(|_| CryptoError::KeyDerivationFailed)?;
    Ok(mask)
}

fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x ^ y).collect()
}

fn xor_sigma(a: &[u8; CIPHER_V_LEN], b: &[u8; CIPHER_V_LEN]) -> [u8; CIPHER_V_LEN] {
    let mut out = [0u8; CIPHER_V_LEN];
    for (i, o) in out.iter_mut().enumerate() {
        *o = a[i] ^ b[i];
    }
    out
}

/// Compress a G1 point to its 48-byte wire form.
pub fn compress_g1(point: &G1Affine) -> G1Point {
    G1Point(point.to_compressed())
}

/// Decompress a G1 point from bytes.
pub fn decompress_g1(bytes: &[u8; 48]) -> Result<G1Affine, CryptoError> {
    let point = G1Affine::from_compressed(bytes);
    if point.is_some().into() {
        Ok(point.unwrap())
    } else {
        Err(CryptoError::InvalidG1Point)
    }
}

/// Compress a G2 point to its 96-byte wire form.
pub fn compress_g2(point: &G2Affine) -> G2Point {
    G2Point(point.to_compressed())
}

/// Decompress a G2 point from bytes.
pub fn decompress_g2(bytes: &[u8; 96]) -> Result<G2Affine, CryptoError> {
    let point = G2Affine::from_compressed(bytes);
    if point.is_some().into() {
        Ok(point.unwrap())
    } else {
        Err(CryptoError::InvalidG2Point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff::Field;
    use rand::rngs::OsRng;

    fn test_keypair() -> (Scalar, IbeParams) {
        let sk = Scalar::random(&mut OsRng);
        let pk = G1Affine::from(G1Projective::generator() * sk);
        (sk, IbeParams { public_key: pk })
    }

    fn extract(sk: &Scalar, identity: &[u8]) -> G2Affine {
        G2Affine::from(hash_to_g2(identity) * sk)
    }

    #[test]
    fn test_hash_to_g2() {
        let p1 = hash_to_g2(b"identity 1");
        let p2 = hash_to_g2(b"identity 2");
        let p3 = hash_to_g2(b"identity 1");

        assert_ne!(p1, p2);
        assert_eq!(p1, p3);
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let mut rng = OsRng;
        let (sk, params) = test_keypair();

        let identity = tlock_types::round_identity(1000);
        let message = [7u8; 16];

        let ciphertext = encrypt(&params, &identity, &message, &mut rng).unwrap();
        assert_eq!(ciphertext.w.len(), message.len());

        let signature = extract(&sk, &identity);
        let decrypted = decrypt(&signature, &ciphertext).unwrap();

        assert_eq!(decrypted, message);
    }

    #[test]
    fn test_wrong_signature_fails() {
        let mut rng = OsRng;
        let (sk, params) = test_keypair();

        let identity = tlock_types::round_identity(1000);
        let message = [7u8; 16];
        let ciphertext = encrypt(&params, &identity, &message, &mut rng).unwrap();

        // Signature over a different identity
        let wrong = extract(&sk, &tlock_types::round_identity(1001));
        assert_eq!(
            decrypt(&wrong, &ciphertext),
            Err(CryptoError::IntegrityCheckFailed)
        );
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let mut rng = OsRng;
        let (sk, params) = test_keypair();

        let identity = tlock_types::round_identity(5);
        let message = [3u8; 16];
        let mut ciphertext = encrypt(&params, &identity, &message, &mut rng).unwrap();
        ciphertext.v[0] ^= 1;

        let signature = extract(&sk, &identity);
        assert_eq!(
            decrypt(&signature, &ciphertext),
            Err(CryptoError::IntegrityCheckFailed)
        );
    }

    #[test]
    fn test_variable_length_message() {
        let mut rng = OsRng;
        let (sk, params) = test_keypair();

        let identity = tlock_types::round_identity(42);
        let message = b"a message that is longer than the sixteen byte file key";

        let ciphertext = encrypt(&params, &identity, message, &mut rng).unwrap();
        let signature = extract(&sk, &identity);
        assert_eq!(decrypt(&signature, &ciphertext).unwrap(), message);
    }

    #[test]
    fn test_message_too_long() {
        let mut rng = OsRng;
        let (_, params) = test_keypair();

        let message = vec![0u8; MAX_MESSAGE_LEN + 1];
        let result = encrypt(&params, b"id", &message, &mut rng);
        assert!(matches!(result, Err(CryptoError::MessageTooLong { .. })));
    }

    #[test]
    fn test_point_compression_roundtrip() {
        let (sk, params) = test_keypair();

        let g1 = compress_g1(&params.public_key);
        assert_eq!(decompress_g1(&g1.0).unwrap(), params.public_key);

        let sig = extract(&sk, b"some identity");
        let g2 = compress_g2(&sig);
        assert_eq!(decompress_g2(&g2.0).unwrap(), sig);
    }

    #[test]
    fn test_decompress_rejects_garbage() {
        assert_eq!(
            decompress_g1(&[0xffu8; 48]),
            Err(CryptoError::InvalidG1Point)
        );
        assert_eq!(
            decompress_g2(&[0xffu8; 96]),
            Err(CryptoError::InvalidG2Point)
        );
    }
}
