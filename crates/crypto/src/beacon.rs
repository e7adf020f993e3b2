//! Beacon signature verification for unchained networks.
//!
//! An unchained beacon signs `SHA-256(round_be)` for every round; the
//! signature does not commit to the previous round's signature. Verification
//! is the plain BLS check
//!
//! ```text
//! e(G1, σ) == e(pk, H1(SHA-256(round_be)))
//! ```
//!
//! evaluated as a single multi-Miller loop. This check must run before any
//! IBE decryption so a misbehaving beacon endpoint cannot feed the decrypter
//! forged round signatures.

use group::Group;
use ic_bls12_381::{multi_miller_loop, G1Affine, G2Affine, G2Prepared};
use std::ops::Neg;

use tlock_types::round_identity;

use crate::error::CryptoError;
use crate::ibe::hash_to_g2;

/// Verify a claimed round signature against the network public key.
///
/// # Arguments
/// * `public_key` - The network's G1 public key
/// * `round` - The beacon round the signature is claimed for
/// * `signature` - The claimed G2 signature
///
/// # Returns
/// `Ok(())` if the signature is the network's BLS signature over the round
pub fn verify_beacon(
    public_key: &G1Affine,
    round: u64,
    signature: &G2Affine,
) -> Result<(), CryptoError> {
    if bool::from(public_key.is_identity()) {
        return Err(CryptoError::InvalidBeaconSignature);
    }

    let message = round_identity(round);
    let q = hash_to_g2(&message);

    // e(-G1, σ) · e(pk, H1(m)) == 1  ⇔  e(G1, σ) == e(pk, H1(m))
    let neg_g = G1Affine::generator().neg();
    let check = multi_miller_loop(&[
        (&neg_g, &G2Prepared::from(*signature)),
        (public_key, &G2Prepared::from(q)),
    ])
    .final_exponentiation();

    if bool::from(check.is_identity()) {
        Ok(())
    } else {
        Err(CryptoError::InvalidBeaconSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff::Field;
    use ic_bls12_381::{G1Projective, Scalar};
    use rand::rngs::OsRng;

    fn sign_round(sk: &Scalar, round: u64) -> G2Affine {
        G2Affine::from(hash_to_g2(&round_identity(round)) * sk)
    }

    #[test]
    fn test_valid_beacon_accepted() {
        let sk = Scalar::random(&mut OsRng);
        let pk = G1Affine::from(G1Projective::generator() * sk);

        let signature = sign_round(&sk, 1234);
        assert!(verify_beacon(&pk, 1234, &signature).is_ok());
    }

    #[test]
    fn test_wrong_round_rejected() {
        let sk = Scalar::random(&mut OsRng);
        let pk = G1Affine::from(G1Projective::generator() * sk);

        let signature = sign_round(&sk, 1234);
        assert_eq!(
            verify_beacon(&pk, 1235, &signature),
            Err(CryptoError::InvalidBeaconSignature)
        );
    }

    #[test]
    fn test_wrong_key_rejected() {
        let sk = Scalar::random(&mut OsRng);
        let other = Scalar::random(&mut OsRng);
        let pk = G1Affine::from(G1Projective::generator() * sk);

        let signature = sign_round(&other, 1234);
        assert_eq!(
            verify_beacon(&pk, 1234, &signature),
            Err(CryptoError::InvalidBeaconSignature)
        );
    }

    #[test]
    fn test_identity_public_key_rejected() {
        let sk = Scalar::random(&mut OsRng);
        let pk = G1Affine::from(G1Projective::identity());

        let signature = sign_round(&sk, 1);
        assert_eq!(
            verify_beacon(&pk, 1, &signature),
            Err(CryptoError::InvalidBeaconSignature)
        );
    }
}
