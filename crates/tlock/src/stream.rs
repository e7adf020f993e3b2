//! Chunked STREAM payload encryption (age payload format).
//!
//! The payload is a sequence of ChaCha20-Poly1305 chunks of 64 KiB plaintext
//! each. The chunk nonce is an 11-byte big-endian counter followed by a
//! final-chunk flag byte, which binds chunk order and makes truncation
//! detectable. Only one chunk is held in memory at a time.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hkdf::Hkdf;
use sha2::Sha256;
use std::io::{self, Read, Write};

use crate::error::TlockError;

/// Plaintext bytes per chunk.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Length of the per-file payload nonce written after the header.
pub const PAYLOAD_NONCE_LEN: usize = 16;

const TAG_SIZE: usize = 16;
const NONCE_SIZE: usize = 12;
const PAYLOAD_INFO: &[u8] = b"payload";

/// Derive the payload key from the file key and the per-file nonce.
pub fn payload_key(file_key: &[u8], nonce: &[u8; PAYLOAD_NONCE_LEN]) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(Some(nonce), file_key);
    let mut key = [0u8; 32];
    hk.expand(PAYLOAD_INFO, &mut key)
        .expect("32 bytes is a valid HKDF output length");
    key
}

fn chunk_nonce(counter: u64, last: bool) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce[3..11].copy_from_slice(&counter.to_be_bytes());
    nonce[11] = last as u8;
    nonce
}

/// Read until `buf` is full or EOF; returns the number of bytes read.
fn fill<R: Read>(src: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match src.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Encrypt `src` to `dst` as a chunked stream.
///
/// The final chunk is marked in its nonce; an empty input still produces one
/// (empty) final chunk so the stream is never zero-length.
pub fn encrypt_payload<R: Read, W: Write>(
    key: &[u8; 32],
    mut src: R,
    mut dst: W,
) -> Result<(), TlockError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));

    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut len = fill(&mut src, &mut chunk).map_err(|e| TlockError::io("read plaintext", e))?;
    let mut counter: u64 = 0;

    loop {
        // One byte of lookahead decides whether this chunk is the last. A
        // short read above already implies EOF, so non-final chunks are
        // always full.
        let mut peek = [0u8; 1];
        let lookahead =
            fill(&mut src, &mut peek).map_err(|e| TlockError::io("read plaintext", e))?;
        let last = lookahead == 0;

        let nonce = chunk_nonce(counter, last);
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce), &chunk[..len])
            .map_err(|_| TlockError::Aead("chunk encryption failed"))?;
        dst.write_all(&sealed)
            .map_err(|e| TlockError::io("write ciphertext", e))?;

        if last {
            return Ok(());
        }
        counter = counter
            .checked_add(1)
            .ok_or(TlockError::Aead("chunk counter overflow"))?;
        chunk[0] = peek[0];
        len = 1 + fill(&mut src, &mut chunk[1..]).map_err(|e| TlockError::io("read plaintext", e))?;
    }
}

/// Decrypt a chunked stream from `src` to `dst`.
pub fn decrypt_payload<R: Read, W: Write>(
    key: &[u8; 32],
    mut src: R,
    mut dst: W,
) -> Result<(), TlockError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));

    let mut chunk = vec![0u8; CHUNK_SIZE + TAG_SIZE];
    let mut len = fill(&mut src, &mut chunk).map_err(|e| TlockError::io("read ciphertext", e))?;
    let mut counter: u64 = 0;

    loop {
        let mut peek = [0u8; 1];
        let lookahead =
            fill(&mut src, &mut peek).map_err(|e| TlockError::io("read ciphertext", e))?;
        let last = lookahead == 0;

        if len < TAG_SIZE {
            return Err(TlockError::MalformedEnvelope(
                "truncated payload chunk".to_string(),
            ));
        }

        let nonce = chunk_nonce(counter, last);
        let plain = cipher
            .decrypt(Nonce::from_slice(&nonce), &chunk[..len])
            .map_err(|_| TlockError::Aead("chunk authentication failed"))?;

        // Only a sole chunk may be empty; an empty trailing chunk would let
        // an attacker extend a stream without detection.
        if last && plain.is_empty() && counter != 0 {
            return Err(TlockError::MalformedEnvelope(
                "empty final payload chunk".to_string(),
            ));
        }

        dst.write_all(&plain)
            .map_err(|e| TlockError::io("write plaintext", e))?;

        if last {
            return Ok(());
        }
        counter = counter
            .checked_add(1)
            .ok_or(TlockError::Aead("chunk counter overflow"))?;
        chunk[0] = peek[0];
        len =
            1 + fill(&mut src, &mut chunk[1..]).map_err(|e| TlockError::io("read ciphertext", e))?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [7u8; 32];

    fn round_trip(plaintext: &[u8]) -> Vec<u8> {
        let mut sealed = Vec::new();
        encrypt_payload(&KEY, plaintext, &mut sealed).unwrap();

        let mut opened = Vec::new();
        decrypt_payload(&KEY, sealed.as_slice(), &mut opened).unwrap();
        opened
    }

    #[test]
    fn test_round_trip_sizes() {
        for size in [0usize, 1, 1000, CHUNK_SIZE - 1, CHUNK_SIZE, CHUNK_SIZE + 1, 3 * CHUNK_SIZE] {
            let plaintext: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
            assert_eq!(round_trip(&plaintext), plaintext, "size {size}");
        }
    }

    #[test]
    fn test_empty_stream_is_one_chunk() {
        let mut sealed = Vec::new();
        encrypt_payload(&KEY, &[] as &[u8], &mut sealed).unwrap();
        // A single empty final chunk is just the tag.
        assert_eq!(sealed.len(), TAG_SIZE);
    }

    #[test]
    fn test_tampered_chunk_rejected() {
        let mut sealed = Vec::new();
        encrypt_payload(&KEY, &b"hello world"[..], &mut sealed).unwrap();
        sealed[3] ^= 1;

        let mut opened = Vec::new();
        let result = decrypt_payload(&KEY, sealed.as_slice(), &mut opened);
        assert!(matches!(result, Err(TlockError::Aead(_))));
    }

    #[test]
    fn test_truncated_stream_rejected() {
        let plaintext = vec![0x42u8; CHUNK_SIZE + 100];
        let mut sealed = Vec::new();
        encrypt_payload(&KEY, plaintext.as_slice(), &mut sealed).unwrap();

        // Dropping the final chunk flips the last-chunk flag expectation for
        // the chunk that now ends the stream.
        sealed.truncate(CHUNK_SIZE + TAG_SIZE);
        let mut opened = Vec::new();
        let result = decrypt_payload(&KEY, sealed.as_slice(), &mut opened);
        assert!(matches!(result, Err(TlockError::Aead(_))));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let mut sealed = Vec::new();
        encrypt_payload(&KEY, &b"secret"[..], &mut sealed).unwrap();

        let mut opened = Vec::new();
        let result = decrypt_payload(&[8u8; 32], sealed.as_slice(), &mut opened);
        assert!(matches!(result, Err(TlockError::Aead(_))));
    }

    #[test]
    fn test_missing_payload_rejected() {
        let mut opened = Vec::new();
        let result = decrypt_payload(&KEY, &[] as &[u8], &mut opened);
        assert!(matches!(result, Err(TlockError::MalformedEnvelope(_))));
    }
}
