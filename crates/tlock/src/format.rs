//! Envelope header framing (age v1 wire format).
//!
//! ```text
//! age-encryption.org/v1
//! -> tlock <round> <chain hash hex>
//! <body, unpadded base64 wrapped at 64 columns>
//! --- <HMAC-SHA256, unpadded base64>
//! ```
//!
//! The MAC key is derived from the file key and covers the header from the
//! version line through `---` inclusive, so a decrypter can only authenticate
//! the header after unwrapping the file key.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::io::{self, BufRead, Write};

use crate::error::TlockError;
use crate::stanza::Stanza;

/// Version line opening every envelope.
pub const V1_MAGIC: &str = "age-encryption.org/v1";

const STANZA_PREFIX: &str = "-> ";
const MAC_PREFIX: &str = "---";
const COLUMNS: usize = 64;

/// Length of the header MAC.
pub const MAC_LEN: usize = 32;

const HEADER_INFO: &[u8] = b"header";

type HmacSha256 = Hmac<Sha256>;

/// Render the header through the `---` marker: the MAC-covered region.
pub fn header_without_mac(stanzas: &[Stanza]) -> Vec<u8> {
    let mut out = String::new();
    out.push_str(V1_MAGIC);
    out.push('\n');

    for stanza in stanzas {
        out.push_str(STANZA_PREFIX);
        out.push_str(&stanza.tag);
        for arg in &stanza.args {
            out.push(' ');
            out.push_str(arg);
        }
        out.push('\n');

        // Body wraps at 64 columns; the final line is strictly shorter, so a
        // body that fills its last line exactly is followed by an empty line.
        let encoded = STANDARD_NO_PAD.encode(&stanza.body);
        let mut rest = encoded.as_str();
        while rest.len() >= COLUMNS {
            let (line, tail) = rest.split_at(COLUMNS);
            out.push_str(line);
            out.push('\n');
            rest = tail;
        }
        out.push_str(rest);
        out.push('\n');
    }

    out.push_str(MAC_PREFIX);
    out.into_bytes()
}

fn keyed_mac(file_key: &[u8]) -> HmacSha256 {
    let hk = Hkdf::<Sha256>::new(None, file_key);
    let mut mac_key = [0u8; MAC_LEN];
    hk.expand(HEADER_INFO, &mut mac_key)
        .expect("32 bytes is a valid HKDF output length");
    HmacSha256::new_from_slice(&mac_key).expect("HMAC accepts any key length")
}

/// Compute the header MAC under the file-key-derived MAC key.
pub fn header_mac(file_key: &[u8], covered: &[u8]) -> [u8; MAC_LEN] {
    let mut mac = keyed_mac(file_key);
    mac.update(covered);
    mac.finalize().into_bytes().into()
}

/// Verify a claimed header MAC in constant time.
pub fn verify_header_mac(
    file_key: &[u8],
    covered: &[u8],
    claimed: &[u8; MAC_LEN],
) -> Result<(), TlockError> {
    let mut mac = keyed_mac(file_key);
    mac.update(covered);
    mac.verify_slice(claimed)
        .map_err(|_| TlockError::MalformedEnvelope("invalid header MAC".to_string()))
}

/// Write the complete header: covered region, space, base64 MAC, newline.
pub fn write_header<W: Write>(
    mut dst: W,
    stanzas: &[Stanza],
    mac: &[u8; MAC_LEN],
) -> io::Result<()> {
    dst.write_all(&header_without_mac(stanzas))?;
    dst.write_all(b" ")?;
    dst.write_all(STANDARD_NO_PAD.encode(mac).as_bytes())?;
    dst.write_all(b"\n")
}

fn malformed(msg: &str) -> TlockError {
    TlockError::MalformedEnvelope(msg.to_string())
}

fn read_line<R: BufRead>(src: &mut R) -> Result<String, TlockError> {
    let mut line = String::new();
    let n = src
        .read_line(&mut line)
        .map_err(|e| TlockError::io("read header", e))?;
    if n == 0 {
        return Err(malformed("unexpected end of header"));
    }
    if !line.ends_with('\n') {
        return Err(malformed("header line missing newline"));
    }
    line.pop();
    Ok(line)
}

/// Parse a header from the front of an envelope.
///
/// Returns the stanzas and the claimed MAC. The reader is left positioned at
/// the first payload byte. The MAC is *not* verified here; that requires the
/// file key, which the caller recovers from the stanzas first.
pub fn read_header<R: BufRead>(src: &mut R) -> Result<(Vec<Stanza>, [u8; MAC_LEN]), TlockError> {
    if read_line(src)? != V1_MAGIC {
        return Err(malformed("unrecognized version line"));
    }

    let mut stanzas = Vec::new();
    loop {
        let line = read_line(src)?;

        if let Some(rest) = line.strip_prefix(STANZA_PREFIX) {
            let mut parts = rest.split(' ');
            let tag = parts
                .next()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| malformed("stanza missing tag"))?
                .to_string();
            let args: Vec<String> = parts.map(str::to_string).collect();
            if args.iter().any(|a| a.is_empty()) {
                return Err(malformed("empty stanza argument"));
            }

            let mut body = Vec::new();
            loop {
                let body_line = read_line(src)?;
                if body_line.len() > COLUMNS {
                    return Err(malformed("stanza body line too long"));
                }
                let chunk = STANDARD_NO_PAD
                    .decode(body_line.as_bytes())
                    .map_err(|_| malformed("invalid stanza body encoding"))?;
                body.extend_from_slice(&chunk);
                if body_line.len() < COLUMNS {
                    break;
                }
            }

            stanzas.push(Stanza { tag, args, body });
        } else if let Some(rest) = line.strip_prefix(MAC_PREFIX) {
            if stanzas.is_empty() {
                return Err(malformed("header contains no stanzas"));
            }
            let encoded = rest
                .strip_prefix(' ')
                .ok_or_else(|| malformed("malformed MAC line"))?;
            let mac = STANDARD_NO_PAD
                .decode(encoded)
                .map_err(|_| malformed("invalid MAC encoding"))?;
            let mac: [u8; MAC_LEN] = mac
                .try_into()
                .map_err(|_| malformed("incorrect MAC length"))?;
            return Ok((stanzas, mac));
        } else {
            return Err(malformed("unexpected header line"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_stanza() -> Stanza {
        Stanza {
            tag: "tlock".to_string(),
            args: vec!["1000".to_string(), "ab".repeat(32)],
            body: vec![0xA5; 80],
        }
    }

    #[test]
    fn test_header_round_trip() {
        let stanzas = vec![sample_stanza()];
        let file_key = [9u8; 16];

        let covered = header_without_mac(&stanzas);
        let mac = header_mac(&file_key, &covered);

        let mut buf = Vec::new();
        write_header(&mut buf, &stanzas, &mac).unwrap();
        buf.extend_from_slice(b"payload follows");

        let mut cursor = Cursor::new(buf);
        let (parsed, parsed_mac) = read_header(&mut cursor).unwrap();

        assert_eq!(parsed, stanzas);
        assert_eq!(parsed_mac, mac);
        assert!(verify_header_mac(&file_key, &header_without_mac(&parsed), &parsed_mac).is_ok());

        // Reader sits at the first payload byte.
        let mut rest = Vec::new();
        std::io::Read::read_to_end(&mut cursor, &mut rest).unwrap();
        assert_eq!(rest, b"payload follows");
    }

    #[test]
    fn test_mac_detects_tampering() {
        let mut stanzas = vec![sample_stanza()];
        let file_key = [9u8; 16];
        let mac = header_mac(&file_key, &header_without_mac(&stanzas));

        // A tampered round argument changes the covered bytes.
        stanzas[0].args[0] = "1001".to_string();
        assert!(verify_header_mac(&file_key, &header_without_mac(&stanzas), &mac).is_err());
    }

    #[test]
    fn test_body_wrapping_at_column_boundary() {
        // 96 bytes encode to exactly two full 64-char lines, which forces an
        // empty terminating line.
        let stanza = Stanza {
            tag: "tlock".to_string(),
            args: vec!["1".to_string()],
            body: vec![7u8; 96],
        };
        let mac = [0u8; MAC_LEN];

        let mut buf = Vec::new();
        write_header(&mut buf, &[stanza.clone()], &mac).unwrap();

        let (parsed, _) = read_header(&mut Cursor::new(buf)).unwrap();
        assert_eq!(parsed, vec![stanza]);
    }

    #[test]
    fn test_rejects_bad_version_line() {
        let mut cursor = Cursor::new(b"age-encryption.org/v2\n".to_vec());
        assert!(matches!(
            read_header(&mut cursor),
            Err(TlockError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_rejects_truncated_header() {
        let stanzas = vec![sample_stanza()];
        let mac = [0u8; MAC_LEN];
        let mut buf = Vec::new();
        write_header(&mut buf, &stanzas, &mac).unwrap();
        buf.truncate(buf.len() / 2);

        assert!(matches!(
            read_header(&mut Cursor::new(buf)),
            Err(TlockError::MalformedEnvelope(_))
        ));
    }
}
