//! HTTP beacon network client.
//!
//! Implements the [`Network`] abstraction against a drand-style HTTP API:
//! `GET /{chain_hash}/info` once at construction for the chain parameters,
//! and `GET /{chain_hash}/public/{round}` per signature lookup. The core
//! never sees a URL; it only asks the four `Network` questions.

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

use tlock::{Network, TlockError};
use tlock_types::{ChainHash, G1Point, G2Point, G1_POINT_LEN, G2_POINT_LEN};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// The only beacon scheme this client speaks: per-round signatures over
/// `SHA-256(round_be)` with no chaining to the previous signature. Chains
/// advertising another scheme are rejected at construction.
const UNCHAINED_SCHEME: &str = "pedersen-bls-unchained";

#[derive(Debug, Deserialize)]
struct ChainInfo {
    public_key: String,
    period: u64,
    genesis_time: u64,
    hash: String,
    #[serde(rename = "schemeID", default)]
    scheme_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Beacon {
    round: u64,
    signature: String,
}

/// A beacon chain reached over HTTP.
///
/// Read-only after construction; one handle can serve any number of
/// concurrent encrypt/decrypt operations.
pub struct HttpNetwork {
    host: String,
    chain_hash: ChainHash,
    public_key: G1Point,
    period_secs: u64,
    genesis_time: u64,
    client: Client,
}

impl HttpNetwork {
    /// Connect to `host` and validate that it serves `chain_hash` with the
    /// unchained scheme.
    pub fn new(host: &str, chain_hash: ChainHash) -> Result<Self, TlockError> {
        Self::with_timeout(host, chain_hash, DEFAULT_TIMEOUT)
    }

    /// Like [`HttpNetwork::new`] with an explicit per-request deadline.
    ///
    /// A lookup that exceeds the deadline surfaces as
    /// [`TlockError::Cancelled`].
    pub fn with_timeout(
        host: &str,
        chain_hash: ChainHash,
        timeout: Duration,
    ) -> Result<Self, TlockError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TlockError::Network(format!("build http client: {e}")))?;
        let host = host.trim_end_matches('/').to_string();

        let url = format!("{host}/{chain_hash}/info");
        debug!(%url, "fetching chain info");
        let info: ChainInfo = client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| transport("fetch chain info", e))?
            .json()
            .map_err(|e| transport("parse chain info", e))?;

        if info.hash != chain_hash.to_string() {
            return Err(TlockError::Network(format!(
                "chain info hash mismatch: exp: {chain_hash} got: {}",
                info.hash
            )));
        }
        match info.scheme_id.as_deref() {
            None | Some(UNCHAINED_SCHEME) => {}
            Some(scheme) => {
                return Err(TlockError::Network(format!(
                    "unsupported beacon scheme: {scheme}"
                )))
            }
        }
        if info.period == 0 {
            return Err(TlockError::Network("chain period is zero".to_string()));
        }

        let public_key = parse_g1_hex(&info.public_key)?;

        Ok(Self {
            host,
            chain_hash,
            public_key,
            period_secs: info.period,
            genesis_time: info.genesis_time,
            client,
        })
    }
}

impl Network for HttpNetwork {
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
        Ok(round_at(self.genesis_time, self.period_secs, at))
    }

    fn is_ready_to_decrypt(&self, round: u64) -> Result<Option<G2Point>, TlockError> {
        let url = format!("{}/{}/public/{}", self.host, self.chain_hash, round);
        debug!(%url, "fetching round signature");

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| transport("fetch beacon", e))?;
        if response.status() == StatusCode::NOT_FOUND {
            // The round has not happened yet. Not an error.
            return Ok(None);
        }

        let beacon: Beacon = response
            .error_for_status()
            .map_err(|e| transport("fetch beacon", e))?
            .json()
            .map_err(|e| transport("parse beacon", e))?;

        if beacon.round != round {
            return Err(TlockError::Network(format!(
                "beacon round mismatch: exp: {round} got: {}",
                beacon.round
            )));
        }

        parse_g2_hex(&beacon.signature).map(Some)
    }
}

/// The smallest round whose scheduled time is at or after `at`.
///
/// Round r is scheduled at `genesis + (r - 1) * period`; round 1 is the
/// earliest round that exists.
fn round_at(genesis_time: u64, period_secs: u64, at: u64) -> u64 {
    let elapsed = at.saturating_sub(genesis_time);
    elapsed.div_ceil(period_secs) + 1
}

fn transport(context: &str, err: reqwest::Error) -> TlockError {
    if err.is_timeout() {
        TlockError::Cancelled
    } else {
        TlockError::Network(format!("{context}: {err}"))
    }
}

fn parse_g1_hex(s: &str) -> Result<G1Point, TlockError> {
    let bytes = hex::decode(s).map_err(|e| TlockError::Network(format!("parse public key: {e}")))?;
    let bytes: [u8; G1_POINT_LEN] = bytes.try_into().map_err(|v: Vec<u8>| {
        TlockError::Network(format!(
            "parse public key: exp: {G1_POINT_LEN} bytes got: {}",
            v.len()
        ))
    })?;
    Ok(G1Point(bytes))
}

fn parse_g2_hex(s: &str) -> Result<G2Point, TlockError> {
    let bytes = hex::decode(s).map_err(|e| TlockError::Network(format!("parse signature: {e}")))?;
    let bytes: [u8; G2_POINT_LEN] = bytes.try_into().map_err(|v: Vec<u8>| {
        TlockError::Network(format!(
            "parse signature: exp: {G2_POINT_LEN} bytes got: {}",
            v.len()
        ))
    })?;
    Ok(G2Point(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_at() {
        // genesis 1000, period 30
        assert_eq!(round_at(1000, 30, 0), 1);
        assert_eq!(round_at(1000, 30, 1000), 1);
        assert_eq!(round_at(1000, 30, 1001), 2);
        assert_eq!(round_at(1000, 30, 1030), 2);
        assert_eq!(round_at(1000, 30, 1031), 3);
        assert_eq!(round_at(1000, 30, 1060), 3);
    }

    #[test]
    fn test_parse_points() {
        assert!(parse_g1_hex(&"aa".repeat(48)).is_ok());
        assert!(parse_g1_hex(&"aa".repeat(47)).is_err());
        assert!(parse_g1_hex("zz").is_err());

        assert!(parse_g2_hex(&"bb".repeat(96)).is_ok());
        assert!(parse_g2_hex(&"bb".repeat(95)).is_err());
    }

    #[test]
    fn test_chain_info_deserializes() {
        let json = r#"{
            "public_key": "8200fc249deb0148eb918d6e213980c5d01acd7fc251900d9260136da3b54836ce125172399ddc69c4e3e11429b62c11",
            "period": 25,
            "genesis_time": 1590445175,
            "hash": "7672797f548f3f4748ac4bf3352fc6c6b6468c9ad40ad456a397545c6e2df5bf",
            "groupHash": "ignored",
            "schemeID": "pedersen-bls-unchained"
        }"#;
        let info: ChainInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.period, 25);
        assert_eq!(info.scheme_id.as_deref(), Some("pedersen-bls-unchained"));
    }
}
