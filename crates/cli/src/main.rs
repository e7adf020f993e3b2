//! CLI for timelock encryption against a drand-style beacon network.
//!
//! Encrypt a file so it becomes decryptable at a future beacon round:
//!
//! ```text
//! tle -e -D 5m -o sealed.tle secret.txt
//! tle -e -r 123456 -a -o sealed.txt secret.txt
//! tle -d -o secret.txt sealed.tle
//! ```

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tracing::info;

use tlock::{Decrypter, Encrypter, Network};
use tlock_http::HttpNetwork;
use tlock_types::ChainHash;

const DEFAULT_HOST: &str = "http://pl-us.testnet.drand.sh";
const DEFAULT_CHAIN: &str = "7672797f548f3f4748ac4bf3352fc6c6b6468c9ad40ad456a397545c6e2df5bf";

#[derive(Parser)]
#[command(name = "tle")]
#[command(about = "Timelock encrypt/decrypt files against a randomness beacon")]
struct Cli {
    /// Encrypt the input (default)
    #[arg(short, long, conflicts_with = "decrypt")]
    encrypt: bool,

    /// Decrypt the input
    #[arg(short, long)]
    decrypt: bool,

    /// Beacon network HTTP endpoint
    #[arg(short, long, default_value = DEFAULT_HOST)]
    network: String,

    /// Chain hash (64 hex characters)
    #[arg(short, long, default_value = DEFAULT_CHAIN)]
    chain: String,

    /// Encrypt to this absolute round number
    #[arg(short, long, conflicts_with = "duration")]
    round: Option<u64>,

    /// Encrypt to the round at now + duration (e.g. 30s, 5m, 2h, 1d)
    #[arg(short = 'D', long)]
    duration: Option<String>,

    /// ASCII-armor the output (or expect armored input when decrypting)
    #[arg(short, long)]
    armor: bool,

    /// Output path (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Input path (defaults to stdin)
    input: Option<PathBuf>,
}

/// Parse durations of the form `90`, `90s`, `5m`, `2h` or `1d`.
fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    let (value, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(pos) => s.split_at(pos),
        None => (s, "s"),
    };
    let value: u64 = value
        .parse()
        .map_err(|_| anyhow!("invalid duration: {s}"))?;
    let secs = match unit {
        "s" => value,
        "m" => value * 60,
        "h" => value * 3600,
        "d" => value * 86400,
        _ => bail!("invalid duration unit: {unit}"),
    };
    Ok(Duration::from_secs(secs))
}

fn open_input(path: &Option<PathBuf>) -> Result<Box<dyn Read>> {
    match path {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(io::stdin())),
    }
}

fn open_output(path: &Option<PathBuf>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(io::stdout())),
    }
}

fn run(cli: Cli) -> Result<()> {
    let chain_hash: ChainHash = cli.chain.parse().context("parse chain hash")?;
    let network = HttpNetwork::new(&cli.network, chain_hash).context("connect to network")?;

    let input = open_input(&cli.input)?;
    let output = open_output(&cli.output)?;

    // Encrypt is the default mode; the flags only conflict, they are not required.
    let do_decrypt = cli.decrypt && !cli.encrypt;

    if do_decrypt {
        match Decrypter::new(&network).decrypt(output, input, cli.armor) {
            Ok(()) => Ok(()),
            Err(err) if err.is_too_early() => {
                bail!("{err}; try again once the round has been published")
            }
            Err(err) => Err(err.into()),
        }
    } else {
        let round = match (cli.round, &cli.duration) {
            (Some(round), _) => round,
            (None, Some(duration)) => {
                let at = SystemTime::now() + parse_duration(duration)?;
                network.round_number(at).context("round by duration")?
            }
            (None, None) => bail!("encryption needs --round or --duration"),
        };
        info!(round, "encrypting");
        Encrypter::new(&network).encrypt(output, input, round, cli.armor)?;
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tle=info".parse().unwrap()),
        )
        .init();

    run(Cli::parse())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86400));

        assert!(parse_duration("5x").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("").is_err());
    }
}
