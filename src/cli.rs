use std::path::PathBuf;

use clap::{ArgGroup, Parser};

use crate::constants::{CONFIG_FILE_PATH, DEFAULT_MAX_THREADS};

/// Repeatedly sends the claim call from every wallet until stopped or capped.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("credentials")
        .required(true)
        .args(["keys_file", "private_key"])
))]
pub struct Args {
    /// Private keys file, one key per line (`#` comments allowed)
    #[arg(short = 'k', long)]
    pub keys_file: Option<PathBuf>,

    /// Single private key (64 hex characters)
    #[arg(short = 'p', long)]
    pub private_key: Option<String>,

    /// Config file path
    #[arg(short = 'c', long, default_value = CONFIG_FILE_PATH)]
    pub config: PathBuf,

    /// Maximum number of wallets claiming at the same time
    #[arg(short = 't', long, default_value_t = DEFAULT_MAX_THREADS, value_parser = parse_threads)]
    pub threads: usize,

    /// Seconds between attempts of one wallet (overrides the config file)
    #[arg(short = 'i', long)]
    pub interval: Option<u64>,

    /// Maximum attempts per wallet (unlimited when omitted)
    #[arg(short = 'a', long, value_parser = clap::value_parser!(u32).range(1..))]
    pub attempts: Option<u32>,

    /// Gas price in gwei (overrides the config file)
    #[arg(long)]
    pub gas_price: Option<u64>,

    /// Gas limit (overrides the config file)
    #[arg(long)]
    pub gas_limit: Option<u64>,

    /// Start without waiting for confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,
}

fn parse_threads(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("at least one thread is required".to_string()),
        Ok(threads) => Ok(threads),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["sepolia-claimer", "-p", "abc"]).unwrap();
        assert_eq!(args.private_key.as_deref(), Some("abc"));
        assert_eq!(args.threads, DEFAULT_MAX_THREADS);
        assert_eq!(args.config, PathBuf::from(CONFIG_FILE_PATH));
        assert!(args.attempts.is_none());
        assert!(!args.yes);
    }

    #[test]
    fn test_key_source_is_required() {
        assert!(Args::try_parse_from(["sepolia-claimer"]).is_err());
    }

    #[test]
    fn test_key_sources_are_exclusive() {
        assert!(Args::try_parse_from(["sepolia-claimer", "-k", "keys.txt", "-p", "abc"]).is_err());
    }

    #[test]
    fn test_zero_threads_and_attempts_rejected() {
        assert!(Args::try_parse_from(["sepolia-claimer", "-k", "keys.txt", "-t", "0"]).is_err());
        assert!(Args::try_parse_from(["sepolia-claimer", "-k", "keys.txt", "-a", "0"]).is_err());
    }
}
