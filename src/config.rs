use alloy::primitives::Address;
use serde::Deserialize;
use std::path::Path;

use crate::{
    cli::Args,
    constants::{
        DEFAULT_CONTRACT_ADDRESS, DEFAULT_GAS_LIMIT, DEFAULT_GAS_PRICE_GWEI,
        DEFAULT_INTERVAL_SECS, DEFAULT_RPC_URL, GWEI,
    },
};

/// Settings read from the config file. Any key left out keeps its default.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    pub rpc_url: String,
    pub contract_address: Address,
    /// In gwei.
    pub gas_price: u64,
    pub gas_limit: u64,
    /// Seconds between two claim attempts of the same wallet.
    pub interval: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            contract_address: DEFAULT_CONTRACT_ADDRESS,
            gas_price: DEFAULT_GAS_PRICE_GWEI,
            gas_limit: DEFAULT_GAS_LIMIT,
            interval: DEFAULT_INTERVAL_SECS,
        }
    }
}

impl Config {
    async fn read_from_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let cfg_str = tokio::fs::read_to_string(path).await?;
        Ok(toml::from_str(&cfg_str)?)
    }

    /// Falls back to the defaults when the file is missing or malformed.
    pub async fn read_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            tracing::warn!("Config file {} not found, using defaults", path.display());
            return Self::default();
        }

        match Self::read_from_file(path).await {
            Ok(config) => {
                tracing::info!("Config loaded from {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to load config from {}: {e}. Using defaults",
                    path.display()
                );
                Self::default()
            }
        }
    }
}

/// Final settings for one batch run: config file values with CLI overrides applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    pub rpc_url: String,
    pub contract_address: Address,
    pub gas_price_gwei: u64,
    pub gas_limit: u64,
    pub interval_secs: u64,
    pub max_threads: usize,
    pub max_attempts: Option<u32>,
}

impl RunConfig {
    pub fn merge(config: Config, args: &Args) -> Self {
        Self {
            rpc_url: config.rpc_url,
            contract_address: config.contract_address,
            gas_price_gwei: args.gas_price.unwrap_or(config.gas_price),
            gas_limit: args.gas_limit.unwrap_or(config.gas_limit),
            interval_secs: args.interval.unwrap_or(config.interval),
            max_threads: args.threads,
            max_attempts: args.attempts,
        }
    }

    pub fn gas_price_wei(&self) -> u128 {
        u128::from(self.gas_price_gwei) * GWEI
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            RPC_URL = "http://localhost:8545"
            GAS_PRICE = 35
            "#,
        )
        .unwrap();

        assert_eq!(config.rpc_url, "http://localhost:8545");
        assert_eq!(config.gas_price, 35);
        assert_eq!(config.gas_limit, DEFAULT_GAS_LIMIT);
        assert_eq!(config.interval, DEFAULT_INTERVAL_SECS);
        assert_eq!(config.contract_address, DEFAULT_CONTRACT_ADDRESS);
    }

    #[test]
    fn test_contract_address_is_parsed() {
        let config: Config = toml::from_str(
            r#"CONTRACT_ADDRESS = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8""#,
        )
        .unwrap();

        assert_eq!(
            config.contract_address,
            "0x70997970C51812dc3A010C7d01b50e0d17dc79C8"
                .parse::<Address>()
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::read_or_default(dir.path().join("config.toml")).await;
        assert_eq!(config, Config::default());
    }

    #[tokio::test]
    async fn test_malformed_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "GAS_LIMIT = \"lots\"").await.unwrap();

        let config = Config::read_or_default(&path).await;
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from([
            "sepolia-claimer",
            "-k",
            "keys.txt",
            "-t",
            "8",
            "-i",
            "60",
            "-a",
            "2",
            "--gas-price",
            "50",
        ]);
        let run_config = RunConfig::merge(Config::default(), &args);

        assert_eq!(run_config.gas_price_gwei, 50);
        assert_eq!(run_config.gas_price_wei(), 50_000_000_000);
        assert_eq!(run_config.gas_limit, DEFAULT_GAS_LIMIT);
        assert_eq!(run_config.interval_secs, 60);
        assert_eq!(run_config.max_threads, 8);
        assert_eq!(run_config.max_attempts, Some(2));
    }

    #[test]
    fn test_interval_falls_back_to_config() {
        let args = Args::parse_from(["sepolia-claimer", "-k", "keys.txt"]);
        let config = Config {
            interval: 600,
            ..Config::default()
        };

        let run_config = RunConfig::merge(config, &args);
        assert_eq!(run_config.interval_secs, 600);
        assert_eq!(run_config.max_attempts, None);
    }
}
