use std::time::Duration;

use alloy::primitives::{address, Address, U256};
use alloy_chains::NamedChain;

pub const EXPECTED_CHAIN: NamedChain = NamedChain::Sepolia;
pub const SEPOLIA_EXPLORER_URL: &str = "https://sepolia.etherscan.io";

// DEFAULTS
pub const DEFAULT_RPC_URL: &str = "https://rpc.sepolia.ethpandaops.io";
pub const DEFAULT_CONTRACT_ADDRESS: Address = address!("3edf60dd017ace33a0220f78741b5581c385a1ba");
pub const DEFAULT_GAS_PRICE_GWEI: u64 = 20;
pub const DEFAULT_GAS_LIMIT: u64 = 100_000;
pub const DEFAULT_INTERVAL_SECS: u64 = 3;
pub const DEFAULT_MAX_THREADS: usize = 5;

// FILES
pub const CONFIG_FILE_PATH: &str = "data/config.toml";
pub const LOG_DIRECTORY: &str = "logs";
pub const LOG_FILE_PREFIX: &str = "claimer.log";

// TIMINGS
pub const RPC_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const RECEIPT_TIMEOUT: Duration = Duration::from_secs(300);
pub const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const STATS_PRINT_PERIOD: Duration = Duration::from_secs(30);

pub const GWEI: u128 = 1_000_000_000;
// 0.001 ether
pub const MIN_BALANCE_WEI: U256 = U256::from_limbs([1_000_000_000_000_000, 0, 0, 0]);
