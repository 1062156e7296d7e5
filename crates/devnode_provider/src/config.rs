use std::{num::NonZeroU64, path::PathBuf, time::SystemTime};

use devnode_eth::{Address, HashMap, U256};
use devnode_evm::MineOrdering;
use rand::Rng as _;
use serde::{Deserialize, Serialize};

/// Configuration of an account owned by the provider, with its genesis
/// balance.
#[derive(Clone, Debug)]
pub struct AccountConfig {
    /// The account's secret key.
    pub secret_key: k256::SecretKey,
    /// The account's balance in the genesis state.
    pub balance: U256,
}

/// Configuration for forking a remote blockchain.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkConfig {
    /// The URL of the remote node's JSON-RPC endpoint.
    pub url: String,
    /// The block number to fork from. Resolved against the remote head when
    /// absent.
    pub block_number: Option<u64>,
    /// Additional HTTP headers for remote requests.
    pub http_headers: Option<std::collections::HashMap<String, String>>,
}

/// Configuration for interval mining.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all_fields = "camelCase")]
pub enum IntervalConfig {
    /// A fixed interval, in milliseconds.
    Fixed(NonZeroU64),
    /// An inclusive range of intervals, in milliseconds.
    Range {
        /// The minimum interval
        min: u64,
        /// The maximum interval
        max: u64,
    },
}

impl IntervalConfig {
    /// Generates a (random) interval based on the configuration.
    pub fn generate_interval(&self) -> u64 {
        match self {
            IntervalConfig::Fixed(interval) => interval.get(),
            IntervalConfig::Range { min, max } => rand::thread_rng().gen_range(*min..=*max),
        }
    }
}

/// Configuration for the provider's mem pool.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemPoolConfig {
    /// The order in which pending transactions are selected for inclusion.
    pub order: MineOrdering,
}

impl Default for MemPoolConfig {
    fn default() -> Self {
        Self {
            order: MineOrdering::Priority,
        }
    }
}

/// Configuration for the provider's miner.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningConfig {
    /// Whether to mine a block after every transaction submission.
    pub auto_mine: bool,
    /// The configuration for interval mining, if enabled.
    pub interval: Option<IntervalConfig>,
    /// The mem pool configuration.
    pub mem_pool: MemPoolConfig,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            auto_mine: true,
            interval: None,
            mem_pool: MemPoolConfig::default(),
        }
    }
}

/// Configuration for the provider.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    /// The accounts owned by the provider.
    pub accounts: Vec<AccountConfig>,
    /// Whether a block may carry the same timestamp as its parent.
    pub allow_blocks_with_same_timestamp: bool,
    /// Whether `eth_call` failures return an `Err`, rather than a result with
    /// a failure status.
    pub bail_on_call_failure: bool,
    /// Whether `eth_sendTransaction` failures return an `Err`, rather than a
    /// result with a failure status.
    pub bail_on_transaction_failure: bool,
    /// The gas limit of mined blocks.
    pub block_gas_limit: NonZeroU64,
    /// The directory used to cache remote JSON-RPC responses.
    pub cache_dir: PathBuf,
    /// The chain id.
    pub chain_id: u64,
    /// The address that receives mining rewards.
    pub coinbase: Address,
    /// The fork configuration, if the provider extends a remote chain.
    pub fork: Option<ForkConfig>,
    /// Accounts in the genesis state, beyond the owned accounts.
    pub genesis_accounts: HashMap<Address, U256>,
    /// The hardfork the chain is running.
    pub hardfork: devnode_eth::Hardfork,
    /// The base fee of the first locally mined block. Post-London only.
    pub initial_base_fee_per_gas: Option<u128>,
    /// The date the blockchain starts at. Defaults to the current time.
    pub initial_date: Option<SystemTime>,
    /// The minimum gas price accepted by the miner.
    pub min_gas_price: u128,
    /// The mining configuration.
    pub mining: MiningConfig,
    /// The network id.
    pub network_id: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_interval_is_constant() {
        let interval = IntervalConfig::Fixed(NonZeroU64::new(1_000).expect("non-zero"));
        assert_eq!(interval.generate_interval(), 1_000);
    }

    #[test]
    fn range_interval_stays_in_bounds() {
        let interval = IntervalConfig::Range { min: 10, max: 20 };

        for _ in 0..100 {
            let generated = interval.generate_interval();
            assert!((10..=20).contains(&generated));
        }
    }

    #[test]
    fn mining_config_defaults_to_automine() {
        let config = MiningConfig::default();
        assert!(config.auto_mine);
        assert!(config.interval.is_none());
    }
}
