use std::time::Duration;

/// The default depth of blocks to consider safe from a reorg.
pub const DEFAULT_SAFE_BLOCK_DEPTH: u64 = 30;

/// The depth of blocks at which a reorg is considered impossible for the
/// provided chain id, falling back to [`DEFAULT_SAFE_BLOCK_DEPTH`] for
/// unknown chains.
pub fn safe_block_depth(chain_id: u64) -> u64 {
    match chain_id {
        // Mainnet and the proof-of-stake testnets
        1 | 5 | 17_000 | 11_155_111 => 5,
        // Gnosis
        100 | 77 => 38,
        _ => DEFAULT_SAFE_BLOCK_DEPTH,
    }
}

/// The expected duration between blocks for the provided chain id. Used to
/// decide how long a cached `latest` block number remains usable.
pub fn block_time(chain_id: u64) -> Duration {
    const DEFAULT_BLOCK_TIME: Duration = Duration::from_secs(13);

    match chain_id {
        1 | 5 | 17_000 | 11_155_111 => Duration::from_secs(12),
        100 | 77 => Duration::from_secs(5),
        _ => DEFAULT_BLOCK_TIME,
    }
}

/// Arguments for the [`largest_safe_block_number`] function.
#[derive(Clone, Copy, Debug)]
pub struct LargestSafeBlockNumberArgs {
    /// The chain id of the remote chain.
    pub chain_id: u64,
    /// The latest block number of the remote chain.
    pub latest_block_number: u64,
}

/// The largest block number that is safe from a reorg for the provided chain,
/// based on the latest block number.
pub fn largest_safe_block_number(args: LargestSafeBlockNumberArgs) -> u64 {
    args.latest_block_number
        .saturating_sub(safe_block_depth(args.chain_id))
}

/// Arguments for the [`is_safe_block_number`] function.
#[derive(Clone, Copy, Debug)]
pub struct IsSafeBlockNumberArgs {
    /// The chain id of the remote chain.
    pub chain_id: u64,
    /// The latest block number of the remote chain.
    pub latest_block_number: u64,
    /// The block number to test.
    pub block_number: u64,
}

impl From<IsSafeBlockNumberArgs> for LargestSafeBlockNumberArgs {
    fn from(args: IsSafeBlockNumberArgs) -> Self {
        Self {
            chain_id: args.chain_id,
            latest_block_number: args.latest_block_number,
        }
    }
}

/// Whether the provided block number is safe from a reorg for the provided
/// chain, based on the latest block number.
pub fn is_safe_block_number(args: IsSafeBlockNumberArgs) -> bool {
    let safe_block_number = largest_safe_block_number(args.into());
    args.block_number <= safe_block_number
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROPSTEN_CHAIN_ID: u64 = 3;
    const MAINNET_CHAIN_ID: u64 = 1;

    #[test]
    fn largest_safe_block_number_with_known_chain() {
        let latest_block_number = 1_000;
        let args = LargestSafeBlockNumberArgs {
            chain_id: MAINNET_CHAIN_ID,
            latest_block_number,
        };

        assert_eq!(largest_safe_block_number(args), latest_block_number - 5);
    }

    #[test]
    fn largest_safe_block_number_with_unknown_chain() {
        let latest_block_number = 1_000;
        let args = LargestSafeBlockNumberArgs {
            chain_id: ROPSTEN_CHAIN_ID,
            latest_block_number,
        };

        assert_eq!(
            largest_safe_block_number(args),
            latest_block_number - DEFAULT_SAFE_BLOCK_DEPTH
        );
    }

    #[test]
    fn largest_safe_block_number_saturates_near_genesis() {
        let args = LargestSafeBlockNumberArgs {
            chain_id: MAINNET_CHAIN_ID,
            latest_block_number: 3,
        };

        assert_eq!(largest_safe_block_number(args), 0);
    }

    #[test]
    fn is_safe_block_number_boundaries() {
        let latest_block_number = 1_000;
        let safe_block_number = latest_block_number - 5;

        assert!(is_safe_block_number(IsSafeBlockNumberArgs {
            chain_id: MAINNET_CHAIN_ID,
            latest_block_number,
            block_number: safe_block_number,
        }));
        assert!(!is_safe_block_number(IsSafeBlockNumberArgs {
            chain_id: MAINNET_CHAIN_ID,
            latest_block_number,
            block_number: safe_block_number + 1,
        }));
    }
}
