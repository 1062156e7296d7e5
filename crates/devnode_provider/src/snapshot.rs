use std::time::Instant;

use devnode_eth::Address;
use devnode_evm::{state::ChainState, MemPool, RandomHashGenerator};
use rpds::HashTrieMapSync;

/// A snapshot of the provider's mutable state, taken before automatically
/// mining or on request.
pub(crate) struct Snapshot {
    pub block_number: u64,
    pub block_number_to_state: HashTrieMapSync<u64, ChainState>,
    pub block_time_offset_seconds: i64,
    pub coinbase: Address,
    pub mem_pool: MemPool,
    pub next_block_base_fee_per_gas: Option<u128>,
    pub next_block_timestamp: Option<u64>,
    pub prev_randao_generator: RandomHashGenerator,
    pub time: Instant,
}
