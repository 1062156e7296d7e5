mod forked;
mod local;
mod remote;
pub mod storage;

use std::{fmt::Debug, sync::Arc};

use devnode_eth::{
    log::FilterLog, receipt::BlockReceipt, Address, Hardfork, HashSet, B256, U256,
};
use devnode_rpc_client::RpcClientError;

pub use self::{
    forked::{ForkedBlockchain, ForkedCreationError},
    local::{InvalidGenesisBlock, LocalBlockchain},
    remote::RemoteBlockchain,
};
use crate::{
    block::{Block, LocalBlock, RemoteBlockCreationError, SyncBlock},
    state::{ChainState, StateCommit as _, StateDiff, StateError},
};

/// Combinatorial error for the blockchain API.
#[derive(Debug, thiserror::Error)]
pub enum BlockchainError {
    /// Cannot revert to a block that is part of the remote blockchain.
    #[error("Cannot delete remote block.")]
    CannotDeleteRemote,
    /// Block could not be inserted into storage.
    #[error(transparent)]
    Insert(#[from] storage::InsertError),
    /// The block's number does not follow its parent's.
    #[error("Invalid block number: {actual}. Expected: {expected}")]
    InvalidBlockNumber {
        /// The block's number
        actual: u64,
        /// The expected block number
        expected: u64,
    },
    /// The block's parent hash does not match the last block's hash.
    #[error("Invalid parent hash: {actual}. Expected: {expected}")]
    InvalidParentHash {
        /// The block's parent hash
        actual: B256,
        /// The expected parent hash
        expected: B256,
    },
    /// The remote node does not have a receipt for a mined transaction.
    #[error("Missing receipt for transaction {transaction_hash}")]
    MissingReceipt {
        /// The hash of the transaction
        transaction_hash: B256,
    },
    /// A remote block could not be converted.
    #[error(transparent)]
    RemoteBlockCreation(#[from] RemoteBlockCreationError),
    /// JSON-RPC error
    #[error(transparent)]
    RpcClient(#[from] RpcClientError),
    /// State error
    #[error(transparent)]
    State(#[from] StateError),
    /// No block exists with the provided number.
    #[error("Unknown block number")]
    UnknownBlockNumber,
}

/// Trait for reading data from a blockchain.
pub trait Blockchain {
    /// Retrieves the block with the provided hash, if it exists.
    fn block_by_hash(&self, hash: &B256) -> Result<Option<Arc<dyn SyncBlock>>, BlockchainError>;

    /// Retrieves the block with the provided number, if it exists.
    fn block_by_number(&self, number: u64)
        -> Result<Option<Arc<dyn SyncBlock>>, BlockchainError>;

    /// Retrieves the block that contains a transaction with the provided
    /// hash, if it exists.
    fn block_by_transaction_hash(
        &self,
        transaction_hash: &B256,
    ) -> Result<Option<Arc<dyn SyncBlock>>, BlockchainError>;

    /// Retrieves the instance's chain id.
    fn chain_id(&self) -> u64;

    /// Retrieves the hardfork the blockchain is running.
    fn hardfork(&self) -> Hardfork;

    /// Retrieves the last block in the blockchain.
    fn last_block(&self) -> Result<Arc<dyn SyncBlock>, BlockchainError>;

    /// Retrieves the last block number in the blockchain.
    fn last_block_number(&self) -> u64;

    /// Retrieves the logs that match the provided filter, in the provided
    /// (inclusive) range of blocks.
    fn logs(
        &self,
        from_block: u64,
        to_block: u64,
        addresses: &HashSet<Address>,
        topics: &[Option<Vec<B256>>],
    ) -> Result<Vec<FilterLog>, BlockchainError>;

    /// Retrieves the instance's network id.
    fn network_id(&self) -> u64;

    /// Retrieves the receipt of the transaction with the provided hash, if it
    /// exists.
    fn receipt_by_transaction_hash(
        &self,
        transaction_hash: &B256,
    ) -> Result<Option<Arc<BlockReceipt>>, BlockchainError>;

    /// Retrieves the state at a given block.
    fn state_at_block_number(&self, block_number: u64) -> Result<ChainState, BlockchainError>;

    /// Retrieves the total difficulty at the block with the provided hash.
    fn total_difficulty_by_hash(&self, hash: &B256) -> Result<Option<U256>, BlockchainError>;
}

/// Trait for modifying a blockchain.
pub trait BlockchainMut {
    /// Inserts the provided block into the blockchain, implicitly validating
    /// it against the last block.
    fn insert_block(
        &mut self,
        block: LocalBlock,
        state_diff: StateDiff,
    ) -> Result<Arc<dyn SyncBlock>, BlockchainError>;

    /// Reverts to the block with the provided number, deleting all later
    /// blocks.
    fn revert_to_block(&mut self, block_number: u64) -> Result<(), BlockchainError>;
}

/// Trait that meets all requirements for a synchronous blockchain.
pub trait SyncBlockchain: Blockchain + BlockchainMut + Debug + Send + Sync {}

impl<BlockchainT> SyncBlockchain for BlockchainT where
    BlockchainT: Blockchain + BlockchainMut + Debug + Send + Sync
{
}

/// Validates that the provided block's number and parent hash follow the last
/// block.
fn validate_next_block(
    last_block: &dyn SyncBlock,
    next_block: &LocalBlock,
) -> Result<(), BlockchainError> {
    let last_header = last_block.header();
    let next_header = next_block.header();

    let next_block_number = last_header.number + 1;
    if next_header.number != next_block_number {
        return Err(BlockchainError::InvalidBlockNumber {
            actual: next_header.number,
            expected: next_block_number,
        });
    }

    if next_header.parent_hash != *last_block.hash() {
        return Err(BlockchainError::InvalidParentHash {
            actual: next_header.parent_hash,
            expected: *last_block.hash(),
        });
    }

    Ok(())
}

/// Applies the provided state diffs, in order, to the state.
fn compute_state_at_block<'diffs>(
    state: &mut ChainState,
    state_diffs: impl Iterator<Item = &'diffs StateDiff>,
) {
    for state_diff in state_diffs {
        state.commit(state_diff.clone());
    }
}
