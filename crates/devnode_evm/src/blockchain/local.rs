use std::sync::Arc;

use devnode_eth::{
    log::FilterLog, receipt::BlockReceipt, Address, Hardfork, HashSet, B256, U256,
};

use super::{
    compute_state_at_block, storage::ContiguousBlockchainStorage, validate_next_block, Blockchain,
    BlockchainError, BlockchainMut,
};
use crate::{
    block::{Block as _, LocalBlock, SyncBlock},
    state::{ChainState, StateDiff, TrieState},
};

/// An error that occurs upon creation of a [`LocalBlockchain`].
#[derive(Debug, thiserror::Error)]
pub enum InvalidGenesisBlock {
    /// Invalid block number in the genesis block.
    #[error("Invalid block number: {actual}. Expected: 0")]
    InvalidBlockNumber {
        /// The actual block number.
        actual: u64,
    },
    /// Missing withdrawals for post-Shanghai blockchain
    #[error("Missing withdrawals for post-Shanghai blockchain")]
    MissingWithdrawals,
}

/// A blockchain consisting exclusively of locally created blocks.
#[derive(Debug)]
pub struct LocalBlockchain {
    storage: ContiguousBlockchainStorage,
    chain_id: u64,
    hardfork: Hardfork,
}

impl LocalBlockchain {
    /// Constructs a new instance with the provided genesis block, validating
    /// a zero block number.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn new(
        genesis_block: LocalBlock,
        genesis_diff: StateDiff,
        chain_id: u64,
        hardfork: Hardfork,
    ) -> Result<Self, InvalidGenesisBlock> {
        let genesis_header = genesis_block.header();

        if genesis_header.number != 0 {
            return Err(InvalidGenesisBlock::InvalidBlockNumber {
                actual: genesis_header.number,
            });
        }

        if hardfork >= Hardfork::Shanghai && genesis_header.withdrawals_root.is_none() {
            return Err(InvalidGenesisBlock::MissingWithdrawals);
        }

        let total_difficulty = genesis_header.difficulty;
        let storage =
            ContiguousBlockchainStorage::with_block(genesis_block, genesis_diff, total_difficulty);

        Ok(Self {
            storage,
            chain_id,
            hardfork,
        })
    }
}

impl Blockchain for LocalBlockchain {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn block_by_hash(&self, hash: &B256) -> Result<Option<Arc<dyn SyncBlock>>, BlockchainError> {
        Ok(self.storage.block_by_hash(hash).cloned())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn block_by_number(
        &self,
        number: u64,
    ) -> Result<Option<Arc<dyn SyncBlock>>, BlockchainError> {
        // Block numbers are contiguous and start at the genesis block.
        let index = usize::try_from(number).expect("Block number fits in usize");

        Ok(self.storage.blocks().get(index).cloned())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn block_by_transaction_hash(
        &self,
        transaction_hash: &B256,
    ) -> Result<Option<Arc<dyn SyncBlock>>, BlockchainError> {
        Ok(self
            .storage
            .block_by_transaction_hash(transaction_hash)
            .cloned())
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn hardfork(&self) -> Hardfork {
        self.hardfork
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn last_block(&self) -> Result<Arc<dyn SyncBlock>, BlockchainError> {
        Ok(self
            .storage
            .blocks()
            .last()
            .expect("A genesis block is inserted at construction")
            .clone())
    }

    fn last_block_number(&self) -> u64 {
        self.storage.blocks().len() as u64 - 1
    }

    fn logs(
        &self,
        from_block: u64,
        to_block: u64,
        addresses: &HashSet<Address>,
        topics: &[Option<Vec<B256>>],
    ) -> Result<Vec<FilterLog>, BlockchainError> {
        let from_block = usize::try_from(from_block).expect("Block number fits in usize");
        let to_block = usize::try_from(to_block).expect("Block number fits in usize");

        let blocks = self.storage.blocks();
        if from_block >= blocks.len() {
            return Ok(Vec::new());
        }

        let to_block = to_block.min(blocks.len() - 1);

        super::storage::matching_logs(blocks[from_block..=to_block].iter(), addresses, topics)
    }

    fn network_id(&self) -> u64 {
        self.chain_id
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn receipt_by_transaction_hash(
        &self,
        transaction_hash: &B256,
    ) -> Result<Option<Arc<BlockReceipt>>, BlockchainError> {
        Ok(self
            .storage
            .receipt_by_transaction_hash(transaction_hash)
            .cloned())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn state_at_block_number(&self, block_number: u64) -> Result<ChainState, BlockchainError> {
        if block_number > self.last_block_number() {
            return Err(BlockchainError::UnknownBlockNumber);
        }

        let block_index = usize::try_from(block_number).expect("Block number fits in usize");

        let mut state = ChainState::Local(TrieState::default());
        compute_state_at_block(
            &mut state,
            self.storage.state_diffs()[..=block_index].iter(),
        );

        Ok(state)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn total_difficulty_by_hash(&self, hash: &B256) -> Result<Option<U256>, BlockchainError> {
        Ok(self.storage.total_difficulty_by_hash(hash).copied())
    }
}

impl BlockchainMut for LocalBlockchain {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn insert_block(
        &mut self,
        block: LocalBlock,
        state_diff: StateDiff,
    ) -> Result<Arc<dyn SyncBlock>, BlockchainError> {
        let last_block = self.last_block()?;

        validate_next_block(&*last_block, &block)?;

        let previous_total_difficulty = self
            .total_difficulty_by_hash(last_block.hash())?
            .expect("Must exist as its block is stored");

        let total_difficulty = previous_total_difficulty + block.header().difficulty;

        let block = self
            .storage
            .insert_block(block, state_diff, total_difficulty)?;

        Ok(block.clone())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn revert_to_block(&mut self, block_number: u64) -> Result<(), BlockchainError> {
        if self.storage.revert_to_block(block_number) {
            Ok(())
        } else {
            Err(BlockchainError::UnknownBlockNumber)
        }
    }
}
