use std::{collections::BTreeMap, ops::RangeInclusive, sync::Arc};

use devnode_eth::{receipt::BlockReceipt, HashMap, B256, U256};

use super::InsertError;
use crate::{
    block::{Block as _, LocalBlock, RemoteBlock, SyncBlock},
    state::StateDiff,
};

/// A storage solution for a subset of a blockchain's blocks in-memory, used
/// both for the local blocks built on top of a fork and for caching remote
/// blocks.
#[derive(Debug, Default)]
pub struct SparseBlockchainStorage {
    hash_to_block: HashMap<B256, Arc<dyn SyncBlock>>,
    hash_to_total_difficulty: HashMap<B256, U256>,
    number_to_block: BTreeMap<u64, Arc<dyn SyncBlock>>,
    number_to_state_diff: BTreeMap<u64, StateDiff>,
    transaction_hash_to_block: HashMap<B256, Arc<dyn SyncBlock>>,
    transaction_hash_to_receipt: HashMap<B256, Arc<BlockReceipt>>,
    last_block_number: u64,
}

impl SparseBlockchainStorage {
    /// Constructs an empty instance with the provided last block number.
    pub fn empty(last_block_number: u64) -> Self {
        Self {
            last_block_number,
            ..Self::default()
        }
    }

    /// Retrieves a block by its hash.
    pub fn block_by_hash(&self, hash: &B256) -> Option<&Arc<dyn SyncBlock>> {
        self.hash_to_block.get(hash)
    }

    /// Retrieves a block by its number.
    pub fn block_by_number(&self, number: u64) -> Option<&Arc<dyn SyncBlock>> {
        self.number_to_block.get(&number)
    }

    /// Retrieves the block that contains the transaction with the provided
    /// hash, if it exists.
    pub fn block_by_transaction_hash(
        &self,
        transaction_hash: &B256,
    ) -> Option<&Arc<dyn SyncBlock>> {
        self.transaction_hash_to_block.get(transaction_hash)
    }

    /// Retrieves the blocks in the provided (inclusive) range, in block
    /// order. Gaps are skipped.
    pub fn blocks_in_range(
        &self,
        range: RangeInclusive<u64>,
    ) -> impl Iterator<Item = &Arc<dyn SyncBlock>> {
        self.number_to_block.range(range).map(|(_, block)| block)
    }

    /// Retrieves the number of the last locally stored block.
    pub fn last_block_number(&self) -> u64 {
        self.last_block_number
    }

    /// Retrieves the receipt of the transaction with the provided hash, if it
    /// exists.
    pub fn receipt_by_transaction_hash(
        &self,
        transaction_hash: &B256,
    ) -> Option<&Arc<BlockReceipt>> {
        self.transaction_hash_to_receipt.get(transaction_hash)
    }

    /// Retrieves the state diffs of the blocks in the provided (inclusive)
    /// range, in block order.
    pub fn state_diffs_in_range(
        &self,
        range: RangeInclusive<u64>,
    ) -> impl Iterator<Item = &StateDiff> {
        self.number_to_state_diff.range(range).map(|(_, diff)| diff)
    }

    /// Retrieves the total difficulty of the block with the provided hash, if
    /// it is known.
    pub fn total_difficulty_by_hash(&self, hash: &B256) -> Option<&U256> {
        self.hash_to_total_difficulty.get(hash)
    }

    /// Inserts a locally mined block along with its receipts, failing if a
    /// block with the same hash or number already exists.
    pub fn insert_block(
        &mut self,
        block: LocalBlock,
        state_diff: StateDiff,
        total_difficulty: U256,
    ) -> Result<&Arc<dyn SyncBlock>, InsertError> {
        let block_hash = *block.hash();
        let block_number = block.header().number;

        if self.hash_to_block.contains_key(&block_hash)
            || self.number_to_block.contains_key(&block_number)
        {
            return Err(InsertError::DuplicateBlock {
                block_hash,
                block_number,
            });
        }

        if let Some(transaction) = block.transactions().iter().find(|transaction| {
            self.transaction_hash_to_block
                .contains_key(transaction.transaction_hash())
        }) {
            return Err(InsertError::DuplicateTransaction {
                hash: *transaction.transaction_hash(),
            });
        }

        self.transaction_hash_to_receipt.extend(
            block
                .transaction_receipts()
                .iter()
                .map(|receipt| (receipt.inner.transaction_hash, receipt.clone())),
        );

        let block: Arc<dyn SyncBlock> = Arc::new(block);

        self.transaction_hash_to_block.extend(
            block
                .transactions()
                .iter()
                .map(|transaction| (*transaction.transaction_hash(), block.clone())),
        );

        self.hash_to_block.insert(block_hash, block.clone());
        self.hash_to_total_difficulty
            .insert(block_hash, total_difficulty);
        self.number_to_state_diff.insert(block_number, state_diff);
        self.last_block_number = block_number;

        Ok(self
            .number_to_block
            .entry(block_number)
            .or_insert(block))
    }

    /// Inserts a remote block without receipts. If the block is already
    /// cached, the cached instance is returned.
    pub fn insert_remote_block(
        &mut self,
        block: RemoteBlock,
        total_difficulty: Option<U256>,
    ) -> Arc<dyn SyncBlock> {
        let block_hash = *block.hash();
        let block_number = block.header().number;

        if let Some(existing) = self.hash_to_block.get(&block_hash) {
            return existing.clone();
        }

        let block: Arc<dyn SyncBlock> = Arc::new(block);

        self.transaction_hash_to_block.extend(
            block
                .transactions()
                .iter()
                .map(|transaction| (*transaction.transaction_hash(), block.clone())),
        );

        if let Some(total_difficulty) = total_difficulty {
            self.hash_to_total_difficulty
                .insert(block_hash, total_difficulty);
        }

        self.hash_to_block.insert(block_hash, block.clone());
        self.number_to_block.insert(block_number, block.clone());

        block
    }

    /// Inserts a receipt, failing if a receipt with the same transaction hash
    /// already exists.
    pub fn insert_receipt(&mut self, receipt: Arc<BlockReceipt>) -> Result<(), InsertError> {
        let transaction_hash = receipt.inner.transaction_hash;

        if self
            .transaction_hash_to_receipt
            .insert(transaction_hash, receipt)
            .is_some()
        {
            return Err(InsertError::DuplicateReceipt { transaction_hash });
        }

        Ok(())
    }

    /// Reverts to the block with the provided number, deleting all later
    /// blocks. Returns whether the block number was at or below the last
    /// block number.
    pub fn revert_to_block(&mut self, block_number: u64) -> bool {
        if block_number > self.last_block_number {
            return false;
        }

        let removed_blocks = self.number_to_block.split_off(&(block_number + 1));
        self.number_to_state_diff.split_off(&(block_number + 1));

        for block in removed_blocks.into_values() {
            self.hash_to_block.remove(block.hash());
            self.hash_to_total_difficulty.remove(block.hash());

            for transaction in block.transactions() {
                let transaction_hash = transaction.transaction_hash();

                self.transaction_hash_to_block.remove(transaction_hash);
                self.transaction_hash_to_receipt.remove(transaction_hash);
            }
        }

        self.last_block_number = block_number;

        true
    }
}
