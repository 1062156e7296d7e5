use std::sync::Arc;

use devnode_eth::{receipt::BlockReceipt, HashMap, B256, U256};

use super::InsertError;
use crate::{
    block::{Block as _, LocalBlock, SyncBlock},
    state::StateDiff,
};

/// A storage solution for storing a blockchain's blocks contiguously
/// in-memory.
#[derive(Clone, Debug, Default)]
pub struct ContiguousBlockchainStorage {
    blocks: Vec<Arc<dyn SyncBlock>>,
    hash_to_block: HashMap<B256, Arc<dyn SyncBlock>>,
    hash_to_total_difficulty: HashMap<B256, U256>,
    state_diffs: Vec<StateDiff>,
    transaction_hash_to_block: HashMap<B256, Arc<dyn SyncBlock>>,
    transaction_hash_to_receipt: HashMap<B256, Arc<BlockReceipt>>,
}

impl ContiguousBlockchainStorage {
    /// Constructs a new instance with the provided block, its state diff, and
    /// its total difficulty.
    pub fn with_block(block: LocalBlock, state_diff: StateDiff, total_difficulty: U256) -> Self {
        let mut storage = Self::default();

        // SAFETY: The storage is empty.
        unsafe { storage.insert_block_unchecked(block, state_diff, total_difficulty) };

        storage
    }

    /// Retrieves the instance's blocks.
    pub fn blocks(&self) -> &[Arc<dyn SyncBlock>] {
        &self.blocks
    }

    /// Retrieves a block by its hash.
    pub fn block_by_hash(&self, hash: &B256) -> Option<&Arc<dyn SyncBlock>> {
        self.hash_to_block.get(hash)
    }

    /// Retrieves the block that contains the transaction with the provided
    /// hash, if it exists.
    pub fn block_by_transaction_hash(
        &self,
        transaction_hash: &B256,
    ) -> Option<&Arc<dyn SyncBlock>> {
        self.transaction_hash_to_block.get(transaction_hash)
    }

    /// Retrieves the receipt of the transaction with the provided hash, if it
    /// exists.
    pub fn receipt_by_transaction_hash(
        &self,
        transaction_hash: &B256,
    ) -> Option<&Arc<BlockReceipt>> {
        self.transaction_hash_to_receipt.get(transaction_hash)
    }

    /// Retrieves the state diffs of the instance's blocks, in block order.
    pub fn state_diffs(&self) -> &[StateDiff] {
        &self.state_diffs
    }

    /// Retrieves the total difficulty of the block with the provided hash, if
    /// it exists.
    pub fn total_difficulty_by_hash(&self, hash: &B256) -> Option<&U256> {
        self.hash_to_total_difficulty.get(hash)
    }

    /// Inserts a block, failing if a block with the same hash already exists.
    pub fn insert_block(
        &mut self,
        block: LocalBlock,
        state_diff: StateDiff,
        total_difficulty: U256,
    ) -> Result<&Arc<dyn SyncBlock>, InsertError> {
        let block_hash = *block.hash();

        // As blocks are contiguous, we are guaranteed that the block number
        // won't exist if its hash is not present.
        if self.hash_to_block.contains_key(&block_hash) {
            return Err(InsertError::DuplicateBlock {
                block_hash,
                block_number: block.header().number,
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

        // SAFETY: We checked that the block's hash and transactions don't
        // exist yet.
        Ok(unsafe { self.insert_block_unchecked(block, state_diff, total_difficulty) })
    }

    /// Inserts a block without checking for duplicates.
    ///
    /// # Safety
    ///
    /// Ensure that the instance does not contain a block with the same hash,
    /// nor any transactions with the same hash.
    unsafe fn insert_block_unchecked(
        &mut self,
        block: LocalBlock,
        state_diff: StateDiff,
        total_difficulty: U256,
    ) -> &Arc<dyn SyncBlock> {
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

        let block_hash = *block.hash();

        self.state_diffs.push(state_diff);
        self.hash_to_total_difficulty
            .insert(block_hash, total_difficulty);
        self.blocks.push(block.clone());
        self.hash_to_block.insert(block_hash, block);

        self.hash_to_block
            .get(&block_hash)
            .expect("Block was just inserted")
    }

    /// Reverts to the block with the provided number, deleting all later
    /// blocks. Returns whether the block was found.
    pub fn revert_to_block(&mut self, block_number: u64) -> bool {
        let block_index = {
            let Some(first_block) = self.blocks.first() else {
                return false;
            };

            let first_block_number = first_block.header().number;
            if block_number < first_block_number {
                return false;
            }

            usize::try_from(block_number - first_block_number)
                .expect("Block number range fits in usize")
        };

        if block_index >= self.blocks.len() {
            return false;
        }

        let removed_blocks = self.blocks.split_off(block_index + 1);
        self.state_diffs.truncate(block_index + 1);

        for block in removed_blocks {
            self.hash_to_block.remove(block.hash());
            self.hash_to_total_difficulty.remove(block.hash());

            for transaction in block.transactions() {
                let transaction_hash = transaction.transaction_hash();

                self.transaction_hash_to_block.remove(transaction_hash);
                self.transaction_hash_to_receipt.remove(transaction_hash);
            }
        }

        true
    }
}
