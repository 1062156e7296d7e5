mod contiguous;
mod sparse;

use std::sync::Arc;

use devnode_eth::{
    log::{matches_address_filter, matches_topics_filter, FilterLog},
    Address, HashSet, B256,
};

pub use self::{contiguous::ContiguousBlockchainStorage, sparse::SparseBlockchainStorage};
use crate::{block::SyncBlock, blockchain::BlockchainError};

/// An error that occurred while inserting a block into storage.
#[derive(Debug, thiserror::Error)]
pub enum InsertError {
    /// A block with the same hash or number already exists.
    #[error("A block, with hash {block_hash} and number {block_number}, already exists.")]
    DuplicateBlock {
        /// The hash of the block
        block_hash: B256,
        /// The number of the block
        block_number: u64,
    },
    /// A receipt with the same transaction hash already exists.
    #[error("A receipt with transaction hash {transaction_hash} already exists.")]
    DuplicateReceipt {
        /// The hash of the receipt's transaction
        transaction_hash: B256,
    },
    /// A transaction with the same hash already exists.
    #[error("A transaction with hash {hash} already exists.")]
    DuplicateTransaction {
        /// The hash of the transaction
        hash: B256,
    },
}

/// Collects the logs of the provided blocks that match the address and topics
/// filters.
pub(super) fn matching_logs<'blocks>(
    blocks: impl Iterator<Item = &'blocks Arc<dyn SyncBlock>>,
    addresses: &HashSet<Address>,
    topics: &[Option<Vec<B256>>],
) -> Result<Vec<FilterLog>, BlockchainError> {
    let mut logs = Vec::new();

    for block in blocks {
        for receipt in block.transaction_receipts()? {
            logs.extend(
                receipt
                    .inner
                    .inner
                    .logs()
                    .iter()
                    .filter(|log| {
                        matches_address_filter(&log.address, addresses)
                            && matches_topics_filter(&log.topics, topics)
                    })
                    .cloned(),
            );
        }
    }

    Ok(logs)
}
