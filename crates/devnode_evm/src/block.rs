mod builder;
mod local;
mod remote;

use std::{fmt::Debug, sync::Arc};

use devnode_eth::{
    block::BlockHeader, receipt::BlockReceipt, transaction, withdrawal::Withdrawal, B256,
};

pub use self::{
    builder::{BlockBuilder, BlockBuilderCreationError, BlockTransactionError},
    local::LocalBlock,
    remote::{RemoteBlock, RemoteBlockCreationError},
};
use crate::blockchain::BlockchainError;

/// Trait for implementations of an Ethereum block.
pub trait Block: Debug {
    /// Returns the block's hash.
    fn hash(&self) -> &B256;

    /// Returns the block's header.
    fn header(&self) -> &BlockHeader;

    /// Returns the block's transactions.
    fn transactions(&self) -> &[transaction::Signed];

    /// Returns the receipts of the block's transactions. For remote blocks,
    /// the receipts are fetched on first access.
    fn transaction_receipts(&self) -> Result<Vec<Arc<BlockReceipt>>, BlockchainError>;

    /// Returns the block's withdrawals, for post-Shanghai blocks.
    fn withdrawals(&self) -> Option<&[Withdrawal]>;
}

/// Trait that meets all requirements for a synchronous block.
pub trait SyncBlock: Block + Send + Sync {}

impl<BlockT> SyncBlock for BlockT where BlockT: Block + Send + Sync {}
