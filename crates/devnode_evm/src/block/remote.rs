use std::sync::{Arc, OnceLock};

use devnode_eth::{
    block::BlockHeader, receipt::BlockReceipt, transaction, withdrawal::Withdrawal, B256,
};
use devnode_rpc_client::{
    block::{Block as RpcBlock, MissingFieldError},
    transaction::{ConversionError, Transaction},
    RpcClient,
};
use tokio::runtime;

use super::Block;
use crate::blockchain::BlockchainError;

/// An error that occurred while converting a JSON-RPC block into a
/// [`RemoteBlock`].
#[derive(Debug, thiserror::Error)]
pub enum RemoteBlockCreationError {
    /// The block is missing a field that all mined blocks have.
    #[error(transparent)]
    MissingField(#[from] MissingFieldError),
    /// One of the block's transactions could not be converted.
    #[error(transparent)]
    TransactionConversion(#[from] ConversionError),
}

/// A block fetched from a remote Ethereum node. Receipts are only fetched
/// when they are requested.
#[derive(Clone, Debug)]
pub struct RemoteBlock {
    header: BlockHeader,
    transactions: Vec<transaction::Signed>,
    /// The receipts of the block's transactions
    receipts: OnceLock<Vec<Arc<BlockReceipt>>>,
    withdrawals: Option<Vec<Withdrawal>>,
    hash: B256,
    rpc_client: Arc<RpcClient>,
    runtime: runtime::Handle,
}

impl RemoteBlock {
    /// Constructs a new instance from the provided JSON-RPC block.
    pub fn new(
        block: RpcBlock<Transaction>,
        rpc_client: Arc<RpcClient>,
        runtime: runtime::Handle,
    ) -> Result<Self, RemoteBlockCreationError> {
        let header = BlockHeader::try_from(&block)?;
        let hash = block.hash.ok_or(MissingFieldError::Hash)?;

        let transactions = block
            .transactions
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<transaction::Signed>, _>>()?;

        Ok(Self {
            header,
            transactions,
            receipts: OnceLock::new(),
            withdrawals: block.withdrawals,
            hash,
            rpc_client,
            runtime,
        })
    }

    fn fetch_transaction_receipts(&self) -> Result<Vec<Arc<BlockReceipt>>, BlockchainError> {
        let mut receipts = Vec::with_capacity(self.transactions.len());

        for transaction in &self.transactions {
            let transaction_hash = *transaction.transaction_hash();

            let receipt = tokio::task::block_in_place(|| {
                self.runtime
                    .block_on(self.rpc_client.get_transaction_receipt(transaction_hash))
            })?
            .ok_or(BlockchainError::MissingReceipt { transaction_hash })?;

            receipts.push(Arc::new(receipt));
        }

        Ok(receipts)
    }
}

impl Block for RemoteBlock {
    fn hash(&self) -> &B256 {
        &self.hash
    }

    fn header(&self) -> &BlockHeader {
        &self.header
    }

    fn transactions(&self) -> &[transaction::Signed] {
        &self.transactions
    }

    fn transaction_receipts(&self) -> Result<Vec<Arc<BlockReceipt>>, BlockchainError> {
        if let Some(receipts) = self.receipts.get() {
            return Ok(receipts.clone());
        }

        let receipts = self.fetch_transaction_receipts()?;

        // A concurrent fetch may have won the race; use its result.
        Ok(self.receipts.get_or_init(|| receipts).clone())
    }

    fn withdrawals(&self) -> Option<&[Withdrawal]> {
        self.withdrawals.as_deref()
    }
}
