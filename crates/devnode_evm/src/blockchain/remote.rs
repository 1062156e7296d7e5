use std::sync::Arc;

use devnode_eth::{
    filter::OneOrMore, log::FilterLog, receipt::BlockReceipt, Address, BlockSpec, HashSet,
    PreEip1898BlockSpec, B256, U256,
};
use devnode_rpc_client::RpcClient;
use parking_lot::RwLock;
use tokio::runtime;

use super::{storage::SparseBlockchainStorage, BlockchainError};
use crate::block::{Block as _, RemoteBlock, SyncBlock};

/// A view on a remote Ethereum node's blockchain, with an in-memory cache for
/// fetched blocks and receipts.
#[derive(Debug)]
pub struct RemoteBlockchain {
    client: Arc<RpcClient>,
    cache: RwLock<SparseBlockchainStorage>,
    runtime: runtime::Handle,
}

impl RemoteBlockchain {
    /// Constructs a new instance with the provided RPC client.
    pub fn new(client: Arc<RpcClient>, runtime: runtime::Handle) -> Self {
        Self {
            client,
            cache: RwLock::new(SparseBlockchainStorage::default()),
            runtime,
        }
    }

    /// Retrieves the instance's RPC client.
    pub fn client(&self) -> &Arc<RpcClient> {
        &self.client
    }

    /// Retrieves the instance's runtime.
    pub fn runtime(&self) -> &runtime::Handle {
        &self.runtime
    }

    /// Retrieves the block with the provided hash, if it exists.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub fn block_by_hash(
        &self,
        hash: &B256,
    ) -> Result<Option<Arc<dyn SyncBlock>>, BlockchainError> {
        if let Some(block) = self.cache.read().block_by_hash(hash) {
            return Ok(Some(block.clone()));
        }

        let block = tokio::task::block_in_place(|| {
            self.runtime
                .block_on(self.client.get_block_by_hash_with_transaction_data(*hash))
        })?;

        block
            .map(|block| self.fetch_and_cache_block(block))
            .transpose()
    }

    /// Retrieves the block with the provided number. The remote node is
    /// expected to have it.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub fn block_by_number(&self, number: u64) -> Result<Arc<dyn SyncBlock>, BlockchainError> {
        if let Some(block) = self.cache.read().block_by_number(number) {
            return Ok(block.clone());
        }

        let block = tokio::task::block_in_place(|| {
            self.runtime.block_on(
                self.client
                    .get_block_by_number_with_transaction_data(PreEip1898BlockSpec::Number(
                        number,
                    )),
            )
        })?;

        self.fetch_and_cache_block(block)
    }

    /// Retrieves the block that contains a transaction with the provided
    /// hash, if it exists.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub fn block_by_transaction_hash(
        &self,
        transaction_hash: &B256,
    ) -> Result<Option<Arc<dyn SyncBlock>>, BlockchainError> {
        if let Some(block) = self.cache.read().block_by_transaction_hash(transaction_hash) {
            return Ok(Some(block.clone()));
        }

        let transaction = tokio::task::block_in_place(|| {
            self.runtime
                .block_on(self.client.get_transaction_by_hash(*transaction_hash))
        })?;

        if let Some(block_hash) = transaction.and_then(|transaction| transaction.block_hash) {
            self.block_by_hash(&block_hash)
        } else {
            Ok(None)
        }
    }

    /// Retrieves the logs that match the provided filter, in the provided
    /// (inclusive) range of blocks.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub fn logs(
        &self,
        from_block: u64,
        to_block: u64,
        addresses: &HashSet<Address>,
        topics: &[Option<Vec<B256>>],
    ) -> Result<Vec<FilterLog>, BlockchainError> {
        let address = match addresses.len() {
            0 => None,
            1 => addresses
                .iter()
                .next()
                .copied()
                .map(OneOrMore::One),
            _ => Some(OneOrMore::Many(addresses.iter().copied().collect())),
        };

        let topics = if topics.is_empty() {
            None
        } else {
            Some(
                topics
                    .iter()
                    .map(|topic| {
                        topic.as_ref().map(|topic| match topic.len() {
                            1 => OneOrMore::One(topic[0]),
                            _ => OneOrMore::Many(topic.clone()),
                        })
                    })
                    .collect(),
            )
        };

        let logs = tokio::task::block_in_place(|| {
            self.runtime.block_on(self.client.get_logs_by_range(
                BlockSpec::Number(from_block),
                BlockSpec::Number(to_block),
                address,
                topics,
            ))
        })?;

        Ok(logs)
    }

    /// Retrieves the receipt of the transaction with the provided hash, if it
    /// exists.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub fn receipt_by_transaction_hash(
        &self,
        transaction_hash: &B256,
    ) -> Result<Option<Arc<BlockReceipt>>, BlockchainError> {
        if let Some(receipt) = self.cache.read().receipt_by_transaction_hash(transaction_hash) {
            return Ok(Some(receipt.clone()));
        }

        let receipt = tokio::task::block_in_place(|| {
            self.runtime
                .block_on(self.client.get_transaction_receipt(*transaction_hash))
        })?;

        if let Some(receipt) = receipt {
            let receipt = Arc::new(receipt);

            // A concurrent fetch may have cached the receipt already.
            let mut cache = self.cache.write();
            if cache
                .receipt_by_transaction_hash(transaction_hash)
                .is_none()
            {
                cache
                    .insert_receipt(receipt.clone())
                    .expect("Receipt was checked to not exist");
            }

            Ok(Some(receipt))
        } else {
            Ok(None)
        }
    }

    /// Retrieves the total difficulty of the block with the provided hash, if
    /// it exists.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub fn total_difficulty_by_hash(
        &self,
        hash: &B256,
    ) -> Result<Option<U256>, BlockchainError> {
        if let Some(total_difficulty) = self.cache.read().total_difficulty_by_hash(hash) {
            return Ok(Some(*total_difficulty));
        }

        let block = tokio::task::block_in_place(|| {
            self.runtime
                .block_on(self.client.get_block_by_hash_with_transaction_data(*hash))
        })?;

        if let Some(block) = block {
            let total_difficulty = block.total_difficulty;
            self.fetch_and_cache_block(block)?;

            Ok(total_difficulty)
        } else {
            Ok(None)
        }
    }

    /// Converts the JSON-RPC block and caches it.
    fn fetch_and_cache_block(
        &self,
        block: devnode_rpc_client::block::Block<devnode_rpc_client::transaction::Transaction>,
    ) -> Result<Arc<dyn SyncBlock>, BlockchainError> {
        let total_difficulty = block.total_difficulty;

        let block = RemoteBlock::new(block, self.client.clone(), self.runtime.clone())?;

        let mut cache = self.cache.write();
        Ok(cache.insert_remote_block(block, total_difficulty))
    }
}
