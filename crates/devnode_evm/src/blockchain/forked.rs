use std::sync::Arc;

use devnode_eth::{
    block::{largest_safe_block_number, safe_block_depth, LargestSafeBlockNumberArgs},
    log::FilterLog,
    receipt::BlockReceipt,
    Address, Hardfork, HashSet, B256, U256,
};
use devnode_rpc_client::{fork::ForkMetadata, RpcClient, RpcClientError};
use parking_lot::Mutex;
use tokio::runtime;

use super::{
    compute_state_at_block, storage::SparseBlockchainStorage, validate_next_block, Blockchain,
    BlockchainError, BlockchainMut, RemoteBlockchain,
};
use crate::{
    block::{Block as _, LocalBlock, SyncBlock},
    random::RandomHashGenerator,
    state::{ChainState, ForkState, StateDiff},
};

/// An error that occurs upon creation of a [`ForkedBlockchain`].
#[derive(Debug, thiserror::Error)]
pub enum ForkedCreationError {
    /// The requested fork block is newer than the remote chain's latest
    /// block.
    #[error("Trying to initialize a provider with block {fork_block_number} but the current block is {latest_block_number}")]
    InvalidBlockNumber {
        /// The requested fork block number
        fork_block_number: u64,
        /// The remote chain's latest block number
        latest_block_number: u64,
    },
    /// JSON-RPC error
    #[error(transparent)]
    RpcClient(#[from] RpcClientError),
}

/// Arguments for the [`recommended_fork_block_number`] function.
#[derive(Clone, Copy, Debug)]
pub struct RecommendedForkBlockNumberArgs {
    /// The chain id of the remote chain.
    pub chain_id: u64,
    /// The latest block number of the remote chain.
    pub latest_block_number: u64,
}

/// The recommended block number to fork from, based on the remote chain's
/// latest block number.
///
/// # Design
///
/// Forking from the latest block invites spurious differences with the remote
/// node whenever a reorg occurs, so a block that is considered safe from
/// reorgs is selected instead.
pub fn recommended_fork_block_number(args: RecommendedForkBlockNumberArgs) -> u64 {
    largest_safe_block_number(LargestSafeBlockNumberArgs {
        chain_id: args.chain_id,
        latest_block_number: args.latest_block_number,
    })
}

/// A blockchain that forked from a remote blockchain: blocks at or below the
/// fork point are served by the remote node, while all later blocks are
/// created locally.
#[derive(Debug)]
pub struct ForkedBlockchain {
    local_storage: SparseBlockchainStorage,
    remote: RemoteBlockchain,
    runtime: runtime::Handle,
    state_root_generator: Arc<Mutex<RandomHashGenerator>>,
    fork_block_number: u64,
    /// The chain id of the forked blockchain.
    chain_id: u64,
    /// The network id of the forked blockchain.
    network_id: u64,
    hardfork: Hardfork,
}

impl ForkedBlockchain {
    /// Constructs a new instance, resolving the fork block against the remote
    /// node.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn new(
        runtime: runtime::Handle,
        rpc_client: Arc<RpcClient>,
        hardfork: Hardfork,
        fork_block_number: Option<u64>,
        state_root_generator: Arc<Mutex<RandomHashGenerator>>,
    ) -> Result<Self, ForkedCreationError> {
        let ForkMetadata {
            chain_id,
            network_id,
            latest_block_number,
        } = rpc_client.fork_metadata().await?;

        let recommended_block_number =
            recommended_fork_block_number(RecommendedForkBlockNumberArgs {
                chain_id,
                latest_block_number,
            });

        let fork_block_number = if let Some(fork_block_number) = fork_block_number {
            if fork_block_number > latest_block_number {
                return Err(ForkedCreationError::InvalidBlockNumber {
                    fork_block_number,
                    latest_block_number,
                });
            }

            if fork_block_number > recommended_block_number {
                let num_confirmations = latest_block_number - fork_block_number + 1;
                let required_confirmations = safe_block_depth(chain_id) + 1;
                let missing_confirmations = required_confirmations - num_confirmations;

                log::warn!("You are forking from block {fork_block_number} which has less than {required_confirmations} confirmations, and will affect the provider's performance. Please use block number {recommended_block_number} or wait for the block to get {missing_confirmations} more confirmations.");
            }

            fork_block_number
        } else {
            recommended_block_number
        };

        Ok(Self {
            local_storage: SparseBlockchainStorage::empty(fork_block_number),
            remote: RemoteBlockchain::new(rpc_client, runtime.clone()),
            runtime,
            state_root_generator,
            fork_block_number,
            chain_id,
            network_id,
            hardfork,
        })
    }

    /// Retrieves the block number the blockchain was forked at.
    pub fn fork_block_number(&self) -> u64 {
        self.fork_block_number
    }
}

impl Blockchain for ForkedBlockchain {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn block_by_hash(&self, hash: &B256) -> Result<Option<Arc<dyn SyncBlock>>, BlockchainError> {
        if let Some(block) = self.local_storage.block_by_hash(hash) {
            return Ok(Some(block.clone()));
        }

        self.remote.block_by_hash(hash)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn block_by_number(
        &self,
        number: u64,
    ) -> Result<Option<Arc<dyn SyncBlock>>, BlockchainError> {
        if number <= self.fork_block_number {
            self.remote.block_by_number(number).map(Some)
        } else {
            Ok(self.local_storage.block_by_number(number).cloned())
        }
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn block_by_transaction_hash(
        &self,
        transaction_hash: &B256,
    ) -> Result<Option<Arc<dyn SyncBlock>>, BlockchainError> {
        if let Some(block) = self.local_storage.block_by_transaction_hash(transaction_hash) {
            return Ok(Some(block.clone()));
        }

        self.remote.block_by_transaction_hash(transaction_hash)
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn hardfork(&self) -> Hardfork {
        self.hardfork
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn last_block(&self) -> Result<Arc<dyn SyncBlock>, BlockchainError> {
        let last_block_number = self.last_block_number();

        if last_block_number > self.fork_block_number {
            self.local_storage
                .block_by_number(last_block_number)
                .cloned()
                .ok_or(BlockchainError::UnknownBlockNumber)
        } else {
            self.remote.block_by_number(self.fork_block_number)
        }
    }

    fn last_block_number(&self) -> u64 {
        self.local_storage.last_block_number()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn logs(
        &self,
        from_block: u64,
        to_block: u64,
        addresses: &HashSet<Address>,
        topics: &[Option<Vec<B256>>],
    ) -> Result<Vec<FilterLog>, BlockchainError> {
        if from_block <= self.fork_block_number {
            let (to_block_remote, to_block_local) = if to_block <= self.fork_block_number {
                (to_block, None)
            } else {
                (self.fork_block_number, Some(to_block))
            };

            let mut logs = self
                .remote
                .logs(from_block, to_block_remote, addresses, topics)?;

            if let Some(to_block_local) = to_block_local {
                let local_logs = super::storage::matching_logs(
                    self.local_storage
                        .blocks_in_range(self.fork_block_number + 1..=to_block_local),
                    addresses,
                    topics,
                )?;

                logs.extend(local_logs);
            }

            Ok(logs)
        } else {
            super::storage::matching_logs(
                self.local_storage.blocks_in_range(from_block..=to_block),
                addresses,
                topics,
            )
        }
    }

    fn network_id(&self) -> u64 {
        self.network_id
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn receipt_by_transaction_hash(
        &self,
        transaction_hash: &B256,
    ) -> Result<Option<Arc<BlockReceipt>>, BlockchainError> {
        if let Some(receipt) = self
            .local_storage
            .receipt_by_transaction_hash(transaction_hash)
        {
            return Ok(Some(receipt.clone()));
        }

        self.remote.receipt_by_transaction_hash(transaction_hash)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn state_at_block_number(&self, block_number: u64) -> Result<ChainState, BlockchainError> {
        if block_number > self.last_block_number() {
            return Err(BlockchainError::UnknownBlockNumber);
        }

        let state_root = self
            .block_by_number(block_number)?
            .ok_or(BlockchainError::UnknownBlockNumber)?
            .header()
            .state_root;

        // States at or below the fork point are served by the remote node
        // directly; later states replay the local blocks' changes on top of
        // the fork state.
        let pin_block_number = block_number.min(self.fork_block_number);

        let mut state = ChainState::Fork(ForkState::new(
            self.runtime.clone(),
            self.remote.client().clone(),
            self.state_root_generator.clone(),
            pin_block_number,
            state_root,
        ));

        if block_number > self.fork_block_number {
            compute_state_at_block(
                &mut state,
                self.local_storage
                    .state_diffs_in_range(self.fork_block_number + 1..=block_number),
            );
        }

        // Ensure that the state root of the returned state matches the
        // block's, even when it was generated.
        if let ChainState::Fork(fork_state) = &mut state {
            fork_state.set_state_root(state_root);
        }

        Ok(state)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn total_difficulty_by_hash(&self, hash: &B256) -> Result<Option<U256>, BlockchainError> {
        if let Some(total_difficulty) = self.local_storage.total_difficulty_by_hash(hash) {
            return Ok(Some(*total_difficulty));
        }

        self.remote.total_difficulty_by_hash(hash)
    }
}

impl BlockchainMut for ForkedBlockchain {
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
            .unwrap_or_default();

        let total_difficulty = previous_total_difficulty + block.header().difficulty;

        let block = self
            .local_storage
            .insert_block(block, state_diff, total_difficulty)?;

        Ok(block.clone())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn revert_to_block(&mut self, block_number: u64) -> Result<(), BlockchainError> {
        match block_number.cmp(&self.fork_block_number) {
            std::cmp::Ordering::Less => Err(BlockchainError::CannotDeleteRemote),
            std::cmp::Ordering::Equal => {
                self.local_storage = SparseBlockchainStorage::empty(self.fork_block_number);

                Ok(())
            }
            std::cmp::Ordering::Greater => {
                if self.local_storage.revert_to_block(block_number) {
                    Ok(())
                } else {
                    Err(BlockchainError::UnknownBlockNumber)
                }
            }
        }
    }
}
