mod gas;

use std::{
    collections::BTreeMap,
    num::NonZeroU64,
    sync::Arc,
    time::{Instant, UNIX_EPOCH},
};

use alloy_rlp::Decodable as _;
use devnode_eth::{
    account::AccountInfo,
    block::{
        calculate_next_base_fee_per_gas, BaseFeeParams, BlockHeader, HeaderOverrides,
        PartialHeader, INITIAL_BASE_FEE,
    },
    filter::{FilteredEvents, LogFilterOptions, LogOutput, OneOrMore, SubscriptionType},
    signature::secret_key_to_address,
    transaction::{self, TransactionRequestAndSender},
    Address, BlockSpec, BlockTag, Bytes, Eip1898BlockSpec, Hardfork, HashMap, HashSet, B256,
    KECCAK_EMPTY, U256,
};
use devnode_evm::{
    block::{LocalBlock, SyncBlock},
    blockchain::{
        Blockchain as _, BlockchainError, ForkedBlockchain, LocalBlockchain, SyncBlockchain,
    },
    executor::{ExecutionContext, ExecutionResult, SyncExecutor},
    mempool,
    state::{
        AccountModifierFn, ChainState, State as _, StateDebug as _, StateDiff, TrieState,
    },
    MemPool, MineBlockResult, MineBlockResultAndState, RandomHashGenerator,
};
use devnode_rpc_client::{HeaderMap, RpcClient};
use indexmap::IndexMap;
use parking_lot::Mutex;
use rpds::HashTrieMapSync;
use tokio::runtime;

use crate::{
    config::ProviderConfig,
    error::{CreationError, ProviderError, TransactionFailure},
    filter::{bloom_contains_log_filter, filter_logs, Filter, FilterData, LogFilter},
    snapshot::Snapshot,
    subscribe::{SubscriptionEvent, SubscriptionEventData, SyncSubscriberCallback},
    time::{CurrentTime, TimeSinceEpoch},
};

/// The seed for the sequence of `prevRandao` values of locally mined blocks.
const PREV_RANDAO_SEED: &str = "randomMixHashSeed";
/// The seed for the sequence of state roots assigned to fork states, whose
/// true roots are unknowable locally.
const STATE_ROOT_SEED: &str = "seed";

/// The block reward of pre-merge blocks, in wei.
const PRE_MERGE_BLOCK_REWARD: u128 = 2_000_000_000_000_000_000;

/// Metadata about the remote chain a provider forked from.
#[derive(Clone, Debug)]
pub struct ForkMetadata {
    /// The remote chain's id.
    pub chain_id: u64,
    /// The block number the local chain starts after.
    pub fork_block_number: u64,
    /// The hash of the block the local chain starts after.
    pub fork_block_hash: B256,
}

/// The result of sending a transaction, including all blocks that were mined
/// while automatically mining.
#[derive(Clone, Debug)]
pub struct SendTransactionResult {
    /// The hash of the sent transaction.
    pub transaction_hash: B256,
    /// The blocks mined to include the transaction and drain the pool. Empty
    /// when automatic mining is disabled.
    pub mining_results: Vec<MineBlockResult>,
}

impl SendTransactionResult {
    /// The execution result of the sent transaction, if it was mined.
    pub fn transaction_result(&self) -> Option<&ExecutionResult> {
        self.mining_results.iter().find_map(|result| {
            result
                .block
                .transactions()
                .iter()
                .position(|transaction| transaction.transaction_hash() == &self.transaction_hash)
                .map(|index| &result.transaction_results[index])
        })
    }
}

/// A mined transaction and the block that contains it.
#[derive(Clone, Debug)]
pub struct TransactionAndBlock {
    /// The signed transaction.
    pub transaction: transaction::Signed,
    /// The block the transaction is mined in, if any.
    pub block_data: Option<BlockDataForTransaction>,
    /// Whether the transaction is still pending in the mem pool.
    pub is_pending: bool,
}

/// Block metadata for a mined transaction.
#[derive(Clone, Debug)]
pub struct BlockDataForTransaction {
    /// The block that contains the transaction.
    pub block: Arc<dyn SyncBlock>,
    /// The index of the transaction within the block.
    pub transaction_index: u64,
}

/// The provider's chain-facing state: the blockchain, the mem pool, the
/// per-block states, and all the bookkeeping that the management API mutates.
pub struct ProviderData<TimerT: Clone + TimeSinceEpoch = CurrentTime> {
    runtime_handle: runtime::Handle,
    initial_config: ProviderConfig,
    blockchain: Box<dyn SyncBlockchain>,
    block_number_to_state: HashTrieMapSync<u64, ChainState>,
    mem_pool: MemPool,
    executor: Arc<dyn SyncExecutor>,
    beneficiary: Address,
    min_gas_price: u128,
    prev_randao_generator: RandomHashGenerator,
    block_time_offset_seconds: i64,
    fork_metadata: Option<ForkMetadata>,
    instance_id: B256,
    is_auto_mining: bool,
    next_block_base_fee_per_gas: Option<u128>,
    next_block_timestamp: Option<u64>,
    // Start with 1 to mimic Ganache
    next_snapshot_id: u64,
    snapshots: BTreeMap<u64, Snapshot>,
    allow_blocks_with_same_timestamp: bool,
    local_accounts: IndexMap<Address, k256::SecretKey>,
    filters: HashMap<U256, Filter>,
    last_filter_id: U256,
    impersonated_accounts: HashSet<Address>,
    subscriber_callback: Arc<dyn SyncSubscriberCallback>,
    timer: TimerT,
}

impl<TimerT: Clone + TimeSinceEpoch> ProviderData<TimerT> {
    /// Constructs a new instance from the provided configuration.
    pub fn new(
        runtime_handle: runtime::Handle,
        executor: Arc<dyn SyncExecutor>,
        subscriber_callback: Arc<dyn SyncSubscriberCallback>,
        config: ProviderConfig,
        timer: TimerT,
    ) -> Result<Self, CreationError> {
        let local_accounts = config
            .accounts
            .iter()
            .map(|account_config| {
                let address = secret_key_to_address(&account_config.secret_key);
                (address, account_config.secret_key.clone())
            })
            .collect::<IndexMap<_, _>>();

        let mut genesis_accounts: HashMap<Address, AccountInfo> = config
            .genesis_accounts
            .iter()
            .map(|(address, balance)| (*address, AccountInfo::with_balance(*balance)))
            .collect();

        for account_config in &config.accounts {
            genesis_accounts.insert(
                secret_key_to_address(&account_config.secret_key),
                AccountInfo::with_balance(account_config.balance),
            );
        }

        let BlockchainAndState {
            blockchain,
            fork_metadata,
            state,
            block_time_offset_seconds,
            next_block_base_fee_per_gas,
            prev_randao_generator,
        } = create_blockchain_and_state(runtime_handle.clone(), &config, &timer, genesis_accounts)?;

        let mem_pool = MemPool::new(config.block_gas_limit);

        let block_number_to_state =
            HashTrieMapSync::new_sync().insert(blockchain.last_block_number(), state);

        Ok(Self {
            runtime_handle,
            blockchain,
            block_number_to_state,
            mem_pool,
            executor,
            beneficiary: config.coinbase,
            min_gas_price: config.min_gas_price,
            prev_randao_generator,
            block_time_offset_seconds,
            fork_metadata,
            instance_id: B256::random(),
            is_auto_mining: config.mining.auto_mine,
            next_block_base_fee_per_gas,
            next_block_timestamp: None,
            next_snapshot_id: 1,
            snapshots: BTreeMap::new(),
            allow_blocks_with_same_timestamp: config.allow_blocks_with_same_timestamp,
            local_accounts,
            filters: HashMap::default(),
            last_filter_id: U256::ZERO,
            impersonated_accounts: HashSet::default(),
            subscriber_callback,
            timer,
            initial_config: config,
        })
    }

    /// Discards the instance's state and recreates it from its initial
    /// configuration, with the fork configuration replaced by the provided
    /// one. Locally owned accounts and their secret keys are preserved.
    pub fn reset(&mut self, fork_config: Option<crate::ForkConfig>) -> Result<(), CreationError> {
        let mut config = self.initial_config.clone();
        config.fork = fork_config;

        let mut reset_instance = Self::new(
            self.runtime_handle.clone(),
            self.executor.clone(),
            self.subscriber_callback.clone(),
            config,
            self.timer.clone(),
        )?;

        std::mem::swap(self, &mut reset_instance);

        Ok(())
    }

    /// Retrieves the addresses of the provider's owned accounts, in
    /// configuration order.
    pub fn accounts(&self) -> impl Iterator<Item = &Address> {
        self.local_accounts.keys()
    }

    /// Retrieves the instance's unique identifier, regenerated on reset.
    pub fn instance_id(&self) -> &B256 {
        &self.instance_id
    }

    /// Retrieves the chain id: the remote chain's when forking, the
    /// configured one otherwise.
    pub fn chain_id(&self) -> u64 {
        self.blockchain.chain_id()
    }

    /// Retrieves the network id.
    pub fn network_id(&self) -> u64 {
        self.blockchain.network_id()
    }

    /// Retrieves the hardfork the chain is running.
    pub fn hardfork(&self) -> Hardfork {
        self.blockchain.hardfork()
    }

    /// Retrieves metadata about the forked chain, if the provider is forking.
    pub fn fork_metadata(&self) -> Option<&ForkMetadata> {
        self.fork_metadata.as_ref()
    }

    /// Retrieves the last block in the blockchain.
    pub fn last_block(&self) -> Result<Arc<dyn SyncBlock>, ProviderError> {
        Ok(self.blockchain.last_block()?)
    }

    /// Retrieves the last block number in the blockchain.
    pub fn last_block_number(&self) -> u64 {
        self.blockchain.last_block_number()
    }

    /// Retrieves the gas limit of mined blocks.
    pub fn block_gas_limit(&self) -> NonZeroU64 {
        self.mem_pool.block_gas_limit()
    }

    /// Sets the gas limit of future mined blocks, re-validating the mem
    /// pool's contents against it.
    pub fn set_block_gas_limit(&mut self, gas_limit: NonZeroU64) -> Result<(), ProviderError> {
        let state = self.current_state()?;
        self.mem_pool
            .set_block_gas_limit(&state, gas_limit)
            .map_err(ProviderError::MemPoolUpdate)
    }

    /// Retrieves the address that receives mining rewards.
    pub fn coinbase(&self) -> Address {
        self.beneficiary
    }

    /// Sets the address that receives mining rewards.
    pub fn set_coinbase(&mut self, coinbase: Address) {
        self.beneficiary = coinbase;
    }

    /// Sets the minimum gas price the miner accepts.
    pub fn set_min_gas_price(&mut self, min_gas_price: u128) {
        self.min_gas_price = min_gas_price;
    }

    /// Whether a block is mined after every transaction submission.
    pub fn is_auto_mining(&self) -> bool {
        self.is_auto_mining
    }

    /// Enables or disables automatic mining.
    pub fn set_auto_mining(&mut self, enabled: bool) {
        self.is_auto_mining = enabled;
    }

    /// Retrieves the pending transactions in the mem pool, executable
    /// transactions first.
    pub fn pending_transactions(&self) -> impl Iterator<Item = &transaction::Signed> {
        self.mem_pool.transactions()
    }

    /// Whether the mem pool holds any transactions, executable or not.
    pub fn mem_pool_has_transactions(&self) -> bool {
        mempool::has_transactions(&self.mem_pool)
    }

    /// Retrieves the balance of the account at the address, as of the
    /// provided block.
    pub fn balance(
        &mut self,
        address: Address,
        block_spec: Option<&BlockSpec>,
    ) -> Result<U256, ProviderError> {
        self.execute_in_block_context(block_spec, move |_blockchain, _block, state| {
            Ok(state
                .basic(address)?
                .map_or(U256::ZERO, |account_info| account_info.balance))
        })?
    }

    /// Retrieves the code of the account at the address, as of the provided
    /// block.
    pub fn get_code(
        &mut self,
        address: Address,
        block_spec: Option<&BlockSpec>,
    ) -> Result<Bytes, ProviderError> {
        self.execute_in_block_context(block_spec, move |_blockchain, _block, state| {
            let code = state
                .basic(address)?
                .map_or(Ok(Bytes::new()), |account_info| {
                    if account_info.code_hash == KECCAK_EMPTY {
                        Ok(Bytes::new())
                    } else if let Some(code) = account_info.code {
                        Ok(code)
                    } else {
                        state.code_by_hash(account_info.code_hash)
                    }
                })?;

            Ok(code)
        })?
    }

    /// Retrieves the value of the account's storage slot, as of the provided
    /// block.
    pub fn get_storage_at(
        &mut self,
        address: Address,
        index: U256,
        block_spec: Option<&BlockSpec>,
    ) -> Result<U256, ProviderError> {
        self.execute_in_block_context(block_spec, move |_blockchain, _block, state| {
            Ok(state.storage(address, index)?)
        })?
    }

    /// Retrieves the nonce of the account at the address, as of the provided
    /// block.
    pub fn get_transaction_count(
        &mut self,
        address: Address,
        block_spec: Option<&BlockSpec>,
    ) -> Result<u64, ProviderError> {
        self.execute_in_block_context(block_spec, move |_blockchain, _block, state| {
            Ok(state
                .basic(address)?
                .map_or(0, |account_info| account_info.nonce))
        })?
    }

    /// Retrieves the next nonce for the account, taking its pending
    /// transactions into account.
    pub fn account_next_nonce(&self, address: &Address) -> Result<u64, ProviderError> {
        let state = self.current_state()?;
        mempool::account_next_nonce(&self.mem_pool, &state, address).map_err(ProviderError::State)
    }

    /// Overwrites the balance of the account at the address, re-validating
    /// the mem pool against the new balance.
    pub fn set_balance(&mut self, address: Address, balance: U256) -> Result<(), ProviderError> {
        let mut state = self.current_state()?;

        state.modify_account(
            address,
            AccountModifierFn::new(Box::new(move |account_balance, _, _| {
                *account_balance = balance;
            })),
        )?;

        self.mem_pool
            .update(&state)
            .map_err(ProviderError::MemPoolUpdate)?;

        self.replace_current_state(state);
        Ok(())
    }

    /// Overwrites the code of the account at the address.
    pub fn set_code(&mut self, address: Address, code: Bytes) -> Result<(), ProviderError> {
        let mut state = self.current_state()?;

        state.modify_account(
            address,
            AccountModifierFn::new(Box::new(move |_, _, account_code| {
                *account_code = Some(code.clone());
            })),
        )?;

        self.replace_current_state(state);
        Ok(())
    }

    /// Overwrites the nonce of the account at the address. Rejected while the
    /// mem pool holds transactions, as their validity depends on nonces.
    pub fn set_nonce(&mut self, address: Address, nonce: u64) -> Result<(), ProviderError> {
        if mempool::has_transactions(&self.mem_pool) {
            return Err(ProviderError::SetAccountNonceWithPendingTransactions);
        }

        let mut state = self.current_state()?;

        let previous_nonce = state
            .basic(address)?
            .map_or(0, |account_info| account_info.nonce);

        if nonce < previous_nonce {
            return Err(ProviderError::SetAccountNonceLowerThanCurrent {
                previous: previous_nonce,
                proposed: nonce,
            });
        }

        state.modify_account(
            address,
            AccountModifierFn::new(Box::new(move |_, account_nonce, _| {
                *account_nonce = nonce;
            })),
        )?;

        self.mem_pool
            .update(&state)
            .map_err(ProviderError::MemPoolUpdate)?;

        self.replace_current_state(state);
        Ok(())
    }

    /// Overwrites the value of the account's storage slot.
    pub fn set_account_storage_slot(
        &mut self,
        address: Address,
        index: U256,
        value: U256,
    ) -> Result<(), ProviderError> {
        let mut state = self.current_state()?;
        state.set_account_storage_slot(address, index, value)?;

        self.replace_current_state(state);
        Ok(())
    }

    /// Allows transactions from the address without a valid signature.
    pub fn impersonate_account(&mut self, address: Address) {
        self.impersonated_accounts.insert(address);
    }

    /// Stops impersonating the address, reporting whether it was being
    /// impersonated.
    pub fn stop_impersonating_account(&mut self, address: Address) -> bool {
        self.impersonated_accounts.remove(&address)
    }

    /// Signs the transaction request with the sender's secret key, or fakes a
    /// signature if the sender is impersonated.
    pub fn sign_transaction_request(
        &self,
        transaction_request: TransactionRequestAndSender,
    ) -> Result<transaction::Signed, ProviderError> {
        let TransactionRequestAndSender { request, sender } = transaction_request;

        if self.impersonated_accounts.contains(&sender) {
            Ok(request.fake_sign(sender))
        } else {
            let secret_key = self
                .local_accounts
                .get(&sender)
                .ok_or(ProviderError::UnknownAddress { address: sender })?;

            Ok(request.sign(secret_key)?)
        }
    }

    /// Adds the transaction to the mem pool, notifying pending-transaction
    /// subscribers.
    pub fn add_pending_transaction(
        &mut self,
        transaction: transaction::Signed,
    ) -> Result<B256, ProviderError> {
        let transaction_hash = *transaction.transaction_hash();

        let state = self.current_state()?;
        self.mem_pool.add_transaction(&state, transaction)?;

        self.notify_subscribers_about_pending_transaction(&transaction_hash);

        Ok(transaction_hash)
    }

    /// Sends the transaction: adds it to the mem pool and, if automatic
    /// mining is enabled, mines blocks until it is included and the pool is
    /// drained. Any failure while automatically mining reverts the chain to
    /// its state before the call.
    pub fn send_transaction(
        &mut self,
        transaction: transaction::Signed,
    ) -> Result<SendTransactionResult, ProviderError> {
        self.validate_transaction(&transaction)?;

        let snapshot_id = if self.is_auto_mining {
            self.validate_auto_mine_transaction(&transaction)?;
            Some(self.make_snapshot())
        } else {
            None
        };

        let transaction_hash = match self.add_pending_transaction(transaction) {
            Ok(transaction_hash) => transaction_hash,
            Err(error) => {
                if let Some(snapshot_id) = snapshot_id {
                    self.revert_to_snapshot(snapshot_id);
                }
                return Err(error);
            }
        };

        let mut mining_results = Vec::new();
        if let Some(snapshot_id) = snapshot_id {
            if let Err(error) = self.mine_until_included(transaction_hash, &mut mining_results) {
                self.revert_to_snapshot(snapshot_id);
                return Err(error);
            }

            self.snapshots.remove(&snapshot_id);
        }

        let result = SendTransactionResult {
            transaction_hash,
            mining_results,
        };

        if self.initial_config.bail_on_transaction_failure {
            match result.transaction_result() {
                Some(ExecutionResult::Revert { output, .. }) => {
                    return Err(ProviderError::TransactionFailed(Box::new(
                        TransactionFailure::revert(output.clone(), Some(transaction_hash)),
                    )));
                }
                Some(ExecutionResult::Halt { reason, .. }) => {
                    return Err(ProviderError::TransactionFailed(Box::new(
                        TransactionFailure::halt(*reason, Some(transaction_hash)),
                    )));
                }
                Some(ExecutionResult::Success { .. }) | None => (),
            }
        }

        Ok(result)
    }

    /// Decodes the RLP-encoded transaction and sends it.
    pub fn send_raw_transaction(
        &mut self,
        mut raw_transaction: &[u8],
    ) -> Result<SendTransactionResult, ProviderError> {
        let transaction = transaction::Signed::decode(&mut raw_transaction).map_err(|error| {
            ProviderError::InvalidArgument(format!("Invalid raw transaction: {error}"))
        })?;

        self.send_transaction(transaction)
    }

    /// Mines a block with the provided header values, commits it to the
    /// blockchain, and updates the mem pool and subscriptions.
    pub fn mine_and_commit_block(
        &mut self,
        mut overrides: HeaderOverrides,
    ) -> Result<MineBlockResult, ProviderError> {
        let (block_timestamp, new_offset) = self.next_block_timestamp(overrides.timestamp)?;
        overrides.timestamp = Some(block_timestamp);

        let result = self.mine_block(overrides)?;

        let block = self.blockchain.insert_block(result.block, result.state_diff)?;

        self.mem_pool
            .update(&result.state)
            .map_err(ProviderError::MemPoolUpdate)?;

        if let Some(new_offset) = new_offset {
            self.block_time_offset_seconds = new_offset;
        }

        // Next-block overrides only apply to the block that was just mined.
        self.next_block_base_fee_per_gas.take();
        self.next_block_timestamp.take();

        if self.hardfork().is_post_merge() {
            self.prev_randao_generator.generate_next();
        }

        let block_number = block.header().number;
        self.block_number_to_state = self
            .block_number_to_state
            .insert(block_number, result.state);

        self.notify_subscribers_about_mined_block(&block)?;

        Ok(MineBlockResult {
            block,
            transaction_results: result.transaction_results,
        })
    }

    /// Mines `number_of_blocks` blocks, spacing their timestamps by
    /// `interval` seconds. Pending transactions are included until the pool
    /// is drained; the remaining blocks are empty.
    pub fn mine_and_commit_blocks(
        &mut self,
        number_of_blocks: u64,
        interval: u64,
    ) -> Result<Vec<MineBlockResult>, ProviderError> {
        fn mine_with_interval<TimerT: Clone + TimeSinceEpoch>(
            data: &mut ProviderData<TimerT>,
            mined_blocks: &mut Vec<MineBlockResult>,
            interval: u64,
        ) -> Result<(), ProviderError> {
            let previous_timestamp = mined_blocks
                .last()
                .expect("The first block must have been mined")
                .block
                .header()
                .timestamp;

            let overrides = HeaderOverrides {
                timestamp: Some(previous_timestamp + interval),
                ..HeaderOverrides::default()
            };
            mined_blocks.push(data.mine_and_commit_block(overrides)?);

            Ok(())
        }

        if number_of_blocks == 0 {
            return Ok(Vec::new());
        }

        let mut mined_blocks = Vec::with_capacity(
            usize::try_from(number_of_blocks).expect("number of blocks fits in usize"),
        );

        // The first block follows the regular timestamp rules; the rest are
        // spaced by the interval.
        mined_blocks.push(self.mine_and_commit_block(HeaderOverrides::default())?);

        while u64::try_from(mined_blocks.len()).expect("usize fits into u64") < number_of_blocks
        {
            mine_with_interval(self, &mut mined_blocks, interval)?;
        }

        Ok(mined_blocks)
    }

    /// Mines a single block on behalf of the interval miner.
    pub fn interval_mine(&mut self) -> Result<bool, ProviderError> {
        let result = self.mine_and_commit_block(HeaderOverrides::default())?;

        if result.block.transactions().is_empty() {
            log::debug!(
                "Mined empty block #{block_number}",
                block_number = result.block.header().number
            );
        }

        Ok(true)
    }

    /// Mines the next block without committing it to the blockchain, for
    /// queries against the `pending` block tag.
    pub fn mine_pending_block(&mut self) -> Result<MineBlockResultAndState, ProviderError> {
        let (block_timestamp, _new_offset) = self.next_block_timestamp(None)?;

        self.mine_block(HeaderOverrides {
            timestamp: Some(block_timestamp),
            ..HeaderOverrides::default()
        })
    }

    /// Removes the transaction with the provided hash from the mem pool.
    /// Returns `false` if no such transaction exists, and an error if it was
    /// already mined.
    pub fn drop_transaction(&mut self, transaction_hash: B256) -> Result<bool, ProviderError> {
        if self.mem_pool.remove_transaction(&transaction_hash).is_some() {
            return Ok(true);
        }

        if self
            .blockchain
            .receipt_by_transaction_hash(&transaction_hash)?
            .is_some()
        {
            Err(ProviderError::InvalidDropTransactionHash(transaction_hash))
        } else {
            Ok(false)
        }
    }

    /// Retrieves the block for the provided block spec, where `None` means
    /// the pending block.
    pub fn block_by_block_spec(
        &self,
        block_spec: &BlockSpec,
    ) -> Result<Option<Arc<dyn SyncBlock>>, ProviderError> {
        let invalid_block_number_or_hash = || ProviderError::InvalidBlockNumberOrHash {
            block_spec: block_spec.clone(),
            latest_block_number: self.blockchain.last_block_number(),
        };

        let block = match block_spec {
            BlockSpec::Number(block_number) => Some(
                self.blockchain
                    .block_by_number(*block_number)?
                    .ok_or_else(invalid_block_number_or_hash)?,
            ),
            BlockSpec::Tag(BlockTag::Earliest) => Some(
                self.blockchain
                    .block_by_number(0)?
                    .expect("Genesis block must exist"),
            ),
            BlockSpec::Tag(BlockTag::Safe | BlockTag::Finalized) => {
                self.require_post_merge_hardfork(block_spec)?;
                Some(self.blockchain.last_block()?)
            }
            BlockSpec::Tag(BlockTag::Latest) => Some(self.blockchain.last_block()?),
            BlockSpec::Tag(BlockTag::Pending) => None,
            BlockSpec::Eip1898(Eip1898BlockSpec::Hash { block_hash, .. }) => Some(
                self.blockchain
                    .block_by_hash(block_hash)?
                    .ok_or_else(invalid_block_number_or_hash)?,
            ),
            BlockSpec::Eip1898(Eip1898BlockSpec::Number { block_number }) => Some(
                self.blockchain
                    .block_by_number(*block_number)?
                    .ok_or_else(invalid_block_number_or_hash)?,
            ),
        };

        Ok(block)
    }

    /// Retrieves the block with the provided hash, if it exists.
    pub fn block_by_hash(
        &self,
        block_hash: &B256,
    ) -> Result<Option<Arc<dyn SyncBlock>>, ProviderError> {
        Ok(self.blockchain.block_by_hash(block_hash)?)
    }

    /// Retrieves the transaction with the provided hash, either from the mem
    /// pool or from a mined block.
    pub fn transaction_by_hash(
        &self,
        transaction_hash: &B256,
    ) -> Result<Option<TransactionAndBlock>, ProviderError> {
        let transaction = if let Some(transaction) =
            self.mem_pool.transaction_by_hash(transaction_hash)
        {
            Some(TransactionAndBlock {
                transaction: transaction.pending().clone(),
                block_data: None,
                is_pending: true,
            })
        } else if let Some(block) = self
            .blockchain
            .block_by_transaction_hash(transaction_hash)?
        {
            let transaction_index = block
                .transactions()
                .iter()
                .position(|transaction| transaction.transaction_hash() == transaction_hash)
                .expect("Block with transaction must contain the transaction");

            let transaction = block.transactions()[transaction_index].clone();

            Some(TransactionAndBlock {
                transaction,
                block_data: Some(BlockDataForTransaction {
                    block,
                    transaction_index: u64::try_from(transaction_index)
                        .expect("transaction index fits into u64"),
                }),
                is_pending: false,
            })
        } else {
            None
        };

        Ok(transaction)
    }

    /// Retrieves the receipt of the transaction with the provided hash, if it
    /// was mined.
    pub fn transaction_receipt(
        &self,
        transaction_hash: &B256,
    ) -> Result<Option<Arc<devnode_eth::receipt::BlockReceipt>>, ProviderError> {
        Ok(self
            .blockchain
            .receipt_by_transaction_hash(transaction_hash)?)
    }

    /// Executes the transaction against the state of the provided block,
    /// without committing its changes.
    pub fn run_call(
        &mut self,
        transaction: transaction::Signed,
        block_spec: Option<&BlockSpec>,
    ) -> Result<ExecutionResult, ProviderError> {
        let executor = self.executor.clone();

        let result =
            self.execute_in_block_context(block_spec, move |_blockchain, block, state| {
                let context = simulation_context(block.header());
                let (result, _state_diff) = executor.execute(state, &context, &transaction)?;

                Ok::<_, ProviderError>(result)
            })??;

        if self.initial_config.bail_on_call_failure {
            match &result {
                ExecutionResult::Revert { output, .. } => {
                    return Err(ProviderError::TransactionFailed(Box::new(
                        TransactionFailure::revert(output.clone(), None),
                    )));
                }
                ExecutionResult::Halt { reason, .. } => {
                    return Err(ProviderError::TransactionFailed(Box::new(
                        TransactionFailure::halt(*reason, None),
                    )));
                }
                ExecutionResult::Success { .. } => (),
            }
        }

        Ok(result)
    }

    /// Estimates the minimum gas limit with which the transaction succeeds
    /// against the state of the provided block: the transaction is executed
    /// with the block's full gas budget, after which the limit is lowered by
    /// binary search.
    pub fn estimate_gas(
        &mut self,
        transaction: transaction::Signed,
        block_spec: Option<&BlockSpec>,
    ) -> Result<u64, ProviderError> {
        let minimum_cost = devnode_evm::executor::intrinsic_gas(&transaction);
        let executor = self.executor.clone();

        self.execute_in_block_context(block_spec, move |_blockchain, block, state| {
            let header = block.header();
            let context = simulation_context(header);

            let upper_bound = header.gas_limit;
            let (result, _state_diff) = executor.execute(
                state,
                &context,
                &gas::with_gas_limit(&transaction, upper_bound),
            )?;

            let mut initial_estimation = match result {
                ExecutionResult::Success { gas_used, .. } => gas_used,
                ExecutionResult::Revert { output, .. } => {
                    return Err(ProviderError::TransactionFailed(Box::new(
                        TransactionFailure::revert(output, None),
                    )));
                }
                ExecutionResult::Halt { reason, .. } => {
                    return Err(ProviderError::TransactionFailed(Box::new(
                        TransactionFailure::halt(reason, None),
                    )));
                }
            };

            // Corner case: the transaction is cheaper than its intrinsic
            // cost, e.g. when a precompile refunds gas.
            if initial_estimation <= minimum_cost {
                initial_estimation = minimum_cost + 1;
            }

            // A transaction can need more gas than it ends up using; test
            // whether the used amount suffices before searching.
            if gas::check_gas_limit(&*executor, state, &context, &transaction, initial_estimation)?
            {
                return Ok(initial_estimation);
            }

            gas::binary_search_estimation(gas::BinarySearchEstimationArgs {
                executor: &*executor,
                state,
                context: &context,
                transaction: &transaction,
                lower_bound: initial_estimation,
                upper_bound,
            })
        })?
    }

    /// Suggests a gas price: the next block's base fee plus a 1 gwei tip
    /// post-London, or a flat 8 gwei before.
    pub fn gas_price(&self) -> Result<u128, ProviderError> {
        const PRE_LONDON_GAS_PRICE: u128 = 8_000_000_000;
        const SUGGESTED_PRIORITY_FEE: u128 = 1_000_000_000;

        if let Some(next_block_base_fee) = self.next_block_base_fee_per_gas()? {
            Ok(next_block_base_fee + SUGGESTED_PRIORITY_FEE)
        } else {
            Ok(PRE_LONDON_GAS_PRICE)
        }
    }

    /// The base fee of the next block: the configured override if one is
    /// set, otherwise derived from the last block. `None` before London.
    pub fn next_block_base_fee_per_gas(&self) -> Result<Option<u128>, ProviderError> {
        if !self.hardfork().supports_eip1559() {
            return Ok(None);
        }

        if let Some(base_fee) = self.next_block_base_fee_per_gas {
            return Ok(Some(base_fee));
        }

        let last_block = self.blockchain.last_block()?;
        Ok(Some(calculate_next_base_fee_per_gas(
            last_block.header(),
            &BaseFeeParams::ethereum(),
        )))
    }

    /// Sets the base fee of the next mined block, overriding the derived
    /// value once.
    pub fn set_next_block_base_fee_per_gas(&mut self, base_fee: u128) -> Result<(), ProviderError> {
        let hardfork = self.hardfork();
        if !hardfork.supports_eip1559() {
            return Err(ProviderError::SetNextBlockBaseFeePerGasUnsupported { hardfork });
        }

        self.next_block_base_fee_per_gas = Some(base_fee);
        Ok(())
    }

    /// Sets the timestamp of the next mined block, overriding the clock once.
    pub fn set_next_block_timestamp(&mut self, timestamp: u64) -> Result<u64, ProviderError> {
        let latest_block = self.blockchain.last_block()?;
        let latest_block_header = latest_block.header();

        match timestamp.cmp(&latest_block_header.timestamp) {
            std::cmp::Ordering::Less => Err(ProviderError::TimestampLowerThanPrevious {
                proposed: timestamp,
                previous: latest_block_header.timestamp,
            }),
            std::cmp::Ordering::Equal if !self.allow_blocks_with_same_timestamp => {
                Err(ProviderError::TimestampEqualsPrevious {
                    proposed: timestamp,
                })
            }
            std::cmp::Ordering::Equal | std::cmp::Ordering::Greater => {
                self.next_block_timestamp = Some(timestamp);
                Ok(timestamp)
            }
        }
    }

    /// Advances the clock used for block timestamps by the provided number of
    /// seconds, returning the total offset.
    pub fn increase_block_time(&mut self, increment: u64) -> i64 {
        self.block_time_offset_seconds +=
            i64::try_from(increment).expect("time increment fits into i64");

        self.block_time_offset_seconds
    }

    /// Captures the provider's mutable state, returning an id that
    /// [`Self::revert_to_snapshot`] consumes exactly once.
    pub fn make_snapshot(&mut self) -> u64 {
        let snapshot_id = self.next_snapshot_id;
        self.next_snapshot_id += 1;

        let snapshot = Snapshot {
            block_number: self.blockchain.last_block_number(),
            block_number_to_state: self.block_number_to_state.clone(),
            block_time_offset_seconds: self.block_time_offset_seconds,
            coinbase: self.beneficiary,
            mem_pool: self.mem_pool.clone(),
            next_block_base_fee_per_gas: self.next_block_base_fee_per_gas,
            next_block_timestamp: self.next_block_timestamp,
            prev_randao_generator: self.prev_randao_generator.clone(),
            time: Instant::now(),
        };
        self.snapshots.insert(snapshot_id, snapshot);

        snapshot_id
    }

    /// Reverts the provider to the provided snapshot, discarding it and all
    /// snapshots taken after it. Returns whether the snapshot existed.
    pub fn revert_to_snapshot(&mut self, snapshot_id: u64) -> bool {
        // Ganache docs state: "If no snapshot id is passed it will use the
        // most recent snapshot. Reverting removes the snapshot and all
        // snapshots taken after it."
        let mut removed_snapshots = self.snapshots.split_off(&snapshot_id);

        if let Some(snapshot) = removed_snapshots.remove(&snapshot_id) {
            let Snapshot {
                block_number,
                block_number_to_state,
                block_time_offset_seconds,
                coinbase,
                mem_pool,
                next_block_base_fee_per_gas,
                next_block_timestamp,
                prev_randao_generator,
                time,
            } = snapshot;

            // The time between snapshot and revert still elapsed, so it is
            // added to the reverted offset.
            let elapsed_seconds = i64::try_from(time.elapsed().as_secs())
                .expect("elapsed seconds fit into i64");
            self.block_time_offset_seconds = block_time_offset_seconds + elapsed_seconds;

            self.blockchain
                .revert_to_block(block_number)
                .expect("Snapshotted block must exist");

            self.block_number_to_state = block_number_to_state;
            self.beneficiary = coinbase;
            self.mem_pool = mem_pool;
            self.next_block_base_fee_per_gas = next_block_base_fee_per_gas;
            self.next_block_timestamp = next_block_timestamp;
            self.prev_randao_generator = prev_randao_generator;

            true
        } else {
            false
        }
    }

    /// Retrieves the logs that match the provided criteria from mined blocks.
    pub fn get_logs(&self, criteria: LogFilterOptions) -> Result<Vec<LogOutput>, ProviderError> {
        let filter = self.log_filter_from_options(criteria)?;

        let to_block = filter
            .to_block
            .unwrap_or_else(|| self.blockchain.last_block_number());

        let logs = self.blockchain.logs(
            filter.from_block,
            to_block,
            &filter.addresses,
            &filter.normalized_topics,
        )?;

        Ok(logs.iter().map(LogOutput::from).collect())
    }

    /// Installs a filter that collects the hashes of mined blocks, seeded
    /// with the current block's hash.
    pub fn add_block_filter<const IS_SUBSCRIPTION: bool>(&mut self) -> Result<U256, ProviderError> {
        let current_block_hash = *self.blockchain.last_block()?.hash();

        let filter_id = self.next_filter_id();
        self.filters.insert(
            filter_id,
            Filter::new_block_filter(current_block_hash, IS_SUBSCRIPTION),
        );

        Ok(filter_id)
    }

    /// Installs a filter that collects logs matching the provided criteria,
    /// pre-populated with the matching logs of already-mined blocks.
    pub fn add_log_filter<const IS_SUBSCRIPTION: bool>(
        &mut self,
        criteria: LogFilterOptions,
    ) -> Result<U256, ProviderError> {
        let criteria = self.log_filter_from_options(criteria)?;

        let to_block = criteria
            .to_block
            .unwrap_or_else(|| self.blockchain.last_block_number());

        let logs = self
            .blockchain
            .logs(
                criteria.from_block,
                to_block,
                &criteria.addresses,
                &criteria.normalized_topics,
            )?
            .iter()
            .map(LogOutput::from)
            .collect();

        let filter_id = self.next_filter_id();
        self.filters.insert(
            filter_id,
            Filter::new_log_filter(criteria, logs, IS_SUBSCRIPTION),
        );

        Ok(filter_id)
    }

    /// Installs a filter that collects the hashes of transactions accepted
    /// into the mem pool.
    pub fn add_pending_transaction_filter<const IS_SUBSCRIPTION: bool>(&mut self) -> U256 {
        let filter_id = self.next_filter_id();
        self.filters.insert(
            filter_id,
            Filter::new_pending_transaction_filter(IS_SUBSCRIPTION),
        );

        filter_id
    }

    /// Takes the events the filter accumulated since the last poll, if the
    /// filter exists.
    pub fn get_filter_changes(&mut self, filter_id: &U256) -> Option<FilteredEvents> {
        self.filters
            .get_mut(filter_id)
            .map(Filter::take_events)
    }

    /// Takes the logs a log filter accumulated since the last poll. Returns
    /// an error if the filter collects a different kind of event.
    pub fn get_filter_logs(
        &mut self,
        filter_id: &U256,
    ) -> Result<Option<Vec<LogOutput>>, ProviderError> {
        self.filters
            .get_mut(filter_id)
            .map(|filter| {
                filter
                    .take_log_events()
                    .ok_or_else(|| ProviderError::InvalidFilterSubscriptionType {
                        filter_id: *filter_id,
                        expected: SubscriptionType::Logs,
                        actual: filter.data.subscription_type(),
                    })
            })
            .transpose()
    }

    /// Removes the filter with the provided id, reporting whether it existed
    /// as a polled filter.
    pub fn remove_filter(&mut self, filter_id: &U256) -> bool {
        self.remove_filter_impl::<false>(filter_id)
    }

    /// Removes the subscription with the provided id, reporting whether it
    /// existed as a subscription.
    pub fn remove_subscription(&mut self, filter_id: &U256) -> bool {
        self.remove_filter_impl::<true>(filter_id)
    }

    fn remove_filter_impl<const IS_SUBSCRIPTION: bool>(&mut self, filter_id: &U256) -> bool {
        if let Some(filter) = self.filters.get(filter_id) {
            filter.is_subscription == IS_SUBSCRIPTION && self.filters.remove(filter_id).is_some()
        } else {
            false
        }
    }

    /// Executes the provided function in the context of the block, where
    /// `None` means the latest block and the `pending` tag causes a block to
    /// be mined without being committed.
    fn execute_in_block_context<T>(
        &mut self,
        block_spec: Option<&BlockSpec>,
        function: impl FnOnce(&dyn SyncBlockchain, &Arc<dyn SyncBlock>, &ChainState) -> T,
    ) -> Result<T, ProviderError> {
        let block = if let Some(block_spec) = block_spec {
            self.block_by_block_spec(block_spec)?
        } else {
            Some(self.blockchain.last_block()?)
        };

        if let Some(block) = block {
            let block_number = block.header().number;
            let state = self.state_by_block_number(block_number)?;

            Ok(function(&*self.blockchain, &block, &state))
        } else {
            let result = self.mine_pending_block()?;
            let block: Arc<dyn SyncBlock> = Arc::new(result.block);

            Ok(function(&*self.blockchain, &block, &result.state))
        }
    }

    /// Mines a block on top of the last block, applying the provider's
    /// next-block overrides and defaults.
    fn mine_block(
        &mut self,
        mut overrides: HeaderOverrides,
    ) -> Result<MineBlockResultAndState, ProviderError> {
        overrides.base_fee = overrides.base_fee.or(self.next_block_base_fee_per_gas);
        overrides.beneficiary = Some(overrides.beneficiary.unwrap_or(self.beneficiary));
        overrides.gas_limit = Some(
            overrides
                .gas_limit
                .unwrap_or_else(|| self.mem_pool.block_gas_limit().get()),
        );

        if self.hardfork().is_post_merge() {
            overrides.mix_hash = Some(
                overrides
                    .mix_hash
                    .unwrap_or_else(|| self.prev_randao_generator.next_value()),
            );
        }

        let state = self.current_state()?;

        let result = devnode_evm::mine_block(
            &*self.blockchain,
            state,
            &self.mem_pool,
            &*self.executor,
            self.hardfork(),
            overrides,
            self.min_gas_price,
            self.initial_config.mining.mem_pool.order,
            self.block_reward(),
        )?;

        Ok(result)
    }

    /// Resolves the timestamp of the next block and, where the resolution
    /// moves the clock, the new clock offset.
    fn next_block_timestamp(
        &self,
        timestamp_override: Option<u64>,
    ) -> Result<(u64, Option<i64>), ProviderError> {
        let latest_block = self.blockchain.last_block()?;
        let latest_block_header = latest_block.header();

        let current_timestamp =
            i64::try_from(self.timer.since_epoch()).expect("timestamp fits into i64");

        let (mut block_timestamp, mut new_offset) = if let Some(timestamp) = timestamp_override {
            timestamp.checked_sub(latest_block_header.timestamp).ok_or(
                ProviderError::TimestampLowerThanPrevious {
                    proposed: timestamp,
                    previous: latest_block_header.timestamp,
                },
            )?;

            let offset = i64::try_from(timestamp).expect("timestamp fits into i64")
                - current_timestamp;
            (timestamp, Some(offset))
        } else if let Some(next_block_timestamp) = self.next_block_timestamp {
            let offset = i64::try_from(next_block_timestamp).expect("timestamp fits into i64")
                - current_timestamp;
            (next_block_timestamp, Some(offset))
        } else {
            let block_timestamp =
                u64::try_from(current_timestamp + self.block_time_offset_seconds)
                    .expect("blocks cannot be mined before the UNIX epoch");

            (block_timestamp, None)
        };

        let timestamp_needs_increase = block_timestamp == latest_block_header.timestamp
            && !self.allow_blocks_with_same_timestamp;
        if timestamp_needs_increase {
            block_timestamp += 1;
            if new_offset.is_none() {
                new_offset = Some(self.block_time_offset_seconds + 1);
            }
        }

        Ok((block_timestamp, new_offset))
    }

    /// Validates that the transaction can be mined immediately, as automatic
    /// mining cannot queue transactions.
    /// Validates the transaction's chain id and type against the provider's
    /// chain id and hardfork. Legacy transactions without replay protection
    /// carry no chain id and are always accepted.
    fn validate_transaction(
        &self,
        transaction: &transaction::Signed,
    ) -> Result<(), ProviderError> {
        if let Some(chain_id) = transaction.chain_id() {
            let expected = self.chain_id();
            if chain_id != expected {
                return Err(ProviderError::InvalidChainId {
                    expected,
                    actual: chain_id,
                });
            }
        }

        let hardfork = self.hardfork();
        match transaction.transaction_type() {
            transaction::Type::Legacy => (),
            transaction::Type::Eip2930 => {
                if hardfork < Hardfork::Berlin {
                    return Err(ProviderError::UnsupportedAccessListParameter {
                        current_hardfork: hardfork,
                    });
                }
            }
            transaction::Type::Eip1559 => {
                if !hardfork.supports_eip1559() {
                    return Err(ProviderError::UnsupportedEip1559Parameters {
                        current_hardfork: hardfork,
                    });
                }
            }
        }

        Ok(())
    }

    fn validate_auto_mine_transaction(
        &self,
        transaction: &transaction::Signed,
    ) -> Result<(), ProviderError> {
        let next_nonce = self.account_next_nonce(transaction.caller())?;

        match transaction.nonce().cmp(&next_nonce) {
            std::cmp::Ordering::Less => {
                return Err(ProviderError::AutoMineNonceTooLow {
                    expected: next_nonce,
                    actual: transaction.nonce(),
                });
            }
            std::cmp::Ordering::Greater => {
                return Err(ProviderError::AutoMineNonceTooHigh {
                    expected: next_nonce,
                    actual: transaction.nonce(),
                });
            }
            std::cmp::Ordering::Equal => (),
        }

        let max_priority_fee_per_gas = transaction
            .max_priority_fee_per_gas()
            .unwrap_or_else(|| transaction.gas_price());

        if *max_priority_fee_per_gas < self.min_gas_price {
            return Err(ProviderError::AutoMinePriorityFeeTooLow {
                expected: self.min_gas_price,
                actual: *max_priority_fee_per_gas,
            });
        }

        if let Some(next_block_base_fee) = self.next_block_base_fee_per_gas()? {
            if let Some(max_fee_per_gas) = transaction.max_fee_per_gas() {
                if *max_fee_per_gas < next_block_base_fee {
                    return Err(ProviderError::AutoMineMaxFeePerGasTooLow {
                        expected: next_block_base_fee,
                        actual: *max_fee_per_gas,
                    });
                }
            } else {
                let gas_price = *transaction.gas_price();
                if gas_price < next_block_base_fee {
                    return Err(ProviderError::AutoMineGasPriceTooLow {
                        expected: next_block_base_fee,
                        actual: gas_price,
                    });
                }
            }
        }

        Ok(())
    }

    /// Mines blocks until the transaction is included, then drains the
    /// remaining pending transactions.
    fn mine_until_included(
        &mut self,
        transaction_hash: B256,
        mining_results: &mut Vec<MineBlockResult>,
    ) -> Result<(), ProviderError> {
        loop {
            let result = self.mine_and_commit_block(HeaderOverrides::default())?;
            let included = result
                .block
                .transactions()
                .iter()
                .any(|transaction| transaction.transaction_hash() == &transaction_hash);

            mining_results.push(result);

            if included {
                break;
            }
        }

        while self.mem_pool.has_pending_transactions() {
            mining_results.push(self.mine_and_commit_block(HeaderOverrides::default())?);
        }

        Ok(())
    }

    fn notify_subscribers_about_pending_transaction(&mut self, transaction_hash: &B256) {
        for (filter_id, filter) in self.filters.iter_mut() {
            if let FilterData::NewPendingTransactions(events) = &mut filter.data {
                if filter.is_subscription {
                    (self.subscriber_callback)(SubscriptionEvent {
                        filter_id: *filter_id,
                        result: SubscriptionEventData::NewPendingTransactions(*transaction_hash),
                    });
                } else {
                    events.push(*transaction_hash);
                }
            }
        }
    }

    fn notify_subscribers_about_mined_block(
        &mut self,
        block: &Arc<dyn SyncBlock>,
    ) -> Result<(), ProviderError> {
        for (filter_id, filter) in self.filters.iter_mut() {
            match &mut filter.data {
                FilterData::Logs { criteria, logs } => {
                    // The header's bloom rules out most blocks without
                    // touching the receipts.
                    if !bloom_contains_log_filter(&block.header().logs_bloom, criteria) {
                        continue;
                    }

                    let receipts = block.transaction_receipts()?;
                    let new_logs = filter_logs(
                        receipts
                            .iter()
                            .flat_map(|receipt| receipt.inner.inner.logs()),
                        criteria,
                    );

                    if filter.is_subscription {
                        (self.subscriber_callback)(SubscriptionEvent {
                            filter_id: *filter_id,
                            result: SubscriptionEventData::Logs(new_logs),
                        });
                    } else {
                        logs.extend(new_logs);
                    }
                }
                FilterData::NewHeads(block_hashes) => {
                    if filter.is_subscription {
                        (self.subscriber_callback)(SubscriptionEvent {
                            filter_id: *filter_id,
                            result: SubscriptionEventData::NewHeads(block.clone()),
                        });
                    } else {
                        block_hashes.push(*block.hash());
                    }
                }
                FilterData::NewPendingTransactions(_) => (),
            }
        }

        self.filters.retain(|_, filter| !filter.has_expired());

        Ok(())
    }

    /// Converts RPC-style filter criteria into normalized form, resolving
    /// block specs against the blockchain.
    fn log_filter_from_options(
        &self,
        criteria: LogFilterOptions,
    ) -> Result<LogFilter, ProviderError> {
        let LogFilterOptions {
            from_block,
            to_block,
            block_hash,
            address,
            topics,
        } = criteria;

        let (from_block, to_block) = if let Some(block_hash) = block_hash {
            if from_block.is_some() || to_block.is_some() {
                return Err(ProviderError::InvalidArgument(
                    "blockHash is mutually exclusive with fromBlock/toBlock".to_string(),
                ));
            }

            let block = self
                .blockchain
                .block_by_hash(&block_hash)?
                .ok_or_else(|| {
                    ProviderError::InvalidArgument("blockHash cannot be found".to_string())
                })?;

            let block_number = block.header().number;
            (block_number, Some(block_number))
        } else {
            let from_block = self
                .resolve_filter_block_spec(from_block.as_ref())?
                .unwrap_or_else(|| self.blockchain.last_block_number());

            let to_block = self.resolve_filter_block_spec(to_block.as_ref())?;

            (from_block, to_block)
        };

        let addresses = address.map_or_else(HashSet::default, |addresses| match addresses {
            OneOrMore::One(address) => std::iter::once(address).collect(),
            OneOrMore::Many(addresses) => addresses.into_iter().collect(),
        });

        let normalized_topics = topics.map_or_else(Vec::new, |topics| {
            topics
                .into_iter()
                .map(|topic| {
                    topic.map(|topic| match topic {
                        OneOrMore::One(topic) => vec![topic],
                        OneOrMore::Many(topics) => topics,
                    })
                })
                .collect()
        });

        Ok(LogFilter {
            from_block,
            to_block,
            addresses,
            normalized_topics,
        })
    }

    /// Resolves a filter block spec to a block number, where `None` means
    /// "track the latest block".
    fn resolve_filter_block_spec(
        &self,
        block_spec: Option<&BlockSpec>,
    ) -> Result<Option<u64>, ProviderError> {
        match block_spec {
            Some(BlockSpec::Number(block_number))
            | Some(BlockSpec::Eip1898(Eip1898BlockSpec::Number { block_number })) => {
                Ok(Some(*block_number))
            }
            Some(BlockSpec::Tag(BlockTag::Earliest)) => Ok(Some(0)),
            Some(BlockSpec::Eip1898(Eip1898BlockSpec::Hash { block_hash, .. })) => {
                let block = self
                    .blockchain
                    .block_by_hash(block_hash)?
                    .ok_or_else(|| {
                        ProviderError::InvalidArgument("blockHash cannot be found".to_string())
                    })?;

                Ok(Some(block.header().number))
            }
            Some(BlockSpec::Tag(_)) | None => Ok(None),
        }
    }

    fn require_post_merge_hardfork(&self, block_spec: &BlockSpec) -> Result<(), ProviderError> {
        if self.hardfork().is_post_merge() {
            Ok(())
        } else {
            Err(ProviderError::InvalidArgument(format!(
                "The '{block_spec}' block tag is not allowed in pre-merge hardforks"
            )))
        }
    }

    fn next_filter_id(&mut self) -> U256 {
        self.last_filter_id = self
            .last_filter_id
            .checked_add(U256::from(1))
            .expect("filter id starts at zero, so it'll never overflow for U256");

        self.last_filter_id
    }

    fn block_reward(&self) -> U256 {
        if self.hardfork().is_post_merge() {
            U256::ZERO
        } else {
            U256::from(PRE_MERGE_BLOCK_REWARD)
        }
    }

    /// The state after the last block. States of previously mined blocks are
    /// retained, so this is a cheap lookup.
    fn current_state(&self) -> Result<ChainState, ProviderError> {
        self.state_by_block_number(self.blockchain.last_block_number())
    }

    fn state_by_block_number(&self, block_number: u64) -> Result<ChainState, ProviderError> {
        if let Some(state) = self.block_number_to_state.get(&block_number) {
            Ok(state.clone())
        } else {
            Ok(self.blockchain.state_at_block_number(block_number)?)
        }
    }

    /// Replaces the state associated with the last block, after a test-only
    /// state mutation.
    fn replace_current_state(&mut self, state: ChainState) {
        let block_number = self.blockchain.last_block_number();
        self.block_number_to_state = self.block_number_to_state.insert(block_number, state);
    }
}

/// A simulation context for calls and gas estimations. Fee checks don't apply
/// to simulations, so the base fee is unset.
fn simulation_context(header: &BlockHeader) -> ExecutionContext {
    ExecutionContext {
        coinbase: header.beneficiary,
        block_number: header.number,
        block_timestamp: header.timestamp,
        base_fee: None,
        block_gas_limit: header.gas_limit,
    }
}

struct BlockchainAndState {
    blockchain: Box<dyn SyncBlockchain>,
    fork_metadata: Option<ForkMetadata>,
    state: ChainState,
    block_time_offset_seconds: i64,
    next_block_base_fee_per_gas: Option<u128>,
    prev_randao_generator: RandomHashGenerator,
}

fn create_blockchain_and_state(
    runtime: runtime::Handle,
    config: &ProviderConfig,
    timer: &impl TimeSinceEpoch,
    genesis_accounts: HashMap<Address, AccountInfo>,
) -> Result<BlockchainAndState, CreationError> {
    let mut prev_randao_generator = RandomHashGenerator::with_seed(PREV_RANDAO_SEED);

    if let Some(fork_config) = &config.fork {
        let http_headers = fork_config
            .http_headers
            .as_ref()
            .map(HeaderMap::try_from)
            .transpose()
            .map_err(|error| CreationError::InvalidHttpHeaders(error.to_string()))?;

        let rpc_client = Arc::new(RpcClient::new(
            &fork_config.url,
            config.cache_dir.clone(),
            http_headers,
        )?);

        let state_root_generator =
            Arc::new(Mutex::new(RandomHashGenerator::with_seed(STATE_ROOT_SEED)));

        let blockchain = tokio::task::block_in_place(|| {
            runtime.block_on(ForkedBlockchain::new(
                runtime.clone(),
                rpc_client,
                config.hardfork,
                fork_config.block_number,
                state_root_generator,
            ))
        })?;

        let fork_block_number = blockchain.fork_block_number();

        // At creation, the last block is the fork block itself.
        let fork_block = blockchain.last_block()?;
        let fork_block_header = fork_block.header();

        let mut state = blockchain.state_at_block_number(fork_block_number)?;
        for (address, account_info) in genesis_accounts {
            state
                .insert_account(address, account_info)
                .map_err(BlockchainError::State)?;
        }

        let current_timestamp =
            i64::try_from(timer.since_epoch()).expect("timestamp fits into i64");
        let block_time_offset_seconds =
            i64::try_from(fork_block_header.timestamp).expect("timestamp fits into i64")
                - current_timestamp;

        let next_block_base_fee_per_gas = if config.hardfork.supports_eip1559() {
            config.initial_base_fee_per_gas.or_else(|| {
                fork_block_header
                    .base_fee_per_gas
                    .is_none()
                    .then_some(INITIAL_BASE_FEE)
            })
        } else {
            None
        };

        let fork_metadata = ForkMetadata {
            chain_id: blockchain.chain_id(),
            fork_block_number,
            fork_block_hash: *fork_block.hash(),
        };

        Ok(BlockchainAndState {
            blockchain: Box::new(blockchain),
            fork_metadata: Some(fork_metadata),
            state,
            block_time_offset_seconds,
            next_block_base_fee_per_gas,
            prev_randao_generator,
        })
    } else {
        let block_time_offset_seconds = if let Some(initial_date) = config.initial_date {
            let initial_timestamp = i64::try_from(
                initial_date
                    .duration_since(UNIX_EPOCH)
                    .map_err(|_error| CreationError::InvalidInitialDate(initial_date))?
                    .as_secs(),
            )
            .expect("timestamp fits into i64");

            initial_timestamp - i64::try_from(timer.since_epoch()).expect("timestamp fits into i64")
        } else {
            0
        };

        let mut genesis_diff = StateDiff::default();
        for (address, account_info) in &genesis_accounts {
            genesis_diff.apply_account_change(*address, account_info.clone());
        }

        let state = TrieState::with_accounts(&genesis_accounts);

        let mix_hash = if config.hardfork.is_post_merge() {
            Some(prev_randao_generator.generate_next())
        } else {
            None
        };

        let genesis_timestamp = u64::try_from(
            i64::try_from(timer.since_epoch()).expect("timestamp fits into i64")
                + block_time_offset_seconds,
        )
        .expect("the initial date cannot precede the UNIX epoch");

        let withdrawals = if config.hardfork >= Hardfork::Shanghai {
            Some(Vec::new())
        } else {
            None
        };

        let partial_header = PartialHeader::new(
            config.hardfork,
            HeaderOverrides {
                gas_limit: Some(config.block_gas_limit.get()),
                timestamp: Some(genesis_timestamp),
                mix_hash,
                base_fee: config.initial_base_fee_per_gas,
                state_root: Some(
                    state
                        .state_root()
                        .map_err(BlockchainError::State)?,
                ),
                ..HeaderOverrides::default()
            },
            None,
            withdrawals.as_ref(),
        );

        let genesis_block = LocalBlock::empty(config.hardfork, partial_header);

        // The first mined block inherits the initial base fee instead of
        // deriving a lowered one from the empty genesis block.
        let next_block_base_fee_per_gas = if config.hardfork.supports_eip1559() {
            Some(config.initial_base_fee_per_gas.unwrap_or(INITIAL_BASE_FEE))
        } else {
            None
        };

        let blockchain =
            LocalBlockchain::new(genesis_block, genesis_diff, config.chain_id, config.hardfork)?;

        Ok(BlockchainAndState {
            blockchain: Box::new(blockchain),
            fork_metadata: None,
            state: ChainState::Local(state),
            block_time_offset_seconds,
            next_block_base_fee_per_gas,
            prev_randao_generator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ProviderTestFixture;

    #[test]
    fn send_transaction_automines_and_drains_the_pool() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;

        let transaction = fixture.signed_dummy_transaction(0, 0)?;
        let transaction_hash = *transaction.transaction_hash();

        let result = fixture.provider_data.send_transaction(transaction)?;

        assert_eq!(result.transaction_hash, transaction_hash);
        assert_eq!(result.mining_results.len(), 1);
        assert!(matches!(
            result.transaction_result(),
            Some(ExecutionResult::Success { .. })
        ));
        assert_eq!(fixture.provider_data.last_block_number(), 1);
        assert!(!fixture.provider_data.mem_pool_has_transactions());

        Ok(())
    }

    #[test]
    fn send_transaction_with_automining_rejects_nonce_gaps() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;

        let transaction = fixture.signed_dummy_transaction(0, 2)?;

        let error = fixture
            .provider_data
            .send_transaction(transaction)
            .expect_err("the nonce skips ahead of the account nonce");

        assert!(matches!(
            error,
            ProviderError::AutoMineNonceTooHigh {
                expected: 0,
                actual: 2
            }
        ));

        Ok(())
    }

    #[test]
    fn queued_transaction_is_mined_once_the_gap_closes() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;
        fixture.provider_data.set_auto_mining(false);

        let second = fixture.signed_dummy_transaction(0, 1)?;
        let first = fixture.signed_dummy_transaction(0, 0)?;

        fixture.provider_data.send_transaction(second)?;
        fixture.provider_data.send_transaction(first)?;

        let results = fixture.provider_data.mine_and_commit_blocks(1, 1)?;
        assert_eq!(results[0].block.transactions().len(), 2);

        Ok(())
    }

    #[test]
    fn snapshot_and_revert_restore_chain_and_pool() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;
        fixture.provider_data.set_auto_mining(false);

        let sender = fixture.account(0);
        let balance_before = fixture.provider_data.balance(sender, None)?;

        let snapshot_id = fixture.provider_data.make_snapshot();

        let transaction = fixture.signed_dummy_transaction(0, 0)?;
        fixture.provider_data.send_transaction(transaction)?;
        fixture.provider_data.mine_and_commit_blocks(2, 1)?;

        assert_eq!(fixture.provider_data.last_block_number(), 2);

        assert!(fixture.provider_data.revert_to_snapshot(snapshot_id));

        assert_eq!(fixture.provider_data.last_block_number(), 0);
        assert_eq!(fixture.provider_data.balance(sender, None)?, balance_before);
        assert!(!fixture.provider_data.mem_pool_has_transactions());

        // A snapshot id is consumed by the revert.
        assert!(!fixture.provider_data.revert_to_snapshot(snapshot_id));

        Ok(())
    }

    #[test]
    fn reverting_invalidates_later_snapshots() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;

        let first = fixture.provider_data.make_snapshot();
        fixture.provider_data.mine_and_commit_blocks(1, 1)?;
        let second = fixture.provider_data.make_snapshot();

        assert!(fixture.provider_data.revert_to_snapshot(first));
        assert!(!fixture.provider_data.revert_to_snapshot(second));

        Ok(())
    }

    #[test]
    fn drop_transaction_demotes_dependent_transactions() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;
        fixture.provider_data.set_auto_mining(false);

        let first = fixture.signed_dummy_transaction(0, 0)?;
        let second = fixture.signed_dummy_transaction(0, 1)?;
        let first_hash = *first.transaction_hash();

        fixture.provider_data.send_transaction(first)?;
        fixture.provider_data.send_transaction(second)?;

        assert!(fixture.provider_data.drop_transaction(first_hash)?);

        // The remaining transaction has a nonce gap, so nothing is mined.
        let results = fixture.provider_data.mine_and_commit_blocks(1, 1)?;
        assert_eq!(results[0].block.transactions().len(), 0);

        Ok(())
    }

    #[test]
    fn drop_transaction_rejects_mined_transactions() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;

        let transaction = fixture.signed_dummy_transaction(0, 0)?;
        let transaction_hash = *transaction.transaction_hash();
        fixture.provider_data.send_transaction(transaction)?;

        let error = fixture
            .provider_data
            .drop_transaction(transaction_hash)
            .expect_err("the transaction was mined");

        assert!(matches!(
            error,
            ProviderError::InvalidDropTransactionHash(hash) if hash == transaction_hash
        ));

        Ok(())
    }

    #[test]
    fn impersonated_sender_signs_with_a_fake_signature() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;

        let impersonated = Address::random();

        let request = fixture.dummy_transaction_request_for_sender(impersonated, 0);
        let error = fixture
            .provider_data
            .sign_transaction_request(request)
            .expect_err("the sender is not an owned account");
        assert!(matches!(
            error,
            ProviderError::UnknownAddress { address } if address == impersonated
        ));

        fixture.provider_data.impersonate_account(impersonated);

        let request = fixture.dummy_transaction_request_for_sender(impersonated, 0);
        let transaction = fixture.provider_data.sign_transaction_request(request)?;
        assert!(transaction.is_fake());
        assert_eq!(transaction.caller(), &impersonated);

        assert!(fixture.provider_data.stop_impersonating_account(impersonated));
        assert!(!fixture.provider_data.stop_impersonating_account(impersonated));

        Ok(())
    }

    #[test]
    fn set_nonce_is_rejected_while_the_pool_is_not_empty() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;
        fixture.provider_data.set_auto_mining(false);

        let sender = fixture.account(0);
        let transaction = fixture.signed_dummy_transaction(0, 0)?;
        fixture.provider_data.send_transaction(transaction)?;

        let error = fixture
            .provider_data
            .set_nonce(sender, 5)
            .expect_err("the pool holds a transaction");

        assert!(matches!(
            error,
            ProviderError::SetAccountNonceWithPendingTransactions
        ));

        Ok(())
    }

    #[test]
    fn set_balance_affects_later_queries_but_not_history() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;

        let address = Address::random();
        fixture
            .provider_data
            .set_balance(address, U256::from(100u64))?;

        assert_eq!(
            fixture.provider_data.balance(address, None)?,
            U256::from(100u64)
        );

        fixture.provider_data.mine_and_commit_blocks(1, 1)?;
        assert_eq!(
            fixture.provider_data.balance(address, None)?,
            U256::from(100u64)
        );

        Ok(())
    }

    #[test]
    fn timestamp_overrides_are_validated_against_the_parent() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;

        let parent_timestamp = fixture.provider_data.last_block()?.header().timestamp;

        let error = fixture
            .provider_data
            .set_next_block_timestamp(parent_timestamp - 1)
            .expect_err("the timestamp precedes the parent's");
        assert!(matches!(
            error,
            ProviderError::TimestampLowerThanPrevious { .. }
        ));

        let error = fixture
            .provider_data
            .set_next_block_timestamp(parent_timestamp)
            .expect_err("equal timestamps are not allowed by default");
        assert!(matches!(
            error,
            ProviderError::TimestampEqualsPrevious { .. }
        ));

        let proposed = parent_timestamp + 3_600;
        assert_eq!(
            fixture.provider_data.set_next_block_timestamp(proposed)?,
            proposed
        );

        let result = fixture.provider_data.mine_and_commit_blocks(1, 1)?;
        assert_eq!(result[0].block.header().timestamp, proposed);

        Ok(())
    }

    #[test]
    fn next_block_base_fee_override_is_consumed_by_the_next_block() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;

        fixture
            .provider_data
            .set_next_block_base_fee_per_gas(42_000_000_000)?;

        // The override applies to the very next mined block, regardless of
        // what triggers the mining.
        assert!(fixture.provider_data.interval_mine()?);
        let block = fixture.provider_data.last_block()?;
        assert_eq!(block.header().base_fee_per_gas, Some(42_000_000_000));

        // It only applies once.
        fixture.provider_data.mine_and_commit_blocks(1, 1)?;
        let block = fixture.provider_data.last_block()?;
        assert_ne!(block.header().base_fee_per_gas, Some(42_000_000_000));

        Ok(())
    }

    #[test]
    fn estimate_gas_returns_the_cost_of_a_plain_transfer() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;

        let transaction = fixture.fake_transfer_transaction(0, 0);
        let estimation = fixture.provider_data.estimate_gas(transaction, None)?;

        // A transfer with calldata-free input costs exactly the intrinsic
        // gas, which the estimation bumps by one.
        assert_eq!(estimation, 21_001);

        Ok(())
    }

    #[test]
    fn pending_block_context_includes_pool_transactions() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;
        fixture.provider_data.set_auto_mining(false);

        let sender = fixture.account(0);
        let transaction = fixture.signed_dummy_transaction(0, 0)?;
        fixture.provider_data.send_transaction(transaction)?;

        let latest_nonce = fixture
            .provider_data
            .get_transaction_count(sender, Some(&BlockSpec::latest()))?;
        let pending_nonce = fixture
            .provider_data
            .get_transaction_count(sender, Some(&BlockSpec::pending()))?;

        assert_eq!(latest_nonce, 0);
        assert_eq!(pending_nonce, 1);

        // The pending block is not committed.
        assert_eq!(fixture.provider_data.last_block_number(), 0);

        Ok(())
    }

    #[test]
    fn filters_accumulate_block_hashes_until_polled() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;

        let filter_id = fixture.provider_data.add_block_filter::<false>()?;
        assert_eq!(filter_id, U256::from(1));

        let results = fixture.provider_data.mine_and_commit_blocks(2, 1)?;

        let events = fixture
            .provider_data
            .get_filter_changes(&filter_id)
            .expect("the filter exists");

        let expected: Vec<B256> = std::iter::once(fixture.genesis_block_hash)
            .chain(results.iter().map(|result| *result.block.hash()))
            .collect();
        assert_eq!(events, FilteredEvents::NewHeads(expected));

        // Polling drains the accumulated hashes.
        let events = fixture
            .provider_data
            .get_filter_changes(&filter_id)
            .expect("the filter exists");
        assert_eq!(events, FilteredEvents::NewHeads(Vec::new()));

        assert!(fixture.provider_data.remove_filter(&filter_id));

        Ok(())
    }

    #[test]
    fn transaction_by_hash_reports_pending_and_mined_state() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;
        fixture.provider_data.set_auto_mining(false);

        let transaction = fixture.signed_dummy_transaction(0, 0)?;
        let transaction_hash = *transaction.transaction_hash();
        fixture.provider_data.send_transaction(transaction)?;

        let pending = fixture
            .provider_data
            .transaction_by_hash(&transaction_hash)?
            .expect("the transaction is in the pool");
        assert!(pending.is_pending);
        assert!(pending.block_data.is_none());

        fixture.provider_data.mine_and_commit_blocks(1, 1)?;

        let mined = fixture
            .provider_data
            .transaction_by_hash(&transaction_hash)?
            .expect("the transaction was mined");
        assert!(!mined.is_pending);

        let block_data = mined.block_data.expect("the transaction was mined");
        assert_eq!(block_data.transaction_index, 0);
        assert_eq!(block_data.block.header().number, 1);

        Ok(())
    }
}
