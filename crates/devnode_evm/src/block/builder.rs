use std::time::{SystemTime, UNIX_EPOCH};

use devnode_eth::{
    block::{HeaderOverrides, PartialHeader},
    log::{logs_to_bloom, ExecutionLog},
    receipt::{
        execution::{Eip2718, Eip658},
        Execution, TransactionReceipt,
    },
    transaction,
    trie::{ordered_trie_root, KECCAK_NULL_RLP},
    withdrawal::Withdrawal,
    Address, Bloom, Hardfork, U256,
};

use super::LocalBlock;
use crate::{
    blockchain::{BlockchainError, SyncBlockchain},
    executor::{
        ExecutionContext, ExecutionResult, ExecutorError, SyncExecutor, TransactionError,
    },
    miner::MineBlockResultAndState,
    state::{AccountModifierFn, ChainState, StateCommit as _, StateDebug as _, StateDiff, StateError},
};

/// An error caused during construction of a block builder.
#[derive(Debug, thiserror::Error)]
pub enum BlockBuilderCreationError {
    /// Blockchain error
    #[error(transparent)]
    Blockchain(#[from] BlockchainError),
    /// Missing withdrawals for post-Shanghai blockchain
    #[error("Missing withdrawals. The chain expects withdrawals to be present post-Shanghai hardfork.")]
    MissingWithdrawals,
    /// Unsupported hardfork. Hardforks older than Byzantium are not supported
    #[error("Unsupported hardfork: {0:?}. Hardforks older than Byzantium are not supported.")]
    UnsupportedHardfork(Hardfork),
}

/// An error caused while adding a transaction to a block.
#[derive(Debug, thiserror::Error)]
pub enum BlockTransactionError {
    /// Transaction has a higher gas limit than the block's remaining gas
    #[error("Transaction has a higher gas limit than the remaining gas in the block")]
    ExceedsBlockGasLimit,
    /// Transaction is invalid
    #[error(transparent)]
    Invalid(#[from] TransactionError),
    /// State error
    #[error(transparent)]
    State(#[from] StateError),
}

impl From<ExecutorError> for BlockTransactionError {
    fn from(error: ExecutorError) -> Self {
        match error {
            ExecutorError::Transaction(error) => Self::Invalid(error),
            ExecutorError::State(error) => Self::State(error),
        }
    }
}

/// A builder for constructing the next block on the provided blockchain.
/// Transactions are executed and accumulated one at a time; finalizing
/// produces the block and the post-execution state.
#[derive(Debug)]
pub struct BlockBuilder {
    header: PartialHeader,
    parent_gas_limit: Option<u64>,
    receipts: Vec<TransactionReceipt<ExecutionLog>>,
    state: ChainState,
    state_diff: StateDiff,
    transactions: Vec<transaction::Signed>,
    transaction_results: Vec<ExecutionResult>,
    withdrawals: Option<Vec<Withdrawal>>,
}

impl BlockBuilder {
    /// Creates an instance of the builder, building on top of the
    /// blockchain's last block.
    pub fn new(
        blockchain: &dyn SyncBlockchain,
        state: ChainState,
        hardfork: Hardfork,
        mut overrides: HeaderOverrides,
        withdrawals: Option<Vec<Withdrawal>>,
    ) -> Result<Self, BlockBuilderCreationError> {
        if hardfork < Hardfork::Byzantium {
            return Err(BlockBuilderCreationError::UnsupportedHardfork(hardfork));
        }

        if hardfork >= Hardfork::Shanghai && withdrawals.is_none() {
            return Err(BlockBuilderCreationError::MissingWithdrawals);
        }

        let parent_block = blockchain.last_block()?;
        let parent_header = parent_block.header();

        let parent_gas_limit = if overrides.gas_limit.is_none() {
            Some(parent_header.gas_limit)
        } else {
            None
        };

        overrides.parent_hash = Some(*parent_block.hash());

        let header = PartialHeader::new(hardfork, overrides, Some(parent_header), withdrawals.as_ref());

        Ok(Self {
            header,
            parent_gas_limit,
            receipts: Vec::new(),
            state,
            state_diff: StateDiff::default(),
            transactions: Vec::new(),
            transaction_results: Vec::new(),
            withdrawals,
        })
    }

    /// Retrieves the header of the block builder.
    pub fn header(&self) -> &PartialHeader {
        &self.header
    }

    /// Retrieves the amount of gas used in the block, so far.
    pub fn gas_used(&self) -> u64 {
        self.header.gas_used
    }

    /// Retrieves the amount of gas left in the block.
    pub fn gas_remaining(&self) -> u64 {
        self.header.gas_limit - self.gas_used()
    }

    /// Executes the transaction and adds it to the block, or returns an error
    /// if the transaction is invalid.
    pub fn add_transaction(
        &mut self,
        executor: &dyn SyncExecutor,
        transaction: transaction::Signed,
    ) -> Result<(), BlockTransactionError> {
        // The transaction's gas limit cannot be greater than the remaining
        // gas in the block
        if transaction.gas_limit() > self.gas_remaining() {
            return Err(BlockTransactionError::ExceedsBlockGasLimit);
        }

        let context = ExecutionContext {
            coinbase: self.header.beneficiary,
            block_number: self.header.number,
            block_timestamp: self.header.timestamp,
            base_fee: self.header.base_fee,
            block_gas_limit: self.header.gas_limit,
        };

        let (result, state_diff) = executor.execute(&self.state, &context, &transaction)?;

        self.state_diff.apply_diff(state_diff.clone());
        self.state.commit(state_diff);

        self.header.gas_used += result.gas_used();

        let execution_receipt = self.build_execution_receipt(&transaction, &result);
        let receipt = TransactionReceipt::new(
            execution_receipt,
            &transaction,
            self.transactions.len() as u64,
            result.gas_used(),
            self.header.base_fee.unwrap_or(0),
        );

        self.receipts.push(receipt);
        self.transactions.push(transaction);
        self.transaction_results.push(result);

        Ok(())
    }

    /// Finalizes the block, applying rewards to the state.
    pub fn finalize(
        mut self,
        rewards: Vec<(Address, U256)>,
    ) -> Result<MineBlockResultAndState, StateError> {
        for (address, reward) in rewards {
            if reward > U256::ZERO {
                let account_info = self.state.modify_account(
                    address,
                    AccountModifierFn::new(Box::new(move |balance, _nonce, _code| {
                        *balance += reward;
                    })),
                )?;

                self.state_diff.apply_account_change(address, account_info);
            }
        }

        if let Some(gas_limit) = self.parent_gas_limit {
            self.header.gas_limit = gas_limit;
        }

        self.header.logs_bloom = {
            let mut logs_bloom = Bloom::ZERO;
            self.receipts.iter().for_each(|receipt| {
                logs_bloom.accrue_bloom(receipt.inner.logs_bloom());
            });
            logs_bloom
        };

        self.header.receipts_root =
            ordered_trie_root(self.receipts.iter().map(alloy_rlp::encode));

        // Only set the state root if it wasn't specified during construction
        if self.header.state_root == KECCAK_NULL_RLP {
            self.header.state_root = self.state.state_root()?;
        }

        // Only set the timestamp if it wasn't specified during construction
        if self.header.timestamp == 0 {
            self.header.timestamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |duration| duration.as_secs());
        }

        let block = LocalBlock::new(
            self.header,
            self.transactions,
            self.receipts,
            self.withdrawals,
        );

        Ok(MineBlockResultAndState {
            block,
            state: self.state,
            state_diff: self.state_diff,
            transaction_results: self.transaction_results,
        })
    }

    fn build_execution_receipt(
        &self,
        transaction: &transaction::Signed,
        result: &ExecutionResult,
    ) -> Execution<ExecutionLog> {
        let logs = result.logs().to_vec();
        let logs_bloom = logs_to_bloom(&logs);

        match transaction.transaction_type() {
            transaction::Type::Legacy => Execution::Eip658(Eip658 {
                status: result.is_success(),
                cumulative_gas_used: self.header.gas_used,
                logs_bloom,
                logs,
            }),
            transaction_type => Execution::Eip2718(Eip2718 {
                status: result.is_success(),
                cumulative_gas_used: self.header.gas_used,
                logs_bloom,
                logs,
                transaction_type,
            }),
        }
    }
}
