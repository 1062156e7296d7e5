use std::{cmp::Ordering, sync::Arc};

use devnode_eth::{
    block::{calculate_next_base_fee_per_gas, BaseFeeParams, HeaderOverrides},
    transaction, Address, Hardfork, U256,
};
use serde::{Deserialize, Serialize};

use crate::{
    block::{BlockBuilder, BlockBuilderCreationError, BlockTransactionError, LocalBlock, SyncBlock},
    blockchain::{BlockchainError, SyncBlockchain},
    executor::{ExecutionResult, SyncExecutor, TransactionError},
    mempool::{MemPool, OrderedTransaction},
    state::{ChainState, State as _, StateDiff, StateError},
};

/// The result of mining a block, including the state. This result needs to be
/// inserted into the blockchain to be persistent.
#[derive(Debug)]
pub struct MineBlockResultAndState {
    /// Mined block
    pub block: LocalBlock,
    /// State after mining the block
    pub state: ChainState,
    /// State diff applied by the block
    pub state_diff: StateDiff,
    /// Transaction results
    pub transaction_results: Vec<ExecutionResult>,
}

/// The result of mining a block, after it has been committed to the
/// blockchain.
#[derive(Clone, Debug)]
pub struct MineBlockResult {
    /// Mined block
    pub block: Arc<dyn SyncBlock>,
    /// Transaction results
    pub transaction_results: Vec<ExecutionResult>,
}

/// The ordering in which the mem pool's transactions are included in a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MineOrdering {
    /// Insert transactions in the order they arrived in the mem pool.
    Fifo,
    /// Insert transactions by decreasing miner fee, using arrival order as a
    /// tie breaker.
    Priority,
}

/// An error that occurred while mining a block.
#[derive(Debug, thiserror::Error)]
pub enum MineBlockError {
    /// An error that occurred while constructing a block builder.
    #[error(transparent)]
    BlockBuilderCreation(#[from] BlockBuilderCreationError),
    /// An error that occurred while executing a transaction.
    #[error(transparent)]
    BlockTransaction(#[from] BlockTransactionError),
    /// An error that occurred while finalizing a block.
    #[error(transparent)]
    State(#[from] StateError),
}

/// Mines a block using as many transactions as can fit in it.
#[allow(clippy::too_many_arguments)]
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
pub fn mine_block(
    blockchain: &dyn SyncBlockchain,
    state: ChainState,
    mem_pool: &MemPool,
    executor: &dyn SyncExecutor,
    hardfork: Hardfork,
    overrides: HeaderOverrides,
    min_gas_price: u128,
    mine_ordering: MineOrdering,
    reward: U256,
) -> Result<MineBlockResultAndState, MineBlockError> {
    let withdrawals = if hardfork >= Hardfork::Shanghai {
        Some(Vec::new())
    } else {
        None
    };

    let mut block_builder = BlockBuilder::new(blockchain, state, hardfork, overrides, withdrawals)?;

    let mut pending_transactions = {
        type Comparator = Box<dyn Fn(&OrderedTransaction, &OrderedTransaction) -> Ordering>;

        let comparator: Comparator = match mine_ordering {
            MineOrdering::Fifo => Box::new(first_in_first_out_comparator),
            MineOrdering::Priority => {
                let base_fee = block_builder.header().base_fee;
                Box::new(move |lhs, rhs| priority_comparator(lhs, rhs, base_fee))
            }
        };

        mem_pool.iter(comparator)
    };

    while let Some(transaction) = pending_transactions.next() {
        if *transaction.gas_price() < min_gas_price {
            pending_transactions.remove_caller(transaction.caller());
            continue;
        }

        let caller = *transaction.caller();
        match block_builder.add_transaction(executor, transaction) {
            Err(
                BlockTransactionError::ExceedsBlockGasLimit
                | BlockTransactionError::Invalid(TransactionError::GasPriceLessThanBasefee),
            ) => {
                pending_transactions.remove_caller(&caller);
            }
            Err(error) => return Err(MineBlockError::BlockTransaction(error)),
            Ok(()) => (),
        }
    }

    let beneficiary = block_builder.header().beneficiary;

    block_builder
        .finalize(vec![(beneficiary, reward)])
        .map_err(MineBlockError::State)
}

/// An error that occurred while mining a block with a single transaction.
#[derive(Debug, thiserror::Error)]
pub enum MineTransactionError {
    /// An error that occurred while constructing a block builder.
    #[error(transparent)]
    BlockBuilderCreation(#[from] BlockBuilderCreationError),
    /// An error that occurred while executing the transaction.
    #[error(transparent)]
    BlockTransaction(#[from] BlockTransactionError),
    /// An error that occurred while retrieving the parent block.
    #[error(transparent)]
    Blockchain(#[from] BlockchainError),
    /// The transaction's gas price is lower than the next block's base fee.
    #[error("Transaction gasPrice ({actual}) is too low for the next block, which has a baseFeePerGas of {expected}")]
    GasPriceTooLow {
        /// The minimum gas price
        expected: u128,
        /// The transaction's gas price
        actual: u128,
    },
    /// The transaction's max fee per gas is lower than the next block's base
    /// fee.
    #[error("Transaction maxFeePerGas ({actual}) is too low for the next block, which has a baseFeePerGas of {expected}")]
    MaxFeePerGasTooLow {
        /// The minimum max fee per gas
        expected: u128,
        /// The transaction's max fee per gas
        actual: u128,
    },
    /// The transaction nonce is too high.
    #[error("Nonce too high. Expected nonce to be {expected} but got {actual}. Note that transactions can't be queued when automining.")]
    NonceTooHigh {
        /// The sender's next nonce
        expected: u64,
        /// The transaction's nonce
        actual: u64,
    },
    /// The transaction nonce is too low.
    #[error("Nonce too low. Expected nonce to be {expected} but got {actual}. Note that transactions can't be queued when automining.")]
    NonceTooLow {
        /// The sender's next nonce
        expected: u64,
        /// The transaction's nonce
        actual: u64,
    },
    /// The transaction's priority fee is lower than the minimum gas price.
    #[error("Transaction gas price is {actual}, which is below the minimum of {expected}")]
    PriorityFeeTooLow {
        /// The minimum gas price
        expected: u128,
        /// The transaction's priority fee
        actual: u128,
    },
    /// An error that occurred while reading state or finalizing the block.
    #[error(transparent)]
    State(#[from] StateError),
}

/// Mines a block with a single transaction, validating it against the next
/// block's fee and nonce requirements first.
#[allow(clippy::too_many_arguments)]
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
pub fn mine_block_with_single_transaction(
    blockchain: &dyn SyncBlockchain,
    state: ChainState,
    transaction: transaction::Signed,
    executor: &dyn SyncExecutor,
    hardfork: Hardfork,
    overrides: HeaderOverrides,
    min_gas_price: u128,
    reward: U256,
) -> Result<MineBlockResultAndState, MineTransactionError> {
    let max_priority_fee_per_gas = transaction
        .max_priority_fee_per_gas()
        .unwrap_or_else(|| transaction.gas_price());

    if *max_priority_fee_per_gas < min_gas_price {
        return Err(MineTransactionError::PriorityFeeTooLow {
            expected: min_gas_price,
            actual: *max_priority_fee_per_gas,
        });
    }

    let base_fee = if let Some(base_fee) = overrides.base_fee {
        Some(base_fee)
    } else if hardfork.supports_eip1559() {
        let parent_block = blockchain.last_block()?;
        Some(calculate_next_base_fee_per_gas(
            parent_block.header(),
            &BaseFeeParams::ethereum(),
        ))
    } else {
        None
    };

    if let Some(base_fee) = base_fee {
        if let Some(max_fee_per_gas) = transaction.max_fee_per_gas() {
            if *max_fee_per_gas < base_fee {
                return Err(MineTransactionError::MaxFeePerGasTooLow {
                    expected: base_fee,
                    actual: *max_fee_per_gas,
                });
            }
        } else {
            let gas_price = *transaction.gas_price();
            if gas_price < base_fee {
                return Err(MineTransactionError::GasPriceTooLow {
                    expected: base_fee,
                    actual: gas_price,
                });
            }
        }
    }

    let sender = state
        .basic(*transaction.caller())?
        .unwrap_or_default();

    match transaction.nonce().cmp(&sender.nonce) {
        Ordering::Less => {
            return Err(MineTransactionError::NonceTooLow {
                expected: sender.nonce,
                actual: transaction.nonce(),
            });
        }
        Ordering::Greater => {
            return Err(MineTransactionError::NonceTooHigh {
                expected: sender.nonce,
                actual: transaction.nonce(),
            });
        }
        Ordering::Equal => (),
    }

    let withdrawals = if hardfork >= Hardfork::Shanghai {
        Some(Vec::new())
    } else {
        None
    };

    let mut block_builder = BlockBuilder::new(blockchain, state, hardfork, overrides, withdrawals)?;
    block_builder.add_transaction(executor, transaction)?;

    let beneficiary = block_builder.header().beneficiary;

    block_builder
        .finalize(vec![(beneficiary, reward)])
        .map_err(MineTransactionError::State)
}

/// Calculates the fee per gas that the miner receives for including the
/// transaction in a block with the provided base fee. A transaction whose max
/// fee falls below the base fee pays the miner nothing.
fn effective_miner_fee(transaction: &transaction::Signed, base_fee: Option<u128>) -> u128 {
    let max_fee_per_gas = *transaction.gas_price();
    let max_priority_fee_per_gas = *transaction
        .max_priority_fee_per_gas()
        .unwrap_or(&max_fee_per_gas);

    base_fee.map_or(max_fee_per_gas, |base_fee| {
        max_priority_fee_per_gas.min(max_fee_per_gas.saturating_sub(base_fee))
    })
}

fn first_in_first_out_comparator(lhs: &OrderedTransaction, rhs: &OrderedTransaction) -> Ordering {
    lhs.order_id().cmp(&rhs.order_id())
}

fn priority_comparator(
    lhs: &OrderedTransaction,
    rhs: &OrderedTransaction,
    base_fee: Option<u128>,
) -> Ordering {
    let effective_miner_fee =
        move |transaction: &transaction::Signed| effective_miner_fee(transaction, base_fee);

    // Invert lhs and rhs to get decreasing order by effective miner fee
    let ordering = effective_miner_fee(rhs.pending()).cmp(&effective_miner_fee(lhs.pending()));

    // If two txs have the same effective miner fee we want to sort them
    // in increasing order by order id
    if ordering == Ordering::Equal {
        lhs.order_id().cmp(&rhs.order_id())
    } else {
        ordering
    }
}

#[cfg(test)]
mod tests {
    use devnode_eth::{account::AccountInfo, B256};

    use super::*;
    use crate::test_utils::{
        dummy_eip1559_transaction, dummy_eip155_transaction_with_price, MemPoolTestFixture,
    };

    const DEFAULT_ACCOUNT: AccountInfo = AccountInfo {
        balance: U256::MAX,
        nonce: 0,
        code_hash: devnode_eth::KECCAK_EMPTY,
        code: None,
    };

    fn collect_hashes(
        mem_pool: &MemPool,
        comparator: impl Fn(&OrderedTransaction, &OrderedTransaction) -> Ordering,
    ) -> Vec<B256> {
        mem_pool
            .iter(comparator)
            .map(|transaction| *transaction.transaction_hash())
            .collect()
    }

    #[test]
    fn fifo_ordering() -> anyhow::Result<()> {
        let sender1 = Address::random();
        let sender2 = Address::random();

        let mut fixture = MemPoolTestFixture::with_accounts(&[
            (sender1, DEFAULT_ACCOUNT.clone()),
            (sender2, DEFAULT_ACCOUNT.clone()),
        ]);

        let transaction1 = dummy_eip155_transaction_with_price(sender1, 0, 200);
        let transaction2 = dummy_eip155_transaction_with_price(sender2, 0, 100);

        let expected = vec![
            *transaction1.transaction_hash(),
            *transaction2.transaction_hash(),
        ];

        fixture.add_transaction(transaction1)?;
        fixture.add_transaction(transaction2)?;

        let hashes = collect_hashes(&fixture.mem_pool, first_in_first_out_comparator);
        assert_eq!(hashes, expected);

        Ok(())
    }

    #[test]
    fn priority_ordering_gas_price_without_base_fee() -> anyhow::Result<()> {
        let sender1 = Address::random();
        let sender2 = Address::random();

        let mut fixture = MemPoolTestFixture::with_accounts(&[
            (sender1, DEFAULT_ACCOUNT.clone()),
            (sender2, DEFAULT_ACCOUNT.clone()),
        ]);

        let transaction1 = dummy_eip155_transaction_with_price(sender1, 0, 100);
        let transaction2 = dummy_eip155_transaction_with_price(sender2, 0, 200);

        // Higher gas price comes first, despite arriving later.
        let expected = vec![
            *transaction2.transaction_hash(),
            *transaction1.transaction_hash(),
        ];

        fixture.add_transaction(transaction1)?;
        fixture.add_transaction(transaction2)?;

        let hashes = collect_hashes(&fixture.mem_pool, |lhs, rhs| {
            priority_comparator(lhs, rhs, None)
        });
        assert_eq!(hashes, expected);

        Ok(())
    }

    #[test]
    fn priority_ordering_gas_price_with_base_fee() -> anyhow::Result<()> {
        let base_fee = Some(15);

        let senders: Vec<Address> = (0..5).map(|_| Address::random()).collect();
        let accounts: Vec<(Address, AccountInfo)> = senders
            .iter()
            .map(|sender| (*sender, DEFAULT_ACCOUNT.clone()))
            .collect();

        let mut fixture = MemPoolTestFixture::with_accounts(&accounts);

        // Effective miner fee 96
        let transaction1 = dummy_eip155_transaction_with_price(senders[0], 0, 111);
        // Effective miner fee 100
        let transaction2 = dummy_eip1559_transaction(senders[1], 0, 120, 100);
        // Effective miner fee 110
        let transaction3 = dummy_eip155_transaction_with_price(senders[2], 0, 125);
        // Effective miner fee 125
        let transaction4 = dummy_eip1559_transaction(senders[3], 0, 140, 130);
        // Effective miner fee 155
        let transaction5 = dummy_eip155_transaction_with_price(senders[4], 0, 170);

        assert_eq!(effective_miner_fee(&transaction1, base_fee), 96);
        assert_eq!(effective_miner_fee(&transaction2, base_fee), 100);
        assert_eq!(effective_miner_fee(&transaction3, base_fee), 110);
        assert_eq!(effective_miner_fee(&transaction4, base_fee), 125);
        assert_eq!(effective_miner_fee(&transaction5, base_fee), 155);

        let expected = vec![
            *transaction5.transaction_hash(),
            *transaction4.transaction_hash(),
            *transaction3.transaction_hash(),
            *transaction2.transaction_hash(),
            *transaction1.transaction_hash(),
        ];

        fixture.add_transaction(transaction1)?;
        fixture.add_transaction(transaction2)?;
        fixture.add_transaction(transaction3)?;
        fixture.add_transaction(transaction4)?;
        fixture.add_transaction(transaction5)?;

        let hashes = collect_hashes(&fixture.mem_pool, |lhs, rhs| {
            priority_comparator(lhs, rhs, base_fee)
        });
        assert_eq!(hashes, expected);

        Ok(())
    }

    #[test]
    fn priority_ordering_with_underpriced_transaction() -> anyhow::Result<()> {
        let base_fee = Some(15);

        let sender1 = Address::random();
        let sender2 = Address::random();

        let mut fixture = MemPoolTestFixture::with_accounts(&[
            (sender1, DEFAULT_ACCOUNT.clone()),
            (sender2, DEFAULT_ACCOUNT.clone()),
        ]);

        // The max fee is below the base fee; the miner receives nothing.
        let underpriced = dummy_eip1559_transaction(sender1, 0, 10, 5);
        let priced = dummy_eip1559_transaction(sender2, 0, 120, 100);

        assert_eq!(effective_miner_fee(&underpriced, base_fee), 0);
        assert_eq!(effective_miner_fee(&priced, base_fee), 100);

        let expected = vec![
            *priced.transaction_hash(),
            *underpriced.transaction_hash(),
        ];

        fixture.add_transaction(underpriced)?;
        fixture.add_transaction(priced)?;

        let hashes = collect_hashes(&fixture.mem_pool, |lhs, rhs| {
            priority_comparator(lhs, rhs, base_fee)
        });
        assert_eq!(hashes, expected);

        Ok(())
    }

    #[test]
    fn ordering_remove_caller() -> anyhow::Result<()> {
        let sender1 = Address::random();
        let sender2 = Address::random();

        let mut fixture = MemPoolTestFixture::with_accounts(&[
            (sender1, DEFAULT_ACCOUNT.clone()),
            (sender2, DEFAULT_ACCOUNT.clone()),
        ]);

        let transaction1 = dummy_eip155_transaction_with_price(sender1, 0, 100);
        let transaction2 = dummy_eip155_transaction_with_price(sender1, 1, 100);
        let transaction3 = dummy_eip155_transaction_with_price(sender2, 0, 100);
        let transaction4 = dummy_eip155_transaction_with_price(sender2, 1, 100);

        fixture.add_transaction(transaction1.clone())?;
        fixture.add_transaction(transaction2)?;
        fixture.add_transaction(transaction3.clone())?;
        fixture.add_transaction(transaction4.clone())?;

        let mut pending_transactions = fixture.mem_pool.iter(first_in_first_out_comparator);

        let first = pending_transactions
            .next()
            .expect("mem pool has transactions");
        assert_eq!(first.transaction_hash(), transaction1.transaction_hash());

        // Removing the first sender discards its remaining transaction.
        pending_transactions.remove_caller(&sender1);

        let second = pending_transactions
            .next()
            .expect("mem pool has transactions");
        assert_eq!(second.transaction_hash(), transaction3.transaction_hash());

        let third = pending_transactions
            .next()
            .expect("mem pool has transactions");
        assert_eq!(third.transaction_hash(), transaction4.transaction_hash());

        assert!(pending_transactions.next().is_none());

        Ok(())
    }
}
