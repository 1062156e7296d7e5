use std::{cmp::Ordering, fmt::Debug, num::NonZeroU64};

use devnode_eth::{
    account::AccountInfo,
    transaction::{self, upfront_cost},
    Address, HashMap, B256, U256,
};
use indexmap::{map::Entry, IndexMap};

use crate::state::{State, StateError};

/// An iterator over pending transactions.
pub struct PendingTransactions<ComparatorT>
where
    ComparatorT: Fn(&OrderedTransaction, &OrderedTransaction) -> Ordering,
{
    transactions: IndexMap<Address, Vec<OrderedTransaction>>,
    comparator: ComparatorT,
}

impl<ComparatorT> PendingTransactions<ComparatorT>
where
    ComparatorT: Fn(&OrderedTransaction, &OrderedTransaction) -> Ordering,
{
    /// Removes all pending transactions of the account corresponding to the
    /// provided address.
    pub fn remove_caller(&mut self, caller: &Address) -> Option<Vec<OrderedTransaction>> {
        self.transactions.shift_remove(caller)
    }
}

impl<ComparatorT> Debug for PendingTransactions<ComparatorT>
where
    ComparatorT: Fn(&OrderedTransaction, &OrderedTransaction) -> Ordering,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingTransactions")
            .field("transactions", &self.transactions)
            .finish()
    }
}

impl<ComparatorT> Iterator for PendingTransactions<ComparatorT>
where
    ComparatorT: Fn(&OrderedTransaction, &OrderedTransaction) -> Ordering,
{
    type Item = transaction::Signed;

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn next(&mut self) -> Option<Self::Item> {
        let (to_be_removed, next) = self
            .transactions
            .iter_mut()
            .min_by(|lhs, rhs| {
                (self.comparator)(
                    lhs.1.first().expect("Empty queues should be removed"),
                    rhs.1.first().expect("Empty queues should be removed"),
                )
            })
            .map_or((None, None), |(caller, transactions)| {
                let transaction = transactions.remove(0).transaction;

                let to_be_removed = if transactions.is_empty() {
                    Some(*caller)
                } else {
                    None
                };

                (to_be_removed, Some(transaction))
            });

        if let Some(caller) = &to_be_removed {
            self.transactions.shift_remove(caller);
        }

        next
    }
}

/// An error that can occur when adding a transaction to the mempool.
#[derive(Debug, thiserror::Error)]
pub enum MemPoolAddTransactionError {
    /// Transaction gas limit exceeds block gas limit.
    #[error(
        "Transaction gas limit is {transaction_gas_limit} and exceeds block gas limit of {block_gas_limit}"
    )]
    ExceedsBlockGasLimit {
        /// The block gas limit
        block_gas_limit: NonZeroU64,
        /// The transaction gas limit
        transaction_gas_limit: u64,
    },
    /// Sender does not have enough funds to send transaction.
    #[error(
        "Sender doesn't have enough funds to send tx. The max upfront cost is: {max_upfront_cost} and the sender's balance is: {sender_balance}."
    )]
    InsufficientFunds {
        /// The maximum upfront cost of the transaction
        max_upfront_cost: U256,
        /// The sender's balance
        sender_balance: U256,
    },
    /// Transaction nonce is too low.
    #[error(
        "Transaction nonce too low. Expected nonce to be at least {sender_nonce} but got {transaction_nonce}."
    )]
    NonceTooLow {
        /// Transaction's nonce.
        transaction_nonce: u64,
        /// Sender's nonce.
        sender_nonce: u64,
    },
    /// Transaction already exists in the mempool.
    #[error("Known transaction: 0x{transaction_hash:x}")]
    TransactionAlreadyExists {
        /// The transaction hash
        transaction_hash: B256,
    },
    /// State error
    #[error(transparent)]
    State(#[from] StateError),
    /// Replacement transaction has underpriced max fee per gas.
    #[error(
        "Replacement transaction underpriced. A gasPrice/maxFeePerGas of at least {min_new_max_fee_per_gas} is necessary to replace the existing transaction with nonce {transaction_nonce}."
    )]
    ReplacementMaxFeePerGasTooLow {
        /// The minimum new max fee per gas
        min_new_max_fee_per_gas: u128,
        /// The transaction nonce
        transaction_nonce: u64,
    },
    /// Replacement transaction has underpriced max priority fee per gas.
    #[error(
        "Replacement transaction underpriced. A gasPrice/maxPriorityFeePerGas of at least {min_new_max_priority_fee_per_gas} is necessary to replace the existing transaction with nonce {transaction_nonce}."
    )]
    ReplacementMaxPriorityFeePerGasTooLow {
        /// The minimum new max priority fee per gas
        min_new_max_priority_fee_per_gas: u128,
        /// The transaction nonce
        transaction_nonce: u64,
    },
}

/// A pending transaction with an order ID.
#[derive(Clone, Debug)]
pub struct OrderedTransaction {
    order_id: usize,
    transaction: transaction::Signed,
}

impl OrderedTransaction {
    /// Retrieves the order ID of the pending transaction.
    pub fn order_id(&self) -> usize {
        self.order_id
    }

    /// Retrieves the pending transaction.
    pub fn pending(&self) -> &transaction::Signed {
        &self.transaction
    }

    fn caller(&self) -> &Address {
        self.transaction.caller()
    }

    fn hash(&self) -> &B256 {
        self.transaction.transaction_hash()
    }

    fn nonce(&self) -> u64 {
        self.transaction.nonce()
    }
}

/// The mempool contains transactions pending inclusion in the blockchain.
#[derive(Clone, Debug)]
pub struct MemPool {
    /// The block's gas limit
    block_gas_limit: NonZeroU64,
    /// Transactions that can be executed now
    pending_transactions: IndexMap<Address, Vec<OrderedTransaction>>,
    /// Mapping of transaction hashes to transaction
    hash_to_transaction: HashMap<B256, OrderedTransaction>,
    /// Transactions that can be executed in the future, once the nonce is high
    /// enough
    future_transactions: IndexMap<Address, Vec<OrderedTransaction>>,
    next_order_id: usize,
}

impl MemPool {
    /// Constructs a new [`MemPool`] with the specified block gas limit.
    pub fn new(block_gas_limit: NonZeroU64) -> Self {
        Self {
            block_gas_limit,
            pending_transactions: IndexMap::new(),
            hash_to_transaction: HashMap::new(),
            future_transactions: IndexMap::new(),
            next_order_id: 0,
        }
    }

    /// Retrieves the instance's block gas limit.
    pub fn block_gas_limit(&self) -> NonZeroU64 {
        self.block_gas_limit
    }

    /// Sets the instance's block gas limit.
    pub fn set_block_gas_limit<S: State + ?Sized>(
        &mut self,
        state: &S,
        limit: NonZeroU64,
    ) -> Result<(), StateError> {
        self.block_gas_limit = limit;

        self.update(state)
    }

    /// Retrieves the nonce of the last pending transaction of the account
    /// corresponding to the specified address, if it exists.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn last_pending_nonce(&self, address: &Address) -> Option<u64> {
        self.pending_transactions.get(address).map(|transactions| {
            transactions
                .last()
                .expect("Empty maps should be deleted")
                .nonce()
        })
    }

    /// Retrieves an iterator for all future transactions.
    pub fn future_transactions(&self) -> impl Iterator<Item = &OrderedTransaction> {
        self.future_transactions.values().flatten()
    }

    /// Retrieves an iterator for all pending transactions.
    pub fn pending_transactions(&self) -> impl Iterator<Item = &OrderedTransaction> {
        self.pending_transactions.values().flatten()
    }

    /// Retrieves an iterator for all transactions in the instance. Pending
    /// transactions are followed by future transactions, grouped by sender
    /// in order of insertion.
    pub fn transactions(&self) -> impl Iterator<Item = &transaction::Signed> {
        self.pending_transactions
            .values()
            .chain(self.future_transactions.values())
            .flatten()
            .map(OrderedTransaction::pending)
    }

    /// Whether the instance has any future transactions; i.e. for which the
    /// nonces are not high enough.
    pub fn has_future_transactions(&self) -> bool {
        !self.future_transactions.is_empty()
    }

    /// Whether the instance has any pending transactions; i.e. for which the
    /// nonces are guaranteed to be high enough.
    pub fn has_pending_transactions(&self) -> bool {
        !self.pending_transactions.is_empty()
    }

    /// Tries to add the provided transaction to the [`MemPool`].
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn add_transaction<S: State + ?Sized>(
        &mut self,
        state: &S,
        transaction: transaction::Signed,
    ) -> Result<(), MemPoolAddTransactionError> {
        let transaction_gas_limit = transaction.gas_limit();
        if transaction_gas_limit > self.block_gas_limit.get() {
            return Err(MemPoolAddTransactionError::ExceedsBlockGasLimit {
                block_gas_limit: self.block_gas_limit,
                transaction_gas_limit,
            });
        }

        if self
            .hash_to_transaction
            .contains_key(transaction.transaction_hash())
        {
            return Err(MemPoolAddTransactionError::TransactionAlreadyExists {
                transaction_hash: *transaction.transaction_hash(),
            });
        }

        let sender = state.basic(*transaction.caller())?.unwrap_or_default();
        if transaction.nonce() < sender.nonce {
            return Err(MemPoolAddTransactionError::NonceTooLow {
                transaction_nonce: transaction.nonce(),
                sender_nonce: sender.nonce,
            });
        }

        // We need to validate funds at this stage to avoid DOS
        let max_upfront_cost = upfront_cost(&transaction);
        if max_upfront_cost > sender.balance {
            return Err(MemPoolAddTransactionError::InsufficientFunds {
                max_upfront_cost,
                sender_balance: sender.balance,
            });
        }

        let next_nonce = account_next_nonce(self, state, transaction.caller())?;
        let transaction = OrderedTransaction {
            order_id: self.next_order_id,
            transaction,
        };

        if transaction.nonce() > next_nonce {
            self.insert_future_transaction(transaction.clone())?;
        } else {
            self.insert_pending_transaction(transaction.clone())?;
        }

        self.next_order_id += 1;

        self.hash_to_transaction
            .insert(*transaction.hash(), transaction);

        Ok(())
    }

    /// Removes the transaction corresponding to the provided transaction hash,
    /// if it exists.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn remove_transaction(&mut self, hash: &B256) -> Option<OrderedTransaction> {
        if let Some(old_transaction) = self.hash_to_transaction.remove(hash) {
            let caller = old_transaction.caller();
            if let Some(pending_transactions) = self.pending_transactions.get_mut(caller) {
                if let Some((idx, _)) = pending_transactions
                    .iter()
                    .enumerate()
                    .find(|(_, transaction)| *transaction.hash() == *hash)
                {
                    let mut invalidated_transactions = pending_transactions.split_off(idx + 1);
                    let removed = pending_transactions.remove(idx);

                    if pending_transactions.is_empty() {
                        self.pending_transactions.shift_remove(caller);
                    }

                    self.future_transactions
                        .entry(*caller)
                        .and_modify(|transactions| {
                            transactions.append(&mut invalidated_transactions);
                        })
                        .or_insert(invalidated_transactions);

                    return Some(removed);
                }
            }

            if let Some(future_transactions) = self.future_transactions.get_mut(caller) {
                if let Some((idx, _)) = future_transactions
                    .iter()
                    .enumerate()
                    .find(|(_, transaction)| *transaction.hash() == *hash)
                {
                    let removed = future_transactions.remove(idx);

                    if future_transactions.is_empty() {
                        self.future_transactions.shift_remove(caller);
                    }

                    return Some(removed);
                }
            }
        }

        None
    }

    /// Updates the [`MemPool`], moving any future transactions to the pending
    /// status, if their nonces are high enough.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn update<S: State + ?Sized>(&mut self, state: &S) -> Result<(), StateError> {
        fn is_valid_tx(
            transaction: &transaction::Signed,
            block_gas_limit: NonZeroU64,
            sender: &AccountInfo,
        ) -> bool {
            transaction.gas_limit() <= block_gas_limit.get()
                && upfront_cost(transaction) <= sender.balance
                // Remove all mined transactions
                && transaction.nonce() >= sender.nonce
        }

        for entry in self.pending_transactions.iter_mut() {
            let (caller, transactions) = entry;
            let sender = state.basic(*caller)?.unwrap_or_default();

            // Remove invalidated transactions
            transactions.retain(|transaction| {
                let should_retain =
                    is_valid_tx(transaction.pending(), self.block_gas_limit, &sender);

                if !should_retain {
                    self.hash_to_transaction.remove(transaction.hash());
                }

                should_retain
            });

            // Check that the pending transactions still have consecutive nonces, starting
            // from the sender's nonce
            if let Some((idx, _)) = transactions
                .iter()
                .enumerate()
                .find(|(idx, transaction)| transaction.nonce() != sender.nonce + *idx as u64)
            {
                // Move all consequent transactions to the future queue
                let mut invalidated_transactions = transactions.split_off(idx);

                self.future_transactions
                    .entry(*caller)
                    .and_modify(|transactions| transactions.append(&mut invalidated_transactions))
                    .or_insert(invalidated_transactions);
            }
        }

        // Remove empty pending entries
        self.pending_transactions
            .retain(|_, transactions| !transactions.is_empty());

        for entry in self.future_transactions.iter_mut() {
            let (caller, transactions) = entry;
            let sender = state.basic(*caller)?.unwrap_or_default();

            transactions.retain(|transaction| {
                let should_retain =
                    is_valid_tx(&transaction.transaction, self.block_gas_limit, &sender);

                if !should_retain {
                    self.hash_to_transaction.remove(transaction.hash());
                }

                should_retain
            });
        }

        // Remove empty future entries
        self.future_transactions
            .retain(|_, transactions| !transactions.is_empty());

        Ok(())
    }

    /// Returns the transaction corresponding to the provided hash, if it
    /// exists.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn transaction_by_hash(&self, hash: &B256) -> Option<&OrderedTransaction> {
        self.hash_to_transaction.get(hash)
    }

    /// Creates an iterator for all pending transactions; i.e. for which the
    /// nonces are guaranteed to be high enough.
    pub fn iter<ComparatorT>(&self, comparator: ComparatorT) -> PendingTransactions<ComparatorT>
    where
        ComparatorT: Fn(&OrderedTransaction, &OrderedTransaction) -> Ordering,
    {
        PendingTransactions {
            transactions: self.pending_transactions.clone(),
            comparator,
        }
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn insert_pending_transaction(
        &mut self,
        transaction: OrderedTransaction,
    ) -> Result<(), MemPoolAddTransactionError> {
        let mut pending_transactions = self.pending_transactions.entry(*transaction.caller());

        // Check whether an existing transaction can be replaced
        if let Entry::Occupied(ref mut pending_transactions) = pending_transactions {
            let replaced_transaction = pending_transactions
                .get_mut()
                .iter_mut()
                .find(|pending_transaction| transaction.nonce() == pending_transaction.nonce());

            if let Some(replaced_transaction) = replaced_transaction {
                validate_replacement_transaction(
                    &replaced_transaction.transaction,
                    &transaction.transaction,
                )?;

                self.hash_to_transaction.remove(replaced_transaction.hash());

                *replaced_transaction = transaction.clone();

                return Ok(());
            }
        }

        let caller = *transaction.caller();
        let mut next_pending_nonce = transaction.nonce() + 1;

        let pending_transactions = pending_transactions.or_default();
        pending_transactions.push(transaction);

        // Move as many future transactions as possible to the pending status
        if let Some(future_transactions) = self.future_transactions.get_mut(&caller) {
            while let Some((idx, _)) = future_transactions
                .iter()
                .enumerate()
                .find(|(_, transaction)| transaction.nonce() == next_pending_nonce)
            {
                pending_transactions.push(future_transactions.remove(idx));

                next_pending_nonce += 1;
            }

            if future_transactions.is_empty() {
                self.future_transactions.shift_remove(&caller);
            }
        }

        Ok(())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn insert_future_transaction(
        &mut self,
        transaction: OrderedTransaction,
    ) -> Result<(), MemPoolAddTransactionError> {
        let mut future_transactions = self.future_transactions.entry(*transaction.caller());

        // Check whether an existing transaction can be replaced
        if let Entry::Occupied(ref mut future_transactions) = future_transactions {
            let replaced_transaction = future_transactions
                .get_mut()
                .iter_mut()
                .find(|pending_transaction| transaction.nonce() == pending_transaction.nonce());

            if let Some(replaced_transaction) = replaced_transaction {
                validate_replacement_transaction(
                    &replaced_transaction.transaction,
                    &transaction.transaction,
                )?;

                self.hash_to_transaction.remove(replaced_transaction.hash());

                *replaced_transaction = transaction.clone();

                return Ok(());
            }
        }

        future_transactions.or_default().push(transaction);
        Ok(())
    }
}

/// Calculates the next nonce of the account corresponding to the provided
/// address.
pub fn account_next_nonce<S: State + ?Sized>(
    mem_pool: &MemPool,
    state: &S,
    address: &Address,
) -> Result<u64, StateError> {
    mem_pool.last_pending_nonce(address).map_or_else(
        || {
            state
                .basic(*address)
                .map(|account| account.map_or(0, |account| account.nonce))
        },
        |nonce| Ok(nonce + 1),
    )
}

/// Whether the mempool has any transactions.
pub fn has_transactions(mem_pool: &MemPool) -> bool {
    mem_pool.has_future_transactions() || mem_pool.has_pending_transactions()
}

fn validate_replacement_transaction(
    old_transaction: &transaction::Signed,
    new_transaction: &transaction::Signed,
) -> Result<(), MemPoolAddTransactionError> {
    let min_new_max_fee_per_gas = min_new_fee(*old_transaction.gas_price());
    if *new_transaction.gas_price() < min_new_max_fee_per_gas {
        return Err(MemPoolAddTransactionError::ReplacementMaxFeePerGasTooLow {
            min_new_max_fee_per_gas,
            transaction_nonce: old_transaction.nonce(),
        });
    }

    let min_new_max_priority_fee_per_gas = min_new_fee(
        *old_transaction
            .max_priority_fee_per_gas()
            .unwrap_or_else(|| old_transaction.gas_price()),
    );

    if *new_transaction
        .max_priority_fee_per_gas()
        .unwrap_or_else(|| new_transaction.gas_price())
        < min_new_max_priority_fee_per_gas
    {
        return Err(
            MemPoolAddTransactionError::ReplacementMaxPriorityFeePerGasTooLow {
                min_new_max_priority_fee_per_gas,
                transaction_nonce: old_transaction.nonce(),
            },
        );
    }

    Ok(())
}

fn min_new_fee(fee: u128) -> u128 {
    let min_new_priority_fee = fee * 110u128;

    let one_hundred = 100u128;
    if min_new_priority_fee % one_hundred == 0u128 {
        min_new_priority_fee / one_hundred
    } else {
        min_new_priority_fee / one_hundred + 1u128
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateDebug;
    use crate::test_utils::{
        dummy_eip155_transaction, dummy_eip155_transaction_with_limit,
        dummy_eip155_transaction_with_price, dummy_eip155_transaction_with_price_limit_and_value,
        MemPoolTestFixture,
    };

    fn account_with_balance(balance: u64) -> AccountInfo {
        AccountInfo {
            balance: U256::from(balance),
            ..AccountInfo::default()
        }
    }

    #[test]
    fn add_transaction_routes_by_nonce() -> anyhow::Result<()> {
        let sender = Address::random();
        let mut fixture =
            MemPoolTestFixture::with_accounts(&[(sender, account_with_balance(100_000_000))]);

        let future = dummy_eip155_transaction(sender, 2);
        fixture.add_transaction(future.clone())?;
        assert!(fixture.mem_pool.has_future_transactions());
        assert!(!fixture.mem_pool.has_pending_transactions());

        let pending = dummy_eip155_transaction(sender, 0);
        fixture.add_transaction(pending.clone())?;
        assert!(fixture.mem_pool.has_pending_transactions());

        // Adding the missing nonce promotes the gapped transaction.
        let missing = dummy_eip155_transaction(sender, 1);
        fixture.add_transaction(missing)?;
        assert!(!fixture.mem_pool.has_future_transactions());
        assert_eq!(fixture.mem_pool.pending_transactions().count(), 3);
        assert_eq!(fixture.mem_pool.last_pending_nonce(&sender), Some(2));

        Ok(())
    }

    #[test]
    fn add_transaction_exceeds_block_gas_limit() -> anyhow::Result<()> {
        let sender = Address::random();
        let mut fixture =
            MemPoolTestFixture::with_accounts(&[(sender, account_with_balance(100_000_000))]);

        let transaction = dummy_eip155_transaction_with_limit(sender, 0, 10_000_001);
        let error = fixture
            .add_transaction(transaction)
            .expect_err("transaction exceeds the block gas limit");

        assert_eq!(
            error.to_string(),
            "Transaction gas limit is 10000001 and exceeds block gas limit of 10000000"
        );

        Ok(())
    }

    #[test]
    fn add_transaction_nonce_too_low() -> anyhow::Result<()> {
        let sender = Address::random();
        let mut fixture = MemPoolTestFixture::with_accounts(&[(
            sender,
            AccountInfo {
                balance: U256::from(100_000_000u64),
                nonce: 5,
                ..AccountInfo::default()
            },
        )]);

        let error = fixture
            .add_transaction(dummy_eip155_transaction(sender, 4))
            .expect_err("nonce is below the sender's nonce");

        assert_eq!(
            error.to_string(),
            "Transaction nonce too low. Expected nonce to be at least 5 but got 4."
        );

        Ok(())
    }

    #[test]
    fn add_transaction_insufficient_funds() -> anyhow::Result<()> {
        let sender = Address::random();
        let mut fixture =
            MemPoolTestFixture::with_accounts(&[(sender, account_with_balance(100))]);

        let transaction = dummy_eip155_transaction_with_price_limit_and_value(
            sender,
            0,
            10,
            30_000,
            U256::from(50u64),
        );
        let error = fixture
            .add_transaction(transaction)
            .expect_err("sender cannot cover the upfront cost");

        assert_eq!(
            error.to_string(),
            "Sender doesn't have enough funds to send tx. The max upfront cost is: 300050 and the sender's balance is: 100."
        );

        Ok(())
    }

    #[test]
    fn add_transaction_already_known() -> anyhow::Result<()> {
        let sender = Address::random();
        let mut fixture =
            MemPoolTestFixture::with_accounts(&[(sender, account_with_balance(100_000_000))]);

        let transaction = dummy_eip155_transaction(sender, 0);
        fixture.add_transaction(transaction.clone())?;

        let error = fixture
            .add_transaction(transaction.clone())
            .expect_err("transaction was already added");

        assert_eq!(
            error.to_string(),
            format!(
                "Known transaction: 0x{:x}",
                transaction.transaction_hash()
            )
        );

        Ok(())
    }

    #[test]
    fn replacement_requires_ten_percent_bump() -> anyhow::Result<()> {
        let sender = Address::random();
        let mut fixture =
            MemPoolTestFixture::with_accounts(&[(sender, account_with_balance(10_000_000_000))]);

        fixture.add_transaction(dummy_eip155_transaction_with_price(sender, 0, 100))?;

        let error = fixture
            .add_transaction(dummy_eip155_transaction_with_price(sender, 0, 109))
            .expect_err("bump is below 10%");

        assert_eq!(
            error.to_string(),
            "Replacement transaction underpriced. A gasPrice/maxFeePerGas of at least 110 is necessary to replace the existing transaction with nonce 0."
        );

        let replacement = dummy_eip155_transaction_with_price(sender, 0, 110);
        fixture.add_transaction(replacement.clone())?;

        assert_eq!(fixture.mem_pool.pending_transactions().count(), 1);
        assert_eq!(
            fixture
                .mem_pool
                .transaction_by_hash(replacement.transaction_hash())
                .map(|transaction| transaction.pending().transaction_hash()),
            Some(replacement.transaction_hash())
        );

        Ok(())
    }

    #[test]
    fn remove_transaction_demotes_higher_nonces() -> anyhow::Result<()> {
        let sender = Address::random();
        let mut fixture =
            MemPoolTestFixture::with_accounts(&[(sender, account_with_balance(100_000_000))]);

        let transaction1 = dummy_eip155_transaction(sender, 0);
        let transaction2 = dummy_eip155_transaction(sender, 1);
        let transaction3 = dummy_eip155_transaction(sender, 2);
        fixture.add_transaction(transaction1.clone())?;
        fixture.add_transaction(transaction2)?;
        fixture.add_transaction(transaction3)?;

        fixture
            .mem_pool
            .remove_transaction(transaction1.transaction_hash());

        // The removal leaves a nonce gap, so the rest moves to future.
        assert!(!fixture.mem_pool.has_pending_transactions());
        assert_eq!(fixture.mem_pool.future_transactions().count(), 2);

        Ok(())
    }

    #[test]
    fn update_removes_mined_transactions() -> anyhow::Result<()> {
        let sender = Address::random();
        let mut fixture =
            MemPoolTestFixture::with_accounts(&[(sender, account_with_balance(100_000_000))]);

        fixture.add_transaction(dummy_eip155_transaction(sender, 0))?;
        fixture.add_transaction(dummy_eip155_transaction(sender, 1))?;

        // Simulate mining the first transaction.
        fixture.state.insert_account(
            sender,
            AccountInfo {
                balance: U256::from(100_000_000u64),
                nonce: 1,
                ..AccountInfo::default()
            },
        )?;
        fixture.update()?;

        assert_eq!(fixture.mem_pool.pending_transactions().count(), 1);
        assert_eq!(fixture.mem_pool.last_pending_nonce(&sender), Some(1));

        Ok(())
    }

    #[test]
    fn set_block_gas_limit_revalidates() -> anyhow::Result<()> {
        let sender = Address::random();
        let mut fixture =
            MemPoolTestFixture::with_accounts(&[(sender, account_with_balance(100_000_000))]);

        fixture.add_transaction(dummy_eip155_transaction_with_limit(sender, 0, 30_000))?;

        fixture.set_block_gas_limit(NonZeroU64::new(20_000).expect("value is non-zero"))?;

        assert!(!has_transactions(&fixture.mem_pool));

        Ok(())
    }
}
