use devnode_eth::{
    account::AccountInfo, log::ExecutionLog, transaction, Address, Bytes, HashMap, TxKind, U256,
};

use crate::state::{State, StateDiff, StateError};

/// Base cost of any transaction.
const TRANSACTION_GAS: u64 = 21_000;
/// Additional base cost of a contract creation.
const CREATE_GAS: u64 = 32_000;
/// Cost per zero byte of calldata.
const DATA_ZERO_GAS: u64 = 4;
/// Cost per non-zero byte of calldata.
const DATA_NON_ZERO_GAS: u64 = 16;
/// Cost per address in the access list.
const ACCESS_LIST_ADDRESS_GAS: u64 = 2_400;
/// Cost per storage key in the access list.
const ACCESS_LIST_STORAGE_KEY_GAS: u64 = 1_900;

/// The block-level environment a transaction executes in.
#[derive(Clone, Debug, Default)]
pub struct ExecutionContext {
    /// The block's beneficiary address.
    pub coinbase: Address,
    /// The block's number.
    pub block_number: u64,
    /// The block's timestamp.
    pub block_timestamp: u64,
    /// The block's base fee per gas, for post-London blocks.
    pub base_fee: Option<u128>,
    /// The block's gas limit.
    pub block_gas_limit: u64,
}

/// The reason a transaction's execution was halted without a revert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HaltReason {
    /// The transaction ran out of gas.
    OutOfGas,
}

/// The result of executing a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionResult {
    /// The transaction executed successfully.
    Success {
        /// The amount of gas consumed.
        gas_used: u64,
        /// The logs emitted during execution.
        logs: Vec<ExecutionLog>,
        /// The return data.
        output: Bytes,
    },
    /// The transaction reverted, undoing its state changes but consuming gas.
    Revert {
        /// The amount of gas consumed.
        gas_used: u64,
        /// The revert reason data.
        output: Bytes,
    },
    /// The transaction halted exceptionally, consuming all gas.
    Halt {
        /// The amount of gas consumed.
        gas_used: u64,
        /// The halt reason.
        reason: HaltReason,
    },
}

impl ExecutionResult {
    /// Whether the execution was successful.
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }

    /// The amount of gas the execution consumed.
    pub fn gas_used(&self) -> u64 {
        match self {
            ExecutionResult::Success { gas_used, .. }
            | ExecutionResult::Revert { gas_used, .. }
            | ExecutionResult::Halt { gas_used, .. } => *gas_used,
        }
    }

    /// The logs emitted during execution.
    pub fn logs(&self) -> &[ExecutionLog] {
        match self {
            ExecutionResult::Success { logs, .. } => logs,
            ExecutionResult::Revert { .. } | ExecutionResult::Halt { .. } => &[],
        }
    }

    /// The return data of the execution.
    pub fn output(&self) -> Option<&Bytes> {
        match self {
            ExecutionResult::Success { output, .. }
            | ExecutionResult::Revert { output, .. } => Some(output),
            ExecutionResult::Halt { .. } => None,
        }
    }
}

/// A pre-execution validation failure. Detected before any state mutation.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransactionError {
    /// The transaction's maximum fee is below the block's base fee.
    #[error("gas price is less than basefee")]
    GasPriceLessThanBasefee,
    /// The transaction's gas limit doesn't cover its intrinsic gas.
    #[error("call gas cost exceeds the gas limit")]
    CallGasCostMoreThanGasLimit,
    /// The sender cannot cover the transaction's maximum cost.
    #[error("lack of funds ({balance}) for max fee ({fee})")]
    LackOfFundForMaxFee {
        /// The maximum cost of the transaction.
        fee: Box<U256>,
        /// The sender's balance.
        balance: Box<U256>,
    },
    /// The transaction's nonce exceeds the sender's nonce.
    #[error("nonce {tx} too high, expected {state}")]
    NonceTooHigh {
        /// The transaction's nonce.
        tx: u64,
        /// The sender's nonce.
        state: u64,
    },
    /// The transaction's nonce is below the sender's nonce.
    #[error("nonce {tx} too low, expected {state}")]
    NonceTooLow {
        /// The transaction's nonce.
        tx: u64,
        /// The sender's nonce.
        state: u64,
    },
}

/// An error that can occur during transaction execution.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// A pre-execution validation failure.
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    /// A state access failure.
    #[error(transparent)]
    State(#[from] StateError),
}

/// A transaction execution collaborator. Implementations must be
/// deterministic: identical inputs produce identical results.
pub trait SyncExecutor: Send + Sync {
    /// Executes the transaction against the provided state in the provided
    /// block context, returning the result and the state changes it caused.
    ///
    /// The state is not modified; the caller decides whether to commit the
    /// returned diff.
    fn execute(
        &self,
        state: &dyn State,
        context: &ExecutionContext,
        transaction: &transaction::Signed,
    ) -> Result<(ExecutionResult, StateDiff), ExecutorError>;
}

/// Computes the intrinsic gas cost of a transaction: the gas charged before
/// any code runs.
pub fn intrinsic_gas(transaction: &transaction::Signed) -> u64 {
    let mut gas = TRANSACTION_GAS;

    if transaction.kind() == TxKind::Create {
        gas += CREATE_GAS;
    }

    for byte in transaction.data() {
        gas += if *byte == 0 {
            DATA_ZERO_GAS
        } else {
            DATA_NON_ZERO_GAS
        };
    }

    if let Some(access_list) = transaction.access_list() {
        for item in access_list {
            gas += ACCESS_LIST_ADDRESS_GAS;
            gas += ACCESS_LIST_STORAGE_KEY_GAS * item.storage_keys.len() as u64;
        }
    }

    gas
}

/// An executor for plain value transfers. Charges intrinsic gas, moves the
/// transferred value, credits the priority fee to the coinbase, and
/// increments the sender's nonce. Calldata is carried but not interpreted.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransferExecutor;

impl SyncExecutor for TransferExecutor {
    fn execute(
        &self,
        state: &dyn State,
        context: &ExecutionContext,
        transaction: &transaction::Signed,
    ) -> Result<(ExecutionResult, StateDiff), ExecutorError> {
        let caller = *transaction.caller();
        let sender = state.basic(caller)?.unwrap_or_default();

        match transaction.nonce().cmp(&sender.nonce) {
            std::cmp::Ordering::Less => {
                return Err(TransactionError::NonceTooLow {
                    tx: transaction.nonce(),
                    state: sender.nonce,
                }
                .into());
            }
            std::cmp::Ordering::Greater => {
                return Err(TransactionError::NonceTooHigh {
                    tx: transaction.nonce(),
                    state: sender.nonce,
                }
                .into());
            }
            std::cmp::Ordering::Equal => (),
        }

        if let Some(base_fee) = context.base_fee {
            if *transaction.gas_price() < base_fee {
                return Err(TransactionError::GasPriceLessThanBasefee.into());
            }
        }

        let gas_used = intrinsic_gas(transaction);
        if gas_used > transaction.gas_limit() {
            return Err(TransactionError::CallGasCostMoreThanGasLimit.into());
        }

        let max_cost = transaction::upfront_cost(transaction);
        if max_cost > sender.balance {
            return Err(TransactionError::LackOfFundForMaxFee {
                fee: Box::new(max_cost),
                balance: Box::new(sender.balance),
            }
            .into());
        }

        let effective_gas_price = context.base_fee.map_or(*transaction.gas_price(), |base_fee| {
            transaction
                .effective_gas_price(base_fee)
                .unwrap_or(*transaction.gas_price())
        });

        let gas_cost = U256::from(gas_used).saturating_mul(U256::from(effective_gas_price));

        // Only the priority fee reaches the coinbase; the base fee portion
        // is burned.
        let priority_fee_per_gas = effective_gas_price - context.base_fee.unwrap_or(0);
        let coinbase_reward =
            U256::from(gas_used).saturating_mul(U256::from(priority_fee_per_gas));

        let mut accounts: HashMap<Address, AccountInfo> = HashMap::new();

        let mut sender = sender;
        sender.balance = sender.balance - gas_cost - *transaction.value();
        sender.nonce += 1;
        accounts.insert(caller, sender);

        let recipient = match transaction.kind() {
            TxKind::Call(to) => to,
            TxKind::Create => caller.create(transaction.nonce()),
        };

        if !accounts.contains_key(&recipient) {
            accounts.insert(recipient, state.basic(recipient)?.unwrap_or_default());
        }
        if let Some(recipient_info) = accounts.get_mut(&recipient) {
            recipient_info.balance += *transaction.value();
        }

        if !accounts.contains_key(&context.coinbase) {
            accounts.insert(
                context.coinbase,
                state.basic(context.coinbase)?.unwrap_or_default(),
            );
        }
        if let Some(coinbase_info) = accounts.get_mut(&context.coinbase) {
            coinbase_info.balance += coinbase_reward;
        }

        let mut state_diff = StateDiff::default();
        for (address, account_info) in accounts {
            state_diff.apply_account_change(address, account_info);
        }

        Ok((
            ExecutionResult::Success {
                gas_used,
                logs: Vec::new(),
                output: Bytes::new(),
            },
            state_diff,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        state::{StateCommit, TrieState},
        test_utils::{
            dummy_eip155_transaction_with_price, dummy_eip155_transaction_with_price_limit_and_value,
            dummy_eip1559_transaction,
        },
    };
    use devnode_eth::transaction::Signed;

    const BALANCE: u64 = 10_000_000_000;

    fn context_with_base_fee(base_fee: Option<u128>) -> ExecutionContext {
        ExecutionContext {
            coinbase: Address::with_last_byte(0xfe),
            block_number: 1,
            block_timestamp: 1_000,
            base_fee,
            block_gas_limit: 10_000_000,
        }
    }

    fn state_with_sender(transaction: &Signed) -> TrieState {
        let mut accounts = HashMap::new();
        accounts.insert(
            *transaction.caller(),
            AccountInfo::with_balance(U256::from(BALANCE)),
        );
        TrieState::with_accounts(&accounts)
    }

    #[test]
    fn transfer_moves_value_and_charges_gas() -> anyhow::Result<()> {
        let sender = Address::random();
        let transaction = dummy_eip155_transaction_with_price_limit_and_value(
            sender,
            0,
            10,
            30_000,
            U256::from(1_000u64),
        );

        let mut state = state_with_sender(&transaction);
        let context = context_with_base_fee(None);

        let (result, state_diff) =
            TransferExecutor.execute(&state, &context, &transaction)?;

        assert_eq!(result.gas_used(), 21_000);
        state.commit(state_diff);

        let sender_info = state.basic(sender)?.expect("sender exists");
        assert_eq!(sender_info.nonce, 1);
        assert_eq!(
            sender_info.balance,
            U256::from(BALANCE) - U256::from(21_000u64 * 10) - U256::from(1_000u64)
        );

        let recipient = transaction.to().expect("transaction is a call");
        let recipient_info = state.basic(recipient)?.expect("recipient was credited");
        assert_eq!(recipient_info.balance, U256::from(1_000u64));

        // Without a base fee, the full gas price goes to the coinbase.
        let coinbase_info = state.basic(context.coinbase)?.expect("coinbase was paid");
        assert_eq!(coinbase_info.balance, U256::from(21_000u64 * 10));

        Ok(())
    }

    #[test]
    fn coinbase_only_receives_priority_fee() -> anyhow::Result<()> {
        let sender = Address::random();
        let transaction = dummy_eip1559_transaction(sender, 0, 1_000, 7);

        let mut state = state_with_sender(&transaction);
        let context = context_with_base_fee(Some(100));

        let (result, state_diff) =
            TransferExecutor.execute(&state, &context, &transaction)?;
        state.commit(state_diff);

        let coinbase_info = state.basic(context.coinbase)?.expect("coinbase was paid");
        assert_eq!(
            coinbase_info.balance,
            U256::from(result.gas_used()) * U256::from(7u64)
        );

        Ok(())
    }

    #[test]
    fn nonce_mismatch_fails_before_mutation() -> anyhow::Result<()> {
        let sender = Address::random();
        let transaction = dummy_eip155_transaction_with_price(sender, 2, 10);

        let state = state_with_sender(&transaction);
        let context = context_with_base_fee(None);

        let error = TransferExecutor
            .execute(&state, &context, &transaction)
            .expect_err("nonce is above the sender's nonce");

        assert!(matches!(
            error,
            ExecutorError::Transaction(TransactionError::NonceTooHigh { tx: 2, state: 0 })
        ));

        Ok(())
    }

    #[test]
    fn max_fee_below_base_fee_is_rejected() -> anyhow::Result<()> {
        let sender = Address::random();
        let transaction = dummy_eip1559_transaction(sender, 0, 50, 1);

        let state = state_with_sender(&transaction);
        let context = context_with_base_fee(Some(100));

        let error = TransferExecutor
            .execute(&state, &context, &transaction)
            .expect_err("max fee is below the base fee");

        assert!(matches!(
            error,
            ExecutorError::Transaction(TransactionError::GasPriceLessThanBasefee)
        ));

        Ok(())
    }

    #[test]
    fn intrinsic_gas_counts_calldata_and_access_list() {
        let sender = Address::random();
        let transaction = dummy_eip155_transaction_with_price(sender, 0, 10);

        assert_eq!(intrinsic_gas(&transaction), 21_000);
    }
}
