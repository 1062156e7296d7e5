use std::sync::OnceLock;

use devnode_eth::transaction;
use devnode_evm::{
    executor::{ExecutionContext, ExecutionResult, ExecutorError, SyncExecutor},
    state::ChainState,
};

use crate::ProviderError;

const MAX_ITERATIONS: usize = 20;

/// Arguments for binary searching a gas estimate between a known-failing
/// lower bound and a known-succeeding upper bound.
pub(super) struct BinarySearchEstimationArgs<'args> {
    pub executor: &'args dyn SyncExecutor,
    pub state: &'args ChainState,
    pub context: &'args ExecutionContext,
    pub transaction: &'args transaction::Signed,
    pub lower_bound: u64,
    pub upper_bound: u64,
}

/// Searches for the smallest gas limit with which the transaction succeeds.
/// Inspired by Geth's `eth_estimateGas` implementation.
pub(super) fn binary_search_estimation(
    args: BinarySearchEstimationArgs<'_>,
) -> Result<u64, ProviderError> {
    let BinarySearchEstimationArgs {
        executor,
        state,
        context,
        transaction,
        mut lower_bound,
        mut upper_bound,
    } = args;

    let mut i = 0;

    while upper_bound - lower_bound > min_difference(lower_bound) && i < MAX_ITERATIONS {
        let mut mid = lower_bound + (upper_bound - lower_bound) / 2;
        if i == 0 {
            // Geth initially tries 3x the previous gas usage; most
            // transactions need far less gas than the block gas limit.
            let initial_mid = 3 * lower_bound;
            mid = mid.min(initial_mid);
        }

        let success = check_gas_limit(executor, state, context, transaction, mid)?;
        if success {
            upper_bound = mid;
        } else {
            lower_bound = mid + 1;
        }

        i += 1;
    }

    Ok(upper_bound)
}

/// Executes the transaction with the provided gas limit, reporting whether it
/// succeeded. Pre-execution validation failures count as unsuccessful.
pub(super) fn check_gas_limit(
    executor: &dyn SyncExecutor,
    state: &ChainState,
    context: &ExecutionContext,
    transaction: &transaction::Signed,
    gas_limit: u64,
) -> Result<bool, ProviderError> {
    let transaction = with_gas_limit(transaction, gas_limit);

    match executor.execute(state, context, &transaction) {
        Ok((result, _state_diff)) => Ok(matches!(result, ExecutionResult::Success { .. })),
        Err(ExecutorError::Transaction(_)) => Ok(false),
        Err(ExecutorError::State(error)) => Err(ProviderError::State(error)),
    }
}

/// Returns a copy of the transaction with the provided gas limit, resetting
/// the cached hash and encoding. The cached caller address is preserved, so
/// this must only be used for local simulation, never for transactions that
/// re-enter the pool.
pub(super) fn with_gas_limit(
    transaction: &transaction::Signed,
    gas_limit: u64,
) -> transaction::Signed {
    let mut transaction = transaction.clone();

    match &mut transaction {
        transaction::Signed::PreEip155Legacy(transaction) => {
            transaction.gas_limit = gas_limit;
            transaction.hash = OnceLock::new();
            transaction.rlp_encoding = OnceLock::new();
        }
        transaction::Signed::PostEip155Legacy(transaction) => {
            transaction.gas_limit = gas_limit;
            transaction.hash = OnceLock::new();
            transaction.rlp_encoding = OnceLock::new();
        }
        transaction::Signed::Eip2930(transaction) => {
            transaction.gas_limit = gas_limit;
            transaction.hash = OnceLock::new();
            transaction.rlp_encoding = OnceLock::new();
        }
        transaction::Signed::Eip1559(transaction) => {
            transaction.gas_limit = gas_limit;
            transaction.hash = OnceLock::new();
            transaction.rlp_encoding = OnceLock::new();
        }
    }

    transaction
}

/// The minimum difference between the lower and upper bounds at which the
/// search stops, scaled to the magnitude of the estimate.
fn min_difference(lower_bound: u64) -> u64 {
    if lower_bound >= 4_000_000 {
        50_000
    } else if lower_bound >= 1_000_000 {
        10_000
    } else if lower_bound >= 100_000 {
        1_000
    } else if lower_bound >= 50_000 {
        500
    } else if lower_bound >= 30_000 {
        300
    } else {
        200
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_difference_scales_with_magnitude() {
        assert_eq!(min_difference(21_000), 200);
        assert_eq!(min_difference(40_000), 300);
        assert_eq!(min_difference(60_000), 500);
        assert_eq!(min_difference(200_000), 1_000);
        assert_eq!(min_difference(2_000_000), 10_000);
        assert_eq!(min_difference(5_000_000), 50_000);
    }

    #[test]
    fn with_gas_limit_preserves_caller_and_resets_hash() {
        let sender = devnode_eth::Address::random();
        let transaction = devnode_evm::test_utils::dummy_eip155_transaction(sender, 0);
        let original_hash = *transaction.transaction_hash();

        let modified = with_gas_limit(&transaction, 100_000);

        assert_eq!(modified.caller(), &sender);
        assert_eq!(modified.gas_limit(), 100_000);
        assert_ne!(modified.transaction_hash(), &original_hash);
    }
}
