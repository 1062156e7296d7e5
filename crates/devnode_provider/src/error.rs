use std::time::SystemTime;

use devnode_eth::{
    filter::SubscriptionType, signature::SignatureError, Address, BlockSpec, Bytes, Hardfork,
    B256, U256,
};
use devnode_evm::{
    blockchain::{BlockchainError, ForkedCreationError, InvalidGenesisBlock},
    executor::{ExecutorError, HaltReason},
    mempool::MemPoolAddTransactionError,
    state::StateError,
    MineBlockError, MineTransactionError,
};
use devnode_rpc_client::RpcClientError;

/// An error that occurs when creating a provider.
#[derive(Debug, thiserror::Error)]
pub enum CreationError {
    /// A blockchain error
    #[error(transparent)]
    Blockchain(#[from] BlockchainError),
    /// An error that occurred while constructing a forked blockchain.
    #[error(transparent)]
    ForkedBlockchainCreation(#[from] ForkedCreationError),
    /// Invalid genesis block.
    #[error(transparent)]
    InvalidGenesisBlock(#[from] InvalidGenesisBlock),
    /// Invalid HTTP header name or value.
    #[error("Invalid HTTP header: {0}")]
    InvalidHttpHeaders(String),
    /// Invalid initial date
    #[error("The initial date configuration value {0:?} is before the UNIX epoch")]
    InvalidInitialDate(SystemTime),
    /// An error that occurred while querying the remote node.
    #[error(transparent)]
    RpcClient(#[from] RpcClientError),
}

/// An error that occurs when handling a provider operation.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The transaction's gas price is lower than the next block's base fee,
    /// while automatically mining.
    #[error(
        "Transaction gasPrice ({actual}) is too low for the next block, which has a baseFeePerGas of {expected}"
    )]
    AutoMineGasPriceTooLow {
        /// The next block's base fee
        expected: u128,
        /// The transaction's gas price
        actual: u128,
    },
    /// The transaction's max fee per gas is lower than the next block's base
    /// fee, while automatically mining.
    #[error(
        "Transaction maxFeePerGas ({actual}) is too low for the next block, which has a baseFeePerGas of {expected}"
    )]
    AutoMineMaxFeePerGasTooLow {
        /// The next block's base fee
        expected: u128,
        /// The transaction's max fee per gas
        actual: u128,
    },
    /// The transaction nonce is too high, while automatically mining.
    #[error(
        "Nonce too high. Expected nonce to be {expected} but got {actual}. Note that transactions can't be queued when automining."
    )]
    AutoMineNonceTooHigh {
        /// The sender's next nonce
        expected: u64,
        /// The transaction's nonce
        actual: u64,
    },
    /// The transaction nonce is too low, while automatically mining.
    #[error(
        "Nonce too low. Expected nonce to be {expected} but got {actual}. Note that transactions can't be queued when automining."
    )]
    AutoMineNonceTooLow {
        /// The sender's next nonce
        expected: u64,
        /// The transaction's nonce
        actual: u64,
    },
    /// The transaction's priority fee is lower than the minimum gas price,
    /// while automatically mining.
    #[error("Transaction gas price is {actual}, which is below the minimum of {expected}")]
    AutoMinePriorityFeeTooLow {
        /// The configured minimum gas price
        expected: u128,
        /// The transaction's priority fee
        actual: u128,
    },
    /// Blockchain error
    #[error(transparent)]
    Blockchain(#[from] BlockchainError),
    /// An error that occurred while recreating the provider.
    #[error(transparent)]
    Creation(#[from] CreationError),
    /// A semantically invalid argument, detected before any state mutation.
    #[error("{0}")]
    InvalidArgument(String),
    /// Block number or hash doesn't exist in blockchain
    #[error(
        "Received invalid block tag {block_spec}. Latest block number is {latest_block_number}"
    )]
    InvalidBlockNumberOrHash {
        /// The requested block spec
        block_spec: BlockSpec,
        /// The latest block number
        latest_block_number: u64,
    },
    /// The transaction's chain id doesn't match the provider's chain id.
    #[error("Trying to send an incompatible EIP-155 transaction, signed for another chain.")]
    InvalidChainId {
        /// The provider's chain id
        expected: u64,
        /// The transaction's chain id
        actual: u64,
    },
    /// The transaction with the provided hash was already mined.
    #[error("Transaction {0} cannot be dropped because it's already mined")]
    InvalidDropTransactionHash(B256),
    /// The filter with the provided id collects a different kind of event.
    #[error(
        "Subscription {filter_id} is not a {expected:?} subscription, but a {actual:?} subscription"
    )]
    InvalidFilterSubscriptionType {
        /// The filter's id
        filter_id: U256,
        /// The expected subscription type
        expected: SubscriptionType,
        /// The actual subscription type
        actual: SubscriptionType,
    },
    /// A semantically invalid request given the current chain state.
    #[error("{0}")]
    InvalidInput(String),
    /// An error occurred while adding a pending transaction to the mem pool.
    #[error(transparent)]
    MemPoolAddTransaction(#[from] MemPoolAddTransactionError),
    /// An error occurred while updating the mem pool.
    #[error(transparent)]
    MemPoolUpdate(StateError),
    /// An error occurred while mining a block.
    #[error(transparent)]
    MineBlock(#[from] MineBlockError),
    /// An error occurred while mining a block with a single transaction.
    #[error(transparent)]
    MineTransaction(#[from] MineTransactionError),
    /// Rpc client error
    #[error(transparent)]
    RpcClient(#[from] RpcClientError),
    /// An error occurred while executing a transaction in a call context.
    #[error(transparent)]
    RunTransaction(#[from] ExecutorError),
    /// The proposed nonce is lower than the account's current nonce.
    #[error("New nonce ({proposed}) must not be smaller than the existing nonce ({previous})")]
    SetAccountNonceLowerThanCurrent {
        /// The account's current nonce
        previous: u64,
        /// The proposed nonce
        proposed: u64,
    },
    /// Cannot set account nonce when the mem pool is not empty
    #[error("Cannot set account nonce when the transaction pool is not empty")]
    SetAccountNonceWithPendingTransactions,
    /// The next block's base fee cannot be set on a pre-London hardfork.
    #[error("setNextBlockBaseFeePerGas is disabled because EIP-1559 is not active")]
    SetNextBlockBaseFeePerGasUnsupported {
        /// The current hardfork
        hardfork: Hardfork,
    },
    /// An error occurred while recovering a signature.
    #[error(transparent)]
    Signature(#[from] SignatureError),
    /// State error
    #[error(transparent)]
    State(#[from] StateError),
    /// Timestamp equals previous timestamp
    #[error(
        "Timestamp {proposed} is equal to the previous block's timestamp. Enable the 'allowBlocksWithSameTimestamp' option to allow this"
    )]
    TimestampEqualsPrevious {
        /// The proposed timestamp
        proposed: u64,
    },
    /// Timestamp lower than previous timestamp
    #[error("Timestamp {proposed} is lower than the previous block's timestamp {previous}")]
    TimestampLowerThanPrevious {
        /// The proposed timestamp
        proposed: u64,
        /// The previous block's timestamp
        previous: u64,
    },
    /// A transaction failed during execution and bail-on-failure was enabled.
    #[error(transparent)]
    TransactionFailed(#[from] Box<TransactionFailure>),
    /// The address is not owned by this provider.
    #[error("Unknown account {address}")]
    UnknownAddress {
        /// The address
        address: Address,
    },
    /// An access list transaction was received on a pre-Berlin hardfork.
    #[error("Access list received but is not supported by the current hardfork")]
    UnsupportedAccessListParameter {
        /// The current hardfork
        current_hardfork: Hardfork,
    },
    /// An EIP-1559 transaction was received on a pre-London hardfork.
    #[error(
        "EIP-1559 style fee params (maxFeePerGas or maxPriorityFeePerGas) received but they are not supported by the current hardfork"
    )]
    UnsupportedEip1559Parameters {
        /// The current hardfork
        current_hardfork: Hardfork,
    },
    /// A method that mimics a real node's surface but is intentionally not
    /// implemented.
    #[error("{method_name} - Method not supported")]
    UnsupportedMethod {
        /// The name of the method
        method_name: String,
    },
}

/// A failed transaction execution, reported when bail-on-failure semantics
/// are enabled.
#[derive(Clone, Debug, thiserror::Error)]
pub struct TransactionFailure {
    /// The reason the execution failed.
    pub reason: TransactionFailureReason,
    /// The raw return data, as `0x`-prefixed hex.
    pub data: String,
    /// The hash of the failed transaction, if it was mined.
    pub transaction_hash: Option<B256>,
}

impl TransactionFailure {
    /// Constructs an instance for a reverted execution.
    pub fn revert(output: Bytes, transaction_hash: Option<B256>) -> Self {
        let data = format!("0x{}", hex::encode(&output));

        Self {
            reason: TransactionFailureReason::Revert(output),
            data,
            transaction_hash,
        }
    }

    /// Constructs an instance for a halted execution.
    pub fn halt(reason: HaltReason, transaction_hash: Option<B256>) -> Self {
        Self {
            reason: TransactionFailureReason::Halt(reason),
            data: "0x".to_string(),
            transaction_hash,
        }
    }
}

impl std::fmt::Display for TransactionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            TransactionFailureReason::Halt(HaltReason::OutOfGas) => {
                write!(f, "Transaction ran out of gas")
            }
            TransactionFailureReason::Revert(output) => {
                if output.is_empty() {
                    write!(f, "Transaction reverted without a reason string")
                } else {
                    write!(f, "Transaction reverted with data: {}", self.data)
                }
            }
        }
    }
}

/// The reason a transaction execution failed.
#[derive(Clone, Debug)]
pub enum TransactionFailureReason {
    /// The execution was halted.
    Halt(HaltReason),
    /// The execution explicitly reverted.
    Revert(Bytes),
}
