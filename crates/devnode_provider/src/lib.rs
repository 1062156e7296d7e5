#![warn(missing_docs)]

//! A local Ethereum development node.
//!
//! The provider owns a blockchain, a mem pool, and a set of unlocked
//! accounts. Transactions are executed instantly when automatic mining is
//! enabled, on a timer with interval mining, or on explicit request. The
//! chain can either start from a fresh genesis block or fork a remote
//! network, continuing it locally.

mod config;
mod data;
mod error;
mod filter;
mod interval;
mod snapshot;
mod subscribe;
/// Helpers for constructing providers in tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
mod time;

pub use self::{
    config::{
        AccountConfig, ForkConfig, IntervalConfig, MemPoolConfig, MiningConfig, ProviderConfig,
    },
    data::{
        BlockDataForTransaction, ForkMetadata, ProviderData, SendTransactionResult,
        TransactionAndBlock,
    },
    error::{CreationError, ProviderError, TransactionFailure, TransactionFailureReason},
    filter::{bloom_contains_log_filter, filter_logs, Filter, FilterData, LogFilter},
    interval::IntervalMiner,
    subscribe::{SubscriptionEvent, SubscriptionEventData, SyncSubscriberCallback},
    time::{CurrentTime, TimeSinceEpoch},
};
