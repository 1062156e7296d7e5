#![warn(missing_docs)]

//! An in-process Ethereum chain simulation: a mem pool, a block miner, and
//! local and forked blockchains with their backing state implementations.

pub use crate::{
    block::*,
    mempool::{MemPool, MemPoolAddTransactionError, OrderedTransaction},
    miner::*,
    random::RandomHashGenerator,
};

/// Types for Ethereum blocks.
pub mod block;
/// Types for managing an Ethereum blockchain.
pub mod blockchain;
/// Types for executing transactions.
pub mod executor;
/// Types for managing an Ethereum mem pool.
pub mod mempool;
mod miner;
mod random;
/// Types for managing Ethereum state.
pub mod state;
/// Test fixtures shared between this crate's tests and dependent crates.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
