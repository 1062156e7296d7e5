//! Ethereum primitive types for the devnode simulator.

/// EIP-2930 access lists.
pub mod access_list;
/// Account types.
pub mod account;
/// Block header types and base fee calculation.
pub mod block;
/// Block argument specifications for RPC-style lookups.
pub mod block_spec;
/// Filter criteria and results.
pub mod filter;
/// Execution logs and bloom helpers.
pub mod log;
/// Transaction receipts.
pub mod receipt;
/// Serde helpers for 0x-prefixed quantities.
pub mod serde;
/// ECDSA signatures, including fake signatures for impersonated senders.
pub mod signature;
/// Hardforks of the L1 chain.
pub mod spec;
/// Transaction requests and signed transactions.
pub mod transaction;
/// Merkle-Patricia trie root helpers.
pub mod trie;
/// Withdrawals, activated in the Shanghai hardfork.
pub mod withdrawal;

pub use std::collections::{HashMap, HashSet};

pub use alloy_primitives::{
    address, b256, keccak256, Address, Bloom, BloomInput, Bytes, TxKind, B256, B64, U256, U64,
};

pub use self::{
    block_spec::{BlockSpec, BlockTag, Eip1898BlockSpec, PreEip1898BlockSpec},
    spec::Hardfork,
};

/// The id of a chain.
pub type ChainId = u64;

/// Keccak-256 hash of empty code: `keccak256(&[])`.
pub const KECCAK_EMPTY: B256 =
    b256!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470");

/// Keccak-256 hash of the RLP encoding of an empty list, as used for the
/// ommers hash of ommer-less blocks.
pub const KECCAK_RLP_EMPTY_ARRAY: B256 =
    b256!("1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347");
