#![warn(missing_docs)]

//! JSON-RPC client for remote Ethereum nodes, with a disk cache for immutable
//! responses.

/// Mirror types for blocks, as they appear on the wire.
pub mod block;
/// Response caching.
pub mod cache;
mod client;
/// Metadata about a forked chain.
pub mod fork;
/// Types specific to the JSON-RPC protocol.
pub mod jsonrpc;
mod request;
mod reqwest_error;
/// Mirror types for transactions, as they appear on the wire.
pub mod transaction;

pub use reqwest::header::{self, HeaderMap};

pub use self::{
    client::{RpcClient, RpcClientError},
    request::RequestMethod,
    reqwest_error::{MiddlewareError, ReqwestError},
};
