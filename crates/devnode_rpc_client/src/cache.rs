/// Types for caching block specifications.
pub mod block_spec;
/// Types for caching filters.
pub mod filter;
mod hasher;
/// Types for indexing the cache.
pub mod key;
mod method;

use std::{
    io,
    path::{Path, PathBuf},
    time::Instant,
};

use serde::de::DeserializeOwned;

pub use self::hasher::KeyHasher;
pub(crate) use self::method::{read_cache_key, write_cache_key};
use crate::RpcClientError;

#[derive(Debug, Clone)]
pub(crate) struct CachedBlockNumber {
    pub block_number: u64,
    pub timestamp: Instant,
}

impl CachedBlockNumber {
    /// Creates a new instance with the current time.
    pub fn new(block_number: u64) -> Self {
        Self {
            block_number,
            timestamp: Instant::now(),
        }
    }
}

/// Wrapper for IO and JSON errors specific to the cache.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An IO error
    #[error(transparent)]
    Io(#[from] io::Error),
    /// A JSON parsing error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub(crate) struct Response {
    pub value: serde_json::Value,
    pub path: PathBuf,
}

impl Response {
    pub async fn parse<T: DeserializeOwned>(self) -> Result<T, RpcClientError> {
        match serde_json::from_value(self.value.clone()) {
            Ok(result) => Ok(result),
            Err(error) => {
                // Remove the file from cache if the contents don't match the expected type.
                // This can happen for example if a new field is added to a type.
                remove_from_cache(&self.path).await?;
                Err(RpcClientError::InvalidResponse {
                    response: self.value.to_string(),
                    expected_type: std::any::type_name::<T>(),
                    error,
                })
            }
        }
    }
}

/// Don't fail the request, just log an error if we fail to read/write from
/// cache.
pub(crate) fn log_error(cache_key: &str, message: &'static str, error: impl Into<Error>) {
    let cache_error = RpcClientError::CacheError {
        message: message.to_string(),
        cache_key: cache_key.to_string(),
        error: error.into(),
    };
    log::error!("{cache_error}");
}

pub(crate) async fn remove_from_cache(path: &Path) -> Result<(), RpcClientError> {
    match tokio::fs::remove_file(path).await {
        Ok(_) => Ok(()),
        Err(error) => {
            log_error(
                path.to_str().unwrap_or("<invalid UTF-8>"),
                "failed to remove from RPC response cache",
                error,
            );
            Ok(())
        }
    }
}
