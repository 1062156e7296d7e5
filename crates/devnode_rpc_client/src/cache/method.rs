use devnode_eth::{Address, B256, U256};

use super::{
    block_spec::{
        BlockSpecNotCacheableError, CacheableBlockSpec, PreEip1898BlockSpecNotCacheableError,
        UnresolvedBlockTagError,
    },
    filter::{CacheableLogFilterOptions, LogFilterOptionsNotCacheableError},
    key::{CacheKeyVariant, ReadCacheKey, WriteCacheKey},
    KeyHasher,
};
use crate::request::RequestMethod;

/// Returns the method's [`ReadCacheKey`] if it can be read from the cache.
pub(crate) fn read_cache_key(method: &RequestMethod) -> Option<ReadCacheKey> {
    let cacheable_method = CacheableRequestMethod::try_from(method).ok()?;

    let cache_key = cacheable_method.key_hasher().ok()?.finalize();
    Some(ReadCacheKey(cache_key))
}

/// Returns the method's [`WriteCacheKey`] if it can be written to the cache.
pub(crate) fn write_cache_key(method: &RequestMethod) -> Option<WriteCacheKey> {
    CacheableRequestMethod::try_from(method)
        .ok()
        .and_then(CacheableRequestMethod::into_write_cache_key)
}

/// Potentially cacheable Ethereum JSON-RPC methods.
#[derive(Clone, Debug)]
pub(crate) enum CacheableRequestMethod<'a> {
    /// `eth_getBalance`
    GetBalance {
        address: &'a Address,
        block_spec: CacheableBlockSpec<'a>,
    },
    /// `eth_getBlockByNumber`
    GetBlockByNumber {
        block_spec: CacheableBlockSpec<'a>,
        include_transaction_data: bool,
    },
    /// `eth_getBlockByHash`
    GetBlockByHash {
        block_hash: &'a B256,
        include_transaction_data: bool,
    },
    /// `eth_getCode`
    GetCode {
        address: &'a Address,
        block_spec: CacheableBlockSpec<'a>,
    },
    /// `eth_getLogs`
    GetLogs {
        params: CacheableLogFilterOptions<'a>,
    },
    /// `eth_getStorageAt`
    GetStorageAt {
        address: &'a Address,
        position: &'a U256,
        block_spec: CacheableBlockSpec<'a>,
    },
    /// `eth_getTransactionByHash`
    GetTransactionByHash { transaction_hash: &'a B256 },
    /// `eth_getTransactionCount`
    GetTransactionCount {
        address: &'a Address,
        block_spec: CacheableBlockSpec<'a>,
    },
    /// `eth_getTransactionReceipt`
    GetTransactionReceipt { transaction_hash: &'a B256 },
    /// `net_version`
    NetVersion,
}

impl CacheableRequestMethod<'_> {
    fn key_hasher(&self) -> Result<KeyHasher, UnresolvedBlockTagError> {
        let hasher = KeyHasher::new().hash_u8(self.cache_key_variant());

        let hasher = match self {
            CacheableRequestMethod::GetBalance {
                address,
                block_spec,
            } => hasher.hash_address(address).hash_block_spec(block_spec)?,
            CacheableRequestMethod::GetBlockByNumber {
                block_spec,
                include_transaction_data,
            } => hasher
                .hash_block_spec(block_spec)?
                .hash_bool(*include_transaction_data),
            CacheableRequestMethod::GetBlockByHash {
                block_hash,
                include_transaction_data,
            } => hasher
                .hash_b256(block_hash)
                .hash_bool(*include_transaction_data),
            CacheableRequestMethod::GetCode {
                address,
                block_spec,
            } => hasher.hash_address(address).hash_block_spec(block_spec)?,
            CacheableRequestMethod::GetLogs { params } => hasher.hash_log_filter_options(params)?,
            CacheableRequestMethod::GetStorageAt {
                address,
                position,
                block_spec,
            } => hasher
                .hash_address(address)
                .hash_u256(position)
                .hash_block_spec(block_spec)?,
            CacheableRequestMethod::GetTransactionByHash { transaction_hash } => {
                hasher.hash_b256(transaction_hash)
            }
            CacheableRequestMethod::GetTransactionCount {
                address,
                block_spec,
            } => hasher.hash_address(address).hash_block_spec(block_spec)?,
            CacheableRequestMethod::GetTransactionReceipt { transaction_hash } => {
                hasher.hash_b256(transaction_hash)
            }
            CacheableRequestMethod::NetVersion => hasher,
        };

        Ok(hasher)
    }

    fn into_write_cache_key(self) -> Option<WriteCacheKey> {
        match self.key_hasher() {
            Err(UnresolvedBlockTagError) => MethodWithResolvableBlockTag::new(&self)
                .map(WriteCacheKey::needs_block_tag_resolution),
            Ok(hasher) => match self {
                CacheableRequestMethod::GetBalance { block_spec, .. }
                | CacheableRequestMethod::GetBlockByNumber { block_spec, .. }
                | CacheableRequestMethod::GetCode { block_spec, .. }
                | CacheableRequestMethod::GetStorageAt { block_spec, .. }
                | CacheableRequestMethod::GetTransactionCount { block_spec, .. } => {
                    WriteCacheKey::needs_safety_check(hasher, block_spec)
                }
                CacheableRequestMethod::GetLogs {
                    params: CacheableLogFilterOptions { range, .. },
                } => WriteCacheKey::needs_range_check(hasher, range),
                CacheableRequestMethod::GetBlockByHash { .. }
                | CacheableRequestMethod::GetTransactionByHash { .. }
                | CacheableRequestMethod::GetTransactionReceipt { .. }
                | CacheableRequestMethod::NetVersion => Some(WriteCacheKey::finalize(hasher)),
            },
        }
    }
}

/// Error type for [`CacheableRequestMethod::try_from`].
#[derive(thiserror::Error, Debug)]
pub(crate) enum MethodNotCacheableError {
    #[error(transparent)]
    BlockSpec(#[from] BlockSpecNotCacheableError),
    #[error("Method is not cacheable: {0:?}")]
    RequestMethod(RequestMethod),
    #[error("Get logs input is not cacheable: {0:?}")]
    GetLogsInput(#[from] LogFilterOptionsNotCacheableError),
    #[error(transparent)]
    PreEip1898BlockSpec(#[from] PreEip1898BlockSpecNotCacheableError),
}

impl<'a> TryFrom<&'a RequestMethod> for CacheableRequestMethod<'a> {
    type Error = MethodNotCacheableError;

    fn try_from(value: &'a RequestMethod) -> Result<Self, Self::Error> {
        match value {
            RequestMethod::GetBalance(address, block_spec) => {
                Ok(CacheableRequestMethod::GetBalance {
                    address,
                    block_spec: block_spec.try_into()?,
                })
            }
            RequestMethod::GetBlockByNumber(block_spec, include_transaction_data) => {
                Ok(CacheableRequestMethod::GetBlockByNumber {
                    block_spec: block_spec.try_into()?,
                    include_transaction_data: *include_transaction_data,
                })
            }
            RequestMethod::GetBlockByHash(block_hash, include_transaction_data) => {
                Ok(CacheableRequestMethod::GetBlockByHash {
                    block_hash,
                    include_transaction_data: *include_transaction_data,
                })
            }
            RequestMethod::GetCode(address, block_spec) => Ok(CacheableRequestMethod::GetCode {
                address,
                block_spec: block_spec.try_into()?,
            }),
            RequestMethod::GetLogs(params) => Ok(CacheableRequestMethod::GetLogs {
                params: params.try_into()?,
            }),
            RequestMethod::GetStorageAt(address, position, block_spec) => {
                Ok(CacheableRequestMethod::GetStorageAt {
                    address,
                    position,
                    block_spec: block_spec.try_into()?,
                })
            }
            RequestMethod::GetTransactionByHash(transaction_hash) => {
                Ok(CacheableRequestMethod::GetTransactionByHash { transaction_hash })
            }
            RequestMethod::GetTransactionCount(address, block_spec) => {
                Ok(CacheableRequestMethod::GetTransactionCount {
                    address,
                    block_spec: block_spec.try_into()?,
                })
            }
            RequestMethod::GetTransactionReceipt(transaction_hash) => {
                Ok(CacheableRequestMethod::GetTransactionReceipt { transaction_hash })
            }
            RequestMethod::NetVersion(_) => Ok(CacheableRequestMethod::NetVersion),

            // Explicit to make sure if a new method is added, it is not forgotten here.
            // Chain id is not cacheable since a remote might change its chain id e.g. if it's a
            // forked node running on localhost.
            RequestMethod::BlockNumber(_) | RequestMethod::ChainId(_) => {
                Err(MethodNotCacheableError::RequestMethod(value.clone()))
            }
        }
    }
}

impl CacheKeyVariant for CacheableRequestMethod<'_> {
    fn cache_key_variant(&self) -> u8 {
        match self {
            // Methods that were dropped from the client keep their old variant number reserved,
            // so that keys never collide across versions.
            CacheableRequestMethod::GetBalance { .. } => 1,
            CacheableRequestMethod::GetBlockByNumber { .. } => 2,
            CacheableRequestMethod::GetBlockByHash { .. } => 3,
            CacheableRequestMethod::GetCode { .. } => 6,
            CacheableRequestMethod::GetLogs { .. } => 7,
            CacheableRequestMethod::GetStorageAt { .. } => 8,
            CacheableRequestMethod::GetTransactionByHash { .. } => 11,
            CacheableRequestMethod::GetTransactionCount { .. } => 12,
            CacheableRequestMethod::GetTransactionReceipt { .. } => 13,
            CacheableRequestMethod::NetVersion => 14,
        }
    }
}

/// Method invocations where, if the block spec argument is symbolic, it can be
/// resolved to a block number from the response.
#[derive(Debug, Clone)]
pub(crate) enum MethodWithResolvableBlockTag {
    GetBlockByNumber { include_transaction_data: bool },
}

impl MethodWithResolvableBlockTag {
    fn new(method: &CacheableRequestMethod<'_>) -> Option<Self> {
        match method {
            CacheableRequestMethod::GetBlockByNumber {
                include_transaction_data,
                block_spec: _,
            } => Some(Self::GetBlockByNumber {
                include_transaction_data: *include_transaction_data,
            }),
            _ => None,
        }
    }

    /// Resolves the symbolic block tag to the provided block number.
    pub(crate) fn resolve(self, block_number: u64) -> Option<WriteCacheKey> {
        match self {
            Self::GetBlockByNumber {
                include_transaction_data,
            } => CacheableRequestMethod::GetBlockByNumber {
                block_spec: CacheableBlockSpec::Number { block_number },
                include_transaction_data,
            }
            .into_write_cache_key(),
        }
    }
}

#[cfg(test)]
mod tests {
    use devnode_eth::{filter::LogFilterOptions, BlockSpec, PreEip1898BlockSpec};

    use super::*;

    #[test]
    fn cache_key_is_a_hex_encoded_hash() {
        let key = read_cache_key(&RequestMethod::NetVersion(())).expect("cacheable");

        // 32 bytes as hex.
        assert_eq!(key.as_ref().len(), 2 * 32);
    }

    #[test]
    fn block_spec_hash_and_number_not_equal() {
        let address = Address::ZERO;

        let key_one = read_cache_key(&RequestMethod::GetBalance(
            address,
            Some(BlockSpec::block_hash(B256::ZERO, None)),
        ))
        .expect("cacheable");
        let key_two = read_cache_key(&RequestMethod::GetBalance(
            address,
            Some(BlockSpec::Number(0)),
        ))
        .expect("cacheable");

        assert_ne!(key_one, key_two);
    }

    #[test]
    fn get_logs_from_to_matters() {
        let filter = |from_block: u64, to_block: u64| {
            RequestMethod::GetLogs(LogFilterOptions {
                from_block: Some(BlockSpec::Number(from_block)),
                to_block: Some(BlockSpec::Number(to_block)),
                block_hash: None,
                address: None,
                topics: None,
            })
        };

        let key_one = read_cache_key(&filter(1, 2)).expect("cacheable");
        let key_two = read_cache_key(&filter(2, 1)).expect("cacheable");

        assert_ne!(key_one, key_two);
    }

    #[test]
    fn same_arguments_different_methods_keys_not_equal() {
        let hash = B256::ZERO;

        let key_one = read_cache_key(&RequestMethod::GetTransactionByHash(hash)).expect("cacheable");
        let key_two =
            read_cache_key(&RequestMethod::GetTransactionReceipt(hash)).expect("cacheable");

        assert_ne!(key_one, key_two);
    }

    #[test]
    fn get_storage_at_block_spec_is_taken_into_account() {
        let address = Address::ZERO;
        let position = U256::ZERO;

        let key_one = read_cache_key(&RequestMethod::GetStorageAt(
            address,
            position,
            Some(BlockSpec::block_hash(B256::ZERO, None)),
        ))
        .expect("cacheable");
        let key_two = read_cache_key(&RequestMethod::GetStorageAt(
            address,
            position,
            Some(BlockSpec::Number(0)),
        ))
        .expect("cacheable");

        assert_ne!(key_one, key_two);
    }

    #[test]
    fn get_storage_at_same_arguments_match() {
        let address = Address::ZERO;
        let position = U256::ZERO;

        let key_one = read_cache_key(&RequestMethod::GetStorageAt(
            address,
            position,
            Some(BlockSpec::Number(1)),
        ))
        .expect("cacheable");
        let key_two = read_cache_key(&RequestMethod::GetStorageAt(
            address,
            position,
            Some(BlockSpec::Number(1)),
        ))
        .expect("cacheable");

        assert_eq!(key_one, key_two);
    }

    #[test]
    fn latest_and_pending_are_not_cacheable() {
        assert!(read_cache_key(&RequestMethod::GetBalance(
            Address::ZERO,
            Some(BlockSpec::latest()),
        ))
        .is_none());

        assert!(read_cache_key(&RequestMethod::GetBlockByNumber(
            PreEip1898BlockSpec::Tag(devnode_eth::BlockTag::Pending),
            false,
        ))
        .is_none());
    }

    #[test]
    fn symbolic_tag_resolves_to_write_key() {
        let method = RequestMethod::GetBlockByNumber(
            PreEip1898BlockSpec::Tag(devnode_eth::BlockTag::Finalized),
            false,
        );

        // Reads miss, as the tag is unresolved.
        assert!(read_cache_key(&method).is_none());

        let key = write_cache_key(&method).expect("resolvable");
        match key {
            WriteCacheKey::NeedsBlockTagResolution(resolver) => {
                // The key of the resolved tag must match a request that used the
                // number directly.
                let resolved = resolver.resolve_block_tag(42).expect("resolves");
                let direct = write_cache_key(&RequestMethod::GetBlockByNumber(
                    PreEip1898BlockSpec::Number(42),
                    false,
                ))
                .expect("cacheable");

                match (resolved, direct) {
                    (
                        crate::cache::key::ResolvedSymbolicTag::NeedsSafetyCheck(resolved),
                        WriteCacheKey::NeedsSafetyCheck(direct),
                    ) => {
                        assert_eq!(
                            resolved.validate_block_number(1, 1_000_000),
                            direct.validate_block_number(1, 1_000_000)
                        );
                    }
                    _ => panic!("expected both keys to need a safety check"),
                }
            }
            _ => panic!("expected a block tag resolution"),
        }
    }
}
