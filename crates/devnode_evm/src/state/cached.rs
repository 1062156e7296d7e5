use devnode_eth::{
    account::AccountInfo, Address, Bytes, HashMap, B256, KECCAK_EMPTY, U256,
};

use super::{RemoteState, State, StateError};

/// A cached account along with its cached storage slots.
#[derive(Clone, Debug, Default)]
struct AccountAndStorage {
    info: AccountInfo,
    storage: HashMap<U256, U256>,
}

/// A [`RemoteState`] with an in-memory cache layered on top. Entries are
/// keyed by block number so that repinning the remote view doesn't serve
/// stale data.
#[derive(Debug)]
pub struct CachedRemoteState {
    remote: RemoteState,
    /// Mapping of block numbers to cached accounts
    account_cache: HashMap<u64, HashMap<Address, AccountAndStorage>>,
    /// Mapping of block numbers to cached code
    code_cache: HashMap<u64, HashMap<B256, Bytes>>,
}

impl CachedRemoteState {
    /// Constructs a new instance, wrapping the provided remote view.
    pub fn new(remote: RemoteState) -> Self {
        Self {
            remote,
            account_cache: HashMap::new(),
            code_cache: HashMap::new(),
        }
    }

    /// Retrieves the block number the underlying view is pinned to.
    pub fn block_number(&self) -> u64 {
        self.remote.block_number()
    }

    /// Retrieves basic account information, fetching it from the remote node
    /// if it isn't cached.
    pub fn basic(&mut self, address: Address) -> Result<Option<AccountInfo>, StateError> {
        if let Some(cached_accounts) = self.account_cache.get(&self.remote.block_number()) {
            if let Some(account) = cached_accounts.get(&address) {
                return Ok(Some(account.info.clone()));
            }
        }

        if let Some(account_info) = self.remote.basic(address)? {
            if self.remote.is_cacheable()? {
                let account_info = self.cache_account(address, account_info);
                return Ok(Some(account_info));
            }

            return Ok(Some(account_info));
        }

        Ok(None)
    }

    /// Retrieves the code corresponding to the provided hash from the code
    /// cache.
    pub fn code_by_hash(&mut self, code_hash: B256) -> Result<Bytes, StateError> {
        if let Some(cached_code) = self.code_cache.get(&self.remote.block_number()) {
            if let Some(code) = cached_code.get(&code_hash) {
                return Ok(code.clone());
            }
        }

        Err(StateError::InvalidCodeHash { code_hash })
    }

    /// Retrieves the value of the account's storage slot, fetching it from
    /// the remote node if it isn't cached.
    pub fn storage(&mut self, address: Address, index: U256) -> Result<U256, StateError> {
        if let Some(cached_accounts) = self.account_cache.get(&self.remote.block_number()) {
            if let Some(value) = cached_accounts
                .get(&address)
                .and_then(|account| account.storage.get(&index))
            {
                return Ok(*value);
            }
        }

        let value = self.remote.storage(address, index)?;

        if self.remote.is_cacheable()? {
            self.account_cache
                .entry(self.remote.block_number())
                .or_default()
                .entry(address)
                .or_default()
                .storage
                .insert(index, value);
        }

        Ok(value)
    }

    /// Caches the account and splits its code into the code cache. Code is
    /// identified by its hash, so it never goes stale.
    fn cache_account(&mut self, address: Address, mut account_info: AccountInfo) -> AccountInfo {
        if let Some(code) = account_info.code.take() {
            if account_info.code_hash != KECCAK_EMPTY {
                self.code_cache
                    .entry(self.remote.block_number())
                    .or_default()
                    .insert(account_info.code_hash, code);
            }
        }

        self.account_cache
            .entry(self.remote.block_number())
            .or_default()
            .entry(address)
            .or_default()
            .info = account_info.clone();

        account_info
    }
}
