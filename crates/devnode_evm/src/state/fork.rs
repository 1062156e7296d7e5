use std::sync::Arc;

use devnode_eth::{
    account::AccountInfo, Address, Bytes, HashSet, B256, U256,
};
use devnode_rpc_client::RpcClient;
use parking_lot::{Mutex, RwLock};
use tokio::runtime;

use super::{
    AccountModifierFn, CachedRemoteState, RemoteState, State, StateCommit, StateDebug, StateDiff,
    StateError, TrieState,
};
use crate::random::RandomHashGenerator;

/// A state consisting of a local overlay on top of a cached remote state at
/// a pinned fork block.
///
/// Zero-valued writes and account removals are recorded as tombstones so
/// that locally deleted data doesn't resurface from the remote node.
#[derive(Debug)]
pub struct ForkState {
    local_state: TrieState,
    remote_state: Arc<Mutex<CachedRemoteState>>,
    removed_storage_slots: HashSet<(Address, U256)>,
    /// (generated state root, local state root the generation is valid for)
    current_state: RwLock<(B256, B256)>,
    hash_generator: Arc<Mutex<RandomHashGenerator>>,
    removed_remote_accounts: HashSet<Address>,
}

impl ForkState {
    /// Constructs a new instance.
    pub fn new(
        runtime: runtime::Handle,
        rpc_client: Arc<RpcClient>,
        hash_generator: Arc<Mutex<RandomHashGenerator>>,
        fork_block_number: u64,
        state_root: B256,
    ) -> Self {
        let remote_state = RemoteState::new(runtime, rpc_client, fork_block_number);

        let local_state = TrieState::default();
        let local_root = local_state
            .state_root()
            .unwrap_or(devnode_eth::trie::KECCAK_NULL_RLP);

        Self {
            local_state,
            remote_state: Arc::new(Mutex::new(CachedRemoteState::new(remote_state))),
            removed_storage_slots: HashSet::new(),
            current_state: RwLock::new((state_root, local_root)),
            hash_generator,
            removed_remote_accounts: HashSet::new(),
        }
    }

    /// Overrides the state root label, e.g. to match a known block header.
    pub fn set_state_root(&mut self, state_root: B256) {
        let local_root = self
            .local_state
            .state_root()
            .unwrap_or(devnode_eth::trie::KECCAK_NULL_RLP);

        *self.current_state.get_mut() = (state_root, local_root);
    }

    /// Copies the remote account into the local overlay, so that debug
    /// mutations operate on the account's current values.
    fn seed_local_account(&mut self, address: Address) -> Result<(), StateError> {
        if self.local_state.basic(address)?.is_none()
            && !self.removed_remote_accounts.contains(&address)
        {
            if let Some(account_info) = self.remote_state.lock().basic(address)? {
                self.local_state.insert_account(address, account_info)?;
            }
        }

        Ok(())
    }
}

impl Clone for ForkState {
    fn clone(&self) -> Self {
        Self {
            local_state: self.local_state.clone(),
            remote_state: self.remote_state.clone(),
            removed_storage_slots: self.removed_storage_slots.clone(),
            current_state: RwLock::new(*self.current_state.read()),
            hash_generator: self.hash_generator.clone(),
            removed_remote_accounts: self.removed_remote_accounts.clone(),
        }
    }
}

impl State for ForkState {
    fn basic(&self, address: Address) -> Result<Option<AccountInfo>, StateError> {
        if let Some(account_info) = self.local_state.basic(address)? {
            return Ok(Some(account_info));
        }

        if self.removed_remote_accounts.contains(&address) {
            return Ok(None);
        }

        self.remote_state.lock().basic(address)
    }

    fn code_by_hash(&self, code_hash: B256) -> Result<Bytes, StateError> {
        self.local_state
            .code_by_hash(code_hash)
            .or_else(|_error| self.remote_state.lock().code_by_hash(code_hash))
    }

    fn storage(&self, address: Address, index: U256) -> Result<U256, StateError> {
        let local = self.local_state.storage(address, index)?;
        if local == U256::ZERO && !self.removed_storage_slots.contains(&(address, index)) {
            self.remote_state.lock().storage(address, index)
        } else {
            Ok(local)
        }
    }
}

impl StateCommit for ForkState {
    fn commit(&mut self, diff: StateDiff) {
        for (address, change) in diff.as_inner() {
            if change.info.is_none() {
                self.removed_remote_accounts.insert(*address);
            }

            for (index, value) in &change.storage {
                if *value == U256::ZERO {
                    self.removed_storage_slots.insert((*address, *index));
                }
            }
        }

        self.local_state.commit(diff);
    }
}

impl StateDebug for ForkState {
    fn account_storage_root(&self, address: &Address) -> Result<Option<B256>, StateError> {
        self.local_state.account_storage_root(address)
    }

    fn insert_account(
        &mut self,
        address: Address,
        account_info: AccountInfo,
    ) -> Result<(), StateError> {
        self.local_state.insert_account(address, account_info)
    }

    fn modify_account(
        &mut self,
        address: Address,
        modifier: AccountModifierFn,
    ) -> Result<AccountInfo, StateError> {
        self.seed_local_account(address)?;

        self.local_state.modify_account(address, modifier)
    }

    fn remove_account(&mut self, address: Address) -> Result<Option<AccountInfo>, StateError> {
        if let Some(account_info) = self.local_state.remove_account(address)? {
            return Ok(Some(account_info));
        }

        if self.removed_remote_accounts.contains(&address) {
            return Ok(None);
        }

        let account_info = self.remote_state.lock().basic(address)?;
        if account_info.is_some() {
            self.removed_remote_accounts.insert(address);
        }

        Ok(account_info)
    }

    fn set_account_storage_slot(
        &mut self,
        address: Address,
        index: U256,
        value: U256,
    ) -> Result<U256, StateError> {
        let old_value = self.storage(address, index)?;

        if value == U256::ZERO {
            self.removed_storage_slots.insert((address, index));
        }

        self.seed_local_account(address)?;
        self.local_state
            .set_account_storage_slot(address, index, value)?;

        Ok(old_value)
    }

    fn state_root(&self) -> Result<B256, StateError> {
        let local_root = self.local_state.state_root()?;

        let current_state = self.current_state.upgradable_read();

        if current_state.1 == local_root {
            return Ok(current_state.0);
        }

        let mut current_state =
            parking_lot::RwLockUpgradableReadGuard::upgrade(current_state);

        let next_state_root = self.hash_generator.lock().generate_next();
        *current_state = (next_state_root, local_root);

        Ok(next_state_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AccountChange;
    use devnode_eth::HashMap;

    fn dummy_fork_state() -> ForkState {
        // A fork state whose remote never gets queried; tests only exercise
        // the local overlay and tombstones.
        let runtime = tokio::runtime::Handle::current();
        let rpc_client = Arc::new(
            RpcClient::new("http://localhost:8545", std::env::temp_dir(), None)
                .expect("url is valid"),
        );
        let hash_generator = Arc::new(Mutex::new(RandomHashGenerator::with_seed("seed")));

        ForkState::new(runtime, rpc_client, hash_generator, 0, B256::ZERO)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn state_root_changes_with_local_mutations() -> anyhow::Result<()> {
        let mut state = dummy_fork_state();

        let initial_root = state.state_root()?;
        assert_eq!(state.state_root()?, initial_root);

        state.insert_account(
            Address::with_last_byte(1),
            AccountInfo::with_balance(U256::from(100u64)),
        )?;

        let next_root = state.state_root()?;
        assert_ne!(next_root, initial_root);
        assert_eq!(state.state_root()?, next_root);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn committed_zero_slots_are_tombstoned() -> anyhow::Result<()> {
        let mut state = dummy_fork_state();
        let address = Address::with_last_byte(1);
        let index = U256::from(1u64);

        let mut storage = HashMap::new();
        storage.insert(index, U256::ZERO);

        let mut changes = HashMap::new();
        changes.insert(
            address,
            AccountChange {
                info: Some(AccountInfo::default()),
                storage,
            },
        );

        state.commit(StateDiff::from(changes));

        // The tombstone keeps the read from falling through to the remote.
        assert_eq!(state.storage(address, index)?, U256::ZERO);

        Ok(())
    }
}
