mod cached;
mod diff;
mod fork;
mod remote;
mod trie;

use std::{fmt::Debug, ops::Deref};

use devnode_eth::{account::AccountInfo, Address, Bytes, B256, U256};
use devnode_rpc_client::RpcClientError;

pub use self::{
    cached::CachedRemoteState,
    diff::{AccountChange, StateDiff},
    fork::ForkState,
    remote::RemoteState,
    trie::TrieState,
};

/// Combinatorial error for the state API.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// No code exists for the provided hash.
    #[error("State has no code with hash: {code_hash}")]
    InvalidCodeHash {
        /// The hash without code
        code_hash: B256,
    },
    /// Error from the underlying remote node.
    #[error(transparent)]
    Remote(#[from] RpcClientError),
}

/// Trait for reading state information.
pub trait State {
    /// Retrieves basic information about the account at the address, if it
    /// exists.
    fn basic(&self, address: Address) -> Result<Option<AccountInfo>, StateError>;

    /// Retrieves the code corresponding to the provided hash.
    fn code_by_hash(&self, code_hash: B256) -> Result<Bytes, StateError>;

    /// Retrieves the value of the account's storage slot, or zero if unset.
    fn storage(&self, address: Address, index: U256) -> Result<U256, StateError>;
}

/// Trait for committing execution changes to state.
pub trait StateCommit {
    /// Applies the provided changes to the state.
    fn commit(&mut self, diff: StateDiff);
}

/// A function for modifying an account's balance, nonce, and code.
pub struct AccountModifierFn {
    inner: Box<dyn Fn(&mut U256, &mut u64, &mut Option<Bytes>) + Send>,
}

impl AccountModifierFn {
    /// Constructs an [`AccountModifierFn`] from the provided function.
    pub fn new(modifier: Box<dyn Fn(&mut U256, &mut u64, &mut Option<Bytes>) + Send>) -> Self {
        Self { inner: modifier }
    }
}

impl Debug for AccountModifierFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AccountModifierFn({})",
            std::any::type_name::<dyn Fn(&mut U256, &mut u64, &mut Option<Bytes>)>()
        )
    }
}

impl Deref for AccountModifierFn {
    type Target = dyn Fn(&mut U256, &mut u64, &mut Option<Bytes>);

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

/// Trait for debug operations on state, as used by test setters and root
/// computation.
pub trait StateDebug {
    /// Retrieves the storage root of the account at the address, if it
    /// exists.
    fn account_storage_root(&self, address: &Address) -> Result<Option<B256>, StateError>;

    /// Inserts the provided account at the address, overwriting any existing
    /// account.
    fn insert_account(
        &mut self,
        address: Address,
        account_info: AccountInfo,
    ) -> Result<(), StateError>;

    /// Modifies the account at the address using the provided function. If no
    /// account exists, an empty account is created first. Returns the
    /// modified account.
    fn modify_account(
        &mut self,
        address: Address,
        modifier: AccountModifierFn,
    ) -> Result<AccountInfo, StateError>;

    /// Removes and returns the account at the address, if it exists.
    fn remove_account(&mut self, address: Address) -> Result<Option<AccountInfo>, StateError>;

    /// Sets the storage slot at the address, returning its previous value.
    /// If no account exists, an empty account is created first.
    fn set_account_storage_slot(
        &mut self,
        address: Address,
        index: U256,
        value: U256,
    ) -> Result<U256, StateError>;

    /// Retrieves the state's root.
    fn state_root(&self) -> Result<B256, StateError>;
}

/// The state of the simulated chain, either fully local or layered over a
/// forked remote chain. Cloning is cheap in both cases, which makes per-block
/// state retention and snapshots viable.
#[derive(Clone, Debug)]
pub enum ChainState {
    /// State backed entirely by local storage.
    Local(TrieState),
    /// Local state layered over a cached remote state.
    Fork(ForkState),
}

impl State for ChainState {
    fn basic(&self, address: Address) -> Result<Option<AccountInfo>, StateError> {
        match self {
            ChainState::Local(state) => state.basic(address),
            ChainState::Fork(state) => state.basic(address),
        }
    }

    fn code_by_hash(&self, code_hash: B256) -> Result<Bytes, StateError> {
        match self {
            ChainState::Local(state) => state.code_by_hash(code_hash),
            ChainState::Fork(state) => state.code_by_hash(code_hash),
        }
    }

    fn storage(&self, address: Address, index: U256) -> Result<U256, StateError> {
        match self {
            ChainState::Local(state) => state.storage(address, index),
            ChainState::Fork(state) => state.storage(address, index),
        }
    }
}

impl StateCommit for ChainState {
    fn commit(&mut self, diff: StateDiff) {
        match self {
            ChainState::Local(state) => state.commit(diff),
            ChainState::Fork(state) => state.commit(diff),
        }
    }
}

impl StateDebug for ChainState {
    fn account_storage_root(&self, address: &Address) -> Result<Option<B256>, StateError> {
        match self {
            ChainState::Local(state) => state.account_storage_root(address),
            ChainState::Fork(state) => state.account_storage_root(address),
        }
    }

    fn insert_account(
        &mut self,
        address: Address,
        account_info: AccountInfo,
    ) -> Result<(), StateError> {
        match self {
            ChainState::Local(state) => state.insert_account(address, account_info),
            ChainState::Fork(state) => state.insert_account(address, account_info),
        }
    }

    fn modify_account(
        &mut self,
        address: Address,
        modifier: AccountModifierFn,
    ) -> Result<AccountInfo, StateError> {
        match self {
            ChainState::Local(state) => state.modify_account(address, modifier),
            ChainState::Fork(state) => state.modify_account(address, modifier),
        }
    }

    fn remove_account(&mut self, address: Address) -> Result<Option<AccountInfo>, StateError> {
        match self {
            ChainState::Local(state) => state.remove_account(address),
            ChainState::Fork(state) => state.remove_account(address),
        }
    }

    fn set_account_storage_slot(
        &mut self,
        address: Address,
        index: U256,
        value: U256,
    ) -> Result<U256, StateError> {
        match self {
            ChainState::Local(state) => state.set_account_storage_slot(address, index, value),
            ChainState::Fork(state) => state.set_account_storage_slot(address, index, value),
        }
    }

    fn state_root(&self) -> Result<B256, StateError> {
        match self {
            ChainState::Local(state) => state.state_root(),
            ChainState::Fork(state) => state.state_root(),
        }
    }
}
