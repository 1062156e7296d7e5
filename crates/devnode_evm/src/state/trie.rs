use devnode_eth::{
    account::{AccountInfo, BasicAccount},
    keccak256,
    trie::{state_root, storage_root},
    Address, Bytes, HashMap, B256, KECCAK_EMPTY, U256,
};
use rpds::HashTrieMapSync;

use super::{
    AccountModifierFn, State, StateCommit, StateDebug, StateDiff, StateError,
};

/// An in-memory state backed by persistent maps. Cloning is an O(1)
/// structural share; mutations affect only the clone they are applied to.
#[derive(Clone, Debug)]
pub struct TrieState {
    accounts: HashTrieMapSync<Address, AccountInfo>,
    storage: HashTrieMapSync<Address, HashTrieMapSync<U256, U256>>,
    code: HashTrieMapSync<B256, Bytes>,
}

impl TrieState {
    /// Constructs an instance containing the provided accounts.
    pub fn with_accounts(accounts: &HashMap<Address, AccountInfo>) -> Self {
        let mut state = Self::default();
        for (address, account_info) in accounts {
            let mut account_info = account_info.clone();
            if let Some(code) = account_info.code.take() {
                account_info.code_hash = keccak256(&code);
                state.code.insert_mut(account_info.code_hash, code);
            }
            state.accounts.insert_mut(*address, account_info);
        }
        state
    }

    /// Inserts the code, keyed by its hash, and strips it from the account
    /// information.
    fn split_code(&mut self, account_info: &mut AccountInfo) {
        if let Some(code) = account_info.code.take() {
            if !code.is_empty() {
                account_info.code_hash = keccak256(&code);
                self.code.insert_mut(account_info.code_hash, code);
            } else {
                account_info.code_hash = KECCAK_EMPTY;
            }
        }
    }

    fn account_storage(&self, address: &Address) -> Option<&HashTrieMapSync<U256, U256>> {
        self.storage.get(address)
    }
}

impl Default for TrieState {
    fn default() -> Self {
        Self {
            accounts: HashTrieMapSync::new_sync(),
            storage: HashTrieMapSync::new_sync(),
            code: HashTrieMapSync::new_sync(),
        }
    }
}

impl State for TrieState {
    fn basic(&self, address: Address) -> Result<Option<AccountInfo>, StateError> {
        Ok(self.accounts.get(&address).cloned())
    }

    fn code_by_hash(&self, code_hash: B256) -> Result<Bytes, StateError> {
        if code_hash == KECCAK_EMPTY {
            return Ok(Bytes::new());
        }

        self.code
            .get(&code_hash)
            .cloned()
            .ok_or(StateError::InvalidCodeHash { code_hash })
    }

    fn storage(&self, address: Address, index: U256) -> Result<U256, StateError> {
        Ok(self
            .account_storage(&address)
            .and_then(|storage| storage.get(&index))
            .copied()
            .unwrap_or(U256::ZERO))
    }
}

impl StateCommit for TrieState {
    fn commit(&mut self, diff: StateDiff) {
        for (address, change) in diff.as_inner() {
            match &change.info {
                Some(account_info) => {
                    let mut account_info = account_info.clone();
                    self.split_code(&mut account_info);
                    self.accounts.insert_mut(*address, account_info);
                }
                None => {
                    self.accounts.remove_mut(address);
                    self.storage.remove_mut(address);
                    continue;
                }
            }

            if !change.storage.is_empty() {
                let mut account_storage = self
                    .account_storage(address)
                    .cloned()
                    .unwrap_or_else(HashTrieMapSync::new_sync);

                for (index, value) in &change.storage {
                    if *value == U256::ZERO {
                        account_storage.remove_mut(index);
                    } else {
                        account_storage.insert_mut(*index, *value);
                    }
                }

                self.storage.insert_mut(*address, account_storage);
            }
        }
    }
}

impl StateDebug for TrieState {
    fn account_storage_root(&self, address: &Address) -> Result<Option<B256>, StateError> {
        Ok(self.accounts.get(address).map(|_account_info| {
            self.account_storage(address)
                .map_or(devnode_eth::trie::KECCAK_NULL_RLP, |storage| {
                    storage_root(storage.iter())
                })
        }))
    }

    fn insert_account(
        &mut self,
        address: Address,
        mut account_info: AccountInfo,
    ) -> Result<(), StateError> {
        self.split_code(&mut account_info);
        self.accounts.insert_mut(address, account_info);

        Ok(())
    }

    fn modify_account(
        &mut self,
        address: Address,
        modifier: AccountModifierFn,
    ) -> Result<AccountInfo, StateError> {
        let mut account_info = self
            .accounts
            .get(&address)
            .cloned()
            .unwrap_or_default();

        let mut code = if account_info.code_hash == KECCAK_EMPTY {
            None
        } else {
            Some(self.code_by_hash(account_info.code_hash)?)
        };

        modifier(&mut account_info.balance, &mut account_info.nonce, &mut code);

        match code {
            Some(_) => {
                account_info.code = code;
                self.split_code(&mut account_info);
            }
            // The modifier removed the account's code.
            None => account_info.code_hash = KECCAK_EMPTY,
        }

        self.accounts.insert_mut(address, account_info.clone());

        Ok(account_info)
    }

    fn remove_account(&mut self, address: Address) -> Result<Option<AccountInfo>, StateError> {
        let account_info = self.accounts.get(&address).cloned();

        self.accounts.remove_mut(&address);
        self.storage.remove_mut(&address);

        Ok(account_info)
    }

    fn set_account_storage_slot(
        &mut self,
        address: Address,
        index: U256,
        value: U256,
    ) -> Result<U256, StateError> {
        if !self.accounts.contains_key(&address) {
            self.accounts.insert_mut(address, AccountInfo::default());
        }

        let mut account_storage = self
            .account_storage(&address)
            .cloned()
            .unwrap_or_else(HashTrieMapSync::new_sync);

        let old_value = account_storage
            .get(&index)
            .copied()
            .unwrap_or(U256::ZERO);

        if value == U256::ZERO {
            account_storage.remove_mut(&index);
        } else {
            account_storage.insert_mut(index, value);
        }

        self.storage.insert_mut(address, account_storage);

        Ok(old_value)
    }

    fn state_root(&self) -> Result<B256, StateError> {
        let accounts = self
            .accounts
            .iter()
            .map(|(address, account_info)| {
                let storage_root = self
                    .account_storage(address)
                    .map_or(devnode_eth::trie::KECCAK_NULL_RLP, |storage| {
                        storage_root(storage.iter())
                    });

                let account = BasicAccount {
                    nonce: account_info.nonce,
                    balance: account_info.balance,
                    storage_root,
                    code_hash: account_info.code_hash,
                };

                (address, account)
            })
            .collect::<Vec<_>>();

        Ok(state_root(
            accounts.iter().map(|(address, account)| (*address, account)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use devnode_eth::trie::KECCAK_NULL_RLP;

    use super::*;

    fn dummy_account(balance: u64) -> AccountInfo {
        AccountInfo {
            balance: U256::from(balance),
            ..AccountInfo::default()
        }
    }

    #[test]
    fn empty_state_has_null_root() -> anyhow::Result<()> {
        let state = TrieState::default();
        assert_eq!(state.state_root()?, KECCAK_NULL_RLP);

        Ok(())
    }

    #[test]
    fn clone_is_isolated() -> anyhow::Result<()> {
        let address = Address::with_last_byte(1);

        let mut state = TrieState::default();
        state.insert_account(address, dummy_account(100))?;

        let original_root = state.state_root()?;

        let mut cloned = state.clone();
        cloned.insert_account(Address::with_last_byte(2), dummy_account(200))?;
        cloned.set_account_storage_slot(address, U256::from(1u64), U256::from(7u64))?;

        // The original is unaffected by mutations of the clone.
        assert_eq!(state.state_root()?, original_root);
        assert_ne!(cloned.state_root()?, original_root);
        assert_eq!(state.storage(address, U256::from(1u64))?, U256::ZERO);

        Ok(())
    }

    #[test]
    fn code_round_trips_through_insert() -> anyhow::Result<()> {
        let address = Address::with_last_byte(1);
        let code = Bytes::from_static(b"code");

        let mut state = TrieState::default();
        state.insert_account(
            address,
            AccountInfo {
                code: Some(code.clone()),
                ..AccountInfo::default()
            },
        )?;

        let account_info = state.basic(address)?.expect("account exists");
        assert_eq!(account_info.code_hash, keccak256(&code));
        assert_eq!(state.code_by_hash(account_info.code_hash)?, code);

        Ok(())
    }

    #[test]
    fn modify_account_creates_missing_account() -> anyhow::Result<()> {
        let address = Address::with_last_byte(1);

        let mut state = TrieState::default();
        let account_info = state.modify_account(
            address,
            AccountModifierFn::new(Box::new(|balance, nonce, _code| {
                *balance = U256::from(42u64);
                *nonce = 1;
            })),
        )?;

        assert_eq!(account_info.balance, U256::from(42u64));
        assert_eq!(state.basic(address)?.expect("account exists").nonce, 1);

        Ok(())
    }

    #[test]
    fn zero_valued_slot_is_removed() -> anyhow::Result<()> {
        let address = Address::with_last_byte(1);
        let index = U256::from(1u64);

        let mut state = TrieState::default();
        state.set_account_storage_slot(address, index, U256::from(7u64))?;

        let old_value = state.set_account_storage_slot(address, index, U256::ZERO)?;
        assert_eq!(old_value, U256::from(7u64));

        assert_eq!(
            state.account_storage_root(&address)?,
            Some(KECCAK_NULL_RLP)
        );

        Ok(())
    }
}
