use devnode_eth::{account::AccountInfo, Address, HashMap, U256};

/// The changes to a single account resulting from transaction execution.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountChange {
    /// The new account information. `None` signals that the account was
    /// removed.
    pub info: Option<AccountInfo>,
    /// Changed storage slots. A zero value removes the slot.
    pub storage: HashMap<U256, U256>,
}

/// The accumulated difference between two states, as produced by executing
/// one or more transactions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateDiff {
    inner: HashMap<Address, AccountChange>,
}

impl StateDiff {
    /// Applies a single account change to the diff, overwriting any previous
    /// information for that account while retaining unrelated storage
    /// changes.
    pub fn apply_account_change(&mut self, address: Address, account_info: AccountInfo) {
        self.inner.entry(address).or_default().info = Some(account_info);
    }

    /// Marks the account as removed.
    pub fn apply_account_removal(&mut self, address: Address) {
        let change = self.inner.entry(address).or_default();
        change.info = None;
        change.storage.clear();
    }

    /// Applies a single storage change to the diff. A zero value removes the
    /// slot.
    pub fn apply_storage_change(&mut self, address: Address, index: U256, value: U256) {
        self.inner
            .entry(address)
            .or_default()
            .storage
            .insert(index, value);
    }

    /// Applies the changes of the provided diff on top of this one.
    pub fn apply_diff(&mut self, diff: StateDiff) {
        for (address, change) in diff.inner {
            match self.inner.entry(address) {
                std::collections::hash_map::Entry::Occupied(mut entry) => {
                    let existing = entry.get_mut();
                    existing.info = change.info;
                    existing.storage.extend(change.storage);
                }
                std::collections::hash_map::Entry::Vacant(entry) => {
                    entry.insert(change);
                }
            }
        }
    }

    /// Retrieves the inner changes, keyed by account address.
    pub fn as_inner(&self) -> &HashMap<Address, AccountChange> {
        &self.inner
    }

    /// Whether the diff contains no changes.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl From<HashMap<Address, AccountChange>> for StateDiff {
    fn from(inner: HashMap<Address, AccountChange>) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use devnode_eth::{KECCAK_EMPTY, U256};

    use super::*;

    #[test]
    fn later_changes_win() {
        let address = Address::with_last_byte(1);

        let mut diff = StateDiff::default();
        diff.apply_account_change(
            address,
            AccountInfo {
                balance: U256::from(100u64),
                nonce: 0,
                code_hash: KECCAK_EMPTY,
                code: None,
            },
        );
        diff.apply_storage_change(address, U256::from(1u64), U256::from(7u64));

        let mut second = StateDiff::default();
        second.apply_account_change(
            address,
            AccountInfo {
                balance: U256::from(50u64),
                nonce: 1,
                code_hash: KECCAK_EMPTY,
                code: None,
            },
        );
        second.apply_storage_change(address, U256::from(2u64), U256::from(9u64));

        diff.apply_diff(second);

        let change = &diff.as_inner()[&address];
        assert_eq!(
            change.info.as_ref().map(|info| info.nonce),
            Some(1),
        );
        // Storage changes from both diffs are retained.
        assert_eq!(change.storage.len(), 2);
    }
}
