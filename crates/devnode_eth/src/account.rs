use alloy_rlp::{RlpDecodable, RlpEncodable};

use crate::{trie::KECCAK_NULL_RLP, Bytes, B256, KECCAK_EMPTY, U256};

/// Basic account information: the state of an account outside of its storage.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct AccountInfo {
    /// The account's balance, in wei.
    pub balance: U256,
    /// The account's nonce.
    pub nonce: u64,
    /// Keccak-256 hash of the account's code.
    pub code_hash: B256,
    /// The account's code, if it has been loaded. A `None` value does not
    /// mean the account has no code; `code_hash` is authoritative.
    pub code: Option<Bytes>,
}

impl Default for AccountInfo {
    fn default() -> Self {
        Self {
            balance: U256::ZERO,
            nonce: 0,
            code_hash: KECCAK_EMPTY,
            code: None,
        }
    }
}

impl AccountInfo {
    /// Constructs an account holding the provided balance and nothing else.
    pub fn with_balance(balance: U256) -> Self {
        Self {
            balance,
            ..Self::default()
        }
    }

    /// Whether the account is empty according to EIP-161: no code, zero
    /// nonce, and zero balance.
    pub fn is_empty(&self) -> bool {
        self.balance == U256::ZERO && self.nonce == 0 && self.code_hash == KECCAK_EMPTY
    }
}

/// An account, as stored in the state trie.
#[derive(Clone, Debug, PartialEq, Eq, RlpDecodable, RlpEncodable)]
pub struct BasicAccount {
    /// The account's nonce.
    pub nonce: u64,
    /// The account's balance.
    pub balance: U256,
    /// Root of the account's storage trie.
    pub storage_root: B256,
    /// Keccak-256 hash of the account's code.
    pub code_hash: B256,
}

impl Default for BasicAccount {
    fn default() -> Self {
        Self {
            nonce: 0,
            balance: U256::ZERO,
            storage_root: KECCAK_NULL_RLP,
            code_hash: KECCAK_EMPTY,
        }
    }
}

impl From<&AccountInfo> for BasicAccount {
    fn from(info: &AccountInfo) -> Self {
        Self {
            nonce: info.nonce,
            balance: info.balance,
            storage_root: KECCAK_NULL_RLP,
            code_hash: info.code_hash,
        }
    }
}
