use alloy_primitives::keccak256;
use hash256_std_hasher::Hash256StdHasher;

use crate::{account::BasicAccount, Address, B256, U256};

/// Root of an empty trie: `keccak256(rlp(null))`.
pub const KECCAK_NULL_RLP: B256 = crate::b256!(
    "56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421"
);

/// Keccak-256 hasher for Merkle-Patricia tries.
#[derive(Debug)]
pub struct KeccakHasher;

impl hash_db::Hasher for KeccakHasher {
    type Out = B256;
    type StdHasher = Hash256StdHasher;

    const LENGTH: usize = 32;

    fn hash(x: &[u8]) -> Self::Out {
        keccak256(x)
    }
}

/// Computes the root of a trie whose keys are the RLP encodings of the
/// values' indices, as used for transaction and receipt roots.
pub fn ordered_trie_root<I, V>(input: I) -> B256
where
    I: IntoIterator<Item = V>,
    V: AsRef<[u8]>,
{
    triehash::ordered_trie_root::<KeccakHasher, I>(input)
}

/// Computes the root of a secure trie: keys are hashed before insertion.
pub fn sec_trie_root<I, K, V>(input: I) -> B256
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<[u8]>,
    V: AsRef<[u8]>,
{
    triehash::sec_trie_root::<KeccakHasher, I, K, V>(input)
}

/// Calculates the state root hash of the provided state.
pub fn state_root<'a, I>(state: I) -> B256
where
    I: IntoIterator<Item = (&'a Address, &'a BasicAccount)>,
{
    sec_trie_root(state.into_iter().map(|(address, account)| {
        let account = alloy_rlp::encode(account);
        (address, account)
    }))
}

/// Calculates the storage root hash of the provided storage.
pub fn storage_root<'a, I>(storage: I) -> B256
where
    I: IntoIterator<Item = (&'a U256, &'a U256)>,
{
    sec_trie_root(storage.into_iter().map(|(index, value)| {
        let value = alloy_rlp::encode(value);
        (index.to_be_bytes::<32>(), value)
    }))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::HashMap;

    #[test]
    fn empty_state_root() {
        let state: HashMap<Address, BasicAccount> = HashMap::default();

        assert_eq!(state_root(&state), KECCAK_NULL_RLP);
    }

    #[test]
    fn empty_storage_root() {
        let storage: HashMap<U256, U256> = HashMap::default();

        assert_eq!(storage_root(&storage), KECCAK_NULL_RLP);
    }

    #[test]
    fn precompiles_state_root() {
        const EXPECTED: &str = "0x5766c887a7240e4d1c035ccd3830a2f6a0c03d213a9f0b9b27c774916a4abcce";

        let mut state: HashMap<Address, BasicAccount> = HashMap::default();

        for idx in 1..=8u8 {
            let mut address = Address::ZERO;
            address.0[19] = idx;
            state.insert(address, BasicAccount::default());
        }

        assert_eq!(state_root(&state), B256::from_str(EXPECTED).unwrap());
    }
}
