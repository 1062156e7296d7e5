use std::num::NonZeroU64;

use devnode_eth::{
    account::AccountInfo,
    transaction::{self, request},
    Address, Bytes, HashMap, TxKind, U256,
};

use crate::{
    mempool::{MemPool, MemPoolAddTransactionError},
    state::{StateError, TrieState},
};

/// A test fixture for `MemPool`.
pub struct MemPoolTestFixture {
    /// The mem pool.
    pub mem_pool: MemPool,
    /// The state.
    pub state: TrieState,
}

impl MemPoolTestFixture {
    /// Constructs an instance with the provided accounts.
    pub fn with_accounts(accounts: &[(Address, AccountInfo)]) -> Self {
        let accounts = accounts.iter().cloned().collect::<HashMap<_, _>>();
        let trie = TrieState::with_accounts(&accounts);

        MemPoolTestFixture {
            // SAFETY: literal is non-zero
            mem_pool: MemPool::new(unsafe { NonZeroU64::new_unchecked(10_000_000) }),
            state: trie,
        }
    }

    /// Tries to add the provided transaction to the mem pool.
    pub fn add_transaction(
        &mut self,
        transaction: transaction::Signed,
    ) -> Result<(), MemPoolAddTransactionError> {
        self.mem_pool.add_transaction(&self.state, transaction)
    }

    /// Sets the block gas limit and updates the mem pool.
    pub fn set_block_gas_limit(&mut self, block_gas_limit: NonZeroU64) -> Result<(), StateError> {
        self.mem_pool
            .set_block_gas_limit(&self.state, block_gas_limit)
    }

    /// Updates the mem pool.
    pub fn update(&mut self) -> Result<(), StateError> {
        self.mem_pool.update(&self.state)
    }
}

/// Creates a dummy EIP-155 transaction.
pub fn dummy_eip155_transaction(caller: Address, nonce: u64) -> transaction::Signed {
    dummy_eip155_transaction_with_price(caller, nonce, 0)
}

/// Creates a dummy EIP-155 transaction with the provided gas price.
pub fn dummy_eip155_transaction_with_price(
    caller: Address,
    nonce: u64,
    gas_price: u128,
) -> transaction::Signed {
    dummy_eip155_transaction_with_price_and_limit(caller, nonce, gas_price, 30_000)
}

/// Creates a dummy EIP-155 transaction with the provided gas limit.
pub fn dummy_eip155_transaction_with_limit(
    caller: Address,
    nonce: u64,
    gas_limit: u64,
) -> transaction::Signed {
    dummy_eip155_transaction_with_price_and_limit(caller, nonce, 0, gas_limit)
}

fn dummy_eip155_transaction_with_price_and_limit(
    caller: Address,
    nonce: u64,
    gas_price: u128,
    gas_limit: u64,
) -> transaction::Signed {
    dummy_eip155_transaction_with_price_limit_and_value(
        caller,
        nonce,
        gas_price,
        gas_limit,
        U256::ZERO,
    )
}

/// Creates a dummy EIP-155 transaction with the provided gas price, gas
/// limit, and value.
pub fn dummy_eip155_transaction_with_price_limit_and_value(
    caller: Address,
    nonce: u64,
    gas_price: u128,
    gas_limit: u64,
    value: U256,
) -> transaction::Signed {
    let request = request::Eip155 {
        nonce,
        gas_price,
        gas_limit,
        kind: TxKind::Call(Address::random()),
        value,
        input: Bytes::new(),
        chain_id: 123,
    };

    request.fake_sign(caller).into()
}

/// Creates a dummy EIP-1559 transaction with the provided maximum and
/// maximum priority fees per gas.
pub fn dummy_eip1559_transaction(
    caller: Address,
    nonce: u64,
    max_fee_per_gas: u128,
    max_priority_fee_per_gas: u128,
) -> transaction::Signed {
    let request = request::Eip1559 {
        chain_id: 123,
        nonce,
        max_priority_fee_per_gas,
        max_fee_per_gas,
        gas_limit: 30_000,
        kind: TxKind::Call(Address::random()),
        value: U256::ZERO,
        input: Bytes::new(),
        access_list: Vec::new(),
    };

    request.fake_sign(caller).into()
}
