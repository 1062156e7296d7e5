use std::sync::Arc;

use devnode_eth::{
    account::AccountInfo, Address, BlockSpec, Bytes, B256, KECCAK_EMPTY, U256,
};
use devnode_rpc_client::RpcClient;
use tokio::runtime;

use super::{State, StateError};

/// A read-only view of a remote node's state at a pinned block number.
#[derive(Debug)]
pub struct RemoteState {
    client: Arc<RpcClient>,
    runtime: runtime::Handle,
    block_number: u64,
}

impl RemoteState {
    /// Constructs a new instance.
    pub fn new(runtime: runtime::Handle, client: Arc<RpcClient>, block_number: u64) -> Self {
        Self {
            client,
            runtime,
            block_number,
        }
    }

    /// Retrieves the block number the view is pinned to.
    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    /// Whether responses for the pinned block number are safe to cache, i.e.
    /// the block is deep enough that a reorg is deemed impossible.
    pub fn is_cacheable(&self) -> Result<bool, StateError> {
        Ok(tokio::task::block_in_place(move || {
            self.runtime
                .block_on(self.client.is_cacheable_block_number(self.block_number))
        })?)
    }

    /// Repins the view to the provided block number.
    pub fn set_block_number(&mut self, block_number: u64) {
        self.block_number = block_number;
    }
}

impl State for RemoteState {
    fn basic(&self, address: Address) -> Result<Option<AccountInfo>, StateError> {
        let account_info = tokio::task::block_in_place(move || {
            self.runtime.block_on(self.client.get_account_info(
                address,
                Some(BlockSpec::Number(self.block_number)),
            ))
        })?;

        // The remote node reports non-existing accounts as all-zero. Use
        // bitwise AND to avoid short-circuiting.
        if (account_info.code_hash == KECCAK_EMPTY)
            & (account_info.nonce == 0)
            & (account_info.balance == U256::ZERO)
        {
            return Ok(None);
        }

        Ok(Some(account_info))
    }

    fn code_by_hash(&self, code_hash: B256) -> Result<Bytes, StateError> {
        // The JSON-RPC API addresses code by account, not by hash. Callers
        // are expected to request code through `basic` instead.
        Err(StateError::InvalidCodeHash { code_hash })
    }

    fn storage(&self, address: Address, index: U256) -> Result<U256, StateError> {
        Ok(tokio::task::block_in_place(move || {
            self.runtime.block_on(self.client.get_storage_at(
                address,
                index,
                Some(BlockSpec::Number(self.block_number)),
            ))
        })?
        .unwrap_or(U256::ZERO))
    }
}
