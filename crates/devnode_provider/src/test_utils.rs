//! Helpers for constructing providers in tests.

use std::{num::NonZeroU64, path::PathBuf, sync::Arc};

use devnode_eth::{
    signature::{secret_key_from_str, secret_key_to_address},
    transaction::{self, TransactionRequestAndSender},
    Address, Bytes, HashMap, TxKind, B256, U256,
};
use devnode_evm::executor::TransferExecutor;
use tokio::runtime;

use crate::{
    config::{AccountConfig, MiningConfig, ProviderConfig},
    data::ProviderData,
    time::CurrentTime,
    ProviderError,
};

/// The secret keys of the provider's owned accounts in tests. These are the
/// first well-known development accounts, so blame anyone who sends real
/// funds to them.
pub const TEST_SECRET_KEYS: [&str; 3] = [
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
    "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
    "5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a",
];

/// The genesis balance of each owned account in tests: 10,000 ether.
pub const TEST_ACCOUNT_BALANCE: u128 = 10_000_000_000_000_000_000_000;

/// Constructs a provider configuration for local tests.
pub fn create_test_config(cache_dir: PathBuf) -> ProviderConfig {
    let accounts = TEST_SECRET_KEYS
        .iter()
        .map(|secret_key| AccountConfig {
            secret_key: secret_key_from_str(secret_key)
                .expect("the test secret keys are valid"),
            balance: U256::from(TEST_ACCOUNT_BALANCE),
        })
        .collect();

    ProviderConfig {
        accounts,
        allow_blocks_with_same_timestamp: false,
        bail_on_call_failure: false,
        bail_on_transaction_failure: false,
        block_gas_limit: NonZeroU64::new(30_000_000).expect("gas limit is non-zero"),
        cache_dir,
        chain_id: 123,
        coinbase: Address::random(),
        fork: None,
        genesis_accounts: HashMap::default(),
        hardfork: devnode_eth::Hardfork::default(),
        initial_base_fee_per_gas: None,
        initial_date: None,
        min_gas_price: 0,
        mining: MiningConfig::default(),
        network_id: 123,
    }
}

/// A local provider with a dedicated runtime and cache directory, torn down
/// when the fixture is dropped.
pub struct ProviderTestFixture {
    _runtime: runtime::Runtime,
    _cache_dir: tempfile::TempDir,
    /// The configuration the provider was created with.
    pub config: ProviderConfig,
    /// The provider under test.
    pub provider_data: ProviderData<CurrentTime>,
    /// The hash of the genesis block.
    pub genesis_block_hash: B256,
}

impl ProviderTestFixture {
    /// Constructs a fixture with a local blockchain.
    pub fn new_local() -> anyhow::Result<Self> {
        Self::new_local_with_config(|_config| {})
    }

    /// Constructs a fixture with a local blockchain, applying the provided
    /// adjustments to the test configuration first.
    pub fn new_local_with_config(
        adjust_config: impl FnOnce(&mut ProviderConfig),
    ) -> anyhow::Result<Self> {
        let cache_dir = tempfile::TempDir::new()?;
        let mut config = create_test_config(cache_dir.path().to_path_buf());
        adjust_config(&mut config);

        let runtime = runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;

        let subscriber_callback: Arc<dyn crate::SyncSubscriberCallback> = Arc::new(|_event| {});

        let provider_data = ProviderData::new(
            runtime.handle().clone(),
            Arc::new(TransferExecutor),
            subscriber_callback,
            config.clone(),
            CurrentTime,
        )?;

        let genesis_block_hash = *provider_data.last_block()?.hash();

        Ok(Self {
            _runtime: runtime,
            _cache_dir: cache_dir,
            config,
            provider_data,
            genesis_block_hash,
        })
    }

    /// The address of the owned account at the index.
    pub fn account(&self, index: usize) -> Address {
        secret_key_to_address(&self.config.accounts[index].secret_key)
    }

    /// Constructs a transfer request from the owned account at the index.
    pub fn dummy_transaction_request(
        &self,
        account_index: usize,
        nonce: u64,
    ) -> TransactionRequestAndSender {
        self.dummy_transaction_request_for_sender(self.account(account_index), nonce)
    }

    /// Constructs a transfer request from an arbitrary sender.
    pub fn dummy_transaction_request_for_sender(
        &self,
        sender: Address,
        nonce: u64,
    ) -> TransactionRequestAndSender {
        let request = transaction::Request::Eip1559(transaction::request::Eip1559 {
            chain_id: self.config.chain_id,
            nonce,
            max_priority_fee_per_gas: 1_000_000_000,
            max_fee_per_gas: 10_000_000_000,
            gas_limit: 30_000,
            kind: TxKind::Call(Address::random()),
            value: U256::from(1),
            input: Bytes::new(),
            access_list: Vec::new(),
        });

        TransactionRequestAndSender { request, sender }
    }

    /// Constructs and signs a transfer from the owned account at the index.
    pub fn signed_dummy_transaction(
        &self,
        account_index: usize,
        nonce: u64,
    ) -> Result<transaction::Signed, ProviderError> {
        let request = self.dummy_transaction_request(account_index, nonce);
        self.provider_data.sign_transaction_request(request)
    }

    /// Constructs a fake-signed transfer with an empty input, whose execution
    /// costs exactly the intrinsic gas.
    pub fn fake_transfer_transaction(
        &self,
        account_index: usize,
        nonce: u64,
    ) -> transaction::Signed {
        let TransactionRequestAndSender { request, sender } =
            self.dummy_transaction_request(account_index, nonce);

        request.fake_sign(sender)
    }
}
