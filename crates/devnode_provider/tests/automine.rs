#![cfg(feature = "test-utils")]

use devnode_eth::{
    transaction::{self, TransactionRequestAndSender},
    Address, Bytes, Hardfork, TxKind, U256,
};
use devnode_provider::{test_utils::ProviderTestFixture, ProviderError};

fn signed_transfer(
    fixture: &ProviderTestFixture,
    nonce: u64,
    max_priority_fee_per_gas: u128,
    max_fee_per_gas: u128,
) -> Result<transaction::Signed, ProviderError> {
    let request = transaction::Request::Eip1559(transaction::request::Eip1559 {
        chain_id: fixture.config.chain_id,
        nonce,
        max_priority_fee_per_gas,
        max_fee_per_gas,
        gas_limit: 30_000,
        kind: TxKind::Call(Address::random()),
        value: U256::from(1),
        input: Bytes::new(),
        access_list: Vec::new(),
    });

    fixture
        .provider_data
        .sign_transaction_request(TransactionRequestAndSender {
            request,
            sender: fixture.account(0),
        })
}

#[test]
fn reused_nonce_is_rejected_with_a_nonce_too_low_error() -> anyhow::Result<()> {
    let mut fixture = ProviderTestFixture::new_local()?;

    let transaction = signed_transfer(&fixture, 0, 1_000_000_000, 10_000_000_000)?;
    fixture.provider_data.send_transaction(transaction)?;

    let transaction = signed_transfer(&fixture, 0, 1_000_000_000, 10_000_000_000)?;
    let error = fixture
        .provider_data
        .send_transaction(transaction)
        .expect_err("the nonce was already used");

    assert_eq!(
        error.to_string(),
        "Nonce too low. Expected nonce to be 1 but got 0. Note that transactions can't be queued when automining."
    );

    Ok(())
}

#[test]
fn low_max_fee_is_rejected_against_the_next_base_fee() -> anyhow::Result<()> {
    let mut fixture = ProviderTestFixture::new_local()?;

    // The first block's base fee defaults to 1 gwei.
    let transaction = signed_transfer(&fixture, 0, 100_000_000, 500_000_000)?;
    let error = fixture
        .provider_data
        .send_transaction(transaction)
        .expect_err("the max fee is below the next base fee");

    assert_eq!(
        error.to_string(),
        "Transaction maxFeePerGas (500000000) is too low for the next block, which has a baseFeePerGas of 1000000000"
    );

    Ok(())
}

#[test]
fn low_priority_fee_is_rejected_against_the_minimum_gas_price() -> anyhow::Result<()> {
    let mut fixture = ProviderTestFixture::new_local()?;
    fixture.provider_data.set_min_gas_price(2_000_000_000);

    let transaction = signed_transfer(&fixture, 0, 1_000_000_000, 10_000_000_000)?;
    let error = fixture
        .provider_data
        .send_transaction(transaction)
        .expect_err("the priority fee is below the minimum gas price");

    assert_eq!(
        error.to_string(),
        "Transaction gas price is 1000000000, which is below the minimum of 2000000000"
    );

    Ok(())
}

#[test]
fn transactions_signed_for_another_chain_are_rejected() -> anyhow::Result<()> {
    let mut fixture = ProviderTestFixture::new_local()?;

    let request = transaction::Request::Eip1559(transaction::request::Eip1559 {
        chain_id: fixture.config.chain_id + 1,
        nonce: 0,
        max_priority_fee_per_gas: 1_000_000_000,
        max_fee_per_gas: 10_000_000_000,
        gas_limit: 30_000,
        kind: TxKind::Call(Address::random()),
        value: U256::from(1),
        input: Bytes::new(),
        access_list: Vec::new(),
    });
    let transaction = fixture
        .provider_data
        .sign_transaction_request(TransactionRequestAndSender {
            request,
            sender: fixture.account(0),
        })?;

    let error = fixture
        .provider_data
        .send_transaction(transaction)
        .expect_err("the chain id doesn't match");

    assert_eq!(
        error.to_string(),
        "Trying to send an incompatible EIP-155 transaction, signed for another chain."
    );

    Ok(())
}

#[test]
fn fee_market_transactions_are_rejected_before_london() -> anyhow::Result<()> {
    let mut fixture = ProviderTestFixture::new_local_with_config(|config| {
        config.hardfork = Hardfork::Berlin;
    })?;

    let transaction = signed_transfer(&fixture, 0, 1_000_000_000, 10_000_000_000)?;
    let error = fixture
        .provider_data
        .send_transaction(transaction)
        .expect_err("EIP-1559 is not active on Berlin");

    assert_eq!(
        error.to_string(),
        "EIP-1559 style fee params (maxFeePerGas or maxPriorityFeePerGas) received but they are not supported by the current hardfork"
    );

    Ok(())
}

#[test]
fn failed_automining_leaves_no_trace() -> anyhow::Result<()> {
    let mut fixture = ProviderTestFixture::new_local()?;

    let block_number_before = fixture.provider_data.last_block_number();

    let transaction = signed_transfer(&fixture, 5, 1_000_000_000, 10_000_000_000)?;
    fixture
        .provider_data
        .send_transaction(transaction)
        .expect_err("the nonce skips ahead");

    assert_eq!(
        fixture.provider_data.last_block_number(),
        block_number_before
    );
    assert!(!fixture.provider_data.mem_pool_has_transactions());

    Ok(())
}

#[test]
fn disabling_automining_queues_transactions() -> anyhow::Result<()> {
    let mut fixture = ProviderTestFixture::new_local()?;
    fixture.provider_data.set_auto_mining(false);
    assert!(!fixture.provider_data.is_auto_mining());

    let transaction = signed_transfer(&fixture, 0, 1_000_000_000, 10_000_000_000)?;
    let result = fixture.provider_data.send_transaction(transaction)?;

    assert!(result.mining_results.is_empty());
    assert_eq!(fixture.provider_data.last_block_number(), 0);
    assert!(fixture.provider_data.mem_pool_has_transactions());

    Ok(())
}
