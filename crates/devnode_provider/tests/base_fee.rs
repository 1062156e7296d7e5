#![cfg(feature = "test-utils")]

use std::num::NonZeroU64;

use devnode_eth::{
    transaction::{self, TransactionRequestAndSender},
    Address, Bytes, TxKind, U256,
};
use devnode_provider::test_utils::ProviderTestFixture;

/// The gas cost of a transfer without calldata.
const TRANSFER_GAS: u64 = 21_000;

/// A block gas limit of four transfers, so the EIP-1559 target is two.
const BLOCK_GAS_LIMIT: u64 = 4 * TRANSFER_GAS;

const INITIAL_BASE_FEE: u128 = 1_000_000_000;

fn transfer_fixture() -> anyhow::Result<ProviderTestFixture> {
    let mut fixture = ProviderTestFixture::new_local_with_config(|config| {
        config.block_gas_limit = NonZeroU64::new(BLOCK_GAS_LIMIT).expect("gas limit is non-zero");
        config.initial_base_fee_per_gas = Some(INITIAL_BASE_FEE);
    })?;
    fixture.provider_data.set_auto_mining(false);

    Ok(fixture)
}

/// Sends a transfer sized exactly to the intrinsic gas, so block utilization
/// is a multiple of `TRANSFER_GAS`.
fn send_transfer(fixture: &mut ProviderTestFixture, nonce: u64) -> anyhow::Result<()> {
    let request = transaction::Request::Eip1559(transaction::request::Eip1559 {
        chain_id: fixture.config.chain_id,
        nonce,
        max_priority_fee_per_gas: 1_000_000_000,
        max_fee_per_gas: 10_000_000_000,
        gas_limit: TRANSFER_GAS,
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
    fixture.provider_data.send_transaction(transaction)?;

    Ok(())
}

fn mine_block_with_transfers(
    fixture: &mut ProviderTestFixture,
    first_nonce: u64,
    count: u64,
) -> anyhow::Result<u128> {
    for nonce in first_nonce..first_nonce + count {
        send_transfer(fixture, nonce)?;
    }

    let results = fixture.provider_data.mine_and_commit_blocks(1, 1)?;
    let header = results[0].block.header();

    assert_eq!(results[0].block.transactions().len(), usize::try_from(count)?);
    assert_eq!(header.gas_used, count * TRANSFER_GAS);

    Ok(header.base_fee_per_gas.expect("the chain is post-London"))
}

#[test]
fn base_fee_tracks_block_utilization() -> anyhow::Result<()> {
    let mut fixture = transfer_fixture()?;

    // The first mined block carries the configured initial base fee.
    assert_eq!(
        mine_block_with_transfers(&mut fixture, 0, 0)?,
        INITIAL_BASE_FEE
    );

    // An empty parent lowers the base fee by 1/8.
    assert_eq!(mine_block_with_transfers(&mut fixture, 0, 1)?, 875_000_000);

    // A half-target parent lowers it by 1/16.
    assert_eq!(mine_block_with_transfers(&mut fixture, 1, 3)?, 820_312_500);

    // A parent at 1.5x the target raises it by 1/16.
    assert_eq!(mine_block_with_transfers(&mut fixture, 4, 4)?, 871_582_031);

    // A full parent raises it by 1/8.
    let results = fixture.provider_data.mine_and_commit_blocks(1, 1)?;
    assert_eq!(
        results[0].block.header().base_fee_per_gas,
        Some(980_529_784)
    );

    Ok(())
}

#[test]
fn underpriced_pooled_transaction_is_skipped_when_the_base_fee_rises() -> anyhow::Result<()> {
    let mut fixture = ProviderTestFixture::new_local()?;
    fixture.provider_data.set_auto_mining(false);

    // With automining disabled the fee is not validated on send, so the pool
    // can hold a transaction whose max fee ends up below the block's base fee.
    let mut send_transfer_with_max_fee =
        |account_index: usize, max_fee_per_gas: u128| -> anyhow::Result<()> {
            let request = transaction::Request::Eip1559(transaction::request::Eip1559 {
                chain_id: fixture.config.chain_id,
                nonce: 0,
                max_priority_fee_per_gas: max_fee_per_gas,
                max_fee_per_gas,
                gas_limit: TRANSFER_GAS,
                kind: TxKind::Call(Address::random()),
                value: U256::from(1),
                input: Bytes::new(),
                access_list: Vec::new(),
            });

            let transaction = fixture
                .provider_data
                .sign_transaction_request(TransactionRequestAndSender {
                    request,
                    sender: fixture.account(account_index),
                })?;
            fixture.provider_data.send_transaction(transaction)?;

            Ok(())
        };

    send_transfer_with_max_fee(0, 1_000_000_000)?;
    send_transfer_with_max_fee(1, 10_000_000_000)?;

    fixture
        .provider_data
        .set_next_block_base_fee_per_gas(2_000_000_000)?;

    let results = fixture.provider_data.mine_and_commit_blocks(1, 1)?;
    let header = results[0].block.header();

    // Only the well-priced transfer fits above the base fee; the underpriced
    // one stays in the pool.
    assert_eq!(header.base_fee_per_gas, Some(2_000_000_000));
    assert_eq!(results[0].block.transactions().len(), 1);
    assert!(fixture.provider_data.mem_pool_has_transactions());

    Ok(())
}

#[test]
fn base_fee_is_unchanged_after_a_target_utilized_block() -> anyhow::Result<()> {
    let mut fixture = transfer_fixture()?;

    // Move past the seeded initial base fee first.
    let base_fee = mine_block_with_transfers(&mut fixture, 0, 0)?;
    assert_eq!(base_fee, INITIAL_BASE_FEE);

    // Two transfers hit the target exactly; the next block keeps the parent's
    // base fee.
    let parent_base_fee = mine_block_with_transfers(&mut fixture, 0, 2)?;
    let next_base_fee = mine_block_with_transfers(&mut fixture, 2, 0)?;
    assert_eq!(next_base_fee, parent_base_fee);

    Ok(())
}
