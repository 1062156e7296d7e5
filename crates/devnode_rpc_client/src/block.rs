use devnode_eth::{
    block::{BlobGas, BlockHeader},
    withdrawal::Withdrawal,
    Address, Bloom, Bytes, B256, B64, U256,
};
use serde::{Deserialize, Serialize};

/// block object returned by `eth_getBlockBy*`
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Block<TransactionT> {
    /// Hash of the block. None when its pending block.
    pub hash: Option<B256>,
    /// hash of the parent block.
    pub parent_hash: B256,
    /// SHA3 of the uncles data in the block
    pub sha3_uncles: B256,
    /// the root of the final state trie of the block
    pub state_root: B256,
    /// the root of the transaction trie of the block
    pub transactions_root: B256,
    /// the root of the receipts trie of the block
    pub receipts_root: B256,
    /// the block number. None when its pending block.
    #[serde(with = "devnode_eth::serde::optional_u64")]
    pub number: Option<u64>,
    /// the total used gas by all transactions in this block
    #[serde(with = "devnode_eth::serde::u64")]
    pub gas_used: u64,
    /// the maximum gas allowed in this block
    #[serde(with = "devnode_eth::serde::u64")]
    pub gas_limit: u64,
    /// the "extra data" field of this block
    pub extra_data: Bytes,
    /// the bloom filter for the logs of the block
    pub logs_bloom: Bloom,
    /// the unix timestamp for when the block was collated
    #[serde(with = "devnode_eth::serde::u64")]
    pub timestamp: u64,
    /// integer of the difficulty for this block
    pub difficulty: U256,
    /// integer of the total difficulty of the chain until this block
    pub total_difficulty: Option<U256>,
    /// Array of uncle hashes
    #[serde(default)]
    pub uncles: Vec<B256>,
    /// Array of transaction objects, or 32 Bytes transaction hashes depending
    /// on the last given parameter
    #[serde(default)]
    pub transactions: Vec<TransactionT>,
    /// the length of the RLP encoding of this block in bytes
    #[serde(with = "devnode_eth::serde::u64")]
    pub size: u64,
    /// Mix hash. None when it's a pending block.
    pub mix_hash: Option<B256>,
    /// hash of the generated proof-of-work. null when its pending block.
    pub nonce: Option<B64>,
    /// base fee per gas
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "devnode_eth::serde::optional_u128"
    )]
    pub base_fee_per_gas: Option<u128>,
    /// the address of the beneficiary to whom the mining rewards were given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub miner: Option<Address>,
    /// withdrawals
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdrawals: Option<Vec<Withdrawal>>,
    /// withdrawals root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdrawals_root: Option<B256>,
    /// The total amount of blob gas used by the transactions.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "devnode_eth::serde::optional_u64"
    )]
    pub blob_gas_used: Option<u64>,
    /// A running total of blob gas consumed in excess of the target, prior to
    /// the block.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "devnode_eth::serde::optional_u64"
    )]
    pub excess_blob_gas: Option<u64>,
    /// Root of the parent beacon block
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_beacon_block_root: Option<B256>,
}

/// Error that occurs when trying to convert the JSON-RPC `Block` type.
#[derive(Debug, thiserror::Error)]
pub enum MissingFieldError {
    /// Missing hash
    #[error("Missing hash")]
    Hash,
    /// Missing miner
    #[error("Missing miner")]
    Miner,
    /// Missing mix hash
    #[error("Missing mix hash")]
    MixHash,
    /// Missing nonce
    #[error("Missing nonce")]
    Nonce,
    /// Missing number
    #[error("Missing number")]
    Number,
}

impl<TransactionT> TryFrom<&Block<TransactionT>> for BlockHeader {
    type Error = MissingFieldError;

    fn try_from(value: &Block<TransactionT>) -> Result<Self, Self::Error> {
        let header = BlockHeader {
            parent_hash: value.parent_hash,
            ommers_hash: value.sha3_uncles,
            beneficiary: value.miner.ok_or(MissingFieldError::Miner)?,
            state_root: value.state_root,
            transactions_root: value.transactions_root,
            receipts_root: value.receipts_root,
            logs_bloom: value.logs_bloom,
            difficulty: value.difficulty,
            number: value.number.ok_or(MissingFieldError::Number)?,
            gas_limit: value.gas_limit,
            gas_used: value.gas_used,
            timestamp: value.timestamp,
            extra_data: value.extra_data.clone(),
            mix_hash: value.mix_hash.ok_or(MissingFieldError::MixHash)?,
            nonce: value.nonce.ok_or(MissingFieldError::Nonce)?,
            base_fee_per_gas: value.base_fee_per_gas,
            withdrawals_root: value.withdrawals_root,
            blob_gas: value.blob_gas_used.and_then(|gas_used| {
                value.excess_blob_gas.map(|excess_gas| BlobGas {
                    gas_used,
                    excess_gas,
                })
            }),
            parent_beacon_block_root: value.parent_beacon_block_root,
        };

        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mined_block() -> Block<B256> {
        Block {
            hash: Some(B256::with_last_byte(1)),
            miner: Some(Address::with_last_byte(2)),
            number: Some(42),
            mix_hash: Some(B256::ZERO),
            nonce: Some(B64::ZERO),
            base_fee_per_gas: Some(1_000_000_000),
            gas_limit: 30_000_000,
            ..Block::default()
        }
    }

    #[test]
    fn header_from_mined_block() {
        let block = mined_block();

        let header = BlockHeader::try_from(&block).expect("all fields present");
        assert_eq!(header.number, 42);
        assert_eq!(header.beneficiary, Address::with_last_byte(2));
        assert_eq!(header.base_fee_per_gas, Some(1_000_000_000));
        assert!(header.blob_gas.is_none());
    }

    #[test]
    fn header_from_pending_block_fails() {
        let mut block = mined_block();
        block.number = None;

        assert!(matches!(
            BlockHeader::try_from(&block),
            Err(MissingFieldError::Number)
        ));
    }

    #[test]
    fn pending_block_deserializes_with_null_fields() -> anyhow::Result<()> {
        let json = r#"{
            "hash": null,
            "parentHash": "0x0000000000000000000000000000000000000000000000000000000000000000",
            "sha3Uncles": "0x1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347",
            "stateRoot": "0x0000000000000000000000000000000000000000000000000000000000000000",
            "transactionsRoot": "0x0000000000000000000000000000000000000000000000000000000000000000",
            "receiptsRoot": "0x0000000000000000000000000000000000000000000000000000000000000000",
            "number": null,
            "gasUsed": "0x0",
            "gasLimit": "0x1c9c380",
            "extraData": "0x",
            "logsBloom": "0x00000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000",
            "timestamp": "0x64",
            "difficulty": "0x0",
            "totalDifficulty": null,
            "uncles": [],
            "transactions": [],
            "size": "0x200",
            "mixHash": null,
            "nonce": null
        }"#;

        let block: Block<B256> = serde_json::from_str(json)?;
        assert!(block.hash.is_none());
        assert!(block.number.is_none());
        assert_eq!(block.timestamp, 100);

        Ok(())
    }
}
