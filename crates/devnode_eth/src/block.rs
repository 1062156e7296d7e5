mod reorg;

use alloy_primitives::keccak256;
use alloy_rlp::BufMut;

pub use self::reorg::{
    block_time, is_safe_block_number, largest_safe_block_number, safe_block_depth,
    IsSafeBlockNumberArgs, LargestSafeBlockNumberArgs, DEFAULT_SAFE_BLOCK_DEPTH,
};
use crate::{
    trie::{ordered_trie_root, KECCAK_NULL_RLP},
    withdrawal::Withdrawal,
    Address, Bloom, Bytes, Hardfork, B256, B64, KECCAK_RLP_EMPTY_ARRAY, U256,
};

/// The initial base fee of a chain's first EIP-1559 block, in wei.
pub const INITIAL_BASE_FEE: u128 = 1_000_000_000;

/// The amount of blob gas consumed by one blob.
pub const GAS_PER_BLOB: u64 = 1 << 17;

/// The target total blob gas per block (EIP-4844).
pub const TARGET_BLOB_GAS_PER_BLOCK: u64 = 3 * GAS_PER_BLOB;

/// Blob gas information of a block, added by EIP-4844.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct BlobGas {
    /// The total blob gas consumed by the block's transactions.
    #[serde(rename = "blobGasUsed", with = "crate::serde::u64")]
    pub gas_used: u64,
    /// The running total of blob gas consumed in excess of the target.
    #[serde(rename = "excessBlobGas", with = "crate::serde::u64")]
    pub excess_gas: u64,
}

impl alloy_rlp::Encodable for BlobGas {
    // Encoded as two consecutive header fields, not as a list.
    fn encode(&self, out: &mut dyn BufMut) {
        self.gas_used.encode(out);
        self.excess_gas.encode(out);
    }

    fn length(&self) -> usize {
        self.gas_used.length() + self.excess_gas.length()
    }
}

impl alloy_rlp::Decodable for BlobGas {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        Ok(Self {
            gas_used: u64::decode(buf)?,
            excess_gas: u64::decode(buf)?,
        })
    }
}

/// An Ethereum block header.
#[derive(
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    alloy_rlp::RlpDecodable,
    alloy_rlp::RlpEncodable,
    serde::Deserialize,
    serde::Serialize,
)]
#[serde(rename_all = "camelCase")]
#[rlp(trailing)]
pub struct BlockHeader {
    /// The parent block's hash.
    pub parent_hash: B256,
    /// The ommers' root hash.
    pub ommers_hash: B256,
    /// The block's beneficiary address.
    pub beneficiary: Address,
    /// The state's root hash.
    pub state_root: B256,
    /// The transactions' root hash.
    pub transactions_root: B256,
    /// The receipts' root hash.
    pub receipts_root: B256,
    /// The logs' bloom.
    pub logs_bloom: Bloom,
    /// The block's difficulty.
    pub difficulty: U256,
    /// The block's number.
    #[serde(with = "crate::serde::u64")]
    pub number: u64,
    /// The block's gas limit.
    #[serde(with = "crate::serde::u64")]
    pub gas_limit: u64,
    /// The amount of gas used by the block.
    #[serde(with = "crate::serde::u64")]
    pub gas_used: u64,
    /// The block's timestamp.
    #[serde(with = "crate::serde::u64")]
    pub timestamp: u64,
    /// The block's extra data.
    pub extra_data: Bytes,
    /// The block's mix hash, holding the prevrandao value post-merge.
    pub mix_hash: B256,
    /// The block's nonce.
    pub nonce: B64,
    /// `BaseFee` was added by EIP-1559 and is absent in earlier headers.
    #[serde(with = "crate::serde::optional_u128")]
    pub base_fee_per_gas: Option<u128>,
    /// `WithdrawalsHash` was added by EIP-4895 and is absent in earlier
    /// headers.
    pub withdrawals_root: Option<B256>,
    /// Blob gas was added by EIP-4844 and is absent in earlier headers.
    #[serde(flatten)]
    pub blob_gas: Option<BlobGas>,
    /// The hash tree root of the parent beacon block for the given execution
    /// block (EIP-4788).
    pub parent_beacon_block_root: Option<B256>,
}

impl BlockHeader {
    /// Constructs a header from the provided [`PartialHeader`] and the
    /// hashtree root of the transactions.
    pub fn new(partial_header: PartialHeader, transactions_root: B256) -> Self {
        Self {
            parent_hash: partial_header.parent_hash,
            ommers_hash: partial_header.ommers_hash,
            beneficiary: partial_header.beneficiary,
            state_root: partial_header.state_root,
            transactions_root,
            receipts_root: partial_header.receipts_root,
            logs_bloom: partial_header.logs_bloom,
            difficulty: partial_header.difficulty,
            number: partial_header.number,
            gas_limit: partial_header.gas_limit,
            gas_used: partial_header.gas_used,
            timestamp: partial_header.timestamp,
            extra_data: partial_header.extra_data,
            mix_hash: partial_header.mix_hash,
            nonce: partial_header.nonce,
            base_fee_per_gas: partial_header.base_fee,
            withdrawals_root: partial_header.withdrawals_root,
            blob_gas: partial_header.blob_gas,
            parent_beacon_block_root: partial_header.parent_beacon_block_root,
        }
    }

    /// Calculates the block's hash.
    pub fn hash(&self) -> B256 {
        let encoded = alloy_rlp::encode(self);
        keccak256(encoded)
    }
}

/// Values that override the defaults a [`PartialHeader`] derives from its
/// parent.
#[derive(Clone, Debug, Default)]
pub struct HeaderOverrides {
    /// The parent block's hash.
    pub parent_hash: Option<B256>,
    /// The block's beneficiary address.
    pub beneficiary: Option<Address>,
    /// The block's difficulty.
    pub difficulty: Option<U256>,
    /// The block's number.
    pub number: Option<u64>,
    /// The block's gas limit.
    pub gas_limit: Option<u64>,
    /// The block's timestamp.
    pub timestamp: Option<u64>,
    /// The block's extra data.
    pub extra_data: Option<Bytes>,
    /// The block's mix hash.
    pub mix_hash: Option<B256>,
    /// The block's nonce.
    pub nonce: Option<B64>,
    /// The state's root hash.
    pub state_root: Option<B256>,
    /// The block's base fee per gas.
    pub base_fee: Option<u128>,
    /// The root hash of the block's withdrawals.
    pub withdrawals_root: Option<B256>,
    /// The hash tree root of the parent beacon block.
    pub parent_beacon_block_root: Option<B256>,
}

/// A block header without the ommers hash and transactions root, as known
/// before the block's transactions have been selected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartialHeader {
    /// The parent block's hash.
    pub parent_hash: B256,
    /// The ommers' root hash.
    pub ommers_hash: B256,
    /// The block's beneficiary address.
    pub beneficiary: Address,
    /// The state's root hash.
    pub state_root: B256,
    /// The receipts' root hash.
    pub receipts_root: B256,
    /// The logs' bloom.
    pub logs_bloom: Bloom,
    /// The block's difficulty.
    pub difficulty: U256,
    /// The block's number.
    pub number: u64,
    /// The block's gas limit.
    pub gas_limit: u64,
    /// The amount of gas used by the block.
    pub gas_used: u64,
    /// The block's timestamp.
    pub timestamp: u64,
    /// The block's extra data.
    pub extra_data: Bytes,
    /// The block's mix hash.
    pub mix_hash: B256,
    /// The block's nonce.
    pub nonce: B64,
    /// The block's base fee per gas, for post-London blocks.
    pub base_fee: Option<u128>,
    /// The root hash of the block's withdrawals, for post-Shanghai blocks.
    pub withdrawals_root: Option<B256>,
    /// The block's blob gas information, for post-Cancun blocks.
    pub blob_gas: Option<BlobGas>,
    /// The hash tree root of the parent beacon block, for post-Cancun blocks.
    pub parent_beacon_block_root: Option<B256>,
}

impl PartialHeader {
    /// Constructs a new instance for the provided hardfork, based on the
    /// parent header and (potential) overrides.
    pub fn new(
        hardfork: Hardfork,
        overrides: HeaderOverrides,
        parent: Option<&BlockHeader>,
        withdrawals: Option<&Vec<Withdrawal>>,
    ) -> Self {
        let timestamp = overrides.timestamp.unwrap_or_default();
        let number = overrides.number.unwrap_or_else(|| {
            parent.map_or(0, |parent| parent.number + 1)
        });

        let parent_hash = overrides
            .parent_hash
            .unwrap_or_else(|| parent.map_or(B256::ZERO, BlockHeader::hash));

        let base_fee = overrides.base_fee.or_else(|| {
            if hardfork.supports_eip1559() {
                Some(parent.map_or(INITIAL_BASE_FEE, |parent| {
                    calculate_next_base_fee_per_gas(parent, &BaseFeeParams::ethereum())
                }))
            } else {
                None
            }
        });

        Self {
            parent_hash,
            ommers_hash: KECCAK_RLP_EMPTY_ARRAY,
            beneficiary: overrides.beneficiary.unwrap_or_default(),
            state_root: overrides.state_root.unwrap_or(KECCAK_NULL_RLP),
            receipts_root: KECCAK_NULL_RLP,
            logs_bloom: Bloom::default(),
            difficulty: overrides.difficulty.unwrap_or_else(|| {
                if hardfork.is_post_merge() {
                    U256::ZERO
                } else {
                    U256::from(1)
                }
            }),
            number,
            gas_limit: overrides.gas_limit.unwrap_or(1_000_000),
            gas_used: 0,
            timestamp,
            extra_data: overrides.extra_data.unwrap_or_default(),
            mix_hash: overrides.mix_hash.unwrap_or_default(),
            nonce: overrides.nonce.unwrap_or_else(|| {
                if hardfork.is_post_merge() {
                    B64::ZERO
                } else {
                    B64::from(66u64)
                }
            }),
            base_fee,
            withdrawals_root: overrides.withdrawals_root.or_else(|| {
                if hardfork >= Hardfork::Shanghai {
                    let withdrawals_root = withdrawals.map_or(KECCAK_NULL_RLP, |withdrawals| {
                        ordered_trie_root(withdrawals.iter().map(alloy_rlp::encode))
                    });

                    Some(withdrawals_root)
                } else {
                    None
                }
            }),
            blob_gas: if hardfork >= Hardfork::Cancun {
                // For the first post-fork block, both parent.gas_used and
                // parent.excess_gas are evaluated as 0.
                let excess_gas = parent.and_then(|parent| parent.blob_gas.as_ref()).map_or(
                    0,
                    |BlobGas {
                         gas_used,
                         excess_gas,
                     }| {
                        (excess_gas + gas_used).saturating_sub(TARGET_BLOB_GAS_PER_BLOCK)
                    },
                );

                Some(BlobGas {
                    gas_used: 0,
                    excess_gas,
                })
            } else {
                None
            },
            parent_beacon_block_root: overrides.parent_beacon_block_root.or_else(|| {
                if hardfork >= Hardfork::Cancun {
                    // Initial value from https://eips.ethereum.org/EIPS/eip-4788
                    Some(B256::ZERO)
                } else {
                    None
                }
            }),
        }
    }
}

impl From<BlockHeader> for PartialHeader {
    fn from(header: BlockHeader) -> PartialHeader {
        Self {
            parent_hash: header.parent_hash,
            ommers_hash: header.ommers_hash,
            beneficiary: header.beneficiary,
            state_root: header.state_root,
            receipts_root: header.receipts_root,
            logs_bloom: header.logs_bloom,
            difficulty: header.difficulty,
            number: header.number,
            gas_limit: header.gas_limit,
            gas_used: header.gas_used,
            timestamp: header.timestamp,
            extra_data: header.extra_data,
            mix_hash: header.mix_hash,
            nonce: header.nonce,
            base_fee: header.base_fee_per_gas,
            withdrawals_root: header.withdrawals_root,
            blob_gas: header.blob_gas,
            parent_beacon_block_root: header.parent_beacon_block_root,
        }
    }
}

/// EIP-1559 base fee parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BaseFeeParams {
    /// The maximum fraction by which the base fee can change between blocks.
    pub max_change_denominator: u128,
    /// The multiplier relating a block's gas limit to its gas target.
    pub elasticity_multiplier: u128,
}

impl BaseFeeParams {
    /// The base fee parameters of the L1 chain.
    pub const fn ethereum() -> Self {
        Self {
            max_change_denominator: 8,
            elasticity_multiplier: 2,
        }
    }
}

/// Calculates the next base fee for a post-London block, given the parent's
/// header.
pub fn calculate_next_base_fee_per_gas(parent: &BlockHeader, params: &BaseFeeParams) -> u128 {
    let gas_used = u128::from(parent.gas_used);
    let gas_limit = u128::from(parent.gas_limit);

    // EIP-1559 specifies an initial base fee block number at which to use the
    // initial base fee, but we always use it if the parent block is missing
    // the base fee.
    let base_fee = parent.base_fee_per_gas.unwrap_or(INITIAL_BASE_FEE);

    let gas_target = gas_limit / params.elasticity_multiplier;

    match gas_used.cmp(&gas_target) {
        core::cmp::Ordering::Equal => base_fee,
        core::cmp::Ordering::Greater => {
            base_fee
                + core::cmp::max(
                    // Ensure a minimum increase of 1.
                    1,
                    base_fee * (gas_used - gas_target)
                        / (gas_target * params.max_change_denominator),
                )
        }
        core::cmp::Ordering::Less => base_fee.saturating_sub(
            base_fee * (gas_target - gas_used) / (gas_target * params.max_change_denominator),
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use alloy_rlp::Decodable as _;

    use super::*;

    #[test]
    fn header_rlp_roundtrip() {
        let mut header = BlockHeader {
            number: 124,
            gas_used: 1337,
            nonce: B64::from(99u64),
            ..BlockHeader::default()
        };

        let encoded = alloy_rlp::encode(&header);
        let decoded = BlockHeader::decode(&mut encoded.as_slice()).unwrap();
        assert_eq!(header, decoded);

        header.base_fee_per_gas = Some(12345);

        let encoded = alloy_rlp::encode(&header);
        let decoded = BlockHeader::decode(&mut encoded.as_slice()).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    // Test vector from: https://eips.ethereum.org/EIPS/eip-2481
    fn encode_legacy_block_header() {
        let expected = hex::decode("f901f9a00000000000000000000000000000000000000000000000000000000000000000a00000000000000000000000000000000000000000000000000000000000000000940000000000000000000000000000000000000000a00000000000000000000000000000000000000000000000000000000000000000a00000000000000000000000000000000000000000000000000000000000000000a00000000000000000000000000000000000000000000000000000000000000000b90100000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000008208ae820d0582115c8215b3821a0a827788a00000000000000000000000000000000000000000000000000000000000000000880000000000000000").unwrap();

        let header = BlockHeader {
            difficulty: U256::from(0x8aeu64),
            number: 0xd05u64,
            gas_limit: 0x115cu64,
            gas_used: 0x15b3u64,
            timestamp: 0x1a0au64,
            extra_data: hex::decode("7788").unwrap().into(),
            ..BlockHeader::default()
        };

        let encoded = alloy_rlp::encode(&header);
        assert_eq!(encoded, expected);

        let decoded = BlockHeader::decode(&mut expected.as_slice()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    // Test vector from: https://github.com/ethereum/tests/blob/f47bbef4da376a49c8fc3166f09ab8a6d182f765/BlockchainTests/ValidBlocks/bcEIP1559/baseFee.json#L15-L36
    fn eip1559_block_header_hash() {
        let expected_hash =
            B256::from_str("0x6a251c7c3c5dca7b42407a3752ff48f3bbca1fab7f9868371d9918daf1988d1f")
                .unwrap();
        let header = BlockHeader {
            parent_hash: B256::from_str(
                "0xe0a94a7a3c9617401586b1a27025d2d9671332d22d540e0af72b069170380f2a",
            )
            .unwrap(),
            ommers_hash: B256::from_str(
                "0x1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347",
            )
            .unwrap(),
            beneficiary: Address::from_str("0xba5e000000000000000000000000000000000000").unwrap(),
            state_root: B256::from_str(
                "0xec3c94b18b8a1cff7d60f8d258ec723312932928626b4c9355eb4ab3568ec7f7",
            )
            .unwrap(),
            transactions_root: B256::from_str(
                "0x50f738580ed699f0469702c7ccc63ed2e51bc034be9479b7bff4e68dee84accf",
            )
            .unwrap(),
            receipts_root: B256::from_str(
                "0x29b0562f7140574dd0d50dee8a271b22e1a0a7b78fca58f7c60370d8317ba2a9",
            )
            .unwrap(),
            logs_bloom: Bloom::ZERO,
            difficulty: U256::from(0x020000u64),
            number: 0x01,
            gas_limit: 0x0163_4578_5d8a_0000,
            gas_used: 0x015534,
            timestamp: 0x079e,
            extra_data: hex::decode("42").unwrap().into(),
            mix_hash: B256::ZERO,
            nonce: B64::ZERO,
            base_fee_per_gas: Some(0x036b),
            withdrawals_root: None,
            blob_gas: None,
            parent_beacon_block_root: None,
        };
        assert_eq!(header.hash(), expected_hash);
    }

    #[test]
    // Test vector from https://github.com/ethereum/tests/blob/a33949df17a1c382ffee5666e66d26bde7a089f9/EIPTests/Pyspecs/cancun/eip4844_blobs/correct_increasing_blob_gas_costs.json#L16
    fn cancun_block_header_hash() {
        let expected_hash =
            B256::from_str("0xd2caf87ef0ecbbf1d8721e4f63d56b3a5b4bf8b5faa0409aa6b99a729affe346")
                .unwrap();

        let header = BlockHeader {
            parent_hash: B256::from_str(
                "0x258811d02512e87e09253a948330eff05da06b7656143a211fa3687901217f57",
            )
            .unwrap(),
            ommers_hash: KECCAK_RLP_EMPTY_ARRAY,
            beneficiary: Address::from_str("0x2adc25665018aa1fe0e6bc666dac8fc2697ff9ba").unwrap(),
            state_root: B256::from_str(
                "0x6a086c92bb1d4ee6dc4ca73e66529037591bd4d6590350f6c904bc78dc21b75c",
            )
            .unwrap(),
            transactions_root: B256::from_str(
                "0xdc387fc6ef9e3eb53baa85df89a1f9b91a4a9ab472ee7e928b4b7fdc06dfa5d1",
            )
            .unwrap(),
            receipts_root: B256::from_str(
                "0xeaa8c40899a61ae59615cf9985f5e2194f8fd2b57d273be63bde6733e89b12ab",
            )
            .unwrap(),
            logs_bloom: Bloom::ZERO,
            difficulty: U256::ZERO,
            number: 0x01u64,
            gas_limit: 0x0163_4578_5d8a_0000u64,
            gas_used: 0x5208u64,
            timestamp: 0x0cu64,
            extra_data: Bytes::default(),
            mix_hash: B256::ZERO,
            nonce: B64::ZERO,
            base_fee_per_gas: Some(0x07),
            withdrawals_root: Some(KECCAK_NULL_RLP),
            blob_gas: Some(BlobGas {
                gas_used: 0x080000u64,
                excess_gas: 0x220000u64,
            }),
            parent_beacon_block_root: Some(B256::ZERO),
        };

        assert_eq!(header.hash(), expected_hash);
    }

    fn next_base_fee(parent_base_fee: u128, parent_gas_used: u64) -> u128 {
        let parent = BlockHeader {
            gas_limit: 84_000,
            gas_used: parent_gas_used,
            base_fee_per_gas: Some(parent_base_fee),
            ..BlockHeader::default()
        };

        calculate_next_base_fee_per_gas(&parent, &BaseFeeParams::ethereum())
    }

    #[test]
    fn base_fee_unchanged_at_gas_target() {
        assert_eq!(next_base_fee(1_000_000_000, 42_000), 1_000_000_000);
    }

    #[test]
    fn base_fee_sequence() {
        assert_eq!(next_base_fee(1_000_000_000, 0), 875_000_000);
        assert_eq!(next_base_fee(875_000_000, 21_000), 820_312_500);
        assert_eq!(next_base_fee(820_312_500, 63_000), 871_582_031);
        assert_eq!(next_base_fee(871_582_031, 84_000), 980_529_784);
    }

    #[test]
    fn base_fee_minimum_increase() {
        assert_eq!(next_base_fee(7, 42_001), 8);
    }

    #[test]
    fn partial_header_post_merge_defaults() {
        let header = PartialHeader::new(
            Hardfork::Cancun,
            HeaderOverrides::default(),
            None,
            None,
        );

        assert_eq!(header.number, 0);
        assert_eq!(header.difficulty, U256::ZERO);
        assert_eq!(header.nonce, B64::ZERO);
        assert_eq!(header.base_fee, Some(INITIAL_BASE_FEE));
        assert_eq!(header.withdrawals_root, Some(KECCAK_NULL_RLP));
        assert_eq!(header.parent_beacon_block_root, Some(B256::ZERO));
        assert_eq!(
            header.blob_gas,
            Some(BlobGas {
                gas_used: 0,
                excess_gas: 0
            })
        );
    }

    #[test]
    fn partial_header_derives_from_parent() {
        let parent = BlockHeader {
            number: 10,
            gas_limit: 84_000,
            gas_used: 84_000,
            base_fee_per_gas: Some(1_000_000_000),
            ..BlockHeader::default()
        };

        let header = PartialHeader::new(
            Hardfork::Cancun,
            HeaderOverrides::default(),
            Some(&parent),
            None,
        );

        assert_eq!(header.number, 11);
        assert_eq!(header.parent_hash, parent.hash());
        assert_eq!(header.base_fee, Some(1_125_000_000));
    }
}
