use alloy_rlp::{RlpDecodable, RlpEncodable};

use crate::{Address, U256};

/// A validator withdrawal, as included in blocks since the Shanghai hardfork.
#[derive(
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    RlpDecodable,
    RlpEncodable,
    serde::Deserialize,
    serde::Serialize,
)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    /// The unique id of the withdrawal.
    #[serde(with = "crate::serde::u64")]
    pub index: u64,
    /// The id of the validator initiating the withdrawal.
    #[serde(with = "crate::serde::u64")]
    pub validator_index: u64,
    /// The recipient address of the withdrawn ether.
    pub address: Address,
    /// The amount withdrawn, in gwei.
    pub amount: U256,
}
