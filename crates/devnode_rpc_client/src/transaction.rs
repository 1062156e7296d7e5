use std::sync::OnceLock;

use devnode_eth::{
    access_list::AccessListItem,
    signature::{Fakeable, SignatureWithRecoveryId, SignatureWithYParity},
    transaction::{signed, Signed, Type},
    Address, Bytes, TxKind, B256, U256,
};

/// transaction object returned by `eth_getTransactionBy*`
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// hash of the transaction
    pub hash: B256,
    /// the number of transactions made by the sender prior to this one
    #[serde(with = "devnode_eth::serde::u64")]
    pub nonce: u64,
    /// hash of the block where this transaction was in. null when its pending
    pub block_hash: Option<B256>,
    /// block number where this transaction was in. null when its pending
    #[serde(with = "devnode_eth::serde::optional_u64")]
    pub block_number: Option<u64>,
    /// integer of the transactions index position in the block. null when its
    /// pending
    #[serde(with = "devnode_eth::serde::optional_u64")]
    pub transaction_index: Option<u64>,
    /// address of the sender
    pub from: Address,
    /// address of the receiver. null when its a contract creation transaction.
    pub to: Option<Address>,
    /// value transferred in Wei
    pub value: U256,
    /// gas price provided by the sender in Wei
    #[serde(with = "devnode_eth::serde::u128")]
    pub gas_price: u128,
    /// gas provided by the sender
    pub gas: U256,
    /// the data sent along with the transaction
    pub input: Bytes,
    /// ECDSA recovery id
    #[serde(with = "devnode_eth::serde::u64")]
    pub v: u64,
    /// Y-parity for EIP-2930 and EIP-1559 transactions. In theory these
    /// transactions types shouldn't have a `v` field, but in practice they
    /// are returned by nodes.
    #[serde(
        default,
        rename = "yParity",
        skip_serializing_if = "Option::is_none",
        with = "devnode_eth::serde::optional_u64"
    )]
    pub y_parity: Option<u64>,
    /// ECDSA signature r
    pub r: U256,
    /// ECDSA signature s
    pub s: U256,
    /// chain ID
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "devnode_eth::serde::optional_u64"
    )]
    pub chain_id: Option<u64>,
    /// integer of the transaction type, 0x0 for legacy transactions, 0x1 for
    /// access list types, 0x2 for dynamic fees
    #[serde(
        rename = "type",
        default,
        skip_serializing_if = "Option::is_none",
        with = "devnode_eth::serde::optional_u64"
    )]
    pub transaction_type: Option<u64>,
    /// access list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_list: Option<Vec<AccessListItem>>,
    /// max fee per gas
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "devnode_eth::serde::optional_u128"
    )]
    pub max_fee_per_gas: Option<u128>,
    /// max priority fee per gas
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "devnode_eth::serde::optional_u128"
    )]
    pub max_priority_fee_per_gas: Option<u128>,
}

impl Transaction {
    /// Returns whether the transaction has odd Y parity.
    pub fn odd_y_parity(&self) -> bool {
        match self.y_parity {
            Some(y_parity) => y_parity == 1,
            None => self.v == 1 || self.v == 28,
        }
    }

    /// Returns whether the transaction is a legacy transaction without
    /// replay protection.
    pub fn is_legacy(&self) -> bool {
        matches!(self.transaction_type, None | Some(0)) && matches!(self.v, 27 | 28)
    }

    fn kind(&self) -> TxKind {
        if let Some(to) = self.to {
            TxKind::Call(to)
        } else {
            TxKind::Create
        }
    }
}

/// Error that occurs when trying to convert the JSON-RPC `Transaction` type.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// Missing access list
    #[error("Missing access list")]
    AccessList,
    /// Missing chain ID
    #[error("Missing chain ID")]
    ChainId,
    /// Missing max fee per gas
    #[error("Missing max fee per gas")]
    MaxFeePerGas,
    /// Missing max priority fee per gas
    #[error("Missing max priority fee per gas")]
    MaxPriorityFeePerGas,
}

impl From<Transaction> for signed::Legacy {
    fn from(value: Transaction) -> Self {
        Self {
            nonce: value.nonce,
            gas_price: value.gas_price,
            gas_limit: value.gas.to(),
            kind: value.kind(),
            value: value.value,
            input: value.input,
            // SAFETY: The `from` field represents the caller address of the signed
            // transaction.
            signature: unsafe {
                Fakeable::with_address_unchecked(
                    SignatureWithRecoveryId {
                        r: value.r,
                        s: value.s,
                        v: value.v,
                    },
                    value.from,
                )
            },
            hash: OnceLock::from(value.hash),
            rlp_encoding: OnceLock::new(),
        }
    }
}

impl From<Transaction> for signed::Eip155 {
    fn from(value: Transaction) -> Self {
        Self {
            nonce: value.nonce,
            gas_price: value.gas_price,
            gas_limit: value.gas.to(),
            kind: value.kind(),
            value: value.value,
            input: value.input,
            // SAFETY: The `from` field represents the caller address of the signed
            // transaction.
            signature: unsafe {
                Fakeable::with_address_unchecked(
                    SignatureWithRecoveryId {
                        r: value.r,
                        s: value.s,
                        v: value.v,
                    },
                    value.from,
                )
            },
            hash: OnceLock::from(value.hash),
            rlp_encoding: OnceLock::new(),
        }
    }
}

impl TryFrom<Transaction> for signed::Eip2930 {
    type Error = ConversionError;

    fn try_from(value: Transaction) -> Result<Self, Self::Error> {
        let transaction = Self {
            // SAFETY: The `from` field represents the caller address of the signed
            // transaction.
            signature: unsafe {
                Fakeable::with_address_unchecked(
                    SignatureWithYParity {
                        r: value.r,
                        s: value.s,
                        y_parity: value.odd_y_parity(),
                    },
                    value.from,
                )
            },
            chain_id: value.chain_id.ok_or(ConversionError::ChainId)?,
            nonce: value.nonce,
            gas_price: value.gas_price,
            gas_limit: value.gas.to(),
            kind: value.kind(),
            value: value.value,
            input: value.input,
            access_list: value
                .access_list
                .ok_or(ConversionError::AccessList)?
                .into(),
            hash: OnceLock::from(value.hash),
            rlp_encoding: OnceLock::new(),
        };

        Ok(transaction)
    }
}

impl TryFrom<Transaction> for signed::Eip1559 {
    type Error = ConversionError;

    fn try_from(value: Transaction) -> Result<Self, Self::Error> {
        let transaction = Self {
            // SAFETY: The `from` field represents the caller address of the signed
            // transaction.
            signature: unsafe {
                Fakeable::with_address_unchecked(
                    SignatureWithYParity {
                        r: value.r,
                        s: value.s,
                        y_parity: value.odd_y_parity(),
                    },
                    value.from,
                )
            },
            chain_id: value.chain_id.ok_or(ConversionError::ChainId)?,
            nonce: value.nonce,
            max_priority_fee_per_gas: value
                .max_priority_fee_per_gas
                .ok_or(ConversionError::MaxPriorityFeePerGas)?,
            max_fee_per_gas: value
                .max_fee_per_gas
                .ok_or(ConversionError::MaxFeePerGas)?,
            gas_limit: value.gas.to(),
            kind: value.kind(),
            value: value.value,
            input: value.input,
            access_list: value
                .access_list
                .ok_or(ConversionError::AccessList)?
                .into(),
            hash: OnceLock::from(value.hash),
            rlp_encoding: OnceLock::new(),
        };

        Ok(transaction)
    }
}

impl TryFrom<Transaction> for Signed {
    type Error = ConversionError;

    fn try_from(value: Transaction) -> Result<Self, Self::Error> {
        let transaction_type = match value
            .transaction_type
            .map_or(Ok(Type::Legacy), Type::try_from)
        {
            Ok(r#type) => r#type,
            Err(r#type) => {
                log::warn!(
                    "Unsupported transaction type: {type}. Reverting to post-EIP 155 legacy transaction"
                );

                // As the transaction type is not 0 or `None`, this will always result in a
                // post-EIP 155 legacy transaction.
                Type::Legacy
            }
        };

        let transaction = match transaction_type {
            Type::Legacy => {
                if value.is_legacy() {
                    Self::PreEip155Legacy(value.into())
                } else {
                    Self::PostEip155Legacy(value.into())
                }
            }
            Type::Eip2930 => Self::Eip2930(value.try_into()?),
            Type::Eip1559 => Self::Eip1559(value.try_into()?),
        };

        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use anyhow::Context;

    use super::*;

    fn legacy_transaction() -> anyhow::Result<Transaction> {
        let json = r#"{
            "hash": "0xc008e9f9bb92057dd0035496fbf4fb54f66b4b18b370928e46d6603933054d5a",
            "nonce": "0x1",
            "blockHash": "0x39cee0da843293ae3136cee0de4c0803745868b6e72b7cd05fba395bffa0ee85",
            "blockNumber": "0x2",
            "transactionIndex": "0x0",
            "from": "0xc014ba5ec014ba5ec014ba5ec014ba5ec014ba5e",
            "to": "0xc014ba5ec014ba5ec014ba5ec014ba5ec014ba5e",
            "value": "0x1",
            "gas": "0x5208",
            "gasPrice": "0x1",
            "input": "0x",
            "v": "0x25",
            "r": "0x96eed906651d0b571d17ac81f6b3141a64e0b7f76e0e78bcd5b3bd40bf08b22f",
            "s": "0x3bcba4ba162f71de936f2cb0e4f4b0ce7e25e9ae4bdb06c7c0cebab4e08e29c1"
        }"#;

        serde_json::from_str(json).context("failed to parse transaction")
    }

    #[test]
    fn legacy_transaction_deserializes() -> anyhow::Result<()> {
        let transaction = legacy_transaction()?;

        assert_eq!(transaction.nonce, 1);
        assert_eq!(transaction.block_number, Some(2));
        assert_eq!(transaction.gas_price, 1);
        assert!(transaction.transaction_type.is_none());
        assert!(!transaction.is_legacy());

        Ok(())
    }

    #[test]
    fn legacy_transaction_converts_to_post_eip155() -> anyhow::Result<()> {
        let transaction = legacy_transaction()?;
        let expected_hash = transaction.hash;

        let signed = Signed::try_from(transaction)?;
        assert!(signed.is_eip155());
        assert_eq!(signed.chain_id(), Some(1));
        assert_eq!(*signed.transaction_hash(), expected_hash);
        assert_eq!(signed.gas_limit(), 21_000);

        Ok(())
    }

    #[test]
    fn pre_eip155_v_is_detected() -> anyhow::Result<()> {
        let mut transaction = legacy_transaction()?;
        transaction.v = 27;

        let signed = Signed::try_from(transaction)?;
        assert!(signed.is_pre_eip155());

        Ok(())
    }

    #[test]
    fn eip1559_transaction_converts() -> anyhow::Result<()> {
        let mut transaction = legacy_transaction()?;
        transaction.transaction_type = Some(2);
        transaction.chain_id = Some(1);
        transaction.max_fee_per_gas = Some(2_000_000_000);
        transaction.max_priority_fee_per_gas = Some(1_000_000_000);
        transaction.access_list = Some(Vec::new());
        transaction.v = 0;

        let signed = Signed::try_from(transaction)?;
        assert!(matches!(signed, Signed::Eip1559(_)));
        assert_eq!(signed.max_fee_per_gas(), Some(&2_000_000_000));

        Ok(())
    }

    #[test]
    fn eip1559_transaction_without_fee_fields_fails() -> anyhow::Result<()> {
        let mut transaction = legacy_transaction()?;
        transaction.transaction_type = Some(2);
        transaction.chain_id = Some(1);
        transaction.access_list = Some(Vec::new());

        assert!(matches!(
            Signed::try_from(transaction),
            Err(ConversionError::MaxPriorityFeePerGas)
        ));

        Ok(())
    }

    #[test]
    fn unknown_transaction_type_falls_back_to_legacy() -> anyhow::Result<()> {
        let mut transaction = legacy_transaction()?;
        transaction.transaction_type = Some(0x7f);

        let signed = Signed::try_from(transaction)?;
        assert!(signed.is_eip155());

        Ok(())
    }

    #[test]
    fn caller_matches_from_field() -> anyhow::Result<()> {
        let transaction = legacy_transaction()?;
        let from = transaction.from;

        let signed = Signed::try_from(transaction)?;
        assert_eq!(*signed.caller(), from);
        assert_eq!(
            from,
            Address::from_str("0xc014ba5ec014ba5ec014ba5ec014ba5ec014ba5e")?
        );

        Ok(())
    }
}
