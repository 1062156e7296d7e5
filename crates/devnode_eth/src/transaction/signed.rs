mod eip155;
mod eip1559;
mod eip2930;
mod legacy;

use alloy_rlp::Buf as _;

use crate::{
    access_list::AccessListItem,
    signature::Signature,
    transaction::{Type, INVALID_TX_TYPE_ERROR_MESSAGE},
    Address, Bytes, TxKind, B256, U256,
};

pub use self::{
    eip155::Eip155,
    eip1559::Eip1559,
    eip2930::Eip2930,
    legacy::{Legacy, PreOrPostEip155},
};

/// A signed transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Signed {
    /// Legacy transaction before EIP-155
    PreEip155Legacy(Legacy),
    /// Legacy transaction after EIP-155
    PostEip155Legacy(Eip155),
    /// EIP-2930 transaction
    Eip2930(Eip2930),
    /// EIP-1559 transaction
    Eip1559(Eip1559),
}

impl Signed {
    /// Whether the transaction is a legacy transaction without replay
    /// protection.
    pub fn is_pre_eip155(&self) -> bool {
        matches!(self, Signed::PreEip155Legacy(_))
    }

    /// Whether the transaction is an EIP-155 transaction.
    pub fn is_eip155(&self) -> bool {
        matches!(self, Signed::PostEip155Legacy(_))
    }

    /// The address of the transaction's sender, as recovered from the
    /// signature or provided by impersonation.
    pub fn caller(&self) -> &Address {
        match self {
            Signed::PreEip155Legacy(tx) => tx.caller(),
            Signed::PostEip155Legacy(tx) => tx.caller(),
            Signed::Eip2930(tx) => tx.caller(),
            Signed::Eip1559(tx) => tx.caller(),
        }
    }

    /// The gas limit of the transaction.
    pub fn gas_limit(&self) -> u64 {
        match self {
            Signed::PreEip155Legacy(tx) => tx.gas_limit,
            Signed::PostEip155Legacy(tx) => tx.gas_limit,
            Signed::Eip2930(tx) => tx.gas_limit,
            Signed::Eip1559(tx) => tx.gas_limit,
        }
    }

    /// The gas price the sender offered, in wei. For EIP-1559 transactions
    /// this is the maximum fee per gas.
    pub fn gas_price(&self) -> &u128 {
        match self {
            Signed::PreEip155Legacy(tx) => &tx.gas_price,
            Signed::PostEip155Legacy(tx) => &tx.gas_price,
            Signed::Eip2930(tx) => &tx.gas_price,
            Signed::Eip1559(tx) => &tx.max_fee_per_gas,
        }
    }

    /// The gas price the sender ends up paying per unit of gas, given the
    /// block's base fee. `None` for transactions preceding EIP-1559.
    pub fn effective_gas_price(&self, block_base_fee: u128) -> Option<u128> {
        match self {
            Signed::PreEip155Legacy(_)
            | Signed::PostEip155Legacy(_)
            | Signed::Eip2930(_) => None,
            Signed::Eip1559(tx) => Some(tx.effective_gas_price(block_base_fee)),
        }
    }

    /// The maximum fee per gas of the transaction, if it is an EIP-1559
    /// transaction.
    pub fn max_fee_per_gas(&self) -> Option<&u128> {
        match self {
            Signed::PreEip155Legacy(_)
            | Signed::PostEip155Legacy(_)
            | Signed::Eip2930(_) => None,
            Signed::Eip1559(tx) => Some(&tx.max_fee_per_gas),
        }
    }

    /// The maximum priority fee per gas of the transaction, if it is an
    /// EIP-1559 transaction.
    pub fn max_priority_fee_per_gas(&self) -> Option<&u128> {
        match self {
            Signed::PreEip155Legacy(_)
            | Signed::PostEip155Legacy(_)
            | Signed::Eip2930(_) => None,
            Signed::Eip1559(tx) => Some(&tx.max_priority_fee_per_gas),
        }
    }

    /// The recipient of the transaction, or `None` for a contract creation.
    pub fn kind(&self) -> TxKind {
        match self {
            Signed::PreEip155Legacy(tx) => tx.kind,
            Signed::PostEip155Legacy(tx) => tx.kind,
            Signed::Eip2930(tx) => tx.kind,
            Signed::Eip1559(tx) => tx.kind,
        }
    }

    /// The address of the recipient, if the transaction is a call.
    pub fn to(&self) -> Option<Address> {
        self.kind().to().copied()
    }

    /// The amount of wei transferred by the transaction.
    pub fn value(&self) -> &U256 {
        match self {
            Signed::PreEip155Legacy(tx) => &tx.value,
            Signed::PostEip155Legacy(tx) => &tx.value,
            Signed::Eip2930(tx) => &tx.value,
            Signed::Eip1559(tx) => &tx.value,
        }
    }

    /// The calldata of the transaction.
    pub fn data(&self) -> &Bytes {
        match self {
            Signed::PreEip155Legacy(tx) => &tx.input,
            Signed::PostEip155Legacy(tx) => &tx.input,
            Signed::Eip2930(tx) => &tx.input,
            Signed::Eip1559(tx) => &tx.input,
        }
    }

    /// The nonce of the transaction.
    pub fn nonce(&self) -> u64 {
        match self {
            Signed::PreEip155Legacy(tx) => tx.nonce,
            Signed::PostEip155Legacy(tx) => tx.nonce,
            Signed::Eip2930(tx) => tx.nonce,
            Signed::Eip1559(tx) => tx.nonce,
        }
    }

    /// The chain id the transaction commits to, if any.
    pub fn chain_id(&self) -> Option<u64> {
        match self {
            Signed::PreEip155Legacy(_) => None,
            Signed::PostEip155Legacy(tx) => Some(tx.chain_id()),
            Signed::Eip2930(tx) => Some(tx.chain_id),
            Signed::Eip1559(tx) => Some(tx.chain_id),
        }
    }

    /// The access list of the transaction, if it has one.
    pub fn access_list(&self) -> Option<&[AccessListItem]> {
        match self {
            Signed::PreEip155Legacy(_) | Signed::PostEip155Legacy(_) => None,
            Signed::Eip2930(tx) => Some(&tx.access_list.0),
            Signed::Eip1559(tx) => Some(&tx.access_list.0),
        }
    }

    /// The signature of the transaction.
    pub fn signature(&self) -> &dyn Signature {
        match self {
            Signed::PreEip155Legacy(tx) => &tx.signature,
            Signed::PostEip155Legacy(tx) => &tx.signature,
            Signed::Eip2930(tx) => &tx.signature,
            Signed::Eip1559(tx) => &tx.signature,
        }
    }

    /// Whether the transaction carries a fake signature from an impersonated
    /// sender.
    pub fn is_fake(&self) -> bool {
        match self {
            Signed::PreEip155Legacy(tx) => tx.signature.is_fake(),
            Signed::PostEip155Legacy(tx) => tx.signature.is_fake(),
            Signed::Eip2930(tx) => tx.signature.is_fake(),
            Signed::Eip1559(tx) => tx.signature.is_fake(),
        }
    }

    /// The RLP encoding of the transaction, including the type prefix for
    /// typed transactions.
    pub fn rlp_encoding(&self) -> &Bytes {
        match self {
            Signed::PreEip155Legacy(tx) => tx.rlp_encoding(),
            Signed::PostEip155Legacy(tx) => tx.rlp_encoding(),
            Signed::Eip2930(tx) => tx.rlp_encoding(),
            Signed::Eip1559(tx) => tx.rlp_encoding(),
        }
    }

    /// The hash of the transaction.
    pub fn transaction_hash(&self) -> &B256 {
        match self {
            Signed::PreEip155Legacy(tx) => tx.transaction_hash(),
            Signed::PostEip155Legacy(tx) => tx.transaction_hash(),
            Signed::Eip2930(tx) => tx.transaction_hash(),
            Signed::Eip1559(tx) => tx.transaction_hash(),
        }
    }

    /// The type of the transaction.
    pub fn transaction_type(&self) -> Type {
        match self {
            Signed::PreEip155Legacy(_) | Signed::PostEip155Legacy(_) => Type::Legacy,
            Signed::Eip2930(_) => Type::Eip2930,
            Signed::Eip1559(_) => Type::Eip1559,
        }
    }
}

impl From<Legacy> for Signed {
    fn from(transaction: Legacy) -> Self {
        Self::PreEip155Legacy(transaction)
    }
}

impl From<Eip155> for Signed {
    fn from(transaction: Eip155) -> Self {
        Self::PostEip155Legacy(transaction)
    }
}

impl From<Eip2930> for Signed {
    fn from(transaction: Eip2930) -> Self {
        Self::Eip2930(transaction)
    }
}

impl From<Eip1559> for Signed {
    fn from(transaction: Eip1559) -> Self {
        Self::Eip1559(transaction)
    }
}

impl alloy_rlp::Encodable for Signed {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        out.put_slice(self.rlp_encoding());
    }

    fn length(&self) -> usize {
        self.rlp_encoding().len()
    }
}

impl alloy_rlp::Decodable for Signed {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        fn is_list(byte: u8) -> bool {
            byte >= 0xc0
        }

        let first = buf.first().ok_or(alloy_rlp::Error::InputTooShort)?;

        match *first {
            Eip2930::TYPE => {
                buf.advance(1);

                Ok(Signed::Eip2930(Eip2930::decode(buf)?))
            }
            Eip1559::TYPE => {
                buf.advance(1);

                Ok(Signed::Eip1559(Eip1559::decode(buf)?))
            }
            byte if is_list(byte) => {
                let transaction = PreOrPostEip155::decode(buf)?;
                Ok(match transaction {
                    PreOrPostEip155::Pre(transaction) => Signed::PreEip155Legacy(transaction),
                    PreOrPostEip155::Post(transaction) => Signed::PostEip155Legacy(transaction),
                })
            }
            _ => Err(alloy_rlp::Error::Custom(INVALID_TX_TYPE_ERROR_MESSAGE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use alloy_rlp::Decodable as _;

    use super::*;
    use crate::Bytes;

    #[test]
    fn can_recover_sender() -> anyhow::Result<()> {
        // Generated based on "f85f800182520894095e7baea6a6c7c4c2dfeb977efac326af552d870a801ba048b55bfa915ac795c431978d8a6a992b628d557da5ff759b307d495a36649353a0efffd310ac743f371de3b9f7f9cb56c0b28ad43601b4ab949f53faa07bd2c804"
        // but with a gas limit of 0x5208
        let bytes = hex::decode("f85f800182520894095e7baea6a6c7c4c2dfeb977efac326af552d870a801ba048b55bfa915ac795c431978d8a6a992b628d557da5ff759b307d495a36649353a0efffd310ac743f371de3b9f7f9cb56c0b28ad43601b4ab949f53faa07bd2c804")?;

        let transaction = Signed::decode(&mut bytes.as_slice())?;
        assert!(transaction.is_pre_eip155());
        assert_eq!(transaction.gas_limit(), 21_000);
        assert_eq!(transaction.nonce(), 0);
        assert_eq!(*transaction.gas_price(), 1);
        assert_eq!(*transaction.value(), U256::from(10));
        assert_eq!(
            transaction.to(),
            Some(Address::from_str(
                "0x095e7baea6a6c7c4c2dfeb977efac326af552d87"
            )?)
        );
        assert_eq!(
            *transaction.caller(),
            Address::from_str("0x0f65fe9276bc9a24ae7083ae28e2660ef72df99e")?
        );

        Ok(())
    }

    #[test]
    fn encoding_round_trips_through_decode() -> anyhow::Result<()> {
        let bytes = hex::decode("f85f800182520894095e7baea6a6c7c4c2dfeb977efac326af552d870a801ba048b55bfa915ac795c431978d8a6a992b628d557da5ff759b307d495a36649353a0efffd310ac743f371de3b9f7f9cb56c0b28ad43601b4ab949f53faa07bd2c804")?;

        let transaction = Signed::decode(&mut bytes.as_slice())?;
        assert_eq!(*transaction.rlp_encoding(), Bytes::from(bytes));

        Ok(())
    }

    #[test]
    fn decoding_unknown_type_fails() {
        // A first byte that is neither a known transaction type nor an RLP
        // list header.
        let bytes = [0x03u8, 0x00];

        let error = Signed::decode(&mut bytes.as_ref());
        assert!(matches!(
            error,
            Err(alloy_rlp::Error::Custom(INVALID_TX_TYPE_ERROR_MESSAGE))
        ));
    }
}
