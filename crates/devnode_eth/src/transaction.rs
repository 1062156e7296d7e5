//! Transaction requests and signed transactions.

mod fake_signature;
/// Types for transaction requests.
pub mod request;
/// Types for signed transactions.
pub mod signed;

use std::fmt::{Display, Formatter};

use alloy_rlp::BufMut;

use crate::{B256, U256};

pub use self::{
    request::{Request, TransactionRequestAndSender},
    signed::Signed,
};

/// Error message for a transaction whose first byte is not a known
/// transaction type and not an RLP list header.
pub const INVALID_TX_TYPE_ERROR_MESSAGE: &str = "invalid tx type";

/// The type of a transaction.
#[repr(u64)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Type {
    /// A legacy transaction, with or without EIP-155 replay protection.
    Legacy = 0,
    /// An EIP-2930 access list transaction.
    Eip2930 = 1,
    /// An EIP-1559 fee market transaction.
    Eip1559 = 2,
}

impl From<Type> for u64 {
    fn from(value: Type) -> u64 {
        value as u64
    }
}

impl TryFrom<u64> for Type {
    type Error = u64;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Legacy),
            1 => Ok(Self::Eip2930),
            2 => Ok(Self::Eip1559),
            value => Err(value),
        }
    }
}

impl std::str::FromStr for Type {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let digits = value
            .strip_prefix("0x")
            .ok_or_else(|| format!("missing '0x' prefix: {value}"))?;

        let value = u64::from_str_radix(digits, 16).map_err(|error| error.to_string())?;
        Type::try_from(value).map_err(|value| format!("unknown transaction type: {value}"))
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", u64::from(*self))
    }
}

impl serde::Serialize for Type {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Type {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = crate::serde::u64::deserialize(deserializer)?;
        Type::try_from(value)
            .map_err(|value| serde::de::Error::custom(format!("unknown transaction type: {value}")))
    }
}

/// Writes the type id followed by the RLP encoding of the value, as used for
/// typed transaction envelopes.
pub(crate) fn enveloped<T: alloy_rlp::Encodable>(id: u8, value: &T, out: &mut dyn BufMut) {
    out.put_u8(id);
    value.encode(out);
}

/// The maximum amount of wei the sender can be charged for gas.
pub fn max_cost(transaction: &Signed) -> U256 {
    U256::from(transaction.gas_limit()).saturating_mul(U256::from(*transaction.gas_price()))
}

/// The maximum amount of wei the transaction can cost the sender, including
/// the transferred value.
pub fn upfront_cost(transaction: &Signed) -> U256 {
    max_cost(transaction).saturating_add(*transaction.value())
}

/// Computes the hash that a secret key signs for a typed transaction request:
/// the type id followed by the RLP encoding of the request's fields.
pub(crate) fn typed_request_hash<T: alloy_rlp::Encodable>(id: u8, request: &T) -> B256 {
    let mut encoded = Vec::with_capacity(1 + request.length());
    enveloped(id, request, &mut encoded);
    crate::keccak256(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_serde() -> anyhow::Result<()> {
        assert_eq!(serde_json::to_string(&Type::Eip1559)?, r#""0x2""#);
        assert_eq!(serde_json::from_str::<Type>(r#""0x1""#)?, Type::Eip2930);
        assert!(serde_json::from_str::<Type>(r#""0x7""#).is_err());

        Ok(())
    }
}
