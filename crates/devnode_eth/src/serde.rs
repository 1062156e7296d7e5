//! Serde helpers for encoding quantities as `0x`-prefixed minimal hex, per
//! the Ethereum JSON-RPC conventions.

use serde::{Deserialize, Deserializer, Serializer};

fn parse_digits<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = String::deserialize(deserializer)?;
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| serde::de::Error::custom("quantity is missing the '0x' prefix"))?;

    Ok(digits.to_owned())
}

/// Helpers for `bool` quantities, encoded as `0x0` or `0x1`.
pub mod bool {
    use core::primitive::bool;

    use super::*;

    /// Serializes a `bool` as a hex quantity.
    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "0x1" } else { "0x0" })
    }

    /// Deserializes a `bool` from a hex quantity.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let value = String::deserialize(deserializer)?;
        match value.as_str() {
            "0x0" => Ok(false),
            "0x1" => Ok(true),
            _ => Err(serde::de::Error::custom(format!(
                "invalid status: {value}"
            ))),
        }
    }
}

/// Helpers for `u64` quantities.
pub mod u64 {
    use core::primitive::u64;

    use super::*;

    /// Serializes a `u64` as a hex quantity.
    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{value:#x}"))
    }

    /// Deserializes a `u64` from a hex quantity.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let digits = parse_digits(deserializer)?;
        u64::from_str_radix(&digits, 16)
            .map_err(|_error| serde::de::Error::custom(format!("invalid quantity: 0x{digits}")))
    }
}

/// Helpers for optional `u64` quantities.
pub mod optional_u64 {
    use core::primitive::u64;

    use super::*;

    /// Serializes an optional `u64` as a hex quantity or `null`.
    pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_str(&format!("{value:#x}")),
            None => serializer.serialize_none(),
        }
    }

    /// Deserializes an optional `u64` from a hex quantity.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u64>, D::Error> {
        let value = Option::<String>::deserialize(deserializer)?;
        value
            .map(|value| {
                let digits = value.strip_prefix("0x").ok_or_else(|| {
                    serde::de::Error::custom("quantity is missing the '0x' prefix")
                })?;
                u64::from_str_radix(digits, 16).map_err(|_error| {
                    serde::de::Error::custom(format!("invalid quantity: {value}"))
                })
            })
            .transpose()
    }
}

/// Helpers for `u128` quantities.
pub mod u128 {
    use core::primitive::u128;

    use super::*;

    /// Serializes a `u128` as a hex quantity.
    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{value:#x}"))
    }

    /// Deserializes a `u128` from a hex quantity.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let digits = parse_digits(deserializer)?;
        u128::from_str_radix(&digits, 16)
            .map_err(|_error| serde::de::Error::custom(format!("invalid quantity: 0x{digits}")))
    }
}

/// Helpers for optional `u128` quantities.
pub mod optional_u128 {
    use core::primitive::u128;

    use super::*;

    /// Serializes an optional `u128` as a hex quantity or `null`.
    pub fn serialize<S: Serializer>(
        value: &Option<u128>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_str(&format!("{value:#x}")),
            None => serializer.serialize_none(),
        }
    }

    /// Deserializes an optional `u128` from a hex quantity.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u128>, D::Error> {
        let value = Option::<String>::deserialize(deserializer)?;
        value
            .map(|value| {
                let digits = value.strip_prefix("0x").ok_or_else(|| {
                    serde::de::Error::custom("quantity is missing the '0x' prefix")
                })?;
                u128::from_str_radix(digits, 16).map_err(|_error| {
                    serde::de::Error::custom(format!("invalid quantity: {value}"))
                })
            })
            .transpose()
    }
}

/// Helpers for serializing a single value to and from a one-element JSON
/// array, as used for single-argument RPC `params`.
pub mod sequence {
    use serde::{ser::SerializeSeq as _, Deserialize, Deserializer, Serialize, Serializer};

    /// Serializes the value as a one-element sequence.
    pub fn serialize<S: Serializer, T: Serialize>(
        value: &T,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(1))?;
        seq.serialize_element(value)?;
        seq.end()
    }

    /// Deserializes a value from a one-element sequence.
    pub fn deserialize<'de, D: Deserializer<'de>, T: Deserialize<'de>>(
        deserializer: D,
    ) -> Result<T, D::Error> {
        let mut elements = Vec::<T>::deserialize(deserializer)?;
        if elements.len() != 1 {
            return Err(serde::de::Error::custom(format!(
                "expected a sequence with a single element, found {} elements",
                elements.len()
            )));
        }

        elements
            .pop()
            .ok_or_else(|| serde::de::Error::custom("sequence is empty"))
    }
}

/// Helpers for serializing `()` to and from an empty JSON array, as used for
/// parameterless RPC `params`.
pub mod empty_params {
    use serde::{ser::SerializeSeq as _, Deserialize, Deserializer, Serializer};

    /// Serializes the unit type as an empty sequence.
    pub fn serialize<S: Serializer>(_value: &(), serializer: S) -> Result<S::Ok, S::Error> {
        let seq = serializer.serialize_seq(Some(0))?;
        seq.end()
    }

    /// Deserializes the unit type from an empty sequence.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<(), D::Error> {
        let elements = Vec::<()>::deserialize(deserializer)?;
        if !elements.is_empty() {
            return Err(serde::de::Error::custom(format!(
                "expected an empty sequence, found {} elements",
                elements.len()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #[derive(serde::Deserialize, serde::Serialize)]
    struct Quantities {
        #[serde(with = "super::u64")]
        block_number: u64,
        #[serde(with = "super::optional_u128")]
        base_fee: Option<u128>,
    }

    #[test]
    fn quantity_round_trip() -> anyhow::Result<()> {
        let json = r#"{"block_number":"0x10","base_fee":"0x3b9aca00"}"#;

        let quantities: Quantities = serde_json::from_str(json)?;
        assert_eq!(quantities.block_number, 16);
        assert_eq!(quantities.base_fee, Some(1_000_000_000));

        assert_eq!(serde_json::to_string(&quantities)?, json);

        Ok(())
    }

    #[derive(serde::Deserialize, serde::Serialize)]
    struct Params(#[serde(with = "super::sequence")] String);

    #[test]
    fn sequence_round_trip() -> anyhow::Result<()> {
        let params = Params("latest".to_string());

        let json = serde_json::to_string(&params)?;
        assert_eq!(json, r#"["latest"]"#);

        let deserialized: Params = serde_json::from_str(&json)?;
        assert_eq!(deserialized.0, "latest");

        assert!(serde_json::from_str::<Params>(r#"["latest","earliest"]"#).is_err());

        Ok(())
    }
}
