//! Log filter criteria and filter outputs, as used by `eth_getLogs` and the
//! filter endpoints.

use crate::{log::FilterLog, Address, BlockSpec, Bytes, B256};

/// A type that can either contain a single value or a list of values.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum OneOrMore<T> {
    /// A single value
    One(T),
    /// A list of values
    Many(Vec<T>),
}

/// The criteria for a log filter, as passed over the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilterOptions {
    /// The lowest block to search, inclusive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_block: Option<BlockSpec>,
    /// The highest block to search, inclusive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_block: Option<BlockSpec>,
    /// The single block to search. Mutually exclusive with `from_block` and
    /// `to_block`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<B256>,
    /// The address or addresses that emitted the logs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<OneOrMore<Address>>,
    /// The topics to match, position by position. `None` at a position
    /// matches any topic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<Option<OneOrMore<B256>>>>,
}

/// A log, as returned by `eth_getLogs` and `eth_getFilterLogs`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogOutput {
    /// true when the log was removed, due to a chain reorganization. false if
    /// it's a valid log.
    pub removed: bool,
    /// integer of the log index position in the block. None when it's a
    /// pending log.
    #[serde(with = "crate::serde::optional_u64")]
    pub log_index: Option<u64>,
    /// integer of the transactions index position log was created from. None
    /// when it's a pending log.
    #[serde(with = "crate::serde::optional_u64")]
    pub transaction_index: Option<u64>,
    /// hash of the transactions this log was created from. None when it's a
    /// pending log.
    pub transaction_hash: Option<B256>,
    /// hash of the block where this log was in. None when it's a pending log.
    pub block_hash: Option<B256>,
    /// the block number where this log was in. None when it's a pending log.
    #[serde(with = "crate::serde::optional_u64")]
    pub block_number: Option<u64>,
    /// address from which this log originated.
    pub address: Address,
    /// contains one or more 32 Bytes non-indexed arguments of the log.
    pub data: Bytes,
    /// Array of 0 to 4 32 Bytes DATA of indexed log arguments.
    pub topics: Vec<B256>,
}

impl From<&FilterLog> for LogOutput {
    fn from(log: &FilterLog) -> Self {
        Self {
            removed: log.removed,
            log_index: Some(log.inner.log_index),
            transaction_index: Some(log.inner.transaction_index),
            transaction_hash: Some(log.inner.inner.transaction_hash),
            block_hash: Some(log.inner.block_hash),
            block_number: Some(log.inner.block_number),
            address: log.inner.inner.inner.address,
            data: log.inner.inner.inner.data.clone(),
            topics: log.inner.inner.inner.topics.clone(),
        }
    }
}

/// The events collected by an installed filter since it was last polled.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum FilteredEvents {
    /// Logs matching a log filter
    Logs(Vec<LogOutput>),
    /// Hashes of new blocks
    NewHeads(Vec<B256>),
    /// Hashes of new pending transactions
    NewPendingTransactions(Vec<B256>),
}

impl FilteredEvents {
    /// The type of subscription the events belong to.
    pub fn subscription_type(&self) -> SubscriptionType {
        match self {
            Self::Logs(_) => SubscriptionType::Logs,
            Self::NewHeads(_) => SubscriptionType::NewHeads,
            Self::NewPendingTransactions(_) => SubscriptionType::NewPendingTransactions,
        }
    }
}

/// The type of a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionType {
    /// Logs subscription.
    Logs,
    /// New heads subscription.
    NewHeads,
    /// New pending transactions subscription.
    NewPendingTransactions,
}

impl serde::Serialize for SubscriptionType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(match self {
            SubscriptionType::Logs => "logs",
            SubscriptionType::NewHeads => "newHeads",
            SubscriptionType::NewPendingTransactions => "newPendingTransactions",
        })
    }
}

impl<'de> serde::Deserialize<'de> for SubscriptionType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SubscriptionTypeVisitor;

        impl serde::de::Visitor<'_> for SubscriptionTypeVisitor {
            type Value = SubscriptionType;

            fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                formatter.write_str("a string")
            }

            fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<Self::Value, E> {
                match value {
                    "logs" => Ok(SubscriptionType::Logs),
                    "newHeads" => Ok(SubscriptionType::NewHeads),
                    "newPendingTransactions" => Ok(SubscriptionType::NewPendingTransactions),
                    _ => Err(serde::de::Error::custom("Invalid subscription type")),
                }
            }
        }

        deserializer.deserialize_identifier(SubscriptionTypeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_options_deserialize_single_address() -> anyhow::Result<()> {
        let json = r#"{
            "fromBlock": "0x1",
            "toBlock": "latest",
            "address": "0xc014ba5ec014ba5ec014ba5ec014ba5ec014ba5e",
            "topics": [null, "0x0000000000000000000000000000000000000000000000000000000000000001"]
        }"#;

        let options: LogFilterOptions = serde_json::from_str(json)?;
        assert!(matches!(options.address, Some(OneOrMore::One(_))));
        assert!(matches!(options.from_block, Some(BlockSpec::Number(1))));

        let topics = options.topics.expect("topics were provided");
        assert_eq!(topics.len(), 2);
        assert!(topics[0].is_none());
        assert!(matches!(topics[1], Some(OneOrMore::One(_))));

        Ok(())
    }

    #[test]
    fn filter_options_deserialize_multiple_addresses() -> anyhow::Result<()> {
        let json = r#"{
            "address": [
                "0xc014ba5ec014ba5ec014ba5ec014ba5ec014ba5e",
                "0x0000000000000000000000000000000000000000"
            ]
        }"#;

        let options: LogFilterOptions = serde_json::from_str(json)?;
        match options.address {
            Some(OneOrMore::Many(addresses)) => assert_eq!(addresses.len(), 2),
            _ => panic!("expected multiple addresses"),
        }

        Ok(())
    }

    #[test]
    fn subscription_type_serde() -> anyhow::Result<()> {
        assert_eq!(
            serde_json::to_string(&SubscriptionType::NewHeads)?,
            r#""newHeads""#
        );
        assert_eq!(
            serde_json::from_str::<SubscriptionType>(r#""logs""#)?,
            SubscriptionType::Logs
        );
        assert!(serde_json::from_str::<SubscriptionType>(r#""blocks""#).is_err());

        Ok(())
    }
}
