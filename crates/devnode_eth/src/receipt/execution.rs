use alloy_rlp::{Buf as _, BufMut, Decodable as _, RlpDecodable, RlpEncodable};

use crate::{transaction, Bloom};

/// An EIP-658 receipt, as produced for legacy transactions.
#[derive(Clone, Debug, PartialEq, Eq, RlpDecodable, RlpEncodable, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip658<LogT> {
    /// Whether the transaction succeeded
    #[serde(with = "crate::serde::bool")]
    pub status: bool,
    /// Cumulative gas used in block after this transaction was executed
    #[serde(with = "crate::serde::u64")]
    pub cumulative_gas_used: u64,
    /// Bloom filter of the logs generated within this transaction
    pub logs_bloom: Bloom,
    /// Logs generated within this transaction
    pub logs: Vec<LogT>,
}

/// An EIP-2718 receipt, as produced for typed transactions. Its RLP encoding
/// is prefixed by the transaction type.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip2718<LogT> {
    /// Whether the transaction succeeded
    #[serde(with = "crate::serde::bool")]
    pub status: bool,
    /// Cumulative gas used in block after this transaction was executed
    #[serde(with = "crate::serde::u64")]
    pub cumulative_gas_used: u64,
    /// Bloom filter of the logs generated within this transaction
    pub logs_bloom: Bloom,
    /// Logs generated within this transaction
    pub logs: Vec<LogT>,
    /// Transaction type identifier
    #[serde(rename = "type")]
    pub transaction_type: transaction::Type,
}

/// A receipt produced by executing a transaction.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum Execution<LogT> {
    /// A receipt without a transaction type, for legacy transactions.
    Eip658(Eip658<LogT>),
    /// A receipt carrying its transaction type, for typed transactions.
    Eip2718(Eip2718<LogT>),
}

impl<LogT> Execution<LogT> {
    /// Whether the transaction succeeded.
    pub fn status(&self) -> bool {
        match self {
            Execution::Eip658(receipt) => receipt.status,
            Execution::Eip2718(receipt) => receipt.status,
        }
    }

    /// The cumulative gas used in the block up to and including this
    /// transaction.
    pub fn cumulative_gas_used(&self) -> u64 {
        match self {
            Execution::Eip658(receipt) => receipt.cumulative_gas_used,
            Execution::Eip2718(receipt) => receipt.cumulative_gas_used,
        }
    }

    /// The bloom filter of the logs generated within this transaction.
    pub fn logs_bloom(&self) -> &Bloom {
        match self {
            Execution::Eip658(receipt) => &receipt.logs_bloom,
            Execution::Eip2718(receipt) => &receipt.logs_bloom,
        }
    }

    /// The logs generated within this transaction.
    pub fn logs(&self) -> &[LogT] {
        match self {
            Execution::Eip658(receipt) => &receipt.logs,
            Execution::Eip2718(receipt) => &receipt.logs,
        }
    }

    /// The transaction type of the receipt. `None` for receipts that precede
    /// EIP-2718.
    pub fn transaction_type(&self) -> Option<transaction::Type> {
        match self {
            Execution::Eip658(_) => None,
            Execution::Eip2718(receipt) => Some(receipt.transaction_type),
        }
    }

    /// Maps the logs of the receipt using the provided function.
    pub fn map_logs<NewLogT>(self, map_fn: impl FnMut(LogT) -> NewLogT) -> Execution<NewLogT> {
        match self {
            Execution::Eip658(receipt) => Execution::Eip658(Eip658 {
                status: receipt.status,
                cumulative_gas_used: receipt.cumulative_gas_used,
                logs_bloom: receipt.logs_bloom,
                logs: receipt.logs.into_iter().map(map_fn).collect(),
            }),
            Execution::Eip2718(receipt) => Execution::Eip2718(Eip2718 {
                status: receipt.status,
                cumulative_gas_used: receipt.cumulative_gas_used,
                logs_bloom: receipt.logs_bloom,
                logs: receipt.logs.into_iter().map(map_fn).collect(),
                transaction_type: receipt.transaction_type,
            }),
        }
    }
}

impl<LogT> Eip2718<LogT>
where
    LogT: alloy_rlp::Decodable,
{
    fn decode_with_type(
        buf: &mut &[u8],
        transaction_type: transaction::Type,
    ) -> alloy_rlp::Result<Self> {
        let receipt = Eip658::decode(buf)?;
        Ok(Self {
            status: receipt.status,
            cumulative_gas_used: receipt.cumulative_gas_used,
            logs_bloom: receipt.logs_bloom,
            logs: receipt.logs,
            transaction_type,
        })
    }
}

impl<LogT> alloy_rlp::Encodable for Eip2718<LogT>
where
    LogT: alloy_rlp::Encodable,
{
    fn encode(&self, out: &mut dyn BufMut) {
        out.put_u8(u64::from(self.transaction_type) as u8);

        let payload = Eip658Ref {
            status: self.status,
            cumulative_gas_used: self.cumulative_gas_used,
            logs_bloom: &self.logs_bloom,
            logs: &self.logs,
        };
        payload.encode(out);
    }

    fn length(&self) -> usize {
        let payload = Eip658Ref {
            status: self.status,
            cumulative_gas_used: self.cumulative_gas_used,
            logs_bloom: &self.logs_bloom,
            logs: &self.logs,
        };
        1 + payload.length()
    }
}

#[derive(RlpEncodable)]
struct Eip658Ref<'receipt, LogT> {
    status: bool,
    cumulative_gas_used: u64,
    logs_bloom: &'receipt Bloom,
    logs: &'receipt Vec<LogT>,
}

impl<LogT> alloy_rlp::Decodable for Execution<LogT>
where
    LogT: alloy_rlp::Decodable,
{
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        fn is_list(byte: u8) -> bool {
            byte >= 0xc0
        }

        let first = *buf.first().ok_or(alloy_rlp::Error::InputTooShort)?;
        if is_list(first) {
            let receipt = Eip658::<LogT>::decode(buf)?;
            Ok(Self::Eip658(receipt))
        } else {
            // Consume the type byte
            buf.advance(1);

            let transaction_type = transaction::Type::try_from(u64::from(first))
                .map_err(|_error| alloy_rlp::Error::Custom("unknown receipt type"))?;

            let receipt = Eip2718::decode_with_type(buf, transaction_type)?;
            Ok(Self::Eip2718(receipt))
        }
    }
}

impl<LogT> alloy_rlp::Encodable for Execution<LogT>
where
    LogT: alloy_rlp::Encodable,
{
    fn encode(&self, out: &mut dyn BufMut) {
        match self {
            Execution::Eip658(receipt) => receipt.encode(out),
            Execution::Eip2718(receipt) => receipt.encode(out),
        }
    }

    fn length(&self) -> usize {
        match self {
            Execution::Eip658(receipt) => receipt.length(),
            Execution::Eip2718(receipt) => receipt.length(),
        }
    }
}

// Custom deserialization because some providers return the transaction type
// of pre-EIP-2718 receipts.
impl<'deserializer, LogT> serde::Deserialize<'deserializer> for Execution<LogT>
where
    LogT: serde::Deserialize<'deserializer>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'deserializer>,
    {
        use core::marker::PhantomData;
        use std::str::FromStr as _;

        use serde::de::Visitor;

        #[derive(serde::Deserialize)]
        #[serde(field_identifier, rename_all = "camelCase")]
        enum Field {
            Type,
            Status,
            CumulativeGasUsed,
            LogsBloom,
            Logs,
            Unknown(String),
        }

        struct ReceiptVisitor<LogT> {
            phantom: PhantomData<LogT>,
        }

        impl<'deserializer, LogT> Visitor<'deserializer> for ReceiptVisitor<LogT>
        where
            LogT: serde::Deserialize<'deserializer>,
        {
            type Value = Execution<LogT>;

            fn expecting(&self, formatter: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                formatter.write_str("a valid receipt")
            }

            fn visit_map<MapAccessT>(
                self,
                mut map: MapAccessT,
            ) -> Result<Self::Value, MapAccessT::Error>
            where
                MapAccessT: serde::de::MapAccess<'deserializer>,
            {
                use serde::de::Error;

                use crate::U64;

                // These are `String` to support deserializing from `serde_json::Value`
                let mut transaction_type: Option<String> = None;
                let mut status_code: Option<String> = None;
                let mut cumulative_gas_used: Option<U64> = None;
                let mut logs_bloom = None;
                let mut logs = None;

                while let Some(key) = map.next_key()? {
                    match key {
                        Field::Type => {
                            if transaction_type.is_some() {
                                return Err(Error::duplicate_field("type"));
                            }
                            transaction_type = Some(map.next_value()?);
                        }
                        Field::Status => {
                            if status_code.is_some() {
                                return Err(Error::duplicate_field("status"));
                            }
                            status_code = Some(map.next_value()?);
                        }
                        Field::CumulativeGasUsed => {
                            if cumulative_gas_used.is_some() {
                                return Err(Error::duplicate_field("cumulativeGasUsed"));
                            }
                            cumulative_gas_used = Some(map.next_value()?);
                        }
                        Field::LogsBloom => {
                            if logs_bloom.is_some() {
                                return Err(Error::duplicate_field("logsBloom"));
                            }
                            logs_bloom = Some(map.next_value()?);
                        }
                        Field::Logs => {
                            if logs.is_some() {
                                return Err(Error::duplicate_field("logs"));
                            }
                            logs = Some(map.next_value()?);
                        }
                        Field::Unknown(field) => {
                            log::warn!("Unsupported receipt field: {field}");
                        }
                    }
                }

                let cumulative_gas_used = cumulative_gas_used
                    .ok_or_else(|| Error::missing_field("cumulativeGasUsed"))?
                    .to::<u64>();

                let logs_bloom = logs_bloom.ok_or_else(|| Error::missing_field("logsBloom"))?;
                let logs = logs.ok_or_else(|| Error::missing_field("logs"))?;

                let status_code = status_code.ok_or_else(|| Error::missing_field("status"))?;
                let status = match status_code.as_str() {
                    "0x0" => false,
                    "0x1" => true,
                    _ => return Err(Error::custom(format!("unknown status: {status_code}"))),
                };

                let transaction_type = transaction_type
                    .map(|transaction_type| {
                        transaction::Type::from_str(&transaction_type).map_err(|error| {
                            Error::custom(format!("invalid transaction type: {error}"))
                        })
                    })
                    .transpose()?;

                let receipt = match transaction_type {
                    None | Some(transaction::Type::Legacy) => Execution::Eip658(Eip658 {
                        status,
                        cumulative_gas_used,
                        logs_bloom,
                        logs,
                    }),
                    Some(transaction_type) => Execution::Eip2718(Eip2718 {
                        status,
                        cumulative_gas_used,
                        logs_bloom,
                        logs,
                        transaction_type,
                    }),
                };

                Ok(receipt)
            }
        }

        deserializer.deserialize_map(ReceiptVisitor {
            phantom: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{log::ExecutionLog, Address, Bytes, B256};

    fn dummy_logs() -> Vec<ExecutionLog> {
        vec![
            ExecutionLog {
                address: Address::random(),
                topics: vec![B256::random(), B256::random()],
                data: Bytes::new(),
            },
            ExecutionLog {
                address: Address::random(),
                topics: Vec::new(),
                data: Bytes::from_static(b"test"),
            },
        ]
    }

    macro_rules! impl_execution_receipt_tests {
        ($(
            $name:ident => $receipt:expr,
        )+) => {
            $(
                paste::item! {
                    #[test]
                    fn [<execution_receipt_rlp_encoding_ $name>]() {
                        let receipt = $receipt;
                        let encoded = alloy_rlp::encode(&receipt);
                        assert_eq!(Execution::<ExecutionLog>::decode(&mut encoded.as_slice()).unwrap(), receipt);
                    }

                    #[test]
                    fn [<execution_receipt_serde_ $name>]() {
                        let receipt = $receipt;

                        let serialized = serde_json::to_string(&receipt).unwrap();
                        let deserialized: Execution<ExecutionLog> = serde_json::from_str(&serialized).unwrap();
                        assert_eq!(receipt, deserialized);

                        // This is necessary to ensure that the deser implementation doesn't expect a
                        // &str where a String can be passed.
                        let serialized = serde_json::to_value(&receipt).unwrap();
                        let deserialized: Execution<ExecutionLog> = serde_json::from_value(serialized).unwrap();

                        assert_eq!(receipt, deserialized);
                    }
                }
            )+
        };
    }

    impl_execution_receipt_tests! {
        eip658 => Execution::Eip658(Eip658 {
            status: true,
            cumulative_gas_used: 0xffff,
            logs_bloom: Bloom::random(),
            logs: dummy_logs(),
        }),
        eip2930 => Execution::Eip2718(Eip2718 {
            status: true,
            cumulative_gas_used: 0xffff,
            logs_bloom: Bloom::random(),
            logs: dummy_logs(),
            transaction_type: transaction::Type::Eip2930,
        }),
        eip1559 => Execution::Eip2718(Eip2718 {
            status: false,
            cumulative_gas_used: 0xffff,
            logs_bloom: Bloom::random(),
            logs: dummy_logs(),
            transaction_type: transaction::Type::Eip1559,
        }),
    }
}
