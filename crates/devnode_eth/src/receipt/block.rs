use std::ops::Deref;

use alloy_rlp::BufMut;

use crate::{log::FilterLog, receipt::TransactionReceipt, B256};

/// A receipt for a transaction that's included in a block.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockReceipt {
    #[serde(flatten)]
    pub inner: TransactionReceipt<FilterLog>,
    /// Hash of the block that this is part of
    pub block_hash: B256,
    /// Number of the block that this is part of
    #[serde(with = "crate::serde::u64")]
    pub block_number: u64,
}

impl Deref for BlockReceipt {
    type Target = TransactionReceipt<FilterLog>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl alloy_rlp::Encodable for BlockReceipt {
    fn encode(&self, out: &mut dyn BufMut) {
        self.inner.encode(out);
    }

    fn length(&self) -> usize {
        self.inner.length()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        log::{ExecutionLog, FullBlockLog, ReceiptLog},
        receipt::{execution::Eip2718, Execution},
        transaction, Address, Bloom, Bytes,
    };

    #[test]
    fn rlp_encoding_strips_provider_metadata() {
        let execution_log = ExecutionLog::new(
            Address::random(),
            vec![B256::random(), B256::random()],
            Bytes::from_static(b"\x01\x02"),
        );
        let transaction_hash = B256::random();

        let filter_log = FilterLog {
            inner: FullBlockLog {
                inner: ReceiptLog {
                    inner: execution_log.clone(),
                    transaction_hash,
                },
                block_hash: B256::random(),
                block_number: 2,
                log_index: 0,
                transaction_index: 0,
            },
            removed: false,
        };

        let receipt = BlockReceipt {
            inner: TransactionReceipt {
                inner: Execution::Eip2718(Eip2718 {
                    status: true,
                    cumulative_gas_used: 0xaf91,
                    logs_bloom: Bloom::ZERO,
                    logs: vec![filter_log],
                    transaction_type: transaction::Type::Eip1559,
                }),
                transaction_hash,
                transaction_index: 0,
                from: Address::random(),
                to: Some(Address::random()),
                contract_address: None,
                gas_used: 0xaf91,
                effective_gas_price: Some(0x699e6346),
            },
            block_hash: B256::random(),
            block_number: 2,
        };

        // The consensus encoding only covers the execution receipt; the block,
        // transaction and reorg metadata must not leak into it.
        let consensus: Execution<ExecutionLog> = Execution::Eip2718(Eip2718 {
            status: true,
            cumulative_gas_used: 0xaf91,
            logs_bloom: Bloom::ZERO,
            logs: vec![execution_log],
            transaction_type: transaction::Type::Eip1559,
        });

        assert_eq!(alloy_rlp::encode(&receipt), alloy_rlp::encode(&consensus));
    }

    #[test]
    fn matches_hardhat_serialization() -> anyhow::Result<()> {
        // Generated with the "Hardhat Network provider eth_getTransactionReceipt should
        // return the right values for successful txs" hardhat-core test.
        let receipt_json = json!({
          "transactionHash": "0x08d14db1a6253234f7efc94fc661f52b708882552af37ebf4f5cd904618bb208",
          "transactionIndex": "0x0",
          "blockHash": "0x404b3b3ed507ff47178e9ca9d7757165050180091e1cc17de7981871a6e5785a",
          "blockNumber": "0x2",
          "from": "0xbe862ad9abfe6f22bcb087716c7d89a26051f74c",
          "to": "0x61de9dc6f6cff1df2809480882cfd3c2364b28f7",
          "cumulativeGasUsed": "0xaf91",
          "gasUsed": "0xaf91",
          "contractAddress": null,
          "logs": [
            {
              "removed": false,
              "logIndex": "0x0",
              "transactionIndex": "0x0",
              "transactionHash": "0x08d14db1a6253234f7efc94fc661f52b708882552af37ebf4f5cd904618bb208",
              "blockHash": "0x404b3b3ed507ff47178e9ca9d7757165050180091e1cc17de7981871a6e5785a",
              "blockNumber": "0x2",
              "address": "0x61de9dc6f6cff1df2809480882cfd3c2364b28f7",
              "data": "0x000000000000000000000000000000000000000000000000000000000000000a",
              "topics": [
                "0x3359f789ea83a10b6e9605d460de1088ff290dd7b3c9a155c896d45cf495ed4d",
                "0x0000000000000000000000000000000000000000000000000000000000000000"
              ]
            }
          ],
          "logsBloom": "0x00000000000000000000000000000000000000002000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000200000000000000000000000000000000000000000000000000400000000000000000020000000000000000000800000002000000000000000000000000000000000000000000000000000000000200000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000400000000000000000000000000000000020000000000000000000000000000000000000000000000000000000000000000000",
          "type": "0x2",
          "status": "0x1",
          "effectiveGasPrice": "0x699e6346"
        });

        let deserialized: BlockReceipt = serde_json::from_value(receipt_json.clone())?;
        assert_eq!(deserialized.block_number, 2);
        assert!(matches!(deserialized.inner.inner, Execution::Eip2718(_)));

        let serialized = serde_json::to_value(deserialized)?;
        assert_eq!(receipt_json, serialized);

        Ok(())
    }
}
