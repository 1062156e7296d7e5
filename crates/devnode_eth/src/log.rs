use std::ops::Deref;

use alloy_rlp::BufMut;

use crate::{Address, Bloom, BloomInput, Bytes, HashSet, B256};

/// A log generated by executing a transaction.
#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    alloy_rlp::RlpDecodable,
    alloy_rlp::RlpEncodable,
    serde::Deserialize,
    serde::Serialize,
)]
pub struct ExecutionLog {
    /// The address that emitted the log.
    pub address: Address,
    /// The log's indexed topics.
    pub topics: Vec<B256>,
    /// The log's unindexed data.
    pub data: Bytes,
}

impl ExecutionLog {
    /// Constructs a new instance.
    pub fn new(address: Address, topics: Vec<B256>, data: Bytes) -> Self {
        Self {
            address,
            topics,
            data,
        }
    }
}

/// A log that's part of a transaction receipt.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLog {
    /// Execution log.
    #[serde(flatten)]
    pub inner: ExecutionLog,
    /// The hash of the transaction that emitted the log.
    pub transaction_hash: B256,
}

impl Deref for ReceiptLog {
    type Target = ExecutionLog;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl alloy_rlp::Encodable for ReceiptLog {
    // The transaction hash is not part of the consensus encoding.
    fn encode(&self, out: &mut dyn BufMut) {
        self.inner.encode(out);
    }

    fn length(&self) -> usize {
        self.inner.length()
    }
}

/// A log that's part of a mined block, with the block and transaction
/// metadata needed to serve it over RPC.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullBlockLog {
    /// Receipt log.
    #[serde(flatten)]
    pub inner: ReceiptLog,
    /// The hash of the block that contains the log.
    pub block_hash: B256,
    /// The number of the block that contains the log.
    #[serde(with = "crate::serde::u64")]
    pub block_number: u64,
    /// The index of the log within the block.
    #[serde(with = "crate::serde::u64")]
    pub log_index: u64,
    /// The index of the transaction within the block.
    #[serde(with = "crate::serde::u64")]
    pub transaction_index: u64,
}

impl Deref for FullBlockLog {
    type Target = ReceiptLog;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl alloy_rlp::Encodable for FullBlockLog {
    // The block metadata is not part of the consensus encoding.
    fn encode(&self, out: &mut dyn BufMut) {
        self.inner.encode(out);
    }

    fn length(&self) -> usize {
        self.inner.length()
    }
}

/// A log as returned by filter queries.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterLog {
    /// Block log.
    #[serde(flatten)]
    pub inner: FullBlockLog,
    /// Whether the log was removed due to a chain reorganization. Always
    /// `false` for a chain that never reorganizes.
    pub removed: bool,
}

impl Deref for FilterLog {
    type Target = FullBlockLog;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl alloy_rlp::Encodable for FilterLog {
    // The reorg marker is not part of the consensus encoding.
    fn encode(&self, out: &mut dyn BufMut) {
        self.inner.encode(out);
    }

    fn length(&self) -> usize {
        self.inner.length()
    }
}

/// Constructs a bloom filter from the provided logs.
pub fn logs_to_bloom(logs: &[ExecutionLog]) -> Bloom {
    let mut bloom = Bloom::ZERO;
    for log in logs {
        add_log_to_bloom(log, &mut bloom);
    }
    bloom
}

/// Adds the log to a bloom hash.
pub fn add_log_to_bloom(log: &ExecutionLog, bloom: &mut Bloom) {
    bloom.accrue(BloomInput::Raw(log.address.as_slice()));

    log.topics
        .iter()
        .for_each(|topic| bloom.accrue(BloomInput::Raw(topic.as_slice())));
}

/// Whether the log address matches the address filter. An empty filter
/// matches every address.
pub fn matches_address_filter(log_address: &Address, address_filter: &HashSet<Address>) -> bool {
    address_filter.is_empty() || address_filter.contains(log_address)
}

/// Whether the log topics match the topics filter. Each filter position is
/// either a wildcard or a list of alternatives for the topic at the same
/// position.
pub fn matches_topics_filter(log_topics: &[B256], topics_filter: &[Option<Vec<B256>>]) -> bool {
    if topics_filter.len() > log_topics.len() {
        return false;
    }

    topics_filter
        .iter()
        .zip(log_topics.iter())
        .all(|(normalized_topics, log_topic)| {
            normalized_topics
                .as_ref()
                .map_or(true, |normalized_topics| {
                    normalized_topics.contains(log_topic)
                })
        })
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::b256;

    const TOPIC_A: B256 =
        b256!("000000000000000000000000000000000000000000000000000000000000dead");
    const TOPIC_B: B256 =
        b256!("000000000000000000000000000000000000000000000000000000000000beef");

    #[test]
    fn receipt_log_serde_round_trip() -> anyhow::Result<()> {
        let log = ReceiptLog {
            inner: ExecutionLog::new(
                Address::from_str("0000000000000000000000000000000000000011")?,
                vec![TOPIC_A, TOPIC_B],
                Bytes::from(hex::decode("0100ff")?),
            ),
            transaction_hash: B256::from_str(
                "0xc008e9f9bb92057dd0035496fbf4fb54f66b4b18b370928e46d6603933054d5a",
            )?,
        };

        let serialized = serde_json::to_string(&log)?;
        let deserialized: ReceiptLog = serde_json::from_str(&serialized)?;

        assert_eq!(log, deserialized);

        Ok(())
    }

    #[test]
    fn topics_filter_positions_are_anded() {
        let log_topics = [TOPIC_A, TOPIC_B];

        // Wildcard in the first position, exact match in the second.
        assert!(matches_topics_filter(
            &log_topics,
            &[None, Some(vec![TOPIC_B])]
        ));

        // Alternatives within a position are ORed.
        assert!(matches_topics_filter(
            &log_topics,
            &[Some(vec![TOPIC_B, TOPIC_A])]
        ));

        assert!(!matches_topics_filter(
            &log_topics,
            &[Some(vec![TOPIC_B])]
        ));

        // A filter with more positions than the log has topics never matches.
        assert!(!matches_topics_filter(
            &log_topics,
            &[None, None, Some(vec![TOPIC_A])]
        ));
    }

    #[test]
    fn address_filter_empty_matches_all() {
        let address = Address::from_str("0000000000000000000000000000000000000011").unwrap();

        assert!(matches_address_filter(&address, &HashSet::default()));

        let mut filter = HashSet::default();
        filter.insert(Address::ZERO);
        assert!(!matches_address_filter(&address, &filter));
    }
}
