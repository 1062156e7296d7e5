use std::sync::Arc;

use devnode_eth::{
    block::{BlockHeader, PartialHeader},
    log::{ExecutionLog, FilterLog, FullBlockLog, ReceiptLog},
    receipt::{BlockReceipt, TransactionReceipt},
    transaction,
    trie::ordered_trie_root,
    withdrawal::Withdrawal,
    Hardfork, B256,
};

use super::{Block, SyncBlock};
use crate::blockchain::BlockchainError;

/// A locally mined block, which contains complete information.
#[derive(Clone, Debug)]
pub struct LocalBlock {
    header: BlockHeader,
    transactions: Vec<transaction::Signed>,
    transaction_receipts: Vec<Arc<BlockReceipt>>,
    withdrawals: Option<Vec<Withdrawal>>,
    hash: B256,
}

impl LocalBlock {
    /// Constructs an empty block, i.e. no transactions.
    pub fn empty(hardfork: Hardfork, partial_header: PartialHeader) -> Self {
        let withdrawals = if hardfork >= Hardfork::Shanghai {
            Some(Vec::new())
        } else {
            None
        };

        Self::new(partial_header, Vec::new(), Vec::new(), withdrawals)
    }

    /// Constructs a new instance with the provided data.
    pub fn new(
        partial_header: PartialHeader,
        transactions: Vec<transaction::Signed>,
        transaction_receipts: Vec<TransactionReceipt<ExecutionLog>>,
        withdrawals: Option<Vec<Withdrawal>>,
    ) -> Self {
        let transactions_root = ordered_trie_root(transactions.iter().map(alloy_rlp::encode));

        let header = BlockHeader::new(partial_header, transactions_root);
        let hash = header.hash();

        let transaction_receipts =
            transaction_to_block_receipts(&hash, header.number, transaction_receipts);

        Self {
            header,
            transactions,
            transaction_receipts,
            withdrawals,
            hash,
        }
    }

    /// Returns the receipts of the block's transactions.
    pub fn transaction_receipts(&self) -> &[Arc<BlockReceipt>] {
        &self.transaction_receipts
    }
}

impl Block for LocalBlock {
    fn hash(&self) -> &B256 {
        &self.hash
    }

    fn header(&self) -> &BlockHeader {
        &self.header
    }

    fn transactions(&self) -> &[transaction::Signed] {
        &self.transactions
    }

    fn transaction_receipts(&self) -> Result<Vec<Arc<BlockReceipt>>, BlockchainError> {
        Ok(self.transaction_receipts.clone())
    }

    fn withdrawals(&self) -> Option<&[Withdrawal]> {
        self.withdrawals.as_deref()
    }
}

fn transaction_to_block_receipts(
    block_hash: &B256,
    block_number: u64,
    receipts: Vec<TransactionReceipt<ExecutionLog>>,
) -> Vec<Arc<BlockReceipt>> {
    let mut log_index = 0;

    receipts
        .into_iter()
        .map(|receipt| {
            let transaction_hash = receipt.transaction_hash;
            let transaction_index = receipt.transaction_index;

            Arc::new(BlockReceipt {
                inner: receipt.map_logs(|log| FilterLog {
                    inner: FullBlockLog {
                        inner: ReceiptLog {
                            inner: log,
                            transaction_hash,
                        },
                        block_hash: *block_hash,
                        block_number,
                        log_index: {
                            let index = log_index;
                            log_index += 1;
                            index
                        },
                        transaction_index,
                    },
                    // Assuming a local block is never reorged out.
                    removed: false,
                }),
                block_hash: *block_hash,
                block_number,
            })
        })
        .collect()
}

impl From<LocalBlock> for Arc<dyn SyncBlock> {
    fn from(value: LocalBlock) -> Self {
        Arc::new(value)
    }
}

#[cfg(test)]
mod tests {
    use devnode_eth::{
        block::HeaderOverrides, log::logs_to_bloom, receipt::Execution, Address, Bytes, B256,
    };

    use super::*;
    use crate::test_utils::dummy_eip155_transaction;

    #[test]
    fn empty_block_has_no_withdrawals_pre_shanghai() {
        let partial_header =
            PartialHeader::new(Hardfork::London, HeaderOverrides::default(), None, None);
        let block = LocalBlock::empty(Hardfork::London, partial_header);
        assert!(block.withdrawals().is_none());

        let withdrawals = Vec::new();
        let partial_header = PartialHeader::new(
            Hardfork::Shanghai,
            HeaderOverrides::default(),
            None,
            Some(&withdrawals),
        );
        let block = LocalBlock::empty(Hardfork::Shanghai, partial_header);
        assert_eq!(block.withdrawals(), Some(&[] as &[Withdrawal]));
    }

    #[test]
    fn block_receipts_get_block_metadata_and_log_indices() {
        let caller = Address::random();
        let transaction = dummy_eip155_transaction(caller, 0);

        let logs = vec![
            ExecutionLog {
                address: Address::random(),
                topics: vec![B256::random()],
                data: Bytes::new(),
            },
            ExecutionLog {
                address: Address::random(),
                topics: Vec::new(),
                data: Bytes::from_static(b"data"),
            },
        ];

        let receipt = TransactionReceipt::new(
            Execution::Eip658(devnode_eth::receipt::execution::Eip658 {
                status: true,
                cumulative_gas_used: 21_000,
                logs_bloom: logs_to_bloom(&logs),
                logs,
            }),
            &transaction,
            0,
            21_000,
            0,
        );

        let partial_header = PartialHeader::new(
            Hardfork::London,
            HeaderOverrides {
                number: Some(7),
                ..HeaderOverrides::default()
            },
            None,
            None,
        );
        let block = LocalBlock::new(partial_header, vec![transaction], vec![receipt], None);

        let receipts = block.transaction_receipts();
        assert_eq!(receipts.len(), 1);

        let receipt = &receipts[0];
        assert_eq!(receipt.block_hash, *block.hash());
        assert_eq!(receipt.block_number, 7);

        let logs = receipt.inner.inner.logs();
        assert_eq!(logs.len(), 2);
        for (index, log) in logs.iter().enumerate() {
            assert_eq!(log.block_hash, *block.hash());
            assert_eq!(log.block_number, 7);
            assert_eq!(log.log_index, index as u64);
            assert!(!log.removed);
        }
    }
}
