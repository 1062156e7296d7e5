use alloy_rlp::BufMut;

use crate::{receipt::Execution, transaction, Address, B256};

/// A receipt for a processed transaction, with the metadata needed to serve
/// `eth_getTransactionReceipt`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt<LogT> {
    #[serde(flatten)]
    pub inner: Execution<LogT>,
    /// Hash of the transaction
    pub transaction_hash: B256,
    /// Index of the transaction in the block
    #[serde(with = "crate::serde::u64")]
    pub transaction_index: u64,
    /// Address of the sender
    pub from: Address,
    /// Address of the receiver. `None` when it's a contract creation
    /// transaction.
    pub to: Option<Address>,
    /// The contract address created, if the transaction was a contract
    /// creation, otherwise `None`.
    pub contract_address: Option<Address>,
    /// Gas used by this transaction alone.
    #[serde(with = "crate::serde::u64")]
    pub gas_used: u64,
    /// The actual value per gas deducted from the sender's account, which
    /// post-EIP-1559 is equal to baseFeePerGas + min(maxFeePerGas -
    /// baseFeePerGas, maxPriorityFeePerGas).
    #[serde(
        with = "crate::serde::optional_u128",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub effective_gas_price: Option<u128>,
}

impl<LogT> TransactionReceipt<LogT> {
    /// Constructs a new instance for the provided execution receipt and
    /// transaction.
    pub fn new(
        execution_receipt: Execution<LogT>,
        transaction: &transaction::Signed,
        transaction_index: u64,
        gas_used: u64,
        block_base_fee: u128,
    ) -> Self {
        let contract_address = if transaction.kind().is_create() {
            Some(transaction.caller().create(transaction.nonce()))
        } else {
            None
        };

        let effective_gas_price = Some(
            transaction
                .effective_gas_price(block_base_fee)
                .unwrap_or_else(|| *transaction.gas_price()),
        );

        Self {
            inner: execution_receipt,
            transaction_hash: *transaction.transaction_hash(),
            transaction_index,
            from: *transaction.caller(),
            to: transaction.to(),
            contract_address,
            gas_used,
            effective_gas_price,
        }
    }

    /// Maps the logs of the receipt using the provided function.
    pub fn map_logs<NewLogT>(
        self,
        map_fn: impl FnMut(LogT) -> NewLogT,
    ) -> TransactionReceipt<NewLogT> {
        TransactionReceipt {
            inner: self.inner.map_logs(map_fn),
            transaction_hash: self.transaction_hash,
            transaction_index: self.transaction_index,
            from: self.from,
            to: self.to,
            contract_address: self.contract_address,
            gas_used: self.gas_used,
            effective_gas_price: self.effective_gas_price,
        }
    }
}

impl<LogT> alloy_rlp::Encodable for TransactionReceipt<LogT>
where
    LogT: alloy_rlp::Encodable,
{
    fn encode(&self, out: &mut dyn BufMut) {
        self.inner.encode(out);
    }

    fn length(&self) -> usize {
        self.inner.length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        log::ExecutionLog,
        receipt::execution::Eip2718,
        transaction::request,
        Bloom, Bytes, TxKind, U256,
    };

    #[test]
    fn transaction_receipt_serde_round_trip() -> anyhow::Result<()> {
        let transaction: transaction::Signed = request::Eip1559 {
            chain_id: 1,
            nonce: 1,
            max_priority_fee_per_gas: 0,
            max_fee_per_gas: 100,
            gas_limit: 100,
            kind: TxKind::Call(Address::default()),
            value: U256::ZERO,
            input: Bytes::new(),
            access_list: Vec::new(),
        }
        .fake_sign(Address::default())
        .into();

        let receipt = TransactionReceipt::new(
            Execution::Eip2718(Eip2718::<ExecutionLog> {
                status: true,
                cumulative_gas_used: 100,
                logs_bloom: Bloom::ZERO,
                logs: vec![],
                transaction_type: transaction::Type::Eip1559,
            }),
            &transaction,
            0,
            100,
            1,
        );

        let serialized = serde_json::to_string(&receipt)?;
        let deserialized: TransactionReceipt<ExecutionLog> = serde_json::from_str(&serialized)?;

        assert_eq!(receipt, deserialized);

        Ok(())
    }

    #[test]
    fn contract_address_derived_for_creations() {
        let sender: Address = "0x67091a7dd65bf4f1e95af0a479fbc782b61c129a"
            .parse()
            .expect("valid address");

        let transaction: transaction::Signed = request::Eip1559 {
            chain_id: 1,
            nonce: 5,
            max_priority_fee_per_gas: 0,
            max_fee_per_gas: 100,
            gas_limit: 100,
            kind: TxKind::Create,
            value: U256::ZERO,
            input: Bytes::from_static(b"code"),
            access_list: Vec::new(),
        }
        .fake_sign(sender)
        .into();

        let receipt = TransactionReceipt::new(
            Execution::Eip2718(Eip2718::<ExecutionLog> {
                status: true,
                cumulative_gas_used: 100,
                logs_bloom: Bloom::ZERO,
                logs: vec![],
                transaction_type: transaction::Type::Eip1559,
            }),
            &transaction,
            0,
            100,
            1,
        );

        assert_eq!(receipt.contract_address, Some(sender.create(5)));
        assert_eq!(receipt.to, None);
    }
}
