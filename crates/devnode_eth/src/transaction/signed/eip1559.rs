use std::sync::OnceLock;

use alloy_rlp::{Encodable as _, RlpDecodable, RlpEncodable};

use crate::{
    access_list::AccessList,
    keccak256,
    signature::{Fakeable, SignatureWithYParity},
    transaction::{self, request},
    Address, Bytes, TxKind, B256, U256,
};

/// A signed EIP-1559 fee market transaction.
#[derive(Clone, Debug, Eq, RlpEncodable)]
pub struct Eip1559 {
    // The order of these fields determines encoding order.
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    pub gas_limit: u64,
    pub kind: TxKind,
    pub value: U256,
    pub input: Bytes,
    pub access_list: AccessList,
    pub signature: Fakeable<SignatureWithYParity>,
    /// Cached transaction hash
    #[rlp(default)]
    #[rlp(skip)]
    pub hash: OnceLock<B256>,
    /// Cached RLP-encoding
    #[rlp(default)]
    #[rlp(skip)]
    pub rlp_encoding: OnceLock<Bytes>,
}

impl Eip1559 {
    /// The type identifier for an EIP-1559 transaction.
    pub const TYPE: u8 = request::Eip1559::TYPE;

    /// The address of the transaction's sender.
    pub fn caller(&self) -> &Address {
        self.signature.caller()
    }

    /// The effective gas price of the transaction, given the block's base
    /// fee.
    pub fn effective_gas_price(&self, block_base_fee: u128) -> u128 {
        self.max_fee_per_gas
            .min(block_base_fee.saturating_add(self.max_priority_fee_per_gas))
    }

    /// The RLP encoding of the signed transaction, prefixed by the
    /// transaction type.
    pub fn rlp_encoding(&self) -> &Bytes {
        self.rlp_encoding.get_or_init(|| {
            let mut encoded = Vec::with_capacity(1 + self.length());
            transaction::enveloped(Self::TYPE, self, &mut encoded);
            encoded.into()
        })
    }

    /// The hash of the signed transaction.
    pub fn transaction_hash(&self) -> &B256 {
        self.hash.get_or_init(|| keccak256(self.rlp_encoding()))
    }
}

impl PartialEq for Eip1559 {
    fn eq(&self, other: &Self) -> bool {
        self.chain_id == other.chain_id
            && self.nonce == other.nonce
            && self.max_priority_fee_per_gas == other.max_priority_fee_per_gas
            && self.max_fee_per_gas == other.max_fee_per_gas
            && self.gas_limit == other.gas_limit
            && self.kind == other.kind
            && self.value == other.value
            && self.input == other.input
            && self.access_list == other.access_list
            && self.signature == other.signature
    }
}

impl alloy_rlp::Decodable for Eip1559 {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        #[derive(RlpDecodable)]
        struct Decodable {
            // The order of these fields determines decoding order.
            pub chain_id: u64,
            pub nonce: u64,
            pub max_priority_fee_per_gas: u128,
            pub max_fee_per_gas: u128,
            pub gas_limit: u64,
            pub kind: TxKind,
            pub value: U256,
            pub input: Bytes,
            pub access_list: AccessList,
            pub signature: SignatureWithYParity,
        }

        impl From<&Decodable> for request::Eip1559 {
            fn from(value: &Decodable) -> Self {
                Self {
                    chain_id: value.chain_id,
                    nonce: value.nonce,
                    max_priority_fee_per_gas: value.max_priority_fee_per_gas,
                    max_fee_per_gas: value.max_fee_per_gas,
                    gas_limit: value.gas_limit,
                    kind: value.kind,
                    value: value.value,
                    input: value.input.clone(),
                    access_list: value.access_list.0.clone(),
                }
            }
        }

        let transaction = Decodable::decode(buf)?;
        let request = request::Eip1559::from(&transaction);

        let signature = Fakeable::recover(transaction.signature, request.hash())
            .map_err(|_error| alloy_rlp::Error::Custom("Invalid Signature"))?;

        Ok(Self {
            chain_id: transaction.chain_id,
            nonce: transaction.nonce,
            max_priority_fee_per_gas: transaction.max_priority_fee_per_gas,
            max_fee_per_gas: transaction.max_fee_per_gas,
            gas_limit: transaction.gas_limit,
            kind: transaction.kind,
            value: transaction.value,
            input: transaction.input,
            access_list: transaction.access_list,
            signature,
            hash: OnceLock::new(),
            rlp_encoding: OnceLock::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use alloy_rlp::Decodable as _;
    use k256::SecretKey;

    use super::*;
    use crate::{
        access_list::AccessListItem, signature::secret_key_from_str,
        transaction::fake_signature::tests::test_fake_sign_properties,
    };

    fn dummy_request() -> request::Eip1559 {
        let to = Address::from_str("0xc014ba5ec014ba5ec014ba5ec014ba5ec014ba5e").unwrap();
        let input = hex::decode("1234").unwrap();
        request::Eip1559 {
            chain_id: 1,
            nonce: 1,
            max_priority_fee_per_gas: 2,
            max_fee_per_gas: 5,
            gas_limit: 3,
            kind: TxKind::Call(to),
            value: U256::from(4),
            input: Bytes::from(input),
            access_list: vec![AccessListItem {
                address: Address::ZERO,
                storage_keys: vec![B256::ZERO, B256::from(U256::from(1))],
            }],
        }
    }

    fn dummy_secret_key() -> SecretKey {
        secret_key_from_str("e331b6d69882b4cb4ea581d88e0b604039a3de5967688d3dcffdd2270c0fd109")
            .unwrap()
    }

    test_fake_sign_properties!();

    #[test]
    fn eip1559_signed_transaction_encoding() -> anyhow::Result<()> {
        // Generated by Hardhat
        let expected =
            hex::decode("f8be010102050394c014ba5ec014ba5ec014ba5ec014ba5ec014ba5e04821234f85bf859940000000000000000000000000000000000000000f842a00000000000000000000000000000000000000000000000000000000000000000a0000000000000000000000000000000000000000000000000000000000000000101a0c3a2a00bed0c0f4b9319eaa15f0f1b2a2048b6b27bb0a1e934bb34fea0325cb9a05af7f8b4b3066e1bd0a1bbedfc674ca6c2d6a268080cc82a2bfb7e3d3faff1cc")?;

        let signed = dummy_request().sign(&dummy_secret_key())?;

        let mut encoded = Vec::new();
        signed.encode(&mut encoded);
        assert_eq!(expected, encoded);

        Ok(())
    }

    #[test]
    fn eip1559_signed_transaction_hash() -> anyhow::Result<()> {
        // Generated by Hardhat
        let expected = B256::from_str(
            "0x043d6f6d9f23b4cf4cff88f8e8deb093f26467aea1a4ab3d68ee00e6e933dd59",
        )?;

        let signed = dummy_request().sign(&dummy_secret_key())?;
        assert_eq!(expected, *signed.transaction_hash());

        Ok(())
    }

    #[test]
    fn effective_gas_price_capped_by_max_fee() -> anyhow::Result<()> {
        let signed = dummy_request().sign(&dummy_secret_key())?;

        assert_eq!(signed.effective_gas_price(1), 3);
        assert_eq!(signed.effective_gas_price(4), 5);

        Ok(())
    }

    #[test]
    fn eip1559_signed_transaction_rlp_round_trip() -> anyhow::Result<()> {
        let signed = dummy_request().sign(&dummy_secret_key())?;

        let encoded = alloy_rlp::encode(&signed);
        let decoded = Eip1559::decode(&mut encoded.as_slice())?;

        assert_eq!(signed, decoded);
        assert_eq!(signed.caller(), decoded.caller());

        Ok(())
    }
}
