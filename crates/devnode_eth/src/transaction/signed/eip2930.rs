use std::sync::OnceLock;

use alloy_rlp::{Encodable as _, RlpDecodable, RlpEncodable};

use crate::{
    access_list::AccessList,
    keccak256,
    signature::{Fakeable, SignatureWithYParity},
    transaction::{self, request},
    Address, Bytes, TxKind, B256, U256,
};

/// A signed EIP-2930 access list transaction.
#[derive(Clone, Debug, Eq, RlpEncodable)]
pub struct Eip2930 {
    // The order of these fields determines encoding order.
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_price: u128,
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

impl Eip2930 {
    /// The type identifier for an EIP-2930 transaction.
    pub const TYPE: u8 = request::Eip2930::TYPE;

    /// The address of the transaction's sender.
    pub fn caller(&self) -> &Address {
        self.signature.caller()
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

impl PartialEq for Eip2930 {
    fn eq(&self, other: &Self) -> bool {
        self.chain_id == other.chain_id
            && self.nonce == other.nonce
            && self.gas_price == other.gas_price
            && self.gas_limit == other.gas_limit
            && self.kind == other.kind
            && self.value == other.value
            && self.input == other.input
            && self.access_list == other.access_list
            && self.signature == other.signature
    }
}

impl alloy_rlp::Decodable for Eip2930 {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        #[derive(RlpDecodable)]
        struct Decodable {
            // The order of these fields determines decoding order.
            pub chain_id: u64,
            pub nonce: u64,
            pub gas_price: u128,
            pub gas_limit: u64,
            pub kind: TxKind,
            pub value: U256,
            pub input: Bytes,
            pub access_list: AccessList,
            pub signature: SignatureWithYParity,
        }

        impl From<&Decodable> for request::Eip2930 {
            fn from(value: &Decodable) -> Self {
                Self {
                    chain_id: value.chain_id,
                    nonce: value.nonce,
                    gas_price: value.gas_price,
                    gas_limit: value.gas_limit,
                    kind: value.kind,
                    value: value.value,
                    input: value.input.clone(),
                    access_list: value.access_list.0.clone(),
                }
            }
        }

        let transaction = Decodable::decode(buf)?;
        let request = request::Eip2930::from(&transaction);

        let signature = Fakeable::recover(transaction.signature, request.hash())
            .map_err(|_error| alloy_rlp::Error::Custom("Invalid Signature"))?;

        Ok(Self {
            chain_id: transaction.chain_id,
            nonce: transaction.nonce,
            gas_price: transaction.gas_price,
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

    use alloy_rlp::{Decodable as _, Encodable as _};
    use k256::SecretKey;

    use super::*;
    use crate::{
        access_list::AccessListItem, signature::secret_key_from_str,
        transaction::fake_signature::tests::test_fake_sign_properties,
    };

    fn dummy_request() -> request::Eip2930 {
        let to = Address::from_str("0xc014ba5ec014ba5ec014ba5ec014ba5ec014ba5e").unwrap();
        let input = hex::decode("1234").unwrap();
        request::Eip2930 {
            chain_id: 1,
            nonce: 1,
            gas_price: 2,
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
    fn eip2930_signed_transaction_encoding() -> anyhow::Result<()> {
        // Generated by Hardhat
        let expected =
            hex::decode("f8bd0101020394c014ba5ec014ba5ec014ba5ec014ba5ec014ba5e04821234f85bf859940000000000000000000000000000000000000000f842a00000000000000000000000000000000000000000000000000000000000000000a0000000000000000000000000000000000000000000000000000000000000000101a0a9f9f0c845cc2d257838df2679a59af6f19055012ce1de11ba25b4ca9df503cfa02c70c54cf6c49e4a7ba53e4c75d1c922b77fab0f3488c8f7831c2ca8c283caf3")?;

        let signed = dummy_request().sign(&dummy_secret_key())?;

        let mut encoded = Vec::new();
        signed.encode(&mut encoded);
        assert_eq!(expected, encoded);

        Ok(())
    }

    #[test]
    fn eip2930_signed_transaction_hash() -> anyhow::Result<()> {
        // Generated by Hardhat
        let expected = B256::from_str(
            "0x1d4f5ef5c7b4b0bd61d4dd622615ec280ae5b9a57136ce6b7686025999220611",
        )?;

        let signed = dummy_request().sign(&dummy_secret_key())?;
        assert_eq!(expected, *signed.transaction_hash());

        Ok(())
    }

    #[test]
    fn eip2930_signed_transaction_rlp_round_trip() -> anyhow::Result<()> {
        let signed = dummy_request().sign(&dummy_secret_key())?;

        let encoded = alloy_rlp::encode(&signed);
        let decoded = Eip2930::decode(&mut encoded.as_slice())?;

        assert_eq!(signed, decoded);
        assert_eq!(signed.caller(), decoded.caller());

        Ok(())
    }
}
