use std::sync::OnceLock;

use alloy_rlp::RlpEncodable;

use crate::{
    keccak256,
    signature::{Fakeable, Signature as _, SignatureWithRecoveryId},
    Address, Bytes, TxKind, B256, U256,
};

/// Converts the signature's `v` value of an EIP-155 transaction to the chain
/// id that it commits to.
pub(crate) fn v_to_chain_id(v: u64) -> u64 {
    (v - 35) / 2
}

/// A signed EIP-155 transaction.
#[derive(Clone, Debug, Eq, RlpEncodable)]
pub struct Eip155 {
    // The order of these fields determines encoding order.
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub kind: TxKind,
    pub value: U256,
    pub input: Bytes,
    pub signature: Fakeable<SignatureWithRecoveryId>,
    /// Cached transaction hash
    #[rlp(default)]
    #[rlp(skip)]
    pub hash: OnceLock<B256>,
    /// Cached RLP-encoding
    #[rlp(default)]
    #[rlp(skip)]
    pub rlp_encoding: OnceLock<Bytes>,
}

impl Eip155 {
    /// The type identifier for an EIP-155 transaction.
    pub const TYPE: u8 = 0;

    /// The address of the transaction's sender.
    pub fn caller(&self) -> &Address {
        self.signature.caller()
    }

    /// The chain id committed to by the signature's `v` value.
    pub fn chain_id(&self) -> u64 {
        v_to_chain_id(self.signature.v())
    }

    /// The RLP encoding of the signed transaction.
    pub fn rlp_encoding(&self) -> &Bytes {
        self.rlp_encoding
            .get_or_init(|| alloy_rlp::encode(self).into())
    }

    /// The hash of the signed transaction.
    pub fn transaction_hash(&self) -> &B256 {
        self.hash.get_or_init(|| keccak256(self.rlp_encoding()))
    }
}

impl PartialEq for Eip155 {
    fn eq(&self, other: &Self) -> bool {
        self.nonce == other.nonce
            && self.gas_price == other.gas_price
            && self.gas_limit == other.gas_limit
            && self.kind == other.kind
            && self.value == other.value
            && self.input == other.input
            && self.signature == other.signature
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use alloy_rlp::Decodable as _;
    use k256::SecretKey;

    use super::*;
    use crate::{
        signature::secret_key_from_str,
        transaction::{
            fake_signature::tests::test_fake_sign_properties, request,
            signed::PreOrPostEip155,
        },
    };

    fn dummy_request() -> request::Eip155 {
        let to = Address::from_str("0xc014ba5ec014ba5ec014ba5ec014ba5ec014ba5e").unwrap();
        let input = hex::decode("1234").unwrap();
        request::Eip155 {
            nonce: 1,
            gas_price: 2,
            gas_limit: 3,
            kind: TxKind::Call(to),
            value: U256::from(4),
            input: Bytes::from(input),
            chain_id: 1,
        }
    }

    fn dummy_secret_key() -> SecretKey {
        secret_key_from_str("e331b6d69882b4cb4ea581d88e0b604039a3de5967688d3dcffdd2270c0fd109")
            .unwrap()
    }

    test_fake_sign_properties!();

    // The fake signature of an EIP-155 transaction encodes the chain id into
    // `v`, so it must decode back to the same chain id.
    #[test]
    fn fake_signature_keeps_chain_id() {
        let sender: Address = "0x67091a7dd65bf4f1e95af0a479fbc782b61c129a"
            .parse()
            .expect("valid address");

        let signed = dummy_request().fake_sign(sender);
        assert_eq!(signed.chain_id(), 1);
    }

    #[test]
    fn eip155_signed_transaction_round_trip() -> anyhow::Result<()> {
        let signed = dummy_request().sign(&dummy_secret_key())?;
        assert_eq!(signed.chain_id(), 1);

        let encoded = alloy_rlp::encode(&signed);
        let decoded = match PreOrPostEip155::decode(&mut encoded.as_slice())? {
            PreOrPostEip155::Post(post) => post,
            PreOrPostEip155::Pre(_) => panic!("Expected EIP-155 transaction"),
        };

        assert_eq!(signed, decoded);
        assert_eq!(signed.caller(), decoded.caller());

        Ok(())
    }
}
