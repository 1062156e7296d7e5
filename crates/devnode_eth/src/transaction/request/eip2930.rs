use std::sync::OnceLock;

use alloy_rlp::RlpEncodable;
use k256::SecretKey;

use crate::{
    access_list::AccessListItem,
    signature::{Fakeable, SignatureError, SignatureWithYParity},
    transaction::{signed, typed_request_hash},
    Address, Bytes, TxKind, B256, U256,
};

/// An EIP-2930 access list transaction request.
#[derive(Clone, Debug, PartialEq, Eq, RlpEncodable)]
pub struct Eip2930 {
    // The order of these fields determines encoding order.
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub kind: TxKind,
    pub value: U256,
    pub input: Bytes,
    pub access_list: Vec<AccessListItem>,
}

impl Eip2930 {
    /// The type identifier for an EIP-2930 transaction.
    pub const TYPE: u8 = 1;

    /// Computes the hash of the transaction request, as signed by the sender.
    pub fn hash(&self) -> B256 {
        typed_request_hash(Self::TYPE, self)
    }

    /// Signs the transaction with the provided secret key.
    pub fn sign(self, secret_key: &SecretKey) -> Result<signed::Eip2930, SignatureError> {
        let hash = self.hash();
        let signature = SignatureWithYParity::new(hash, secret_key)?;
        let signature = Fakeable::recover(signature, hash)?;

        Ok(self.into_signed(signature))
    }

    /// Signs the transaction with the provided secret key, belonging to the
    /// provided caller's address.
    ///
    /// # Safety
    ///
    /// The `caller` and `secret_key` must correspond to the same account.
    pub unsafe fn sign_for_sender_unchecked(
        self,
        secret_key: &SecretKey,
        caller: Address,
    ) -> Result<signed::Eip2930, SignatureError> {
        let hash = self.hash();
        let signature = SignatureWithYParity::new(hash, secret_key)?;

        // SAFETY: The safety concern is propagated in the function signature.
        let signature = unsafe { Fakeable::with_address_unchecked(signature, caller) };

        Ok(self.into_signed(signature))
    }

    /// Signs the transaction with a fake signature for the provided sender.
    pub fn fake_sign(self, sender: Address) -> signed::Eip2930 {
        self.into_signed(Fakeable::fake(sender, None))
    }

    fn into_signed(self, signature: Fakeable<SignatureWithYParity>) -> signed::Eip2930 {
        signed::Eip2930 {
            chain_id: self.chain_id,
            nonce: self.nonce,
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
            kind: self.kind,
            value: self.value,
            input: self.input,
            access_list: self.access_list.into(),
            signature,
            hash: OnceLock::new(),
            rlp_encoding: OnceLock::new(),
        }
    }
}
