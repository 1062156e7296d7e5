use std::sync::OnceLock;

use alloy_rlp::RlpEncodable;
use k256::SecretKey;

use crate::{
    keccak256,
    signature::{Fakeable, SignatureError, SignatureWithRecoveryId},
    transaction::signed,
    Address, Bytes, TxKind, B256, U256,
};

/// An EIP-155 transaction request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Eip155 {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub kind: TxKind,
    pub value: U256,
    pub input: Bytes,
    pub chain_id: u64,
}

impl Eip155 {
    /// Computes the hash of the transaction request, as signed by the sender.
    /// Per EIP-155, the chain id is mixed into the signed payload.
    pub fn hash(&self) -> B256 {
        #[derive(RlpEncodable)]
        struct Encodable<'request> {
            // The order of these fields determines encoding order.
            nonce: u64,
            gas_price: u128,
            gas_limit: u64,
            kind: TxKind,
            value: U256,
            input: &'request Bytes,
            chain_id: u64,
            zero1: u8,
            zero2: u8,
        }

        let encodable = Encodable {
            nonce: self.nonce,
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
            kind: self.kind,
            value: self.value,
            input: &self.input,
            chain_id: self.chain_id,
            zero1: 0,
            zero2: 0,
        };

        keccak256(alloy_rlp::encode(encodable))
    }

    /// Signs the transaction with the provided secret key.
    pub fn sign(self, secret_key: &SecretKey) -> Result<signed::Eip155, SignatureError> {
        let hash = self.hash();
        let signature = self.replay_protected_signature(hash, secret_key)?;
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
    ) -> Result<signed::Eip155, SignatureError> {
        let hash = self.hash();
        let signature = self.replay_protected_signature(hash, secret_key)?;

        // SAFETY: The safety concern is propagated in the function signature.
        let signature = unsafe { Fakeable::with_address_unchecked(signature, caller) };

        Ok(self.into_signed(signature))
    }

    /// Signs the transaction with a fake signature for the provided sender.
    pub fn fake_sign(self, sender: Address) -> signed::Eip155 {
        let recovery_id = self.v(/* y_parity = */ 1);
        self.into_signed(Fakeable::fake(sender, Some(recovery_id)))
    }

    fn replay_protected_signature(
        &self,
        hash: B256,
        secret_key: &SecretKey,
    ) -> Result<SignatureWithRecoveryId, SignatureError> {
        let signature = SignatureWithRecoveryId::new(hash, secret_key)?;

        Ok(SignatureWithRecoveryId {
            v: self.v(signature.v - 27),
            ..signature
        })
    }

    fn v(&self, y_parity: u64) -> u64 {
        self.chain_id * 2 + 35 + y_parity
    }

    fn into_signed(self, signature: Fakeable<SignatureWithRecoveryId>) -> signed::Eip155 {
        signed::Eip155 {
            nonce: self.nonce,
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
            kind: self.kind,
            value: self.value,
            input: self.input,
            signature,
            hash: OnceLock::new(),
            rlp_encoding: OnceLock::new(),
        }
    }
}
