use std::sync::OnceLock;

use alloy_rlp::RlpEncodable;
use k256::SecretKey;

use crate::{
    keccak256,
    signature::{Fakeable, SignatureError, SignatureWithRecoveryId},
    transaction::signed,
    Address, Bytes, TxKind, B256, U256,
};

/// A pre-EIP-155 legacy transaction request.
#[derive(Clone, Debug, PartialEq, Eq, RlpEncodable)]
pub struct Legacy {
    // The order of these fields determines encoding order.
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub kind: TxKind,
    pub value: U256,
    pub input: Bytes,
}

impl Legacy {
    /// The type identifier for a pre-EIP-155 legacy transaction.
    pub const TYPE: u8 = 0;

    /// Computes the hash of the transaction request, as signed by the sender.
    pub fn hash(&self) -> B256 {
        keccak256(alloy_rlp::encode(self))
    }

    /// Signs the transaction with the provided secret key.
    pub fn sign(self, secret_key: &SecretKey) -> Result<signed::Legacy, SignatureError> {
        let hash = self.hash();
        let signature = SignatureWithRecoveryId::new(hash, secret_key)?;
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
    ) -> Result<signed::Legacy, SignatureError> {
        let hash = self.hash();
        let signature = SignatureWithRecoveryId::new(hash, secret_key)?;

        // SAFETY: The safety concern is propagated in the function signature.
        let signature = unsafe { Fakeable::with_address_unchecked(signature, caller) };

        Ok(self.into_signed(signature))
    }

    /// Signs the transaction with a fake signature for the provided sender.
    pub fn fake_sign(self, sender: Address) -> signed::Legacy {
        self.into_signed(Fakeable::fake(sender, None))
    }

    fn into_signed(self, signature: Fakeable<SignatureWithRecoveryId>) -> signed::Legacy {
        signed::Legacy {
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
