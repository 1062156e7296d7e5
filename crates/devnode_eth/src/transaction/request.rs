mod eip155;
mod eip1559;
mod eip2930;
mod legacy;

use k256::SecretKey;

pub use self::{eip155::Eip155, eip1559::Eip1559, eip2930::Eip2930, legacy::Legacy};
use super::Signed;
use crate::{signature::SignatureError, Address};

/// A transaction request, before it has been signed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    /// A pre-EIP-155 legacy transaction request.
    Legacy(Legacy),
    /// An EIP-155 transaction request.
    Eip155(Eip155),
    /// An EIP-2930 transaction request.
    Eip2930(Eip2930),
    /// An EIP-1559 transaction request.
    Eip1559(Eip1559),
}

impl Request {
    /// Retrieves the instance's chain ID.
    pub fn chain_id(&self) -> Option<u64> {
        match self {
            Request::Legacy(_) => None,
            Request::Eip155(transaction) => Some(transaction.chain_id),
            Request::Eip2930(transaction) => Some(transaction.chain_id),
            Request::Eip1559(transaction) => Some(transaction.chain_id),
        }
    }

    /// Retrieves the instance's gas price.
    pub fn gas_price(&self) -> &u128 {
        match self {
            Request::Legacy(transaction) => &transaction.gas_price,
            Request::Eip155(transaction) => &transaction.gas_price,
            Request::Eip2930(transaction) => &transaction.gas_price,
            Request::Eip1559(transaction) => &transaction.max_fee_per_gas,
        }
    }

    /// Retrieves the instance's max fee per gas, if it exists.
    pub fn max_fee_per_gas(&self) -> Option<&u128> {
        match self {
            Request::Legacy(_) | Request::Eip155(_) | Request::Eip2930(_) => None,
            Request::Eip1559(transaction) => Some(&transaction.max_fee_per_gas),
        }
    }

    /// Retrieves the instance's max priority fee per gas, if it exists.
    pub fn max_priority_fee_per_gas(&self) -> Option<&u128> {
        match self {
            Request::Legacy(_) | Request::Eip155(_) | Request::Eip2930(_) => None,
            Request::Eip1559(transaction) => Some(&transaction.max_priority_fee_per_gas),
        }
    }

    /// Retrieves the instance's nonce.
    pub fn nonce(&self) -> u64 {
        match self {
            Request::Legacy(transaction) => transaction.nonce,
            Request::Eip155(transaction) => transaction.nonce,
            Request::Eip2930(transaction) => transaction.nonce,
            Request::Eip1559(transaction) => transaction.nonce,
        }
    }

    /// Signs the transaction with the provided secret key.
    pub fn sign(self, secret_key: &SecretKey) -> Result<Signed, SignatureError> {
        Ok(match self {
            Request::Legacy(transaction) => transaction.sign(secret_key)?.into(),
            Request::Eip155(transaction) => transaction.sign(secret_key)?.into(),
            Request::Eip2930(transaction) => transaction.sign(secret_key)?.into(),
            Request::Eip1559(transaction) => transaction.sign(secret_key)?.into(),
        })
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
    ) -> Result<Signed, SignatureError> {
        Ok(match self {
            Request::Legacy(transaction) => {
                // SAFETY: The safety concern is propagated in the function signature.
                unsafe { transaction.sign_for_sender_unchecked(secret_key, caller) }?.into()
            }
            Request::Eip155(transaction) => {
                // SAFETY: The safety concern is propagated in the function signature.
                unsafe { transaction.sign_for_sender_unchecked(secret_key, caller) }?.into()
            }
            Request::Eip2930(transaction) => {
                // SAFETY: The safety concern is propagated in the function signature.
                unsafe { transaction.sign_for_sender_unchecked(secret_key, caller) }?.into()
            }
            Request::Eip1559(transaction) => {
                // SAFETY: The safety concern is propagated in the function signature.
                unsafe { transaction.sign_for_sender_unchecked(secret_key, caller) }?.into()
            }
        })
    }

    /// Signs the transaction with a fake signature for the provided sender.
    pub fn fake_sign(self, sender: Address) -> Signed {
        match self {
            Request::Legacy(transaction) => transaction.fake_sign(sender).into(),
            Request::Eip155(transaction) => transaction.fake_sign(sender).into(),
            Request::Eip2930(transaction) => transaction.fake_sign(sender).into(),
            Request::Eip1559(transaction) => transaction.fake_sign(sender).into(),
        }
    }
}

/// A transaction request and the sender's address.
#[derive(Clone, Debug)]
pub struct TransactionRequestAndSender {
    /// The transaction request.
    pub request: Request,
    /// The sender's address.
    pub sender: Address,
}
