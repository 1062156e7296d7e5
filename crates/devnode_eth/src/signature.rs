use alloy_rlp::BufMut;
use k256::{
    ecdsa::{RecoveryId, Signature as ECDSASignature, SigningKey, VerifyingKey},
    elliptic_curve::sec1::ToEncodedPoint,
    FieldBytes, PublicKey, SecretKey,
};
use sha3::{Digest, Keccak256};

use crate::{Address, B256, U256};

/// An error involving a signature.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    /// Invalid secret key string.
    #[error("Invalid hex")]
    InvalidSecretKeyHex,
    /// Invalid secret key length.
    #[error("Expected 32 byte secret key")]
    InvalidSecretKeyLength,
    /// ECDSA error.
    #[error(transparent)]
    Ecdsa(#[from] k256::ecdsa::signature::Error),
    /// Elliptic curve error.
    #[error(transparent)]
    EllipticCurve(#[from] k256::elliptic_curve::Error),
    /// The recovery id does not correspond to a valid point.
    #[error("Public key recovery error")]
    Recovery,
}

/// Trait for an ECDSA signature in Ethereum's `r || s || v` form.
pub trait Signature {
    /// The signature's R-value.
    fn r(&self) -> U256;
    /// The signature's S-value.
    fn s(&self) -> U256;
    /// The signature's V-value.
    fn v(&self) -> u64;
}

/// Trait for a signature from which the signer's address can be recovered.
pub trait RecoverableSignature: Signature {
    /// Recovers the Ethereum address that signed the provided message hash.
    fn recover_address(&self, message_hash: B256) -> Result<Address, SignatureError>;
}

fn recover_verifying_key(
    message_hash: B256,
    r: U256,
    s: U256,
    recovery_id: u8,
) -> Result<VerifyingKey, SignatureError> {
    let recovery_id = RecoveryId::from_byte(recovery_id).ok_or(SignatureError::Recovery)?;

    let signature = ECDSASignature::from_scalars(
        FieldBytes::from(r.to_be_bytes::<32>()),
        FieldBytes::from(s.to_be_bytes::<32>()),
    )?;

    VerifyingKey::recover_from_prehash(message_hash.as_slice(), &signature, recovery_id)
        .map_err(SignatureError::Ecdsa)
}

/// An ECDSA signature with a recovery id, as used by legacy transactions.
///
/// The `v` value is stored as produced for the enclosing transaction:
/// `27 + y_parity` for pre-EIP-155 transactions and `chain_id * 2 + 35 +
/// y_parity` for EIP-155 transactions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct SignatureWithRecoveryId {
    /// R value.
    pub r: U256,
    /// S value.
    pub s: U256,
    /// V value.
    #[serde(with = "crate::serde::u64")]
    pub v: u64,
}

impl SignatureWithRecoveryId {
    /// Signs the provided message hash, returning a signature with
    /// `v = 27 + y_parity`.
    pub fn new(message_hash: B256, secret_key: &SecretKey) -> Result<Self, SignatureError> {
        let signing_key = SigningKey::from(secret_key);
        let (signature, recovery_id) =
            signing_key.sign_prehash_recoverable(message_hash.as_slice())?;

        let r = U256::from_be_slice(signature.r().to_bytes().as_slice());
        let s = U256::from_be_slice(signature.s().to_bytes().as_slice());

        Ok(Self {
            r,
            s,
            v: 27 + u64::from(recovery_id.to_byte()),
        })
    }

    /// The parity of the Y-value of the curve point, independent of how `v`
    /// was encoded.
    pub fn odd_y_parity(&self) -> bool {
        self.normalized_recovery_id() == 1
    }

    fn normalized_recovery_id(&self) -> u8 {
        match self.v {
            v if v >= 35 => ((v - 35) % 2) as u8,
            27 | 28 => (self.v - 27) as u8,
            v => (v % 2) as u8,
        }
    }
}

impl Signature for SignatureWithRecoveryId {
    fn r(&self) -> U256 {
        self.r
    }

    fn s(&self) -> U256 {
        self.s
    }

    fn v(&self) -> u64 {
        self.v
    }
}

impl RecoverableSignature for SignatureWithRecoveryId {
    fn recover_address(&self, message_hash: B256) -> Result<Address, SignatureError> {
        let verifying_key =
            recover_verifying_key(message_hash, self.r, self.s, self.normalized_recovery_id())?;

        Ok(public_key_to_address(verifying_key.into()))
    }
}

impl alloy_rlp::Encodable for SignatureWithRecoveryId {
    // Encoded as three consecutive items; the enclosing transaction provides
    // the list header.
    fn encode(&self, out: &mut dyn BufMut) {
        self.v.encode(out);
        self.r.encode(out);
        self.s.encode(out);
    }

    fn length(&self) -> usize {
        self.v.length() + self.r.length() + self.s.length()
    }
}

impl alloy_rlp::Decodable for SignatureWithRecoveryId {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let v = u64::decode(buf)?;
        let r = U256::decode(buf)?;
        let s = U256::decode(buf)?;

        Ok(Self { r, s, v })
    }
}

/// An ECDSA signature with a Y-parity bit, as used by typed transactions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureWithYParity {
    /// R value.
    pub r: U256,
    /// S value.
    pub s: U256,
    /// Parity of the Y-value of the curve point.
    pub y_parity: bool,
}

impl SignatureWithYParity {
    /// Signs the provided message hash.
    pub fn new(message_hash: B256, secret_key: &SecretKey) -> Result<Self, SignatureError> {
        let signing_key = SigningKey::from(secret_key);
        let (signature, recovery_id) =
            signing_key.sign_prehash_recoverable(message_hash.as_slice())?;

        let r = U256::from_be_slice(signature.r().to_bytes().as_slice());
        let s = U256::from_be_slice(signature.s().to_bytes().as_slice());

        Ok(Self {
            r,
            s,
            y_parity: recovery_id.is_y_odd(),
        })
    }
}

impl Signature for SignatureWithYParity {
    fn r(&self) -> U256 {
        self.r
    }

    fn s(&self) -> U256 {
        self.s
    }

    fn v(&self) -> u64 {
        u64::from(self.y_parity)
    }
}

impl RecoverableSignature for SignatureWithYParity {
    fn recover_address(&self, message_hash: B256) -> Result<Address, SignatureError> {
        let verifying_key =
            recover_verifying_key(message_hash, self.r, self.s, u8::from(self.y_parity))?;

        Ok(public_key_to_address(verifying_key.into()))
    }
}

impl alloy_rlp::Encodable for SignatureWithYParity {
    // Encoded as three consecutive items; the enclosing transaction provides
    // the list header.
    fn encode(&self, out: &mut dyn BufMut) {
        self.y_parity.encode(out);
        self.r.encode(out);
        self.s.encode(out);
    }

    fn length(&self) -> usize {
        self.y_parity.length() + self.r.length() + self.s.length()
    }
}

impl alloy_rlp::Decodable for SignatureWithYParity {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let y_parity = bool::decode(buf)?;
        let r = U256::decode(buf)?;
        let s = U256::decode(buf)?;

        Ok(Self { r, s, y_parity })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
enum FakeableData<SignatureT> {
    Fake {
        recovery_id: u64,
    },
    Recoverable {
        signature: SignatureT,
    },
}

/// A signature that is either a real ECDSA signature or a fake one standing
/// in for an impersonated sender, paired with the known caller address.
///
/// A fake signature only needs to hash differently for different senders; we
/// use the sender's address for both the `r` and `s` values, which also makes
/// fake signatures easy to spot in debug output.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct Fakeable<SignatureT> {
    data: FakeableData<SignatureT>,
    address: Address,
}

impl<SignatureT> Fakeable<SignatureT> {
    /// Constructs an instance from a signature and the address it recovers
    /// to.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the address matches the signature's
    /// recoverable address.
    pub const unsafe fn with_address_unchecked(signature: SignatureT, address: Address) -> Self {
        Self {
            data: FakeableData::Recoverable { signature },
            address,
        }
    }

    /// Constructs a fake signature for the provided caller address. When no
    /// recovery id is provided, the parity bit defaults to 1.
    pub fn fake(address: Address, recovery_id: Option<u64>) -> Self {
        Self {
            data: FakeableData::Fake {
                recovery_id: recovery_id.unwrap_or(1),
            },
            address,
        }
    }

    /// Whether the signature is from an impersonated account.
    pub fn is_fake(&self) -> bool {
        matches!(self.data, FakeableData::Fake { .. })
    }

    /// Returns the Ethereum address of the transaction's caller.
    pub fn caller(&self) -> &Address {
        &self.address
    }

    fn address_as_scalar(&self) -> U256 {
        // An address is 20 bytes, which always fits into a U256.
        U256::from_be_slice(self.address.as_slice())
    }
}

impl<SignatureT: RecoverableSignature> Fakeable<SignatureT> {
    /// Recovers the caller address from the signature and the signed message
    /// hash.
    pub fn recover(signature: SignatureT, message_hash: B256) -> Result<Self, SignatureError> {
        let address = signature.recover_address(message_hash)?;

        Ok(Self {
            data: FakeableData::Recoverable { signature },
            address,
        })
    }
}

impl<SignatureT: Signature> Signature for Fakeable<SignatureT> {
    fn r(&self) -> U256 {
        match &self.data {
            FakeableData::Fake { .. } => self.address_as_scalar(),
            FakeableData::Recoverable { signature } => signature.r(),
        }
    }

    fn s(&self) -> U256 {
        match &self.data {
            FakeableData::Fake { .. } => self.address_as_scalar(),
            FakeableData::Recoverable { signature } => signature.s(),
        }
    }

    fn v(&self) -> u64 {
        match &self.data {
            FakeableData::Fake { recovery_id } => *recovery_id,
            FakeableData::Recoverable { signature } => signature.v(),
        }
    }
}

impl alloy_rlp::Encodable for Fakeable<SignatureWithRecoveryId> {
    fn encode(&self, out: &mut dyn BufMut) {
        match &self.data {
            FakeableData::Fake { recovery_id } => {
                recovery_id.encode(out);
                self.address_as_scalar().encode(out);
                self.address_as_scalar().encode(out);
            }
            FakeableData::Recoverable { signature } => signature.encode(out),
        }
    }

    fn length(&self) -> usize {
        match &self.data {
            FakeableData::Fake { recovery_id } => {
                recovery_id.length() + 2 * self.address_as_scalar().length()
            }
            FakeableData::Recoverable { signature } => signature.length(),
        }
    }
}

impl alloy_rlp::Encodable for Fakeable<SignatureWithYParity> {
    fn encode(&self, out: &mut dyn BufMut) {
        match &self.data {
            FakeableData::Fake { recovery_id } => {
                (*recovery_id == 1).encode(out);
                self.address_as_scalar().encode(out);
                self.address_as_scalar().encode(out);
            }
            FakeableData::Recoverable { signature } => signature.encode(out),
        }
    }

    fn length(&self) -> usize {
        match &self.data {
            FakeableData::Fake { recovery_id } => {
                (*recovery_id == 1).length() + 2 * self.address_as_scalar().length()
            }
            FakeableData::Recoverable { signature } => signature.length(),
        }
    }
}

/// Converts a [`PublicKey`] to an [`Address`].
pub fn public_key_to_address(public_key: PublicKey) -> Address {
    let public_key = public_key.to_encoded_point(/* compress = */ false);
    // First byte is the SEC1 header value
    let hash = Keccak256::digest(&public_key.as_bytes()[1..]);
    // Only take the lower 160 bits of the hash
    Address::from_slice(&hash[12..])
}

/// Converts a hex string, with or without a `0x` prefix, to a secret key.
pub fn secret_key_from_str(secret_key: &str) -> Result<SecretKey, SignatureError> {
    let secret_key = if let Some(stripped) = secret_key.strip_prefix("0x") {
        hex::decode(stripped)
    } else {
        hex::decode(secret_key)
    }
    // Hex errors can leak characters, so use an opaque one.
    .map_err(|_err| SignatureError::InvalidSecretKeyHex)?;

    let secret_key = FieldBytes::from_exact_iter(secret_key.into_iter())
        .ok_or(SignatureError::InvalidSecretKeyLength)?;

    SecretKey::from_bytes(&secret_key).map_err(SignatureError::EllipticCurve)
}

/// Returns the address belonging to the provided secret key.
pub fn secret_key_to_address(secret_key: &SecretKey) -> Address {
    public_key_to_address(secret_key.public_key())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::keccak256;

    const SECRET_KEY: &str = "e331b6d69882b4cb4ea581d88e0b604039a3de5967688d3dcffdd2270c0fd109";

    #[test]
    fn sign_and_recover_round_trip() -> anyhow::Result<()> {
        let secret_key = secret_key_from_str(SECRET_KEY)?;
        let expected = secret_key_to_address(&secret_key);

        let message_hash = keccak256(b"devnode");

        let signature = SignatureWithRecoveryId::new(message_hash, &secret_key)?;
        assert!(signature.v == 27 || signature.v == 28);
        assert_eq!(signature.recover_address(message_hash)?, expected);

        let signature = SignatureWithYParity::new(message_hash, &secret_key)?;
        assert_eq!(signature.recover_address(message_hash)?, expected);

        Ok(())
    }

    #[test]
    fn fake_signature_caller() {
        let address = Address::from_str("0xc014ba5ec014ba5ec014ba5ec014ba5ec014ba5e").unwrap();
        let signature = Fakeable::<SignatureWithRecoveryId>::fake(address, None);

        assert!(signature.is_fake());
        assert_eq!(*signature.caller(), address);
        assert_eq!(signature.r(), U256::from_be_slice(address.as_slice()));
        assert_eq!(signature.v(), 1);
    }
}
