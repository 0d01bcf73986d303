// Path: crates/types/src/identity.rs

//! Addresses, public keys, and hashing helpers.
//!
//! The sender address is derived from the Ed25519 public key and is the
//! canonical identity used by the transaction pool. Push keys carry their own
//! derived identifier so that repository policy can reference them without
//! exposing raw key material.

use crate::error::CoreError;
use dcrypt::algorithms::hash::{HashFunction, Sha256 as DcryptSha256};
use dcrypt::algorithms::types::ByteSerializable;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// A fixed-size, 32-byte digest.
pub type Hash32 = [u8; 32];

/// A fixed-size, 32-byte hash of a transaction.
pub type TxHash = [u8; 32];

/// Number of digest bytes used for the short address form.
const ADDR_DIGEST_LEN: usize = 20;

/// Prefix identifying a user account address.
const ADDR_PREFIX: &str = "gm";

/// Prefix identifying a push key.
const PUSH_KEY_PREFIX: &str = "gpk";

/// Computes the canonical SHA-256 digest of a byte string.
pub fn sha256(bytes: &[u8]) -> Result<Hash32, CoreError> {
    let digest = DcryptSha256::digest(bytes).map_err(|e| CoreError::Crypto(e.to_string()))?;
    digest
        .to_bytes()
        .try_into()
        .map_err(|_| CoreError::Crypto("invalid digest length".into()))
}

/// A raw 32-byte Ed25519 public key.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Encode, Decode,
)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    /// Returns the key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derives the account address owned by this key.
    pub fn to_address(&self) -> Result<Address, CoreError> {
        let digest = sha256(&self.0)?;
        Ok(Address(format!(
            "{}{}",
            ADDR_PREFIX,
            bs58::encode(&digest[..ADDR_DIGEST_LEN]).into_string()
        )))
    }

    /// Derives the push-key identifier for this key.
    ///
    /// Push keys and accounts share key material but live in different
    /// on-chain registries, so the identifiers are namespaced apart.
    pub fn to_push_key_id(&self) -> Result<String, CoreError> {
        let digest = sha256(&self.0)?;
        Ok(format!(
            "{}{}",
            PUSH_KEY_PREFIX,
            bs58::encode(&digest[..ADDR_DIGEST_LEN]).into_string()
        ))
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A bs58-rendered account address.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Encode,
    Decode,
)]
pub struct Address(pub String);

impl Address {
    /// Returns the rendered address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns true if `id` has the surface form of a push-key identifier.
pub fn is_push_key_id(id: &str) -> bool {
    id.starts_with(PUSH_KEY_PREFIX) && id.len() > PUSH_KEY_PREFIX.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_derivation_is_stable() {
        let pk = PublicKey([7u8; 32]);
        let a = pk.to_address().unwrap();
        let b = pk.to_address().unwrap();
        assert_eq!(a, b);
        assert!(a.as_str().starts_with(ADDR_PREFIX));
    }

    #[test]
    fn push_key_id_differs_from_address() {
        let pk = PublicKey([9u8; 32]);
        let addr = pk.to_address().unwrap();
        let key_id = pk.to_push_key_id().unwrap();
        assert_ne!(addr.as_str(), key_id);
        assert!(is_push_key_id(&key_id));
        assert!(!is_push_key_id(addr.as_str()));
    }
}
