// Path: crates/crypto/src/sign/eddsa.rs

//! Ed25519 signatures for transactions and push notes.
//!
//! Transactions and push notes carry the raw 32-byte
//! [`gitmesh_types::PublicKey`] and detached signature bytes, so this module
//! works in those terms directly: `dcrypt` key material exists only inside
//! [`Ed25519KeyPair`] and is rehydrated on demand for verification.

use dcrypt::api::Signature as _;
use dcrypt::sign::eddsa;
use gitmesh_types::error::CryptoError;
use gitmesh_types::PublicKey;
use rand::rngs::OsRng;

/// Length of a detached Ed25519 signature.
pub const SIGNATURE_LEN: usize = 64;

/// An Ed25519 signing identity.
///
/// Holds the raw public key alongside the secret so callers never need to
/// convert key material at use sites.
#[derive(Clone)]
pub struct Ed25519KeyPair {
    secret: eddsa::Ed25519SecretKey,
    public: PublicKey,
}

impl Ed25519KeyPair {
    /// Generates a fresh identity from system randomness.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut rng = OsRng;
        let (public, secret) = eddsa::Ed25519::keypair(&mut rng)
            .map_err(|e| CryptoError::OperationFailed(e.to_string()))?;
        Ok(Self {
            public: raw_key(&public)?,
            secret,
        })
    }

    /// Rebuilds an identity from stored secret-key bytes (the key store's
    /// format).
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidLength { expected: 32, got: bytes.len() })?;
        let secret = eddsa::Ed25519SecretKey::from_seed(&seed)
            .map_err(|e| CryptoError::InvalidKey(format!("secret key: {:?}", e)))?;
        let public = secret
            .public_key()
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self {
            public: raw_key(&public)?,
            secret,
        })
    }

    /// The raw public key as carried inside transactions and push notes.
    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Produces the detached signature bytes for a message.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let signature = eddsa::Ed25519::sign(message, &self.secret)
            .map_err(|e| CryptoError::OperationFailed(e.to_string()))?;
        Ok(signature.to_bytes().to_vec())
    }
}

fn raw_key(public: &eddsa::Ed25519PublicKey) -> Result<PublicKey, CryptoError> {
    let bytes: Vec<u8> = public.to_bytes().to_vec();
    let got = bytes.len();
    bytes
        .try_into()
        .map(PublicKey)
        .map_err(|_| CryptoError::InvalidLength { expected: 32, got })
}

/// Verifies a detached signature against a raw public key, the only form
/// verification takes anywhere in the node: per-reference signatures, the
/// note-level signature, and transaction signatures all arrive as
/// `(PublicKey, bytes)` pairs.
pub fn verify(pub_key: &PublicKey, message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
    if signature.len() != SIGNATURE_LEN {
        return Err(CryptoError::InvalidLength {
            expected: SIGNATURE_LEN,
            got: signature.len(),
        });
    }
    let pk = eddsa::Ed25519PublicKey::from_bytes(pub_key.as_bytes())
        .map_err(|e| CryptoError::InvalidKey(format!("public key: {:?}", e)))?;
    let sig = eddsa::Ed25519Signature::from_bytes(signature)
        .map_err(|e| CryptoError::InvalidSignature(format!("{:?}", e)))?;
    eddsa::Ed25519::verify(message, &sig, &pk).map_err(|_| CryptoError::VerificationFailed)
}
