// Path: crates/crypto/src/sign/bls.rs

//! BLS12-381 signatures and aggregation for endorsements.
//!
//! Conforms to a BLS variant using Hash-to-Scalar for compatibility:
//! - Signatures in G1
//! - Public keys in G2
//! - Message hashing via `Scalar::hash_to_field`
//!
//! Endorsement quorums sign a common digest, so aggregation is plain group
//! addition: the sum of the signatures verifies against the sum of the
//! public keys.

use dcrypt::algorithms::ec::bls12_381::{
    pairing, Bls12_381Scalar as Scalar, G1Affine, G1Projective, G2Affine, G2Projective,
};
use gitmesh_api::crypto::{SerializableKey, Signature, SigningKey, SigningKeyPair, VerifyingKey};
use gitmesh_types::error::CryptoError;
use rand::rngs::OsRng;
use rand::RngCore;

/// Domain separation tag for message hashing.
const BLS_DST: &[u8] = b"BLS_SIG_BLS12381G1_XMD:SHA-256_SSWU_RO_NUL_";

/// Domain separation tag for key generation.
const BLS_KEYGEN_DST: &[u8] = b"GITMESH-BLS-KEYGEN";

/// Compressed size of a G2 public key.
pub const BLS_PUBLIC_KEY_LEN: usize = 96;

/// Compressed size of a G1 signature.
pub const BLS_SIGNATURE_LEN: usize = 48;

/// BLS key pair.
#[derive(Clone)]
pub struct BlsKeyPair {
    public_key: BlsPublicKey,
    secret_key: BlsPrivateKey,
}

/// BLS public key (a point in G2).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlsPublicKey(pub G2Affine);

/// BLS private key (a scalar).
#[derive(Clone)]
pub struct BlsPrivateKey(pub Scalar);

/// BLS signature (a point in G1).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlsSignature(pub G1Affine);

fn hash_to_point(message: &[u8]) -> Result<G1Projective, CryptoError> {
    let msg_scalar = Scalar::hash_to_field(message, BLS_DST)
        .map_err(|e| CryptoError::OperationFailed(format!("hash to field failed: {:?}", e)))?;
    Ok(G1Projective::generator() * msg_scalar)
}

impl BlsKeyPair {
    /// Generates a new key pair from system randomness.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut rng = OsRng;
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);

        let secret = Scalar::hash_to_field(&bytes, BLS_KEYGEN_DST)
            .map_err(|e| CryptoError::OperationFailed(format!("keygen failed: {:?}", e)))?;
        let public = G2Affine::from(G2Projective::generator() * secret);

        Ok(Self {
            public_key: BlsPublicKey(public),
            secret_key: BlsPrivateKey(secret),
        })
    }
}

impl SigningKeyPair for BlsKeyPair {
    type PublicKey = BlsPublicKey;
    type PrivateKey = BlsPrivateKey;
    type Signature = BlsSignature;

    fn public_key(&self) -> Self::PublicKey {
        self.public_key.clone()
    }

    fn private_key(&self) -> Self::PrivateKey {
        self.secret_key.clone()
    }

    fn sign(&self, message: &[u8]) -> Result<Self::Signature, CryptoError> {
        self.secret_key.sign(message)
    }
}

impl VerifyingKey for BlsPublicKey {
    type Signature = BlsSignature;

    fn verify(&self, message: &[u8], signature: &Self::Signature) -> Result<(), CryptoError> {
        let msg_point = G1Affine::from(hash_to_point(message)?);

        // e(sig, g2) == e(H(m), pk)
        let lhs = pairing(&signature.0, &G2Affine::generator());
        let rhs = pairing(&msg_point, &self.0);

        if lhs == rhs {
            Ok(())
        } else {
            Err(CryptoError::VerificationFailed)
        }
    }
}

impl SerializableKey for BlsPublicKey {
    fn to_bytes(&self) -> Vec<u8> {
        self.0.to_compressed().as_ref().to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != BLS_PUBLIC_KEY_LEN {
            return Err(CryptoError::InvalidLength {
                expected: BLS_PUBLIC_KEY_LEN,
                got: bytes.len(),
            });
        }
        let arr: [u8; BLS_PUBLIC_KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("G2 point".into()))?;
        let point = G2Affine::from_compressed(&arr)
            .into_option()
            .ok_or_else(|| CryptoError::InvalidKey("invalid G2 point".into()))?;
        Ok(Self(point))
    }
}

impl SigningKey for BlsPrivateKey {
    type Signature = BlsSignature;

    fn sign(&self, message: &[u8]) -> Result<Self::Signature, CryptoError> {
        // Sig = sk * H(m)
        let sig_proj = hash_to_point(message)? * self.0;
        Ok(BlsSignature(G1Affine::from(sig_proj)))
    }
}

impl SerializableKey for BlsPrivateKey {
    fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes().to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidLength {
                expected: 32,
                got: bytes.len(),
            });
        }
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("scalar".into()))?;
        let scalar = Scalar::from_bytes(&arr)
            .into_option()
            .ok_or_else(|| CryptoError::InvalidKey("invalid scalar".into()))?;
        Ok(Self(scalar))
    }
}

impl SerializableKey for BlsSignature {
    fn to_bytes(&self) -> Vec<u8> {
        self.0.to_compressed().as_ref().to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != BLS_SIGNATURE_LEN {
            return Err(CryptoError::InvalidLength {
                expected: BLS_SIGNATURE_LEN,
                got: bytes.len(),
            });
        }
        let arr: [u8; BLS_SIGNATURE_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSignature("G1 point".into()))?;
        let point = G1Affine::from_compressed(&arr)
            .map_err(|_| CryptoError::InvalidSignature("invalid G1 point".into()))?;
        Ok(Self(point))
    }
}

impl Signature for BlsSignature {}

/// Aggregates signatures over a common message into a single group
/// signature.
pub fn aggregate_signatures(signatures: &[BlsSignature]) -> Result<BlsSignature, CryptoError> {
    let mut iter = signatures.iter();
    let first = iter
        .next()
        .ok_or_else(|| CryptoError::InvalidInput("empty signature set".into()))?;
    let mut acc = G1Projective::from(first.0);
    for sig in iter {
        acc = acc + G1Projective::from(sig.0);
    }
    Ok(BlsSignature(G1Affine::from(acc)))
}

/// Aggregates the signers' public keys into the group key the aggregated
/// signature verifies against.
pub fn aggregate_public_keys(keys: &[BlsPublicKey]) -> Result<BlsPublicKey, CryptoError> {
    let mut iter = keys.iter();
    let first = iter
        .next()
        .ok_or_else(|| CryptoError::InvalidInput("empty key set".into()))?;
    let mut acc = G2Projective::from(first.0);
    for key in iter {
        acc = acc + G2Projective::from(key.0);
    }
    Ok(BlsPublicKey(G2Affine::from(acc)))
}

/// Verifies an aggregated signature over a common message against the
/// signers' public keys.
pub fn verify_aggregated(
    message: &[u8],
    signature: &BlsSignature,
    keys: &[BlsPublicKey],
) -> Result<(), CryptoError> {
    let group_key = aggregate_public_keys(keys)?;
    group_key.verify(message, signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let keypair = BlsKeyPair::generate().unwrap();
        let message = b"endorsement digest";
        let signature = keypair.sign(message).unwrap();

        keypair.public_key().verify(message, &signature).unwrap();
        assert!(keypair.public_key().verify(b"wrong", &signature).is_err());

        let pk_bytes = keypair.public_key().to_bytes();
        let restored = BlsPublicKey::from_bytes(&pk_bytes).unwrap();
        assert_eq!(keypair.public_key(), restored);
    }

    #[test]
    fn aggregation_over_common_message_verifies() {
        let message = b"common endorsement digest";
        let keypairs: Vec<BlsKeyPair> =
            (0..4).map(|_| BlsKeyPair::generate().unwrap()).collect();

        let signatures: Vec<BlsSignature> =
            keypairs.iter().map(|kp| kp.sign(message).unwrap()).collect();
        let keys: Vec<BlsPublicKey> = keypairs.iter().map(|kp| kp.public_key()).collect();

        let agg = aggregate_signatures(&signatures).unwrap();
        verify_aggregated(message, &agg, &keys).unwrap();

        // Dropping a signer breaks the group signature.
        verify_aggregated(message, &agg, &keys[..3]).unwrap_err();
    }

    #[test]
    fn aggregation_rejects_empty_sets() {
        assert!(aggregate_signatures(&[]).is_err());
        assert!(aggregate_public_keys(&[]).is_err());
    }
}
