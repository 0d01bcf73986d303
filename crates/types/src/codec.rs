// Path: crates/types/src/codec.rs

//! The canonical, deterministic binary codec for all consensus-critical data.
//!
//! Transactions, push notes, and endorsements are hashed, signed, and
//! gossiped as SCALE bytes produced here; the leading enum index byte of a
//! [`crate::tx::Transaction`] is its on-wire type code, pinned with explicit
//! `#[codec(index = N)]` attributes. Higher layers must never re-serialize
//! these structures with anything else, or identities and signatures stop
//! lining up across peers.

use crate::error::CoreError;
use crate::identity::{sha256, Hash32};
use parity_scale_codec::{Decode, DecodeAll, Encode};

/// Encodes a value into its canonical byte representation.
///
/// SCALE encoding is total, so this cannot fail; the canonical form of a
/// value is unique.
pub fn to_bytes_canonical<T: Encode>(v: &T) -> Vec<u8> {
    v.encode()
}

/// Decodes a value from its canonical byte representation.
///
/// Trailing bytes are an error: a malleable encoding of a note or
/// transaction would fork its identity between peers.
pub fn from_bytes_canonical<T: Decode>(b: &[u8]) -> Result<T, String> {
    T::decode_all(&mut &*b).map_err(|e| format!("canonical decode failed: {}", e))
}

/// The canonical digest of a value: SHA-256 over its canonical encoding.
///
/// Every identity in the system (transaction hashes, note ids, endorsement
/// ids) is computed through this single path.
pub fn sha256_canonical<T: Encode>(v: &T) -> Result<Hash32, CoreError> {
    sha256(&to_bytes_canonical(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::PushedReference;
    use crate::tx::TokenAmount;

    fn reference() -> PushedReference {
        PushedReference {
            name: "refs/heads/master".to_string(),
            old_hash: "0".repeat(40),
            new_hash: "a".repeat(40),
            nonce: 3,
            fee: TokenAmount::from("0.25"),
            value: TokenAmount::zero(),
            merge_proposal_id: "12".to_string(),
            objects: vec!["b".repeat(40)],
            push_sig: vec![7; 64],
        }
    }

    #[test]
    fn pushed_reference_round_trips() {
        let original = reference();
        let encoded = to_bytes_canonical(&original);
        assert!(!encoded.is_empty());
        let decoded = from_bytes_canonical::<PushedReference>(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn truncation_and_trailing_bytes_are_rejected() {
        let mut truncated = to_bytes_canonical(&reference());
        truncated.pop();
        assert!(from_bytes_canonical::<PushedReference>(&truncated).is_err());

        let mut padded = to_bytes_canonical(&reference());
        padded.push(0xFF);
        assert!(from_bytes_canonical::<PushedReference>(&padded).is_err());
    }

    #[test]
    fn canonical_digest_is_stable_and_content_sensitive() {
        let a = reference();
        let mut b = a.clone();
        assert_eq!(sha256_canonical(&a).unwrap(), sha256_canonical(&b).unwrap());

        b.new_hash = "c".repeat(40);
        assert_ne!(sha256_canonical(&a).unwrap(), sha256_canonical(&b).unwrap());
    }
}
