// Path: crates/types/src/push/mod.rs

//! Push notes, pushed references, and endorsements.
//!
//! A push note is a signed description of a set of reference updates a
//! pusher wishes to make to a named repository. The per-reference detached
//! signatures are the authoritative attestation; the note-level signature
//! only fixes the note's identity. Endorsements are BLS-signed attestations
//! by top hosts that the note validated against their local replica.

use crate::error::{CoreError, TxError};
use crate::identity::{Hash32, PublicKey};
use crate::tx::TokenAmount;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Maximum byte length of a merge-proposal identifier.
pub const MAX_MERGE_PROPOSAL_ID_LEN: usize = 8;

/// A single reference update inside a push note.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct PushedReference {
    /// Reference name, e.g. `refs/heads/master`.
    pub name: String,
    /// The hash the pusher observed for this reference before the update.
    pub old_hash: String,
    /// The hash the reference should point at after the update.
    pub new_hash: String,
    /// The pusher key's nonce for this update.
    pub nonce: u64,
    /// The fee attached to this reference update.
    pub fee: TokenAmount,
    /// Optional value transfer attached to this reference update.
    pub value: TokenAmount,
    /// Optional numeric merge-proposal identifier; empty when unset.
    pub merge_proposal_id: String,
    /// Hashes of the objects a receiver must obtain to replay this update.
    pub objects: Vec<String>,
    /// The pusher's detached signature over this reference's canonical digest.
    pub push_sig: Vec<u8>,
}

impl PushedReference {
    /// The canonical byte string the pusher's detached signature covers:
    /// the reference's transaction details.
    ///
    /// Hashes and object lists are deliberately excluded: the signing tool
    /// produces this signature before the receiving node has computed
    /// either. The note id remains the handle over the full content.
    pub fn sign_bytes(&self) -> Result<Vec<u8>, TxError> {
        Ok(crate::codec::to_bytes_canonical(&(
            &self.name,
            self.nonce,
            &self.fee,
            &self.value,
            &self.merge_proposal_id,
        )))
    }

    /// Validates the surface form of the merge-proposal identifier.
    pub fn validate_merge_proposal_id(&self) -> Result<(), TxError> {
        if self.merge_proposal_id.is_empty() {
            return Ok(());
        }
        if self.merge_proposal_id.len() > MAX_MERGE_PROPOSAL_ID_LEN {
            return Err(TxError::Invalid(format!(
                "merge proposal id exceeds {} bytes",
                MAX_MERGE_PROPOSAL_ID_LEN
            )));
        }
        if !self.merge_proposal_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TxError::Invalid("merge proposal id must be numeric".into()));
        }
        Ok(())
    }
}

/// A signed description of a set of reference updates for one repository.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct PushNote {
    /// The target repository name.
    pub repo_name: String,
    /// Optional namespace the repository name resolves under.
    pub namespace: Option<String>,
    /// The pusher's registered push-key identifier.
    pub pusher_key_id: String,
    /// The pusher's Ed25519 public key; per-reference signatures verify
    /// against it.
    pub pusher_pub_key: PublicKey,
    /// Creation time, unix seconds. Drives the seen-cache TTL.
    pub timestamp: u64,
    /// Sum of the pushed references' object sizes in bytes.
    pub size: u64,
    /// The reference updates carried by this note.
    pub references: Vec<PushedReference>,
    /// The note-level signature. A handle only; per-reference signatures are
    /// the authoritative attestation.
    pub sig: Vec<u8>,
}

impl PushNote {
    /// The note identity: the digest of the full serialized form.
    pub fn id(&self) -> Result<Hash32, CoreError> {
        crate::codec::sha256_canonical(self)
    }

    /// Hex rendering of [`PushNote::id`] for logs and errors.
    pub fn id_hex(&self) -> String {
        self.id().map(hex::encode).unwrap_or_default()
    }

    /// The canonical byte string the note-level signature covers: the
    /// pusher-known fields, with sizes, hashes, and object lists cleared so
    /// the signing tool can compute it before the server fills them in.
    pub fn sign_bytes(&self) -> Result<Vec<u8>, TxError> {
        let mut unsigned = self.clone();
        unsigned.sig = vec![];
        unsigned.size = 0;
        for reference in &mut unsigned.references {
            reference.old_hash = String::new();
            reference.new_hash = String::new();
            reference.objects = vec![];
            reference.push_sig = vec![];
        }
        Ok(crate::codec::to_bytes_canonical(&unsigned))
    }

    /// Sum of the per-reference fees.
    pub fn total_fees(&self) -> Result<TokenAmount, TxError> {
        let mut total = rust_decimal::Decimal::ZERO;
        for r in &self.references {
            total += r.fee.decimal()?;
        }
        Ok(TokenAmount::new(total.normalize().to_string()))
    }

    /// Total number of objects announced across all references.
    pub fn object_count(&self) -> usize {
        self.references.iter().map(|r| r.objects.len()).sum()
    }
}

/// The endorser's locally observed state of one reference.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct EndorsedReference {
    /// The hash the endorser observed for the reference.
    pub old_hash: String,
}

/// A BLS-signed attestation by a top host that it validated a push note.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Endorsement {
    /// The endorsed note's identity. Cleared during payload compaction.
    pub note_id: Vec<u8>,
    /// The endorser's Ed25519 identity; its ticket resolves the BLS key.
    pub endorser_pub_key: PublicKey,
    /// The endorser's observed reference state, mirroring the note's
    /// references in count and order. Cleared on all but the first
    /// endorsement during payload compaction.
    pub references: Vec<EndorsedReference>,
    /// The BLS signature over [`Endorsement::sign_bytes`]. Cleared after
    /// aggregation.
    pub sig: Vec<u8>,
}

impl Endorsement {
    /// The canonical byte string the BLS signature covers: the wire form
    /// with both the signature and the endorser identity cleared.
    ///
    /// Every member of a quorum therefore signs the same digest, which is
    /// what lets the builder aggregate their signatures into one group
    /// signature.
    pub fn sign_bytes(&self) -> Result<Vec<u8>, TxError> {
        let mut unsigned = self.clone();
        unsigned.sig = vec![];
        unsigned.endorser_pub_key = PublicKey::default();
        Ok(crate::codec::to_bytes_canonical(&unsigned))
    }

    /// The endorsement identity: the digest of the wire form with only the
    /// signature cleared, so endorsements from different hosts keep
    /// distinct identities.
    pub fn id(&self) -> Result<Hash32, CoreError> {
        let mut unsigned = self.clone();
        unsigned.sig = vec![];
        crate::codec::sha256_canonical(&unsigned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_note() -> PushNote {
        PushNote {
            repo_name: "repo1".into(),
            namespace: Some("ns1".into()),
            pusher_key_id: "gpkXYZ".into(),
            pusher_pub_key: PublicKey([5u8; 32]),
            timestamp: 1_700_000_000,
            size: 1024,
            references: vec![PushedReference {
                name: "refs/heads/master".into(),
                old_hash: "0".repeat(40),
                new_hash: "a".repeat(40),
                nonce: 3,
                fee: TokenAmount::from("0.2"),
                value: TokenAmount::zero(),
                merge_proposal_id: "12".into(),
                objects: vec!["b".repeat(40), "c".repeat(40)],
                push_sig: vec![1; 64],
            }],
            sig: vec![2; 64],
        }
    }

    #[test]
    fn note_id_covers_signatures() {
        let note = sample_note();
        let id1 = note.id().unwrap();
        let mut resigned = note.clone();
        resigned.sig = vec![9; 64];
        // The note id is a handle over the full serialized form.
        assert_ne!(id1, resigned.id().unwrap());
    }

    #[test]
    fn reference_sign_bytes_covers_details_only() {
        let r = sample_note().references.remove(0);

        // Signatures and server-computed fields are outside the digest.
        let mut resigned = r.clone();
        resigned.push_sig = vec![7; 64];
        resigned.new_hash = "e".repeat(40);
        resigned.objects = vec![];
        assert_eq!(r.sign_bytes().unwrap(), resigned.sign_bytes().unwrap());

        // The attested details are inside it.
        let mut refeed = r.clone();
        refeed.fee = TokenAmount::from("9");
        assert_ne!(r.sign_bytes().unwrap(), refeed.sign_bytes().unwrap());
        let mut renonced = r;
        renonced.nonce += 1;
        assert_ne!(
            renonced.sign_bytes().unwrap(),
            sample_note().references[0].sign_bytes().unwrap()
        );
    }

    #[test]
    fn merge_proposal_id_surface_form() {
        let mut r = sample_note().references.remove(0);
        r.validate_merge_proposal_id().unwrap();
        r.merge_proposal_id = "123456789".into();
        assert!(r.validate_merge_proposal_id().is_err());
        r.merge_proposal_id = "12a".into();
        assert!(r.validate_merge_proposal_id().is_err());
        r.merge_proposal_id = String::new();
        r.validate_merge_proposal_id().unwrap();
    }

    #[test]
    fn endorsement_id_ignores_bls_sig() {
        let note = sample_note();
        let e = Endorsement {
            note_id: note.id().unwrap().to_vec(),
            endorser_pub_key: PublicKey([6u8; 32]),
            references: vec![EndorsedReference {
                old_hash: "0".repeat(40),
            }],
            sig: vec![3; 48],
        };
        let mut resigned = e.clone();
        resigned.sig = vec![4; 48];
        assert_eq!(e.id().unwrap(), resigned.id().unwrap());
    }

    #[test]
    fn endorsement_digest_is_common_across_endorsers() {
        let note = sample_note();
        let make = |seed: u8| Endorsement {
            note_id: note.id().unwrap().to_vec(),
            endorser_pub_key: PublicKey([seed; 32]),
            references: vec![EndorsedReference {
                old_hash: "0".repeat(40),
            }],
            sig: vec![seed; 48],
        };
        let a = make(1);
        let b = make(2);
        // Same signed payload, distinct identities.
        assert_eq!(a.sign_bytes().unwrap(), b.sign_bytes().unwrap());
        assert_ne!(a.id().unwrap(), b.id().unwrap());
    }

    #[test]
    fn total_fees_sums_reference_fees() {
        let mut note = sample_note();
        let mut second = note.references[0].clone();
        second.name = "refs/heads/dev".into();
        second.fee = TokenAmount::from("0.3");
        note.references.push(second);
        assert_eq!(note.total_fees().unwrap(), TokenAmount::from("0.5"));
    }
}
