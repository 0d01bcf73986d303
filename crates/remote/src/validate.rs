// Path: crates/remote/src/validate.rs

//! Push-note and endorsement validation.
//!
//! Layered like transaction validation: pure signature and structural
//! checks first, then consistency against the local replica and chain
//! state. The per-reference detached signatures are the authoritative
//! attestation; nothing here ever re-signs on the pusher's behalf.

use crate::repo;
use git2::Repository;
use gitmesh_api::keepers::{PushKeyState, Ticket};
use gitmesh_api::crypto::{SerializableKey, VerifyingKey};
use gitmesh_crypto::sign::bls::{BlsPublicKey, BlsSignature};
use gitmesh_crypto::sign::eddsa;
use gitmesh_types::error::{EndorseError, PushError};
use gitmesh_types::push::{Endorsement, PushNote};
use gitmesh_types::tx::TokenAmount;
use rust_decimal::Decimal;

/// The recognized reference categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefCategory {
    /// `refs/heads/…`
    Branch,
    /// `refs/tags/…`
    Tag,
    /// `refs/notes/…`
    Note,
    /// `refs/issues/…`
    Issue,
    /// `refs/merge-requests/…`
    MergeRequest,
}

/// Parses a reference name into its category.
pub fn ref_category(name: &str) -> Option<RefCategory> {
    let (prefix, category) = [
        ("refs/heads/", RefCategory::Branch),
        ("refs/tags/", RefCategory::Tag),
        ("refs/notes/", RefCategory::Note),
        ("refs/issues/", RefCategory::Issue),
        ("refs/merge-requests/", RefCategory::MergeRequest),
    ]
    .into_iter()
    .find(|(prefix, _)| name.starts_with(prefix))?;
    if name.len() == prefix.len() {
        return None;
    }
    Some(category)
}

/// Signature and surface-form checks that need no repository or chain
/// state. This is the whole of validation for non-serving validators.
pub fn check_note_signatures(note: &PushNote) -> Result<(), PushError> {
    if note.references.is_empty() {
        return Err(PushError::Validation("push note has no references".into()));
    }

    let payload = note.sign_bytes().map_err(|e| PushError::BadEncoding(e.to_string()))?;
    eddsa::verify(&note.pusher_pub_key, &payload, &note.sig)
        .map_err(|e| PushError::Validation(format!("note signature: {}", e)))?;

    for reference in &note.references {
        if ref_category(&reference.name).is_none() {
            return Err(PushError::Validation(format!(
                "unrecognized reference name {}",
                reference.name
            )));
        }
        reference
            .validate_merge_proposal_id()
            .map_err(|e| PushError::Validation(e.to_string()))?;

        let payload = reference
            .sign_bytes()
            .map_err(|e| PushError::BadEncoding(e.to_string()))?;
        eddsa::verify(&note.pusher_pub_key, &payload, &reference.push_sig).map_err(|e| {
            PushError::Validation(format!("signature of {}: {}", reference.name, e))
        })?;
    }
    Ok(())
}

/// Full push-note validation against the local replica and the pusher's
/// registered key.
///
/// A reference whose declared old hash disagrees with the locally observed
/// hash fails with [`PushError::RefMismatch`] carrying the reference name,
/// which the caller uses to schedule a resync.
pub fn check_push_note(
    note: &PushNote,
    local: &Repository,
    push_key: &PushKeyState,
    fee_per_byte: &TokenAmount,
) -> Result<(), PushError> {
    if push_key.revoked {
        return Err(PushError::PushKeyNotFound(note.pusher_key_id.clone()));
    }
    if push_key.pub_key != note.pusher_pub_key {
        return Err(PushError::Validation(
            "pusher public key does not match the registered push key".into(),
        ));
    }
    let derived = note
        .pusher_pub_key
        .to_push_key_id()
        .map_err(|e| PushError::Validation(e.to_string()))?;
    if derived != note.pusher_key_id {
        return Err(PushError::Validation(
            "pusher key id does not derive from the pusher public key".into(),
        ));
    }
    if !push_key.scopes.is_empty() && !scope_matches(&push_key.scopes, note) {
        return Err(PushError::Authorization(format!(
            "push key {} has no scope covering {}",
            note.pusher_key_id, note.repo_name
        )));
    }

    check_note_signatures(note)?;

    for reference in &note.references {
        let local_hash = repo::ref_hash(local, &reference.name)?;
        if local_hash != reference.old_hash {
            return Err(PushError::RefMismatch {
                reference: reference.name.clone(),
            });
        }
        if reference.nonce <= push_key.nonce {
            return Err(PushError::Validation(format!(
                "reference {} nonce {} is not above the push key nonce {}",
                reference.name, reference.nonce, push_key.nonce
            )));
        }
    }

    check_fee_coverage(note, fee_per_byte)
}

fn scope_matches(scopes: &[String], note: &PushNote) -> bool {
    scopes.iter().any(|scope| {
        if scope == &note.repo_name {
            return true;
        }
        match &note.namespace {
            Some(ns) => {
                scope == &format!("{}/", ns) || scope == &format!("{}/{}", ns, note.repo_name)
            }
            None => false,
        }
    })
}

/// The per-reference fees must cover the per-byte tariff for the declared
/// size.
pub fn check_fee_coverage(note: &PushNote, fee_per_byte: &TokenAmount) -> Result<(), PushError> {
    let total = note
        .total_fees()
        .map_err(|e| PushError::Validation(e.to_string()))?
        .decimal()
        .map_err(|e| PushError::Validation(e.to_string()))?;
    let tariff = fee_per_byte
        .decimal()
        .map_err(|e| PushError::Validation(e.to_string()))?;
    let required = tariff * Decimal::from(note.size);
    if total < required {
        return Err(PushError::Validation(format!(
            "fee {} does not cover the tariff {} for {} bytes",
            total, required, note.size
        )));
    }
    Ok(())
}

/// Validates an endorsement against its note and the current top-host
/// committee, returning the endorser's resolved ticket.
pub fn check_endorsement(
    endorsement: &Endorsement,
    note: &PushNote,
    top_hosts: &[Ticket],
) -> Result<Ticket, EndorseError> {
    let ticket = top_hosts
        .iter()
        .find(|t| t.proposer_pub_key == endorsement.endorser_pub_key)
        .cloned()
        .ok_or_else(|| {
            EndorseError::EndorserNotTopHost(hex::encode(endorsement.endorser_pub_key.0))
        })?;

    let note_id = note
        .id()
        .map_err(|e| EndorseError::Validation(e.to_string()))?;
    if endorsement.note_id != note_id.to_vec() {
        return Err(EndorseError::Validation(
            "endorsement does not name the note".into(),
        ));
    }

    // References must mirror the note's references byte-for-byte, in order.
    if endorsement.references.len() != note.references.len() {
        return Err(EndorseError::Validation(format!(
            "endorsement carries {} references, note has {}",
            endorsement.references.len(),
            note.references.len()
        )));
    }
    for (observed, pushed) in endorsement.references.iter().zip(&note.references) {
        if observed.old_hash != pushed.old_hash {
            return Err(EndorseError::Validation(format!(
                "endorsed hash of {} disagrees with the note",
                pushed.name
            )));
        }
    }

    let key = BlsPublicKey::from_bytes(&ticket.bls_pub_key)
        .map_err(|e| EndorseError::BlsKeyDecode(e.to_string()))?;
    let sig = BlsSignature::from_bytes(&endorsement.sig)
        .map_err(|e| EndorseError::Validation(format!("bls signature: {}", e)))?;
    let payload = endorsement
        .sign_bytes()
        .map_err(|e| EndorseError::Validation(e.to_string()))?;
    key.verify(&payload, &sig)
        .map_err(|_| EndorseError::Validation("bls signature does not verify".into()))?;

    Ok(ticket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitmesh_test_utils::note_factory::{
        endorser, pusher, signed_endorsement, signed_note, ticket_for, RefSpec,
    };
    use gitmesh_test_utils::repo::{commit_file, RepoRoot};
    use gitmesh_types::Address;

    fn push_key_for(p: &gitmesh_test_utils::note_factory::Pusher) -> PushKeyState {
        PushKeyState {
            pub_key: p.pub_key,
            owner: Address("gmOwner".into()),
            scopes: vec![],
            fee_cap: "0".into(),
            nonce: 0,
            revoked: false,
        }
    }

    #[test]
    fn ref_categories_parse() {
        assert_eq!(ref_category("refs/heads/master"), Some(RefCategory::Branch));
        assert_eq!(ref_category("refs/tags/v1"), Some(RefCategory::Tag));
        assert_eq!(ref_category("refs/notes/review"), Some(RefCategory::Note));
        assert_eq!(ref_category("refs/issues/7"), Some(RefCategory::Issue));
        assert_eq!(
            ref_category("refs/merge-requests/3"),
            Some(RefCategory::MergeRequest)
        );
        assert_eq!(ref_category("refs/heads/"), None);
        assert_eq!(ref_category("refs/remotes/origin/master"), None);
    }

    #[test]
    fn signature_checks_catch_tampering() {
        let p = pusher();
        let mut note = signed_note(
            &p,
            "repo1",
            8,
            vec![RefSpec {
                name: "refs/heads/master".into(),
                old_hash: repo::ZERO_HASH.into(),
                new_hash: "a".repeat(40),
                nonce: 1,
                fee: "1".into(),
                objects: vec![],
            }],
        );
        check_note_signatures(&note).unwrap();

        note.references[0].fee = "9".into();
        assert!(check_note_signatures(&note).is_err());
    }

    #[test]
    fn full_check_passes_against_matching_replica() {
        let root = RepoRoot::new();
        let repo = root.init_bare("repo1");
        let c1 = commit_file(&repo, "refs/heads/master", "a.txt", b"one", "c1");

        let p = pusher();
        let note = signed_note(
            &p,
            "repo1",
            4,
            vec![RefSpec {
                name: "refs/heads/master".into(),
                old_hash: c1.to_string(),
                new_hash: "a".repeat(40),
                nonce: 1,
                fee: "1".into(),
                objects: vec![],
            }],
        );
        check_push_note(&note, &repo, &push_key_for(&p), &TokenAmount::from("0.001")).unwrap();
    }

    #[test]
    fn old_hash_mismatch_carries_the_reference() {
        let root = RepoRoot::new();
        let repo = root.init_bare("repo1");
        commit_file(&repo, "refs/heads/master", "a.txt", b"one", "c1");

        let p = pusher();
        let note = signed_note(
            &p,
            "repo1",
            4,
            vec![RefSpec {
                name: "refs/heads/master".into(),
                old_hash: "c".repeat(40),
                new_hash: "a".repeat(40),
                nonce: 1,
                fee: "1".into(),
                objects: vec![],
            }],
        );
        let err =
            check_push_note(&note, &repo, &push_key_for(&p), &TokenAmount::zero()).unwrap_err();
        match err {
            PushError::RefMismatch { reference } => {
                assert_eq!(reference, "refs/heads/master");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn stale_push_key_nonce_is_rejected() {
        let root = RepoRoot::new();
        let repo = root.init_bare("repo1");

        let p = pusher();
        let note = signed_note(
            &p,
            "repo1",
            4,
            vec![RefSpec {
                name: "refs/heads/master".into(),
                old_hash: repo::ZERO_HASH.into(),
                new_hash: "a".repeat(40),
                nonce: 2,
                fee: "1".into(),
                objects: vec![],
            }],
        );
        let mut key = push_key_for(&p);
        key.nonce = 2;
        let err = check_push_note(&note, &repo, &key, &TokenAmount::zero()).unwrap_err();
        assert!(matches!(err, PushError::Validation(_)));
    }

    #[test]
    fn fee_must_cover_the_tariff() {
        let p = pusher();
        let note = signed_note(
            &p,
            "repo1",
            1_000_000,
            vec![RefSpec {
                name: "refs/heads/master".into(),
                old_hash: repo::ZERO_HASH.into(),
                new_hash: "a".repeat(40),
                nonce: 1,
                fee: "0.001".into(),
                objects: vec![],
            }],
        );
        assert!(check_fee_coverage(&note, &TokenAmount::from("0.00001")).is_err());
        assert!(check_fee_coverage(&note, &TokenAmount::zero()).is_ok());
    }

    #[test]
    fn unscoped_keys_push_anywhere_scoped_keys_do_not() {
        let p = pusher();
        let note = signed_note(
            &p,
            "repo2",
            1,
            vec![RefSpec {
                name: "refs/heads/master".into(),
                old_hash: repo::ZERO_HASH.into(),
                new_hash: "a".repeat(40),
                nonce: 1,
                fee: "1".into(),
                objects: vec![],
            }],
        );
        assert!(scope_matches(&["repo2".to_string()], &note));
        assert!(!scope_matches(&["repo1".to_string()], &note));
    }

    #[test]
    fn endorsement_checks_committee_and_mirroring() {
        let p = pusher();
        let note = signed_note(
            &p,
            "repo1",
            4,
            vec![RefSpec {
                name: "refs/heads/master".into(),
                old_hash: "0".repeat(40),
                new_hash: "a".repeat(40),
                nonce: 1,
                fee: "1".into(),
                objects: vec![],
            }],
        );

        let host = endorser(10);
        let outsider = endorser(11);
        let committee = vec![ticket_for(&host, 1)];

        let good = signed_endorsement(&host, &note);
        check_endorsement(&good, &note, &committee).unwrap();

        let from_outsider = signed_endorsement(&outsider, &note);
        assert!(matches!(
            check_endorsement(&from_outsider, &note, &committee),
            Err(EndorseError::EndorserNotTopHost(_))
        ));

        let mut tampered = good.clone();
        tampered.references[0].old_hash = "f".repeat(40);
        assert!(check_endorsement(&tampered, &note, &committee).is_err());

        // A signature from the wrong BLS key fails verification.
        let mut wrong_sig = good;
        wrong_sig.sig = signed_endorsement(&outsider, &note).sig;
        assert!(matches!(
            check_endorsement(&wrong_sig, &note, &committee),
            Err(EndorseError::Validation(_))
        ));
    }
}
