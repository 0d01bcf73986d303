// Path: crates/test_utils/src/note_factory.rs

//! Signed push-note and endorsement factories.
//!
//! Everything here carries real signatures: per-reference Ed25519 detached
//! signatures from a generated pusher key and BLS endorsement signatures
//! from generated host keys.

use gitmesh_api::crypto::{SerializableKey, SigningKeyPair};
use gitmesh_api::keepers::Ticket;
use gitmesh_crypto::sign::bls::BlsKeyPair;
use gitmesh_crypto::sign::eddsa::Ed25519KeyPair;
use gitmesh_types::push::{EndorsedReference, Endorsement, PushNote, PushedReference};
use gitmesh_types::tx::TokenAmount;
use gitmesh_types::PublicKey;

/// A pusher identity with its derived push-key id.
pub struct Pusher {
    /// The signing key pair.
    pub keypair: Ed25519KeyPair,
    /// The raw public key carried in notes.
    pub pub_key: PublicKey,
    /// The derived push-key identifier.
    pub key_id: String,
}

/// Generates a fresh pusher identity.
pub fn pusher() -> Pusher {
    let keypair = Ed25519KeyPair::generate().unwrap_or_else(|e| panic!("keygen: {}", e));
    let pub_key = keypair.public_key();
    let key_id = pub_key
        .to_push_key_id()
        .unwrap_or_else(|e| panic!("key id: {}", e));
    Pusher {
        keypair,
        pub_key,
        key_id,
    }
}

/// One reference update to include in a factory note.
pub struct RefSpec {
    /// Reference name.
    pub name: String,
    /// Old hash (40 hex chars).
    pub old_hash: String,
    /// New hash (40 hex chars).
    pub new_hash: String,
    /// Pusher-key nonce.
    pub nonce: u64,
    /// Reference fee.
    pub fee: String,
    /// Objects required to replay the update.
    pub objects: Vec<String>,
}

/// Builds a push note whose per-reference and note-level signatures verify
/// against the pusher's key.
pub fn signed_note(pusher: &Pusher, repo_name: &str, size: u64, refs: Vec<RefSpec>) -> PushNote {
    let references = refs
        .into_iter()
        .map(|spec| {
            let mut r = PushedReference {
                name: spec.name,
                old_hash: spec.old_hash,
                new_hash: spec.new_hash,
                nonce: spec.nonce,
                fee: TokenAmount::from(spec.fee.as_str()),
                value: TokenAmount::zero(),
                merge_proposal_id: String::new(),
                objects: spec.objects,
                push_sig: vec![],
            };
            let payload = r.sign_bytes().unwrap_or_else(|e| panic!("encode: {}", e));
            r.push_sig = pusher
                .keypair
                .sign(&payload)
                .unwrap_or_else(|e| panic!("sign: {}", e));
            r
        })
        .collect();

    let mut note = PushNote {
        repo_name: repo_name.to_string(),
        namespace: None,
        pusher_key_id: pusher.key_id.clone(),
        pusher_pub_key: pusher.pub_key,
        timestamp: crate::tx_factory::FIXED_TIMESTAMP,
        size,
        references,
        sig: vec![],
    };
    let payload = note.sign_bytes().unwrap_or_else(|e| panic!("encode: {}", e));
    note.sig = pusher
        .keypair
        .sign(&payload)
        .unwrap_or_else(|e| panic!("sign: {}", e));
    note
}

/// A top-host identity: an Ed25519 identity plus the BLS key its ticket
/// registers.
pub struct Endorser {
    /// The host's Ed25519 identity.
    pub identity: PublicKey,
    /// The host's BLS signing key.
    pub bls: BlsKeyPair,
}

/// Generates a host identity with seed `seed`.
pub fn endorser(seed: u8) -> Endorser {
    Endorser {
        identity: PublicKey([seed; 32]),
        bls: BlsKeyPair::generate().unwrap_or_else(|e| panic!("keygen: {}", e)),
    }
}

/// The committee ticket backing an endorser.
pub fn ticket_for(endorser: &Endorser, height: u64) -> Ticket {
    Ticket {
        hash: [endorser.identity.0[0]; 32],
        proposer_pub_key: endorser.identity,
        bls_pub_key: endorser.bls.public_key().to_bytes(),
        height,
    }
}

/// Builds a BLS-signed endorsement of `note` mirroring its references.
pub fn signed_endorsement(endorser: &Endorser, note: &PushNote) -> Endorsement {
    let mut endorsement = Endorsement {
        note_id: note
            .id()
            .unwrap_or_else(|e| panic!("note id: {}", e))
            .to_vec(),
        endorser_pub_key: endorser.identity,
        references: note
            .references
            .iter()
            .map(|r| EndorsedReference {
                old_hash: r.old_hash.clone(),
            })
            .collect(),
        sig: vec![],
    };
    let payload = endorsement
        .sign_bytes()
        .unwrap_or_else(|e| panic!("encode: {}", e));
    endorsement.sig = endorser
        .bls
        .sign(&payload)
        .unwrap_or_else(|e| panic!("sign: {}", e))
        .to_bytes();
    endorsement
}
