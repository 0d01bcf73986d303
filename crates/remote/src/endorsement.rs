// Path: crates/remote/src/endorsement.rs

//! Endorsement registry and push-transaction assembly.
//!
//! Endorsements are indexed per note until the quorum configured in
//! [`RemoteConfig`] is reached; the builder then resolves each endorser's
//! ticket, aggregates the BLS signatures over the common endorsement
//! digest, compacts the redundant payload, and injects the resulting push
//! transaction into the mempool.

use crate::push_pool::PushPool;
use crate::ttl::TtlCache;
use gitmesh_api::crypto::SerializableKey;
use gitmesh_api::keepers::TicketKeeper;
use gitmesh_crypto::sign::bls::{aggregate_signatures, BlsPublicKey, BlsSignature};
use gitmesh_mempool::Mempool;
use gitmesh_types::config::RemoteConfig;
use gitmesh_types::error::EndorseError;
use gitmesh_types::push::{EndorsedReference, Endorsement};
use gitmesh_types::tx::{Transaction, TxCommon};
use gitmesh_types::{Hash32, PublicKey, TxHash};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use tracing::info;

/// Entry cap for the endorsement seen-set.
const SEEN_CAPACITY: usize = 50_000;

/// How long an endorsement id is remembered for de-duplication.
const SEEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Indexes endorsements per note and detects quorum.
pub struct EndorsementRegistry {
    by_note: RwLock<HashMap<Hash32, BTreeMap<Hash32, Endorsement>>>,
    seen: Mutex<TtlCache<Hash32, ()>>,
    built: Mutex<HashSet<Hash32>>,
}

impl EndorsementRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            by_note: RwLock::new(HashMap::new()),
            seen: Mutex::new(TtlCache::new(SEEN_TTL, SEEN_CAPACITY)),
            built: Mutex::new(HashSet::new()),
        }
    }

    /// Marks an endorsement id as seen, returning true if it was new.
    pub fn mark_seen(&self, id: Hash32) -> bool {
        let mut seen = self.seen.lock();
        if seen.contains(&id) {
            return false;
        }
        seen.insert(id, ());
        true
    }

    /// Registers an endorsement under its note.
    pub fn register(&self, endorsement: Endorsement) -> Result<Hash32, EndorseError> {
        let id = endorsement
            .id()
            .map_err(|e| EndorseError::Validation(e.to_string()))?;
        let note_id: Hash32 = endorsement
            .note_id
            .clone()
            .try_into()
            .map_err(|_| EndorseError::Validation("malformed note id".into()))?;

        let mut by_note = self.by_note.write();
        let entry = by_note.entry(note_id).or_default();
        if entry.contains_key(&id) {
            return Err(EndorseError::Duplicate);
        }
        entry.insert(id, endorsement);
        gitmesh_telemetry::remote_metrics().inc_endorsements_registered();
        Ok(id)
    }

    /// Number of endorsements registered for a note.
    pub fn count(&self, note_id: &Hash32) -> usize {
        self.by_note
            .read()
            .get(note_id)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// The endorsements registered for a note, in id order.
    pub fn endorsements(&self, note_id: &Hash32) -> Vec<Endorsement> {
        self.by_note
            .read()
            .get(note_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Drops everything bound to a note. Called on eviction.
    pub fn remove_note(&self, note_id: &Hash32) {
        self.by_note.write().remove(note_id);
        self.built.lock().remove(note_id);
    }

    /// Records that a push transaction was already built for the note.
    fn mark_built(&self, note_id: Hash32) {
        self.built.lock().insert(note_id);
    }

    /// Returns true when a push transaction was already assembled for the
    /// note in this process.
    pub fn is_built(&self, note_id: &Hash32) -> bool {
        self.built.lock().contains(note_id)
    }

    /// Evicts expired entries from the seen-set.
    pub fn sweep(&self) {
        self.seen.lock().sweep();
    }
}

impl Default for EndorsementRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The canonical digest every endorser of a note signs: the endorsement
/// wire form with the signature and endorser identity cleared.
pub fn endorsement_digest(
    note_id: &Hash32,
    references: &[EndorsedReference],
) -> Result<Vec<u8>, EndorseError> {
    Endorsement {
        note_id: note_id.to_vec(),
        endorser_pub_key: PublicKey::default(),
        references: references.to_vec(),
        sig: vec![],
    }
    .sign_bytes()
    .map_err(|e| EndorseError::Validation(e.to_string()))
}

/// Assembles and injects the push transaction for a note once its quorum
/// is reached.
///
/// Fatal resolution failures (missing ticket, undecodable BLS key) abort
/// the current attempt; the caller retries on the next endorsement arrival.
pub fn create_push_tx(
    note_id: &Hash32,
    registry: &EndorsementRegistry,
    push_pool: &PushPool,
    tickets: &dyn TicketKeeper,
    cfg: &RemoteConfig,
    mempool: &Mempool,
) -> Result<TxHash, EndorseError> {
    let endorsements = registry.endorsements(note_id);
    if endorsements.len() < cfg.push_endorse_quorum_size {
        return Err(EndorseError::NotEnoughEndorsements {
            have: endorsements.len(),
            need: cfg.push_endorse_quorum_size,
        });
    }

    let note = push_pool
        .get(note_id)
        .ok_or_else(|| EndorseError::NoteNotFound(hex::encode(note_id)))?;

    let top_hosts = tickets
        .top_hosts(cfg.num_top_hosts_limit)
        .map_err(|e| EndorseError::Validation(e.to_string()))?;

    let mut signatures = Vec::with_capacity(endorsements.len());
    for endorsement in &endorsements {
        let ticket = top_hosts
            .iter()
            .find(|t| t.proposer_pub_key == endorsement.endorser_pub_key)
            .ok_or_else(|| {
                EndorseError::TicketNotFound(hex::encode(endorsement.endorser_pub_key.0))
            })?;
        // The decoded key pins the ticket's registered key material; the
        // verifier recomputes the aggregate from the same tickets.
        BlsPublicKey::from_bytes(&ticket.bls_pub_key)
            .map_err(|e| EndorseError::BlsKeyDecode(e.to_string()))?;
        let sig = BlsSignature::from_bytes(&endorsement.sig)
            .map_err(|e| EndorseError::Validation(format!("bls signature: {}", e)))?;
        signatures.push(sig);
    }

    let agg_sig = aggregate_signatures(&signatures)
        .map_err(|e| EndorseError::AggregationFailed(e.to_string()))?;

    // Strip the redundant endorsement payload: the BLS signatures are now
    // carried in aggregate and every endorsement mirrors the same
    // references, reconstructable from index 0.
    let mut compacted = endorsements;
    for (i, endorsement) in compacted.iter_mut().enumerate() {
        endorsement.sig = vec![];
        endorsement.note_id = vec![];
        if i > 0 {
            endorsement.references = vec![];
        }
    }

    let first_ref = note
        .references
        .first()
        .ok_or_else(|| EndorseError::Validation("note has no references".into()))?;
    let tx = Transaction::Push {
        common: TxCommon {
            nonce: first_ref.nonce,
            fee: note
                .total_fees()
                .map_err(|e| EndorseError::Validation(e.to_string()))?,
            value: gitmesh_types::tx::TokenAmount::zero(),
            // The note-level signature stands in as the transaction
            // signature; the per-reference signatures remain the
            // authoritative attestation.
            sig: note.sig.clone(),
            timestamp: note.timestamp,
            sender_pub_key: note.pusher_pub_key,
        },
        note: (*note).clone(),
        endorsements: compacted,
        agg_sig: agg_sig.to_bytes(),
    };

    let hash = tx
        .hash()
        .map_err(|e| EndorseError::Validation(e.to_string()))?;
    mempool
        .add(tx)
        .map_err(|e| EndorseError::Validation(format!("mempool rejected push tx: {}", e)))?;

    registry.mark_built(*note_id);
    gitmesh_telemetry::remote_metrics().inc_push_txs_built();
    info!(
        target: "endorse",
        note = %hex::encode(note_id),
        tx = %hex::encode(hash),
        "push transaction assembled"
    );
    Ok(hash)
}
