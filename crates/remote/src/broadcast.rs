// Path: crates/remote/src/broadcast.rs

//! Outbound gossip with peer memory.
//!
//! Two expiring maps remember which peers have already seen which notes and
//! endorsements, as senders or receivers, so broadcast never echoes an
//! item back to where it came from. Each channel delivers independently.

use crate::ttl::TtlCache;
use gitmesh_networking::message::{EndorsementMessage, PushNoteMessage};
use gitmesh_networking::{EndorsementGossip, PeerSet, PushGossip};
use gitmesh_types::error::PushError;
use gitmesh_types::push::{Endorsement, PushNote};
use gitmesh_types::Hash32;
use libp2p::PeerId;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Entry cap for each peer-memory map.
const PEER_MEMORY_CAPACITY: usize = 100_000;

/// Expiring memory of which peer has seen which item.
pub struct PeerMemory {
    notes: Mutex<TtlCache<(PeerId, Hash32), ()>>,
    endorsements: Mutex<TtlCache<(PeerId, Hash32), ()>>,
}

impl PeerMemory {
    /// Creates peer memory with the configured per-map TTLs.
    pub fn new(note_ttl: Duration, endorsement_ttl: Duration) -> Self {
        Self {
            notes: Mutex::new(TtlCache::new(note_ttl, PEER_MEMORY_CAPACITY)),
            endorsements: Mutex::new(TtlCache::new(endorsement_ttl, PEER_MEMORY_CAPACITY)),
        }
    }

    /// Records that a peer has seen a note.
    pub fn record_note(&self, peer: PeerId, id: Hash32) {
        self.notes.lock().insert((peer, id), ());
    }

    /// Returns true if the peer is known to have seen the note.
    pub fn note_known(&self, peer: PeerId, id: Hash32) -> bool {
        self.notes.lock().contains(&(peer, id))
    }

    /// Records that a peer has seen an endorsement.
    pub fn record_endorsement(&self, peer: PeerId, id: Hash32) {
        self.endorsements.lock().insert((peer, id), ());
    }

    /// Returns true if the peer is known to have seen the endorsement.
    pub fn endorsement_known(&self, peer: PeerId, id: Hash32) -> bool {
        self.endorsements.lock().contains(&(peer, id))
    }

    /// Evicts expired entries from both maps.
    pub fn sweep(&self) {
        self.notes.lock().sweep();
        self.endorsements.lock().sweep();
    }
}

/// Fans notes and endorsements out to peers not known to have them.
pub struct Broadcaster {
    peers: Arc<dyn PeerSet>,
    push_gossip: Arc<dyn PushGossip>,
    endorsement_gossip: Arc<dyn EndorsementGossip>,
    memory: PeerMemory,
}

impl Broadcaster {
    /// Creates a broadcaster over the given swarm handles.
    pub fn new(
        peers: Arc<dyn PeerSet>,
        push_gossip: Arc<dyn PushGossip>,
        endorsement_gossip: Arc<dyn EndorsementGossip>,
        memory: PeerMemory,
    ) -> Self {
        Self {
            peers,
            push_gossip,
            endorsement_gossip,
            memory,
        }
    }

    /// The peer memory, shared with the inbound paths that record senders.
    pub fn memory(&self) -> &PeerMemory {
        &self.memory
    }

    /// Sends the note to every peer not recorded as having seen it.
    /// Returns the number of peers reached.
    pub async fn broadcast_push_note(&self, note: &PushNote) -> Result<usize, PushError> {
        let id = note.id()?;
        let bytes = PushNoteMessage::from_note(note)?;
        let mut sent = 0usize;

        for peer in self.peers.known_peers() {
            if self.memory.note_known(peer, id) {
                continue;
            }
            match self.push_gossip.send_note(peer, bytes.0.clone()).await {
                Ok(()) => {
                    self.memory.record_note(peer, id);
                    sent += 1;
                }
                Err(e) => {
                    warn!(target: "gossip", peer = %peer, "note delivery failed: {}", e);
                }
            }
        }

        debug!(target: "gossip", note = %hex::encode(id), peers = sent, "broadcast push note");
        Ok(sent)
    }

    /// Sends the endorsement to every peer not recorded as having seen it.
    /// Returns the number of peers reached.
    pub async fn broadcast_endorsement(&self, endorsement: &Endorsement) -> Result<usize, PushError> {
        let id = endorsement.id()?;
        let bytes = EndorsementMessage::from_endorsement(endorsement)?;
        let mut sent = 0usize;

        for peer in self.peers.known_peers() {
            if self.memory.endorsement_known(peer, id) {
                continue;
            }
            match self
                .endorsement_gossip
                .send_endorsement(peer, bytes.0.clone())
                .await
            {
                Ok(()) => {
                    self.memory.record_endorsement(peer, id);
                    sent += 1;
                }
                Err(e) => {
                    warn!(target: "gossip", peer = %peer, "endorsement delivery failed: {}", e);
                }
            }
        }

        debug!(target: "gossip", endorsement = %hex::encode(id), peers = sent, "broadcast endorsement");
        Ok(sent)
    }
}
