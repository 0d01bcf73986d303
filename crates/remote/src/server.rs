// Path: crates/remote/src/server.rs

//! The remote server object and its consensus-event glue.
//!
//! Owns every piece of bounded mutable state the push path needs: the push
//! pool, the endorsement registry, the note seen-set, the peer memory, and
//! the per-repo write locks. Reacts to mempool lifecycle events to evict
//! notes whose push transaction left the pool.

use crate::broadcast::Broadcaster;
use crate::endorsement::{self, EndorsementRegistry};
use crate::push_pool::PushPool;
use crate::ttl::TtlCache;
use dashmap::DashMap;
use gitmesh_api::auth::PushAuthenticator;
use gitmesh_api::fetch::ObjectFetcher;
use gitmesh_api::keepers::Keepers;
use gitmesh_api::sync::RefSyncScheduler;
use gitmesh_crypto::sign::bls::BlsKeyPair;
use gitmesh_mempool::Mempool;
use gitmesh_types::config::RemoteConfig;
use gitmesh_types::error::EndorseError;
use gitmesh_types::events::NodeEvent;
use gitmesh_types::{Hash32, PublicKey};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Entry cap for the note seen-set.
const NOTE_SEEN_CAPACITY: usize = 50_000;

/// Interval of the background sweeper over all TTL maps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// This node's host identity, present when it may endorse pushes.
pub struct HostIdentity {
    /// The Ed25519 identity the host's ticket is registered under.
    pub identity: PublicKey,
    /// The BLS key pair matching the ticket's registered public key.
    pub bls: BlsKeyPair,
}

/// The remote server: push pipeline state and collaborator handles.
pub struct RemoteServer {
    pub(crate) cfg: RemoteConfig,
    pub(crate) keepers: Arc<dyn Keepers>,
    pub(crate) authenticator: Arc<dyn PushAuthenticator>,
    pub(crate) fetcher: Arc<dyn ObjectFetcher>,
    pub(crate) refsync: Arc<dyn RefSyncScheduler>,
    pub(crate) mempool: Arc<Mempool>,
    pub(crate) push_pool: Arc<PushPool>,
    pub(crate) registry: EndorsementRegistry,
    pub(crate) broadcaster: Broadcaster,
    pub(crate) notes_seen: Mutex<TtlCache<Hash32, ()>>,
    repo_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    pub(crate) host_identity: Option<HostIdentity>,
    pub(crate) events: broadcast::Sender<NodeEvent>,
}

impl RemoteServer {
    /// Assembles the server. `events` is the node-wide bus shared with the
    /// mempool.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: RemoteConfig,
        keepers: Arc<dyn Keepers>,
        authenticator: Arc<dyn PushAuthenticator>,
        fetcher: Arc<dyn ObjectFetcher>,
        refsync: Arc<dyn RefSyncScheduler>,
        mempool: Arc<Mempool>,
        broadcaster: Broadcaster,
        host_identity: Option<HostIdentity>,
        events: broadcast::Sender<NodeEvent>,
    ) -> Arc<Self> {
        let push_pool = Arc::new(PushPool::new(cfg.push_pool_capacity));
        let notes_seen = Mutex::new(TtlCache::new(
            Duration::from_secs(cfg.note_seen_ttl_secs),
            NOTE_SEEN_CAPACITY,
        ));
        Arc::new(Self {
            cfg,
            keepers,
            authenticator,
            fetcher,
            refsync,
            mempool,
            push_pool,
            registry: EndorsementRegistry::new(),
            broadcaster,
            notes_seen,
            repo_locks: DashMap::new(),
            host_identity,
            events,
        })
    }

    /// The push pool.
    pub fn push_pool(&self) -> &PushPool {
        &self.push_pool
    }

    /// The endorsement registry.
    pub fn registry(&self) -> &EndorsementRegistry {
        &self.registry
    }

    /// The configuration snapshot installed at startup.
    pub fn config(&self) -> &RemoteConfig {
        &self.cfg
    }

    /// The per-repo write lock. Writers to a repository's on-disk state
    /// serialize on this; reads stay lock-free.
    pub(crate) fn repo_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.repo_locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    pub(crate) fn emit(&self, event: NodeEvent) {
        let _ = self.events.send(event);
    }

    /// Attempts push-transaction assembly, treating an unreached quorum as
    /// routine and everything else as a skipped attempt to retry on the
    /// next endorsement arrival.
    pub(crate) fn try_create_push_tx(&self, note_id: &Hash32) {
        if self.registry.is_built(note_id) {
            return;
        }
        match endorsement::create_push_tx(
            note_id,
            &self.registry,
            &self.push_pool,
            self.keepers.tickets(),
            &self.cfg,
            &self.mempool,
        ) {
            Ok(tx_hash) => {
                debug!(target: "endorse", tx = %hex::encode(tx_hash), "push transaction submitted");
            }
            Err(EndorseError::NotEnoughEndorsements { have, need }) => {
                debug!(target: "endorse", have, need, "quorum not yet reached");
            }
            Err(e) => {
                warn!(target: "endorse", note = %hex::encode(note_id), "push tx attempt skipped: {}", e);
            }
        }
    }

    /// Spawns the consensus-event glue: push notes whose transaction was
    /// removed or rejected by consensus are evicted from the push pool.
    pub fn spawn_event_glue(self: &Arc<Self>, mut rx: broadcast::Receiver<NodeEvent>) -> JoinHandle<()> {
        let server = self.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => server.handle_node_event(event),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(target: "remote", missed, "event bus lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Spawns the periodic sweeper over every TTL map.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let server = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                server.notes_seen.lock().sweep();
                server.registry.sweep();
                server.broadcaster.memory().sweep();
            }
        })
    }

    fn handle_node_event(&self, event: NodeEvent) {
        match event {
            NodeEvent::TxRemoved {
                note_id: Some(id), ..
            }
            | NodeEvent::TxRejected {
                note_id: Some(id), ..
            } => self.evict_note(&id),
            _ => {}
        }
    }

    /// Evicts a note and everything bound to it.
    pub fn evict_note(&self, id: &Hash32) {
        self.registry.remove_note(id);
        if self.push_pool.remove(id).is_some() {
            info!(target: "remote", note = %hex::encode(id), "push note evicted");
            self.emit(NodeEvent::PushNoteEvicted { id: *id });
        }
    }
}
