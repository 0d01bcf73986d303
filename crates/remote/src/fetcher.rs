// Path: crates/remote/src/fetcher.rs

//! The concrete object-fetcher driver.
//!
//! Pulls packfiles from the abstract [`ObjectSource`] until every object a
//! note references is locally present. Duplicate requests for the same note
//! coalesce onto one in-flight entry; the completion callback fires exactly
//! once per caller, on a worker task, never under any pool lock.

use crate::repo;
use gitmesh_api::fetch::{DhtAnnouncer, FetchDone, ObjectFetcher, ObjectSource, PackHandler};
use gitmesh_types::error::PushError;
use gitmesh_types::push::PushNote;
use gitmesh_types::Hash32;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Maximum fetch attempts before the failure is surfaced as `FetchFailed`.
const MAX_ATTEMPTS: usize = 5;

struct InFlight {
    waiters: Vec<FetchDone>,
    cancelled: Arc<AtomicBool>,
}

struct Inner {
    source: Arc<dyn ObjectSource>,
    announcer: Arc<dyn DhtAnnouncer>,
    repo_root: PathBuf,
    handler: RwLock<Option<PackHandler>>,
    in_flight: Mutex<HashMap<Hash32, InFlight>>,
    limit: Semaphore,
}

/// A semaphore-bounded fetch worker pool over an [`ObjectSource`].
#[derive(Clone)]
pub struct Fetcher {
    inner: Arc<Inner>,
}

impl Fetcher {
    /// Creates a fetcher running at most `concurrency` transfers at once.
    pub fn new(
        source: Arc<dyn ObjectSource>,
        announcer: Arc<dyn DhtAnnouncer>,
        repo_root: PathBuf,
        concurrency: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                announcer,
                repo_root,
                handler: RwLock::new(None),
                in_flight: Mutex::new(HashMap::new()),
                limit: Semaphore::new(concurrency.max(1)),
            }),
        }
    }
}

fn all_objects(note: &PushNote) -> Vec<String> {
    let mut objects: Vec<String> = note
        .references
        .iter()
        .flat_map(|r| r.objects.iter().cloned())
        .collect();
    objects.sort();
    objects.dedup();
    objects
}

impl Inner {
    async fn run(&self, note: &PushNote, cancelled: &AtomicBool) -> Result<(), PushError> {
        let _permit = self
            .limit
            .acquire()
            .await
            .map_err(|_| PushError::Cancelled)?;

        let objects = all_objects(note);
        let local = repo::open_bare(&self.repo_root, &note.repo_name)?;
        let mut missing = repo::missing_objects(&local, &objects);
        let mut attempts = 0usize;

        while !missing.is_empty() {
            if cancelled.load(Ordering::SeqCst) {
                return Err(PushError::Cancelled);
            }
            attempts += 1;
            if attempts > MAX_ATTEMPTS {
                return Err(PushError::Fetch(format!(
                    "{} objects still missing after {} attempts",
                    missing.len(),
                    MAX_ATTEMPTS
                )));
            }

            match self.source.fetch_pack(&note.repo_name, &missing).await {
                Ok(pack) => {
                    if cancelled.load(Ordering::SeqCst) {
                        // Discard the in-flight pack.
                        return Err(PushError::Cancelled);
                    }
                    let handler = self.handler.read().clone();
                    match handler {
                        Some(handler) => {
                            let mut reader = std::io::Cursor::new(pack);
                            handler(&mut reader)?;
                        }
                        None => repo::index_pack(&local, &pack)?,
                    }
                    missing = repo::missing_objects(&local, &missing);
                }
                Err(e) => {
                    warn!(target: "fetch", attempt = attempts, "pack fetch failed: {}", e);
                }
            }
        }

        // Make fetched commits and tags discoverable by other peers.
        for hash in &objects {
            match repo::object_kind(&local, hash) {
                Some(git2::ObjectType::Commit) | Some(git2::ObjectType::Tag) => {
                    self.announcer.announce_object(&note.repo_name, hash).await;
                }
                _ => {}
            }
        }

        debug!(target: "fetch", note = %note.id_hex(), objects = objects.len(), "fetch complete");
        Ok(())
    }
}

impl ObjectFetcher for Fetcher {
    fn fetch_async(&self, note: Arc<PushNote>, done: FetchDone) {
        let id = match note.id() {
            Ok(id) => id,
            Err(e) => {
                done(Err(PushError::BadEncoding(e.to_string())));
                return;
            }
        };

        let cancelled = {
            let mut in_flight = self.inner.in_flight.lock();
            if let Some(entry) = in_flight.get_mut(&id) {
                // Coalesce onto the shared in-flight request.
                entry.waiters.push(done);
                return;
            }
            let cancelled = Arc::new(AtomicBool::new(false));
            in_flight.insert(
                id,
                InFlight {
                    waiters: vec![done],
                    cancelled: cancelled.clone(),
                },
            );
            gitmesh_telemetry::remote_metrics().set_fetches_in_flight(in_flight.len() as f64);
            cancelled
        };

        let inner = self.inner.clone();
        tokio::spawn(async move {
            let result = inner.run(&note, &cancelled).await;
            let result = if cancelled.load(Ordering::SeqCst) {
                Err(PushError::Cancelled)
            } else {
                result
            };

            let entry = {
                let mut in_flight = inner.in_flight.lock();
                let entry = in_flight.remove(&id);
                gitmesh_telemetry::remote_metrics()
                    .set_fetches_in_flight(in_flight.len() as f64);
                entry
            };
            if let Some(entry) = entry {
                for waiter in entry.waiters {
                    waiter(result.clone());
                }
            }
        });
    }

    fn set_pack_handler(&self, handler: PackHandler) {
        *self.inner.handler.write() = Some(handler);
    }

    fn cancel(&self, note_id: &Hash32) {
        if let Some(entry) = self.inner.in_flight.lock().get(note_id) {
            entry.cancelled.store(true, Ordering::SeqCst);
        }
    }
}
