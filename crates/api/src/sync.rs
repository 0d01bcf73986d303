// Path: crates/api/src/sync.rs

//! Reference resynchronization hand-off.

/// Fire-and-forget hand-off to the external reference synchronizer.
///
/// Scheduling must never block the caller; failures are the synchronizer's
/// to retry and are not reported back.
pub trait RefSyncScheduler: Send + Sync {
    /// Requests that `reference` of `repo` be re-synchronized starting at
    /// `from_height`. Height 0 means a full resync.
    fn schedule(&self, repo: &str, reference: &str, from_height: u64);
}
