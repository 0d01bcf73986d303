// Path: crates/remote/src/refsync.rs

//! Reference resynchronization decisions.
//!
//! When validation reports a local-hash mismatch for a tracked repository,
//! the replica is either externally corrupted (nothing has been committed
//! since the last sync, yet the hashes disagree) or simply behind. The
//! former warrants a full resync from height 0; the latter resumes from the
//! last synced height. Either way this is a fire-and-forget hand-off.

use gitmesh_api::keepers::RepoKeeper;
use gitmesh_api::sync::RefSyncScheduler;
use tracing::{info, warn};

/// Schedules a resync of `reference` in `repo_name` based on the repo's
/// sync bookkeeping.
pub fn schedule_resync(
    repos: &dyn RepoKeeper,
    scheduler: &dyn RefSyncScheduler,
    repo_name: &str,
    reference: &str,
) {
    let state = match repos.repo(repo_name) {
        Ok(state) => state,
        Err(e) => {
            warn!(target: "refsync", repo = repo_name, "cannot schedule resync: {}", e);
            return;
        }
    };

    let from_height = if state.last_synced_height == state.last_updated_height {
        // Up to date on-chain but the replica disagrees: treat the ref as
        // externally corrupted.
        0
    } else {
        state.last_synced_height
    };

    info!(
        target: "refsync",
        repo = repo_name,
        reference,
        from_height,
        "scheduling reference resync"
    );
    scheduler.schedule(repo_name, reference, from_height);
}
