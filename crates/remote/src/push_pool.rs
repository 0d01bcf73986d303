// Path: crates/remote/src/push_pool.rs

//! The container of notes awaiting endorsement quorum.
//!
//! At most one note per id; capacity bounded. Notes leave when the builder
//! consumes them into a push transaction that commits, or when consensus
//! rejects that transaction.

use gitmesh_types::error::PushError;
use gitmesh_types::push::PushNote;
use gitmesh_types::Hash32;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A bounded, id-keyed container of pending push notes.
pub struct PushPool {
    capacity: usize,
    notes: RwLock<HashMap<Hash32, Arc<PushNote>>>,
}

impl PushPool {
    /// Creates a pool bounded to `capacity` notes.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            notes: RwLock::new(HashMap::new()),
        }
    }

    /// Admits a note. At most one note per id.
    pub fn add(&self, note: Arc<PushNote>) -> Result<(), PushError> {
        let id = note.id()?;
        let mut notes = self.notes.write();
        if notes.contains_key(&id) {
            return Err(PushError::DuplicateNote);
        }
        if notes.len() >= self.capacity {
            return Err(PushError::PoolFull);
        }
        notes.insert(id, note);
        gitmesh_telemetry::remote_metrics().set_push_pool_size(notes.len() as f64);
        Ok(())
    }

    /// Looks up a note by id.
    pub fn get(&self, id: &Hash32) -> Option<Arc<PushNote>> {
        self.notes.read().get(id).cloned()
    }

    /// Returns true if the pool holds the id.
    pub fn has(&self, id: &Hash32) -> bool {
        self.notes.read().contains_key(id)
    }

    /// Removes and returns a note.
    pub fn remove(&self, id: &Hash32) -> Option<Arc<PushNote>> {
        let mut notes = self.notes.write();
        let removed = notes.remove(id);
        if removed.is_some() {
            gitmesh_telemetry::remote_metrics().set_push_pool_size(notes.len() as f64);
        }
        removed
    }

    /// Number of pending notes.
    pub fn len(&self) -> usize {
        self.notes.read().len()
    }

    /// Returns true when no notes are pending.
    pub fn is_empty(&self) -> bool {
        self.notes.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitmesh_test_utils::note_factory::{pusher, signed_note, RefSpec};

    fn note(branch: &str) -> Arc<PushNote> {
        let p = pusher();
        Arc::new(signed_note(
            &p,
            "repo1",
            10,
            vec![RefSpec {
                name: format!("refs/heads/{}", branch),
                old_hash: "0".repeat(40),
                new_hash: "a".repeat(40),
                nonce: 1,
                fee: "0.1".into(),
                objects: vec![],
            }],
        ))
    }

    #[test]
    fn at_most_one_note_per_id() {
        let pool = PushPool::new(10);
        let n = note("master");
        pool.add(n.clone()).unwrap();
        assert!(matches!(pool.add(n), Err(PushError::DuplicateNote)));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn capacity_is_enforced() {
        let pool = PushPool::new(1);
        pool.add(note("a")).unwrap();
        assert!(matches!(pool.add(note("b")), Err(PushError::PoolFull)));
    }

    #[test]
    fn remove_returns_the_note() {
        let pool = PushPool::new(10);
        let n = note("master");
        let id = n.id().unwrap();
        pool.add(n).unwrap();
        assert!(pool.has(&id));
        assert!(pool.remove(&id).is_some());
        assert!(pool.remove(&id).is_none());
        assert!(pool.is_empty());
    }
}
