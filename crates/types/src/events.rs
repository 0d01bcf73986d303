// Path: crates/types/src/events.rs

//! Node-internal events broadcast on the shared event bus.
//!
//! The mempool publishes transaction lifecycle events; the remote server
//! subscribes to evict push notes whose push transaction left the pool.

use crate::identity::{Hash32, TxHash};
use serde::{Deserialize, Serialize};

/// Observable state changes inside the node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum NodeEvent {
    /// A transaction passed admission and entered the pool or the nonce-gap
    /// cache.
    TxAdded {
        /// The canonical transaction hash.
        hash: TxHash,
    },
    /// A transaction was rejected during admission.
    TxRejected {
        /// The canonical transaction hash.
        hash: TxHash,
        /// The stable error code of the rejection.
        code: String,
        /// Human-readable rejection reason.
        reason: String,
        /// The embedded push note id, if this was a push transaction.
        note_id: Option<Hash32>,
    },
    /// A transaction was included in a committed block with a success
    /// response code.
    TxCommitted {
        /// The canonical transaction hash.
        hash: TxHash,
        /// The committing block height.
        height: u64,
        /// The embedded push note id, if this was a push transaction.
        note_id: Option<Hash32>,
    },
    /// A transaction left the pool at block commit, regardless of its
    /// response code.
    TxRemoved {
        /// The canonical transaction hash.
        hash: TxHash,
        /// The committing block height.
        height: u64,
        /// The embedded push note id, if this was a push transaction.
        note_id: Option<Hash32>,
    },
    /// A push note was admitted to the push pool after a successful dry run.
    PushNoteAdded {
        /// The note id.
        id: Hash32,
    },
    /// A push note left the push pool.
    PushNoteEvicted {
        /// The note id.
        id: Hash32,
    },
    /// An endorsement was registered for a pending push note.
    EndorsementAdded {
        /// The endorsement id.
        id: Hash32,
        /// The endorsed note id.
        note_id: Hash32,
    },
}
