// Path: crates/types/src/lib.rs

//! Core data structures and error types for the gitmesh node.
//!
//! Everything that crosses a trust boundary (transactions, push notes,
//! endorsements) lives here, together with the canonical codec that fixes
//! their wire form. Higher layers must never re-serialize these structures
//! with anything other than [`codec`].

/// The canonical, deterministic binary codec for all consensus-critical data.
pub mod codec;
/// Shared configuration structures for the mempool and the remote server.
pub mod config;
/// Error types for every subsystem, each with a stable machine-readable code.
pub mod error;
/// Node-internal events broadcast on the shared event bus.
pub mod events;
/// Addresses, public keys, and hashing helpers.
pub mod identity;
/// Push notes, pushed references, and endorsements.
pub mod push;
/// The closed transaction union and its common header.
pub mod tx;

pub use identity::{Address, Hash32, PublicKey, TxHash};
