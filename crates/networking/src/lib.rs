// Path: crates/networking/src/lib.rs

//! Gossip trait seams and wire messages for the gitmesh node.
//!
//! The swarm itself (transports, discovery, channel plumbing) is an
//! external collaborator. This crate fixes the two gossip channels' wire
//! format and the traits the remote server publishes through.

/// Wire envelopes for the push-note and endorsement channels.
pub mod message;
/// Gossip and peer-set trait definitions.
pub mod traits;

pub use traits::{EndorsementGossip, NetworkError, PeerSet, PushGossip};
