// Path: crates/remote/src/lib.rs

//! Push-note pipeline, endorsement aggregation, and git smart-HTTP front.
//!
//! The [`server::RemoteServer`] owns the push pool, the endorsement
//! registry, the duplicate-suppression caches, and the peer memory. Inbound
//! push notes run the pipeline in [`pipeline`]; endorsements run
//! [`endorsement`]; git clients enter through [`gitserve`].

/// Outbound gossip with peer memory.
pub mod broadcast;
/// Endorsement registry and push-transaction assembly.
pub mod endorsement;
/// The concrete object-fetcher driver.
pub mod fetcher;
/// The git smart-HTTP front.
pub mod gitserve;
/// The push-note admission pipeline.
pub mod pipeline;
/// Repository-policy push authentication.
pub mod policy;
/// The container of notes awaiting endorsement quorum.
pub mod push_pool;
/// Reference resynchronization decisions.
pub mod refsync;
/// Bare-repository helpers.
pub mod repo;
/// The remote server object and its consensus-event glue.
pub mod server;
/// Expiring maps for seen-sets and peer memory.
pub mod ttl;
/// Push-note and endorsement validation.
pub mod validate;

pub use server::RemoteServer;
