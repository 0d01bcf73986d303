// Path: crates/mempool/src/lib.rs

//! Priced transaction pool, nonce-gap cache, and mempool for the gitmesh node.
//!
//! Admission flows through three layers: the [`Mempool`](mempool::Mempool)
//! applies capacity and validation policy, the
//! [`PricedPool`](pool::PricedPool) keeps accepted transactions in a
//! deterministic fee-rate order, and the
//! [`NonceGapCache`](cache::NonceGapCache) parks future-nonce transactions
//! until their predecessors arrive.

/// The nonce-gap cache for future-nonce transactions.
pub mod cache;
/// Admission control, reaping, and post-commit recheck.
pub mod mempool;
/// The ordered container of accepted transactions.
pub mod pool;

pub use cache::NonceGapCache;
pub use mempool::{Mempool, MempoolGuard};
pub use pool::{AddOutcome, PricedPool};
