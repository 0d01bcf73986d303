// Path: crates/crypto/src/sign/mod.rs

//! Signature algorithm implementations.

/// BLS12-381 signatures and aggregation for endorsements.
pub mod bls;
/// Ed25519 signatures for transactions and push notes.
pub mod eddsa;
