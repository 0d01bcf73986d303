// Path: crates/crypto/src/lib.rs

//! Cryptographic implementations for the gitmesh node.
//!
//! Thin wrappers around `dcrypt` primitives behind the `gitmesh-api` crypto
//! traits: Ed25519 for transaction and push-note signatures, BLS12-381 for
//! endorsement signatures and their quorum aggregation.

/// Signature algorithm implementations.
pub mod sign;
