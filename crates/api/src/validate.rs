// Path: crates/api/src/validate.rs

//! The pluggable transaction validator consulted by the mempool.

use gitmesh_types::error::MempoolError;
use gitmesh_types::tx::Transaction;

/// Options threaded through a validation run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateOptions {
    /// When set, the validator must tolerate nonces further than one above
    /// the account nonce: the pool will legitimately park such transactions
    /// in the nonce-gap cache.
    pub allow_nonce_gap: bool,
}

/// Full transaction validation: signature, structure, and consistency
/// against chain state.
///
/// Implementations must not re-enter the mempool: the pool mutex is held
/// across validation during admission.
pub trait TxValidator: Send + Sync {
    /// Validates `tx`, returning the first failure.
    fn validate_tx(&self, tx: &Transaction, opts: ValidateOptions) -> Result<(), MempoolError>;
}
