// Path: crates/test_utils/src/validate.rs

//! Mock transaction validators.

use gitmesh_api::validate::{TxValidator, ValidateOptions};
use gitmesh_types::error::MempoolError;
use gitmesh_types::tx::Transaction;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Accepts every transaction.
pub struct AcceptAll;

impl TxValidator for AcceptAll {
    fn validate_tx(&self, _tx: &Transaction, _opts: ValidateOptions) -> Result<(), MempoolError> {
        Ok(())
    }
}

/// Rejects transactions carrying a specific nonce, optionally armed later to
/// simulate state changing under the pool at block commit.
pub struct RejectNonce {
    nonce: u64,
    active: AtomicBool,
}

impl RejectNonce {
    /// Rejects matching transactions immediately.
    pub fn new(nonce: u64) -> Arc<Self> {
        Arc::new(Self {
            nonce,
            active: AtomicBool::new(true),
        })
    }

    /// Accepts everything until [`RejectNonce::activate`] is called.
    pub fn inactive(nonce: u64) -> Arc<Self> {
        Arc::new(Self {
            nonce,
            active: AtomicBool::new(false),
        })
    }

    /// Starts rejecting matching transactions.
    pub fn activate(&self) {
        self.active.store(true, Ordering::SeqCst);
    }
}

impl TxValidator for RejectNonce {
    fn validate_tx(&self, tx: &Transaction, _opts: ValidateOptions) -> Result<(), MempoolError> {
        if self.active.load(Ordering::SeqCst) && tx.common().nonce == self.nonce {
            return Err(MempoolError::ValidationFailed(format!(
                "nonce {} is no longer valid",
                self.nonce
            )));
        }
        Ok(())
    }
}
