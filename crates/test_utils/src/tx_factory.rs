// Path: crates/test_utils/src/tx_factory.rs

//! Transaction factories with deterministic senders.
//!
//! Signatures produced here are placeholder bytes; tests that exercise the
//! mempool pair these with a mock validator. Tests that need real
//! signatures go through [`crate::note_factory`] instead.

use gitmesh_types::tx::{TokenAmount, Transaction, TxCommon};
use gitmesh_types::{Address, PublicKey};

/// Fixed timestamp used by every factory so encodings are reproducible.
pub const FIXED_TIMESTAMP: u64 = 1_700_000_000;

/// The default sender seed.
pub const DEFAULT_SENDER: u8 = 1;

/// A deterministic common header for sender seed `sender`.
pub fn common_from(sender: u8, nonce: u64, fee: &str) -> TxCommon {
    TxCommon {
        nonce,
        fee: TokenAmount::from(fee),
        value: TokenAmount::zero(),
        sig: vec![7u8; 64],
        timestamp: FIXED_TIMESTAMP,
        sender_pub_key: PublicKey([sender; 32]),
    }
}

/// The address of the deterministic sender with seed `sender`.
pub fn sender_address(sender: u8) -> Address {
    PublicKey([sender; 32])
        .to_address()
        .unwrap_or_else(|e| panic!("address derivation failed: {}", e))
}

/// A coin transfer from the default sender.
pub fn coin_transfer(nonce: u64, fee: &str) -> Transaction {
    coin_transfer_from(DEFAULT_SENDER, nonce, fee)
}

/// A coin transfer from the sender with seed `sender`.
pub fn coin_transfer_from(sender: u8, nonce: u64, fee: &str) -> Transaction {
    Transaction::CoinTransfer {
        common: common_from(sender, nonce, fee),
        to: sender_address(200),
    }
}

/// A validator-ticket purchase from the default sender.
pub fn validator_ticket(nonce: u64, fee: &str) -> Transaction {
    Transaction::ValidatorTicket {
        common: common_from(DEFAULT_SENDER, nonce, fee),
        delegate: None,
    }
}

/// A host-ticket purchase registering `bls_pub_key`.
pub fn host_ticket(sender: u8, nonce: u64, fee: &str, bls_pub_key: Vec<u8>) -> Transaction {
    Transaction::HostTicket {
        common: common_from(sender, nonce, fee),
        delegate: None,
        bls_pub_key,
    }
}

/// A register-push-key repo proposal from the default sender.
pub fn proposal_register_push_key(
    nonce: u64,
    repo: &str,
    proposal_id: &str,
    fee: &str,
) -> Transaction {
    Transaction::ProposalRegisterPushKey {
        common: common_from(DEFAULT_SENDER, nonce, fee),
        repo: repo.to_string(),
        proposal_id: proposal_id.to_string(),
        push_key_ids: vec!["gpkTestKey".to_string()],
        scopes: vec![],
    }
}
