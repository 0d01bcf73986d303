// Path: crates/types/src/config/mod.rs

//! Shared configuration structures for the mempool and the remote server.
//!
//! Every field carries a serde default so partial TOML files deserialize
//! into working configurations.

use crate::tx::TokenAmount;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Admission and reaping limits for the transaction pool.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MempoolConfig {
    /// Maximum number of transactions held across pool and cache.
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: usize,
    /// Aggregate economic-size budget of the pool in bytes.
    #[serde(default = "default_max_txs_size")]
    pub max_txs_size: u64,
    /// Maximum serialized size of a single transaction in bytes.
    #[serde(default = "default_max_tx_size")]
    pub max_tx_size: u64,
    /// Maximum pending entries per sender, counting pool and cache.
    #[serde(default = "default_sender_tx_limit")]
    pub sender_tx_limit: usize,
    /// Maximum validator-ticket purchases reaped into one block.
    #[serde(default = "default_max_val_tickets_per_block")]
    pub max_val_tickets_per_block: usize,
}

fn default_max_pool_size() -> usize {
    10_000
}
fn default_max_txs_size() -> u64 {
    64 * 1024 * 1024
}
fn default_max_tx_size() -> u64 {
    1024 * 1024
}
fn default_sender_tx_limit() -> usize {
    64
}
fn default_max_val_tickets_per_block() -> usize {
    1
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_pool_size: default_max_pool_size(),
            max_txs_size: default_max_txs_size(),
            max_tx_size: default_max_tx_size(),
            sender_tx_limit: default_sender_tx_limit(),
            max_val_tickets_per_block: default_max_val_tickets_per_block(),
        }
    }
}

/// Configuration for the push pipeline and remote server.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RemoteConfig {
    /// Root directory holding the bare repositories, one per repo name.
    #[serde(default = "default_repo_root")]
    pub repo_root: PathBuf,
    /// Number of top-host endorsements required to assemble a push
    /// transaction.
    #[serde(default = "default_push_endorse_quorum_size")]
    pub push_endorse_quorum_size: usize,
    /// Size of the top-host committee consulted for endorsement checks.
    #[serde(default = "default_num_top_hosts_limit")]
    pub num_top_hosts_limit: usize,
    /// Maximum number of push notes awaiting endorsement.
    #[serde(default = "default_push_pool_capacity")]
    pub push_pool_capacity: usize,
    /// How long a note id stays in the duplicate-suppression set, seconds.
    #[serde(default = "default_note_seen_ttl_secs")]
    pub note_seen_ttl_secs: u64,
    /// How long a peer is remembered as having seen a note, seconds.
    #[serde(default = "default_peer_note_ttl_secs")]
    pub peer_note_ttl_secs: u64,
    /// How long a peer is remembered as having seen an endorsement, seconds.
    #[serde(default = "default_peer_endorsement_ttl_secs")]
    pub peer_endorsement_ttl_secs: u64,
    /// Wall-clock budget for a git-receive-pack dry run, seconds.
    #[serde(default = "default_dry_run_timeout_secs")]
    pub dry_run_timeout_secs: u64,
    /// The per-byte tariff a pushed reference's fee must cover.
    #[serde(default = "default_fee_per_byte")]
    pub fee_per_byte: TokenAmount,
    /// True when this node validates but does not serve repositories; such
    /// nodes only validate-and-forward push notes.
    #[serde(default)]
    pub validator_non_serving: bool,
}

fn default_repo_root() -> PathBuf {
    PathBuf::from("repos")
}
fn default_push_endorse_quorum_size() -> usize {
    3
}
fn default_num_top_hosts_limit() -> usize {
    21
}
fn default_push_pool_capacity() -> usize {
    1_000
}
fn default_note_seen_ttl_secs() -> u64 {
    // One source revision used five minutes; pinned here.
    300
}
fn default_peer_note_ttl_secs() -> u64 {
    600
}
fn default_peer_endorsement_ttl_secs() -> u64 {
    1_800
}
fn default_dry_run_timeout_secs() -> u64 {
    60
}
fn default_fee_per_byte() -> TokenAmount {
    TokenAmount::new("0.00001")
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            repo_root: default_repo_root(),
            push_endorse_quorum_size: default_push_endorse_quorum_size(),
            num_top_hosts_limit: default_num_top_hosts_limit(),
            push_pool_capacity: default_push_pool_capacity(),
            note_seen_ttl_secs: default_note_seen_ttl_secs(),
            peer_note_ttl_secs: default_peer_note_ttl_secs(),
            peer_endorsement_ttl_secs: default_peer_endorsement_ttl_secs(),
            dry_run_timeout_secs: default_dry_run_timeout_secs(),
            fee_per_byte: default_fee_per_byte(),
            validator_non_serving: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: MempoolConfig = toml::from_str("max_pool_size = 5").unwrap();
        assert_eq!(cfg.max_pool_size, 5);
        assert_eq!(cfg.sender_tx_limit, default_sender_tx_limit());

        let cfg: RemoteConfig = toml::from_str("push_endorse_quorum_size = 6").unwrap();
        assert_eq!(cfg.push_endorse_quorum_size, 6);
        assert_eq!(cfg.note_seen_ttl_secs, 300);
        assert!(!cfg.validator_non_serving);
    }
}
