// Path: crates/api/src/keepers.rs

//! Read-only chain-state lookups (keepers).
//!
//! All durable state, from accounts and push keys to repository metadata,
//! namespaces, and host tickets, lives in the external chain state store.
//! The core reads it
//! through these narrow interfaces and never writes it directly.

use gitmesh_types::{Address, PublicKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors surfaced by keeper lookups.
#[derive(Error, Debug)]
pub enum KeeperError {
    /// The requested record does not exist.
    #[error("Record not found: {0}")]
    NotFound(String),
    /// The underlying state store failed.
    #[error("State backend error: {0}")]
    Backend(String),
}

/// A sender's account snapshot at admission time.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AccountState {
    /// The account's current on-chain nonce.
    pub nonce: u64,
    /// The spendable balance as a decimal string.
    pub balance: String,
}

/// A registered push key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushKeyState {
    /// The key material.
    pub pub_key: PublicKey,
    /// The owning account.
    pub owner: Address,
    /// Repository scopes the key may push to. Empty means unscoped.
    pub scopes: Vec<String>,
    /// Maximum fee the key may spend per push; "0" means uncapped.
    pub fee_cap: String,
    /// The key's last used push nonce.
    pub nonce: u64,
    /// True once the key has been deleted.
    pub revoked: bool,
}

/// Repository metadata consulted by the push pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RepoState {
    /// The block height at which the repository was created.
    pub created_at: u64,
    /// Last height at which a reference of this repository was updated.
    pub last_updated_height: u64,
    /// Last height up to which the local replica has been synchronized.
    pub last_synced_height: u64,
    /// Owner addresses.
    pub owners: Vec<Address>,
    /// Canonical JSON repository configuration.
    pub config: Vec<u8>,
}

/// A namespace's domain mapping.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NamespaceState {
    /// The owning account.
    pub owner: Address,
    /// Domain → target mapping, e.g. `repo` → `r/repo1`.
    pub domains: BTreeMap<String, String>,
}

/// A staked host ticket selected into the committee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    /// The ticket hash.
    pub hash: [u8; 32],
    /// The proposer's Ed25519 identity.
    pub proposer_pub_key: PublicKey,
    /// The compressed BLS12-381 public key registered with the ticket.
    pub bls_pub_key: Vec<u8>,
    /// The height at which the ticket matured.
    pub height: u64,
}

/// Account lookups.
pub trait AccountKeeper: Send + Sync {
    /// Returns the account snapshot for `addr`, or a default (nonce 0) for
    /// unknown accounts.
    fn account(&self, addr: &Address) -> Result<AccountState, KeeperError>;
}

/// Push key lookups.
pub trait PushKeyKeeper: Send + Sync {
    /// Returns the push key record, or `NotFound`.
    fn push_key(&self, key_id: &str) -> Result<PushKeyState, KeeperError>;
}

/// Repository metadata lookups.
pub trait RepoKeeper: Send + Sync {
    /// Returns the repository record, or `NotFound`.
    fn repo(&self, name: &str) -> Result<RepoState, KeeperError>;

    /// Returns true when this node tracks (hosts a replica of) the
    /// repository.
    fn is_tracked(&self, name: &str) -> bool;
}

/// Namespace lookups.
pub trait NamespaceKeeper: Send + Sync {
    /// Returns the namespace record, or `NotFound`.
    fn namespace(&self, name: &str) -> Result<NamespaceState, KeeperError>;
}

/// Host-committee lookups.
pub trait TicketKeeper: Send + Sync {
    /// Returns the top `limit` host tickets for the current epoch, ordered
    /// by committee rank.
    fn top_hosts(&self, limit: usize) -> Result<Vec<Ticket>, KeeperError>;

    /// Resolves the selected ticket for a host identity, if any.
    fn ticket_by_proposer(&self, pub_key: &PublicKey) -> Result<Option<Ticket>, KeeperError> {
        let hosts = self.top_hosts(usize::MAX)?;
        Ok(hosts.into_iter().find(|t| &t.proposer_pub_key == pub_key))
    }
}

/// The bundle of keepers the remote server needs.
pub trait Keepers: Send + Sync {
    /// Account lookups.
    fn accounts(&self) -> &dyn AccountKeeper;
    /// Push key lookups.
    fn push_keys(&self) -> &dyn PushKeyKeeper;
    /// Repository lookups.
    fn repos(&self) -> &dyn RepoKeeper;
    /// Namespace lookups.
    fn namespaces(&self) -> &dyn NamespaceKeeper;
    /// Host-committee lookups.
    fn tickets(&self) -> &dyn TicketKeeper;
}
