// Path: crates/test_utils/src/keepers.rs

//! In-memory keeper doubles.

use gitmesh_api::keepers::{
    AccountKeeper, AccountState, KeeperError, Keepers, NamespaceKeeper, NamespaceState,
    PushKeyKeeper, PushKeyState, RepoKeeper, RepoState, Ticket, TicketKeeper,
};
use gitmesh_types::{Address, PublicKey};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Account lookup backed by a map; unknown accounts read as nonce 0.
#[derive(Default)]
pub struct MockAccounts {
    nonces: RwLock<HashMap<Address, u64>>,
}

impl MockAccounts {
    /// Sets an account's on-chain nonce.
    pub fn set_nonce(&self, addr: Address, nonce: u64) {
        self.nonces.write().insert(addr, nonce);
    }
}

impl AccountKeeper for MockAccounts {
    fn account(&self, addr: &Address) -> Result<AccountState, KeeperError> {
        Ok(AccountState {
            nonce: self.nonces.read().get(addr).copied().unwrap_or(0),
            balance: "1000".to_string(),
        })
    }
}

/// A full keeper bundle for remote-server tests.
#[derive(Default)]
pub struct MockKeepers {
    /// Account nonces.
    pub accounts: MockAccounts,
    push_keys: RwLock<HashMap<String, PushKeyState>>,
    repos: RwLock<HashMap<String, RepoState>>,
    tracked: RwLock<HashMap<String, bool>>,
    namespaces: RwLock<HashMap<String, NamespaceState>>,
    tickets: RwLock<Vec<Ticket>>,
}

impl MockKeepers {
    /// Registers a push key record.
    pub fn put_push_key(&self, id: impl Into<String>, state: PushKeyState) {
        self.push_keys.write().insert(id.into(), state);
    }

    /// Registers a repository, tracked by default.
    pub fn put_repo(&self, name: impl Into<String>, state: RepoState) {
        let name = name.into();
        self.tracked.write().insert(name.clone(), true);
        self.repos.write().insert(name, state);
    }

    /// Marks a repository as untracked by this node.
    pub fn set_untracked(&self, name: &str) {
        self.tracked.write().insert(name.to_string(), false);
    }

    /// Registers a namespace record.
    pub fn put_namespace(&self, name: impl Into<String>, state: NamespaceState) {
        self.namespaces.write().insert(name.into(), state);
    }

    /// Appends a host ticket to the committee, in rank order.
    pub fn put_ticket(&self, ticket: Ticket) {
        self.tickets.write().push(ticket);
    }
}

impl AccountKeeper for MockKeepers {
    fn account(&self, addr: &Address) -> Result<AccountState, KeeperError> {
        self.accounts.account(addr)
    }
}

impl PushKeyKeeper for MockKeepers {
    fn push_key(&self, key_id: &str) -> Result<PushKeyState, KeeperError> {
        self.push_keys
            .read()
            .get(key_id)
            .cloned()
            .ok_or_else(|| KeeperError::NotFound(format!("push key {}", key_id)))
    }
}

impl RepoKeeper for MockKeepers {
    fn repo(&self, name: &str) -> Result<RepoState, KeeperError> {
        self.repos
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| KeeperError::NotFound(format!("repo {}", name)))
    }

    fn is_tracked(&self, name: &str) -> bool {
        self.tracked.read().get(name).copied().unwrap_or(false)
    }
}

impl NamespaceKeeper for MockKeepers {
    fn namespace(&self, name: &str) -> Result<NamespaceState, KeeperError> {
        self.namespaces
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| KeeperError::NotFound(format!("namespace {}", name)))
    }
}

impl TicketKeeper for MockKeepers {
    fn top_hosts(&self, limit: usize) -> Result<Vec<Ticket>, KeeperError> {
        Ok(self.tickets.read().iter().take(limit).cloned().collect())
    }

    fn ticket_by_proposer(&self, pub_key: &PublicKey) -> Result<Option<Ticket>, KeeperError> {
        Ok(self
            .tickets
            .read()
            .iter()
            .find(|t| &t.proposer_pub_key == pub_key)
            .cloned())
    }
}

impl Keepers for MockKeepers {
    fn accounts(&self) -> &dyn AccountKeeper {
        &self.accounts
    }

    fn push_keys(&self) -> &dyn PushKeyKeeper {
        self
    }

    fn repos(&self) -> &dyn RepoKeeper {
        self
    }

    fn namespaces(&self) -> &dyn NamespaceKeeper {
        self
    }

    fn tickets(&self) -> &dyn TicketKeeper {
        self
    }
}
