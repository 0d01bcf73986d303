// Path: crates/api/src/auth.rs

//! Push authentication and policy enforcement seams.
//!
//! The authenticator runs once per push note against repository and
//! namespace state; the policy enforcer it returns is applied again later,
//! per reference, during the dry run.

use crate::keepers::{NamespaceState, RepoState};
use gitmesh_types::error::PushError;
use gitmesh_types::tx::TokenAmount;
use std::sync::Arc;

/// Per-reference transaction details derived from a push note, the unit the
/// authenticator reasons about.
#[derive(Debug, Clone)]
pub struct RefTxDetail {
    /// The reference name.
    pub reference: String,
    /// The pusher key's nonce for this update.
    pub nonce: u64,
    /// The fee attached to this reference update.
    pub fee: TokenAmount,
    /// The value attached to this reference update.
    pub value: TokenAmount,
    /// Optional merge-proposal identifier; empty when unset.
    pub merge_proposal_id: String,
    /// True when the update deletes the reference.
    pub is_delete: bool,
}

/// The action a policy decision is being requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    /// Writing (fast-forward or create) a reference.
    Write,
    /// Deleting a reference.
    Delete,
    /// Rewriting history behind a reference.
    Update,
    /// Attaching a merge proposal.
    MergeWrite,
}

/// A closure deciding whether the authenticated pusher may perform `action`
/// on `reference`. Produced by [`PushAuthenticator::authenticate`], applied
/// during the dry run.
pub type PolicyEnforcer =
    Arc<dyn Fn(PolicyAction, &str) -> Result<(), PushError> + Send + Sync>;

/// Authenticates a push against repository and namespace state.
pub trait PushAuthenticator: Send + Sync {
    /// Checks that `push_key_id` may perform the described reference updates
    /// and returns the policy enforcer used during the dry run.
    fn authenticate(
        &self,
        push_key_id: &str,
        details: &[RefTxDetail],
        repo: &RepoState,
        namespace: Option<&NamespaceState>,
    ) -> Result<PolicyEnforcer, PushError>;
}
