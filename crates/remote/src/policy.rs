// Path: crates/remote/src/policy.rs

//! Repository-policy push authentication.
//!
//! The reference [`PushAuthenticator`]: reads the repository's canonical
//! JSON configuration, gates the push on contributor membership, and
//! returns an enforcer that applies the per-reference access rules during
//! the dry run.

use gitmesh_api::auth::{PolicyAction, PolicyEnforcer, PushAuthenticator, RefTxDetail};
use gitmesh_api::keepers::{NamespaceState, RepoState};
use gitmesh_types::error::PushError;
use serde::Deserialize;
use std::sync::Arc;

/// One access rule inside a repository configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyRule {
    /// Who the rule applies to: a push-key id, `contrib`, or `all`.
    pub subject: String,
    /// Reference prefix the rule covers, e.g. `refs/heads/`.
    pub object: String,
    /// The gated action: `write`, `delete`, `update`, or `merge-write`.
    pub action: String,
    /// Whether matching operations are allowed or denied.
    #[serde(default)]
    pub allow: bool,
}

/// The policy-relevant subset of a repository's JSON configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepoPolicyConfig {
    /// Push keys registered as contributors. Empty means open pushing.
    #[serde(default)]
    pub contributors: Vec<String>,
    /// Access rules, evaluated most-specific subject first.
    #[serde(default)]
    pub policies: Vec<PolicyRule>,
}

impl RepoPolicyConfig {
    /// Parses a repository's canonical JSON configuration; an empty blob is
    /// an empty configuration.
    pub fn from_config(config: &[u8]) -> Result<Self, PushError> {
        if config.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_slice(config)
            .map_err(|e| PushError::Validation(format!("malformed repo config: {}", e)))
    }
}

fn action_name(action: PolicyAction) -> &'static str {
    match action {
        PolicyAction::Write => "write",
        PolicyAction::Delete => "delete",
        PolicyAction::Update => "update",
        PolicyAction::MergeWrite => "merge-write",
    }
}

/// Actions permitted without an explicit allow rule.
fn allowed_by_default(action: PolicyAction) -> bool {
    matches!(action, PolicyAction::Write | PolicyAction::MergeWrite)
}

/// Resolves the effective decision for one `(subject, action, reference)`.
///
/// The most specific matching rule wins: an exact push-key subject beats
/// `contrib`, which beats `all`. Within one specificity tier an explicit
/// deny wins.
fn evaluate(
    config: &RepoPolicyConfig,
    push_key_id: &str,
    is_contributor: bool,
    action: PolicyAction,
    reference: &str,
) -> bool {
    let name = action_name(action);
    let tiers: [&dyn Fn(&PolicyRule) -> bool; 3] = [
        &|r| r.subject == push_key_id,
        &|r| r.subject == "contrib" && is_contributor,
        &|r| r.subject == "all",
    ];

    for tier in tiers {
        let mut matched = None;
        for rule in &config.policies {
            if !tier(rule) || rule.action != name || !reference.starts_with(&rule.object) {
                continue;
            }
            matched = Some(match matched {
                Some(false) => false,
                _ => rule.allow,
            });
        }
        if let Some(decision) = matched {
            return decision;
        }
    }

    allowed_by_default(action)
}

/// Push authentication backed by the repository's own configuration.
pub struct RepoPolicyAuthenticator;

impl PushAuthenticator for RepoPolicyAuthenticator {
    fn authenticate(
        &self,
        push_key_id: &str,
        details: &[RefTxDetail],
        repo: &RepoState,
        _namespace: Option<&NamespaceState>,
    ) -> Result<PolicyEnforcer, PushError> {
        let config = RepoPolicyConfig::from_config(&repo.config)?;

        let is_contributor = config.contributors.iter().any(|c| c == push_key_id);
        if !config.contributors.is_empty() && !is_contributor {
            return Err(PushError::Authorization(format!(
                "push key {} is not a contributor",
                push_key_id
            )));
        }

        // Surface-form checks the enforcer cannot express per action.
        for detail in details {
            if detail.is_delete && !detail.merge_proposal_id.is_empty() {
                return Err(PushError::Validation(format!(
                    "deletion of {} cannot carry a merge proposal",
                    detail.reference
                )));
            }
        }

        let push_key_id = push_key_id.to_string();
        Ok(Arc::new(move |action: PolicyAction, reference: &str| {
            if evaluate(&config, &push_key_id, is_contributor, action, reference) {
                Ok(())
            } else {
                Err(PushError::Authorization(format!(
                    "{} on {} denied by repository policy",
                    action_name(action),
                    reference
                )))
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitmesh_types::tx::TokenAmount;
    use gitmesh_types::Address;

    fn repo_with(config: &str) -> RepoState {
        RepoState {
            config: config.as_bytes().to_vec(),
            owners: vec![Address("gmOwner".into())],
            ..RepoState::default()
        }
    }

    fn detail(reference: &str) -> RefTxDetail {
        RefTxDetail {
            reference: reference.to_string(),
            nonce: 1,
            fee: TokenAmount::from("0.1"),
            value: TokenAmount::zero(),
            merge_proposal_id: String::new(),
            is_delete: false,
        }
    }

    #[test]
    fn open_repos_allow_writes_but_not_deletes() {
        let enforcer = RepoPolicyAuthenticator
            .authenticate("gpkA", &[detail("refs/heads/master")], &repo_with(""), None)
            .unwrap();
        enforcer(PolicyAction::Write, "refs/heads/master").unwrap();
        enforcer(PolicyAction::MergeWrite, "refs/heads/master").unwrap();
        assert!(enforcer(PolicyAction::Delete, "refs/heads/master").is_err());
        assert!(enforcer(PolicyAction::Update, "refs/heads/master").is_err());
    }

    #[test]
    fn contributor_gate_applies_when_configured() {
        let config = r#"{"contributors": ["gpkA"]}"#;
        let repo = repo_with(config);

        RepoPolicyAuthenticator
            .authenticate("gpkA", &[], &repo, None)
            .unwrap();
        let err = RepoPolicyAuthenticator
            .authenticate("gpkB", &[], &repo, None)
            .err().unwrap();
        assert!(matches!(err, PushError::Authorization(_)));
    }

    #[test]
    fn explicit_rules_override_defaults() {
        let config = r#"{
            "contributors": ["gpkA"],
            "policies": [
                {"subject": "contrib", "object": "refs/heads/", "action": "delete", "allow": true},
                {"subject": "all", "object": "refs/heads/release", "action": "write", "allow": false}
            ]
        }"#;
        let enforcer = RepoPolicyAuthenticator
            .authenticate("gpkA", &[], &repo_with(config), None)
            .unwrap();

        enforcer(PolicyAction::Delete, "refs/heads/feature").unwrap();
        assert!(enforcer(PolicyAction::Write, "refs/heads/release-1").is_err());
        enforcer(PolicyAction::Write, "refs/heads/other").unwrap();
    }

    #[test]
    fn specific_subject_beats_group_rules() {
        let config = r#"{
            "contributors": ["gpkA"],
            "policies": [
                {"subject": "contrib", "object": "refs/heads/", "action": "write", "allow": false},
                {"subject": "gpkA", "object": "refs/heads/", "action": "write", "allow": true}
            ]
        }"#;
        let enforcer = RepoPolicyAuthenticator
            .authenticate("gpkA", &[], &repo_with(config), None)
            .unwrap();
        enforcer(PolicyAction::Write, "refs/heads/master").unwrap();
    }

    #[test]
    fn malformed_config_is_a_validation_failure() {
        let err = RepoPolicyAuthenticator
            .authenticate("gpkA", &[], &repo_with("not json"), None)
            .err().unwrap();
        assert!(matches!(err, PushError::Validation(_)));
    }

    #[test]
    fn deletes_cannot_carry_merge_proposals() {
        let mut d = detail("refs/heads/master");
        d.is_delete = true;
        d.merge_proposal_id = "7".into();
        let err = RepoPolicyAuthenticator
            .authenticate("gpkA", &[d], &repo_with(""), None)
            .err().unwrap();
        assert!(matches!(err, PushError::Validation(_)));
    }
}
