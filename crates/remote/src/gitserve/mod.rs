// Path: crates/remote/src/gitserve/mod.rs

//! The git smart-HTTP front.
//!
//! Serves `info/refs` advertisements and `git-receive-pack` for plain and
//! namespaced repository paths. The wire protocol is delegated to the git
//! tool itself wherever bytes must stay bit-exact; only the command list is
//! parsed here, to build the push note. Push-time failures surface as
//! sideband error frames so off-the-shelf git clients print them, never as
//! HTTP 5xx.

pub mod pktline;

use crate::repo;
use crate::server::RemoteServer;
use axum::body::Bytes;
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use base64::Engine;
use gitmesh_types::error::PushError;
use gitmesh_types::push::{PushNote, PushedReference};
use gitmesh_types::tx::TokenAmount;
use gitmesh_types::PublicKey;
use parity_scale_codec::{Decode, Encode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One signed reference entry inside a push credential.
#[derive(Debug, Clone, Encode, Decode)]
pub struct RefCredential {
    /// The reference the signature covers.
    pub reference: String,
    /// The pusher key's nonce for this update.
    pub nonce: u64,
    /// The fee attached to this reference update.
    pub fee: TokenAmount,
    /// The value attached to this reference update.
    pub value: TokenAmount,
    /// Optional merge-proposal identifier; empty when unset.
    pub merge_proposal_id: String,
    /// The detached signature over the reference's transaction details.
    pub push_sig: Vec<u8>,
}

/// The push token the signing tool places in the HTTP password: everything
/// the server cannot compute itself when turning a wire push into a note.
#[derive(Debug, Clone, Encode, Decode)]
pub struct PushCredential {
    /// The pusher's registered push-key identifier.
    pub pusher_key_id: String,
    /// The pusher's public key.
    pub pusher_pub_key: PublicKey,
    /// Signing time, unix seconds.
    pub timestamp: u64,
    /// Per-reference signed details.
    pub references: Vec<RefCredential>,
    /// The note-level signature over the pusher-known fields.
    pub note_sig: Vec<u8>,
}

/// Authenticates HTTP pushes. Pluggable; the default decodes a bs58 push
/// token from the password field.
pub trait HttpAuthenticator: Send + Sync {
    /// Resolves the request's credentials into a push credential.
    fn authenticate(&self, username: &str, password: &str) -> Result<PushCredential, PushError>;
}

/// Decodes the password as a bs58-encoded canonical push credential.
pub struct TokenAuthenticator;

impl HttpAuthenticator for TokenAuthenticator {
    fn authenticate(&self, _username: &str, password: &str) -> Result<PushCredential, PushError> {
        let bytes = bs58::decode(password)
            .into_vec()
            .map_err(|e| PushError::Authorization(format!("malformed push token: {}", e)))?;
        gitmesh_types::codec::from_bytes_canonical(&bytes)
            .map_err(|e| PushError::Authorization(format!("malformed push token: {}", e)))
    }
}

#[derive(Clone)]
struct GitServeState {
    server: Arc<RemoteServer>,
    auth: Arc<dyn HttpAuthenticator>,
}

/// Builds the smart-HTTP router over a remote server.
pub fn router(server: Arc<RemoteServer>, auth: Arc<dyn HttpAuthenticator>) -> Router {
    let state = GitServeState { server, auth };
    Router::new()
        .route("/:repo/info/refs", get(info_refs))
        .route("/:repo/git-receive-pack", post(receive_pack))
        .route("/:ns/:repo/info/refs", get(info_refs_namespaced))
        .route("/:ns/:repo/git-receive-pack", post(receive_pack_namespaced))
        .with_state(state)
}

async fn info_refs(
    State(state): State<GitServeState>,
    UrlPath(repo_name): UrlPath<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    advertise(&state, None, &repo_name, params.get("service").map(String::as_str)).await
}

async fn info_refs_namespaced(
    State(state): State<GitServeState>,
    UrlPath((ns, repo_name)): UrlPath<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    advertise(
        &state,
        Some(ns),
        &repo_name,
        params.get("service").map(String::as_str),
    )
    .await
}

async fn receive_pack(
    State(state): State<GitServeState>,
    UrlPath(repo_name): UrlPath<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_receive_pack(&state, None, repo_name, headers, body).await
}

async fn receive_pack_namespaced(
    State(state): State<GitServeState>,
    UrlPath((ns, repo_name)): UrlPath<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_receive_pack(&state, Some(ns), repo_name, headers, body).await
}

/// Resolves the `<namespace>/<repo>` form against chain state, returning
/// 404 material on failure.
fn resolve_repo(
    state: &GitServeState,
    namespace: Option<&str>,
    repo_name: &str,
) -> Result<(), StatusCode> {
    if let Some(ns) = namespace {
        let ns_state = state
            .server
            .keepers
            .namespaces()
            .namespace(ns)
            .map_err(|_| StatusCode::NOT_FOUND)?;
        let target = format!("r/{}", repo_name);
        if !ns_state.domains.values().any(|t| t == &target) {
            return Err(StatusCode::NOT_FOUND);
        }
    }
    state
        .server
        .keepers
        .repos()
        .repo(repo_name)
        .map_err(|_| StatusCode::NOT_FOUND)?;
    Ok(())
}

async fn advertise(
    state: &GitServeState,
    namespace: Option<String>,
    repo_name: &str,
    service: Option<&str>,
) -> Response {
    let service = match service {
        Some(s @ ("git-receive-pack" | "git-upload-pack")) => s.to_string(),
        _ => return StatusCode::FORBIDDEN.into_response(),
    };
    if let Err(status) = resolve_repo(state, namespace.as_deref(), repo_name) {
        return status.into_response();
    }

    let path = repo::repo_path(&state.server.cfg.repo_root, repo_name);
    let refs = match repo::run_advertise_refs(&path, &service, Duration::from_secs(30)).await {
        Ok(refs) => refs,
        Err(e) => {
            warn!(target: "gitserve", repo = repo_name, "advertisement failed: {}", e);
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let mut body = pktline::encode(format!("# service={}\n", service).as_bytes());
    body.extend_from_slice(pktline::FLUSH);
    body.extend(refs);

    (
        [
            (
                header::CONTENT_TYPE,
                format!("application/x-{}-advertisement", service),
            ),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        body,
    )
        .into_response()
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

fn challenge() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"gitmesh\"")],
    )
        .into_response()
}

fn result_response(body: Vec<u8>) -> Response {
    (
        [
            (
                header::CONTENT_TYPE,
                "application/x-git-receive-pack-result",
            ),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

async fn handle_receive_pack(
    state: &GitServeState,
    namespace: Option<String>,
    repo_name: String,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(status) = resolve_repo(state, namespace.as_deref(), &repo_name) {
        return status.into_response();
    }

    let (user, pass) = match basic_credentials(&headers) {
        Some(creds) => creds,
        None => return challenge(),
    };
    let credential = match state.auth.authenticate(&user, &pass) {
        Ok(credential) => credential,
        Err(e) => {
            debug!(target: "gitserve", repo = %repo_name, "authentication failed: {}", e);
            return challenge();
        }
    };

    match serve_push(state, namespace, repo_name, credential, &body).await {
        Ok(output) => result_response(output),
        // Surfaced inside the stream so the git client prints it.
        Err(e) => result_response(pktline::sideband_error(&e.to_string())),
    }
}

/// The local-push entry into the pipeline: authenticate against repository
/// policy, run the client's request through `git-receive-pack`, build the
/// note from the parsed commands and the push credential, and admit it.
async fn serve_push(
    state: &GitServeState,
    namespace: Option<String>,
    repo_name: String,
    credential: PushCredential,
    body: &[u8],
) -> Result<Vec<u8>, PushError> {
    let server = &state.server;
    let (commands, _pack) = pktline::parse_receive_request(body)?;
    if commands.is_empty() {
        return Err(PushError::Validation("push carries no commands".into()));
    }

    // The same authenticator the gossip path runs: its enforcer is applied
    // per reference after the dry run.
    let repo_state = server
        .keepers
        .repos()
        .repo(&repo_name)
        .map_err(|_| PushError::RepoNotFound(repo_name.clone()))?;
    let ns_state = server.resolve_namespace(namespace.as_deref(), &repo_name)?;
    let details = ref_details_from_commands(&commands, &credential)?;
    let enforcer = server.authenticator.authenticate(
        &credential.pusher_key_id,
        &details,
        &repo_state,
        ns_state.as_ref(),
    )?;

    let repo_write_lock = server.repo_lock(&repo_name);
    let _guard = repo_write_lock.lock().await;

    let saved_refs = {
        let local = repo::open_bare(&server.cfg.repo_root, &repo_name)?;
        repo::capture_refs(&local, commands.iter().map(|(_, _, name)| name.clone()))?
    };

    // Stream the pack through git-receive-pack exactly as received; its
    // output goes back to the client byte-for-byte.
    let repo_path = repo::repo_path(&server.cfg.repo_root, &repo_name);
    let output = repo::run_receive_pack(
        &repo_path,
        body.to_vec(),
        Duration::from_secs(server.cfg.dry_run_timeout_secs),
    )
    .await;

    // The reference update finalizes only when the push transaction
    // commits on-chain; locally this run is a dry run like any other.
    let (note, output) = {
        let local = repo::open_bare(&server.cfg.repo_root, &repo_name)?;
        repo::restore_refs(&local, &saved_refs)?;
        let output = output?;

        let note = build_note(
            &local,
            namespace,
            &repo_name,
            &credential,
            &commands,
            &saved_refs,
        )?;
        server.check_note_locally(&note)?;
        crate::pipeline::enforce_ref_policies(&local, &note, &enforcer)?;
        (note, output)
    };

    let note = Arc::new(note);
    let id = note.id()?;
    server.notes_seen.lock().insert(id, ());
    server.admit_note(note, id).await?;

    Ok(output)
}

/// Derives the per-reference transaction details the authenticator reasons
/// about from the parsed commands and the push credential.
fn ref_details_from_commands(
    commands: &[(String, String, String)],
    credential: &PushCredential,
) -> Result<Vec<gitmesh_api::auth::RefTxDetail>, PushError> {
    commands
        .iter()
        .map(|(_, new_hash, name)| {
            let signed = credential
                .references
                .iter()
                .find(|r| &r.reference == name)
                .ok_or_else(|| {
                    PushError::Authorization(format!("push token does not cover {}", name))
                })?;
            Ok(gitmesh_api::auth::RefTxDetail {
                reference: name.clone(),
                nonce: signed.nonce,
                fee: signed.fee.clone(),
                value: signed.value.clone(),
                merge_proposal_id: signed.merge_proposal_id.clone(),
                is_delete: new_hash == repo::ZERO_HASH,
            })
        })
        .collect()
}

/// Builds the push note for a wire push: commands supply the reference
/// transitions, the repository supplies objects and sizes, the credential
/// supplies everything the pusher signed.
fn build_note(
    local: &git2::Repository,
    namespace: Option<String>,
    repo_name: &str,
    credential: &PushCredential,
    commands: &[(String, String, String)],
    observed: &HashMap<String, String>,
) -> Result<PushNote, PushError> {
    let mut references = Vec::with_capacity(commands.len());
    let mut size: u64 = 0;

    for (old_hash, new_hash, name) in commands {
        let signed = credential
            .references
            .iter()
            .find(|r| &r.reference == name)
            .ok_or_else(|| {
                PushError::Authorization(format!("push token does not cover {}", name))
            })?;

        // The client's claimed old hash must match what we observed before
        // the run; a stale client fails validation rather than clobbering.
        let observed_old = observed
            .get(name)
            .cloned()
            .unwrap_or_else(|| repo::ZERO_HASH.to_string());
        if old_hash != &observed_old {
            return Err(PushError::RefMismatch {
                reference: name.clone(),
            });
        }

        let objects = if new_hash == repo::ZERO_HASH {
            vec![]
        } else {
            repo::objects_between(local, old_hash, new_hash)?
        };
        size += repo::objects_size(local, &objects)?;

        references.push(PushedReference {
            name: name.clone(),
            old_hash: old_hash.clone(),
            new_hash: new_hash.clone(),
            nonce: signed.nonce,
            fee: signed.fee.clone(),
            value: signed.value.clone(),
            merge_proposal_id: signed.merge_proposal_id.clone(),
            objects,
            push_sig: signed.push_sig.clone(),
        });
    }

    Ok(PushNote {
        repo_name: repo_name.to_string(),
        namespace,
        pusher_key_id: credential.pusher_key_id.clone(),
        pusher_pub_key: credential.pusher_pub_key,
        timestamp: credential.timestamp,
        size,
        references,
        sig: credential.note_sig.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_authenticator_round_trips() {
        let credential = PushCredential {
            pusher_key_id: "gpkA".into(),
            pusher_pub_key: PublicKey([1; 32]),
            timestamp: 1,
            references: vec![RefCredential {
                reference: "refs/heads/master".into(),
                nonce: 1,
                fee: TokenAmount::from("0.1"),
                value: TokenAmount::zero(),
                merge_proposal_id: String::new(),
                push_sig: vec![1; 64],
            }],
            note_sig: vec![2; 64],
        };
        let token =
            bs58::encode(gitmesh_types::codec::to_bytes_canonical(&credential)).into_string();

        let decoded = TokenAuthenticator.authenticate("user", &token).unwrap();
        assert_eq!(decoded.pusher_key_id, "gpkA");
        assert_eq!(decoded.references.len(), 1);

        assert!(TokenAuthenticator.authenticate("user", "not-a-token!").is_err());
    }

    #[test]
    fn basic_credentials_parse() {
        let mut headers = HeaderMap::new();
        let encoded = base64::engine::general_purpose::STANDARD.encode("alice:secret");
        headers.insert(
            header::AUTHORIZATION,
            format!("Basic {}", encoded).parse().unwrap(),
        );
        assert_eq!(
            basic_credentials(&headers),
            Some(("alice".to_string(), "secret".to_string()))
        );

        headers.clear();
        assert!(basic_credentials(&headers).is_none());
    }

    #[test]
    fn ref_details_require_token_coverage() {
        let credential = PushCredential {
            pusher_key_id: "gpkA".into(),
            pusher_pub_key: PublicKey([1; 32]),
            timestamp: 1,
            references: vec![RefCredential {
                reference: "refs/heads/master".into(),
                nonce: 1,
                fee: TokenAmount::from("0.1"),
                value: TokenAmount::zero(),
                merge_proposal_id: String::new(),
                push_sig: vec![1; 64],
            }],
            note_sig: vec![2; 64],
        };

        let covered = vec![(
            "0".repeat(40),
            repo::ZERO_HASH.to_string(),
            "refs/heads/master".to_string(),
        )];
        let details = ref_details_from_commands(&covered, &credential).unwrap();
        assert!(details[0].is_delete);

        let uncovered = vec![(
            "0".repeat(40),
            "a".repeat(40),
            "refs/heads/other".to_string(),
        )];
        assert!(matches!(
            ref_details_from_commands(&uncovered, &credential),
            Err(PushError::Authorization(_))
        ));
    }
}
