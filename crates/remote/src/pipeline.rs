// Path: crates/remote/src/pipeline.rs

//! The push-note admission pipeline.
//!
//! One task per inbound note: de-duplicate, resolve repository and
//! namespace, authenticate, validate against the local replica, fetch
//! missing objects, dry-run through `git-receive-pack`, admit to the push
//! pool, broadcast, and (on top hosts) endorse. Every failure is a local
//! rejection; nothing here retries.

use crate::gitserve::pktline;
use crate::refsync;
use crate::repo;
use crate::server::RemoteServer;
use crate::validate;
use gitmesh_api::auth::{PolicyAction, PolicyEnforcer, RefTxDetail};
use gitmesh_api::keepers::{NamespaceState, RepoState};
use gitmesh_types::error::{EndorseError, ErrorCode, PushError};
use gitmesh_types::events::NodeEvent;
use gitmesh_types::push::{EndorsedReference, Endorsement, PushNote};
use gitmesh_types::Hash32;
use libp2p::PeerId;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

impl RemoteServer {
    /// Runs the full pipeline for a note received over the gossip channel.
    ///
    /// Repeats within the seen-TTL are dropped silently. All other failures
    /// reject the note locally and are surfaced to the caller.
    pub async fn handle_push_note(
        self: &Arc<Self>,
        note: PushNote,
        from: Option<PeerId>,
    ) -> Result<(), PushError> {
        let id = note.id()?;
        {
            let mut seen = self.notes_seen.lock();
            if seen.contains(&id) {
                debug!(target: "push", note = %hex::encode(id), "dropping repeated note");
                return Ok(());
            }
            seen.insert(id, ());
        }
        if let Some(peer) = from {
            self.broadcaster.memory().record_note(peer, id);
        }

        let result = self.process_note(Arc::new(note), id, from.is_some()).await;
        if let Err(e) = &result {
            gitmesh_telemetry::remote_metrics().inc_notes_rejected(e.code());
            warn!(target: "push", note = %hex::encode(id), code = e.code(), "push note rejected: {}", e);
        }
        result
    }

    async fn process_note(
        self: &Arc<Self>,
        note: Arc<PushNote>,
        id: Hash32,
        from_remote: bool,
    ) -> Result<(), PushError> {
        let repo_state = self
            .keepers
            .repos()
            .repo(&note.repo_name)
            .map_err(|_| PushError::RepoNotFound(note.repo_name.clone()))?;
        let namespace = self.resolve_namespace(note.namespace.as_deref(), &note.repo_name)?;

        let details = ref_details(&note);
        let enforcer = self.authenticator.authenticate(
            &note.pusher_key_id,
            &details,
            &repo_state,
            namespace.as_ref(),
        )?;

        // Non-serving validators and nodes that do not track this repo
        // validate-and-forward only.
        if self.cfg.validator_non_serving || !self.keepers.repos().is_tracked(&note.repo_name) {
            validate::check_note_signatures(&note)?;
            self.broadcaster.broadcast_push_note(&note).await?;
            debug!(target: "push", note = %hex::encode(id), "validated and forwarded only");
            return Ok(());
        }

        self.check_note_locally(&note)?;

        // Fetch whatever the note references that we do not have. The
        // completion callback fires on a fetch worker; this task suspends
        // until then.
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        self.fetcher.fetch_async(
            note.clone(),
            Box::new(move |result| {
                let _ = done_tx.send(result);
            }),
        );
        done_rx.await.map_err(|_| PushError::Cancelled)??;

        self.finish_note(note, id, from_remote, enforcer).await
    }

    /// Post-fetch completion: size check, dry run, admission, broadcast.
    async fn finish_note(
        self: &Arc<Self>,
        note: Arc<PushNote>,
        id: Hash32,
        from_remote: bool,
        enforcer: PolicyEnforcer,
    ) -> Result<(), PushError> {
        let repo_write_lock = self.repo_lock(&note.repo_name);
        let _guard = repo_write_lock.lock().await;

        // The repo handle from validation is stale after the fetch wrote
        // packs; reload before measuring.
        let (request, saved_refs, repo_path) = {
            let local = repo::open_bare(&self.cfg.repo_root, &note.repo_name)?;

            let objects = note_objects(&note);
            let computed = repo::objects_size(&local, &objects)?;
            if computed != note.size {
                if from_remote {
                    return Err(PushError::SizeMismatch {
                        declared: note.size,
                        computed,
                    });
                }
                warn!(
                    target: "push",
                    note = %hex::encode(id),
                    declared = note.size,
                    computed,
                    "locally built note disagrees with its declared size"
                );
            }

            let request = build_receive_pack_request(&local, &note)?;
            let saved = repo::capture_refs(
                &local,
                note.references.iter().map(|r| r.name.clone()),
            )?;
            (request, saved, repo::repo_path(&self.cfg.repo_root, &note.repo_name))
        };

        let started = Instant::now();
        let output = repo::run_receive_pack(
            &repo_path,
            request,
            Duration::from_secs(self.cfg.dry_run_timeout_secs),
        )
        .await;

        // Roll the replica back before looking at the outcome: the dry run
        // must leave the repository observationally unchanged either way.
        {
            let local = repo::open_bare(&self.cfg.repo_root, &note.repo_name)?;
            repo::restore_refs(&local, &saved_refs)?;

            let output = output?;
            parse_report_status(&output)?;

            enforce_ref_policies(&local, &note, &enforcer)?;
        }
        gitmesh_telemetry::remote_metrics()
            .observe_dry_run_duration(started.elapsed().as_secs_f64());

        self.admit_note(note, id).await
    }

    /// Shared tail of the remote and local paths: pool admission,
    /// broadcast, and top-host self-endorsement.
    pub(crate) async fn admit_note(
        self: &Arc<Self>,
        note: Arc<PushNote>,
        id: Hash32,
    ) -> Result<(), PushError> {
        self.push_pool.add(note.clone())?;
        self.emit(NodeEvent::PushNoteAdded { id });
        info!(target: "push", note = %hex::encode(id), repo = %note.repo_name, "push note admitted");

        self.broadcaster.broadcast_push_note(&note).await?;

        if self.host_identity.is_some() {
            if let Err(e) = self.self_endorse(&note, id).await {
                warn!(target: "endorse", note = %hex::encode(id), "self endorsement failed: {}", e);
            }
        }
        Ok(())
    }

    /// Produces, registers, and gossips this host's endorsement of a note
    /// it has just validated. Only acts when our ticket is currently in the
    /// committee.
    async fn self_endorse(self: &Arc<Self>, note: &PushNote, id: Hash32) -> Result<(), EndorseError> {
        let host = match &self.host_identity {
            Some(host) => host,
            None => return Ok(()),
        };
        let top_hosts = self
            .keepers
            .tickets()
            .top_hosts(self.cfg.num_top_hosts_limit)
            .map_err(|e| EndorseError::Validation(e.to_string()))?;
        if !top_hosts
            .iter()
            .any(|t| t.proposer_pub_key == host.identity)
        {
            return Ok(());
        }

        // Validation just confirmed the note's old hashes match our
        // replica, so they are also our observed hashes.
        let mut endorsement = Endorsement {
            note_id: id.to_vec(),
            endorser_pub_key: host.identity,
            references: note
                .references
                .iter()
                .map(|r| EndorsedReference {
                    old_hash: r.old_hash.clone(),
                })
                .collect(),
            sig: vec![],
        };
        let payload = endorsement
            .sign_bytes()
            .map_err(|e| EndorseError::Validation(e.to_string()))?;
        endorsement.sig = {
            use gitmesh_api::crypto::{SerializableKey, SigningKeyPair};
            host.bls
                .sign(&payload)
                .map_err(|e| EndorseError::Validation(e.to_string()))?
                .to_bytes()
        };

        let endorsement_id = self.registry.register(endorsement.clone())?;
        self.registry.mark_seen(endorsement_id);
        self.emit(NodeEvent::EndorsementAdded {
            id: endorsement_id,
            note_id: id,
        });

        if let Err(e) = self.broadcaster.broadcast_endorsement(&endorsement).await {
            warn!(target: "endorse", "endorsement broadcast failed: {}", e);
        }
        self.try_create_push_tx(&id);
        Ok(())
    }

    /// Handles an endorsement received over the gossip channel.
    pub async fn handle_endorsement(
        self: &Arc<Self>,
        endorsement: Endorsement,
        from: Option<PeerId>,
    ) -> Result<(), EndorseError> {
        let id = endorsement
            .id()
            .map_err(|e| EndorseError::Validation(e.to_string()))?;
        if !self.registry.mark_seen(id) {
            debug!(target: "endorse", endorsement = %hex::encode(id), "dropping repeated endorsement");
            return Ok(());
        }
        if let Some(peer) = from {
            self.broadcaster.memory().record_endorsement(peer, id);
        }

        let note_id: Hash32 = endorsement
            .note_id
            .clone()
            .try_into()
            .map_err(|_| EndorseError::Validation("malformed note id".into()))?;
        let note = self
            .push_pool
            .get(&note_id)
            .ok_or_else(|| EndorseError::NoteNotFound(hex::encode(note_id)))?;

        let top_hosts = self
            .keepers
            .tickets()
            .top_hosts(self.cfg.num_top_hosts_limit)
            .map_err(|e| EndorseError::Validation(e.to_string()))?;
        validate::check_endorsement(&endorsement, &note, &top_hosts)?;

        self.registry.register(endorsement.clone())?;
        self.emit(NodeEvent::EndorsementAdded { id, note_id });
        info!(target: "endorse", endorsement = %hex::encode(id), note = %hex::encode(note_id), "endorsement registered");

        if let Err(e) = self.broadcaster.broadcast_endorsement(&endorsement).await {
            warn!(target: "endorse", "endorsement broadcast failed: {}", e);
        }
        self.try_create_push_tx(&note_id);
        Ok(())
    }

    /// Full validation against the local replica, scheduling a reference
    /// resync on a local-hash mismatch before failing the admission.
    pub(crate) fn check_note_locally(&self, note: &PushNote) -> Result<(), PushError> {
        let push_key = self
            .keepers
            .push_keys()
            .push_key(&note.pusher_key_id)
            .map_err(|_| PushError::PushKeyNotFound(note.pusher_key_id.clone()))?;

        let local = repo::open_bare(&self.cfg.repo_root, &note.repo_name)?;
        if let Err(e) = validate::check_push_note(note, &local, &push_key, &self.cfg.fee_per_byte)
        {
            if let PushError::RefMismatch { reference } = &e {
                refsync::schedule_resync(
                    self.keepers.repos(),
                    self.refsync.as_ref(),
                    &note.repo_name,
                    reference,
                );
            }
            return Err(e);
        }
        Ok(())
    }

    /// Resolves an optional namespace against chain state, requiring one of
    /// its domains to point at the repository.
    pub(crate) fn resolve_namespace(
        &self,
        namespace: Option<&str>,
        repo_name: &str,
    ) -> Result<Option<NamespaceState>, PushError> {
        let ns = match namespace {
            Some(ns) => ns,
            None => return Ok(None),
        };
        let state = self
            .keepers
            .namespaces()
            .namespace(ns)
            .map_err(|_| PushError::NamespaceNotFound(ns.to_string()))?;
        let target = format!("r/{}", repo_name);
        if !state.domains.values().any(|t| t == &target) {
            return Err(PushError::NamespaceNotFound(format!(
                "{} has no domain pointing at {}",
                ns, repo_name
            )));
        }
        Ok(Some(state))
    }
}

/// Applies the authenticator's policy enforcer to every reference update,
/// classifying each against the local replica. Shared by the gossip and
/// git-over-HTTP paths so no admission route skips policy.
pub(crate) fn enforce_ref_policies(
    local: &git2::Repository,
    note: &PushNote,
    enforcer: &PolicyEnforcer,
) -> Result<(), PushError> {
    for reference in &note.references {
        let action = policy_action(local, reference);
        enforcer(action, &reference.name)?;
    }
    Ok(())
}

/// Per-reference transaction details the authenticator reasons about.
pub(crate) fn ref_details(note: &PushNote) -> Vec<RefTxDetail> {
    note.references
        .iter()
        .map(|r| RefTxDetail {
            reference: r.name.clone(),
            nonce: r.nonce,
            fee: r.fee.clone(),
            value: r.value.clone(),
            merge_proposal_id: r.merge_proposal_id.clone(),
            is_delete: r.new_hash == repo::ZERO_HASH,
        })
        .collect()
}

fn note_objects(note: &PushNote) -> Vec<String> {
    let mut objects: Vec<String> = note
        .references
        .iter()
        .flat_map(|r| r.objects.iter().cloned())
        .collect();
    objects.sort();
    objects.dedup();
    objects
}

/// Builds the in-memory reference-update request fed to
/// `git-receive-pack --stateless-rpc`: the update commands followed by a
/// packfile of the note's objects.
fn build_receive_pack_request(
    local: &git2::Repository,
    note: &PushNote,
) -> Result<Vec<u8>, PushError> {
    let mut request = Vec::new();
    for (i, reference) in note.references.iter().enumerate() {
        let line = if i == 0 {
            format!(
                "{} {} {}\0report-status agent=gitmesh/0.1.0",
                reference.old_hash, reference.new_hash, reference.name
            )
        } else {
            format!(
                "{} {} {}",
                reference.old_hash, reference.new_hash, reference.name
            )
        };
        request.extend(pktline::encode(line.as_bytes()));
    }
    request.extend_from_slice(pktline::FLUSH);

    if note
        .references
        .iter()
        .any(|r| r.new_hash != repo::ZERO_HASH)
    {
        let objects = note_objects(note);
        request.extend(repo::build_pack(local, &objects)?);
    }
    Ok(request)
}

/// Parses a plain report-status response, bubbling the git tool's own
/// diagnostics on failure.
fn parse_report_status(output: &[u8]) -> Result<(), PushError> {
    let lines = pktline::parse_lines(output)?;
    let mut lines = lines.iter().map(|l| String::from_utf8_lossy(l).trim_end().to_string());

    match lines.next() {
        Some(status) if status == "unpack ok" => {}
        Some(status) => return Err(PushError::DryRun(status)),
        None => return Err(PushError::DryRun("empty report-status response".into())),
    }

    for line in lines {
        if let Some(rest) = line.strip_prefix("ng ") {
            return Err(PushError::DryRun(rest.to_string()));
        }
    }
    Ok(())
}

/// Classifies a reference update for the policy enforcer.
fn policy_action(local: &git2::Repository, reference: &gitmesh_types::push::PushedReference) -> PolicyAction {
    if reference.new_hash == repo::ZERO_HASH {
        return PolicyAction::Delete;
    }
    if !reference.merge_proposal_id.is_empty() {
        return PolicyAction::MergeWrite;
    }
    if reference.old_hash != repo::ZERO_HASH {
        let descends = git2::Oid::from_str(&reference.new_hash)
            .and_then(|new| {
                git2::Oid::from_str(&reference.old_hash)
                    .and_then(|old| local.graph_descendant_of(new, old))
            })
            .unwrap_or(false);
        if !descends {
            return PolicyAction::Update;
        }
    }
    PolicyAction::Write
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::{Broadcaster, PeerMemory};
    use crate::server::HostIdentity;
    use async_trait::async_trait;
    use gitmesh_api::fetch::{FetchDone, ObjectFetcher, PackHandler};
    use gitmesh_api::keepers::PushKeyState;
    use gitmesh_api::sync::RefSyncScheduler;
    use gitmesh_crypto::sign::bls::BlsKeyPair;
    use gitmesh_mempool::Mempool;
    use gitmesh_networking::{EndorsementGossip, NetworkError, PeerSet, PushGossip};
    use gitmesh_test_utils::keepers::{MockAccounts, MockKeepers};
    use gitmesh_test_utils::note_factory::{pusher, signed_note, Pusher, RefSpec};
    use gitmesh_test_utils::repo::{commit_file, RepoRoot};
    use gitmesh_test_utils::validate::AcceptAll;
    use gitmesh_types::config::{MempoolConfig, RemoteConfig};
    use gitmesh_types::Address;
    use parking_lot::Mutex;

    struct NoPeers;

    impl PeerSet for NoPeers {
        fn known_peers(&self) -> Vec<PeerId> {
            vec![]
        }

        fn local_peer_id(&self) -> PeerId {
            PeerId::random()
        }
    }

    #[derive(Default)]
    struct CountingGossip {
        notes: Mutex<usize>,
    }

    #[async_trait]
    impl PushGossip for CountingGossip {
        async fn send_note(&self, _peer: PeerId, _bytes: Vec<u8>) -> Result<(), NetworkError> {
            *self.notes.lock() += 1;
            Ok(())
        }
    }

    #[async_trait]
    impl EndorsementGossip for CountingGossip {
        async fn send_endorsement(
            &self,
            _peer: PeerId,
            _bytes: Vec<u8>,
        ) -> Result<(), NetworkError> {
            Ok(())
        }
    }

    /// Everything the note references is already local; completes inline.
    struct InstantFetcher;

    impl ObjectFetcher for InstantFetcher {
        fn fetch_async(&self, _note: Arc<PushNote>, done: FetchDone) {
            done(Ok(()));
        }

        fn set_pack_handler(&self, _handler: PackHandler) {}

        fn cancel(&self, _note_id: &Hash32) {}
    }

    struct AllowAllAuth;

    impl gitmesh_api::auth::PushAuthenticator for AllowAllAuth {
        fn authenticate(
            &self,
            _push_key_id: &str,
            _details: &[RefTxDetail],
            _repo: &RepoState,
            _namespace: Option<&NamespaceState>,
        ) -> Result<PolicyEnforcer, PushError> {
            Ok(Arc::new(|_action: PolicyAction, _reference: &str| Ok(())))
        }
    }

    struct NoopSync;

    impl RefSyncScheduler for NoopSync {
        fn schedule(&self, _repo: &str, _reference: &str, _from_height: u64) {}
    }

    struct Harness {
        server: Arc<RemoteServer>,
        keepers: Arc<MockKeepers>,
        root: RepoRoot,
        _events_rx: tokio::sync::broadcast::Receiver<NodeEvent>,
    }

    fn harness(host: Option<HostIdentity>) -> Harness {
        let root = RepoRoot::new();
        let keepers = Arc::new(MockKeepers::default());
        let (events, events_rx) = tokio::sync::broadcast::channel(64);

        let mempool = Arc::new(Mempool::new(
            MempoolConfig::default(),
            Arc::new(AcceptAll),
            Arc::new(MockAccounts::default()),
            events.clone(),
        ));
        let gossip = Arc::new(CountingGossip::default());
        let broadcaster = Broadcaster::new(
            Arc::new(NoPeers),
            gossip.clone(),
            gossip,
            PeerMemory::new(Duration::from_secs(600), Duration::from_secs(1800)),
        );
        let cfg = RemoteConfig {
            repo_root: root.path().to_path_buf(),
            push_endorse_quorum_size: 6,
            fee_per_byte: gitmesh_types::tx::TokenAmount::zero(),
            ..RemoteConfig::default()
        };
        let server = RemoteServer::new(
            cfg,
            keepers.clone(),
            Arc::new(AllowAllAuth),
            Arc::new(InstantFetcher),
            Arc::new(NoopSync),
            mempool,
            broadcaster,
            host,
            events,
        );
        Harness {
            server,
            keepers,
            root,
            _events_rx: events_rx,
        }
    }

    fn register_pusher(keepers: &MockKeepers, p: &Pusher) {
        keepers.put_push_key(
            p.key_id.clone(),
            PushKeyState {
                pub_key: p.pub_key,
                owner: Address("gmOwner".into()),
                scopes: vec![],
                fee_cap: "0".into(),
                nonce: 0,
                revoked: false,
            },
        );
    }

    /// A note advancing master from its current tip to a fast-forward
    /// commit whose objects are already in the odb but not referenced.
    fn staged_note(h: &Harness, p: &Pusher, declared_size: Option<u64>) -> PushNote {
        let repo = crate::repo::open_bare(h.root.path(), "repo1").unwrap();
        let c1 = repo
            .find_reference("refs/heads/master")
            .unwrap()
            .target()
            .unwrap();
        let c2 = commit_file(&repo, "refs/heads/master", "b.txt", b"two", "c2");
        // Reset master so the dry run performs the c1 -> c2 update itself.
        repo.reference("refs/heads/master", c1, true, "stage").unwrap();

        let objects =
            crate::repo::objects_between(&repo, &c1.to_string(), &c2.to_string()).unwrap();
        let size = declared_size
            .unwrap_or_else(|| crate::repo::objects_size(&repo, &objects).unwrap());

        signed_note(
            p,
            "repo1",
            size,
            vec![RefSpec {
                name: "refs/heads/master".into(),
                old_hash: c1.to_string(),
                new_hash: c2.to_string(),
                nonce: 1,
                fee: "0.1".into(),
                objects,
            }],
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn size_mismatch_is_a_hard_rejection() {
        let h = harness(None);
        let repo = h.root.init_bare("repo1");
        commit_file(&repo, "refs/heads/master", "a.txt", b"one", "c1");
        h.keepers.put_repo("repo1", RepoState::default());

        let p = pusher();
        register_pusher(&h.keepers, &p);
        let note = staged_note(&h, &p, Some(1024));
        let id = note.id().unwrap();

        let err = h
            .server
            .handle_push_note(note, Some(PeerId::random()))
            .await
            .unwrap_err();
        assert!(matches!(err, PushError::SizeMismatch { declared: 1024, .. }));
        assert!(!h.server.push_pool().has(&id));
        assert_eq!(h.server.registry().count(&id), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn valid_note_is_admitted_and_repo_left_unchanged() {
        let h = harness(None);
        let repo = h.root.init_bare("repo1");
        let c1 = commit_file(&repo, "refs/heads/master", "a.txt", b"one", "c1");
        h.keepers.put_repo("repo1", RepoState::default());

        let p = pusher();
        register_pusher(&h.keepers, &p);
        let note = staged_note(&h, &p, None);
        let id = note.id().unwrap();

        h.server.handle_push_note(note, None).await.unwrap();
        assert!(h.server.push_pool().has(&id));

        // Dry run idempotence: master still points at c1.
        let repo = crate::repo::open_bare(h.root.path(), "repo1").unwrap();
        assert_eq!(
            crate::repo::ref_hash(&repo, "refs/heads/master").unwrap(),
            c1.to_string()
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn repeated_notes_are_dropped_silently() {
        let h = harness(None);
        let repo = h.root.init_bare("repo1");
        commit_file(&repo, "refs/heads/master", "a.txt", b"one", "c1");
        h.keepers.put_repo("repo1", RepoState::default());

        let p = pusher();
        register_pusher(&h.keepers, &p);
        let note = staged_note(&h, &p, None);

        h.server.handle_push_note(note.clone(), None).await.unwrap();
        // The repeat is swallowed even though the pool already holds it.
        h.server.handle_push_note(note, None).await.unwrap();
        assert_eq!(h.server.push_pool().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn untracked_repos_validate_and_forward_only() {
        let h = harness(None);
        h.keepers.put_repo("repo1", RepoState::default());
        h.keepers.set_untracked("repo1");

        let p = pusher();
        register_pusher(&h.keepers, &p);
        let note = signed_note(
            &p,
            "repo1",
            4,
            vec![RefSpec {
                name: "refs/heads/master".into(),
                old_hash: repo::ZERO_HASH.into(),
                new_hash: "a".repeat(40),
                nonce: 1,
                fee: "0.1".into(),
                objects: vec![],
            }],
        );
        let id = note.id().unwrap();

        h.server.handle_push_note(note, None).await.unwrap();
        assert!(!h.server.push_pool().has(&id));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_repo_is_rejected_with_reason() {
        let h = harness(None);
        let p = pusher();
        let note = signed_note(
            &p,
            "ghost",
            4,
            vec![RefSpec {
                name: "refs/heads/master".into(),
                old_hash: repo::ZERO_HASH.into(),
                new_hash: "a".repeat(40),
                nonce: 1,
                fee: "0.1".into(),
                objects: vec![],
            }],
        );
        let err = h.server.handle_push_note(note, None).await.unwrap_err();
        assert!(matches!(err, PushError::RepoNotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn top_host_endorses_admitted_notes() {
        let bls = BlsKeyPair::generate().unwrap();
        let identity = gitmesh_types::PublicKey([42u8; 32]);
        let h = harness(Some(HostIdentity {
            identity,
            bls: bls.clone(),
        }));

        let repo = h.root.init_bare("repo1");
        commit_file(&repo, "refs/heads/master", "a.txt", b"one", "c1");
        h.keepers.put_repo("repo1", RepoState::default());
        h.keepers.put_ticket(gitmesh_api::keepers::Ticket {
            hash: [1u8; 32],
            proposer_pub_key: identity,
            bls_pub_key: {
                use gitmesh_api::crypto::{SerializableKey, SigningKeyPair};
                bls.public_key().to_bytes()
            },
            height: 1,
        });

        let p = pusher();
        register_pusher(&h.keepers, &p);
        let note = staged_note(&h, &p, None);
        let id = note.id().unwrap();

        h.server.handle_push_note(note, None).await.unwrap();
        assert_eq!(h.server.registry().count(&id), 1);
    }

    #[test]
    fn report_status_parsing() {
        let mut ok = pktline::encode_line("unpack ok");
        ok.extend(pktline::encode_line("ok refs/heads/master"));
        ok.extend_from_slice(pktline::FLUSH);
        parse_report_status(&ok).unwrap();

        let mut bad = pktline::encode_line("unpack ok");
        bad.extend(pktline::encode_line("ng refs/heads/master non-fast-forward"));
        bad.extend_from_slice(pktline::FLUSH);
        let err = parse_report_status(&bad).unwrap_err();
        assert!(matches!(err, PushError::DryRun(_)));

        let unpack_failed = pktline::encode_line("unpack index-pack abnormal exit");
        assert!(parse_report_status(&unpack_failed).is_err());
    }
}
