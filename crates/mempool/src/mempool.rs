// Path: crates/mempool/src/mempool.rs

//! Admission control, reaping, and post-commit recheck.
//!
//! A single pool mutex covers every mutating operation. The consensus
//! driver serializes block commits with concurrent admission by holding the
//! guard returned from [`Mempool::lock`] across `update`.

use crate::cache::NonceGapCache;
use crate::pool::{AddOutcome, PoolEntry, PricedPool};
use gitmesh_api::validate::{TxValidator, ValidateOptions};
use gitmesh_api::keepers::AccountKeeper;
use gitmesh_types::config::MempoolConfig;
use gitmesh_types::error::{ErrorCode, MempoolError, PoolError, TxError};
use gitmesh_types::events::NodeEvent;
use gitmesh_types::tx::Transaction;
use gitmesh_types::TxHash;
use lru::LruCache;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Number of transaction hashes remembered for duplicate suppression,
/// covering both admitted and rejected transactions.
const SEEN_CACHE_SIZE: usize = 100_000;

/// Response code signalling a successfully executed transaction.
const CODE_OK: u32 = 0;

struct Inner {
    pool: PricedPool,
    cache: NonceGapCache,
    seen: LruCache<TxHash, ()>,
}

/// Admission control in front of the priced pool and nonce-gap cache.
pub struct Mempool {
    cfg: MempoolConfig,
    inner: Mutex<Inner>,
    validator: Arc<dyn TxValidator>,
    accounts: Arc<dyn AccountKeeper>,
    events: broadcast::Sender<NodeEvent>,
}

impl Mempool {
    /// Creates a mempool over the given validator and account lookup,
    /// publishing lifecycle events on `events`.
    pub fn new(
        cfg: MempoolConfig,
        validator: Arc<dyn TxValidator>,
        accounts: Arc<dyn AccountKeeper>,
        events: broadcast::Sender<NodeEvent>,
    ) -> Self {
        let inner = Inner {
            pool: PricedPool::new(cfg.max_pool_size, cfg.sender_tx_limit),
            cache: NonceGapCache::new(),
            seen: LruCache::new(
                NonZeroUsize::new(SEEN_CACHE_SIZE).unwrap_or_else(|| unreachable!()),
            ),
        };
        Self {
            cfg,
            inner: Mutex::new(inner),
            validator,
            accounts,
            events,
        }
    }

    /// Takes the pool mutex, serializing the returned guard's operations
    /// with all concurrent admission.
    pub fn lock(&self) -> MempoolGuard<'_> {
        MempoolGuard {
            mempool: self,
            inner: self.inner.lock(),
        }
    }

    /// Validates and admits a transaction.
    ///
    /// Emits `TxAdded` on success and `TxRejected` on any failure. The
    /// transaction is durably in the pool or cache when this returns `Ok`.
    pub fn add(&self, tx: Transaction) -> Result<AddOutcome, MempoolError> {
        self.lock().add(tx)
    }

    /// Reaps an ordered batch for the next block. See
    /// [`MempoolGuard::reap_max_bytes`].
    pub fn reap_max_bytes(&self, max_bytes: i64) -> Vec<Vec<u8>> {
        self.lock().reap_max_bytes(max_bytes)
    }

    /// Removes committed transactions and rechecks the remainder. See
    /// [`MempoolGuard::update`].
    pub fn update(
        &self,
        height: u64,
        committed: &[Vec<u8>],
        responses: &[u32],
    ) -> Result<(), MempoolError> {
        self.lock().update(height, committed, responses)
    }

    /// Number of pooled transactions (excluding the nonce-gap cache).
    pub fn len(&self) -> usize {
        self.inner.lock().pool.len()
    }

    /// Returns true when the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of cached future-nonce transactions.
    pub fn cache_len(&self) -> usize {
        self.inner.lock().cache.len()
    }

    /// Aggregate economic size of the pool in bytes.
    pub fn byte_size(&self) -> u64 {
        self.inner.lock().pool.byte_size()
    }

    /// Returns true if the pool holds the hash.
    pub fn has(&self, hash: &TxHash) -> bool {
        self.inner.lock().pool.has(hash)
    }

    /// Looks up a pooled transaction by hash.
    pub fn get(&self, hash: &TxHash) -> Option<Arc<Transaction>> {
        self.inner.lock().pool.get(hash)
    }

    /// Drops every pooled and cached transaction.
    pub fn flush(&self) {
        let mut inner = self.inner.lock();
        inner.pool.flush();
        inner.cache.flush();
    }

    fn emit(&self, event: NodeEvent) {
        // Nobody listening is fine; the bus is best-effort.
        let _ = self.events.send(event);
    }
}

/// The pool mutex held as an RAII guard. Dropping it releases admission.
pub struct MempoolGuard<'a> {
    mempool: &'a Mempool,
    inner: MutexGuard<'a, Inner>,
}

impl MempoolGuard<'_> {
    /// Validates and admits a transaction while the guard is held.
    pub fn add(&mut self, tx: Transaction) -> Result<AddOutcome, MempoolError> {
        let hash = match tx.hash() {
            Ok(h) => h,
            Err(e) => {
                warn!(target: "mempool", "rejecting undecodable transaction: {}", e);
                return Err(MempoolError::Tx(e));
            }
        };

        match self.admit(&tx, hash) {
            Ok(outcome) => {
                self.inner.seen.put(hash, ());
                self.mempool.emit(NodeEvent::TxAdded { hash });
                let metrics = gitmesh_telemetry::mempool_metrics();
                metrics.set_pool_size(self.inner.pool.len() as f64);
                metrics.set_pool_byte_size(self.inner.pool.byte_size() as f64);
                metrics.set_cache_size(self.inner.cache.len() as f64);
                debug!(
                    target: "mempool",
                    tx = %hex::encode(hash),
                    pooled = matches!(outcome, AddOutcome::Pooled),
                    "transaction admitted"
                );
                Ok(outcome)
            }
            Err(e) => {
                // Remember rejected bytes so an identical retry is dropped
                // as a duplicate instead of re-validated.
                self.inner.seen.put(hash, ());
                gitmesh_telemetry::mempool_metrics().inc_txs_rejected(e.code());
                warn!(target: "mempool", tx = %hex::encode(hash), code = e.code(), "transaction rejected: {}", e);
                self.mempool.emit(NodeEvent::TxRejected {
                    hash,
                    code: e.code().to_string(),
                    reason: e.to_string(),
                    note_id: tx.push_note_id(),
                });
                Err(e)
            }
        }
    }

    fn admit(&mut self, tx: &Transaction, hash: TxHash) -> Result<AddOutcome, MempoolError> {
        self.check_capacity(tx)?;

        if self.inner.pool.has(&hash) || self.inner.seen.contains(&hash) {
            return Err(MempoolError::Pool(PoolError::DuplicateTransaction));
        }

        tx.validate_structure()?;

        // The pool may legitimately cache future-nonce transactions, so the
        // validator must not reject nonce gaps here.
        self.mempool
            .validator
            .validate_tx(tx, ValidateOptions { allow_nonce_gap: true })?;

        let sender = tx.sender_address()?;
        let account_nonce = self
            .mempool
            .accounts
            .account(&sender)
            .map_err(|e| MempoolError::ValidationFailed(e.to_string()))?
            .nonce;

        let inner = &mut *self.inner;
        inner
            .pool
            .add(Arc::new(tx.clone()), account_nonce, &mut inner.cache)
            .map_err(MempoolError::Pool)
    }

    fn check_capacity(&self, tx: &Transaction) -> Result<(), MempoolError> {
        if self.inner.pool.len() >= self.mempool.cfg.max_pool_size {
            return Err(MempoolError::Pool(PoolError::ContainerFull));
        }
        let size = tx.size()?;
        if size > self.mempool.cfg.max_tx_size {
            return Err(MempoolError::Pool(PoolError::TxTooLarge {
                size,
                max: self.mempool.cfg.max_tx_size,
            }));
        }
        if size + self.inner.pool.byte_size() > self.mempool.cfg.max_txs_size {
            return Err(MempoolError::Pool(PoolError::ByteCapacityExceeded));
        }
        Ok(())
    }

    /// Reaps an ordered batch of serialized transactions for the next block.
    ///
    /// Walks the pool top-down enforcing, in order: at most one proposal
    /// transaction per `(repo, proposal_id)`, the validator-ticket cap, and
    /// the byte budget (`max_bytes < 0` means unbounded). Entries set aside
    /// by the first two rules are re-inserted afterwards, preserving their
    /// sender/nonce position.
    pub fn reap_max_bytes(&mut self, max_bytes: i64) -> Vec<Vec<u8>> {
        let mut batch: Vec<Vec<u8>> = Vec::new();
        let mut set_aside: Vec<PoolEntry> = Vec::new();
        let mut proposals_seen: HashSet<(String, String)> = HashSet::new();
        let mut val_tickets = 0usize;
        let mut total: u64 = 0;

        while let Some(entry) = self.inner.pool.pop_head_entry() {
            if let Some((repo, proposal_id)) = entry.tx.proposal_key() {
                let key = (repo.to_string(), proposal_id.to_string());
                if !proposals_seen.insert(key) {
                    set_aside.push(entry);
                    continue;
                }
            }

            if entry.tx.is_validator_ticket() {
                if val_tickets >= self.mempool.cfg.max_val_tickets_per_block {
                    set_aside.push(entry);
                    continue;
                }
                val_tickets += 1;
            }

            let bytes = match entry.tx.to_bytes() {
                Ok(b) => b,
                Err(e) => {
                    // A pooled transaction that stops encoding is corrupt
                    // state, not a recoverable input.
                    panic!("pooled transaction failed to encode: {}", e);
                }
            };

            if max_bytes >= 0 && total + bytes.len() as u64 > max_bytes as u64 {
                self.inner.pool.reinsert_entry(entry);
                break;
            }

            total += bytes.len() as u64;
            batch.push(bytes);
        }

        for entry in set_aside {
            self.inner.pool.reinsert_entry(entry);
        }

        gitmesh_telemetry::mempool_metrics().inc_txs_reaped(batch.len() as u64);
        debug!(target: "mempool", reaped = batch.len(), bytes = total, "reaped block batch");
        batch
    }

    /// Removes each committed transaction from the pool, emits lifecycle
    /// events, and rechecks the remainder against post-commit state.
    ///
    /// Transactions whose response code is [`CODE_OK`] additionally emit
    /// `TxCommitted`; every committed transaction emits `TxRemoved`.
    pub fn update(
        &mut self,
        height: u64,
        committed: &[Vec<u8>],
        responses: &[u32],
    ) -> Result<(), MempoolError> {
        for (i, bytes) in committed.iter().enumerate() {
            let tx = Transaction::from_bytes(bytes).map_err(|e| match e {
                TxError::UnknownType(code) => MempoolError::Tx(TxError::UnknownType(code)),
                other => MempoolError::Tx(other),
            })?;
            let hash = tx.hash()?;
            let note_id = tx.push_note_id();

            self.inner.pool.remove_by_hash(&hash);
            self.inner.seen.put(hash, ());

            if responses.get(i).copied() == Some(CODE_OK) {
                self.mempool.emit(NodeEvent::TxCommitted {
                    hash,
                    height,
                    note_id,
                });
            }
            self.mempool.emit(NodeEvent::TxRemoved {
                hash,
                height,
                note_id,
            });
        }

        self.recheck_txs(height);
        let metrics = gitmesh_telemetry::mempool_metrics();
        metrics.set_pool_size(self.inner.pool.len() as f64);
        metrics.set_pool_byte_size(self.inner.pool.byte_size() as f64);
        Ok(())
    }

    /// Re-runs the validator over every pooled transaction against the
    /// post-commit chain state, removing any that no longer pass.
    fn recheck_txs(&mut self, height: u64) {
        let stale: Vec<(TxHash, Option<gitmesh_types::Hash32>)> = self
            .inner
            .pool
            .iter_txs()
            .filter_map(|tx| {
                let failed = self
                    .mempool
                    .validator
                    .validate_tx(tx, ValidateOptions { allow_nonce_gap: true })
                    .is_err();
                if failed {
                    Some((tx.hash().ok()?, tx.push_note_id()))
                } else {
                    None
                }
            })
            .collect();

        for (hash, note_id) in stale {
            debug!(target: "mempool", tx = %hex::encode(hash), "recheck evicted transaction");
            self.inner.pool.remove_by_hash(&hash);
            self.mempool.emit(NodeEvent::TxRemoved {
                hash,
                height,
                note_id,
            });
        }
    }

    /// Number of pooled transactions.
    pub fn len(&self) -> usize {
        self.inner.pool.len()
    }

    /// Returns true when the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.pool.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitmesh_test_utils::keepers::MockAccounts;
    use gitmesh_test_utils::tx_factory::{
        coin_transfer, coin_transfer_from, proposal_register_push_key, validator_ticket,
    };
    use gitmesh_test_utils::validate::{AcceptAll, RejectNonce};

    fn mempool_with(
        cfg: MempoolConfig,
        validator: Arc<dyn TxValidator>,
    ) -> (Mempool, broadcast::Receiver<NodeEvent>) {
        let (tx_events, rx_events) = broadcast::channel(64);
        let accounts = Arc::new(MockAccounts::default());
        (
            Mempool::new(cfg, validator, accounts, tx_events),
            rx_events,
        )
    }

    fn default_mempool() -> (Mempool, broadcast::Receiver<NodeEvent>) {
        mempool_with(MempoolConfig::default(), Arc::new(AcceptAll))
    }

    #[test]
    fn reap_honors_byte_budget_and_nonce_order() {
        let (mp, _rx) = default_mempool();
        let tx1 = coin_transfer(1, "0.1");
        let tx2 = coin_transfer(2, "0.2");
        let size1 = tx1.to_bytes().unwrap().len() as i64;
        let size2 = tx2.to_bytes().unwrap().len() as i64;

        mp.add(tx1.clone()).unwrap();
        mp.add(tx2.clone()).unwrap();

        let batch = mp.reap_max_bytes(size1);
        assert_eq!(batch, vec![tx1.to_bytes().unwrap()]);

        // Reaping consumed tx1; replay both into a fresh pool for the
        // unconstrained case.
        let (mp, _rx) = default_mempool();
        mp.add(tx1.clone()).unwrap();
        mp.add(tx2.clone()).unwrap();
        let batch = mp.reap_max_bytes(size1 + size2);
        assert_eq!(
            batch,
            vec![tx1.to_bytes().unwrap(), tx2.to_bytes().unwrap()]
        );
    }

    #[test]
    fn validator_ticket_cap_sets_later_nonce_aside() {
        let (mp, _rx) = default_mempool();
        mp.add(coin_transfer(1, "0.1")).unwrap();
        mp.add(validator_ticket(2, "0.2")).unwrap();
        mp.add(validator_ticket(3, "0.3")).unwrap();

        let batch = mp.reap_max_bytes(-1);
        assert_eq!(batch.len(), 2);

        let decoded: Vec<Transaction> = batch
            .iter()
            .map(|b| Transaction::from_bytes(b).unwrap())
            .collect();
        assert_eq!(
            decoded.iter().filter(|t| t.is_validator_ticket()).count(),
            1
        );

        // The pool retains exactly the later-nonce ticket.
        assert_eq!(mp.len(), 1);
        let guard = mp.lock();
        let remaining: Vec<_> = guard.inner.pool.iter_txs().cloned().collect();
        assert!(remaining[0].is_validator_ticket());
        assert_eq!(remaining[0].common().nonce, 3);
    }

    #[test]
    fn duplicate_proposals_are_unique_per_batch() {
        let (mp, _rx) = default_mempool();
        mp.add(proposal_register_push_key(1, "repo1", "1", "0.4"))
            .unwrap();
        mp.add(proposal_register_push_key(2, "repo1", "1", "0.2"))
            .unwrap();
        mp.add(coin_transfer_from(9, 1, "0.1")).unwrap();

        let batch = mp.reap_max_bytes(-1);
        let decoded: Vec<Transaction> = batch
            .iter()
            .map(|b| Transaction::from_bytes(b).unwrap())
            .collect();
        assert_eq!(decoded.len(), 2);
        assert_eq!(
            decoded
                .iter()
                .filter(|t| t.proposal_key() == Some(("repo1", "1")))
                .count(),
            1
        );
        // The second proposal stays pooled for the next block.
        assert_eq!(mp.len(), 1);
    }

    #[test]
    fn rejected_bytes_are_remembered_as_duplicates() {
        let validator = RejectNonce::new(1);
        let (mp, mut rx) = mempool_with(MempoolConfig::default(), validator);

        let tx = coin_transfer(1, "0.1");
        let err = mp.add(tx.clone()).unwrap_err();
        assert!(matches!(err, MempoolError::ValidationFailed(_)));
        match rx.try_recv().unwrap() {
            NodeEvent::TxRejected { hash, .. } => assert_eq!(hash, tx.hash().unwrap()),
            other => panic!("unexpected event: {:?}", other),
        }

        let err = mp.add(tx.clone()).unwrap_err();
        assert!(matches!(
            err,
            MempoolError::Pool(PoolError::DuplicateTransaction)
        ));
        match rx.try_recv().unwrap() {
            NodeEvent::TxRejected { code, .. } => assert_eq!(code, "POOL_DUPLICATE_TX"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn nonce_gap_cache_counts_and_promotes() {
        let (mp, _rx) = default_mempool();
        mp.add(coin_transfer(2, "0.1")).unwrap();
        assert_eq!(mp.len(), 0);
        assert_eq!(mp.cache_len(), 1);

        mp.add(coin_transfer(1, "0.1")).unwrap();
        assert_eq!(mp.len(), 2);
        assert_eq!(mp.cache_len(), 0);
    }

    #[test]
    fn update_removes_committed_and_emits_events() {
        let (mp, mut rx) = default_mempool();
        let tx1 = coin_transfer(1, "0.1");
        let tx2 = coin_transfer(2, "0.2");
        mp.add(tx1.clone()).unwrap();
        mp.add(tx2.clone()).unwrap();
        // Drain admission events.
        while rx.try_recv().is_ok() {}

        mp.update(7, &[tx1.to_bytes().unwrap()], &[0]).unwrap();
        assert!(!mp.has(&tx1.hash().unwrap()));
        assert!(mp.has(&tx2.hash().unwrap()));

        match rx.try_recv().unwrap() {
            NodeEvent::TxCommitted { hash, height, .. } => {
                assert_eq!(hash, tx1.hash().unwrap());
                assert_eq!(height, 7);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match rx.try_recv().unwrap() {
            NodeEvent::TxRemoved { hash, .. } => assert_eq!(hash, tx1.hash().unwrap()),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn update_rejects_unknown_type_codes() {
        let (mp, _rx) = default_mempool();
        let err = mp.update(1, &[vec![99, 1, 2, 3]], &[0]).unwrap_err();
        assert!(matches!(err, MempoolError::Tx(TxError::UnknownType(99))));
    }

    #[test]
    fn recheck_evicts_newly_invalid_transactions() {
        // The validator starts accepting everything, then rejects nonce 1
        // after the "commit", simulating a consumed account nonce.
        let validator = RejectNonce::inactive(1);
        let (mp, _rx) = mempool_with(MempoolConfig::default(), validator.clone());

        let tx1 = coin_transfer(1, "0.1");
        let tx2 = coin_transfer(2, "0.2");
        mp.add(tx1.clone()).unwrap();
        mp.add(tx2.clone()).unwrap();

        validator.activate();
        mp.update(1, &[], &[]).unwrap();
        assert!(!mp.has(&tx1.hash().unwrap()));
        assert!(mp.has(&tx2.hash().unwrap()));
    }

    #[test]
    fn capacity_checks_reject_oversized_and_overflow() {
        let cfg = MempoolConfig {
            max_tx_size: 8,
            ..MempoolConfig::default()
        };
        let (mp, _rx) = mempool_with(cfg, Arc::new(AcceptAll));
        let err = mp.add(coin_transfer(1, "0.1")).unwrap_err();
        assert!(matches!(
            err,
            MempoolError::Pool(PoolError::TxTooLarge { .. })
        ));
    }

    #[test]
    fn guard_serializes_update_with_admission() {
        let (mp, _rx) = default_mempool();
        let mut guard = mp.lock();
        guard.add(coin_transfer(1, "0.1")).unwrap();
        guard.update(1, &[], &[]).unwrap();
        assert_eq!(guard.len(), 1);
        drop(guard);
        assert_eq!(mp.len(), 1);
    }
}
