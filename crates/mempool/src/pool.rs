// Path: crates/mempool/src/pool.rs

//! The ordered container of accepted transactions.
//!
//! Entries are priced by fee rate (fee per economic byte) and kept in a
//! deterministic order: across senders, descending fee rate with insertion
//! order breaking ties; within a sender, strictly ascending nonce inside the
//! slots the fee pricing assigned to that sender. Reaping consumes entries
//! from the head.

use crate::cache::NonceGapCache;
use gitmesh_types::error::PoolError;
use gitmesh_types::tx::Transaction;
use gitmesh_types::{Address, TxHash};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Where an accepted transaction landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The transaction entered the ordered container.
    Pooled,
    /// The transaction was parked in the nonce-gap cache.
    Cached,
}

/// A pool entry together with its pricing metadata.
#[derive(Debug, Clone)]
pub(crate) struct PoolEntry {
    pub(crate) tx: Arc<Transaction>,
    pub(crate) hash: TxHash,
    pub(crate) sender: Address,
    pub(crate) nonce: u64,
    pub(crate) fee: Decimal,
    pub(crate) fee_rate: Decimal,
    pub(crate) economic_size: u64,
    pub(crate) seq: u64,
}

#[derive(Debug, Clone)]
struct NonceRecord {
    hash: TxHash,
    fee: Decimal,
}

/// Thread safety is provided by the owning [`crate::Mempool`]'s mutex; the
/// container itself is single-threaded.
#[derive(Debug)]
pub struct PricedPool {
    entries: Vec<PoolEntry>,
    index: HashMap<TxHash, usize>,
    nonce_index: HashMap<Address, BTreeMap<u64, NonceRecord>>,
    byte_size: u64,
    next_seq: u64,
    capacity: usize,
    sender_limit: usize,
}

impl PricedPool {
    /// Creates an empty pool with an entry cap and a per-sender cap.
    pub fn new(capacity: usize, sender_limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            nonce_index: HashMap::new(),
            byte_size: 0,
            next_seq: 0,
            capacity,
            sender_limit,
        }
    }

    fn entry_from_tx(&mut self, tx: Arc<Transaction>) -> PoolEntry {
        // All inputs were structurally validated before reaching the pool;
        // a canonical-encoding failure here is irrecoverable corruption.
        let hash = tx.hash().unwrap_or_else(|e| panic!("encoder corruption: {}", e));
        let sender = tx
            .sender_address()
            .unwrap_or_else(|e| panic!("encoder corruption: {}", e));
        let fee = tx
            .common()
            .fee
            .decimal()
            .unwrap_or_else(|e| panic!("unvalidated fee reached the pool: {}", e));
        let fee_rate = tx
            .fee_rate()
            .unwrap_or_else(|e| panic!("encoder corruption: {}", e));
        let economic_size = tx
            .economic_size()
            .unwrap_or_else(|e| panic!("encoder corruption: {}", e));
        let seq = self.next_seq;
        self.next_seq += 1;
        PoolEntry {
            nonce: tx.common().nonce,
            tx,
            hash,
            sender,
            fee,
            fee_rate,
            economic_size,
            seq,
        }
    }

    /// Adds a transaction, routing future-nonce transactions to the cache.
    ///
    /// `account_nonce` is the sender's current on-chain nonce at admission
    /// time. On success the cache is scanned for newly satisfiable entries
    /// and those are promoted.
    pub fn add(
        &mut self,
        tx: Arc<Transaction>,
        account_nonce: u64,
        cache: &mut NonceGapCache,
    ) -> Result<AddOutcome, PoolError> {
        let entry = self.entry_from_tx(tx);

        if entry.nonce <= account_nonce {
            return Err(PoolError::NonceBelowAccount {
                account_nonce,
                got: entry.nonce,
            });
        }

        // Replace-by-fee: the sender's nonce is already priced in. The
        // replacement takes the old entry's place directly; gap routing and
        // capacity do not apply since the occupancy is unchanged.
        if let Some(existing) = self
            .nonce_index
            .get(&entry.sender)
            .and_then(|m| m.get(&entry.nonce))
        {
            if entry.fee <= existing.fee {
                return Err(PoolError::ReplaceByFeeTooLow {
                    current: gitmesh_types::tx::TokenAmount::new(existing.fee.to_string()),
                    offered: gitmesh_types::tx::TokenAmount::new(entry.fee.to_string()),
                });
            }
            let old = existing.hash;
            self.remove_by_hash(&old);
            self.insert_entry(entry);
            return Ok(AddOutcome::Pooled);
        }

        let pending = self.len_by_sender(&entry.sender) + cache.len_by_sender(&entry.sender);
        if pending >= self.sender_limit {
            return Err(PoolError::SenderLimitReached {
                sender: entry.sender.clone(),
                limit: self.sender_limit,
            });
        }

        let has_predecessor = self
            .nonce_index
            .get(&entry.sender)
            .map(|m| m.contains_key(&(entry.nonce - 1)))
            .unwrap_or(false);
        if entry.nonce - account_nonce > 1 && !has_predecessor {
            cache.add(entry.sender.clone(), entry.nonce, entry.tx.clone())?;
            return Ok(AddOutcome::Cached);
        }

        if self.entries.len() >= self.capacity {
            return Err(PoolError::ContainerFull);
        }

        let sender = entry.sender.clone();
        let mut next_nonce = entry.nonce + 1;
        self.insert_entry(entry);

        // Promote cached successors now that their predecessor is present.
        while self.entries.len() < self.capacity {
            match cache.take(&sender, next_nonce) {
                Some(tx) => {
                    let promoted = self.entry_from_tx(tx);
                    self.insert_entry(promoted);
                    next_nonce += 1;
                }
                None => break,
            }
        }

        Ok(AddOutcome::Pooled)
    }

    fn insert_entry(&mut self, entry: PoolEntry) {
        self.byte_size += entry.economic_size;
        self.nonce_index
            .entry(entry.sender.clone())
            .or_default()
            .insert(
                entry.nonce,
                NonceRecord {
                    hash: entry.hash,
                    fee: entry.fee,
                },
            );
        self.entries.push(entry);
        self.resort();
    }

    /// Re-inserts an entry previously popped by reaping, preserving its
    /// original insertion sequence so its sender/nonce position is restored.
    pub(crate) fn reinsert_entry(&mut self, entry: PoolEntry) {
        self.insert_entry(entry);
    }

    /// Pops the highest-priority entry with its metadata.
    pub(crate) fn pop_head_entry(&mut self) -> Option<PoolEntry> {
        if self.entries.is_empty() {
            return None;
        }
        let entry = self.entries.remove(0);
        self.detach(&entry);
        self.rebuild_index();
        Some(entry)
    }

    fn detach(&mut self, entry: &PoolEntry) {
        self.byte_size -= entry.economic_size;
        if let Some(by_nonce) = self.nonce_index.get_mut(&entry.sender) {
            // The record may already describe a replacement at this nonce;
            // only drop it while it still points at the detached entry.
            if by_nonce.get(&entry.nonce).map(|r| r.hash) == Some(entry.hash) {
                by_nonce.remove(&entry.nonce);
            }
            if by_nonce.is_empty() {
                self.nonce_index.remove(&entry.sender);
            }
        }
    }

    /// Removes transactions by value. Idempotent.
    pub fn remove(&mut self, txs: &[Transaction]) {
        for tx in txs {
            if let Ok(hash) = tx.hash() {
                self.remove_by_hash(&hash);
            }
        }
    }

    /// Removes a single transaction by hash. Idempotent.
    pub fn remove_by_hash(&mut self, hash: &TxHash) {
        let Some(&pos) = self.index.get(hash) else {
            return;
        };
        let entry = self.entries.remove(pos);
        self.detach(&entry);
        self.rebuild_index();
    }

    /// Pops the highest-priority transaction.
    pub fn head(&mut self) -> Option<Arc<Transaction>> {
        self.pop_head_entry().map(|e| e.tx)
    }

    /// Pops the lowest-priority transaction.
    pub fn last(&mut self) -> Option<Arc<Transaction>> {
        if self.entries.is_empty() {
            return None;
        }
        let entry = self.entries.pop().unwrap_or_else(|| unreachable!());
        self.detach(&entry);
        self.rebuild_index();
        Some(entry.tx)
    }

    /// Returns true if the pool holds the hash.
    pub fn has(&self, hash: &TxHash) -> bool {
        self.index.contains_key(hash)
    }

    /// Looks up a transaction by hash.
    pub fn get(&self, hash: &TxHash) -> Option<Arc<Transaction>> {
        self.index.get(hash).map(|&pos| self.entries[pos].tx.clone())
    }

    /// Returns the computed fee rate of a pooled transaction.
    pub fn fee_rate(&self, hash: &TxHash) -> Option<Decimal> {
        self.index.get(hash).map(|&pos| self.entries[pos].fee_rate)
    }

    /// Number of pooled transactions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Aggregate economic size of pooled transactions in bytes.
    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    /// Number of pooled transactions for one sender.
    pub fn len_by_sender(&self, sender: &Address) -> usize {
        self.nonce_index.get(sender).map(|m| m.len()).unwrap_or(0)
    }

    /// Drops every entry.
    pub fn flush(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.nonce_index.clear();
        self.byte_size = 0;
    }

    /// Returns the pooled transactions matching a predicate, in pool order.
    pub fn find(&self, predicate: impl Fn(&Transaction) -> bool) -> Vec<Arc<Transaction>> {
        self.entries
            .iter()
            .filter(|e| predicate(&e.tx))
            .map(|e| e.tx.clone())
            .collect()
    }

    /// Transactions in pool order, for the post-commit recheck walk.
    pub fn iter_txs(&self) -> impl Iterator<Item = &Arc<Transaction>> {
        self.entries.iter().map(|e| &e.tx)
    }

    fn resort(&mut self) {
        self.entries
            .sort_by(|a, b| b.fee_rate.cmp(&a.fee_rate).then(a.seq.cmp(&b.seq)));
        self.normalize_sender_order();
        self.rebuild_index();
    }

    // Within the slots fee pricing gave each sender, order that sender's
    // entries by ascending nonce (ties: higher fee rate first, a transient
    // state replace-by-fee eliminates).
    fn normalize_sender_order(&mut self) {
        let mut groups: HashMap<Address, Vec<usize>> = HashMap::new();
        for (i, e) in self.entries.iter().enumerate() {
            groups.entry(e.sender.clone()).or_default().push(i);
        }
        for (_, positions) in groups {
            if positions.len() < 2 {
                continue;
            }
            let mut sub: Vec<PoolEntry> =
                positions.iter().map(|&i| self.entries[i].clone()).collect();
            sub.sort_by(|a, b| {
                a.nonce
                    .cmp(&b.nonce)
                    .then(b.fee_rate.cmp(&a.fee_rate))
                    .then(a.seq.cmp(&b.seq))
            });
            for (&i, e) in positions.iter().zip(sub) {
                self.entries[i] = e;
            }
        }
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (i, e) in self.entries.iter().enumerate() {
            self.index.insert(e.hash, i);
        }
        debug_assert_eq!(self.index.len(), self.entries.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitmesh_test_utils::tx_factory::{coin_transfer, coin_transfer_from};

    fn pool() -> (PricedPool, NonceGapCache) {
        (PricedPool::new(100, 10), NonceGapCache::new())
    }

    fn add(
        pool: &mut PricedPool,
        cache: &mut NonceGapCache,
        tx: Transaction,
        account_nonce: u64,
    ) -> Result<AddOutcome, PoolError> {
        pool.add(Arc::new(tx), account_nonce, cache)
    }

    #[test]
    fn same_sender_orders_by_nonce_not_fee() {
        let (mut pool, mut cache) = pool();
        let tx1 = coin_transfer(1, "0.1");
        let tx2 = coin_transfer(2, "0.9");
        add(&mut pool, &mut cache, tx2.clone(), 0).unwrap();
        add(&mut pool, &mut cache, tx1.clone(), 0).unwrap();

        assert_eq!(pool.head().unwrap().common().nonce, 1);
        assert_eq!(pool.head().unwrap().common().nonce, 2);
        assert!(pool.is_empty());
    }

    #[test]
    fn cross_sender_orders_by_fee_rate() {
        let (mut pool, mut cache) = pool();
        let cheap = coin_transfer_from(1, 1, "0.1");
        let dear = coin_transfer_from(2, 1, "0.5");
        add(&mut pool, &mut cache, cheap, 0).unwrap();
        add(&mut pool, &mut cache, dear.clone(), 0).unwrap();

        assert_eq!(pool.head().unwrap().hash().unwrap(), dear.hash().unwrap());
    }

    #[test]
    fn replace_by_fee_requires_strictly_greater_fee() {
        let (mut pool, mut cache) = pool();
        let tx1 = coin_transfer(1, "0.2");
        add(&mut pool, &mut cache, tx1.clone(), 0).unwrap();

        let equal = coin_transfer(1, "0.2");
        assert!(matches!(
            add(&mut pool, &mut cache, equal, 0),
            Err(PoolError::ReplaceByFeeTooLow { .. })
        ));

        let higher = coin_transfer(1, "0.3");
        add(&mut pool, &mut cache, higher.clone(), 0).unwrap();
        assert!(!pool.has(&tx1.hash().unwrap()));
        assert!(pool.has(&higher.hash().unwrap()));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn nonce_below_account_is_rejected() {
        let (mut pool, mut cache) = pool();
        let tx = coin_transfer(3, "0.1");
        assert!(matches!(
            add(&mut pool, &mut cache, tx, 3),
            Err(PoolError::NonceBelowAccount {
                account_nonce: 3,
                got: 3
            })
        ));
    }

    #[test]
    fn nonce_gap_routes_to_cache_and_promotes() {
        let (mut pool, mut cache) = pool();
        let future = coin_transfer(3, "0.1");
        let outcome = add(&mut pool, &mut cache, future, 1).unwrap();
        assert_eq!(outcome, AddOutcome::Cached);
        assert_eq!(pool.len(), 0);
        assert_eq!(cache.len(), 1);

        let bridge = coin_transfer(2, "0.1");
        let outcome = add(&mut pool, &mut cache, bridge, 1).unwrap();
        assert_eq!(outcome, AddOutcome::Pooled);
        assert_eq!(pool.len(), 2);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn gap_with_pooled_predecessor_is_accepted_directly() {
        let (mut pool, mut cache) = pool();
        add(&mut pool, &mut cache, coin_transfer(2, "0.1"), 1).unwrap();
        let outcome = add(&mut pool, &mut cache, coin_transfer(3, "0.1"), 1).unwrap();
        assert_eq!(outcome, AddOutcome::Pooled);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn sender_limit_counts_pool_and_cache() {
        let mut pool = PricedPool::new(100, 2);
        let mut cache = NonceGapCache::new();
        pool.add(Arc::new(coin_transfer(1, "0.1")), 0, &mut cache)
            .unwrap();
        pool.add(Arc::new(coin_transfer(5, "0.1")), 0, &mut cache)
            .unwrap();
        assert_eq!(cache.len(), 1);

        let err = pool
            .add(Arc::new(coin_transfer(2, "0.1")), 0, &mut cache)
            .unwrap_err();
        assert!(matches!(err, PoolError::SenderLimitReached { .. }));
    }

    #[test]
    fn byte_size_tracks_economic_sizes() {
        let (mut pool, mut cache) = pool();
        let tx1 = coin_transfer(1, "0.1");
        let tx2 = coin_transfer(2, "0.2");
        let expected = tx1.economic_size().unwrap() + tx2.economic_size().unwrap();
        add(&mut pool, &mut cache, tx1.clone(), 0).unwrap();
        add(&mut pool, &mut cache, tx2, 0).unwrap();
        assert_eq!(pool.byte_size(), expected);

        pool.remove(&[tx1.clone()]);
        pool.remove(&[tx1]); // idempotent
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn has_reflects_add_and_remove() {
        let (mut pool, mut cache) = pool();
        let tx = coin_transfer(1, "0.1");
        let hash = tx.hash().unwrap();
        add(&mut pool, &mut cache, tx.clone(), 0).unwrap();
        assert!(pool.has(&hash));
        assert!(pool.fee_rate(&hash).is_some());

        pool.remove(&[tx]);
        assert!(!pool.has(&hash));
        assert!(pool.get(&hash).is_none());
    }

    #[test]
    fn container_full_is_reported() {
        let mut pool = PricedPool::new(1, 10);
        let mut cache = NonceGapCache::new();
        pool.add(Arc::new(coin_transfer_from(1, 1, "0.1")), 0, &mut cache)
            .unwrap();
        let err = pool
            .add(Arc::new(coin_transfer_from(2, 1, "0.1")), 0, &mut cache)
            .unwrap_err();
        assert!(matches!(err, PoolError::ContainerFull));
    }

    #[test]
    fn sender_subsequence_is_nonce_increasing() {
        let (mut pool, mut cache) = pool();
        // Interleave two senders with deliberately inverted fee ordering.
        add(&mut pool, &mut cache, coin_transfer_from(1, 2, "0.9"), 0).unwrap();
        add(&mut pool, &mut cache, coin_transfer_from(2, 1, "0.4"), 0).unwrap();
        add(&mut pool, &mut cache, coin_transfer_from(1, 1, "0.1"), 0).unwrap();
        add(&mut pool, &mut cache, coin_transfer_from(2, 2, "0.7"), 0).unwrap();

        let mut seen: HashMap<Address, u64> = HashMap::new();
        for tx in pool.iter_txs() {
            let sender = tx.sender_address().unwrap();
            let nonce = tx.common().nonce;
            if let Some(prev) = seen.get(&sender) {
                assert!(nonce > *prev, "sender subsequence must increase by nonce");
            }
            seen.insert(sender, nonce);
        }
    }
}
