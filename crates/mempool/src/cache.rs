// Path: crates/mempool/src/cache.rs

//! The nonce-gap cache for future-nonce transactions.
//!
//! Parks transactions whose nonce is strictly greater than `account_nonce + 1`
//! while no predecessor is present in the pool. Keyed by `(sender, nonce)`;
//! a colliding insert is rejected; replace-by-fee applies only inside the
//! pool proper.

use gitmesh_types::error::PoolError;
use gitmesh_types::tx::Transaction;
use gitmesh_types::Address;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Holding area for transactions waiting on a nonce gap to close.
#[derive(Debug, Default)]
pub struct NonceGapCache {
    entries: HashMap<Address, BTreeMap<u64, Arc<Transaction>>>,
    count: usize,
}

impl NonceGapCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks a transaction under `(sender, nonce)`.
    pub fn add(
        &mut self,
        sender: Address,
        nonce: u64,
        tx: Arc<Transaction>,
    ) -> Result<(), PoolError> {
        let by_nonce = self.entries.entry(sender).or_default();
        if by_nonce.contains_key(&nonce) {
            return Err(PoolError::CacheKeyExists);
        }
        by_nonce.insert(nonce, tx);
        self.count += 1;
        Ok(())
    }

    /// Total number of cached transactions.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true when nothing is parked.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of cached transactions for one sender.
    pub fn len_by_sender(&self, sender: &Address) -> usize {
        self.entries.get(sender).map(|m| m.len()).unwrap_or(0)
    }

    /// Peeks at a cached transaction without removing it.
    pub fn get(&self, sender: &Address, nonce: u64) -> Option<&Arc<Transaction>> {
        self.entries.get(sender).and_then(|m| m.get(&nonce))
    }

    /// Removes and returns the entry at `(sender, nonce)`, if present. Used
    /// by the pool's promotion scan after each successful admission.
    pub fn take(&mut self, sender: &Address, nonce: u64) -> Option<Arc<Transaction>> {
        let by_nonce = self.entries.get_mut(sender)?;
        let tx = by_nonce.remove(&nonce)?;
        if by_nonce.is_empty() {
            self.entries.remove(sender);
        }
        self.count -= 1;
        Some(tx)
    }

    /// Drops every cached entry.
    pub fn flush(&mut self) {
        self.entries.clear();
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitmesh_test_utils::tx_factory::coin_transfer;

    fn sender() -> Address {
        Address("gmSender1".into())
    }

    #[test]
    fn rejects_colliding_keys() {
        let mut cache = NonceGapCache::new();
        let tx = Arc::new(coin_transfer(5, "0.1"));
        cache.add(sender(), 5, tx.clone()).unwrap();
        let err = cache.add(sender(), 5, tx).unwrap_err();
        assert!(matches!(err, PoolError::CacheKeyExists));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn take_removes_and_counts() {
        let mut cache = NonceGapCache::new();
        cache.add(sender(), 3, Arc::new(coin_transfer(3, "0.1"))).unwrap();
        cache.add(sender(), 4, Arc::new(coin_transfer(4, "0.1"))).unwrap();
        assert_eq!(cache.len_by_sender(&sender()), 2);

        assert!(cache.take(&sender(), 3).is_some());
        assert!(cache.take(&sender(), 3).is_none());
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&sender(), 4).is_some());
    }
}
