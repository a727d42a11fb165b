//! Shared and pending pool layers.

use crate::{MempoolError, MempoolResult, TxIndexes};
use lattice_state::WorldState;
use lattice_types::{AssetOutputRef, LockupScript, Transaction, TxHash, TxOutput};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// A pooled transaction with its admission timestamp.
#[derive(Debug, Clone)]
pub struct PoolEntry {
    pub tx: Transaction,
    pub timestamp: u64,
}

/// Pool internals: entries, FIFO order and indexes, mutated together
/// under one writer lock.
#[derive(Default)]
struct PoolInner {
    entries: HashMap<TxHash, PoolEntry>,
    /// Admission order, oldest first.
    fifo: BTreeSet<(u64, TxHash)>,
    indexes: TxIndexes,
}

impl PoolInner {
    fn insert(&mut self, tx: Transaction, timestamp: u64) {
        let hash = tx.hash();
        self.indexes.add(&tx);
        self.fifo.insert((timestamp, hash));
        self.entries.insert(hash, PoolEntry { tx, timestamp });
    }

    fn take(&mut self, hash: &TxHash) -> Option<PoolEntry> {
        let entry = self.entries.remove(hash)?;
        self.fifo.remove(&(entry.timestamp, *hash));
        self.indexes.remove(&entry.tx);
        Some(entry)
    }

    fn oldest(&self) -> Option<TxHash> {
        self.fifo.iter().next().map(|(_, hash)| *hash)
    }

    fn admit(&mut self, tx: &Transaction) -> MempoolResult<()> {
        let hash = tx.hash();
        if self.entries.contains_key(&hash) {
            return Err(MempoolError::AlreadyKnown(hash));
        }
        if let Some(output_ref) = self.indexes.double_spends(tx) {
            return Err(MempoolError::DoubleSpend(output_ref));
        }
        Ok(())
    }
}

/// Admission pool: bounded FIFO, oldest evicted to make room.
pub struct SharedPool {
    capacity: usize,
    inner: RwLock<PoolInner>,
}

impl SharedPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: RwLock::new(PoolInner::default()),
        }
    }

    /// Admit a transaction, evicting the oldest entries on overflow.
    pub fn try_add(&self, tx: Transaction, timestamp: u64) -> MempoolResult<()> {
        let mut inner = self.inner.write();
        inner.admit(&tx)?;
        while inner.entries.len() >= self.capacity {
            let oldest = inner.oldest().expect("non-empty pool above capacity");
            inner.take(&oldest);
            debug!(tx = %oldest, "evicted oldest shared-pool entry");
        }
        inner.insert(tx, timestamp);
        Ok(())
    }

    /// `true` when the transaction was admitted.
    pub fn add(&self, tx: Transaction, timestamp: u64) -> bool {
        self.try_add(tx, timestamp).is_ok()
    }

    pub fn remove(&self, hash: &TxHash) -> Option<Transaction> {
        self.inner.write().take(hash).map(|entry| entry.tx)
    }

    pub fn contains(&self, hash: &TxHash) -> bool {
        self.inner.read().entries.contains_key(hash)
    }

    pub fn is_double_spending(&self, tx: &Transaction) -> bool {
        self.inner.read().indexes.double_spends(tx).is_some()
    }

    pub fn is_spent(&self, output_ref: &AssetOutputRef) -> bool {
        self.inner.read().indexes.is_spent(output_ref)
    }

    pub fn get_utxo(&self, output_ref: &AssetOutputRef) -> MempoolResult<Option<TxOutput>> {
        self.inner.read().indexes.get_utxo(output_ref)
    }

    pub fn relevant_utxos(&self, lockup: &LockupScript) -> Vec<(AssetOutputRef, TxOutput)> {
        self.inner.read().indexes.relevant_utxos(lockup)
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain the transactions whose inputs all resolve against `world`,
    /// admission order, for promotion to the pending layer.
    pub fn take_ready(&self, world: &WorldState) -> Vec<PoolEntry> {
        let mut inner = self.inner.write();
        let ready: Vec<TxHash> = inner
            .fifo
            .iter()
            .filter(|(_, hash)| {
                inner
                    .entries
                    .get(hash)
                    .map(|entry| world.contains_all_inputs(&entry.tx))
                    .unwrap_or(false)
            })
            .map(|(_, hash)| *hash)
            .collect();
        ready
            .iter()
            .filter_map(|hash| inner.take(hash))
            .collect()
    }
}

/// Ready pool: members resolve fully against the persisted world state.
/// Overflow is reported to the caller instead of evicting.
pub struct PendingPool {
    capacity: usize,
    inner: RwLock<PoolInner>,
}

impl PendingPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: RwLock::new(PoolInner::default()),
        }
    }

    /// Admit a ready transaction. Fails with `PoolFull` at capacity; the
    /// caller retries later or drops the transaction.
    pub fn try_add(&self, tx: Transaction, timestamp: u64) -> MempoolResult<()> {
        let mut inner = self.inner.write();
        inner.admit(&tx)?;
        if inner.entries.len() >= self.capacity {
            return Err(MempoolError::PoolFull(self.capacity));
        }
        inner.insert(tx, timestamp);
        Ok(())
    }

    /// `true` when the transaction was admitted.
    pub fn add(&self, tx: Transaction, timestamp: u64) -> bool {
        self.try_add(tx, timestamp).is_ok()
    }

    pub fn remove(&self, hash: &TxHash) -> Option<Transaction> {
        self.inner.write().take(hash).map(|entry| entry.tx)
    }

    pub fn contains(&self, hash: &TxHash) -> bool {
        self.inner.read().entries.contains_key(hash)
    }

    pub fn is_double_spending(&self, tx: &Transaction) -> bool {
        self.inner.read().indexes.double_spends(tx).is_some()
    }

    pub fn is_spent(&self, output_ref: &AssetOutputRef) -> bool {
        self.inner.read().indexes.is_spent(output_ref)
    }

    pub fn relevant_utxos(&self, lockup: &LockupScript) -> Vec<(AssetOutputRef, TxOutput)> {
        self.inner.read().indexes.relevant_utxos(lockup)
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Up to `limit` transactions still fully resolving against `world`,
    /// admission order. Entries stay pooled; they leave on confirmation.
    pub fn extract_ready_txs(&self, world: &WorldState, limit: usize) -> Vec<Transaction> {
        let inner = self.inner.read();
        inner
            .fifo
            .iter()
            .filter_map(|(_, hash)| inner.entries.get(hash))
            .filter(|entry| world.contains_all_inputs(&entry.tx))
            .take(limit)
            .map(|entry| entry.tx.clone())
            .collect()
    }

    /// Remove and return the entries admitted before `threshold`,
    /// ascending timestamp order.
    pub fn take_old_txs(&self, threshold: u64) -> Vec<PoolEntry> {
        let mut inner = self.inner.write();
        let old: Vec<TxHash> = inner
            .fifo
            .range(..(threshold, TxHash::ZERO))
            .map(|(_, hash)| *hash)
            .collect();
        old.iter().filter_map(|hash| inner.take(hash)).collect()
    }

    /// Remove and return the entries whose inputs no longer resolve
    /// against `world`.
    pub fn take_invalid(&self, world: &WorldState) -> Vec<PoolEntry> {
        let mut inner = self.inner.write();
        let invalid: Vec<TxHash> = inner
            .fifo
            .iter()
            .filter(|(_, hash)| {
                inner
                    .entries
                    .get(hash)
                    .map(|entry| !world.contains_all_inputs(&entry.tx))
                    .unwrap_or(true)
            })
            .map(|(_, hash)| *hash)
            .collect();
        invalid
            .iter()
            .filter_map(|hash| inner.take(hash))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_types::UnsignedTransaction;

    fn tx(seed: u8, inputs: Vec<AssetOutputRef>) -> Transaction {
        Transaction {
            unsigned: UnsignedTransaction {
                inputs,
                fixed_outputs: vec![TxOutput::plain(10, LockupScript([seed; 32]))],
                script: None,
            },
            signatures: Vec::new(),
            generated_outputs: Vec::new(),
        }
    }

    fn r(seed: u8) -> AssetOutputRef {
        AssetOutputRef::new(TxHash::hash(&[seed]), 0)
    }

    // ============ SharedPool ============

    #[test]
    fn test_shared_double_spend_rejected() {
        let pool = SharedPool::new(10);
        assert!(pool.add(tx(1, vec![r(10)]), 1_000));
        let result = pool.try_add(tx(2, vec![r(10)]), 1_001);
        assert!(matches!(result, Err(MempoolError::DoubleSpend(_))));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_shared_duplicate_is_rejected_without_change() {
        let pool = SharedPool::new(10);
        let t = tx(1, vec![r(10)]);
        assert!(pool.add(t.clone(), 1_000));
        assert!(!pool.add(t, 1_001));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_shared_fifo_eviction() {
        let pool = SharedPool::new(2);
        assert!(pool.add(tx(1, vec![r(1)]), 1_000));
        assert!(pool.add(tx(2, vec![r(2)]), 2_000));
        // Overflow evicts the oldest, admission succeeds.
        assert!(pool.add(tx(3, vec![r(3)]), 3_000));
        assert_eq!(pool.len(), 2);
        assert!(!pool.contains(&tx(1, vec![r(1)]).hash()));
        assert!(pool.contains(&tx(3, vec![r(3)]).hash()));
    }

    #[test]
    fn test_shared_remove_frees_inputs() {
        let pool = SharedPool::new(10);
        let t1 = tx(1, vec![r(10)]);
        pool.add(t1.clone(), 1_000);
        assert!(pool.is_spent(&r(10)));

        pool.remove(&t1.hash());
        assert!(!pool.is_spent(&r(10)));
        assert!(pool.add(tx(2, vec![r(10)]), 1_001));
    }

    #[test]
    fn test_shared_take_ready() {
        let pool = SharedPool::new(10);
        // An input-free seed transaction plants an output in the world.
        let seed = tx(9, vec![]);
        let world = WorldState::empty().apply(&seed).unwrap();

        let ready = tx(1, vec![seed.output_ref(0)]);
        let not_ready = tx(2, vec![r(55)]);
        pool.add(ready.clone(), 1_000);
        pool.add(not_ready.clone(), 1_001);

        let taken = pool.take_ready(&world);
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].tx.hash(), ready.hash());
        assert!(pool.contains(&not_ready.hash()));
        assert!(!pool.contains(&ready.hash()));
    }

    // ============ PendingPool ============

    #[test]
    fn test_pending_capacity() {
        let pool = PendingPool::new(2);
        assert!(pool.add(tx(1, vec![r(1)]), 1_000));
        assert!(pool.add(tx(2, vec![r(2)]), 2_000));
        // At capacity the add is refused, nothing is evicted.
        let result = pool.try_add(tx(3, vec![r(3)]), 3_000);
        assert!(matches!(result, Err(MempoolError::PoolFull(2))));
        assert_eq!(pool.len(), 2);

        // Freeing a slot lets the retry in.
        pool.remove(&tx(1, vec![r(1)]).hash());
        assert!(pool.add(tx(3, vec![r(3)]), 3_000));
    }

    #[test]
    fn test_pending_take_old_txs() {
        let pool = PendingPool::new(10);
        pool.add(tx(1, vec![r(1)]), 1_000);
        pool.add(tx(2, vec![r(2)]), 2_000);
        pool.add(tx(3, vec![r(3)]), 3_000);

        let old = pool.take_old_txs(2_500);
        assert_eq!(old.len(), 2);
        // Ascending timestamps.
        assert_eq!(old[0].timestamp, 1_000);
        assert_eq!(old[1].timestamp, 2_000);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_pending_extract_ready_respects_limit() {
        let pool = PendingPool::new(10);
        let seeds: Vec<Transaction> = (0..3).map(|i| tx(50 + i, vec![])).collect();
        let mut world = WorldState::empty();
        for seed in &seeds {
            world = world.apply(seed).unwrap();
        }
        for (i, seed) in seeds.iter().enumerate() {
            pool.add(tx(i as u8, vec![seed.output_ref(0)]), 1_000 + i as u64);
        }

        let ready = pool.extract_ready_txs(&world, 2);
        assert_eq!(ready.len(), 2);
        // Entries stay pooled.
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_pending_take_invalid() {
        let pool = PendingPool::new(10);
        let seed = tx(50, vec![]);
        let world = WorldState::empty().apply(&seed).unwrap();

        let valid = tx(1, vec![seed.output_ref(0)]);
        let stale = tx(2, vec![r(99)]);
        pool.add(valid.clone(), 1_000);
        pool.add(stale.clone(), 1_001);

        let dropped = pool.take_invalid(&world);
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].tx.hash(), stale.hash());
        assert!(pool.contains(&valid.hash()));
    }
}
