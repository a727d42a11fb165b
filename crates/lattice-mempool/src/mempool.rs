//! Per-group mempool facade.

use crate::{MempoolError, MempoolResult, PendingPool, SharedPool};
use lattice_state::WorldState;
use lattice_types::{
    AssetOutputRef, GroupIndex, LockupScript, MetricsSink, Transaction, TxHash, TxOutput,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

fn default_pool_capacity() -> usize {
    1000
}

fn default_tx_max_number_per_block() -> usize {
    1000
}

fn default_clean_frequency_ms() -> u64 {
    10 * 60 * 1000
}

/// Mempool tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemPoolSettings {
    #[serde(default = "default_pool_capacity")]
    pub shared_pool_capacity: usize,
    #[serde(default = "default_pool_capacity")]
    pub pending_pool_capacity: usize,
    #[serde(default = "default_tx_max_number_per_block")]
    pub tx_max_number_per_block: usize,
    /// Age past which a pending transaction is presumed superseded.
    #[serde(default = "default_clean_frequency_ms")]
    pub clean_frequency_ms: u64,
}

impl Default for MemPoolSettings {
    fn default() -> Self {
        Self {
            shared_pool_capacity: default_pool_capacity(),
            pending_pool_capacity: default_pool_capacity(),
            tx_max_number_per_block: default_tx_max_number_per_block(),
            clean_frequency_ms: default_clean_frequency_ms(),
        }
    }
}

/// The mempool of one group: a shared admission layer and a pending
/// ready-to-mine layer.
pub struct MemPool {
    group: GroupIndex,
    settings: MemPoolSettings,
    shared: SharedPool,
    pending: PendingPool,
    metrics: Arc<dyn MetricsSink>,
}

impl MemPool {
    pub fn new(group: GroupIndex, settings: MemPoolSettings, metrics: Arc<dyn MetricsSink>) -> Self {
        let shared = SharedPool::new(settings.shared_pool_capacity);
        let pending = PendingPool::new(settings.pending_pool_capacity);
        Self {
            group,
            settings,
            shared,
            pending,
            metrics,
        }
    }

    pub fn group(&self) -> GroupIndex {
        self.group
    }

    /// Route a transaction: straight to pending when every input already
    /// resolves against `world`, to shared otherwise.
    #[instrument(skip(self, tx, world), fields(group = %self.group, tx = %tx.hash()))]
    pub fn try_add(&self, tx: Transaction, now: u64, world: &WorldState) -> MempoolResult<()> {
        if let Some(output_ref) = self.double_spend_of(&tx) {
            return Err(MempoolError::DoubleSpend(output_ref));
        }
        let result = if world.contains_all_inputs(&tx) {
            self.pending.try_add(tx, now)
        } else {
            self.shared.try_add(tx, now)
        };
        if result.is_ok() {
            self.metrics.incr("mempool_tx_admitted", 1);
        }
        result
    }

    /// `true` when the transaction was admitted to either layer.
    pub fn add(&self, tx: Transaction, now: u64, world: &WorldState) -> bool {
        self.try_add(tx, now, world).is_ok()
    }

    /// Whether any input of `tx` is already consumed in either layer.
    /// Cheap enough to answer before paying full validation on gossip.
    pub fn is_double_spending(&self, tx: &Transaction) -> bool {
        self.double_spend_of(tx).is_some()
    }

    fn double_spend_of(&self, tx: &Transaction) -> Option<AssetOutputRef> {
        tx.unsigned
            .inputs
            .iter()
            .find(|input| self.shared.is_spent(input) || self.pending.is_spent(input))
            .copied()
    }

    pub fn contains(&self, hash: &TxHash) -> bool {
        self.shared.contains(hash) || self.pending.contains(hash)
    }

    pub fn size(&self) -> usize {
        self.shared.len() + self.pending.len()
    }

    /// Periodic maintenance:
    /// 1. promote shared transactions that became ready,
    /// 2. expire pending transactions older than the clean frequency,
    /// 3. drop pending transactions whose inputs went invalid.
    pub fn clean(&self, now: u64, world: &WorldState) {
        let mut promoted = 0usize;
        for entry in self.shared.take_ready(world) {
            if self.pending.is_full() {
                // No room; the transaction goes back to shared untouched.
                let _ = self.shared.try_add(entry.tx, entry.timestamp);
                continue;
            }
            if self.pending.add(entry.tx, entry.timestamp) {
                promoted += 1;
            }
        }

        let threshold = now.saturating_sub(self.settings.clean_frequency_ms);
        let expired = self.pending.take_old_txs(threshold);
        let invalid = self.pending.take_invalid(world);

        if promoted + expired.len() + invalid.len() > 0 {
            debug!(
                group = %self.group,
                promoted,
                expired = expired.len(),
                invalid = invalid.len(),
                "mempool cleaned"
            );
            self.metrics.incr("mempool_promoted", promoted as u64);
            self.metrics
                .incr("mempool_expired", (expired.len() + invalid.len()) as u64);
        }
        self.metrics.gauge("mempool_size", self.size() as i64);
    }

    /// Drop the transactions confirmed by a newly accepted block.
    pub fn remove_confirmed(&self, tx_hashes: &[TxHash]) {
        for hash in tx_hashes {
            self.shared.remove(hash);
            self.pending.remove(hash);
        }
    }

    /// Ready transactions for a block template, admission order, at most
    /// `limit`.
    pub fn extract_ready_txs(&self, world: &WorldState, limit: usize) -> Vec<Transaction> {
        self.pending.extract_ready_txs(world, limit)
    }

    /// Unspent pool outputs owned by `lockup`, both layers.
    pub fn relevant_utxos(&self, lockup: &LockupScript) -> Vec<(AssetOutputRef, TxOutput)> {
        let mut utxos = self.shared.relevant_utxos(lockup);
        utxos.extend(self.pending.relevant_utxos(lockup));
        utxos
    }

    pub fn settings(&self) -> &MemPoolSettings {
        &self.settings
    }
}
