//! Input, output and address indexes over a pool.

use crate::{MempoolError, MempoolResult};
use lattice_types::{AssetOutputRef, LockupScript, Transaction, TxHash, TxOutput};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Secondary indexes over the union of transactions in one pool.
#[derive(Debug, Default)]
pub struct TxIndexes {
    /// Transactions currently indexed; keys idempotence.
    txs: HashSet<TxHash>,
    /// Who spends each output reference.
    input_index: HashMap<AssetOutputRef, TxHash>,
    /// Unspent outputs produced by pooled transactions.
    output_index: HashMap<AssetOutputRef, TxOutput>,
    /// Output references per owner, for wallet UTXO queries.
    address_index: HashMap<LockupScript, BTreeSet<AssetOutputRef>>,
}

impl TxIndexes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_tx(&self, hash: &TxHash) -> bool {
        self.txs.contains(hash)
    }

    /// Whether a pooled transaction consumes `output_ref`.
    pub fn is_spent(&self, output_ref: &AssetOutputRef) -> bool {
        self.input_index.contains_key(output_ref)
    }

    /// The transaction spending `output_ref`, if any.
    pub fn spender(&self, output_ref: &AssetOutputRef) -> Option<TxHash> {
        self.input_index.get(output_ref).copied()
    }

    /// Whether any input of `tx` collides with an indexed spend.
    pub fn double_spends(&self, tx: &Transaction) -> Option<AssetOutputRef> {
        tx.unsigned
            .inputs
            .iter()
            .find(|input| self.is_spent(input))
            .copied()
    }

    /// The pool-produced output at `output_ref`, or `Err(Spent)` when a
    /// pooled transaction already consumes it.
    pub fn get_utxo(&self, output_ref: &AssetOutputRef) -> MempoolResult<Option<TxOutput>> {
        if self.is_spent(output_ref) {
            return Err(MempoolError::Spent(*output_ref));
        }
        Ok(self.output_index.get(output_ref).cloned())
    }

    /// Unspent pool outputs owned by `lockup`.
    pub fn relevant_utxos(&self, lockup: &LockupScript) -> Vec<(AssetOutputRef, TxOutput)> {
        self.address_index
            .get(lockup)
            .map(|refs| {
                refs.iter()
                    .filter(|r| !self.is_spent(r))
                    .filter_map(|r| self.output_index.get(r).map(|o| (*r, o.clone())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Index a transaction. Adding one already indexed is a no-op.
    pub fn add(&mut self, tx: &Transaction) {
        let hash = tx.hash();
        if !self.txs.insert(hash) {
            return;
        }
        for input in &tx.unsigned.inputs {
            self.input_index.insert(*input, hash);
        }
        for (index, output) in tx.all_outputs().enumerate() {
            let output_ref = tx.output_ref(index as u32);
            self.output_index.insert(output_ref, output.clone());
            self.address_index
                .entry(output.lockup)
                .or_default()
                .insert(output_ref);
        }
    }

    /// Remove a transaction's entries. Removing one not indexed is a
    /// no-op.
    pub fn remove(&mut self, tx: &Transaction) {
        let hash = tx.hash();
        if !self.txs.remove(&hash) {
            return;
        }
        for input in &tx.unsigned.inputs {
            self.input_index.remove(input);
        }
        for (index, output) in tx.all_outputs().enumerate() {
            let output_ref = tx.output_ref(index as u32);
            self.output_index.remove(&output_ref);
            if let Some(refs) = self.address_index.get_mut(&output.lockup) {
                refs.remove(&output_ref);
                if refs.is_empty() {
                    self.address_index.remove(&output.lockup);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
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

    #[test]
    fn test_add_indexes_all_sides() {
        let mut idx = TxIndexes::new();
        let t = tx(1, vec![r(10)]);
        idx.add(&t);

        assert!(idx.is_spent(&r(10)));
        assert_eq!(idx.spender(&r(10)), Some(t.hash()));
        assert!(idx.get_utxo(&t.output_ref(0)).unwrap().is_some());
        assert_eq!(idx.relevant_utxos(&LockupScript([1; 32])).len(), 1);
    }

    #[test]
    fn test_add_remove_restores_state() {
        let mut idx = TxIndexes::new();
        let t = tx(1, vec![r(10)]);
        idx.add(&t);
        idx.remove(&t);

        assert!(!idx.is_spent(&r(10)));
        assert!(idx.get_utxo(&t.output_ref(0)).unwrap().is_none());
        assert!(idx.relevant_utxos(&LockupScript([1; 32])).is_empty());
        assert!(idx.is_empty());
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut idx = TxIndexes::new();
        let t = tx(1, vec![r(10)]);
        idx.add(&t);
        idx.add(&t);
        assert_eq!(idx.len(), 1);
        // One remove undoes one add-pair.
        idx.remove(&t);
        assert!(idx.is_empty());
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut idx = TxIndexes::new();
        let t1 = tx(1, vec![r(10)]);
        let t2 = tx(2, vec![r(20)]);
        idx.add(&t1);
        idx.remove(&t2);
        assert!(idx.is_spent(&r(10)));
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn test_get_utxo_spent() {
        let mut idx = TxIndexes::new();
        let t1 = tx(1, vec![r(10)]);
        idx.add(&t1);
        // A second transaction consuming t1's output marks it spent.
        let t2 = tx(2, vec![t1.output_ref(0)]);
        idx.add(&t2);
        assert!(matches!(
            idx.get_utxo(&t1.output_ref(0)),
            Err(MempoolError::Spent(_))
        ));
    }

    #[test]
    fn test_double_spend_detection() {
        let mut idx = TxIndexes::new();
        idx.add(&tx(1, vec![r(10)]));
        assert_eq!(idx.double_spends(&tx(2, vec![r(10)])), Some(r(10)));
        assert_eq!(idx.double_spends(&tx(3, vec![r(11)])), None);
    }
}
