//! The UTXO world state.

use crate::{StateError, StateResult};
use lattice_types::{
    AssetOutputRef, Hash, Reader, Transaction, TxOutput, TypesResult, Writer,
};
use std::collections::BTreeMap;

/// The set of unspent outputs at some block.
///
/// Persistent-value semantics: [`WorldState::apply`] clones and returns a
/// new state, so a committed state is never mutated in place and can be
/// shared across readers freely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldState {
    utxos: BTreeMap<AssetOutputRef, TxOutput>,
}

impl WorldState {
    /// The empty state.
    pub fn empty() -> Self {
        Self::default()
    }

    /// State seeded with pre-mine outputs.
    pub fn genesis(outputs: impl IntoIterator<Item = (AssetOutputRef, TxOutput)>) -> Self {
        Self {
            utxos: outputs.into_iter().collect(),
        }
    }

    /// Number of unspent outputs.
    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }

    /// Look up one output.
    pub fn get(&self, output_ref: &AssetOutputRef) -> Option<&TxOutput> {
        self.utxos.get(output_ref)
    }

    /// Whether every input of `tx` resolves against this state.
    pub fn contains_all_inputs(&self, tx: &Transaction) -> bool {
        tx.unsigned
            .inputs
            .iter()
            .all(|input| self.utxos.contains_key(input))
    }

    /// Apply one transaction: consume its inputs, add its outputs.
    ///
    /// Fails with [`StateError::MissingInput`] if any input is absent; the
    /// receiver is left untouched either way.
    pub fn apply(&self, tx: &Transaction) -> StateResult<WorldState> {
        let mut next = self.clone();
        for input in &tx.unsigned.inputs {
            if next.utxos.remove(input).is_none() {
                return Err(StateError::MissingInput(*input));
            }
        }
        for (index, output) in tx.all_outputs().enumerate() {
            next.utxos.insert(tx.output_ref(index as u32), output.clone());
        }
        Ok(next)
    }

    /// Root digest of this state: hash over the sorted output entries.
    /// Two states with the same outputs have the same root.
    pub fn root(&self) -> Hash {
        let mut w = Writer::with_capacity(self.utxos.len() * 64);
        for (output_ref, output) in &self.utxos {
            w.put_bytes(output_ref.tx_hash.as_bytes());
            w.put_u32(output_ref.index);
            w.put_u64(output.amount);
            w.put_bytes(&output.lockup.0);
            w.put_u16(output.tokens.len() as u16);
            for (id, amount) in &output.tokens {
                w.put_bytes(id.as_bytes());
                w.put_u64(*amount);
            }
        }
        Hash::hash(&w.into_bytes())
    }

    /// Serialize for the `trie` column family.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(self.utxos.len() * 80);
        w.put_u32(self.utxos.len() as u32);
        for (output_ref, output) in &self.utxos {
            w.put_bytes(output_ref.tx_hash.as_bytes());
            w.put_u32(output_ref.index);
            w.put_u64(output.amount);
            w.put_bytes(&output.lockup.0);
            w.put_u16(output.tokens.len() as u16);
            for (id, amount) in &output.tokens {
                w.put_bytes(id.as_bytes());
                w.put_u64(*amount);
            }
        }
        w.into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> TypesResult<Self> {
        let mut r = Reader::new(bytes);
        let count = r.get_u32()? as usize;
        let mut utxos = BTreeMap::new();
        for _ in 0..count {
            let tx_hash = lattice_types::TxHash(r.get_hash_bytes()?);
            let index = r.get_u32()?;
            let amount = r.get_u64()?;
            let lockup = lattice_types::LockupScript(r.get_hash_bytes()?);
            let token_count = r.get_count(1024)?;
            let mut tokens = Vec::with_capacity(token_count);
            for _ in 0..token_count {
                let id = Hash(r.get_hash_bytes()?);
                let token_amount = r.get_u64()?;
                tokens.push((id, token_amount));
            }
            utxos.insert(
                AssetOutputRef::new(tx_hash, index),
                TxOutput {
                    amount,
                    lockup,
                    tokens,
                },
            );
        }
        r.finish()?;
        Ok(Self { utxos })
    }
}
