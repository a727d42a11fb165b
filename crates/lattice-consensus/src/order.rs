//! Deterministic non-coinbase execution order.
//!
//! Scripted transactions execute in an order no submitter can predict at
//! broadcast time but every validator can re-derive from the block alone:
//! a Fisher-Yates walk over the scripted positions whose seed starts from
//! the parent hash XOR three transaction hashes and steps to the hash of
//! each picked transaction. Plain transfers follow in their original
//! block order.

use lattice_types::{BlockHash, Hash, Transaction};

/// Execution order of the non-coinbase transactions of a block, as
/// positions into the input slice.
pub fn non_coinbase_execution_order(parent: &BlockHash, txs: &[Transaction]) -> Vec<usize> {
    if txs.is_empty() {
        return Vec::new();
    }

    let mut scripted: Vec<usize> = Vec::new();
    let mut plain: Vec<usize> = Vec::new();
    for (position, tx) in txs.iter().enumerate() {
        if tx.is_scripted() {
            scripted.push(position);
        } else {
            plain.push(position);
        }
    }

    let hashes: Vec<Hash> = txs.iter().map(|tx| Hash::from(tx.hash())).collect();
    let mut seed = Hash::from(*parent)
        .xor(&hashes[0])
        .xor(&hashes[txs.len() / 2])
        .xor(&hashes[txs.len() - 1]);

    let mut order = Vec::with_capacity(txs.len());
    while !scripted.is_empty() {
        let pick = seed_index(&seed, scripted.len());
        let position = scripted.remove(pick);
        seed = hashes[position];
        order.push(position);
    }
    order.extend(plain);
    order
}

/// Project a seed digest onto `[0, len)`.
fn seed_index(seed: &Hash, len: usize) -> usize {
    let bytes = seed.as_bytes();
    let mut acc = [0u8; 8];
    acc.copy_from_slice(&bytes[..8]);
    (u64::from_be_bytes(acc) % len as u64) as usize
}
