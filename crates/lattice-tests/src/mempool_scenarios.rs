//! Mempool double-spend and capacity scenarios.

use crate::generators::*;
use lattice_mempool::{MemPool, MemPoolSettings, PendingPool};
use lattice_state::WorldState;
use lattice_types::{noop_metrics, GroupIndex};

#[test]
fn test_mempool_double_spend() {
    let mempool = MemPool::new(GroupIndex(0), MemPoolSettings::default(), noop_metrics());
    let seed = seed_tx(1);
    let world = WorldState::empty().apply(&seed).unwrap();

    let tx1 = spend_tx(seed.output_ref(0), 2);
    assert!(mempool.add(tx1, 1_000, &world));

    let tx2 = spend_tx(seed.output_ref(0), 3);
    assert!(mempool.is_double_spending(&tx2));
    assert!(!mempool.add(tx2, 1_001, &world));
    assert_eq!(mempool.size(), 1);
}

#[test]
fn test_pending_pool_capacity() {
    let pool = PendingPool::new(2);
    let t1 = spend_tx(output_ref(1), 1);
    let t2 = spend_tx(output_ref(2), 2);
    let t3 = spend_tx(output_ref(3), 3);

    assert!(pool.add(t1.clone(), 1_000));
    assert!(pool.add(t2, 2_000));
    assert!(!pool.add(t3.clone(), 3_000));

    pool.remove(&t1.hash());
    assert!(pool.add(t3, 3_000));
    assert_eq!(pool.len(), 2);
}

#[test]
fn test_add_remove_is_idempotent() {
    let mempool = MemPool::new(GroupIndex(0), MemPoolSettings::default(), noop_metrics());
    let seed = seed_tx(1);
    let world = WorldState::empty().apply(&seed).unwrap();
    let tx = spend_tx(seed.output_ref(0), 2);

    assert!(mempool.add(tx.clone(), 1_000, &world));
    // Re-adding leaves the pool unchanged.
    assert!(!mempool.add(tx.clone(), 1_001, &world));
    assert_eq!(mempool.size(), 1);

    mempool.remove_confirmed(&[tx.hash()]);
    assert_eq!(mempool.size(), 0);
    // Removing again is a no-op.
    mempool.remove_confirmed(&[tx.hash()]);
    assert_eq!(mempool.size(), 0);
}

/// A mined block drops its transactions from the pool.
#[test]
fn test_confirmed_txs_leave_the_pool() {
    use lattice_types::ChainIndex;

    let seed = seed_tx(7);
    let genesis_state = WorldState::empty().apply(&seed).unwrap();
    let (chains, flow) = build_flow(1, genesis_state.clone());
    let index = ChainIndex::new(0, 0);

    let mempool = MemPool::new(GroupIndex(0), MemPoolSettings::default(), noop_metrics());
    let tx = spend_tx(seed.output_ref(0), 2);
    assert!(mempool.add(tx.clone(), 1_000, &genesis_state));

    let block = mine_block(
        &chains,
        &flow,
        index,
        None,
        BASE_TIMESTAMP + BLOCK_INTERVAL_MS,
        1,
        vec![tx.clone()],
    );
    mempool.remove_confirmed(&block.tx_hashes());

    assert!(!mempool.contains(&tx.hash()));
    assert_eq!(mempool.size(), 0);
}
