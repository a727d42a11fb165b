//! Template building and execution-order scenarios.

use crate::generators::*;
use lattice_consensus::non_coinbase_execution_order;
use lattice_mempool::{MemPool, MemPoolSettings};
use lattice_mining::{BlockTemplateBuilder, MinerAddresses};
use lattice_state::WorldState;
use lattice_types::{noop_metrics, BlockHash, ChainIndex, GroupIndex, LockupScript};
use std::collections::HashMap;
use std::sync::Arc;

/// Scripted transactions are shuffled ahead of plain ones, and the walk
/// replays identically from the same inputs.
#[test]
fn test_execution_order_determinism() {
    let parent = BlockHash([0x01; 32]);
    let txs = vec![
        scripted_tx(output_ref(1), 1),
        spend_tx(output_ref(2), 2),
        scripted_tx(output_ref(3), 3),
        scripted_tx(output_ref(4), 4),
    ];

    let order = non_coinbase_execution_order(&parent, &txs);
    assert_eq!(order.len(), 4);

    let mut scripted_positions: Vec<usize> = order[..3].to_vec();
    scripted_positions.sort_unstable();
    assert_eq!(scripted_positions, vec![0, 2, 3]);
    assert_eq!(order[3], 1);

    // Same inputs, same sequence.
    assert_eq!(non_coinbase_execution_order(&parent, &txs), order);
}

/// A template's transactions execute cleanly against the parent state:
/// the mined block is accepted and clears the included transactions.
#[test]
fn test_template_to_accepted_block() {
    let seed = seed_tx(7);
    let genesis_state = WorldState::empty().apply(&seed).unwrap();
    let (chains, flow) = build_flow(2, genesis_state.clone());

    let mut mempools = HashMap::new();
    for g in 0..2u8 {
        mempools.insert(
            g,
            Arc::new(MemPool::new(
                GroupIndex(g),
                MemPoolSettings::default(),
                noop_metrics(),
            )),
        );
    }
    let miners = MinerAddresses::new(vec![LockupScript([0; 32]), LockupScript([1; 32])]);
    let builder = BlockTemplateBuilder::new(Arc::clone(&flow), mempools.clone(), miners);

    // Group 0 has one ready transaction.
    let tx = spend_tx(seed.output_ref(0), 9);
    assert!(mempools
        .get(&0)
        .unwrap()
        .add(tx.clone(), 1_000, &genesis_state));

    let index = ChainIndex::new(0, 0);
    let template = builder
        .build(index, BASE_TIMESTAMP + BLOCK_INTERVAL_MS)
        .unwrap();
    assert_eq!(template.transactions.len(), 2);
    assert_eq!(template.deps.0.len(), 3);

    // Grind the nonce onto the right chain and accept.
    let mut block = template.into_block([0u8; 32]);
    let mut counter: u32 = 0;
    loop {
        block.header.nonce[28..32].copy_from_slice(&counter.to_be_bytes());
        if block.header.chain_index(2) == index {
            break;
        }
        counter += 1;
    }
    chains.add(&block).unwrap();

    mempools.get(&0).unwrap().remove_confirmed(&block.tx_hashes());
    assert_eq!(mempools.get(&0).unwrap().size(), 0);

    // The new tip carries the spent output's successor.
    let chain = chains.chain(index).read();
    let world = chain.world_state_at(&block.hash()).unwrap();
    assert!(world.get(&seed.output_ref(0)).is_none());
    assert!(world.get(&tx.output_ref(0)).is_some());
}
