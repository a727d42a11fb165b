//! Chain growth, difficulty and best-view scenarios.

use crate::generators::*;
use lattice_chain::HeaderChain;
use lattice_consensus::ConsensusSettings;
use lattice_state::WorldState;
use lattice_storage::MemoryStorage;
use lattice_types::{
    BlockDeps, BlockHash, BlockHeader, ChainIndex, GroupIndex, Hash, Target,
};
use num_bigint::BigUint;
use std::sync::Arc;

#[test]
fn test_single_chain_growth() {
    let (chains, flow) = build_flow(1, WorldState::empty());
    let index = ChainIndex::new(0, 0);
    let (genesis, genesis_weight, genesis_target) = {
        let chain = chains.chain(index).read();
        let g = chain.genesis_hash();
        let tree = chain.hash_chain();
        (g, tree.get_weight(&g).unwrap(), tree.get_target(&g).unwrap())
    };

    let b1 = mine_block(
        &chains,
        &flow,
        index,
        None,
        BASE_TIMESTAMP + BLOCK_INTERVAL_MS,
        1,
        Vec::new(),
    );

    let chain = chains.chain(index).read();
    let tree = chain.hash_chain();
    assert_eq!(tree.get_height(&b1.hash()).unwrap(), 1);
    assert_eq!(
        tree.get_weight(&b1.hash()).unwrap(),
        genesis_weight + genesis_target.work()
    );
    assert_eq!(tree.tips(), vec![b1.hash()]);
    assert_eq!(tree.get_predecessor(&b1.hash(), 0).unwrap(), genesis);
    drop(chain);

    let deps = flow.get_best_deps(GroupIndex(0)).unwrap();
    assert_eq!(deps.flatten(), vec![b1.hash()]);
}

/// Slow blocks ease the target: with the median delta damped onto the
/// upper clamp, one retarget makes the target four times easier.
#[test]
fn test_difficulty_reduction_under_slow_blocks() {
    let mut settings = ConsensusSettings::with_groups(1);
    settings.median_time_interval = 17;
    settings.expected_time_span = 64_000;
    settings.time_span_min = 16_000;
    settings.time_span_max = 256_000;
    let settings = Arc::new(settings);

    let genesis_target = Target(0x20010000);
    let genesis = BlockHeader {
        deps: BlockDeps(vec![BlockHash::ZERO]),
        txs_root: Hash::ZERO,
        timestamp: BASE_TIMESTAMP,
        target: genesis_target,
        nonce: [0u8; 32],
    };
    let mut chain = HeaderChain::new(
        ChainIndex::new(0, 0),
        &genesis,
        Arc::new(MemoryStorage::new()),
        Arc::clone(&settings),
    )
    .unwrap();

    // Blocks arriving 832s apart: the damped timespan
    // 64 + (832 - 64)/4 = 256s sits exactly on the clamp.
    let spacing: u64 = 832_000;
    let mut parent = genesis.hash();
    for height in 1..=17u64 {
        let target = chain.next_target(&parent).unwrap();
        // The window is too short to retarget while building.
        assert_eq!(target, genesis_target);
        let header = BlockHeader {
            deps: BlockDeps(vec![parent]),
            txs_root: Hash::ZERO,
            timestamp: BASE_TIMESTAMP + height * spacing,
            target,
            nonce: [height as u8; 32],
        };
        parent = chain.add(&header).unwrap();
    }

    let next = chain.next_target(&parent).unwrap();
    assert_eq!(next.to_big(), genesis_target.to_big() * BigUint::from(4u32));
    assert_eq!(next, Target(0x20040000));
}

/// With two tips on one chain, the heavier one wins the dependency slot.
#[test]
fn test_best_deps_after_new_tip() {
    let (chains, flow) = build_flow(2, WorldState::empty());
    let index = ChainIndex::new(0, 1);
    let genesis01 = chains.chain(index).read().genesis_hash();

    // A fork: t1 and t1b both extend genesis; t2 extends t1b.
    let t1 = mine_block(
        &chains,
        &flow,
        index,
        Some(genesis01),
        BASE_TIMESTAMP + BLOCK_INTERVAL_MS,
        1,
        Vec::new(),
    );
    let t1b = mine_block(
        &chains,
        &flow,
        index,
        Some(genesis01),
        BASE_TIMESTAMP + BLOCK_INTERVAL_MS + 1_000,
        2,
        Vec::new(),
    );
    let t2 = mine_block(
        &chains,
        &flow,
        index,
        Some(t1b.hash()),
        BASE_TIMESTAMP + 2 * BLOCK_INTERVAL_MS,
        3,
        Vec::new(),
    );

    {
        let chain = chains.chain(index).read();
        let tree = chain.hash_chain();
        assert_eq!(tree.tips().len(), 2);
        assert!(tree.is_tip(&t1.hash()));
        assert!(tree.is_tip(&t2.hash()));
        assert!(
            tree.get_weight(&t2.hash()).unwrap() > tree.get_weight(&t1.hash()).unwrap()
        );
    }

    let deps = flow.get_best_deps(GroupIndex(0)).unwrap();
    assert_eq!(deps.parent_for(GroupIndex(1)), t2.hash());
    // The vector stays full-length with accepted hashes only.
    let flat = deps.flatten();
    assert_eq!(flat.len(), 3);
    for hash in flat {
        assert!(chains.contains(&hash));
    }
}

/// Headers and blocks survive a serialization round trip.
#[test]
fn test_serialization_round_trip() {
    let (chains, flow) = build_flow(2, WorldState::empty());
    let block = mine_block(
        &chains,
        &flow,
        ChainIndex::new(1, 0),
        None,
        BASE_TIMESTAMP + BLOCK_INTERVAL_MS,
        1,
        Vec::new(),
    );

    let header = BlockHeader::from_bytes(&block.header.to_bytes()).unwrap();
    assert_eq!(header, block.header);
    let decoded = lattice_types::Block::from_bytes(&block.to_bytes()).unwrap();
    assert_eq!(decoded, block);
    assert_eq!(decoded.hash(), block.hash());
}
