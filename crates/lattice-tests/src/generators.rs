//! Test data generators and the in-memory node harness.
//!
//! Deterministic by construction: seeded identifiers, a fixed base
//! timestamp, and nonce grinding only against the chain-index projection
//! (no proof-of-work search).

use lattice_chain::{BlockFlow, MultiChain};
use lattice_consensus::ConsensusSettings;
use lattice_state::{StateStore, WorldState};
use lattice_storage::{MemoryStorage, Storage};
use lattice_types::{
    AssetOutputRef, Block, BlockHash, BlockHeader, BrokerInfo, ChainIndex, Hash, LockupScript,
    Transaction, TxOutput, UnsignedTransaction,
};
use std::sync::Arc;

/// Fixed base timestamp (ms) for reproducible chains.
pub const BASE_TIMESTAMP: u64 = 1_700_000_000_000;

/// One expected block interval under the default settings.
pub const BLOCK_INTERVAL_MS: u64 = 64_000;

/// A multi-chain plus view over in-memory storage.
pub fn build_flow(groups: u8, genesis_state: WorldState) -> (Arc<MultiChain>, Arc<BlockFlow>) {
    let settings = Arc::new(ConsensusSettings::with_groups(groups));
    build_flow_with(settings, genesis_state)
}

/// Same, with explicit consensus settings.
pub fn build_flow_with(
    settings: Arc<ConsensusSettings>,
    genesis_state: WorldState,
) -> (Arc<MultiChain>, Arc<BlockFlow>) {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let states = Arc::new(StateStore::new(Arc::clone(&storage)));
    let chains = Arc::new(
        MultiChain::new(
            BrokerInfo::solo(Hash::ZERO, settings.groups),
            storage,
            states,
            settings,
            genesis_state,
        )
        .expect("in-memory multi-chain construction"),
    );
    let flow = Arc::new(BlockFlow::new(Arc::clone(&chains)));
    (chains, flow)
}

/// Mine and accept a block on `chain_index` with the current best deps,
/// optionally forcing the direct parent (to build forks), carrying the
/// given user transactions plus a fresh coinbase.
pub fn mine_block(
    chains: &MultiChain,
    flow: &BlockFlow,
    chain_index: ChainIndex,
    parent_override: Option<BlockHash>,
    timestamp: u64,
    salt: u8,
    user_txs: Vec<Transaction>,
) -> Block {
    let groups = chains.settings().groups;
    let deps = flow
        .get_best_deps(chain_index.from)
        .expect("best deps over a quiescent chain set");
    let mut header_deps = deps.header_deps(chain_index.to);
    if let Some(parent) = parent_override {
        *header_deps.0.last_mut().expect("deps are never empty") = parent;
    }
    let parent = header_deps.parent();

    let target = chains
        .chain(chain_index)
        .read()
        .next_target(&parent)
        .expect("parent is accepted");

    let mut transactions = user_txs;
    transactions.push(coinbase_tx(salt));

    let mut header = BlockHeader {
        deps: header_deps,
        txs_root: Block::compute_txs_root(&transactions),
        timestamp,
        target,
        nonce: [salt; 32],
    };
    let mut counter: u32 = 0;
    loop {
        header.nonce[28..32].copy_from_slice(&counter.to_be_bytes());
        if header.chain_index(groups) == chain_index {
            break;
        }
        counter += 1;
    }
    let block = Block::new(header, transactions);
    chains.add(&block).expect("mined block is valid");
    block
}

/// A coinbase paying a seeded lockup.
pub fn coinbase_tx(salt: u8) -> Transaction {
    Transaction::coinbase(1_000, LockupScript([salt; 32]))
}

/// An input-free transaction planting one seeded output.
pub fn seed_tx(seed: u8) -> Transaction {
    Transaction {
        unsigned: UnsignedTransaction {
            inputs: Vec::new(),
            fixed_outputs: vec![TxOutput::plain(100, LockupScript([seed; 32]))],
            script: None,
        },
        signatures: Vec::new(),
        generated_outputs: Vec::new(),
    }
}

/// A plain transfer consuming `input`.
pub fn spend_tx(input: AssetOutputRef, seed: u8) -> Transaction {
    Transaction {
        unsigned: UnsignedTransaction {
            inputs: vec![input],
            fixed_outputs: vec![TxOutput::plain(90, LockupScript([seed; 32]))],
            script: None,
        },
        signatures: Vec::new(),
        generated_outputs: Vec::new(),
    }
}

/// A scripted transaction consuming `input`.
pub fn scripted_tx(input: AssetOutputRef, seed: u8) -> Transaction {
    Transaction {
        unsigned: UnsignedTransaction {
            inputs: vec![input],
            fixed_outputs: vec![TxOutput::plain(90, LockupScript([seed; 32]))],
            script: Some(vec![seed]),
        },
        signatures: Vec::new(),
        generated_outputs: Vec::new(),
    }
}

/// A seeded output reference for pool tests.
pub fn output_ref(seed: u8) -> AssetOutputRef {
    AssetOutputRef::new(lattice_types::TxHash::hash(&[seed]), 0)
}
