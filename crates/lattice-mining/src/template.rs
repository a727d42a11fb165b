//! Block template assembly.

use crate::{build_coinbase, total_fees, MinerAddresses, MiningResult};
use lattice_chain::BlockFlow;
use lattice_mempool::MemPool;
use lattice_types::{
    Block, BlockDeps, BlockHash, BlockHeader, ChainIndex, Hash, Target, Transaction,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

fn default_batch_delay_ms() -> u64 {
    50
}

fn default_polling_interval_ms() -> u64 {
    2_000
}

fn default_nonce_step() -> u64 {
    1 << 16
}

/// Mining worker tuning knobs, carried in the node configuration and
/// handed to the external worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningSettings {
    /// Delay between job batches pushed to the worker.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// How often the worker polls for a fresh template.
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
    /// Nonce-space stride per worker thread.
    #[serde(default = "default_nonce_step")]
    pub nonce_step: u64,
}

impl Default for MiningSettings {
    fn default() -> Self {
        Self {
            batch_delay_ms: default_batch_delay_ms(),
            polling_interval_ms: default_polling_interval_ms(),
            nonce_step: default_nonce_step(),
        }
    }
}

/// Everything a miner needs to search for a block on one chain.
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    pub chain_index: ChainIndex,
    /// Header-layout dependency vector, direct parent last.
    pub deps: BlockDeps,
    pub parent: BlockHash,
    pub height: u32,
    pub target: Target,
    pub block_ts: u64,
    pub txs_root: Hash,
    /// Ordered transactions, coinbase last.
    pub transactions: Vec<Transaction>,
}

impl BlockTemplate {
    /// Materialize a block with the found nonce.
    pub fn into_block(self, nonce: [u8; 32]) -> Block {
        Block::new(
            BlockHeader {
                deps: self.deps,
                txs_root: self.txs_root,
                timestamp: self.block_ts,
                target: self.target,
                nonce,
            },
            self.transactions,
        )
    }
}

/// Builds mining templates from the current best view.
pub struct BlockTemplateBuilder {
    flow: Arc<BlockFlow>,
    mempools: HashMap<u8, Arc<MemPool>>,
    miners: MinerAddresses,
}

impl BlockTemplateBuilder {
    pub fn new(
        flow: Arc<BlockFlow>,
        mempools: HashMap<u8, Arc<MemPool>>,
        miners: MinerAddresses,
    ) -> Self {
        Self {
            flow,
            mempools,
            miners,
        }
    }

    /// Assemble a template for `chain_index` at wall-clock `now` (ms).
    #[instrument(skip(self), fields(chain = %chain_index))]
    pub fn build(&self, chain_index: ChainIndex, now: u64) -> MiningResult<BlockTemplate> {
        let deps = self.flow.get_best_deps(chain_index.from)?;
        let parent = deps.parent_for(chain_index.to);

        let chains = self.flow.chains();
        let (world, parent_height, parent_ts, target) = {
            let chain = chains.chain(chain_index).read();
            let world = chain.world_state_at(&parent)?;
            let height = chain.hash_chain().get_height(&parent)?;
            let ts = chain.hash_chain().get_timestamp(&parent)?;
            let target = chain.next_target(&parent)?;
            (world, height, ts, target)
        };

        let max_user_txs = self
            .mempools
            .get(&chain_index.from.0)
            .map(|mp| mp.settings().tx_max_number_per_block - 1)
            .unwrap_or(0);
        let mut transactions = self
            .mempools
            .get(&chain_index.from.0)
            .map(|mp| mp.extract_ready_txs(&world, max_user_txs))
            .unwrap_or_default();

        let fees = total_fees(&world, &transactions);
        let miner = self.miners.get(chain_index.to)?;
        let height = parent_height + 1;
        transactions.push(build_coinbase(height, fees, miner));

        let template = BlockTemplate {
            chain_index,
            deps: deps.header_deps(chain_index.to),
            parent,
            height,
            target,
            block_ts: now.max(parent_ts + 1),
            txs_root: Block::compute_txs_root(&transactions),
            transactions,
        };
        debug!(
            height,
            txs = template.transactions.len(),
            target = %template.target,
            "built block template"
        );
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_chain::MultiChain;
    use lattice_consensus::ConsensusSettings;
    use lattice_mempool::{MemPool, MemPoolSettings};
    use lattice_state::{StateStore, WorldState};
    use lattice_storage::{MemoryStorage, Storage};
    use lattice_types::{
        noop_metrics, AssetOutputRef, BrokerInfo, GroupIndex, LockupScript, TxHash, TxOutput,
        UnsignedTransaction,
    };

    fn seed_output(seed: u8) -> (AssetOutputRef, TxOutput) {
        (
            AssetOutputRef::new(TxHash::hash(&[seed]), 0),
            TxOutput::plain(100, LockupScript([seed; 32])),
        )
    }

    fn setup(groups: u8, genesis_state: WorldState) -> (Arc<MultiChain>, BlockTemplateBuilder) {
        let settings = Arc::new(ConsensusSettings::with_groups(groups));
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let states = Arc::new(StateStore::new(Arc::clone(&storage)));
        let chains = Arc::new(
            MultiChain::new(
                BrokerInfo::solo(Hash::ZERO, groups),
                storage,
                states,
                settings,
                genesis_state,
            )
            .unwrap(),
        );
        let flow = Arc::new(BlockFlow::new(Arc::clone(&chains)));
        let mut mempools = HashMap::new();
        for g in 0..groups {
            mempools.insert(
                g,
                Arc::new(MemPool::new(
                    GroupIndex(g),
                    MemPoolSettings::default(),
                    noop_metrics(),
                )),
            );
        }
        let miners =
            MinerAddresses::new((0..groups).map(|g| LockupScript([g; 32])).collect());
        let builder = BlockTemplateBuilder::new(flow, mempools.clone(), miners);
        (chains, builder)
    }

    #[test]
    fn test_template_on_fresh_chain() {
        let (chains, builder) = setup(1, WorldState::empty());
        let index = ChainIndex::new(0, 0);
        let genesis = chains.chain(index).read().genesis_hash();

        let template = builder.build(index, 64_000).unwrap();
        assert_eq!(template.parent, genesis);
        assert_eq!(template.height, 1);
        // Just the coinbase.
        assert_eq!(template.transactions.len(), 1);
        assert_eq!(template.deps.parent(), genesis);
        assert_eq!(
            template.txs_root,
            Block::compute_txs_root(&template.transactions)
        );
    }

    #[test]
    fn test_template_timestamp_is_monotonic() {
        let (chains, builder) = setup(1, WorldState::empty());
        let index = ChainIndex::new(0, 0);
        let parent_ts = {
            let chain = chains.chain(index).read();
            let genesis = chain.genesis_hash();
            chain.hash_chain().get_timestamp(&genesis).unwrap()
        };
        // A clock behind the parent still yields a later block timestamp.
        let template = builder.build(index, 0).unwrap();
        assert_eq!(template.block_ts, parent_ts + 1);
    }

    #[test]
    fn test_template_mined_block_is_accepted() {
        let (seed_ref, seed_out) = seed_output(7);
        let genesis_state = WorldState::genesis([(seed_ref, seed_out)]);
        let (chains, builder) = setup(1, genesis_state.clone());
        let index = ChainIndex::new(0, 0);

        let template = builder.build(index, 64_000).unwrap();
        let mut block = template.into_block([0u8; 32]);
        let mut counter: u32 = 0;
        loop {
            block.header.nonce[28..32].copy_from_slice(&counter.to_be_bytes());
            if block.header.chain_index(1) == index {
                break;
            }
            counter += 1;
        }
        chains.add(&block).unwrap();
        let chain = chains.chain(index).read();
        assert_eq!(chain.hash_chain().best_tip(), Some(block.hash()));
    }

    #[test]
    fn test_template_includes_ready_txs_and_fees() {
        let (seed_ref, seed_out) = seed_output(7);
        let genesis_state = WorldState::genesis([(seed_ref, seed_out)]);
        let (chains, builder) = setup(1, genesis_state.clone());
        let index = ChainIndex::new(0, 0);

        // One ready transaction paying a 10-unit fee.
        let tx = Transaction {
            unsigned: UnsignedTransaction {
                inputs: vec![seed_ref],
                fixed_outputs: vec![TxOutput::plain(90, LockupScript([9; 32]))],
                script: None,
            },
            signatures: Vec::new(),
            generated_outputs: Vec::new(),
        };
        let genesis = chains.chain(index).read().genesis_hash();
        let world = chains.chain(index).read().world_state_at(&genesis).unwrap();
        builder
            .mempools
            .get(&0)
            .unwrap()
            .add(tx.clone(), 1_000, &world);

        let template = builder.build(index, 64_000).unwrap();
        assert_eq!(template.transactions.len(), 2);
        assert_eq!(template.transactions[0].hash(), tx.hash());
        let coinbase = template.transactions.last().unwrap();
        assert_eq!(
            coinbase.unsigned.fixed_outputs[0].amount,
            crate::block_reward_at_height(1) + 10
        );
        // Coinbase pays the miner of the `to` group.
        assert_eq!(
            coinbase.unsigned.fixed_outputs[0].lockup,
            LockupScript([0; 32])
        );
    }
}
