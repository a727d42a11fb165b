//! The dense `G x G` array of chains.

use crate::{blocks::genesis_block, BlockChain, ChainError, ChainResult};
use lattice_consensus::ConsensusSettings;
use lattice_state::{StateStore, WorldState};
use lattice_storage::Storage;
use lattice_types::{Block, BlockHash, BrokerInfo, ChainIndex};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

/// All `G * G` chains, each behind its own writer lock.
///
/// Per-chain `add` operations are totally ordered by that chain's lock;
/// operations on different chains are independent and no method here ever
/// holds two chain locks at once.
pub struct MultiChain {
    settings: Arc<ConsensusSettings>,
    broker: BrokerInfo,
    chains: Vec<RwLock<BlockChain>>,
}

impl MultiChain {
    /// Create every chain from its deterministic genesis block.
    /// `genesis_state` seeds the world state of each intra-group chain.
    pub fn new(
        broker: BrokerInfo,
        storage: Arc<dyn Storage>,
        states: Arc<StateStore>,
        settings: Arc<ConsensusSettings>,
        genesis_state: WorldState,
    ) -> ChainResult<Self> {
        let groups = settings.groups;
        let mut chains = Vec::with_capacity(settings.chain_count());
        for flat in 0..settings.chain_count() {
            let chain_index = ChainIndex::from_flat(flat, groups);
            let genesis = genesis_block(chain_index, &settings);
            let state = if chain_index.is_intra_group() {
                genesis_state.clone()
            } else {
                WorldState::empty()
            };
            chains.push(RwLock::new(BlockChain::new(
                chain_index,
                &genesis,
                state,
                Arc::clone(&storage),
                Arc::clone(&states),
                Arc::clone(&settings),
            )?));
        }
        if !storage.contains(lattice_storage::ColumnFamily::NodeState, b"is-initialized")? {
            storage.put(
                lattice_storage::ColumnFamily::NodeState,
                b"is-initialized",
                &[1u8],
            )?;
        }

        info!(groups, chains = chains.len(), "multi-chain initialized");
        Ok(Self {
            settings,
            broker,
            chains,
        })
    }

    pub fn settings(&self) -> &ConsensusSettings {
        &self.settings
    }

    pub fn broker(&self) -> &BrokerInfo {
        &self.broker
    }

    /// The chain at `index`.
    pub fn chain(&self, index: ChainIndex) -> &RwLock<BlockChain> {
        &self.chains[index.flat_index(self.settings.groups)]
    }

    /// Chain indexes this broker stores.
    pub fn owned_chains(&self) -> Vec<ChainIndex> {
        self.broker.owned_chains()
    }

    /// Whether `hash` is accepted on any chain.
    pub fn contains(&self, hash: &BlockHash) -> bool {
        let index = ChainIndex::from_hash(hash, self.settings.groups);
        self.chain(index).read().contains(hash)
    }

    /// Route a block to its chain and add it. Every dependency must
    /// already be accepted on its own chain; the first missing one is
    /// surfaced for download.
    pub fn add(&self, block: &Block) -> ChainResult<ChainIndex> {
        let index = block.header.chain_index(self.settings.groups);
        self.check_deps(block, index)?;
        self.chain(index).write().add(block)?;
        Ok(index)
    }

    /// Verify cross-chain deps exist, never holding two locks at once.
    fn check_deps(&self, block: &Block, index: ChainIndex) -> ChainResult<()> {
        let groups = self.settings.groups;
        for (dep_chain, dep) in block.header.deps.slots(index, groups) {
            if dep == BlockHash::ZERO {
                // Genesis deps are unset.
                continue;
            }
            if !self.chain(dep_chain).read().contains(&dep) {
                return Err(ChainError::MissingBlock(dep));
            }
        }
        Ok(())
    }

    /// Total number of hashes across the chains this broker stores.
    pub fn num_hashes(&self) -> usize {
        self.owned_chains()
            .into_iter()
            .map(|index| self.chain(index).read().hash_chain().num_hashes())
            .sum()
    }

    /// Headers with timestamps in `[from_ts, until_ts)` across owned
    /// chains, with chain index and height.
    pub fn heighted_headers(
        &self,
        from_ts: u64,
        until_ts: u64,
    ) -> ChainResult<Vec<(ChainIndex, u32, lattice_types::BlockHeader)>> {
        let mut out = Vec::new();
        for index in self.owned_chains() {
            let chain = self.chain(index).read();
            for (height, header) in chain.headers().heighted_headers(from_ts, until_ts)? {
                out.push((index, height, header));
            }
        }
        Ok(out)
    }

    /// Sequence numbers of every chain, in flat order. Used by readers to
    /// detect concurrent writes and retry.
    pub fn sequences(&self) -> Vec<u64> {
        self.chains
            .iter()
            .map(|chain| chain.read().hash_chain().sequence())
            .collect()
    }
}
