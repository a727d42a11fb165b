//! Node assembly and the block/transaction pipelines.

use crate::NodeConfig;
use anyhow::{Context, Result};
use lattice_chain::{BlockFlow, ChainError, ChainLocator, MultiChain};
use lattice_mempool::MemPool;
use lattice_mining::{BlockTemplate, BlockTemplateBuilder, MinerAddresses};
use lattice_network::Payload;
use lattice_state::{StateStore, WorldState};
use lattice_storage::{Database, Storage};
use lattice_types::{
    noop_metrics, Block, BlockHash, BrokerInfo, ChainIndex, GroupIndex, Transaction,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// The assembled node: storage, chains, view, pools and the template
/// builder, wired per the configuration.
pub struct Node {
    config: NodeConfig,
    storage: Arc<Database>,
    chains: Arc<MultiChain>,
    flow: Arc<BlockFlow>,
    mempools: HashMap<u8, Arc<MemPool>>,
    templates: BlockTemplateBuilder,
}

impl Node {
    /// Open storage and bring up every component.
    pub fn open(config: NodeConfig) -> Result<Self> {
        let settings = Arc::new(config.consensus.clone());
        let broker = BrokerInfo {
            clique_id: config.broker.clique_id(),
            broker_id: config.broker.broker_id,
            broker_num: config.broker.broker_num,
            groups: settings.groups,
        };

        let storage = Arc::new(
            Database::open(config.data_dir.join("db")).context("failed to open database")?,
        );
        let storage_dyn: Arc<dyn Storage> = Arc::<Database>::clone(&storage);
        let states = Arc::new(StateStore::new(Arc::clone(&storage_dyn)));
        let chains = Arc::new(MultiChain::new(
            broker,
            Arc::clone(&storage_dyn),
            Arc::clone(&states),
            Arc::clone(&settings),
            WorldState::empty(),
        )?);
        let flow = Arc::new(BlockFlow::new(Arc::clone(&chains)));

        let metrics = noop_metrics();
        let mut mempools = HashMap::new();
        for group in broker.owned_groups() {
            mempools.insert(
                group.0,
                Arc::new(MemPool::new(
                    group,
                    config.mempool.clone(),
                    Arc::clone(&metrics),
                )),
            );
        }

        let miners = MinerAddresses::new(config.mining.lockups(settings.groups));
        let templates =
            BlockTemplateBuilder::new(Arc::clone(&flow), mempools.clone(), miners);

        info!(
            node = %config.node_name,
            groups = settings.groups,
            broker_id = broker.broker_id,
            broker_num = broker.broker_num,
            "node open"
        );

        Ok(Self {
            config,
            storage,
            chains,
            flow,
            mempools,
            templates,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn chains(&self) -> &MultiChain {
        &self.chains
    }

    pub fn flow(&self) -> &BlockFlow {
        &self.flow
    }

    /// World state at the best tip of a group's intra-group chain; the
    /// reference state for mempool admission and cleaning.
    fn group_world(&self, group: GroupIndex) -> Result<WorldState, ChainError> {
        let index = ChainIndex::new(group.0, group.0);
        let chain = self.chains.chain(index).read();
        let tip = chain
            .hash_chain()
            .best_tip()
            .expect("chains always hold at least genesis");
        chain.world_state_at(&tip)
    }

    /// Accept a block: route it to its chain, drop its transactions from
    /// the group mempool, refresh the pool against the new state.
    pub fn add_block(&self, block: &Block, now: u64) -> Result<ChainIndex, ChainError> {
        let index = self.chains.add(block)?;
        if let Some(mempool) = self.mempools.get(&index.from.0) {
            mempool.remove_confirmed(&block.tx_hashes());
            if let Ok(world) = self.group_world(index.from) {
                mempool.clean(now, &world);
            }
        }
        Ok(index)
    }

    /// Submit a transaction to a group's mempool.
    pub fn submit_tx(&self, group: GroupIndex, tx: Transaction, now: u64) -> bool {
        let Some(mempool) = self.mempools.get(&group.0) else {
            warn!(%group, "transaction for a group this broker does not serve");
            return false;
        };
        match self.group_world(group) {
            Ok(world) => mempool.add(tx, now, &world),
            Err(e) => {
                warn!(%group, error = %e, "no world state for admission");
                false
            }
        }
    }

    /// Fresh mining template for a chain.
    pub fn block_template(
        &self,
        index: ChainIndex,
        now: u64,
    ) -> Result<BlockTemplate, lattice_mining::MiningError> {
        self.templates.build(index, now)
    }

    /// Answer one sync payload, if it warrants a reply.
    pub fn handle_sync_payload(&self, payload: &Payload) -> Result<Option<Payload>, ChainError> {
        match payload {
            Payload::SyncRequest { locators } => {
                let inventories = self
                    .flow
                    .get_sync_inventories(
                        &self.from_wire_locators(locators),
                        self.config.network.num_of_sync_blocks_limit,
                    )?;
                Ok(Some(Payload::SyncResponse {
                    inventories: self.to_wire_locators(&inventories),
                }))
            }
            Payload::SyncResponse { inventories } => {
                let missing: Vec<BlockHash> = inventories
                    .iter()
                    .flatten()
                    .filter(|hash| !self.chains.contains(hash))
                    .copied()
                    .collect();
                if missing.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Payload::GetBlocks { hashes: missing }))
                }
            }
            Payload::GetBlocks { hashes } => {
                let mut blocks = Vec::with_capacity(hashes.len());
                for hash in hashes {
                    let index = ChainIndex::from_hash(hash, self.chains.settings().groups);
                    match self.chains.chain(index).read().get_block(hash) {
                        Ok(block) => blocks.push(block),
                        Err(ChainError::MissingBlock(_)) => continue,
                        Err(e) => return Err(e),
                    }
                }
                Ok(Some(Payload::SendBlocks { blocks }))
            }
            Payload::SendBlocks { blocks } => {
                for block in blocks {
                    match self.add_block(block, 0) {
                        Ok(_) => {}
                        // Out-of-order delivery; the next round fills the
                        // gap.
                        Err(ChainError::MissingBlock(hash))
                        | Err(ChainError::MissingParent(hash)) => {
                            warn!(%hash, "held back block with missing dependency");
                        }
                        Err(e) => return Err(e),
                    }
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Opening payload of the sync conversation with a fresh peer.
    pub fn start_sync(&self, intra_clique: bool) -> Result<Payload, ChainError> {
        if intra_clique {
            let holdings = self
                .flow
                .get_intra_clique_sync_hashes(self.chains.broker())?;
            Ok(Payload::SyncResponse {
                inventories: self.to_wire_locators(&holdings),
            })
        } else {
            let locators = self.flow.get_sync_locators()?;
            Ok(Payload::SyncRequest {
                locators: self.to_wire_locators(&locators),
            })
        }
    }

    /// Wire locator lists are indexed by flat chain position over all
    /// `G * G` chains; chains without an entry stay empty.
    fn to_wire_locators(&self, locators: &[ChainLocator]) -> Vec<Vec<BlockHash>> {
        let groups = self.chains.settings().groups;
        let mut wire = vec![Vec::new(); self.chains.settings().chain_count()];
        for locator in locators {
            wire[locator.chain_index.flat_index(groups)] = locator.hashes.clone();
        }
        wire
    }

    fn from_wire_locators(&self, wire: &[Vec<BlockHash>]) -> Vec<ChainLocator> {
        let groups = self.chains.settings().groups;
        wire.iter()
            .enumerate()
            .filter(|(_, hashes)| !hashes.is_empty())
            .map(|(flat, hashes)| ChainLocator {
                chain_index: ChainIndex::from_flat(flat, groups),
                hashes: hashes.clone(),
            })
            .collect()
    }

    /// Drain in-flight storage writes and release resources.
    pub fn close(&self) -> Result<()> {
        self.storage.flush().context("failed to flush storage")?;
        info!("node closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Args;
    use tempfile::TempDir;

    fn node(groups: u8) -> (Node, TempDir) {
        let tmp = TempDir::new().unwrap();
        let args = Args {
            config: tmp.path().join("absent.toml"),
            data_dir: Some(tmp.path().to_path_buf()),
            groups: Some(groups),
            miner_address: None,
            log_level: "info".to_string(),
        };
        let config = NodeConfig::load(&args.config, &args).unwrap();
        (Node::open(config).unwrap(), tmp)
    }

    fn grind(template: BlockTemplate, groups: u8) -> Block {
        let index = template.chain_index;
        let mut block = template.into_block([0u8; 32]);
        let mut counter: u32 = 0;
        loop {
            block.header.nonce[28..32].copy_from_slice(&counter.to_be_bytes());
            if block.header.chain_index(groups) == index {
                return block;
            }
            counter += 1;
        }
    }

    #[test]
    fn test_block_pipeline() {
        let (node, _tmp) = node(1);
        let index = ChainIndex::new(0, 0);
        let template = node.block_template(index, 64_000).unwrap();
        let block = grind(template, 1);

        let routed = node.add_block(&block, 64_000).unwrap();
        assert_eq!(routed, index);
        assert_eq!(
            node.chains.chain(index).read().hash_chain().best_tip(),
            Some(block.hash())
        );
    }

    #[test]
    fn test_sync_round_trip_between_two_nodes() {
        let (a, _tmp_a) = node(1);
        let (b, _tmp_b) = node(1);
        let index = ChainIndex::new(0, 0);

        // Node A mines two blocks.
        for i in 1..=2u64 {
            let template = a.block_template(index, 64_000 * i).unwrap();
            let block = grind(template, 1);
            a.add_block(&block, 64_000 * i).unwrap();
        }

        // B asks, A answers, B pulls, A serves, B catches up.
        let request = b.start_sync(false).unwrap();
        let response = a.handle_sync_payload(&request).unwrap().unwrap();
        let pull = b.handle_sync_payload(&response).unwrap().unwrap();
        assert!(matches!(pull, Payload::GetBlocks { ref hashes } if hashes.len() == 2));
        let delivery = a.handle_sync_payload(&pull).unwrap().unwrap();
        assert!(b.handle_sync_payload(&delivery).unwrap().is_none());

        assert_eq!(
            b.chains.chain(index).read().hash_chain().num_hashes(),
            a.chains.chain(index).read().hash_chain().num_hashes()
        );
    }

    #[test]
    fn test_intra_clique_start_sync_lists_holdings() {
        let (node, _tmp) = node(2);
        let payload = node.start_sync(true).unwrap();
        match payload {
            Payload::SyncResponse { inventories } => {
                assert_eq!(inventories.len(), 4);
                // Every chain reports at least its genesis.
                assert!(inventories.iter().all(|h| !h.is_empty()));
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
