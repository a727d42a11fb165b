//! In-memory hash tree of one chain.
//!
//! Nodes live in an arena indexed by [`NodeId`]; parent and child links
//! are indices, not owning pointers, and nodes are never removed, so an
//! id handed out once stays valid for the life of the chain. Only the tip
//! set is pruned.

use crate::{ChainError, ChainResult};
use lattice_types::{BlockHash, ChainIndex, Target};
use num_bigint::BigUint;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Arena index of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

/// One block position in the tree.
#[derive(Debug, Clone)]
struct TreeNode {
    hash: BlockHash,
    height: u32,
    weight: BigUint,
    timestamp: u64,
    target: Target,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Hash/height/weight index of a single chain.
pub struct HashChain {
    chain_index: ChainIndex,
    nodes: Vec<TreeNode>,
    by_hash: HashMap<BlockHash, NodeId>,
    /// Blocks with no children, ordered by hash for deterministic scans.
    tips: BTreeSet<BlockHash>,
    /// Per-height roster; doubles as the `(height asc, hash asc)` index.
    by_height: BTreeMap<u32, BTreeSet<BlockHash>>,
    /// Height below which stale tips have been dropped from the tip set.
    pruned_height: u32,
    tips_prune_interval: u32,
    /// Bumped on every `add`; snapshot by cross-chain readers.
    sequence: AtomicU64,
}

impl HashChain {
    /// Create a chain rooted at its genesis block.
    pub fn new(
        chain_index: ChainIndex,
        genesis: BlockHash,
        genesis_timestamp: u64,
        genesis_target: Target,
        tips_prune_interval: u32,
    ) -> Self {
        let root = TreeNode {
            hash: genesis,
            height: 0,
            weight: genesis_target.work(),
            timestamp: genesis_timestamp,
            target: genesis_target,
            parent: None,
            children: Vec::new(),
        };
        let mut by_hash = HashMap::new();
        by_hash.insert(genesis, NodeId(0));
        let mut tips = BTreeSet::new();
        tips.insert(genesis);
        let mut by_height = BTreeMap::new();
        by_height.insert(0, BTreeSet::from([genesis]));
        Self {
            chain_index,
            nodes: vec![root],
            by_hash,
            tips,
            by_height,
            pruned_height: 0,
            tips_prune_interval,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn chain_index(&self) -> ChainIndex {
        self.chain_index
    }

    pub fn genesis_hash(&self) -> BlockHash {
        self.nodes[0].hash
    }

    /// Number of blocks indexed, genesis included.
    pub fn num_hashes(&self) -> usize {
        self.nodes.len()
    }

    /// Sequence number, bumped on every mutation.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.by_hash.contains_key(hash)
    }

    fn node(&self, hash: &BlockHash) -> ChainResult<&TreeNode> {
        self.by_hash
            .get(hash)
            .map(|id| &self.nodes[id.0 as usize])
            .ok_or(ChainError::MissingBlock(*hash))
    }

    /// Append a block under its parent. Re-adding a known hash is a no-op:
    /// headers are append-only and never change.
    pub fn add(
        &mut self,
        hash: BlockHash,
        parent: BlockHash,
        timestamp: u64,
        target: Target,
    ) -> ChainResult<()> {
        if self.contains(&hash) {
            return Ok(());
        }
        let parent_id = *self
            .by_hash
            .get(&parent)
            .ok_or(ChainError::MissingParent(parent))?;

        let (height, weight) = {
            let parent_node = &self.nodes[parent_id.0 as usize];
            (parent_node.height + 1, &parent_node.weight + target.work())
        };

        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(TreeNode {
            hash,
            height,
            weight,
            timestamp,
            target,
            parent: Some(parent_id),
            children: Vec::new(),
        });
        self.nodes[parent_id.0 as usize].children.push(id);
        self.by_hash.insert(hash, id);
        self.by_height.entry(height).or_default().insert(hash);

        self.tips.remove(&parent);
        self.tips.insert(hash);
        self.prune_tips();

        self.sequence.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Drop tips that fell far behind the best tip. Nodes stay in the
    /// arena; only the tip set shrinks, which bounds its size.
    fn prune_tips(&mut self) {
        let best_height = match self.best_tip().map(|tip| self.nodes[self.by_hash[&tip].0 as usize].height)
        {
            Some(h) => h,
            None => return,
        };
        if best_height <= self.pruned_height + self.tips_prune_interval {
            return;
        }
        let cutoff = best_height.saturating_sub(self.tips_prune_interval);
        let stale: Vec<BlockHash> = self
            .tips
            .iter()
            .filter(|tip| self.nodes[self.by_hash[*tip].0 as usize].height < cutoff)
            .copied()
            .collect();
        for tip in stale {
            self.tips.remove(&tip);
            debug!(chain = %self.chain_index, %tip, "pruned stale tip");
        }
        self.pruned_height = cutoff;
    }

    pub fn is_tip(&self, hash: &BlockHash) -> bool {
        self.tips.contains(hash)
    }

    /// Current tips, hash order.
    pub fn tips(&self) -> Vec<BlockHash> {
        self.tips.iter().copied().collect()
    }

    /// Tips ordered heaviest first, ties by smaller hash.
    pub fn tips_by_weight(&self) -> Vec<BlockHash> {
        let mut tips = self.tips();
        tips.sort_by(|a, b| {
            let wa = &self.nodes[self.by_hash[a].0 as usize].weight;
            let wb = &self.nodes[self.by_hash[b].0 as usize].weight;
            wb.cmp(wa).then_with(|| a.cmp(b))
        });
        tips
    }

    /// The heaviest tip, ties broken by smaller hash.
    pub fn best_tip(&self) -> Option<BlockHash> {
        self.tips_by_weight().into_iter().next()
    }

    pub fn get_height(&self, hash: &BlockHash) -> ChainResult<u32> {
        Ok(self.node(hash)?.height)
    }

    pub fn get_weight(&self, hash: &BlockHash) -> ChainResult<BigUint> {
        Ok(self.node(hash)?.weight.clone())
    }

    pub fn get_timestamp(&self, hash: &BlockHash) -> ChainResult<u64> {
        Ok(self.node(hash)?.timestamp)
    }

    pub fn get_target(&self, hash: &BlockHash) -> ChainResult<Target> {
        Ok(self.node(hash)?.target)
    }

    pub fn get_parent(&self, hash: &BlockHash) -> ChainResult<Option<BlockHash>> {
        Ok(self
            .node(hash)?
            .parent
            .map(|id| self.nodes[id.0 as usize].hash))
    }

    /// Ancestor of `hash` at height `height`.
    pub fn get_predecessor(&self, hash: &BlockHash, height: u32) -> ChainResult<BlockHash> {
        let mut node = self.node(hash)?;
        if height > node.height {
            return Err(ChainError::HeightOutOfRange {
                hash: *hash,
                height,
            });
        }
        while node.height > height {
            let parent = node.parent.expect("non-genesis node has a parent");
            node = &self.nodes[parent.0 as usize];
        }
        Ok(node.hash)
    }

    /// Inclusive path from height `until` up to `hash`, ascending height.
    pub fn chain_back(&self, hash: &BlockHash, until: u32) -> ChainResult<Vec<BlockHash>> {
        let mut node = self.node(hash)?;
        if until > node.height {
            return Err(ChainError::HeightOutOfRange {
                hash: *hash,
                height: until,
            });
        }
        let mut path = Vec::with_capacity((node.height - until + 1) as usize);
        loop {
            path.push(node.hash);
            if node.height == until {
                break;
            }
            let parent = node.parent.expect("non-genesis node has a parent");
            node = &self.nodes[parent.0 as usize];
        }
        path.reverse();
        Ok(path)
    }

    /// Whether `ancestor` is on the path from genesis to `descendant`
    /// (equality included).
    pub fn is_ancestor_or_equal(
        &self,
        ancestor: &BlockHash,
        descendant: &BlockHash,
    ) -> ChainResult<bool> {
        let anc_height = self.get_height(ancestor)?;
        let desc_height = self.get_height(descendant)?;
        if anc_height > desc_height {
            return Ok(false);
        }
        Ok(self.get_predecessor(descendant, anc_height)? == *ancestor)
    }

    /// Up to `count` timestamps of the path ending at `hash`, ascending
    /// height. Shorter when the chain is shorter.
    pub fn timestamps_back(&self, hash: &BlockHash, count: usize) -> ChainResult<Vec<u64>> {
        let mut node = self.node(hash)?;
        let mut timestamps = Vec::with_capacity(count);
        loop {
            timestamps.push(node.timestamp);
            if timestamps.len() == count {
                break;
            }
            match node.parent {
                Some(parent) => node = &self.nodes[parent.0 as usize],
                None => break,
            }
        }
        timestamps.reverse();
        Ok(timestamps)
    }

    /// Strict descendants of `locator`, breadth-first in height order,
    /// ties by hash.
    pub fn get_hashes_after(&self, locator: &BlockHash) -> ChainResult<Vec<BlockHash>> {
        let start = *self
            .by_hash
            .get(locator)
            .ok_or(ChainError::MissingBlock(*locator))?;
        let mut out: Vec<(u32, BlockHash)> = Vec::new();
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            for child in &self.nodes[id.0 as usize].children {
                let node = &self.nodes[child.0 as usize];
                out.push((node.height, node.hash));
                queue.push_back(*child);
            }
        }
        out.sort_unstable();
        Ok(out.into_iter().map(|(_, hash)| hash).collect())
    }

    /// Hashes at exactly `height`, ascending.
    pub fn hashes_at_height(&self, height: u32) -> Vec<BlockHash> {
        self.by_height
            .get(&height)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Height of the heaviest tip.
    pub fn best_height(&self) -> u32 {
        self.best_tip()
            .and_then(|tip| self.get_height(&tip).ok())
            .unwrap_or(0)
    }
}
