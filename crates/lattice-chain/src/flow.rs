//! Cross-chain view assembly.
//!
//! For every group the broker serves, BlockFlow picks one block per chain
//! touching that group such that the chosen blocks agree on history:
//! each one's recorded cross-chain view must be an ancestor-or-equal of
//! every other chosen block on the shared chain. Selection is greedy over
//! tips in descending weight with deterministic tie-breaks, so all honest
//! nodes derive the same dependency vector from the same tip sets.

use crate::{ChainError, ChainResult, MultiChain};
use lattice_types::{BlockDeps, BlockHash, ChainIndex, GroupIndex};
use std::sync::Arc;
use tracing::trace;

/// Attempts at a consistent snapshot before giving up.
const MAX_VIEW_RETRIES: usize = 8;

/// The best dependency selection for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDeps {
    pub group: GroupIndex,
    /// One dep per foreign group, ascending, each on that group's
    /// intra-group chain.
    pub in_deps: Vec<BlockHash>,
    /// One dep per chain `(group, u)` for every `u`, ascending.
    pub out_deps: Vec<BlockHash>,
}

impl GroupDeps {
    /// The flat `2*G - 1` dependency vector.
    pub fn flatten(&self) -> Vec<BlockHash> {
        let mut out = self.in_deps.clone();
        out.extend_from_slice(&self.out_deps);
        out
    }

    /// Direct parent implied for chain `(group, to)`.
    pub fn parent_for(&self, to: GroupIndex) -> BlockHash {
        self.out_deps[to.0 as usize]
    }

    /// Header dep vector for a block on `(group, to)`: incoming deps,
    /// outgoing deps without `to`, then the direct parent last.
    pub fn header_deps(&self, to: GroupIndex) -> BlockDeps {
        let mut deps = self.in_deps.clone();
        for (u, dep) in self.out_deps.iter().enumerate() {
            if u != to.0 as usize {
                deps.push(*dep);
            }
        }
        deps.push(self.out_deps[to.0 as usize]);
        BlockDeps(deps)
    }
}

/// Sparse ancestor list of one chain's best tip, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLocator {
    pub chain_index: ChainIndex,
    pub hashes: Vec<BlockHash>,
}

/// Cross-chain best view over a [`MultiChain`].
pub struct BlockFlow {
    chains: Arc<MultiChain>,
}

impl BlockFlow {
    pub fn new(chains: Arc<MultiChain>) -> Self {
        Self { chains }
    }

    pub fn chains(&self) -> &MultiChain {
        &self.chains
    }

    /// Best tip of one chain.
    pub fn best_tip(&self, index: ChainIndex) -> BlockHash {
        self.chains
            .chain(index)
            .read()
            .hash_chain()
            .best_tip()
            .expect("chains always hold at least genesis")
    }

    /// Best dependency vector for `group`.
    ///
    /// Chains advance while we read; each chain exposes a sequence number
    /// bumped on every add, so we snapshot, compute, and retry whenever
    /// any chain moved mid-computation.
    pub fn get_best_deps(&self, group: GroupIndex) -> ChainResult<GroupDeps> {
        for _ in 0..MAX_VIEW_RETRIES {
            let before = self.chains.sequences();
            let deps = self.compute_best_deps(group)?;
            if self.chains.sequences() == before {
                return Ok(deps);
            }
            trace!(%group, "chains advanced during view assembly, retrying");
        }
        Err(ChainError::ViewContended)
    }

    /// One greedy pass over the slot chains of `group`.
    fn compute_best_deps(&self, group: GroupIndex) -> ChainResult<GroupDeps> {
        let groups = self.chains.settings().groups;
        let mut slot_chains = Vec::with_capacity(2 * groups as usize - 1);
        for g in 0..groups {
            if g != group.0 {
                slot_chains.push(ChainIndex::new(g, g));
            }
        }
        for u in 0..groups {
            slot_chains.push(ChainIndex::new(group.0, u));
        }

        let mut selected: Vec<(ChainIndex, BlockHash)> = Vec::with_capacity(slot_chains.len());
        for chain_index in slot_chains {
            let candidates = self
                .chains
                .chain(chain_index)
                .read()
                .hash_chain()
                .tips_by_weight();

            let mut choice = None;
            for candidate in candidates {
                if self.compatible(chain_index, &candidate, &selected)? {
                    choice = Some(candidate);
                    break;
                }
            }
            let choice = match choice {
                Some(hash) => hash,
                None => self.fallback_view(chain_index, &selected)?,
            };
            selected.push((chain_index, choice));
        }

        let in_deps = selected[..groups as usize - 1]
            .iter()
            .map(|(_, hash)| *hash)
            .collect();
        let out_deps = selected[groups as usize - 1..]
            .iter()
            .map(|(_, hash)| *hash)
            .collect();
        Ok(GroupDeps {
            group,
            in_deps,
            out_deps,
        })
    }

    /// Mutual-consistency check of a candidate against the selection so
    /// far: each side's recorded view of the other's chain, where it has
    /// one, must be an ancestor-or-equal of the other's chosen block.
    fn compatible(
        &self,
        chain_index: ChainIndex,
        candidate: &BlockHash,
        selected: &[(ChainIndex, BlockHash)],
    ) -> ChainResult<bool> {
        for (other_chain, other) in selected {
            if let Some(view) = self.view_of(*other_chain, other, chain_index)? {
                if !self.ancestor_or_equal(chain_index, &view, candidate)? {
                    return Ok(false);
                }
            }
            if let Some(view) = self.view_of(chain_index, candidate, *other_chain)? {
                if !self.ancestor_or_equal(*other_chain, &view, other)? {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// When no tip fits the selection, fall back to the newest block on
    /// `chain_index` that the already-selected deps themselves point at;
    /// with no such pointer the chain's genesis is always consistent.
    fn fallback_view(
        &self,
        chain_index: ChainIndex,
        selected: &[(ChainIndex, BlockHash)],
    ) -> ChainResult<BlockHash> {
        let mut best: Option<(u32, BlockHash)> = None;
        for (other_chain, other) in selected {
            if let Some(view) = self.view_of(*other_chain, other, chain_index)? {
                let height = self
                    .chains
                    .chain(chain_index)
                    .read()
                    .hash_chain()
                    .get_height(&view)?;
                let replace = match &best {
                    Some((h, hash)) => height > *h || (height == *h && view < *hash),
                    None => true,
                };
                if replace {
                    best = Some((height, view));
                }
            }
        }
        Ok(match best {
            Some((_, hash)) => hash,
            None => self.chains.chain(chain_index).read().genesis_hash(),
        })
    }

    /// The block on `target` implied by `block` (on `chain_index`): the
    /// block itself on its own chain, otherwise its recorded dep for that
    /// chain. Zero deps (genesis) resolve to the target's genesis.
    fn view_of(
        &self,
        chain_index: ChainIndex,
        block: &BlockHash,
        target: ChainIndex,
    ) -> ChainResult<Option<BlockHash>> {
        if chain_index == target {
            return Ok(Some(*block));
        }
        let header = self
            .chains
            .chain(chain_index)
            .read()
            .headers()
            .get_header(block)?;
        let groups = self.chains.settings().groups;
        for (slot_chain, dep) in header.deps.slots(chain_index, groups) {
            if slot_chain == target {
                if dep == BlockHash::ZERO {
                    return Ok(Some(self.chains.chain(target).read().genesis_hash()));
                }
                return Ok(Some(dep));
            }
        }
        Ok(None)
    }

    fn ancestor_or_equal(
        &self,
        chain_index: ChainIndex,
        ancestor: &BlockHash,
        descendant: &BlockHash,
    ) -> ChainResult<bool> {
        self.chains
            .chain(chain_index)
            .read()
            .hash_chain()
            .is_ancestor_or_equal(ancestor, descendant)
    }

    /// Locators for every chain this broker stores: the best tip's
    /// ancestors at exponentially spaced back-steps, genesis last.
    pub fn get_sync_locators(&self) -> ChainResult<Vec<ChainLocator>> {
        let mut locators = Vec::new();
        for chain_index in self.chains.owned_chains() {
            let chain = self.chains.chain(chain_index).read();
            let tree = chain.hash_chain();
            let tip = tree.best_tip().expect("chains always hold at least genesis");
            let tip_height = tree.get_height(&tip)?;

            let mut hashes = Vec::new();
            let mut back = 0u32;
            loop {
                let height = tip_height.saturating_sub(back);
                let hash = tree.get_predecessor(&tip, height)?;
                if hashes.last() != Some(&hash) {
                    hashes.push(hash);
                }
                if height == 0 {
                    break;
                }
                back = if back == 0 { 1 } else { back * 2 };
            }
            locators.push(ChainLocator {
                chain_index,
                hashes,
            });
        }
        Ok(locators)
    }

    /// For each remote locator, the hashes this node has past the newest
    /// locator entry it recognizes, height order, capped at `limit` per
    /// chain.
    pub fn get_sync_inventories(
        &self,
        remote: &[ChainLocator],
        limit: usize,
    ) -> ChainResult<Vec<ChainLocator>> {
        let mut inventories = Vec::new();
        for locator in remote {
            let chain = self.chains.chain(locator.chain_index).read();
            let tree = chain.hash_chain();
            let anchor = locator
                .hashes
                .iter()
                .find(|hash| tree.contains(hash))
                .copied()
                .unwrap_or_else(|| chain.genesis_hash());
            let mut hashes = tree.get_hashes_after(&anchor)?;
            hashes.truncate(limit);
            inventories.push(ChainLocator {
                chain_index: locator.chain_index,
                hashes,
            });
        }
        Ok(inventories)
    }

    /// Every hash this broker stores on the chains a fellow clique member
    /// also stores, genesis included, height order per chain.
    pub fn get_intra_clique_sync_hashes(
        &self,
        remote: &lattice_types::BrokerInfo,
    ) -> ChainResult<Vec<ChainLocator>> {
        let mut out = Vec::new();
        for chain_index in self.chains.broker().common_chains(remote) {
            let chain = self.chains.chain(chain_index).read();
            let genesis = chain.genesis_hash();
            let mut hashes = vec![genesis];
            hashes.extend(chain.hash_chain().get_hashes_after(&genesis)?);
            out.push(ChainLocator {
                chain_index,
                hashes,
            });
        }
        Ok(out)
    }
}
