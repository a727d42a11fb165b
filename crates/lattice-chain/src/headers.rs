//! Header persistence and difficulty validation for one chain.

use crate::{ChainError, ChainResult, HashChain};
use lattice_consensus::{ConsensusSettings, DifficultyAdjustment};
use lattice_storage::{ColumnFamily, Storage, WriteBatch};
use lattice_types::{BlockHash, BlockHeader, ChainIndex, Target};
use std::sync::Arc;
use tracing::debug;

/// Header chain: a [`HashChain`] plus persisted headers and the
/// difficulty-adjustment rule.
pub struct HeaderChain {
    chain: HashChain,
    storage: Arc<dyn Storage>,
    settings: Arc<ConsensusSettings>,
}

impl HeaderChain {
    /// Create a header chain rooted at `genesis`, persisting the genesis
    /// header if it is not stored yet.
    pub fn new(
        chain_index: ChainIndex,
        genesis: &BlockHeader,
        storage: Arc<dyn Storage>,
        settings: Arc<ConsensusSettings>,
    ) -> ChainResult<Self> {
        let genesis_hash = genesis.hash();
        if !storage.contains(ColumnFamily::Headers, genesis_hash.as_bytes())? {
            storage.put(
                ColumnFamily::Headers,
                genesis_hash.as_bytes(),
                &genesis.to_bytes(),
            )?;
        }
        Ok(Self {
            chain: HashChain::new(
                chain_index,
                genesis_hash,
                genesis.timestamp,
                genesis.target,
                settings.tips_prune_interval,
            ),
            storage,
            settings,
        })
    }

    /// The underlying hash tree.
    pub fn hash_chain(&self) -> &HashChain {
        &self.chain
    }

    pub fn chain_index(&self) -> ChainIndex {
        self.chain.chain_index()
    }

    pub fn genesis_hash(&self) -> BlockHash {
        self.chain.genesis_hash()
    }

    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.chain.contains(hash)
    }

    /// Validate and append a header, staging its bytes into `batch`.
    ///
    /// The declared target must equal the value the retarget rule derives
    /// from the parent; mining uses [`HeaderChain::next_target`] with the
    /// same inputs, so honest blocks always match.
    pub fn add_batched(&mut self, batch: &mut WriteBatch, header: &BlockHeader) -> ChainResult<BlockHash> {
        let hash = header.hash();
        if self.chain.contains(&hash) {
            return Ok(hash);
        }
        let parent = header.parent();
        if !self.chain.contains(&parent) {
            return Err(ChainError::MissingParent(parent));
        }

        let expected = self.next_target(&parent)?;
        if header.target != expected {
            return Err(ChainError::InvalidTarget {
                got: header.target.to_string(),
                expected: expected.to_string(),
            });
        }

        batch.put(
            ColumnFamily::Headers,
            hash.as_bytes().to_vec(),
            header.to_bytes(),
        );
        self.chain
            .add(hash, parent, header.timestamp, header.target)?;

        let height = self.chain.get_height(&hash)?;
        debug!(chain = %self.chain.chain_index(), %hash, height, "header added");
        Ok(hash)
    }

    /// Validate, persist and append a header in one storage write.
    pub fn add(&mut self, header: &BlockHeader) -> ChainResult<BlockHash> {
        let mut batch = WriteBatch::new();
        let hash = self.add_batched(&mut batch, header)?;
        self.storage.write_batch(batch)?;
        Ok(hash)
    }

    /// Load a stored header.
    pub fn get_header(&self, hash: &BlockHash) -> ChainResult<BlockHeader> {
        match self.storage.get(ColumnFamily::Headers, hash.as_bytes())? {
            Some(bytes) => Ok(BlockHeader::from_bytes(&bytes)?),
            None => Err(ChainError::MissingBlock(*hash)),
        }
    }

    /// Target required for a child of `parent`.
    ///
    /// Median timestamps over `median_time_interval` blocks ending at the
    /// parent and at its parent; undefined medians (short chain) reuse the
    /// parent target.
    pub fn next_target(&self, parent: &BlockHash) -> ChainResult<Target> {
        let parent_target = self.chain.get_target(parent)?;
        let grandparent = match self.chain.get_parent(parent)? {
            Some(hash) => hash,
            None => return Ok(parent_target),
        };
        let window = self.settings.median_time_interval;
        let parent_window = self.chain.timestamps_back(parent, window)?;
        let grandparent_window = self.chain.timestamps_back(&grandparent, window)?;

        DifficultyAdjustment::new(&self.settings)
            .next_target(parent_target, &parent_window, &grandparent_window)
            .map_err(|e| ChainError::InvalidTarget {
                got: parent_target.to_string(),
                expected: e.to_string(),
            })
    }

    /// Headers whose timestamp falls in `[from_ts, until_ts)`, height
    /// order, with their heights.
    pub fn heighted_headers(
        &self,
        from_ts: u64,
        until_ts: u64,
    ) -> ChainResult<Vec<(u32, BlockHeader)>> {
        let mut out = Vec::new();
        for height in 0..=self.chain.best_height() {
            for hash in self.chain.hashes_at_height(height) {
                let ts = self.chain.get_timestamp(&hash)?;
                if ts >= from_ts && ts < until_ts {
                    out.push((height, self.get_header(&hash)?));
                }
            }
        }
        Ok(out)
    }
}
