//! Block headers and blocks.

use crate::codec::{Reader, Writer};
use crate::{
    dep_count, BlockHash, ChainIndex, GroupIndex, Hash, Target, Transaction, TxHash, TypesError,
    TypesResult,
};
use serde::{Deserialize, Serialize};

/// Maximum transactions carried by a single block on the wire.
const MAX_BLOCK_TXS: usize = 4096;

/// Ordered cross-chain dependency vector of a header on chain `(from, to)`.
///
/// Slot layout for `G` groups (`2*G - 1` slots total):
/// - `0 .. G-1`: incoming deps, one per group `g != from` in ascending
///   order, each on the intra-group chain `(g, g)`;
/// - `G-1 .. 2*G-2`: outgoing deps, one per group `u != to` in ascending
///   order, each on chain `(from, u)`;
/// - last slot: the direct parent on `(from, to)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDeps(pub Vec<BlockHash>);

impl BlockDeps {
    /// Wrap a dep vector, validating its length for `groups` groups.
    pub fn new(deps: Vec<BlockHash>, groups: u8) -> TypesResult<Self> {
        let expected = dep_count(groups);
        if deps.len() != expected {
            return Err(TypesError::BadDepCount {
                got: deps.len(),
                expected,
            });
        }
        Ok(Self(deps))
    }

    /// Direct parent on the header's own chain.
    pub fn parent(&self) -> BlockHash {
        *self.0.last().expect("dep vector is never empty")
    }

    /// The chain index slot `slot` refers to, for a header on `chain`.
    pub fn chain_of_slot(slot: usize, chain: ChainIndex, groups: u8) -> ChainIndex {
        let incoming = groups as usize - 1;
        if slot < incoming {
            // Ascending foreign groups, skipping `from`.
            let mut g = slot as u8;
            if g >= chain.from.0 {
                g += 1;
            }
            ChainIndex::new(g, g)
        } else if slot < 2 * incoming {
            let mut u = (slot - incoming) as u8;
            if u >= chain.to.0 {
                u += 1;
            }
            ChainIndex::new(chain.from.0, u)
        } else {
            chain
        }
    }

    /// Slot of the incoming dep standing for foreign group `g`.
    pub fn incoming_slot(g: GroupIndex, from: GroupIndex) -> usize {
        if g.0 < from.0 {
            g.0 as usize
        } else {
            g.0 as usize - 1
        }
    }

    /// Iterate `(slot_chain, dep_hash)` pairs for a header on `chain`.
    pub fn slots<'a>(
        &'a self,
        chain: ChainIndex,
        groups: u8,
    ) -> impl Iterator<Item = (ChainIndex, BlockHash)> + 'a {
        self.0
            .iter()
            .enumerate()
            .map(move |(slot, hash)| (Self::chain_of_slot(slot, chain, groups), *hash))
    }
}

/// Block header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Cross-chain dependency vector (`2*G - 1` entries).
    pub deps: BlockDeps,
    /// Root digest over the block's transactions.
    pub txs_root: Hash,
    /// Creation time, milliseconds since the epoch.
    pub timestamp: u64,
    /// Compact difficulty target.
    pub target: Target,
    /// Proof-of-work nonce.
    pub nonce: [u8; 32],
}

impl BlockHeader {
    /// Header identifier: digest of the serialized header.
    pub fn hash(&self) -> BlockHash {
        BlockHash::hash(&self.to_bytes())
    }

    /// Chain this header lands on, derived from its hash.
    pub fn chain_index(&self, groups: u8) -> ChainIndex {
        ChainIndex::from_hash(&self.hash(), groups)
    }

    /// Direct parent hash.
    pub fn parent(&self) -> BlockHash {
        self.deps.parent()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(64 + self.deps.0.len() * 32);
        self.write(&mut w);
        w.into_bytes()
    }

    fn write(&self, w: &mut Writer) {
        w.put_u16(self.deps.0.len() as u16);
        for dep in &self.deps.0 {
            w.put_bytes(dep.as_bytes());
        }
        w.put_bytes(self.txs_root.as_bytes());
        w.put_u64(self.timestamp);
        w.put_u32(self.target.0);
        w.put_bytes(&self.nonce);
    }

    pub fn from_bytes(bytes: &[u8]) -> TypesResult<Self> {
        let mut r = Reader::new(bytes);
        let header = Self::read(&mut r)?;
        r.finish()?;
        Ok(header)
    }

    fn read(r: &mut Reader<'_>) -> TypesResult<Self> {
        let dep_len = r.get_count(64)?;
        let mut deps = Vec::with_capacity(dep_len);
        for _ in 0..dep_len {
            deps.push(BlockHash(r.get_hash_bytes()?));
        }
        let txs_root = Hash(r.get_hash_bytes()?);
        let timestamp = r.get_u64()?;
        let target = Target(r.get_u32()?);
        let nonce = r.get_hash_bytes()?;
        Ok(Self {
            deps: BlockDeps(deps),
            txs_root,
            timestamp,
            target,
            nonce,
        })
    }
}

/// A block: header plus ordered transactions, coinbase last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    pub fn hash(&self) -> BlockHash {
        self.header.hash()
    }

    /// The coinbase, by convention the last transaction.
    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.last()
    }

    /// User transactions: everything but the coinbase.
    pub fn non_coinbase(&self) -> &[Transaction] {
        match self.transactions.len() {
            0 => &[],
            n => &self.transactions[..n - 1],
        }
    }

    /// Digest over the ordered transaction ids, committed in the header.
    pub fn compute_txs_root(transactions: &[Transaction]) -> Hash {
        let mut w = Writer::with_capacity(transactions.len() * 32);
        for tx in transactions {
            w.put_bytes(tx.hash().as_bytes());
        }
        Hash::hash(&w.into_bytes())
    }

    /// Hashes of all transactions in block order.
    pub fn tx_hashes(&self) -> Vec<TxHash> {
        self.transactions.iter().map(|tx| tx.hash()).collect()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(512);
        self.header.write(&mut w);
        w.put_u16(self.transactions.len() as u16);
        for tx in &self.transactions {
            tx.write(&mut w);
        }
        w.into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> TypesResult<Self> {
        let mut r = Reader::new(bytes);
        let header = BlockHeader::read(&mut r)?;
        let count = r.get_count(MAX_BLOCK_TXS)?;
        let mut transactions = Vec::with_capacity(count);
        for _ in 0..count {
            transactions.push(Transaction::read(&mut r)?);
        }
        r.finish()?;
        Ok(Self {
            header,
            transactions,
        })
    }
}
