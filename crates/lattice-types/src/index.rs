//! Group and chain indexing.
//!
//! Groups partition addresses; every ordered pair of groups identifies one
//! chain, giving `G * G` chains in total. A broker covers a contiguous
//! slice of groups and stores every chain touching that slice.

use crate::{BlockHash, Hash, TypesError, TypesResult};
use serde::{Deserialize, Serialize};

/// Index of an address group, in `[0, groups)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupIndex(pub u8);

impl GroupIndex {
    /// Validate against the group count.
    pub fn checked(value: u8, groups: u8) -> TypesResult<Self> {
        if value >= groups {
            return Err(TypesError::BadGroup { got: value, groups });
        }
        Ok(Self(value))
    }
}

impl std::fmt::Display for GroupIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered pair of groups identifying one of the `G * G` chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChainIndex {
    pub from: GroupIndex,
    pub to: GroupIndex,
}

impl ChainIndex {
    /// Build a chain index from raw group values.
    pub fn new(from: u8, to: u8) -> Self {
        Self {
            from: GroupIndex(from),
            to: GroupIndex(to),
        }
    }

    /// Derive the chain index of a block from its hash: the last two bytes
    /// interpreted big-endian, modulo `G * G`.
    pub fn from_hash(hash: &BlockHash, groups: u8) -> Self {
        let bytes = hash.as_bytes();
        let raw = u16::from_be_bytes([bytes[30], bytes[31]]);
        let flat = raw % (groups as u16 * groups as u16);
        Self {
            from: GroupIndex((flat / groups as u16) as u8),
            to: GroupIndex((flat % groups as u16) as u8),
        }
    }

    /// Flat index into a dense `G * G` array.
    pub fn flat_index(&self, groups: u8) -> usize {
        self.from.0 as usize * groups as usize + self.to.0 as usize
    }

    /// Inverse of [`ChainIndex::flat_index`].
    pub fn from_flat(flat: usize, groups: u8) -> Self {
        Self {
            from: GroupIndex((flat / groups as usize) as u8),
            to: GroupIndex((flat % groups as usize) as u8),
        }
    }

    /// Whether this is an intra-group chain `(g, g)`.
    pub fn is_intra_group(&self) -> bool {
        self.from == self.to
    }
}

impl std::fmt::Display for ChainIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.from, self.to)
    }
}

/// Identifier of a clique: the set of brokers jointly covering all chains.
pub type CliqueId = Hash;

/// A broker's position inside its clique.
///
/// Broker `b` of `n` brokers over `G` groups owns the contiguous slice
/// `[b * G/n, (b+1) * G/n)` and stores every chain whose `from` or `to`
/// group falls inside that slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerInfo {
    pub clique_id: CliqueId,
    pub broker_id: u8,
    pub broker_num: u8,
    pub groups: u8,
}

impl BrokerInfo {
    /// First group of the owned slice.
    pub fn group_from(&self) -> u8 {
        self.broker_id * (self.groups / self.broker_num)
    }

    /// One past the last group of the owned slice.
    pub fn group_until(&self) -> u8 {
        (self.broker_id + 1) * (self.groups / self.broker_num)
    }

    /// Whether this broker owns `group`.
    pub fn contains_group(&self, group: GroupIndex) -> bool {
        group.0 >= self.group_from() && group.0 < self.group_until()
    }

    /// Whether this broker stores `chain`.
    pub fn contains_chain(&self, chain: ChainIndex) -> bool {
        self.contains_group(chain.from) || self.contains_group(chain.to)
    }

    /// Iterate the groups owned by this broker.
    pub fn owned_groups(&self) -> impl Iterator<Item = GroupIndex> {
        (self.group_from()..self.group_until()).map(GroupIndex)
    }

    /// Iterate the chains stored by this broker, in flat-index order.
    pub fn owned_chains(&self) -> Vec<ChainIndex> {
        let groups = self.groups;
        (0..groups as usize * groups as usize)
            .map(|flat| ChainIndex::from_flat(flat, groups))
            .filter(|chain| self.contains_chain(*chain))
            .collect()
    }

    /// Chains stored by both `self` and `other` (same group count assumed).
    pub fn common_chains(&self, other: &BrokerInfo) -> Vec<ChainIndex> {
        self.owned_chains()
            .into_iter()
            .filter(|chain| other.contains_chain(*chain))
            .collect()
    }

    /// A single-broker clique covering every group.
    pub fn solo(clique_id: CliqueId, groups: u8) -> Self {
        Self {
            clique_id,
            broker_id: 0,
            broker_num: 1,
            groups,
        }
    }
}
