//! # lattice-types
//!
//! Core data types for the lattice BlockDAG node.
//!
//! This crate provides:
//! - Fixed-width hash identifiers (`Hash`, `BlockHash`, `TxHash`)
//! - Group and chain indexing over the `G x G` chain lattice
//! - Block headers with cross-chain dependency vectors
//! - Transactions, outputs and output references
//! - Compact difficulty targets and proof-of-work weight
//! - Binary serialization for everything persisted or gossiped
//!
//! ## Chain lattice
//!
//! The ledger is partitioned into `G * G` chains, one per ordered pair of
//! groups. A block on chain `(from, to)` references `2*G - 1` predecessors:
//! one incoming dep per foreign group, one outgoing dep per sibling chain,
//! and its direct parent. See [`BlockDeps`] for the slot layout.

mod block;
mod codec;
mod error;
mod hash;
mod index;
mod metrics;
mod target;
mod transaction;

pub use block::{Block, BlockDeps, BlockHeader};
pub use codec::{Reader, Writer};
pub use error::{TypesError, TypesResult};
pub use hash::{blake2b_256, BlockHash, Hash, TxHash, HASH_LENGTH};
pub use index::{BrokerInfo, ChainIndex, CliqueId, GroupIndex};
pub use metrics::{noop as noop_metrics, MetricsSink, NoopMetrics};
pub use target::Target;
pub use transaction::{
    AssetOutputRef, ContractOutputRef, LockupScript, Transaction, TxOutput, TxTemplate,
    UnsignedTransaction,
};

/// Default number of groups.
pub const DEFAULT_GROUPS: u8 = 4;

/// Number of dependencies carried by a header for `groups` groups.
pub const fn dep_count(groups: u8) -> usize {
    2 * groups as usize - 1
}
