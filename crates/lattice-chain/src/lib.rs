//! # lattice-chain
//!
//! Per-chain block stores and the cross-chain view for the lattice
//! BlockDAG.
//!
//! This crate provides, bottom up:
//! - [`HashChain`]: the in-memory hash/height/weight tree of one chain,
//!   with its tip set and height roster
//! - [`HeaderChain`]: header persistence plus difficulty validation on
//!   top of a `HashChain`
//! - [`BlockChain`]: block bodies, transaction execution and world-state
//!   checkpoints on top of a `HeaderChain`
//! - [`MultiChain`]: the dense `G x G` array of chains
//! - [`BlockFlow`]: deterministic best-dependency assembly across chains,
//!   sync locators and inventories
//!
//! The trait tower of the conceptual design is composition here: a block
//! chain owns a header chain owns a hash chain, with delegated accessors.

mod blocks;
mod error;
mod flow;
mod headers;
mod multi;
mod tree;

pub use blocks::{genesis_block, BlockChain, BlockState};
pub use error::{ChainError, ChainResult};
pub use flow::{BlockFlow, ChainLocator, GroupDeps};
pub use headers::HeaderChain;
pub use multi::MultiChain;
pub use tree::{HashChain, NodeId};
