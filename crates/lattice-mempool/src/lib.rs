//! # lattice-mempool
//!
//! Transaction mempool for the lattice node.
//!
//! This crate provides:
//! - [`TxIndexes`]: input/output/address indexes over a pool
//! - [`SharedPool`]: the admission pool, FIFO-evicted on overflow
//! - [`PendingPool`]: transactions whose inputs resolve against the
//!   persisted world state, ready to mine
//! - [`MemPool`]: the per-group facade routing between the two layers
//!
//! Double-spend detection is structural: no two transactions across the
//! shared and pending layers may consume the same output reference.
//!
//! ## Locking
//!
//! Each pool is guarded by one reader/writer lock. No pool method calls
//! another pool method while holding its write lock, so the two layers
//! can never deadlock against each other.

mod error;
mod indexes;
mod mempool;
mod pool;

pub use error::{MempoolError, MempoolResult};
pub use indexes::TxIndexes;
pub use mempool::{MemPool, MemPoolSettings};
pub use pool::{PendingPool, PoolEntry, SharedPool};
