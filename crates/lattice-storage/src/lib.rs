//! # lattice-storage
//!
//! Storage layer for the lattice node.
//!
//! This crate provides a RocksDB-based column-family store with atomic
//! batch writes, plus an in-memory implementation for tests. Multi-key
//! invariants (block body + state root + chain state) always go through a
//! single [`WriteBatch`].
//!
//! ## Column families
//!
//! - `block-bodies`: serialized blocks indexed by block hash
//! - `headers`: serialized headers indexed by block hash
//! - `block-state`: per-block height, weight and world-state root
//! - `trie`: world-state nodes indexed by digest
//! - `node-state`: chain tips, initialization marker, misc node metadata

mod batch;
mod database;
mod error;
mod memory;

pub use batch::WriteBatch;
pub use database::Database;
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStorage;

/// Column families for organizing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnFamily {
    /// Serialized block bodies indexed by block hash.
    BlockBodies,
    /// Serialized headers indexed by block hash.
    Headers,
    /// Per-block state: height, weight, world-state root.
    BlockState,
    /// World-state trie nodes indexed by digest.
    Trie,
    /// Chain tips, initialization flag, node metadata.
    NodeState,
    /// Default column family (required by RocksDB).
    Default,
}

impl ColumnFamily {
    /// Get the string name of the column family.
    pub fn name(&self) -> &'static str {
        match self {
            ColumnFamily::BlockBodies => "block-bodies",
            ColumnFamily::Headers => "headers",
            ColumnFamily::BlockState => "block-state",
            ColumnFamily::Trie => "trie",
            ColumnFamily::NodeState => "node-state",
            ColumnFamily::Default => "default",
        }
    }

    /// Get all column families.
    pub fn all() -> &'static [ColumnFamily] {
        &[
            ColumnFamily::BlockBodies,
            ColumnFamily::Headers,
            ColumnFamily::BlockState,
            ColumnFamily::Trie,
            ColumnFamily::NodeState,
            ColumnFamily::Default,
        ]
    }
}

/// Storage trait for abstracting database operations.
///
/// This allows tests to run against [`MemoryStorage`] without touching
/// disk while the node runs on [`Database`].
pub trait Storage: Send + Sync {
    /// Get a value by key from a column family.
    fn get(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Put a key-value pair into a column family.
    fn put(&self, cf: ColumnFamily, key: &[u8], value: &[u8]) -> StorageResult<()>;

    /// Delete a key from a column family.
    fn delete(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<()>;

    /// Check if a key exists in a column family.
    fn contains(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<bool> {
        Ok(self.get(cf, key)?.is_some())
    }

    /// Execute a batch of writes atomically.
    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()>;

    /// Iterate all entries of a column family.
    fn iter(&self, cf: ColumnFamily)
        -> StorageResult<Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_>>;
}
