//! Error types for the storage layer.

use thiserror::Error;

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// RocksDB error.
    #[error("database error: {0}")]
    Database(#[from] rocksdb::Error),

    /// Column family not found.
    #[error("column family not found: {0}")]
    ColumnFamilyNotFound(String),

    /// Corruption detected while decoding a stored value.
    #[error("data corruption detected: {0}")]
    Corruption(String),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
