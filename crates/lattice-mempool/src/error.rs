//! Error types for the mempool.

use lattice_types::{AssetOutputRef, TxHash};
use thiserror::Error;

/// Mempool-specific errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MempoolError {
    /// An input is already consumed by a pooled transaction.
    #[error("double spend of {0:?}")]
    DoubleSpend(AssetOutputRef),

    /// The transaction is already pooled.
    #[error("transaction {0} already known")]
    AlreadyKnown(TxHash),

    /// The pool is at capacity and cannot make room.
    #[error("pool full at capacity {0}")]
    PoolFull(usize),

    /// The queried output is spent by a pooled transaction.
    #[error("output {0:?} is spent")]
    Spent(AssetOutputRef),
}

/// Result type for mempool operations.
pub type MempoolResult<T> = Result<T, MempoolError>;
