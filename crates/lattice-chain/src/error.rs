//! Error types for chain management.

use lattice_types::BlockHash;
use thiserror::Error;

/// Chain-specific errors.
#[derive(Error, Debug)]
pub enum ChainError {
    /// A header references an unknown direct parent. The caller should
    /// queue the parent for download and retry.
    #[error("missing parent {0}")]
    MissingParent(BlockHash),

    /// A required block is not present locally. The caller should queue
    /// the hash for download and keep the original operation pending.
    #[error("missing block {0}")]
    MissingBlock(BlockHash),

    /// A block was routed to a chain its hash does not select.
    #[error("invalid chain index: got {got}, expected {expected}")]
    InvalidChainIndex { got: String, expected: String },

    /// A header declared a target different from the retarget rule.
    #[error("invalid target: got {got}, expected {expected}")]
    InvalidTarget { got: String, expected: String },

    /// The transactions root in the header does not match the body.
    #[error("invalid txs root for block {0}")]
    InvalidTxsRoot(BlockHash),

    /// Transaction execution failed; the whole block is rejected.
    #[error("invalid execution: {0}")]
    InvalidExecution(String),

    /// A height query above the referenced block.
    #[error("height {height} above block {hash}")]
    HeightOutOfRange { hash: BlockHash, height: u32 },

    /// Concurrent writers kept advancing chains while a cross-chain view
    /// was being assembled.
    #[error("cross-chain view contended, retries exhausted")]
    ViewContended,

    /// Storage layer failure.
    #[error(transparent)]
    Storage(#[from] lattice_storage::StorageError),

    /// State layer failure.
    #[error(transparent)]
    State(#[from] lattice_state::StateError),

    /// Decoding failure on stored bytes.
    #[error("corrupt chain entry: {0}")]
    Corruption(String),
}

impl From<lattice_types::TypesError> for ChainError {
    fn from(e: lattice_types::TypesError) -> Self {
        ChainError::Corruption(e.to_string())
    }
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;
