//! Error types for mining.

use lattice_types::GroupIndex;
use thiserror::Error;

/// Mining-specific errors.
#[derive(Error, Debug)]
pub enum MiningError {
    /// No reward address configured for a group.
    #[error("no miner address for group {0}")]
    NoMinerAddress(GroupIndex),

    /// Chain layer failure while assembling a template.
    #[error(transparent)]
    Chain(#[from] lattice_chain::ChainError),
}

/// Result type for mining operations.
pub type MiningResult<T> = Result<T, MiningError>;
