//! Error types for state management.

use lattice_types::{AssetOutputRef, Hash};
use thiserror::Error;

/// State-specific errors.
#[derive(Error, Debug)]
pub enum StateError {
    /// A transaction consumed an output the state does not hold.
    #[error("missing input {0:?}")]
    MissingInput(AssetOutputRef),

    /// No committed state under this root.
    #[error("unknown state root {0}")]
    UnknownRoot(Hash),

    /// Stored state bytes failed to decode.
    #[error("corrupt state entry: {0}")]
    Corruption(String),

    /// Storage layer failure.
    #[error(transparent)]
    Storage(#[from] lattice_storage::StorageError),
}

/// Result type for state operations.
pub type StateResult<T> = Result<T, StateError>;
