//! Error types for consensus rules.

use thiserror::Error;

/// Consensus-specific errors.
#[derive(Error, Debug)]
pub enum ConsensusError {
    /// A header declared a target different from the retarget rule.
    #[error("invalid target: got {got}, expected {expected}")]
    InvalidTarget { got: String, expected: String },

    /// A timestamp window was shorter than the configured interval.
    #[error("timestamp window too short: {got} < {needed}")]
    WindowTooShort { got: usize, needed: usize },
}

/// Result type for consensus operations.
pub type ConsensusResult<T> = Result<T, ConsensusError>;
