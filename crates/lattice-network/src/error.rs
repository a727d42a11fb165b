//! Error types for the network layer.

use thiserror::Error;

/// Network-specific errors.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// The session is closed; no further events are accepted.
    #[error("session closed")]
    Closed,

    /// The peer channel went away mid-session.
    #[error("peer channel dropped")]
    ChannelDropped,
}

/// Result type for network operations.
pub type NetworkResult<T> = Result<T, NetworkError>;
