//! Network settings.

use serde::{Deserialize, Serialize};

fn default_ping_frequency_ms() -> u64 {
    10_000
}

fn default_retry_timeout_ms() -> u64 {
    10_000
}

fn default_ban_duration_ms() -> u64 {
    60 * 60 * 1000
}

fn default_penalty_forgiveness_ms() -> u64 {
    10 * 60 * 1000
}

fn default_penalty_frequency_ms() -> u64 {
    60 * 1000
}

fn default_ban_threshold() -> u32 {
    100
}

fn default_num_of_sync_blocks_limit() -> usize {
    128
}

/// Broker networking knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Interval between pings; a pong must arrive before the next tick.
    #[serde(default = "default_ping_frequency_ms")]
    pub ping_frequency_ms: u64,
    /// Handshake and request timeout.
    #[serde(default = "default_retry_timeout_ms")]
    pub retry_timeout_ms: u64,
    /// How long a ban lasts.
    #[serde(default = "default_ban_duration_ms")]
    pub ban_duration_ms: u64,
    /// Age past which an untouched penalty resets to zero.
    #[serde(default = "default_penalty_forgiveness_ms")]
    pub penalty_forgiveness_ms: u64,
    /// One penalty unit is forgiven per elapsed interval.
    #[serde(default = "default_penalty_frequency_ms")]
    pub penalty_frequency_ms: u64,
    /// Penalty score at which a peer is banned.
    #[serde(default = "default_ban_threshold")]
    pub ban_threshold: u32,
    /// Per-chain cap on hashes returned to one sync request.
    #[serde(default = "default_num_of_sync_blocks_limit")]
    pub num_of_sync_blocks_limit: usize,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            ping_frequency_ms: default_ping_frequency_ms(),
            retry_timeout_ms: default_retry_timeout_ms(),
            ban_duration_ms: default_ban_duration_ms(),
            penalty_forgiveness_ms: default_penalty_forgiveness_ms(),
            penalty_frequency_ms: default_penalty_frequency_ms(),
            ban_threshold: default_ban_threshold(),
            num_of_sync_blocks_limit: default_num_of_sync_blocks_limit(),
        }
    }
}
