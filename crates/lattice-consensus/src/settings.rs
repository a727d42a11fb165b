//! Consensus settings.

use lattice_types::{Target, DEFAULT_GROUPS};
use serde::{Deserialize, Serialize};

fn default_groups() -> u8 {
    DEFAULT_GROUPS
}

fn default_tips_prune_interval() -> u32 {
    100
}

fn default_block_cache_capacity() -> usize {
    25
}

fn default_median_time_interval() -> usize {
    11
}

fn default_expected_time_span() -> u64 {
    64_000
}

fn default_time_span_min() -> u64 {
    default_expected_time_span() / 4
}

fn default_time_span_max() -> u64 {
    default_expected_time_span() * 4
}

/// Network-wide consensus settings, shared by all `G * G` chains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusSettings {
    /// Number of address groups.
    #[serde(default = "default_groups")]
    pub groups: u8,
    /// Height distance behind the best tip past which stale tips are
    /// dropped from the tip set.
    #[serde(default = "default_tips_prune_interval")]
    pub tips_prune_interval: u32,
    /// Blocks cached in memory per chain.
    #[serde(default = "default_block_cache_capacity")]
    pub block_cache_capacity_per_chain: usize,
    /// Number of timestamps in each median window.
    #[serde(default = "default_median_time_interval")]
    pub median_time_interval: usize,
    /// Expected milliseconds between two blocks on one chain.
    #[serde(default = "default_expected_time_span")]
    pub expected_time_span: u64,
    /// Lower clamp on the retarget timespan, milliseconds.
    #[serde(default = "default_time_span_min")]
    pub time_span_min: u64,
    /// Upper clamp on the retarget timespan, milliseconds.
    #[serde(default = "default_time_span_max")]
    pub time_span_max: u64,
    /// Easiest allowed mining target, compact form.
    #[serde(default = "ConsensusSettings::default_max_target")]
    pub max_mining_target: Target,
}

impl ConsensusSettings {
    fn default_max_target() -> Target {
        // 2^228 - 1, leaves plenty of headroom above any real target.
        Target(0x2100ffff)
    }

    /// Settings with the conventional `expected / 4` and `expected * 4`
    /// timespan clamps.
    pub fn with_groups(groups: u8) -> Self {
        let expected = default_expected_time_span();
        Self {
            groups,
            tips_prune_interval: default_tips_prune_interval(),
            block_cache_capacity_per_chain: default_block_cache_capacity(),
            median_time_interval: default_median_time_interval(),
            expected_time_span: expected,
            time_span_min: expected / 4,
            time_span_max: expected * 4,
            max_mining_target: Self::default_max_target(),
        }
    }

    /// Total number of chains.
    pub fn chain_count(&self) -> usize {
        self.groups as usize * self.groups as usize
    }

    /// Number of dependencies per header.
    pub fn dep_count(&self) -> usize {
        lattice_types::dep_count(self.groups)
    }
}

impl Default for ConsensusSettings {
    fn default() -> Self {
        Self::with_groups(DEFAULT_GROUPS)
    }
}
