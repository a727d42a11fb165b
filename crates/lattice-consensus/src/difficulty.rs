//! DigiShield-style difficulty adjustment.
//!
//! The retarget input is the distance between two median timestamps: the
//! window ending at the parent and the window ending at the grandparent.
//! Medians absorb outlier timestamps; the damping term limits how fast a
//! single retarget can move; the clamp bounds the extreme case.

use crate::{ConsensusSettings, ConsensusResult};
use lattice_types::Target;
use num_bigint::BigUint;
use tracing::trace;

/// Median of a timestamp window: the element at position `window / 2`
/// after sorting. `None` when the chain is shorter than the window.
pub fn median_timestamp(timestamps: &[u64], window: usize) -> Option<u64> {
    if timestamps.len() < window || window == 0 {
        return None;
    }
    let mut sorted: Vec<u64> = timestamps[timestamps.len() - window..].to_vec();
    sorted.sort_unstable();
    Some(sorted[window / 2])
}

/// Per-chain difficulty calculator.
pub struct DifficultyAdjustment<'a> {
    settings: &'a ConsensusSettings,
}

impl<'a> DifficultyAdjustment<'a> {
    pub fn new(settings: &'a ConsensusSettings) -> Self {
        Self { settings }
    }

    /// Damped and clamped timespan from two median timestamps.
    ///
    /// `timeSpan = expected + (m1 - m2 - expected) / 4`, clamped to
    /// `[time_span_min, time_span_max]`. Signed arithmetic: a clock skew
    /// can make `m1 - m2` smaller than the damping offset.
    pub fn time_span(&self, m1: u64, m2: u64) -> u64 {
        let expected = self.settings.expected_time_span as i128;
        let delta = m1 as i128 - m2 as i128 - expected;
        let damped = expected + delta / 4;
        damped.clamp(
            self.settings.time_span_min as i128,
            self.settings.time_span_max as i128,
        ) as u64
    }

    /// Target for the child of a block mined at `parent_target`, given the
    /// two median windows ending at the parent and its parent.
    ///
    /// When either median is undefined (chain shorter than the window) the
    /// parent target is reused unchanged.
    pub fn next_target(
        &self,
        parent_target: Target,
        parent_window: &[u64],
        grandparent_window: &[u64],
    ) -> ConsensusResult<Target> {
        let window = self.settings.median_time_interval;
        let (m1, m2) = match (
            median_timestamp(parent_window, window),
            median_timestamp(grandparent_window, window),
        ) {
            (Some(m1), Some(m2)) => (m1, m2),
            _ => return Ok(parent_target),
        };

        let time_span = self.time_span(m1, m2);
        let retargeted = self.retarget(parent_target, time_span);

        trace!(
            m1,
            m2,
            time_span,
            parent = %parent_target,
            next = %retargeted,
            "difficulty retarget"
        );

        Ok(retargeted)
    }

    /// `newTarget = parentTarget * timeSpan / expectedTimeSpan`, floor
    /// division in big integers, capped at the easiest allowed target and
    /// normalized through the compact form.
    pub fn retarget(&self, parent_target: Target, time_span: u64) -> Target {
        let scaled = parent_target.to_big() * BigUint::from(time_span)
            / BigUint::from(self.settings.expected_time_span);
        Target::clamped(&scaled, &self.settings.max_mining_target.to_big())
    }
}
