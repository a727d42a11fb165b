//! Per-peer misbehavior state.

use crate::{NetworkSettings, Offense};
use dashmap::DashMap;
use std::net::IpAddr;
use tracing::{info, warn};

/// Observable state of one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MisbehaviorStatus {
    /// Accumulated penalty score.
    Penalty(u32),
    /// Banned until the given time (ms).
    Banned { until: u64 },
}

#[derive(Debug, Clone, Copy)]
enum Record {
    Penalty { score: u32, updated_at: u64 },
    Banned { until: u64 },
}

/// Per-IP penalty and ban ledger.
///
/// Penalties decay: one unit is forgiven per elapsed penalty interval and
/// a record untouched for the full forgiveness window resets to zero. An
/// expired ban transparently rewrites to a clean penalty record on read.
pub struct MisbehaviorStorage {
    settings: NetworkSettings,
    peers: DashMap<IpAddr, Record>,
}

impl MisbehaviorStorage {
    pub fn new(settings: NetworkSettings) -> Self {
        Self {
            settings,
            peers: DashMap::new(),
        }
    }

    fn decayed(&self, record: Record, now: u64) -> Record {
        match record {
            Record::Banned { until } if now >= until => Record::Penalty {
                score: 0,
                updated_at: now,
            },
            Record::Banned { until } => Record::Banned { until },
            Record::Penalty { score, updated_at } => {
                let elapsed = now.saturating_sub(updated_at);
                if elapsed >= self.settings.penalty_forgiveness_ms {
                    Record::Penalty {
                        score: 0,
                        updated_at: now,
                    }
                } else {
                    let forgiven = (elapsed / self.settings.penalty_frequency_ms) as u32;
                    Record::Penalty {
                        score: score.saturating_sub(forgiven),
                        updated_at,
                    }
                }
            }
        }
    }

    /// Current status, rewriting expired bans in place.
    pub fn get(&self, peer: IpAddr, now: u64) -> MisbehaviorStatus {
        let record = match self.peers.get(&peer) {
            Some(r) => *r,
            None => {
                return MisbehaviorStatus::Penalty(0);
            }
        };
        let decayed = self.decayed(record, now);
        if matches!(record, Record::Banned { .. }) && matches!(decayed, Record::Penalty { .. }) {
            self.peers.insert(peer, decayed);
            info!(%peer, "ban expired");
        }
        match decayed {
            Record::Penalty { score, .. } => MisbehaviorStatus::Penalty(score),
            Record::Banned { until } => MisbehaviorStatus::Banned { until },
        }
    }

    pub fn is_banned(&self, peer: IpAddr, now: u64) -> bool {
        matches!(self.get(peer, now), MisbehaviorStatus::Banned { .. })
    }

    /// Add `delta` penalty points; returns the resulting status. Crossing
    /// the ban threshold bans the peer for the configured duration.
    pub fn update(&self, peer: IpAddr, delta: u32, now: u64) -> MisbehaviorStatus {
        let current = self
            .peers
            .get(&peer)
            .map(|r| self.decayed(*r, now))
            .unwrap_or(Record::Penalty {
                score: 0,
                updated_at: now,
            });

        let next = match current {
            Record::Banned { until } => Record::Banned { until },
            Record::Penalty { score, .. } => {
                let score = score.saturating_add(delta);
                if score >= self.settings.ban_threshold {
                    warn!(%peer, score, "peer banned");
                    Record::Banned {
                        until: now + self.settings.ban_duration_ms,
                    }
                } else {
                    Record::Penalty {
                        score,
                        updated_at: now,
                    }
                }
            }
        };
        self.peers.insert(peer, next);
        match next {
            Record::Penalty { score, .. } => MisbehaviorStatus::Penalty(score),
            Record::Banned { until } => MisbehaviorStatus::Banned { until },
        }
    }

    /// Report an offense by its catalogue delta.
    pub fn report(&self, peer: IpAddr, offense: Offense, now: u64) -> MisbehaviorStatus {
        warn!(%peer, %offense, "misbehavior reported");
        self.update(peer, offense.penalty(), now)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
