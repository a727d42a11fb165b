//! Block rewards and coinbase assembly.

use crate::{MiningError, MiningResult};
use lattice_state::WorldState;
use lattice_types::{GroupIndex, LockupScript, Transaction};

/// Reward of the first block, in base units.
pub const INITIAL_BLOCK_REWARD: u64 = 2_000_000_000;

/// Blocks per halving of the block reward, per chain.
pub const REWARD_HALVING_INTERVAL: u32 = 2_000_000;

/// Block reward at `height` under the halving schedule.
pub fn block_reward_at_height(height: u32) -> u64 {
    let halvings = height / REWARD_HALVING_INTERVAL;
    if halvings >= 64 {
        return 0;
    }
    INITIAL_BLOCK_REWARD >> halvings
}

/// Sum of fees of `txs` against `world`: inputs minus declared outputs,
/// clamped at zero per transaction. Inputs were checked to resolve when
/// the transactions were selected.
pub fn total_fees(world: &WorldState, txs: &[Transaction]) -> u64 {
    txs.iter()
        .map(|tx| {
            let consumed: u64 = tx
                .unsigned
                .inputs
                .iter()
                .filter_map(|input| world.get(input).map(|o| o.amount))
                .sum();
            let produced: u64 = tx.all_outputs().map(|o| o.amount).sum();
            consumed.saturating_sub(produced)
        })
        .sum()
}

/// Coinbase paying `miner` the block reward plus fees.
pub fn build_coinbase(height: u32, fees: u64, miner: LockupScript) -> Transaction {
    Transaction::coinbase(block_reward_at_height(height) + fees, miner)
}

/// One reward lockup per group; the coinbase of a block on `(f, t)` pays
/// the miner of group `t`.
#[derive(Debug, Clone)]
pub struct MinerAddresses {
    lockups: Vec<LockupScript>,
}

impl MinerAddresses {
    pub fn new(lockups: Vec<LockupScript>) -> Self {
        Self { lockups }
    }

    pub fn get(&self, group: GroupIndex) -> MiningResult<LockupScript> {
        self.lockups
            .get(group.0 as usize)
            .copied()
            .ok_or(MiningError::NoMinerAddress(group))
    }
}
