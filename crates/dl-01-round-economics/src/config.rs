//! Round economics configuration

use crate::domain::{BlockRewardSchedule, Milestone, RoundSchedule, RoundSegment, Slots};
use crate::error::{EconomicsError, Result};
use serde::{Deserialize, Serialize};
use shared_types::Amount;

/// Static economics parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomicsConfig {
    /// Unix seconds of the chain epoch.
    pub epoch_time: u64,
    /// Seconds per slot.
    pub block_time: u64,
    pub round_segments: Vec<RoundSegment>,
    pub milestones: Vec<Milestone>,
    pub genesis_supply: Amount,
}

impl Default for EconomicsConfig {
    fn default() -> Self {
        let milestone = |from_height, reward| Milestone {
            from_height,
            reward,
        };
        Self {
            // 2016-05-24T17:00:00Z
            epoch_time: 1_464_109_200,
            block_time: 30,
            round_segments: vec![RoundSegment {
                from_height: 1,
                delegates: 101,
            }],
            milestones: vec![
                milestone(1, 0),
                milestone(10, 1_500_000_000),
                milestone(11, 30_000_000),
                milestone(12, 20_000_000),
                milestone(13, 1_500_000_000),
                milestone(1_054_080, 1_200_000_000),
                milestone(2_108_160, 900_000_000),
                milestone(3_162_240, 600_000_000),
                milestone(4_216_320, 300_000_000),
                milestone(5_270_400, 100_000_000),
            ],
            genesis_supply: 10_999_999_991_000_000,
        }
    }
}

impl EconomicsConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EconomicsError::InvalidConfig(e.to_string()))
    }

    /// Validate and build the economics components.
    pub fn build(&self) -> Result<RoundEconomics> {
        Ok(RoundEconomics {
            slots: Slots::new(self.epoch_time, self.block_time)?,
            rounds: RoundSchedule::new(&self.round_segments)?,
            rewards: BlockRewardSchedule::new(self.milestones.clone(), self.genesis_supply)?,
        })
    }
}

/// Validated slot clock, round schedule and reward table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundEconomics {
    pub slots: Slots,
    pub rounds: RoundSchedule,
    pub rewards: BlockRewardSchedule,
}

impl RoundEconomics {
    /// Bound of the forging window opening at `next_slot`, sized by the
    /// delegate set active at `height`.
    pub fn last_slot(&self, next_slot: u64, height: u64) -> u64 {
        self.slots
            .last_slot(next_slot, self.rounds.delegates_at_height(height))
    }
}
