//! # Block Reward Schedule
//!
//! Height-ordered milestone table. Heights below the first milestone earn the
//! first milestone's reward, so `supply_at` always equals the per-height sum.

use crate::error::{EconomicsError, Result};
use serde::{Deserialize, Serialize};
use shared_types::{Amount, InvariantError};

/// Reward paid per block from `from_height` until the next milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub from_height: u64,
    pub reward: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRewardSchedule {
    milestones: Vec<Milestone>,
    genesis_supply: Amount,
}

impl BlockRewardSchedule {
    pub fn new(milestones: Vec<Milestone>, genesis_supply: Amount) -> Result<Self> {
        if let Some(pair) = milestones
            .windows(2)
            .find(|w| w[1].from_height <= w[0].from_height)
        {
            return Err(EconomicsError::InvalidSchedule(format!(
                "milestone heights must increase: {} after {}",
                pair[1].from_height, pair[0].from_height
            )));
        }
        Ok(Self {
            milestones,
            genesis_supply,
        })
    }

    pub fn milestones(&self) -> &[Milestone] {
        &self.milestones
    }

    pub fn genesis_supply(&self) -> Amount {
        self.genesis_supply
    }

    fn check_height(height: u64) -> Result<()> {
        if height == 0 {
            return Err(EconomicsError::InvalidHeight { height });
        }
        Ok(())
    }

    /// Index of the greatest milestone with `from_height <= height`, 0 when
    /// below the first entry or when the table is empty.
    pub fn milestone(&self, height: u64) -> Result<usize> {
        Self::check_height(height)?;
        Ok(self
            .milestones
            .partition_point(|m| m.from_height <= height)
            .saturating_sub(1))
    }

    pub fn reward_at(&self, height: u64) -> Result<Amount> {
        let idx = self.milestone(height)?;
        Ok(self.milestones.get(idx).map_or(0, |m| m.reward))
    }

    /// Genesis supply plus every block reward paid at heights `1..=height`.
    ///
    /// Sums `span * reward` per milestone instead of walking heights.
    pub fn supply_at(&self, height: u64) -> Result<Amount> {
        Self::check_height(height)?;

        let mut supply = u128::from(self.genesis_supply);
        for (i, milestone) in self.milestones.iter().enumerate() {
            let span_start = if i == 0 { 1 } else { milestone.from_height };
            if span_start > height {
                break;
            }
            let span_end = self
                .milestones
                .get(i + 1)
                .map_or(height, |next| next.from_height.saturating_sub(1).min(height));
            if span_end < span_start {
                continue;
            }
            let span = u128::from(span_end - span_start + 1);
            supply += span * u128::from(milestone.reward);
        }

        Amount::try_from(supply).map_err(|_| {
            InvariantError::ArithmeticOverflow {
                context: "supply_at",
            }
            .into()
        })
    }
}
