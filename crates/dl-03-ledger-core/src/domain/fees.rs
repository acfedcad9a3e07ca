//! Height-indexed fee table.

use serde::{Deserialize, Serialize};
use shared_types::Amount;

/// Base fee per transaction kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fees {
    pub send: Amount,
    pub vote: Amount,
    pub second_signature: Amount,
    pub delegate: Amount,
    /// Charged per keysgroup member plus one.
    pub multisignature: Amount,
}

impl Default for Fees {
    fn default() -> Self {
        Self {
            send: 10_000_000,
            vote: 100_000_000,
            second_signature: 500_000_000,
            delegate: 2_500_000_000,
            multisignature: 500_000_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeMilestone {
    pub from_height: u64,
    pub fees: Fees,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeeSchedule {
    milestones: Vec<FeeMilestone>,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            milestones: vec![FeeMilestone {
                from_height: 1,
                fees: Fees::default(),
            }],
        }
    }
}

impl FeeSchedule {
    /// Entries are sorted by `from_height`.
    pub fn new(mut milestones: Vec<FeeMilestone>) -> Self {
        milestones.sort_by_key(|m| m.from_height);
        Self { milestones }
    }

    /// Fees in force at `height`. Below the first entry the first entry
    /// applies; an empty table charges nothing.
    pub fn fees_at(&self, height: u64) -> Fees {
        let idx = self
            .milestones
            .partition_point(|m| m.from_height <= height)
            .saturating_sub(1);
        self.milestones.get(idx).map_or(
            Fees {
                send: 0,
                vote: 0,
                second_signature: 0,
                delegate: 0,
                multisignature: 0,
            },
            |m| m.fees,
        )
    }
}
