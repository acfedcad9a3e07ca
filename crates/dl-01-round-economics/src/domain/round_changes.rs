//! # Round Reward/Fee Splitter
//!
//! Splits the fees collected during a round evenly across its slots and pairs
//! each share with the slot's block reward. The integer remainder of the fee
//! split is credited once, to the last slot.

use serde::{Deserialize, Serialize};
use shared_types::{Amount, InvariantError};

/// Credits for one slot of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotChanges {
    /// `fees + rewards`.
    pub balance: Amount,
    pub fees: Amount,
    /// Fee remainder of the whole round; credited to the last slot only.
    pub fees_remaining: Amount,
    pub rewards: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundChanges {
    round: u64,
    total_fees: Amount,
    rewards: Vec<Amount>,
    fee_per_slot: Amount,
    fees_remaining: Amount,
}

impl RoundChanges {
    /// `rewards` holds one entry per slot, in round order.
    pub fn new(
        round: u64,
        total_fees: Amount,
        rewards: Vec<Amount>,
        delegates: u64,
    ) -> Result<Self, InvariantError> {
        if delegates == 0 {
            return Err(InvariantError::EmptyDelegateSet { round });
        }
        if rewards.len() as u64 != delegates {
            return Err(InvariantError::SlotCountMismatch {
                round,
                expected: delegates,
                actual: rewards.len() as u64,
            });
        }

        let fee_per_slot = total_fees / delegates;
        let fees_remaining = total_fees - fee_per_slot * delegates;
        if fees_remaining >= delegates {
            return Err(InvariantError::RemainderOutOfRange {
                remainder: fees_remaining,
                delegates,
            });
        }

        Ok(Self {
            round,
            total_fees,
            rewards,
            fee_per_slot,
            fees_remaining,
        })
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn total_fees(&self) -> Amount {
        self.total_fees
    }

    pub fn slots(&self) -> usize {
        self.rewards.len()
    }

    pub fn fee_per_slot(&self) -> Amount {
        self.fee_per_slot
    }

    pub fn fees_remaining(&self) -> Amount {
        self.fees_remaining
    }

    /// Slot that receives the fee remainder.
    pub fn remainder_slot(&self) -> usize {
        self.rewards.len() - 1
    }

    pub fn at(&self, index: usize) -> Result<SlotChanges, InvariantError> {
        let rewards = *self
            .rewards
            .get(index)
            .ok_or(InvariantError::SlotCountMismatch {
                round: self.round,
                expected: self.rewards.len() as u64,
                actual: index as u64 + 1,
            })?;
        let balance = self
            .fee_per_slot
            .checked_add(rewards)
            .ok_or(InvariantError::ArithmeticOverflow {
                context: "slot balance",
            })?;
        Ok(SlotChanges {
            balance,
            fees: self.fee_per_slot,
            fees_remaining: self.fees_remaining,
            rewards,
        })
    }

    /// Sum of every credit the round produces, remainder included.
    pub fn total_credited(&self) -> u128 {
        let rewards: u128 = self.rewards.iter().map(|r| u128::from(*r)).sum();
        u128::from(self.fee_per_slot) * self.rewards.len() as u128
            + u128::from(self.fees_remaining)
            + rewards
    }
}
