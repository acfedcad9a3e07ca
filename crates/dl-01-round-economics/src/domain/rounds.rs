//! # Round Arithmetic
//!
//! Heights are grouped into rounds of `delegates` consecutive blocks. The
//! delegate-set size may change at configured heights ("segments"); each later
//! segment must start on the first height of a round so round numbering keeps
//! accumulating without gaps or overlaps.
//!
//! With a single segment of size `n`: `round(h) = ceil(h / n)`.

use crate::error::{EconomicsError, Result};
use serde::{Deserialize, Serialize};
use shared_types::InvariantError;

/// One entry of the round schedule: from `from_height` on, rounds have
/// `delegates` slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSegment {
    pub from_height: u64,
    pub delegates: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ResolvedSegment {
    from_height: u64,
    first_round: u64,
    delegates: u64,
}

/// Height-indexed round schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSchedule {
    segments: Vec<ResolvedSegment>,
}

impl RoundSchedule {
    /// Schedule with a single, fixed delegate-set size.
    pub fn fixed(delegates: u64) -> Result<Self> {
        Self::new(&[RoundSegment {
            from_height: 1,
            delegates,
        }])
    }

    pub fn new(segments: &[RoundSegment]) -> Result<Self> {
        let first = segments
            .first()
            .ok_or_else(|| EconomicsError::InvalidSchedule("round schedule is empty".into()))?;
        if first.from_height != 1 {
            return Err(EconomicsError::InvalidSchedule(format!(
                "first round segment must start at height 1, got {}",
                first.from_height
            )));
        }

        let mut resolved: Vec<ResolvedSegment> = Vec::with_capacity(segments.len());
        for segment in segments {
            if segment.delegates == 0 {
                return Err(EconomicsError::InvalidSchedule(format!(
                    "segment at height {} has no delegates",
                    segment.from_height
                )));
            }
            let first_round = match resolved.last() {
                None => 1,
                Some(prev) => {
                    if segment.from_height <= prev.from_height {
                        return Err(EconomicsError::InvalidSchedule(format!(
                            "segment heights must increase: {} after {}",
                            segment.from_height, prev.from_height
                        )));
                    }
                    let span = segment.from_height - prev.from_height;
                    if span % prev.delegates != 0 {
                        return Err(EconomicsError::InvalidSchedule(format!(
                            "segment at height {} does not start on a round boundary",
                            segment.from_height
                        )));
                    }
                    prev.first_round + span / prev.delegates
                }
            };
            resolved.push(ResolvedSegment {
                from_height: segment.from_height,
                first_round,
                delegates: segment.delegates,
            });
        }

        Ok(Self { segments: resolved })
    }

    // Both lookups rely on the first segment starting at height 1, round 1.
    fn segment_for_height(&self, height: u64) -> &ResolvedSegment {
        let idx = self
            .segments
            .partition_point(|s| s.from_height <= height)
            .saturating_sub(1);
        &self.segments[idx]
    }

    fn segment_for_round(&self, round: u64) -> &ResolvedSegment {
        let idx = self
            .segments
            .partition_point(|s| s.first_round <= round)
            .saturating_sub(1);
        &self.segments[idx]
    }

    /// Round containing `height`. Height 0 is treated as height 1.
    pub fn round(&self, height: u64) -> u64 {
        let height = height.max(1);
        let seg = self.segment_for_height(height);
        seg.first_round + (height - seg.from_height) / seg.delegates
    }

    /// First height of round `round` (round 0 is treated as round 1).
    pub fn first_in_round(&self, round: u64) -> u64 {
        let round = round.max(1);
        let seg = self.segment_for_round(round);
        seg.from_height
            .saturating_add((round - seg.first_round).saturating_mul(seg.delegates))
    }

    /// Last height of round `round`, inclusive.
    pub fn last_in_round(&self, round: u64) -> u64 {
        let round = round.max(1);
        self.first_in_round(round)
            .saturating_add(self.delegates_for_round(round) - 1)
    }

    pub fn delegates_for_round(&self, round: u64) -> u64 {
        self.segment_for_round(round.max(1)).delegates
    }

    pub fn delegates_at_height(&self, height: u64) -> u64 {
        self.segment_for_height(height.max(1)).delegates
    }

    /// True when `height` closes its round.
    pub fn is_last_in_round(&self, height: u64) -> bool {
        self.last_in_round(self.round(height)) == height.max(1)
    }

    /// Inclusive height bounds of `round`, checked for contiguity with the
    /// following round.
    pub fn bounds(&self, round: u64) -> std::result::Result<(u64, u64), InvariantError> {
        let first = self.first_in_round(round);
        let last = self.last_in_round(round);
        let broken = InvariantError::RoundBounds { round, first, last };
        let next_round = round.max(1).checked_add(1).ok_or(broken.clone())?;
        let next_first = last.checked_add(1).ok_or(broken.clone())?;
        if last < first || self.first_in_round(next_round) != next_first {
            return Err(broken);
        }
        Ok((first, last))
    }
}
