//! # Slot Arithmetic
//!
//! Maps wall-clock seconds onto forging slots. The clock reading is always an
//! argument so nothing here depends on the host time.

use crate::error::{EconomicsError, Result};
use serde::{Deserialize, Serialize};

/// Fixed-interval slot clock anchored at the chain epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slots {
    /// Unix seconds of the chain epoch.
    epoch: u64,
    /// Block interval in seconds.
    interval: u64,
}

impl Slots {
    pub fn new(epoch: u64, interval: u64) -> Result<Self> {
        if interval == 0 {
            return Err(EconomicsError::InvalidConfig(
                "block interval must be positive".into(),
            ));
        }
        Ok(Self { epoch, interval })
    }

    /// Block interval in seconds.
    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Seconds elapsed since the chain epoch. Times before the epoch clamp to 0.
    pub fn epoch_time(&self, unix_seconds: u64) -> u64 {
        unix_seconds.saturating_sub(self.epoch)
    }

    /// Unix seconds for an epoch-relative time.
    pub fn real_time(&self, epoch_seconds: u64) -> u64 {
        self.epoch.saturating_add(epoch_seconds)
    }

    pub fn slot_number(&self, epoch_seconds: u64) -> u64 {
        epoch_seconds / self.interval
    }

    /// Epoch-relative start time of a slot.
    pub fn slot_time(&self, slot: u64) -> u64 {
        slot.saturating_mul(self.interval)
    }

    /// First slot strictly after the one containing `epoch_seconds`.
    pub fn next_slot(&self, epoch_seconds: u64) -> u64 {
        self.slot_number(epoch_seconds) + 1
    }

    /// One past the last slot of the forging window opened at `next_slot`.
    pub fn last_slot(&self, next_slot: u64, delegates: u64) -> u64 {
        next_slot.saturating_add(delegates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPOCH: u64 = 1_464_109_200;

    #[test]
    fn test_slot_number_floors() {
        let slots = Slots::new(EPOCH, 30).unwrap();
        assert_eq!(slots.slot_number(0), 0);
        assert_eq!(slots.slot_number(29), 0);
        assert_eq!(slots.slot_number(30), 1);
        assert_eq!(slots.slot_number(89), 2);
    }

    #[test]
    fn test_epoch_time_clamps_before_epoch() {
        let slots = Slots::new(EPOCH, 30).unwrap();
        assert_eq!(slots.epoch_time(EPOCH - 10), 0);
        assert_eq!(slots.epoch_time(EPOCH + 95), 95);
        assert_eq!(slots.real_time(95), EPOCH + 95);
    }

    #[test]
    fn test_next_and_last_slot() {
        let slots = Slots::new(EPOCH, 30).unwrap();
        let next = slots.next_slot(61);
        assert_eq!(next, 3);
        assert_eq!(slots.slot_time(next), 90);
        assert_eq!(slots.last_slot(next, 101), 104);
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(matches!(
            Slots::new(EPOCH, 0),
            Err(EconomicsError::InvalidConfig(_))
        ));
    }
}
