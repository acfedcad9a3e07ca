//! # Round Economics Subsystem
//!
//! Pure, integer-only arithmetic behind DPoS round settlement.
//!
//! ## Responsibilities
//!
//! - Slot clock (`Slots`) and height/round mapping (`RoundSchedule`)
//! - Block reward milestones and cumulative supply (`BlockRewardSchedule`)
//! - Per-round fee/reward split with exact remainder (`RoundChanges`)
//! - Common-block probe heights for chain sync (`common_block_heights`)
//!
//! Nothing in this crate performs I/O or reads the clock; every input is an
//! argument, so all nodes compute identical results.

pub mod config;
pub mod domain;
pub mod error;

pub use config::{EconomicsConfig, RoundEconomics};
pub use domain::*;
pub use error::{EconomicsError, Result};
