//! Pure round economics: slots, rounds, rewards and the fee splitter.

pub mod common_heights;
pub mod reward_schedule;
pub mod round_changes;
pub mod rounds;
pub mod slots;

pub use common_heights::common_block_heights;
pub use reward_schedule::{BlockRewardSchedule, Milestone};
pub use round_changes::{RoundChanges, SlotChanges};
pub use rounds::{RoundSchedule, RoundSegment};
pub use slots::Slots;
