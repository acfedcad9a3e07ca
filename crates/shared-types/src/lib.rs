//! # Shared Types Crate
//!
//! Ledger primitives used by every subsystem of the DPoS ledger core.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: identifiers, block summaries and the
//!   invariant-failure taxonomy are defined once, here.
//! - **Integers only**: amounts are `u64`, column deltas `i64`; nothing in the
//!   ledger path uses floating point.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
