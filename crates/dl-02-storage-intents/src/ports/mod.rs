//! Ports for the storage intent subsystem.

pub mod outbound;

pub use outbound::{RowSource, StatementStore};
