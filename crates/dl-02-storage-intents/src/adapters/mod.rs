//! Adapters for the storage intent subsystem.

pub mod memory;

pub use memory::{InMemoryStatementStore, MemoryTx};
