//! # Storage Intents Subsystem
//!
//! Declarative persistent mutations and their atomic execution.
//!
//! ## Architecture
//!
//! - `domain/`: `StorageIntent` (six variants), `Statement`, `Predicate`,
//!   `Collection`, `Value`
//! - `ports/`: `StatementStore` (transactional batches), `RowSource` (reads)
//! - `adapters/`: `InMemoryStatementStore`
//! - `service`: `IntentExecutor`
//!
//! ## Flow
//!
//! ```text
//! [Option<StorageIntent>] ──plan──→ [Statement] ──batch_ranges──→ batches
//!                                                   │
//!                                   StatementStore::execute_batch (one tx)
//! ```
//!
//! Ledger logic builds intents without touching storage; only the executor
//! talks to the store.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{InMemoryStatementStore, MemoryTx};
pub use config::ExecutorConfig;
pub use domain::*;
pub use ports::{RowSource, StatementStore};
pub use service::{batch_ranges, plan, ExecutionReport, IntentExecutor};
