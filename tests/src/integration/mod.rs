//! # Integration Tests
//!
//! Full ledger stack: `LedgerService` over `StoreLedgerReader`, the
//! `IntentExecutor` and `InMemoryStatementStore`, with Ed25519 signatures.

pub mod flows;
pub mod properties;
pub mod rounds;
