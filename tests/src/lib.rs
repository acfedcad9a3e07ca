//! # DPoS Ledger Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Chain harness: in-memory store, signed transactions
//! └── integration/      # Cross-crate flows
//!     ├── flows.rs      # Block apply/undo through the executor
//!     ├── rounds.rs     # Round landing, vote weight, rollback audit
//!     └── properties.rs # Apply/undo inversion under random transfers
//!
//! tests/benches/
//! └── ledger_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p dl-tests
//!
//! # With ledger logs
//! RUST_LOG=dl_03_ledger_core=debug cargo test -p dl-tests -- --nocapture
//!
//! # Benchmarks
//! cargo bench -p dl-tests
//! ```

#![allow(dead_code)]

pub mod fixtures;
pub mod integration;
