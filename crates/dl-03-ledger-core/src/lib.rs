//! # Ledger Core Subsystem
//!
//! Deterministic state transitions of the DPoS ledger: accounts, the five
//! transaction kinds, round landing and block application.
//!
//! ## Architecture
//!
//! - `domain/`: `Account`, `AccountDiff` and `LedgerDeltaBuilder`, the
//!   `TransactionRegistry` with one `TransactionLogic` per kind, `RoundLedger`
//! - `ports/`: `LedgerApi` (inbound), readers and `CryptoService` (outbound)
//! - `adapters/`: `StoreLedgerReader` over any `RowSource`, `Ed25519Crypto`
//! - `service/`: `LedgerService`
//!
//! ## Flow
//!
//! ```text
//! Block ──registry──→ [AccountChange] ──LedgerDeltaBuilder──→ [StorageIntent]
//!   │                                                              │
//!   └── last in round ──RoundLedger::land──→ [StorageIntent] ──────┤
//!                                                                  ▼
//!                                                   IntentExecutor (one tx)
//! ```
//!
//! Every mutation of a call commits atomically or not at all.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{Ed25519Crypto, StoreLedgerReader};
pub use config::{LedgerConfig, MultisigLimits, VoteLimits};
pub use domain::*;
pub use ports::{AccountReader, AssetReader, CryptoService, LedgerApi, RoundReader};
pub use service::{LedgerDependencies, LedgerService};
