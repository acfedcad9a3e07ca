//! Adapters layer (Hexagonal Architecture)
//!
//! - `StoreLedgerReader`: every reader port over a `RowSource`
//! - `Ed25519Crypto`: production `CryptoService`

mod crypto;
mod store_reader;

pub use crypto::*;
pub use store_reader::*;
