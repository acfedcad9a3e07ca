//! # Core Ledger Entities
//!
//! Primitive identifiers and block references shared by every subsystem.
//!
//! ## Clusters
//!
//! - **Identity**: `Address`, `PublicKey`, `Signature`
//! - **Chain**: `Hash`, `BlockSummary`
//! - **Value**: `Amount`

use crate::errors::KeyError;
use serde::{Deserialize, Serialize};

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// A 32-byte Ed25519 public key.
pub type PublicKey = [u8; 32];

/// A 64-byte Ed25519 signature.
pub type Signature = [u8; 64];

/// A 20-byte account address, derived from a public key by the crypto service.
pub type Address = [u8; 20];

// =============================================================================
// CLUSTER B: CHAIN
// =============================================================================

/// A 32-byte hash (SHA-256). Block and transaction identifiers are hashes.
pub type Hash = [u8; 32];

/// Identifier used for "no block" references.
pub const ZERO_HASH: Hash = [0u8; 32];

/// The per-block facts round settlement needs: who forged, what was earned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub id: Hash,
    pub height: u64,
    pub generator_public_key: PublicKey,
    /// Block reward paid to the generator at round end.
    pub reward: Amount,
    /// Sum of fees of the block's transactions.
    pub total_fee: Amount,
}

// =============================================================================
// CLUSTER C: VALUE
// =============================================================================

/// Token amount in base units. Never negative.
pub type Amount = u64;

// =============================================================================
// HEX HELPERS
// =============================================================================

/// Lowercase hex of arbitrary bytes.
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Parse a hex string into a 32-byte public key.
pub fn parse_public_key(s: &str) -> Result<PublicKey, KeyError> {
    let bytes = hex::decode(s).map_err(|e| KeyError::InvalidHex(e.to_string()))?;
    let actual = bytes.len();
    bytes
        .try_into()
        .map_err(|_| KeyError::InvalidKeyLength {
            expected: 32,
            actual,
        })
}

/// Parse a hex string into a 64-byte signature.
pub fn parse_signature(s: &str) -> Result<Signature, KeyError> {
    let bytes = hex::decode(s).map_err(|e| KeyError::InvalidHex(e.to_string()))?;
    let actual = bytes.len();
    bytes
        .try_into()
        .map_err(|_| KeyError::InvalidKeyLength {
            expected: 64,
            actual,
        })
}

/// Parse a hex string into a 20-byte address.
pub fn parse_address(s: &str) -> Result<Address, KeyError> {
    let bytes = hex::decode(s).map_err(|e| KeyError::InvalidHex(e.to_string()))?;
    let actual = bytes.len();
    bytes
        .try_into()
        .map_err(|_| KeyError::InvalidKeyLength {
            expected: 20,
            actual,
        })
}
