//! # Transactions
//!
//! Fixed header plus a closed, per-type asset. The canonical signable byte
//! form is little-endian and fixed width; ids and signing hashes are SHA-256
//! over it.

use crate::domain::delta::MembershipDiff;
use crate::domain::errors::TransactionError;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use sha2::{Digest, Sha256};
use shared_types::{Address, Amount, Hash, PublicKey, Signature};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionType {
    Send = 0,
    SecondSignature = 1,
    Delegate = 2,
    Vote = 3,
    Multisignature = 4,
}

impl TransactionType {
    pub const ALL: [TransactionType; 5] = [
        TransactionType::Send,
        TransactionType::SecondSignature,
        TransactionType::Delegate,
        TransactionType::Vote,
        TransactionType::Multisignature,
    ];
}

impl TryFrom<u8> for TransactionType {
    type Error = TransactionError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|t| *t as u8 == tag)
            .ok_or(TransactionError::UnknownType(tag))
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionType::Send => "send",
            TransactionType::SecondSignature => "second_signature",
            TransactionType::Delegate => "delegate",
            TransactionType::Vote => "vote",
            TransactionType::Multisignature => "multisignature",
        };
        f.write_str(name)
    }
}

/// Type-specific payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionAsset {
    Send,
    SecondSignature { public_key: PublicKey },
    Delegate { username: String },
    Vote { votes: MembershipDiff },
    Multisignature {
        min: u32,
        lifetime: u32,
        keysgroup: MembershipDiff,
    },
}

impl TransactionAsset {
    pub fn tx_type(&self) -> TransactionType {
        match self {
            TransactionAsset::Send => TransactionType::Send,
            TransactionAsset::SecondSignature { .. } => TransactionType::SecondSignature,
            TransactionAsset::Delegate { .. } => TransactionType::Delegate,
            TransactionAsset::Vote { .. } => TransactionType::Vote,
            TransactionAsset::Multisignature { .. } => TransactionType::Multisignature,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHeader {
    pub id: Hash,
    pub tx_type: TransactionType,
    pub sender_public_key: PublicKey,
    pub sender_id: Address,
    pub recipient_id: Option<Address>,
    pub amount: Amount,
    pub fee: Amount,
    /// Seconds since the chain epoch.
    pub timestamp: u32,
    #[serde_as(as = "Bytes")]
    pub signature: Signature,
    #[serde_as(as = "Option<Bytes>")]
    pub sign_signature: Option<Signature>,
    /// Multisignature co-signatures.
    #[serde_as(as = "Vec<Bytes>")]
    pub signatures: Vec<Signature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub header: TransactionHeader,
    pub asset: TransactionAsset,
}

impl Transaction {
    pub fn tx_type(&self) -> TransactionType {
        self.header.tx_type
    }

    pub fn id(&self) -> &Hash {
        &self.header.id
    }

    /// Canonical bytes. `asset_bytes` comes from the type's handler.
    pub fn bytes(
        &self,
        asset_bytes: &[u8],
        skip_signature: bool,
        skip_second_signature: bool,
    ) -> Vec<u8> {
        let h = &self.header;
        let mut out = Vec::with_capacity(1 + 4 + 32 + 20 + 8 + asset_bytes.len() + 128);
        out.push(h.tx_type as u8);
        out.extend_from_slice(&h.timestamp.to_le_bytes());
        out.extend_from_slice(&h.sender_public_key);
        out.extend_from_slice(&h.recipient_id.unwrap_or([0u8; 20]));
        out.extend_from_slice(&h.amount.to_le_bytes());
        out.extend_from_slice(asset_bytes);
        if !skip_signature {
            out.extend_from_slice(&h.signature);
        }
        if !skip_second_signature {
            if let Some(sig) = &h.sign_signature {
                out.extend_from_slice(sig);
            }
        }
        out
    }
}

pub fn sha256(bytes: &[u8]) -> Hash {
    Sha256::digest(bytes).into()
}

// =============================================================================
// RAW FORM
// =============================================================================

/// Loosely typed transaction as received from the API or the network: hex
/// strings and an untyped asset. `objectNormalize` turns it into a
/// `Transaction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    #[serde(rename = "type")]
    pub tx_type: u8,
    pub sender_public_key: String,
    #[serde(default)]
    pub recipient_id: Option<String>,
    #[serde(default)]
    pub amount: Amount,
    pub fee: Amount,
    pub timestamp: u32,
    pub signature: String,
    #[serde(default)]
    pub sign_signature: Option<String>,
    #[serde(default)]
    pub signatures: Vec<String>,
    #[serde(default)]
    pub asset: serde_json::Value,
}

impl RawTransaction {
    pub fn from_json_str(json: &str) -> Result<Self, TransactionError> {
        serde_json::from_str(json).map_err(|e| TransactionError::Malformed(e.to_string()))
    }
}
