//! # Ledger Configuration
//!
//! Static parameters of the ledger core, loaded from JSON. Every field has a
//! production default, so a partial document only overrides what it names.

use crate::domain::errors::{LedgerError, LedgerResult};
use crate::domain::fees::FeeSchedule;
use dl_01_round_economics::EconomicsConfig;
use dl_02_storage_intents::ExecutorConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoteLimits {
    /// Vote changes carried by one transaction.
    pub max_per_transaction: usize,
    /// Delegates one account may vote for.
    pub max_per_account: usize,
}

impl Default for VoteLimits {
    fn default() -> Self {
        Self {
            max_per_transaction: 33,
            max_per_account: 101,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultisigLimits {
    pub min_keysgroup: usize,
    pub max_keysgroup: usize,
    pub min_signatures: u32,
    pub max_signatures: u32,
    /// Hours an unconfirmed multisignature transaction waits for signatures.
    pub min_lifetime: u32,
    pub max_lifetime: u32,
}

impl Default for MultisigLimits {
    fn default() -> Self {
        Self {
            min_keysgroup: 1,
            max_keysgroup: 16,
            min_signatures: 1,
            max_signatures: 15,
            min_lifetime: 1,
            max_lifetime: 72,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub economics: EconomicsConfig,
    pub fees: FeeSchedule,
    pub votes: VoteLimits,
    pub multisig: MultisigLimits,
    pub max_username_length: usize,
    pub executor: ExecutorConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            economics: EconomicsConfig::default(),
            fees: FeeSchedule::default(),
            votes: VoteLimits::default(),
            multisig: MultisigLimits::default(),
            max_username_length: 20,
            executor: ExecutorConfig::default(),
        }
    }
}

impl LedgerConfig {
    pub fn from_json_str(json: &str) -> LedgerResult<Self> {
        serde_json::from_str(json).map_err(|e| LedgerError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config =
            LedgerConfig::from_json_str(r#"{"votes": {"max_per_transaction": 2}}"#).unwrap();
        assert_eq!(config.votes.max_per_transaction, 2);
        assert_eq!(config.votes.max_per_account, 101);
        assert_eq!(config.max_username_length, 20);
        assert_eq!(config.fees.fees_at(1).delegate, 2_500_000_000);
    }

    #[test]
    fn test_invalid_document() {
        assert!(matches!(
            LedgerConfig::from_json_str("{"),
            Err(LedgerError::Config(_))
        ));
        assert!(matches!(
            LedgerConfig::from_json_str(r#"{"votes": 5}"#),
            Err(LedgerError::Config(_))
        ));
    }
}
