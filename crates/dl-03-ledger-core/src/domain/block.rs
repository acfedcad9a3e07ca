//! Accepted blocks.

use crate::domain::transaction::Transaction;
use serde::{Deserialize, Serialize};
use shared_types::{Amount, BlockSummary, Hash, PublicKey};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: Hash,
    pub height: u64,
    pub generator_public_key: PublicKey,
    pub previous_block: Option<Hash>,
    /// Seconds since the chain epoch.
    pub timestamp: u32,
    pub reward: Amount,
    pub total_fee: Amount,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn summary(&self) -> BlockSummary {
        BlockSummary {
            id: self.id,
            height: self.height,
            generator_public_key: self.generator_public_key,
            reward: self.reward,
            total_fee: self.total_fee,
        }
    }
}
