//! Executor configuration

use serde::{Deserialize, Serialize};

/// Intent executor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Maximum statements per batch. A dependency unit larger than this runs
    /// as a batch of its own.
    pub batch_size: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { batch_size: 100 }
    }
}

impl ExecutorConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
