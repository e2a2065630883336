use std::time::Duration;

use agritrace_core::constants::{DEFAULT_COMMIT_LATENCY_MS, GENESIS_BLOCK_NUMBER};
use agritrace_core::types::BlockNumber;
use serde::{Deserialize, Serialize};

/// Tunables for a [`ChainStore`](crate::ChainStore).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Simulated ledger-write latency applied by `commit`.
    pub commit_latency_ms: u64,
    /// First block height issued by the offline ledger.
    pub genesis_block: BlockNumber,
    /// Fixed salt seed for reproducible transaction hashes. `None` draws a
    /// random salt.
    pub ledger_seed: Option<u64>,
}

impl StoreConfig {
    pub fn commit_latency(&self) -> Duration {
        Duration::from_millis(self.commit_latency_ms)
    }

    /// No latency, fixed seed. Used by tests.
    pub fn instant() -> Self {
        Self { commit_latency_ms: 0, ledger_seed: Some(0), ..Self::default() }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            commit_latency_ms: DEFAULT_COMMIT_LATENCY_MS,
            genesis_block: GENESIS_BLOCK_NUMBER,
            ledger_seed: None,
        }
    }
}
