use std::time::Duration;

use agritrace_core::constants::{
    DEFAULT_BACKEND_URL, LEDGER_TIMEOUT_SECS, STANDARD_TIMEOUT_SECS, SUMMARY_TIMEOUT_SECS,
};
use serde::{Deserialize, Serialize};

/// Timeout class of a backend endpoint.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EndpointClass {
    /// Health and metadata calls answered by the backend itself.
    Standard,
    /// Calls that round-trip to the ledger node.
    Ledger,
    /// Natural-language summary generation.
    Summary,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL including the `/api` prefix, without a trailing slash.
    pub base_url: String,
    pub standard_timeout_secs: u64,
    pub ledger_timeout_secs: u64,
    pub summary_timeout_secs: u64,
}

impl ClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Self::default() }
    }

    pub fn timeout(&self, class: EndpointClass) -> Duration {
        let secs = match class {
            EndpointClass::Standard => self.standard_timeout_secs,
            EndpointClass::Ledger => self.ledger_timeout_secs,
            EndpointClass::Summary => self.summary_timeout_secs,
        };
        Duration::from_secs(secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            standard_timeout_secs: STANDARD_TIMEOUT_SECS,
            ledger_timeout_secs: LEDGER_TIMEOUT_SECS,
            summary_timeout_secs: SUMMARY_TIMEOUT_SECS,
        }
    }
}
