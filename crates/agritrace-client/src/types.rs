//! Response bodies of the backend ledger-query and summary endpoints.
//!
//! The backend speaks snake_case JSON. Fields it fills in from the ledger
//! node's raw output are kept as [`Value`]; their shape depends on the node.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `GET /blockchain/info`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainInfo {
    pub block_number: u64,
    pub product_count: u64,
    pub rpc_url: String,
    pub contract_address: String,
    pub connected: bool,
}

/// `GET /blockchain/transaction/{hash}`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub tx_hash: String,
    #[serde(default)]
    pub block_number: Option<Value>,
    #[serde(default)]
    pub from_address: Option<String>,
    #[serde(default)]
    pub to_address: Option<String>,
    /// Call data, truncated by the backend.
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub gas_used: Option<Value>,
    #[serde(default)]
    pub raw_transaction: Option<Value>,
    #[serde(default)]
    pub raw_receipt: Option<Value>,
}

/// `GET /blockchain/block/{number}`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub block_number: u64,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub parent_hash: Option<String>,
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default)]
    pub sealer: Option<Value>,
    #[serde(default)]
    pub transaction_count: u64,
    #[serde(default)]
    pub transactions: Vec<Value>,
}

/// `GET /blockchain/verify/{trace_code}`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerifyResult {
    pub trace_code: String,
    pub exists: bool,
    pub on_chain: bool,
    #[serde(default)]
    pub product_info: Option<Value>,
}

/// `GET /blockchain/product/{trace_code}/chain-data`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductChainData {
    pub trace_code: String,
    pub exists: bool,
    #[serde(default)]
    pub product_info: Option<Value>,
    #[serde(default)]
    pub chain_records: Option<Vec<Value>>,
    #[serde(default)]
    pub record_count: usize,
}

/// `GET /blockchain/health`. Always answered with 200; failures are in the body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub connected: bool,
    #[serde(default)]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub rpc_url: Option<String>,
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Health {
    pub fn is_healthy(&self) -> bool {
        self.connected && self.status == "healthy"
    }
}

/// `GET /ai/health`. Like [`Health`], a failing model shows up in the body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AiHealth {
    pub status: String,
    pub connected: bool,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AiHealth {
    pub fn is_healthy(&self) -> bool {
        self.connected && self.status == "healthy"
    }
}

#[derive(Serialize)]
pub(crate) struct SummaryRequest<'a> {
    pub trace_code: &'a str,
    pub chain_data: Option<&'a Value>,
}

/// `POST /ai/summary`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub summary: String,
    pub trace_code: String,
    pub success: bool,
}

/// FastAPI-style error body. `detail` is usually a string but validation
/// failures send a list.
#[derive(Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_reports_disconnected_node() {
        let h: Health = serde_json::from_str(
            r#"{"status": "error", "connected": false, "error": "connection refused"}"#,
        )
        .unwrap();
        assert!(!h.is_healthy());
        assert_eq!(h.error.as_deref(), Some("connection refused"));
        assert_eq!(h.block_number, None);
    }

    #[test]
    fn ai_health_names_model() {
        let h: AiHealth =
            serde_json::from_str(r#"{"status": "healthy", "connected": true, "model": "glm-4.7"}"#).unwrap();
        assert!(h.is_healthy());
        assert_eq!(h.model.as_deref(), Some("glm-4.7"));
        assert!(h.error.is_none());
    }

    #[test]
    fn chain_data_tolerates_missing_records() {
        let d: ProductChainData = serde_json::from_str(
            r#"{"trace_code": "TRACE-20241226-001", "exists": true, "chain_records": null, "record_count": 0}"#,
        )
        .unwrap();
        assert!(d.chain_records.is_none());
        assert!(d.product_info.is_none());
    }
}
