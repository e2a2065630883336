//! agritrace-client
//!
//! Bearer-token JSON client for the traceability backend. Covers the ledger
//! queries (chain info, transactions, blocks, trace-code verification, raw
//! chain data), ledger and summary-service health, and the product summary
//! endpoint. Failures map onto `agritrace_core::TraceError`.

pub mod client;
pub mod config;
pub mod types;

pub use client::BackendClient;
pub use config::{ClientConfig, EndpointClass};
pub use types::{
    AiHealth, BlockInfo, ChainInfo, Health, ProductChainData, Summary, TransactionInfo, VerifyResult,
};
