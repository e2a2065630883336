//! agritrace-state
//!
//! The ledger-mirror store. Holds product chains in memory, applies the
//! lifecycle operations (draft, commit, append, amend, reject, terminate)
//! atomically, and answers read queries and the merged-attribute view.
//!
//! Identifiers come from an `agritrace_ledger::Ledger`; the default is the
//! offline simulator.

pub mod config;
pub mod query;
pub mod seed;
pub mod store;

pub use config::StoreConfig;
pub use query::ChainQuery;
pub use seed::{demo_chains, parse_chains};
pub use store::ChainStore;
