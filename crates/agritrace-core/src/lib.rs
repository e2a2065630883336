//! agritrace-core
//!
//! Data model for the product-chain ledger mirror: chains, stage records,
//! identifiers, the attribute merge and the error taxonomy shared by every
//! other crate in the workspace.

pub mod actor;
pub mod attributes;
pub mod chain;
pub mod constants;
pub mod error;
pub mod record;
pub mod types;

pub use actor::{ActorRef, Role, Stage};
pub use attributes::Attributes;
pub use chain::{ChainStatus, Distribution, DistributionKind, DistributionRequest, ProductChain};
pub use error::{ErrorKind, TraceError};
pub use record::{Action, InspectionItem, InspectionOutcome, NewRecord, RecordData, StageRecord};
pub use types::*;
