//! agritrace-ledger
//!
//! Identifier sources for the ledger mirror. A networked deployment takes
//! trace codes, transaction hashes and block heights from the backend's
//! ledger write; the offline [`SimulatedLedger`] here produces plausible
//! stand-ins so the mirror can run disconnected.

pub mod clock;
pub mod hash;
pub mod ledger;
pub mod trace;

pub use clock::{Clock, ManualClock, SystemClock};
pub use hash::tx_hash_from_body;
pub use ledger::{Ledger, SimulatedLedger};
pub use trace::TraceSequence;
