use thiserror::Error;

use crate::chain::ChainStatus;
use crate::record::Action;
use crate::types::{ChainId, RecordId};

/// Coarse error class, used by callers to decide how to react.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ErrorKind {
    /// A referenced chain or record does not exist.
    NotFound,
    /// The operation would violate a lifecycle invariant.
    InvalidState,
    /// Malformed caller input.
    Validation,
    /// Network failure or timeout talking to the backend. Retryable.
    TransientBackend,
    /// The backend rejected our credentials; the session must be cleared.
    Unauthorized,
    /// The backend answered with something we could not interpret.
    Protocol,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TraceError {
    // ── Not found ────────────────────────────────────────────────────────────
    #[error("product chain not found: {0}")]
    ChainNotFound(ChainId),

    #[error("record {record} not found in chain {chain}")]
    RecordNotFound { chain: ChainId, record: RecordId },

    #[error("no product chain with trace code {0}")]
    TraceCodeNotFound(String),

    #[error("backend resource not found: {0}")]
    RemoteNotFound(String),

    // ── Lifecycle ────────────────────────────────────────────────────────────
    #[error("chain {chain} is {status}; operation requires {expected}")]
    UnexpectedStatus {
        chain: ChainId,
        status: ChainStatus,
        expected: ChainStatus,
    },

    #[error("chain {0} is terminated; no further records may be appended")]
    ChainTerminated(ChainId),

    #[error("chain {0} has a commit in flight")]
    CommitInFlight(ChainId),

    #[error("invariant violated in chain {chain}: {what}")]
    InvariantViolation { chain: ChainId, what: String },

    #[error("trace code {0} is already in use")]
    DuplicateTraceCode(String),

    #[error("duplicate chain id {0}")]
    DuplicateChainId(ChainId),

    // ── Validation ───────────────────────────────────────────────────────────
    #[error("product attributes must include a non-empty string `name`")]
    MissingProductName,

    #[error("assigned distribution requires a target")]
    MissingAssignee,

    #[error("pool distribution cannot name an assignee")]
    PoolWithAssignee,

    #[error("`{0}` records must be written through their dedicated operation")]
    ReservedAction(Action),

    #[error("unknown stage: {0}")]
    UnknownStage(String),

    #[error("unknown chain status: {0}")]
    UnknownStatus(String),

    #[error("invalid trace code: {0}")]
    InvalidTraceCode(String),

    #[error("invalid transaction hash: {0}")]
    InvalidTxHash(String),

    #[error("record {0} must carry both txHash and blockNumber or neither")]
    HalfAnchored(RecordId),

    #[error("backend rejected the request ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    // ── Backend ──────────────────────────────────────────────────────────────
    #[error("backend unreachable: {0}")]
    Backend(String),

    #[error("backend request timed out: {0}")]
    Timeout(String),

    #[error("backend rejected credentials; sign in again")]
    Unauthorized,

    #[error("malformed backend response: {0}")]
    Serialization(String),
}

impl TraceError {
    pub fn kind(&self) -> ErrorKind {
        use TraceError::*;
        match self {
            ChainNotFound(_) | RecordNotFound { .. } | TraceCodeNotFound(_) | RemoteNotFound(_) => {
                ErrorKind::NotFound
            }
            UnexpectedStatus { .. }
            | ChainTerminated(_)
            | CommitInFlight(_)
            | InvariantViolation { .. }
            | DuplicateTraceCode(_)
            | DuplicateChainId(_) => ErrorKind::InvalidState,
            MissingProductName
            | MissingAssignee
            | PoolWithAssignee
            | ReservedAction(_)
            | UnknownStage(_)
            | UnknownStatus(_)
            | InvalidTraceCode(_)
            | InvalidTxHash(_)
            | HalfAnchored(_)
            | Rejected { .. } => ErrorKind::Validation,
            Backend(_) | Timeout(_) => ErrorKind::TransientBackend,
            Unauthorized => ErrorKind::Unauthorized,
            Serialization(_) => ErrorKind::Protocol,
        }
    }

    /// Only transient backend failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::TransientBackend
    }
}
