/// ─── AgriTrace Constants ─────────────────────────────────────────────────────
///
/// Identifier formats and defaults shared by the mirror, the ledger
/// simulator and the backend client.

// ── Identifiers ──────────────────────────────────────────────────────────────

/// Leading segment of every trace code.
pub const TRACE_CODE_PREFIX: &str = "TRACE";

/// Transaction hashes are 20 bytes (40 hex chars after the `0x`).
pub const TX_HASH_BYTES: usize = 20;

/// First block height handed out by the offline ledger.
pub const GENESIS_BLOCK_NUMBER: u64 = 12_345_000;

// ── Timing ───────────────────────────────────────────────────────────────────

/// Simulated latency of a ledger write during commit (milliseconds).
pub const DEFAULT_COMMIT_LATENCY_MS: u64 = 1_500;

/// Timeout for ordinary backend CRUD calls (seconds).
pub const STANDARD_TIMEOUT_SECS: u64 = 10;

/// Timeout for backend reads that hit the ledger node (seconds).
pub const LEDGER_TIMEOUT_SECS: u64 = 30;

/// Timeout for natural-language summary generation (seconds).
pub const SUMMARY_TIMEOUT_SECS: u64 = 60;

// ── Backend ──────────────────────────────────────────────────────────────────

/// Default base URL of the traceability backend.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000/api";

// ── Attributes ───────────────────────────────────────────────────────────────

/// Attribute key holding the product name. Required on `create`.
pub const ATTR_NAME: &str = "name";

/// Attribute key holding the product category.
pub const ATTR_CATEGORY: &str = "category";
