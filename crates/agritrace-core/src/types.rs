use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{TRACE_CODE_PREFIX, TX_HASH_BYTES};
use crate::error::TraceError;

/// Wall-clock instant, UTC.
pub type Timestamp = DateTime<Utc>;

/// Height of the block a record was anchored in.
pub type BlockNumber = u64;

// ── ChainId ──────────────────────────────────────────────────────────────────

/// Process-local product chain identifier. Assigned by the store at creation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Debug)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── RecordId ─────────────────────────────────────────────────────────────────

/// Sequence-local record identifier: 1-based position within the owning chain.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Debug)]
#[serde(transparent)]
pub struct RecordId(pub u32);

impl RecordId {
    /// The id the next record appended after `len` existing records receives.
    pub fn next_after(len: usize) -> Self {
        Self(len as u32 + 1)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── TraceCode ────────────────────────────────────────────────────────────────

/// Public trace code, `TRACE-YYYYMMDD-NNN`. The sequence is at least three
/// digits and grows past 999 without truncation.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Debug)]
#[serde(try_from = "String", into = "String")]
pub struct TraceCode(String);

impl TraceCode {
    pub fn new(date: NaiveDate, seq: u32) -> Self {
        Self(format!("{}-{}-{:03}", TRACE_CODE_PREFIX, date.format("%Y%m%d"), seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The date segment of the code.
    pub fn date(&self) -> Option<NaiveDate> {
        let date = self.0.split('-').nth(1)?;
        NaiveDate::parse_from_str(date, "%Y%m%d").ok()
    }

    /// The sequence segment of the code.
    pub fn sequence(&self) -> Option<u32> {
        self.0.rsplit('-').next()?.parse().ok()
    }
}

impl FromStr for TraceCode {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TraceError::InvalidTraceCode(s.to_string());
        let mut parts = s.split('-');
        if parts.next() != Some(TRACE_CODE_PREFIX) {
            return Err(invalid());
        }
        let date = parts.next().ok_or_else(invalid)?;
        if date.len() != 8 || NaiveDate::parse_from_str(date, "%Y%m%d").is_err() {
            return Err(invalid());
        }
        let seq = parts.next().ok_or_else(invalid)?;
        if seq.len() < 3 || !seq.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for TraceCode {
    type Error = TraceError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TraceCode> for String {
    fn from(code: TraceCode) -> Self {
        code.0
    }
}

impl fmt::Display for TraceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── TxHash ───────────────────────────────────────────────────────────────────

/// 20-byte ledger transaction hash rendered as `0x` + 40 lowercase hex chars.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxHash([u8; TX_HASH_BYTES]);

impl TxHash {
    pub fn from_bytes(b: [u8; TX_HASH_BYTES]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; TX_HASH_BYTES] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse `0x` + 40 hex chars. Upper-case digits are accepted and
    /// normalised to lower case on display.
    pub fn from_hex(s: &str) -> Result<Self, TraceError> {
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| TraceError::InvalidTxHash(s.to_string()))?;
        if digits.len() != TX_HASH_BYTES * 2 {
            return Err(TraceError::InvalidTxHash(s.to_string()));
        }
        let mut arr = [0u8; TX_HASH_BYTES];
        hex::decode_to_slice(digits, &mut arr)
            .map_err(|_| TraceError::InvalidTxHash(s.to_string()))?;
        Ok(Self(arr))
    }
}

impl TryFrom<String> for TxHash {
    type Error = TraceError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<TxHash> for String {
    fn from(hash: TxHash) -> Self {
        hash.to_hex()
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({}…)", &self.to_hex()[..10])
    }
}

// ── Anchor ───────────────────────────────────────────────────────────────────

/// Ledger position of a committed record. A record either has both fields
/// or neither, so they travel together.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Anchor {
    pub tx_hash: TxHash,
    pub block_number: BlockNumber,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_code_pads_sequence_to_three_digits() {
        let date = NaiveDate::from_ymd_opt(2024, 12, 26).unwrap();
        assert_eq!(TraceCode::new(date, 1).as_str(), "TRACE-20241226-001");
        assert_eq!(TraceCode::new(date, 42).as_str(), "TRACE-20241226-042");
        assert_eq!(TraceCode::new(date, 1234).as_str(), "TRACE-20241226-1234");
    }

    #[test]
    fn trace_code_parse_rejects_malformed() {
        assert!("TRACE-20241226-001".parse::<TraceCode>().is_ok());
        assert!("TRACE-20241326-001".parse::<TraceCode>().is_err());
        assert!("TRACE-20241226-01".parse::<TraceCode>().is_err());
        assert!("TRACK-20241226-001".parse::<TraceCode>().is_err());
        assert!("TRACE-20241226-001-9".parse::<TraceCode>().is_err());
    }

    #[test]
    fn trace_code_segments() {
        let code: TraceCode = "TRACE-20241226-017".parse().unwrap();
        assert_eq!(code.date(), NaiveDate::from_ymd_opt(2024, 12, 26));
        assert_eq!(code.sequence(), Some(17));
    }

    #[test]
    fn tx_hash_hex_format() {
        let hash = TxHash::from_bytes([0xAB; TX_HASH_BYTES]);
        let s = hash.to_hex();
        assert_eq!(s.len(), 42);
        assert!(s.starts_with("0x"));
        assert!(s[2..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(TxHash::from_hex(&s).unwrap(), hash);
    }

    #[test]
    fn tx_hash_rejects_wrong_length_or_prefix() {
        assert!(TxHash::from_hex("0x1234").is_err());
        assert!(TxHash::from_hex(&"a".repeat(42)).is_err());
        assert!(TxHash::from_hex(&format!("0x{}", "g".repeat(40))).is_err());
    }
}
