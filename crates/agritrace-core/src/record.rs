use serde::{Deserialize, Serialize};
use std::fmt;

use crate::actor::{ActorRef, Stage};
use crate::attributes::Attributes;
use crate::error::TraceError;
use crate::types::{Anchor, BlockNumber, ChainId, RecordId, Timestamp, TxHash};

// ── Action ───────────────────────────────────────────────────────────────────

/// Kind of event a record logs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Action {
    Create,
    Receive,
    Process,
    Inspect,
    Stock,
    Sell,
    Amend,
    Reject,
    Terminate,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Receive => "receive",
            Action::Process => "process",
            Action::Inspect => "inspect",
            Action::Stock => "stock",
            Action::Sell => "sell",
            Action::Amend => "amend",
            Action::Reject => "reject",
            Action::Terminate => "terminate",
        }
    }

    /// Actions that carry attribute snapshots and feed the merged view.
    pub fn is_attribute_bearing(self) -> bool {
        matches!(self, Action::Create | Action::Amend)
    }

    /// Actions with lifecycle side effects that only their dedicated store
    /// operation may append.
    pub fn is_reserved(self) -> bool {
        matches!(
            self,
            Action::Create | Action::Amend | Action::Reject | Action::Terminate
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Inspection ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub enum InspectionOutcome {
    Pass,
    Fail,
}

/// One measured item on an inspection report.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct InspectionItem {
    pub name: String,
    pub value: String,
    pub standard: String,
    pub pass: bool,
}

// ── RecordData ───────────────────────────────────────────────────────────────

/// Action-specific payload of a record. On the wire the variant name is the
/// record's `action` and the fields sit beside it under `data`.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
#[non_exhaustive]
pub enum RecordData {
    /// Initial attribute snapshot written by the producer.
    Create(Attributes),

    #[serde(rename_all = "camelCase")]
    Receive {
        received_quantity: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quality: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    Process {
        process_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_product: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_quantity: Option<f64>,
    },

    #[serde(rename_all = "camelCase")]
    Inspect {
        result: InspectionOutcome,
        #[serde(default)]
        items: Vec<InspectionItem>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        report_no: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    Stock {
        stock_quantity: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        price: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    Sell {
        sold_quantity: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        price: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        buyer_name: Option<String>,
    },

    /// Attribute patch correcting an earlier record.
    Amend(Attributes),

    #[serde(rename_all = "camelCase")]
    Reject { reject_to: Stage, reason: String },

    Terminate { reason: String, disposal: String },
}

impl RecordData {
    pub fn action(&self) -> Action {
        match self {
            RecordData::Create(_) => Action::Create,
            RecordData::Receive { .. } => Action::Receive,
            RecordData::Process { .. } => Action::Process,
            RecordData::Inspect { .. } => Action::Inspect,
            RecordData::Stock { .. } => Action::Stock,
            RecordData::Sell { .. } => Action::Sell,
            RecordData::Amend(_) => Action::Amend,
            RecordData::Reject { .. } => Action::Reject,
            RecordData::Terminate { .. } => Action::Terminate,
        }
    }

    /// The attribute snapshot or patch, for `create` and `amend` only.
    pub fn attributes(&self) -> Option<&Attributes> {
        match self {
            RecordData::Create(attrs) | RecordData::Amend(attrs) => Some(attrs),
            _ => None,
        }
    }
}

// ── StageRecord ──────────────────────────────────────────────────────────────

/// One immutable event in a chain's history.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
#[serde(try_from = "RecordWire", into = "RecordWire")]
pub struct StageRecord {
    pub id: RecordId,
    pub stage: Stage,
    pub data: RecordData,
    pub previous_record_id: Option<RecordId>,
    pub reason: Option<String>,
    pub operator: ActorRef,
    pub timestamp: Timestamp,
    /// `None` until the owning chain is committed.
    pub anchor: Option<Anchor>,
}

/// Flat JSON shape of a record: `action` and `data` side by side, anchor as
/// nullable `txHash` / `blockNumber`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordWire {
    id: RecordId,
    stage: Stage,
    #[serde(flatten)]
    data: RecordData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous_record_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    operator: ActorRef,
    timestamp: Timestamp,
    #[serde(default)]
    tx_hash: Option<TxHash>,
    #[serde(default)]
    block_number: Option<BlockNumber>,
}

impl TryFrom<RecordWire> for StageRecord {
    type Error = TraceError;

    fn try_from(w: RecordWire) -> Result<Self, Self::Error> {
        let anchor = match (w.tx_hash, w.block_number) {
            (Some(tx_hash), Some(block_number)) => Some(Anchor { tx_hash, block_number }),
            (None, None) => None,
            _ => return Err(TraceError::HalfAnchored(w.id)),
        };
        Ok(Self {
            id: w.id,
            stage: w.stage,
            data: w.data,
            previous_record_id: w.previous_record_id,
            reason: w.reason,
            operator: w.operator,
            timestamp: w.timestamp,
            anchor,
        })
    }
}

impl From<StageRecord> for RecordWire {
    fn from(r: StageRecord) -> Self {
        let (tx_hash, block_number) = match r.anchor {
            Some(a) => (Some(a.tx_hash), Some(a.block_number)),
            None => (None, None),
        };
        Self {
            id: r.id,
            stage: r.stage,
            data: r.data,
            previous_record_id: r.previous_record_id,
            reason: r.reason,
            operator: r.operator,
            timestamp: r.timestamp,
            tx_hash,
            block_number,
        }
    }
}

impl StageRecord {
    pub fn action(&self) -> Action {
        self.data.action()
    }

    pub fn is_anchored(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn tx_hash(&self) -> Option<&TxHash> {
        self.anchor.as_ref().map(|a| &a.tx_hash)
    }

    pub fn block_number(&self) -> Option<BlockNumber> {
        self.anchor.as_ref().map(|a| a.block_number)
    }

    /// Canonical bytes identifying this record's content, independent of its
    /// anchor. Fed to the ledger when deriving a transaction hash.
    pub fn body_bytes(&self, chain: ChainId) -> Result<Vec<u8>, TraceError> {
        #[derive(Serialize)]
        struct Body<'a> {
            chain: ChainId,
            id: RecordId,
            stage: Stage,
            data: &'a RecordData,
            previous_record_id: Option<RecordId>,
            reason: Option<&'a str>,
            operator: &'a ActorRef,
            timestamp: &'a Timestamp,
        }
        serde_json::to_vec(&Body {
            chain,
            id: self.id,
            stage: self.stage,
            data: &self.data,
            previous_record_id: self.previous_record_id,
            reason: self.reason.as_deref(),
            operator: &self.operator,
            timestamp: &self.timestamp,
        })
        .map_err(|e| TraceError::Serialization(format!("record {} body: {e}", self.id)))
    }
}

// ── NewRecord ────────────────────────────────────────────────────────────────

/// Caller-supplied part of a workflow record. The store assigns id,
/// timestamp and anchor.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct NewRecord {
    /// Stage to advance the chain to; `None` records without moving it.
    #[serde(default)]
    pub stage: Option<Stage>,
    #[serde(flatten)]
    pub data: RecordData,
    pub operator: ActorRef,
}

impl NewRecord {
    pub fn new(stage: Stage, data: RecordData, operator: ActorRef) -> Self {
        Self { stage: Some(stage), data, operator }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Role;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn processor() -> ActorRef {
        ActorRef::new(2, "Green Source Processing", Role::Processor)
    }

    fn receive() -> StageRecord {
        StageRecord {
            id: RecordId(2),
            stage: Stage::Processor,
            data: RecordData::Receive { received_quantity: 10.0, quality: Some("A".into()) },
            previous_record_id: None,
            reason: None,
            operator: processor(),
            timestamp: Utc.with_ymd_and_hms(2024, 12, 21, 10, 0, 0).unwrap(),
            anchor: None,
        }
    }

    #[test]
    fn record_data_is_tagged_by_action() {
        let data = RecordData::Receive { received_quantity: 500.0, quality: None };
        let v = serde_json::to_value(&data).unwrap();
        assert_eq!(v, json!({"action": "receive", "data": {"receivedQuantity": 500.0}}));

        let create = RecordData::Create(Attributes::new().with("name", "Tomato"));
        let v = serde_json::to_value(&create).unwrap();
        assert_eq!(v, json!({"action": "create", "data": {"name": "Tomato"}}));
    }

    #[test]
    fn record_data_decodes_from_wire_shape() {
        let data: RecordData = serde_json::from_value(json!({
            "action": "reject",
            "data": {"rejectTo": "processor", "reason": "moisture too high"}
        }))
        .unwrap();
        assert_eq!(
            data,
            RecordData::Reject {
                reject_to: Stage::Processor,
                reason: "moisture too high".into()
            }
        );
        assert_eq!(data.action(), Action::Reject);
    }

    #[test]
    fn record_is_flat_on_the_wire() {
        let mut record = receive();
        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(v["action"], "receive");
        assert_eq!(v["data"], json!({"receivedQuantity": 10.0, "quality": "A"}));
        assert_eq!(v["txHash"], serde_json::Value::Null);
        assert_eq!(v["blockNumber"], serde_json::Value::Null);
        assert!(v.get("anchor").is_none());
        assert!(v.get("previousRecordId").is_none());

        record.anchor = Some(Anchor { tx_hash: TxHash::from_bytes([0xab; 20]), block_number: 12_345_001 });
        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(v["txHash"], format!("0x{}", "ab".repeat(20)));
        assert_eq!(v["blockNumber"], 12_345_001);
        let back: StageRecord = serde_json::from_value(v).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn half_anchored_record_is_rejected() {
        let v = json!({
            "id": 1,
            "stage": "producer",
            "action": "create",
            "data": {"name": "Wuchang Rice"},
            "operator": {"id": 1, "name": "Zhang Farm", "role": "producer"},
            "timestamp": "2024-12-25T08:00:00Z",
            "txHash": "0x7a8b9c1d2e3f4a5b6c7d8e9f0a1b2c3d4e5f6a7b",
            "blockNumber": null
        });
        let err = serde_json::from_value::<StageRecord>(v).unwrap_err();
        assert!(err.to_string().contains("txHash"));
    }

    #[test]
    fn new_record_carries_action_beside_data() {
        let rec: NewRecord = serde_json::from_value(json!({
            "stage": "processor",
            "action": "receive",
            "data": {"receivedQuantity": 500},
            "operator": {"id": 2, "name": "Green Source Processing", "role": "processor"}
        }))
        .unwrap();
        assert_eq!(rec.stage, Some(Stage::Processor));
        assert_eq!(rec.data.action(), Action::Receive);
    }

    #[test]
    fn reserved_actions() {
        assert!(Action::Terminate.is_reserved());
        assert!(Action::Amend.is_reserved());
        assert!(!Action::Receive.is_reserved());
        assert!(!Action::Sell.is_reserved());
    }

    #[test]
    fn body_bytes_ignore_anchor() {
        let mut record = receive();
        let before = record.body_bytes(ChainId(1)).unwrap();
        record.anchor = Some(Anchor {
            tx_hash: TxHash::from_bytes([1; 20]),
            block_number: 7,
        });
        assert_eq!(before, record.body_bytes(ChainId(1)).unwrap());
        assert_ne!(before, record.body_bytes(ChainId(2)).unwrap());
    }
}
