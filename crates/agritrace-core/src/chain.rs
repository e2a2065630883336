use serde::{Deserialize, Serialize};
use std::fmt;

use crate::actor::{ActorRef, Stage};
use crate::attributes::Attributes;
use crate::error::TraceError;
use crate::record::{Action, StageRecord};
use crate::types::{ChainId, RecordId, Timestamp, TraceCode};

// ── ChainStatus ──────────────────────────────────────────────────────────────

/// Lifecycle of a product chain. Only `Draft → OnChain → Terminated` moves
/// are permitted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub enum ChainStatus {
    Draft,
    OnChain,
    Terminated,
}

impl ChainStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ChainStatus::Draft => "draft",
            ChainStatus::OnChain => "on_chain",
            ChainStatus::Terminated => "terminated",
        }
    }

    /// Whether `self → next` is a legal lifecycle transition.
    pub fn can_transition_to(self, next: ChainStatus) -> bool {
        matches!(
            (self, next),
            (ChainStatus::Draft, ChainStatus::OnChain)
                | (ChainStatus::OnChain, ChainStatus::Terminated)
        )
    }
}

impl fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for ChainStatus {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ChainStatus::Draft),
            "on_chain" => Ok(ChainStatus::OnChain),
            "terminated" => Ok(ChainStatus::Terminated),
            other => Err(TraceError::UnknownStatus(other.to_string())),
        }
    }
}

// ── Distribution ─────────────────────────────────────────────────────────────

/// Who may pick a committed raw-material chain up for processing.
///
/// Serialized as `{"type": "pool" | "assigned", "assignedTo": actor | null}`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
#[serde(try_from = "DistributionRequest", into = "DistributionRequest")]
pub enum Distribution {
    /// Open to any processor.
    #[default]
    Pool,
    /// Reserved for one processor.
    Assigned { assigned_to: ActorRef },
}

impl Distribution {
    pub fn assignee(&self) -> Option<&ActorRef> {
        match self {
            Distribution::Pool => None,
            Distribution::Assigned { assigned_to } => Some(assigned_to),
        }
    }

    pub fn is_pool(&self) -> bool {
        matches!(self, Distribution::Pool)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistributionKind {
    #[default]
    Pool,
    Assigned,
}

/// Unvalidated distribution target as supplied by a caller.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct DistributionRequest {
    #[serde(rename = "type", default)]
    pub kind: DistributionKind,
    #[serde(default)]
    pub assigned_to: Option<ActorRef>,
}

impl DistributionRequest {
    pub fn pool() -> Self {
        Self::default()
    }

    pub fn assigned(to: ActorRef) -> Self {
        Self { kind: DistributionKind::Assigned, assigned_to: Some(to) }
    }
}

impl TryFrom<DistributionRequest> for Distribution {
    type Error = TraceError;

    fn try_from(req: DistributionRequest) -> Result<Self, Self::Error> {
        match (req.kind, req.assigned_to) {
            (DistributionKind::Pool, None) => Ok(Distribution::Pool),
            (DistributionKind::Pool, Some(_)) => Err(TraceError::PoolWithAssignee),
            (DistributionKind::Assigned, Some(assigned_to)) => {
                Ok(Distribution::Assigned { assigned_to })
            }
            (DistributionKind::Assigned, None) => Err(TraceError::MissingAssignee),
        }
    }
}

impl From<Distribution> for DistributionRequest {
    fn from(d: Distribution) -> Self {
        match d {
            Distribution::Pool => DistributionRequest::pool(),
            Distribution::Assigned { assigned_to } => DistributionRequest::assigned(assigned_to),
        }
    }
}

// ── ProductChain ─────────────────────────────────────────────────────────────

/// One product's full traceability record.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProductChain {
    pub id: ChainId,
    pub trace_code: Option<TraceCode>,
    pub product_name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub status: ChainStatus,
    pub current_stage: Stage,
    #[serde(default)]
    pub distribution: Distribution,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminated_reason: Option<String>,
    pub created_at: Timestamp,
    pub records: Vec<StageRecord>,
}

impl ProductChain {
    pub fn is_draft(&self) -> bool {
        self.status == ChainStatus::Draft
    }

    pub fn is_terminated(&self) -> bool {
        self.status == ChainStatus::Terminated
    }

    pub fn record(&self, id: RecordId) -> Option<&StageRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn last_record(&self) -> Option<&StageRecord> {
        self.records.last()
    }

    /// Id the next appended record will receive.
    pub fn next_record_id(&self) -> RecordId {
        RecordId::next_after(self.records.len())
    }

    /// Current logical attributes: `create` and `amend` records folded in
    /// `(timestamp, id)` order, later fields overwriting earlier ones.
    pub fn merged_attributes(&self) -> Attributes {
        let mut sources: Vec<&StageRecord> = self
            .records
            .iter()
            .filter(|r| r.action().is_attribute_bearing())
            .collect();
        sources.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));

        let mut merged = Attributes::new();
        for record in sources {
            if let Some(attrs) = record.data.attributes() {
                merged.merge_from(attrs);
            }
        }
        merged
    }

    pub fn has_amendments(&self) -> bool {
        self.records.iter().any(|r| r.action() == Action::Amend)
    }

    /// Amend records correcting `original`, in append order.
    pub fn amendment_history(&self, original: RecordId) -> Vec<&StageRecord> {
        self.records
            .iter()
            .filter(|r| r.action() == Action::Amend && r.previous_record_id == Some(original))
            .collect()
    }

    /// Verify the structural invariants of a chain received from outside the
    /// store (backend reload, seed files).
    pub fn check_invariants(&self) -> Result<(), TraceError> {
        let violation = |what: String| TraceError::InvariantViolation { chain: self.id, what };

        let first = self
            .records
            .first()
            .ok_or_else(|| violation("chain has no records".into()))?;
        if first.action() != Action::Create {
            return Err(violation(format!("first record is `{}`, not `create`", first.action())));
        }

        match (self.status, &self.trace_code) {
            (ChainStatus::Draft, Some(code)) => {
                return Err(violation(format!("draft chain carries trace code {code}")));
            }
            (ChainStatus::OnChain | ChainStatus::Terminated, None) => {
                return Err(violation(format!("{} chain has no trace code", self.status)));
            }
            _ => {}
        }

        match (self.status, &self.terminated_reason) {
            (ChainStatus::Terminated, None) => {
                return Err(violation("terminated chain has no reason".into()));
            }
            (ChainStatus::Draft | ChainStatus::OnChain, Some(_)) => {
                return Err(violation(format!("{} chain has a termination reason", self.status)));
            }
            _ => {}
        }

        let mut previous: Option<&StageRecord> = None;
        for (index, record) in self.records.iter().enumerate() {
            if record.id != RecordId::next_after(index) {
                return Err(violation(format!(
                    "record at position {} has id {}",
                    index + 1,
                    record.id
                )));
            }
            if let Some(prev) = previous {
                if record.timestamp < prev.timestamp {
                    return Err(violation(format!(
                        "record {} is older than record {}",
                        record.id, prev.id
                    )));
                }
            }
            if self.is_draft() && record.is_anchored() {
                return Err(violation(format!("draft chain has anchored record {}", record.id)));
            }
            if !self.is_draft() && !record.is_anchored() {
                return Err(violation(format!("committed chain has unanchored record {}", record.id)));
            }
            if record.action() == Action::Amend {
                match record.previous_record_id {
                    Some(target) if target < record.id => {}
                    Some(target) => {
                        return Err(violation(format!(
                            "amend {} targets missing record {}",
                            record.id, target
                        )));
                    }
                    None => {
                        return Err(violation(format!("amend {} has no target", record.id)));
                    }
                }
            }
            previous = Some(record);
        }
        Ok(())
    }
}
