use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use agritrace_core::actor::{ActorRef, Stage};
use agritrace_core::attributes::Attributes;
use agritrace_core::chain::{ChainStatus, Distribution, DistributionRequest, ProductChain};
use agritrace_core::error::TraceError;
use agritrace_core::record::{NewRecord, RecordData, StageRecord};
use agritrace_core::types::{ChainId, RecordId, Timestamp, TraceCode};
use agritrace_ledger::{Clock, Ledger, SimulatedLedger, SystemClock, TraceSequence};
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::query::ChainQuery;

// ── Mutable state ─────────────────────────────────────────────────────────────

struct Inner {
    chains: BTreeMap<ChainId, ProductChain>,
    by_trace_code: HashMap<TraceCode, ChainId>,
    next_chain_id: u64,
    /// Chains with a commit suspended on the ledger write.
    in_flight: HashSet<ChainId>,
    sequence: TraceSequence,
    ledger: Box<dyn Ledger>,
}

/// Fields of a record the operation decides; the store fills in the rest.
struct Entry {
    stage: Stage,
    data: RecordData,
    previous_record_id: Option<RecordId>,
    reason: Option<String>,
    operator: ActorRef,
}

impl Inner {
    fn chain(&self, id: ChainId) -> Result<&ProductChain, TraceError> {
        self.chains.get(&id).ok_or(TraceError::ChainNotFound(id))
    }

    /// Chain exists, is not terminated and has no commit in flight.
    fn ensure_writable(&self, id: ChainId) -> Result<&ProductChain, TraceError> {
        let chain = self.chain(id)?;
        if self.in_flight.contains(&id) {
            return Err(TraceError::CommitInFlight(id));
        }
        if chain.is_terminated() {
            return Err(TraceError::ChainTerminated(id));
        }
        Ok(chain)
    }

    /// Append one record and apply `effect` to the chain.
    ///
    /// Every fallible step (checks, ledger write) happens before the chain is
    /// touched, so an error leaves it unchanged.
    fn append(
        &mut self,
        id: ChainId,
        now: Timestamp,
        entry: Entry,
        effect: impl FnOnce(&mut ProductChain),
    ) -> Result<StageRecord, TraceError> {
        self.ensure_writable(id)?;
        let chain = self.chains.get_mut(&id).ok_or(TraceError::ChainNotFound(id))?;

        // Records never go backwards in time, even if the clock does.
        let timestamp = chain.last_record().map_or(now, |last| last.timestamp.max(now));
        let mut record = StageRecord {
            id: chain.next_record_id(),
            stage: entry.stage,
            data: entry.data,
            previous_record_id: entry.previous_record_id,
            reason: entry.reason,
            operator: entry.operator,
            timestamp,
            anchor: None,
        };

        // Draft records are anchored together at commit.
        if !chain.is_draft() {
            let anchors = self.ledger.anchor_batch(&[record.body_bytes(id)?])?;
            let anchor = anchors.into_iter().next().ok_or_else(|| {
                TraceError::InvariantViolation { chain: id, what: "ledger returned no anchor".into() }
            })?;
            record.anchor = Some(anchor);
        }

        chain.records.push(record.clone());
        effect(chain);
        Ok(record)
    }

    /// Second half of `commit`, run after the simulated ledger latency.
    fn finish_commit(&mut self, id: ChainId, now: Timestamp) -> Result<ProductChain, TraceError> {
        let chain = self.chain(id)?;
        if chain.status != ChainStatus::Draft {
            return Err(TraceError::UnexpectedStatus {
                chain: id,
                status: chain.status,
                expected: ChainStatus::Draft,
            });
        }

        let pending: Vec<usize> = chain
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.is_anchored())
            .map(|(i, _)| i)
            .collect();
        let bodies = pending
            .iter()
            .map(|&i| chain.records[i].body_bytes(id))
            .collect::<Result<Vec<_>, _>>()?;

        let anchors = self.ledger.anchor_batch(&bodies)?;
        if anchors.len() != bodies.len() {
            return Err(TraceError::InvariantViolation {
                chain: id,
                what: format!("ledger returned {} anchors for {} records", anchors.len(), bodies.len()),
            });
        }

        let by_trace_code = &self.by_trace_code;
        let code = self.sequence.issue(now.date_naive(), |c| by_trace_code.contains_key(c));

        let chain = self.chains.get_mut(&id).ok_or(TraceError::ChainNotFound(id))?;
        for (i, anchor) in pending.into_iter().zip(anchors) {
            chain.records[i].anchor = Some(anchor);
        }
        chain.trace_code = Some(code.clone());
        chain.status = ChainStatus::OnChain;
        self.by_trace_code.insert(code, id);
        Ok(chain.clone())
    }
}

// ── ChainStore ────────────────────────────────────────────────────────────────

/// In-memory mirror of the product chains held by the backend ledger.
///
/// Operations take `&self`; state sits behind a mutex that is never held
/// across an `.await`. Each mutating call is all-or-nothing. The mirror is a
/// cache: [`reload`](Self::reload) lets the backend overwrite it wholesale.
pub struct ChainStore {
    inner: Arc<Mutex<Inner>>,
    clock: Arc<dyn Clock>,
    commit_latency: Duration,
}

/// Marks a chain as mid-commit for as long as it lives.
struct InFlight {
    inner: Arc<Mutex<Inner>>,
    id: ChainId,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        lock(&self.inner).in_flight.remove(&self.id);
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ChainStore {
    pub fn new(config: StoreConfig) -> Self {
        let ledger = match config.ledger_seed {
            Some(seed) => SimulatedLedger::with_seed(config.genesis_block, seed),
            None => SimulatedLedger::new(config.genesis_block),
        };
        Self {
            inner: Arc::new(Mutex::new(Inner {
                chains: BTreeMap::new(),
                by_trace_code: HashMap::new(),
                next_chain_id: 1,
                in_flight: HashSet::new(),
                sequence: TraceSequence::new(),
                ledger: Box::new(ledger),
            })),
            clock: Arc::new(SystemClock),
            commit_latency: config.commit_latency(),
        }
    }

    /// Replace the identifier source, e.g. with a backend-backed ledger.
    pub fn with_ledger(self, ledger: impl Ledger + 'static) -> Self {
        self.lock().ledger = Box::new(ledger);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Start from an existing set of chains.
    pub fn with_chains(self, chains: Vec<ProductChain>) -> Result<Self, TraceError> {
        self.reload(chains)?;
        Ok(self)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }

    // ── Mutations ─────────────────────────────────────────────────────────────

    /// Create a draft chain holding one unanchored `create` record.
    pub fn create_draft(
        &self,
        attributes: Attributes,
        operator: ActorRef,
        distribution: DistributionRequest,
    ) -> Result<ProductChain, TraceError> {
        let product_name = attributes.require_name()?.to_string();
        let distribution = Distribution::try_from(distribution)?;
        let category = attributes.category().map(str::to_string);
        let now = self.clock.now();

        let mut inner = self.lock();
        let id = ChainId(inner.next_chain_id);
        let chain = ProductChain {
            id,
            trace_code: None,
            product_name,
            category,
            status: ChainStatus::Draft,
            current_stage: Stage::Producer,
            distribution,
            terminated_reason: None,
            created_at: now,
            records: vec![StageRecord {
                id: RecordId(1),
                stage: Stage::Producer,
                data: RecordData::Create(attributes),
                previous_record_id: None,
                reason: None,
                operator,
                timestamp: now,
                anchor: None,
            }],
        };
        inner.next_chain_id += 1;
        inner.chains.insert(id, chain.clone());

        info!(chain = %id, product = %chain.product_name, "draft chain created");
        Ok(chain)
    }

    /// Commit a draft to the ledger: assign its trace code and anchor every
    /// record. Suspends for the configured ledger latency; meanwhile the chain
    /// rejects other mutations and readers see the draft.
    ///
    /// Once started the ledger write runs to completion on the runtime, even
    /// if the returned future is dropped.
    pub async fn commit(&self, id: ChainId) -> Result<ProductChain, TraceError> {
        {
            let mut inner = self.lock();
            let chain = inner.chain(id)?;
            if chain.status != ChainStatus::Draft {
                return Err(TraceError::UnexpectedStatus {
                    chain: id,
                    status: chain.status,
                    expected: ChainStatus::Draft,
                });
            }
            if !inner.in_flight.insert(id) {
                return Err(TraceError::CommitInFlight(id));
            }
        }
        let guard = InFlight { inner: Arc::clone(&self.inner), id };
        let clock = Arc::clone(&self.clock);
        let latency = self.commit_latency;

        debug!(chain = %id, latency_ms = latency.as_millis() as u64, "writing chain to ledger");
        let write = tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            let now = clock.now();
            let result = lock(&guard.inner).finish_commit(id, now);
            drop(guard);
            match &result {
                Ok(chain) => info!(
                    chain = %id,
                    trace_code = %chain.trace_code.as_ref().map(TraceCode::as_str).unwrap_or_default(),
                    records = chain.records.len(),
                    "chain committed"
                ),
                Err(e) => warn!(chain = %id, error = %e, "commit failed"),
            }
            result
        });

        write.await.unwrap_or_else(|e| {
            Err(TraceError::InvariantViolation { chain: id, what: format!("ledger write aborted: {e}") })
        })
    }

    /// Append a workflow record (receive, process, inspect, stock, sell).
    ///
    /// If `record.stage` is set the chain advances to it. Lifecycle records
    /// (`create`, `amend`, `reject`, `terminate`) go through their own
    /// operations.
    pub fn append_record(&self, id: ChainId, record: NewRecord) -> Result<StageRecord, TraceError> {
        let action = record.data.action();
        if action.is_reserved() {
            return Err(TraceError::ReservedAction(action));
        }
        let now = self.clock.now();

        let mut inner = self.lock();
        let current = inner.ensure_writable(id)?.current_stage;
        let stage = record
            .stage
            .or_else(|| record.operator.role.stage())
            .unwrap_or(current);
        let advance_to = record.stage;
        let appended = inner.append(
            id,
            now,
            Entry {
                stage,
                data: record.data,
                previous_record_id: None,
                reason: None,
                operator: record.operator,
            },
            |chain| {
                if let Some(stage) = advance_to {
                    chain.current_stage = stage;
                }
            },
        )?;

        info!(chain = %id, record = %appended.id, action = %action, stage = %stage, "record appended");
        Ok(appended)
    }

    /// Append a correction of `original`. The original record is untouched;
    /// the change shows up in [`merged_attributes`](Self::merged_attributes).
    pub fn amend(
        &self,
        id: ChainId,
        original: RecordId,
        amended: Attributes,
        reason: impl Into<String>,
        operator: ActorRef,
    ) -> Result<StageRecord, TraceError> {
        let now = self.clock.now();

        let mut inner = self.lock();
        let stage = inner
            .ensure_writable(id)?
            .record(original)
            .map(|r| r.stage)
            .ok_or(TraceError::RecordNotFound { chain: id, record: original })?;
        let appended = inner.append(
            id,
            now,
            Entry {
                stage,
                data: RecordData::Amend(amended),
                previous_record_id: Some(original),
                reason: Some(reason.into()),
                operator,
            },
            |_| {},
        )?;

        info!(chain = %id, record = %appended.id, corrects = %original, "amendment appended");
        Ok(appended)
    }

    /// Send the chain back to `reject_to`. Any stage is accepted.
    pub fn reject(
        &self,
        id: ChainId,
        reject_to: Stage,
        reason: impl Into<String>,
        operator: ActorRef,
    ) -> Result<StageRecord, TraceError> {
        let reason = reason.into();
        let now = self.clock.now();

        let mut inner = self.lock();
        let appended = inner.append(
            id,
            now,
            Entry {
                stage: Stage::Inspector,
                data: RecordData::Reject { reject_to, reason: reason.clone() },
                previous_record_id: None,
                reason: Some(reason),
                operator,
            },
            |chain| chain.current_stage = reject_to,
        )?;

        info!(chain = %id, record = %appended.id, reject_to = %reject_to, "chain rejected");
        Ok(appended)
    }

    /// Terminate a committed chain. Terminal: later mutations fail.
    pub fn terminate(
        &self,
        id: ChainId,
        reason: impl Into<String>,
        disposal: impl Into<String>,
        operator: ActorRef,
    ) -> Result<StageRecord, TraceError> {
        let reason = reason.into();
        let now = self.clock.now();

        let mut inner = self.lock();
        let status = inner.ensure_writable(id)?.status;
        if !status.can_transition_to(ChainStatus::Terminated) {
            return Err(TraceError::UnexpectedStatus {
                chain: id,
                status,
                expected: ChainStatus::OnChain,
            });
        }
        let terminated_reason = reason.clone();
        let appended = inner.append(
            id,
            now,
            Entry {
                stage: Stage::Inspector,
                data: RecordData::Terminate { reason: reason.clone(), disposal: disposal.into() },
                previous_record_id: None,
                reason: Some(reason),
                operator,
            },
            |chain| {
                chain.status = ChainStatus::Terminated;
                chain.terminated_reason = Some(terminated_reason);
            },
        )?;

        info!(chain = %id, record = %appended.id, "chain terminated");
        Ok(appended)
    }

    /// Replace the mirror with chains from the authoritative backend.
    ///
    /// Every chain must pass its invariant checks and ids and trace codes must
    /// be unique; otherwise nothing changes. Refused while a commit is in
    /// flight.
    pub fn reload(&self, chains: Vec<ProductChain>) -> Result<(), TraceError> {
        let mut map = BTreeMap::new();
        let mut by_trace_code = HashMap::new();
        let mut max_block = None;
        for chain in chains {
            chain.check_invariants()?;
            if let Some(code) = &chain.trace_code {
                if by_trace_code.insert(code.clone(), chain.id).is_some() {
                    return Err(TraceError::DuplicateTraceCode(code.to_string()));
                }
            }
            let chain_max = chain.records.iter().filter_map(StageRecord::block_number).max();
            max_block = max_block.max(chain_max);
            if let Some(dup) = map.insert(chain.id, chain) {
                return Err(TraceError::DuplicateChainId(dup.id));
            }
        }

        let mut inner = self.lock();
        if let Some(id) = inner.in_flight.iter().next() {
            return Err(TraceError::CommitInFlight(*id));
        }
        let next_id = map.keys().next_back().map_or(1, |id| id.0 + 1);
        inner.next_chain_id = inner.next_chain_id.max(next_id);
        if let Some(height) = max_block {
            inner.ledger.observe_height(height);
        }
        info!(chains = map.len(), "mirror reloaded");
        inner.chains = map;
        inner.by_trace_code = by_trace_code;
        Ok(())
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    /// Run `f` against a consistent view of every chain.
    pub fn query<R>(&self, f: impl FnOnce(ChainQuery<'_>) -> R) -> R {
        let inner = self.lock();
        f(ChainQuery::new(inner.chains.values()))
    }

    pub fn get(&self, id: ChainId) -> Result<ProductChain, TraceError> {
        self.lock().chain(id).cloned()
    }

    /// Every chain, in id order.
    pub fn snapshot(&self) -> Vec<ProductChain> {
        self.lock().chains.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn drafts(&self) -> Vec<ProductChain> {
        self.query(|q| cloned(q.by_status(ChainStatus::Draft)))
    }

    pub fn on_chain(&self) -> Vec<ProductChain> {
        self.query(|q| cloned(q.by_status(ChainStatus::OnChain)))
    }

    pub fn terminated(&self) -> Vec<ProductChain> {
        self.query(|q| cloned(q.by_status(ChainStatus::Terminated)))
    }

    pub fn by_stage(&self, stage: Stage) -> Vec<ProductChain> {
        self.query(|q| cloned(q.by_stage(stage)))
    }

    pub fn pool(&self) -> Vec<ProductChain> {
        self.query(|q| cloned(q.pool()))
    }

    pub fn assigned_to(&self, actor_id: u64) -> Vec<ProductChain> {
        self.query(|q| cloned(q.assigned_to(actor_id)))
    }

    pub fn awaiting_pickup_by(&self, actor_id: u64) -> Vec<ProductChain> {
        self.query(|q| cloned(q.awaiting_pickup_by(actor_id)))
    }

    pub fn by_trace_code(&self, code: &str) -> Option<ProductChain> {
        let code: TraceCode = code.parse().ok()?;
        let inner = self.lock();
        let id = inner.by_trace_code.get(&code)?;
        inner.chains.get(id).cloned()
    }

    pub fn merged_attributes(&self, id: ChainId) -> Result<Attributes, TraceError> {
        Ok(self.lock().chain(id)?.merged_attributes())
    }

    pub fn has_amendments(&self, id: ChainId) -> Result<bool, TraceError> {
        Ok(self.lock().chain(id)?.has_amendments())
    }

    pub fn amendment_history(&self, id: ChainId, original: RecordId) -> Result<Vec<StageRecord>, TraceError> {
        let inner = self.lock();
        let chain = inner.chain(id)?;
        if chain.record(original).is_none() {
            return Err(TraceError::RecordNotFound { chain: id, record: original });
        }
        Ok(chain.amendment_history(original).into_iter().cloned().collect())
    }

    /// Whether a commit of `id` is currently suspended on the ledger.
    pub fn is_committing(&self, id: ChainId) -> bool {
        self.lock().in_flight.contains(&id)
    }
}

impl Default for ChainStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

fn cloned(chains: Vec<&ProductChain>) -> Vec<ProductChain> {
    chains.into_iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use agritrace_core::actor::Role;
    use agritrace_core::error::ErrorKind;
    use agritrace_core::record::Action;
    use agritrace_ledger::ManualClock;
    use chrono::{TimeZone, Utc};

    fn farmer() -> ActorRef {
        ActorRef::new(1, "Zhang Farm", Role::Producer)
    }

    fn inspector() -> ActorRef {
        ActorRef::new(3, "Li Inspector", Role::Inspector)
    }

    fn store() -> ChainStore {
        ChainStore::new(StoreConfig::instant())
    }

    fn tomato() -> Attributes {
        Attributes::new().with("name", "Tomato").with("category", "Vegetable")
    }

    #[test]
    fn create_draft_requires_name() {
        let s = store();
        let err = s
            .create_draft(Attributes::new().with("category", "Fruit"), farmer(), DistributionRequest::pool())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(s.is_empty());
    }

    #[test]
    fn action_is_an_ordinary_attribute_key() {
        let s = store();
        let chain = s
            .create_draft(tomato().with("action", "sell"), farmer(), DistributionRequest::pool())
            .unwrap();
        assert_eq!(chain.records[0].action(), Action::Create);
        assert_eq!(s.merged_attributes(chain.id).unwrap().get_str("action"), Some("sell"));
    }

    #[test]
    fn create_draft_rejects_assigned_without_target() {
        let s = store();
        let req = DistributionRequest {
            kind: agritrace_core::chain::DistributionKind::Assigned,
            assigned_to: None,
        };
        let err = s.create_draft(tomato(), farmer(), req).unwrap_err();
        assert!(matches!(err, TraceError::MissingAssignee));
        assert!(s.is_empty());
    }

    #[test]
    fn draft_shape() {
        let s = store();
        let chain = s.create_draft(tomato(), farmer(), DistributionRequest::pool()).unwrap();
        assert_eq!(chain.status, ChainStatus::Draft);
        assert!(chain.trace_code.is_none());
        assert_eq!(chain.product_name, "Tomato");
        assert_eq!(chain.category.as_deref(), Some("Vegetable"));
        assert_eq!(chain.records.len(), 1);
        assert_eq!(chain.records[0].action(), Action::Create);
        assert!(!chain.records[0].is_anchored());
        assert_eq!(s.drafts().len(), 1);
    }

    #[test]
    fn chain_ids_are_unique() {
        let s = store();
        let a = s.create_draft(tomato(), farmer(), DistributionRequest::pool()).unwrap();
        let b = s.create_draft(tomato(), farmer(), DistributionRequest::pool()).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn records_on_draft_stay_unanchored() {
        let s = store();
        let id = s.create_draft(tomato(), farmer(), DistributionRequest::pool()).unwrap().id;
        let rec = s
            .amend(id, RecordId(1), Attributes::new().with("unit", "kg"), "missing unit", farmer())
            .unwrap();
        assert!(rec.anchor.is_none());
        s.get(id).unwrap().check_invariants().unwrap();
    }

    #[test]
    fn append_rejects_reserved_actions() {
        let s = store();
        let id = s.create_draft(tomato(), farmer(), DistributionRequest::pool()).unwrap().id;
        let err = s
            .append_record(
                id,
                NewRecord::new(
                    Stage::Inspector,
                    RecordData::Terminate { reason: "x".into(), disposal: "y".into() },
                    inspector(),
                ),
            )
            .unwrap_err();
        assert_eq!(err, TraceError::ReservedAction(Action::Terminate));
        assert_eq!(s.get(id).unwrap().records.len(), 1);
    }

    #[test]
    fn terminate_requires_committed_chain() {
        let s = store();
        let id = s.create_draft(tomato(), farmer(), DistributionRequest::pool()).unwrap().id;
        let err = s.terminate(id, "spoiled", "destroy", inspector()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(s.get(id).unwrap().status, ChainStatus::Draft);
    }

    #[test]
    fn timestamps_never_decrease() {
        let start = Utc.with_ymd_and_hms(2024, 12, 26, 9, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let s = store().with_clock(clock.clone());
        let id = s.create_draft(tomato(), farmer(), DistributionRequest::pool()).unwrap().id;

        clock.set(start - chrono::Duration::hours(1));
        let rec = s
            .amend(id, RecordId(1), Attributes::new().with("unit", "kg"), "unit", farmer())
            .unwrap();
        assert_eq!(rec.timestamp, start);
    }

    #[test]
    fn unknown_chain_is_not_found() {
        let s = store();
        let err = s.reject(ChainId(42), Stage::Producer, "x", inspector()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(s.get(ChainId(42)).unwrap_err(), TraceError::ChainNotFound(ChainId(42)));
    }

    #[test]
    fn amendment_history_checks_target() {
        let s = store();
        let id = s.create_draft(tomato(), farmer(), DistributionRequest::pool()).unwrap().id;
        assert!(s.amendment_history(id, RecordId(1)).unwrap().is_empty());
        assert!(!s.has_amendments(id).unwrap());
        assert!(matches!(
            s.amendment_history(id, RecordId(7)),
            Err(TraceError::RecordNotFound { .. })
        ));
    }
}
