use agritrace_core::actor::Stage;
use agritrace_core::chain::{ChainStatus, Distribution, ProductChain};

/// Read-only filters over a set of product chains.
///
/// Borrowed views; results keep the order of the underlying collection.
pub struct ChainQuery<'a> {
    chains: Vec<&'a ProductChain>,
}

impl<'a> ChainQuery<'a> {
    pub fn new(chains: impl IntoIterator<Item = &'a ProductChain>) -> Self {
        Self { chains: chains.into_iter().collect() }
    }

    pub fn all(&self) -> Vec<&'a ProductChain> {
        self.chains.clone()
    }

    fn filter(&self, pred: impl Fn(&ProductChain) -> bool) -> Vec<&'a ProductChain> {
        self.chains.iter().copied().filter(|c| pred(c)).collect()
    }

    pub fn by_status(&self, status: ChainStatus) -> Vec<&'a ProductChain> {
        self.filter(|c| c.status == status)
    }

    /// Committed chains currently sitting at `stage`.
    pub fn by_stage(&self, stage: Stage) -> Vec<&'a ProductChain> {
        self.filter(|c| c.status == ChainStatus::OnChain && c.current_stage == stage)
    }

    /// Committed raw materials open to any processor.
    pub fn pool(&self) -> Vec<&'a ProductChain> {
        self.filter(|c| {
            c.status == ChainStatus::OnChain
                && c.current_stage == Stage::Producer
                && c.distribution.is_pool()
        })
    }

    /// Every chain whose distribution names `actor_id`, in any status.
    pub fn assigned_to(&self, actor_id: u64) -> Vec<&'a ProductChain> {
        self.filter(|c| matches!(&c.distribution, Distribution::Assigned { assigned_to } if assigned_to.id == actor_id))
    }

    /// Committed raw materials reserved for `actor_id` and not yet received.
    pub fn awaiting_pickup_by(&self, actor_id: u64) -> Vec<&'a ProductChain> {
        self.assigned_to(actor_id)
            .into_iter()
            .filter(|c| c.status == ChainStatus::OnChain && c.current_stage == Stage::Producer)
            .collect()
    }

    pub fn by_trace_code(&self, code: &str) -> Option<&'a ProductChain> {
        self.chains
            .iter()
            .copied()
            .find(|c| c.trace_code.as_ref().is_some_and(|t| t.as_str() == code))
    }
}
