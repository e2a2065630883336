use anyhow::Context;
use tracing::info;

use agritrace_core::{
    ActorRef, Attributes, DistributionRequest, NewRecord, ProductChain, RecordData, RecordId, Role,
    Stage,
};
use agritrace_state::ChainStore;

/// Walk one tomato lot through draft, commit, receipt, a correction and
/// termination. Returns the final chain and its merged attributes.
pub async fn run(store: &ChainStore) -> anyhow::Result<(ProductChain, Attributes)> {
    let farmer = ActorRef::new(1, "Zhang Farm", Role::Producer);
    let processor = ActorRef::new(2, "Green Source Processing", Role::Processor);
    let inspector = ActorRef::new(3, "Li Inspector", Role::Inspector);

    let attributes = Attributes::new()
        .with("name", "Tomato")
        .with("category", "Vegetable")
        .with("origin", "Shouguang, Shandong")
        .with("quantity", 500)
        .with("unit", "kg");
    let draft = store
        .create_draft(attributes, farmer.clone(), DistributionRequest::pool())
        .context("creating draft")?;

    let committed = store.commit(draft.id).await.context("committing draft")?;
    info!(
        chain = %committed.id,
        trace_code = %committed.trace_code.as_ref().map(|c| c.as_str()).unwrap_or_default(),
        "demo chain on ledger"
    );

    store
        .append_record(
            draft.id,
            NewRecord::new(
                Stage::Processor,
                RecordData::Receive { received_quantity: 480.0, quality: Some("A".into()) },
                processor,
            ),
        )
        .context("recording receipt")?;

    store
        .amend(
            draft.id,
            RecordId(1),
            Attributes::new().with("quantity", 480),
            "weighbridge recount",
            farmer,
        )
        .context("amending create record")?;

    store
        .terminate(draft.id, "contaminated", "destroy", inspector)
        .context("terminating chain")?;

    let chain = store.get(draft.id)?;
    let merged = store.merged_attributes(draft.id)?;
    Ok((chain, merged))
}
