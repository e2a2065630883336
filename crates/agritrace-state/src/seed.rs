//! Illustrative data set for offline demos: a sold tomato chain, an apple
//! chain awaiting inspection, a draft rice chain and a strawberry chain
//! terminated at inspection.

use agritrace_core::chain::ProductChain;
use agritrace_core::error::TraceError;

const DEMO_CHAINS: &str = include_str!("seed.json");

/// Decode the built-in demo chains.
pub fn demo_chains() -> Result<Vec<ProductChain>, TraceError> {
    parse_chains(DEMO_CHAINS)
}

/// Decode chains in the mirror's JSON shape (as written by `snapshot`).
pub fn parse_chains(json: &str) -> Result<Vec<ProductChain>, TraceError> {
    serde_json::from_str(json).map_err(|e| TraceError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agritrace_core::chain::ChainStatus;
    use agritrace_core::record::Action;
    use serde_json::json;

    #[test]
    fn demo_chains_are_well_formed() {
        let chains = demo_chains().expect("seed decodes");
        assert_eq!(chains.len(), 4);
        for chain in &chains {
            chain.check_invariants().expect("seed chain satisfies invariants");
        }
    }

    #[test]
    fn terminated_seed_ends_with_terminate() {
        let chains = demo_chains().unwrap();
        let strawberry = chains.iter().find(|c| c.status == ChainStatus::Terminated).unwrap();
        assert_eq!(strawberry.last_record().unwrap().action(), Action::Terminate);
        assert!(strawberry.terminated_reason.is_some());
    }

    #[test]
    fn merged_view_of_seed() {
        let chains = demo_chains().unwrap();
        let merged = chains[0].merged_attributes();
        assert_eq!(merged.name(), Some("Organic Tomato"));
        assert_eq!(merged.get("quantity"), Some(&json!(500)));
    }

    #[test]
    fn parses_frontend_export() {
        let raw = json!([{
            "id": 9,
            "traceCode": null,
            "productName": "Millet",
            "category": "Grain",
            "status": "draft",
            "currentStage": "producer",
            "distribution": {"type": "pool", "assignedTo": null},
            "createdAt": "2024-12-25T08:00:00Z",
            "records": [{
                "id": 1,
                "stage": "producer",
                "action": "create",
                "data": {"name": "Millet", "category": "Grain"},
                "operator": {"id": 1, "name": "Zhang Farm", "role": "producer"},
                "timestamp": "2024-12-25T08:00:00Z",
                "txHash": null,
                "blockNumber": null
            }]
        }]);
        let chains = parse_chains(&raw.to_string()).unwrap();
        assert_eq!(chains[0].records[0].action(), Action::Create);
        assert!(!chains[0].records[0].is_anchored());
        assert_eq!(serde_json::to_value(&chains).unwrap(), raw);
    }

    #[test]
    fn parse_error_is_protocol_error() {
        let err = parse_chains("[{").unwrap_err();
        assert_eq!(err.kind(), agritrace_core::error::ErrorKind::Protocol);
    }
}
