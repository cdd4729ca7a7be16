use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use faultline_explore::generators::TreeNode;
use faultline_explore::pruners::DynamicReductionPruner;
use faultline_explore::Pruner;
use faultline_model::{Behaviour, FailureMode, Fault, FaultInjectionPoint, FaultUid, Faultload};
use faultline_store::{DynamicAnalysisStore, PruneDecision};
use proptest::prelude::*;

fn a() -> FaultUid {
    FaultUid::root(FaultInjectionPoint::new("A", "GET /", 0))
}

fn b() -> FaultUid {
    a().as_child(FaultInjectionPoint::new("B", "GET /b", 0))
}

fn c() -> FaultUid {
    b().as_child(FaultInjectionPoint::new("C", "GET /c", 0))
}

fn unavailable(uid: FaultUid) -> Behaviour {
    Behaviour::new(uid, Some(FailureMode::http_error(503)))
}

/// A calls B calls C, and a 503 travels all the way up.
fn chain_store() -> DynamicAnalysisStore {
    let mut store = DynamicAnalysisStore::new(vec![FailureMode::http_error(503)]);
    store.add_downstream_requests(&a(), [b()]).unwrap();
    store.add_downstream_requests(&b(), [c()]).unwrap();
    store
        .add_upstream_response([unavailable(c())], unavailable(b()))
        .unwrap();
    store
        .add_upstream_response([unavailable(b())], unavailable(a()))
        .unwrap();
    store
}

#[test]
fn test_three_hop_chain_prunes_intermediate_fault() {
    let mut store = chain_store();
    store.add_historic_result(
        BTreeSet::from([Fault::new(c(), FailureMode::http_error(503))]),
        vec![unavailable(a()), unavailable(b()), unavailable(c())],
    );

    let candidate = Faultload::new([Fault::new(b(), FailureMode::http_error(503))]);
    assert_eq!(
        DynamicReductionPruner::new().prune(&candidate, &store),
        PruneDecision::Prune
    );
}

#[test]
fn test_three_hop_chain_prunes_repeated_fault() {
    let mut store = chain_store();
    store.add_historic_result(
        BTreeSet::from([Fault::new(b(), FailureMode::http_error(503))]),
        vec![unavailable(a()), unavailable(b())],
    );

    let candidate = Faultload::new([Fault::new(b(), FailureMode::http_error(503))]);
    assert_eq!(
        DynamicReductionPruner::new().prune(&candidate, &store),
        PruneDecision::Prune
    );
}

#[test]
fn test_three_hop_chain_without_history_keeps() {
    let store = chain_store();
    let candidate = Faultload::new([Fault::new(b(), FailureMode::http_error(503))]);
    assert_eq!(
        DynamicReductionPruner::new().prune(&candidate, &store),
        PruneDecision::Keep
    );
}

#[test]
fn test_deeper_fault_needs_its_own_history() {
    let mut store = chain_store();
    store.add_historic_result(
        BTreeSet::from([Fault::new(b(), FailureMode::http_error(503))]),
        vec![unavailable(a()), unavailable(b())],
    );

    let candidate = Faultload::new([Fault::new(c(), FailureMode::http_error(503))]);
    assert_eq!(
        DynamicReductionPruner::new().prune(&candidate, &store),
        PruneDecision::Keep
    );
}

fn fault_list() -> impl Strategy<Value = Vec<Fault>> {
    prop::collection::vec((0i32..4, prop_oneof![Just(500u16), Just(503u16)]), 0..6).prop_map(|picked| {
        picked
            .into_iter()
            .map(|(count, status)| Fault::new(b().with_count(count), FailureMode::http_error(status)))
            .collect()
    })
}

fn hash_of(node: &TreeNode) -> u64 {
    let mut hasher = DefaultHasher::new();
    node.hash(&mut hasher);
    hasher.finish()
}

proptest! {
    #[test]
    fn prop_tree_node_ignores_order_and_duplicates(
        (faults, shuffled) in fault_list().prop_flat_map(|faults| (Just(faults.clone()), Just(faults).prop_shuffle()))
    ) {
        let mut doubled = shuffled.clone();
        doubled.extend(shuffled.iter().cloned());

        let original = TreeNode::new(faults);
        let permuted = TreeNode::new(doubled);
        prop_assert_eq!(&original, &permuted);
        prop_assert_eq!(hash_of(&original), hash_of(&permuted));
    }
}
