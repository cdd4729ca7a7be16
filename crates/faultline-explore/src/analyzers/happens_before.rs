use std::collections::BTreeMap;

use faultline_model::{Behaviour, FaultUid};
use tracing::{debug, info};

use super::breadth_first;
use crate::component::{FeedbackHandler, Reporter};
use crate::context::FeedbackContext;
use crate::result::FaultloadResult;

/// Learns which calls stop happening when an earlier sibling fails.
///
/// A point that was expected under a parent but is missing from the trace
/// is attributed to the parent's calls that failed before it.
#[derive(Debug, Default)]
pub struct HappensBeforeNeighbourDetector {
    exclusions: usize,
    unknown_causes: usize,
}

impl HappensBeforeNeighbourDetector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeedbackHandler for HappensBeforeNeighbourDetector {
    fn handle_feedback(&mut self, result: &FaultloadResult, context: &mut FeedbackContext<'_>) {
        if result.is_initial() {
            return;
        }

        let expected = context.expected_points(result.trace.injected_faults());
        for report in result.trace.reports_in_order(&breadth_first(), true) {
            let observed = result.trace.children(&report.uid);
            let disappeared: Vec<FaultUid> = expected
                .iter()
                .filter(|point| point.parent().is_some_and(|parent| parent.matches(&report.uid)))
                .filter(|point| !FaultUid::contains(observed, point))
                .cloned()
                .collect();
            if disappeared.is_empty() {
                continue;
            }

            let causes: Vec<Behaviour> = result
                .trace
                .child_reports(&report.uid)
                .into_iter()
                .filter(|child| child.has_fault_behaviour())
                .map(|child| child.behaviour())
                .collect();

            for point in disappeared {
                if causes.is_empty() {
                    info!(point = %point, "unknown cause hides point");
                    self.unknown_causes += 1;
                    continue;
                }
                if context.report_exclusion(causes.clone(), point.clone()) {
                    debug!(point = %point, "learned exclusion");
                    self.exclusions += 1;
                }
            }
        }
    }
}

impl Reporter for HappensBeforeNeighbourDetector {
    fn name(&self) -> &'static str {
        "HappensBeforeNeighbourDetector"
    }

    fn report(&self) -> BTreeMap<String, String> {
        let mut report = BTreeMap::new();
        report.insert("exclusions".to_string(), self.exclusions.to_string());
        report.insert("unknown_causes".to_string(), self.unknown_causes.to_string());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::fixtures::{fault, root, uid, TraceBuilder};
    use faultline_model::{FailureMode, Faultload};
    use faultline_store::DynamicAnalysisStore;

    fn learned_store() -> DynamicAnalysisStore {
        let mut store = DynamicAnalysisStore::new(FailureMode::default_modes());
        store
            .add_downstream_requests(&root(), [uid("B"), uid("C")])
            .unwrap();
        store
    }

    #[test]
    fn test_failed_sibling_hides_later_call() {
        let mut store = learned_store();
        let injected = fault(uid("B"), 503);
        let trace = TraceBuilder::new().root_status(503).injected(injected.clone()).build();

        let mut detector = HappensBeforeNeighbourDetector::new();
        let mut context = FeedbackContext::new(&mut store);
        detector.handle_feedback(&FaultloadResult::new(Faultload::new([injected.clone()]), trace, false), &mut context);

        assert_eq!(detector.report()["exclusions"], "1");
        let expected = store.expected_points(&Faultload::new([injected]));
        assert!(!expected.contains(&uid("C")));
    }

    #[test]
    fn test_missing_call_without_failure_is_unknown() {
        let mut store = learned_store();
        let injected = fault(uid("D"), 500);
        let trace = TraceBuilder::new().ok(uid("B")).build();

        let mut detector = HappensBeforeNeighbourDetector::new();
        let mut context = FeedbackContext::new(&mut store);
        detector.handle_feedback(&FaultloadResult::new(Faultload::new([injected]), trace, true), &mut context);

        assert_eq!(detector.report()["exclusions"], "0");
        assert_eq!(detector.report()["unknown_causes"], "1");
    }
}
