use std::collections::BTreeMap;

use faultline_model::Behaviour;
use tracing::{debug, warn};

use super::breadth_first;
use crate::component::{FeedbackHandler, Reporter};
use crate::context::FeedbackContext;
use crate::result::FaultloadResult;

/// Learns how failing calls turn into an error response of their caller.
#[derive(Debug, Default)]
pub struct ErrorPropagationDetector {
    learned: usize,
    unexplained: usize,
}

impl ErrorPropagationDetector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeedbackHandler for ErrorPropagationDetector {
    fn handle_feedback(&mut self, result: &FaultloadResult, context: &mut FeedbackContext<'_>) {
        for report in result.trace.reports_in_order(&breadth_first(), true) {
            if !report.has_indirect_fault_behaviour() {
                continue;
            }
            let Some(effect) = report.fault() else {
                continue;
            };

            let causes: Vec<Behaviour> = result
                .trace
                .child_reports(&report.uid)
                .into_iter()
                .map(|child| child.behaviour())
                .filter(Behaviour::is_fault)
                .collect();
            if causes.is_empty() {
                warn!(point = %report.uid, "erroneous response without a failing call");
                self.unexplained += 1;
                continue;
            }

            if context.report_upstream_response(causes, effect.as_behaviour()) {
                debug!(effect = %effect, "learned error propagation");
                self.learned += 1;
            }
        }
    }
}

impl Reporter for ErrorPropagationDetector {
    fn name(&self) -> &'static str {
        "ErrorPropagationDetector"
    }

    fn report(&self) -> BTreeMap<String, String> {
        let mut report = BTreeMap::new();
        report.insert("propagations".to_string(), self.learned.to_string());
        report.insert("unexplained".to_string(), self.unexplained.to_string());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::fixtures::{fault, root, uid, TraceBuilder};
    use faultline_model::{FailureMode, Faultload};
    use faultline_store::DynamicAnalysisStore;

    #[test]
    fn test_learns_caller_error() {
        let mut store = DynamicAnalysisStore::new(FailureMode::default_modes());
        store.add_downstream_requests(&root(), [uid("B")]).unwrap();
        let injected = fault(uid("B"), 503);
        let trace = TraceBuilder::new().root_status(502).injected(injected.clone()).build();

        let mut detector = ErrorPropagationDetector::new();
        let mut context = FeedbackContext::new(&mut store);
        detector.handle_feedback(&FaultloadResult::new(Faultload::new([injected.clone()]), trace, false), &mut context);

        assert_eq!(detector.report()["propagations"], "1");
        let expected = store.expected_behaviours(&Faultload::new([injected]));
        assert!(expected.contains(&fault(root(), 502).as_behaviour()));
    }

    #[test]
    fn test_error_without_failing_call_is_unexplained() {
        let mut store = DynamicAnalysisStore::new(FailureMode::default_modes());
        let trace = TraceBuilder::new().status(uid("B"), 500).build();

        let mut detector = ErrorPropagationDetector::new();
        let mut context = FeedbackContext::new(&mut store);
        detector.handle_feedback(&FaultloadResult::new(Faultload::empty(), trace, false), &mut context);

        assert_eq!(detector.report()["unexplained"], "1");
        assert_eq!(detector.report()["propagations"], "0");
    }
}
