use std::collections::{BTreeMap, BTreeSet};

use crate::component::{FeedbackHandler, Reporter};
use crate::context::FeedbackContext;
use crate::result::FaultloadResult;

/// Status codes each destination was seen to return on its own. Reporting
/// only.
#[derive(Debug, Default)]
pub struct StatusAnalyzer {
    statuses: BTreeMap<String, BTreeSet<u16>>,
}

impl StatusAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statuses(&self, destination: &str) -> Option<&BTreeSet<u16>> {
        self.statuses.get(destination)
    }
}

impl FeedbackHandler for StatusAnalyzer {
    fn handle_feedback(&mut self, result: &FaultloadResult, _context: &mut FeedbackContext<'_>) {
        for report in result.trace.reports() {
            if report.injected_fault.is_some() {
                continue;
            }
            if let Some(response) = &report.response {
                self.statuses
                    .entry(report.uid.destination().to_string())
                    .or_default()
                    .insert(response.status);
            }
        }
    }
}

impl Reporter for StatusAnalyzer {
    fn name(&self) -> &'static str {
        "StatusAnalyzer"
    }

    fn report(&self) -> BTreeMap<String, String> {
        self.statuses
            .iter()
            .map(|(destination, statuses)| {
                let codes: Vec<String> = statuses.iter().map(u16::to_string).collect();
                (destination.clone(), codes.join(", "))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::fixtures::{fault, uid, TraceBuilder};
    use faultline_model::{FailureMode, Faultload};
    use faultline_store::DynamicAnalysisStore;

    #[test]
    fn test_collects_real_statuses() {
        let mut store = DynamicAnalysisStore::new(FailureMode::default_modes());
        let mut analyzer = StatusAnalyzer::new();
        let mut context = FeedbackContext::new(&mut store);

        let injected = fault(uid("B"), 503);
        let trace = TraceBuilder::new()
            .root_status(500)
            .injected(injected.clone())
            .status(uid("C"), 404)
            .build();
        analyzer.handle_feedback(&FaultloadResult::new(Faultload::new([injected]), trace, false), &mut context);

        assert_eq!(analyzer.statuses("A"), Some(&BTreeSet::from([500])));
        assert_eq!(analyzer.statuses("B"), None);
        assert_eq!(analyzer.report()["C"], "404");
    }
}
