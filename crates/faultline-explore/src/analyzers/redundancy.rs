use std::collections::{BTreeMap, BTreeSet, HashSet};

use faultline_model::{Fault, FaultUid, Faultload};
use tracing::warn;

use crate::component::{FeedbackHandler, Reporter};
use crate::context::FeedbackContext;
use crate::result::FaultloadResult;

/// Compares what each run meant to inject with what the trace says was
/// injected.
///
/// A mismatch usually means a point's identity is not stable between runs,
/// for example a payload that changes on every request.
#[derive(Debug, Default)]
pub struct RedundancyAnalyzer {
    seen: HashSet<FaultUid>,
    mismatches: Vec<(Faultload, BTreeSet<Fault>)>,
}

impl RedundancyAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mismatches(&self) -> &[(Faultload, BTreeSet<Fault>)] {
        &self.mismatches
    }
}

impl FeedbackHandler for RedundancyAnalyzer {
    fn handle_feedback(&mut self, result: &FaultloadResult, _context: &mut FeedbackContext<'_>) {
        let uids = result.trace.fault_uids();
        if result.is_initial() {
            self.seen.extend(uids.iter().cloned());
            return;
        }

        let appeared: Vec<&FaultUid> = uids.iter().filter(|uid| !self.seen.contains(*uid)).collect();
        let missing = result.not_injected_faults();
        if !missing.is_empty() {
            if missing.len() == result.faultload.len() {
                warn!(faultload = %result.faultload, "no faults were injected");
            } else {
                warn!(faultload = %result.faultload, missing = missing.len(), "not all faults were injected");
            }

            for fault in &missing {
                let pattern = fault.uid.as_any_payload();
                for uid in appeared.iter().filter(|uid| uid.matches(&pattern)) {
                    warn!(
                        intended = %fault.uid,
                        observed = %uid,
                        "payload differs from an earlier run, point may be nondeterministic"
                    );
                }
            }
            self.mismatches.push((result.faultload.clone(), missing));
        }

        self.seen.extend(appeared.into_iter().cloned());
    }
}

impl Reporter for RedundancyAnalyzer {
    fn name(&self) -> &'static str {
        "RedundancyAnalyzer"
    }

    fn report(&self) -> BTreeMap<String, String> {
        let mut report = BTreeMap::new();
        report.insert("mismatches".to_string(), self.mismatches.len().to_string());
        if !self.mismatches.is_empty() {
            let lines: Vec<String> = self
                .mismatches
                .iter()
                .map(|(faultload, missing)| format!("{faultload} missing {}", Faultload::new(missing.iter().cloned())))
                .collect();
            report.insert("not_injected".to_string(), lines.join("\n"));
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::fixtures::{fault, uid, TraceBuilder};
    use faultline_model::FailureMode;
    use faultline_store::DynamicAnalysisStore;

    #[test]
    fn test_flags_faults_missing_from_trace() {
        let mut store = DynamicAnalysisStore::new(FailureMode::default_modes());
        let mut analyzer = RedundancyAnalyzer::new();
        let mut context = FeedbackContext::new(&mut store);

        let happy = TraceBuilder::new().ok(uid("B")).ok(uid("C")).build();
        analyzer.handle_feedback(&FaultloadResult::new(Faultload::empty(), happy, true), &mut context);

        let injected = fault(uid("B"), 500);
        let intended = Faultload::new([injected.clone(), fault(uid("C"), 500)]);
        let trace = TraceBuilder::new().injected(injected).ok(uid("C")).build();
        analyzer.handle_feedback(&FaultloadResult::new(intended, trace, false), &mut context);

        assert_eq!(analyzer.mismatches().len(), 1);
        assert_eq!(analyzer.mismatches()[0].1, BTreeSet::from([fault(uid("C"), 500)]));
        assert_eq!(analyzer.report()["mismatches"], "1");
    }

    #[test]
    fn test_fully_injected_run_is_clean() {
        let mut store = DynamicAnalysisStore::new(FailureMode::default_modes());
        let mut analyzer = RedundancyAnalyzer::new();
        let mut context = FeedbackContext::new(&mut store);

        let injected = fault(uid("B"), 500);
        let trace = TraceBuilder::new().injected(injected.clone()).build();
        analyzer.handle_feedback(&FaultloadResult::new(Faultload::new([injected]), trace, false), &mut context);

        assert!(analyzer.mismatches().is_empty());
    }
}
