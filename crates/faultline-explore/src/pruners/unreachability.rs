use std::collections::{BTreeMap, BTreeSet};

use faultline_model::{Fault, FaultUid, Faultload};
use faultline_store::{PruneContext, PruneDecision};
use tracing::debug;

use crate::component::{FeedbackHandler, Pruner, Reporter};
use crate::context::FeedbackContext;
use crate::result::FaultloadResult;

/// Skips faults at points the candidate itself makes unreachable.
#[derive(Debug, Default)]
pub struct UnreachabilityPruner {
    pruned_extensions: usize,
}

impl UnreachabilityPruner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Pruner for UnreachabilityPruner {
    fn prune(&self, faultload: &Faultload, context: &dyn PruneContext) -> PruneDecision {
        let expected = context.expected_points(faultload);
        if expected.is_empty() {
            return PruneDecision::Keep;
        }

        match faultload.iter().find(|f| !FaultUid::contains(&expected, &f.uid)) {
            Some(fault) => {
                debug!(%faultload, unreachable = %fault.uid, "fault at unreachable point");
                PruneDecision::PruneSupersets
            }
            None => PruneDecision::Keep,
        }
    }
}

impl FeedbackHandler for UnreachabilityPruner {
    fn handle_feedback(&mut self, result: &FaultloadResult, context: &mut FeedbackContext<'_>) {
        let injected: &BTreeSet<Fault> = result.trace.injected_faults();
        let injected_points: Vec<&FaultUid> = injected.iter().map(|f| &f.uid).collect();
        let observed = result.trace.fault_uids();

        let unreachable: Vec<FaultUid> = context
            .points()
            .iter()
            .filter(|point| !point.is_initial())
            .filter(|point| !FaultUid::contains(observed, point))
            .filter(|point| !FaultUid::contains(injected_points.iter().copied(), point))
            .cloned()
            .collect();

        for point in &unreachable {
            if context.prune_exploration(injected, point) {
                self.pruned_extensions += 1;
            }
        }
    }
}

impl Reporter for UnreachabilityPruner {
    fn name(&self) -> &'static str {
        "UnreachabilityPruner"
    }

    fn report(&self) -> BTreeMap<String, String> {
        let mut report = BTreeMap::new();
        report.insert("pruned_extensions".to_string(), self.pruned_extensions.to_string());
        report
    }
}
