use std::collections::{BTreeMap, BTreeSet};

use faultline_model::{Fault, Faultload};
use faultline_store::{PruneContext, PruneDecision};
use tracing::info;

use crate::component::{FeedbackHandler, Pruner, Reporter};
use crate::context::FeedbackContext;
use crate::result::FaultloadResult;

/// Finds faults that the caller absorbed: the parent still answered
/// normally and no retry followed.
///
/// Only with `optimize` are such faults pruned; otherwise they are logged.
#[derive(Debug, Default)]
pub struct NoImpactPruner {
    optimize: bool,
    impactless: Vec<BTreeSet<Fault>>,
    suspected: usize,
}

impl NoImpactPruner {
    pub fn new(optimize: bool) -> Self {
        Self {
            optimize,
            ..Self::default()
        }
    }
}

impl Pruner for NoImpactPruner {
    fn prune(&self, faultload: &Faultload, _context: &dyn PruneContext) -> PruneDecision {
        if self.impactless.iter().any(|faults| faults.is_subset(faultload.faults())) {
            PruneDecision::PruneSupersets
        } else {
            PruneDecision::Keep
        }
    }
}

impl FeedbackHandler for NoImpactPruner {
    fn handle_feedback(&mut self, result: &FaultloadResult, context: &mut FeedbackContext<'_>) {
        if result.is_initial() {
            return;
        }

        for fault in result.trace.injected_faults() {
            let Some(parent) = result.trace.parent_report(&fault.uid) else {
                continue;
            };
            if parent.response.is_none() || parent.is_erroneous() {
                continue;
            }
            // A retried call is handled as a persistent fault instead.
            let retried = fault.uid.as_any_count();
            if context.points().contains(&retried) {
                continue;
            }

            if !self.optimize {
                info!(fault = %fault, "fault appears to have no impact");
                self.suspected += 1;
                continue;
            }

            let faults = BTreeSet::from([fault.clone()]);
            if !self.impactless.contains(&faults) {
                info!(fault = %fault, "fault has no impact, pruning");
                context.prune_fault_subset(faults.clone());
                self.impactless.push(faults);
            }
        }
    }
}

impl Reporter for NoImpactPruner {
    fn name(&self) -> &'static str {
        "NoImpactPruner"
    }

    fn report(&self) -> BTreeMap<String, String> {
        let mut report = BTreeMap::new();
        report.insert("impactless".to_string(), self.impactless.len().to_string());
        report.insert("suspected".to_string(), self.suspected.to_string());
        report
    }
}
