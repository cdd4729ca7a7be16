use std::collections::{BTreeMap, VecDeque};

use faultline_model::combinatorics::power_set;
use faultline_model::{Fault, FaultUid, Faultload};
use faultline_store::{DynamicAnalysisStore, PruneDecision};
use faultline_trace::{TraversalOrder, TraversalStrategy};
use tracing::info;

use crate::component::{FeedbackHandler, Generator, Reporter};
use crate::context::FeedbackContext;
use crate::result::FaultloadResult;

/// Baseline search: every combination of the happy path's points, smallest
/// first, stopping at the first failure.
#[derive(Debug, Default)]
pub struct DepthFirstStrategy {
    queue: VecDeque<Faultload>,
    points: Vec<FaultUid>,
    seeded: bool,
    stopped: bool,
    generated: usize,
}

impl DepthFirstStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    fn seed(&mut self, result: &FaultloadResult, context: &FeedbackContext<'_>) {
        let strategy = TraversalStrategy::new(TraversalOrder::DepthFirstPreOrder);
        self.points = result
            .trace
            .fault_uids_in_order(&strategy)
            .into_iter()
            .filter(|uid| !uid.is_initial())
            .collect();

        for subset in power_set(&self.points).into_iter().skip(1) {
            for faults in Fault::all_combinations(&subset, context.failure_modes()) {
                self.queue.push_back(Faultload::new(faults));
            }
        }
        self.seeded = true;
        info!(points = self.points.len(), queued = self.queue.len(), "seeded depth-first search");
    }
}

impl Generator for DepthFirstStrategy {
    fn generate(
        &mut self,
        store: &DynamicAnalysisStore,
        prune: &mut dyn FnMut(&Faultload) -> PruneDecision,
    ) -> Option<Faultload> {
        if self.stopped {
            return None;
        }
        while let Some(faultload) = self.queue.pop_front() {
            let decision = store.is_redundant(&faultload).max(prune(&faultload));
            if decision.is_keep() {
                self.generated += 1;
                return Some(faultload);
            }
        }
        None
    }
}

impl FeedbackHandler for DepthFirstStrategy {
    fn handle_feedback(&mut self, result: &FaultloadResult, context: &mut FeedbackContext<'_>) {
        if !result.passed {
            info!(faultload = %result.faultload, dropped = self.queue.len(), "failure found, stopping");
            self.queue.clear();
            self.stopped = true;
            return;
        }
        if !self.seeded && result.is_initial() {
            self.seed(result, context);
        }
    }
}

impl Reporter for DepthFirstStrategy {
    fn name(&self) -> &'static str {
        "DepthFirstStrategy"
    }

    fn report(&self) -> BTreeMap<String, String> {
        let mut report = BTreeMap::new();
        report.insert("points".to_string(), self.points.len().to_string());
        report.insert("generated".to_string(), self.generated.to_string());
        report.insert("queue_size_left".to_string(), self.queue.len().to_string());
        report.insert("stopped".to_string(), self.stopped.to_string());
        report
    }
}
