use std::collections::BTreeMap;

use faultline_model::Faultload;
use faultline_store::{PruneContext, PruneDecision};
use tracing::info;

use crate::component::{FeedbackHandler, Pruner, Reporter};
use crate::context::FeedbackContext;
use crate::result::FaultloadResult;

/// Prunes everything once any run has failed.
#[derive(Debug, Default)]
pub struct FailStopPruner {
    failed: Option<Faultload>,
}

impl FailStopPruner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Pruner for FailStopPruner {
    fn prune(&self, _faultload: &Faultload, _context: &dyn PruneContext) -> PruneDecision {
        if self.failed.is_some() {
            PruneDecision::PruneSupersets
        } else {
            PruneDecision::Keep
        }
    }
}

impl FeedbackHandler for FailStopPruner {
    fn handle_feedback(&mut self, result: &FaultloadResult, _context: &mut FeedbackContext<'_>) {
        if !result.passed && self.failed.is_none() {
            info!(faultload = %result.faultload, "first failure, pruning the rest");
            self.failed = Some(result.faultload.clone());
        }
    }
}

impl Reporter for FailStopPruner {
    fn name(&self) -> &'static str {
        "FailStopPruner"
    }

    fn report(&self) -> BTreeMap<String, String> {
        let mut report = BTreeMap::new();
        if let Some(faultload) = &self.failed {
            report.insert("failed".to_string(), faultload.to_string());
        }
        report
    }
}
