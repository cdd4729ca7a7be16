use faultline_model::Faultload;
use faultline_store::{PruneContext, PruneDecision};

use crate::component::{FeedbackHandler, Pruner, Reporter};

/// Prunes candidates with more than `max_size` faults.
#[derive(Debug, Clone, Copy)]
pub struct FaultloadSizePruner {
    max_size: usize,
}

impl FaultloadSizePruner {
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }
}

impl Pruner for FaultloadSizePruner {
    fn prune(&self, faultload: &Faultload, _context: &dyn PruneContext) -> PruneDecision {
        if faultload.len() > self.max_size {
            PruneDecision::PruneSupersets
        } else {
            PruneDecision::Keep
        }
    }
}

impl FeedbackHandler for FaultloadSizePruner {}

impl Reporter for FaultloadSizePruner {
    fn name(&self) -> &'static str {
        "FaultloadSizePruner"
    }
}
