use std::collections::{BTreeMap, BTreeSet};

use faultline_model::{Fault, Faultload};
use faultline_store::{DynamicAnalysisStore, PruneContext, PruneDecision};

use crate::context::FeedbackContext;
use crate::result::FaultloadResult;

/// Learns from a finished execution.
pub trait FeedbackHandler {
    fn handle_feedback(&mut self, _result: &FaultloadResult, _context: &mut FeedbackContext<'_>) {}
}

/// Exposes a summary of what a component has seen.
pub trait Reporter {
    fn name(&self) -> &'static str;

    fn report(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}

/// A feedback handler whose only output is what it writes to the store and
/// its report.
pub trait Analyzer: FeedbackHandler + Reporter + Send {}

impl<T: FeedbackHandler + Reporter + Send> Analyzer for T {}

/// Decides whether a candidate faultload is worth executing.
///
/// Pruners are evaluated concurrently, so `prune` must only read.
pub trait Pruner: FeedbackHandler + Reporter + Send + Sync {
    fn prune(&self, faultload: &Faultload, context: &dyn PruneContext) -> PruneDecision;
}

/// Produces candidate faultloads.
pub trait Generator: FeedbackHandler + Reporter + Send {
    /// The next candidate that `prune` keeps, or `None` once exhausted.
    fn generate(
        &mut self,
        store: &DynamicAnalysisStore,
        prune: &mut dyn FnMut(&Faultload) -> PruneDecision,
    ) -> Option<Faultload>;

    /// Move `faults` to the front of the queue. Returns false if it was
    /// already considered or this generator does not support it.
    fn explore_from(&mut self, _faults: BTreeSet<Fault>) -> bool {
        false
    }
}
