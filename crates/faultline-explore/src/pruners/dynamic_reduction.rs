use faultline_model::{Behaviour, Faultload};
use faultline_store::{PruneContext, PruneDecision};
use tracing::debug;

use crate::component::{FeedbackHandler, Pruner, Reporter};

/// Skips a candidate when every call's expected effects were already
/// observed together in some earlier run.
///
/// For each expected behaviour acting as a cause, its effects are the
/// expected behaviours directly beneath it. A cause with no effects needs no
/// justification. Without any history nothing is pruned.
#[derive(Debug, Default)]
pub struct DynamicReductionPruner;

impl DynamicReductionPruner {
    pub fn new() -> Self {
        Self
    }
}

impl Pruner for DynamicReductionPruner {
    fn prune(&self, faultload: &Faultload, context: &dyn PruneContext) -> PruneDecision {
        let history = context.historic_results();
        if history.is_empty() {
            return PruneDecision::Keep;
        }

        let expected = context.expected_behaviours(faultload);
        for cause in &expected {
            let effects: Vec<&Behaviour> = expected
                .iter()
                .filter(|b| b.uid.parent().is_some_and(|parent| parent.matches(&cause.uid)))
                .collect();
            if effects.is_empty() {
                continue;
            }

            let observed = history
                .iter()
                .any(|result| Behaviour::is_subset_of(effects.iter().copied(), &result.behaviours));
            if !observed {
                return PruneDecision::Keep;
            }
        }

        debug!(%faultload, "all effects observed before");
        PruneDecision::Prune
    }
}

impl FeedbackHandler for DynamicReductionPruner {}

impl Reporter for DynamicReductionPruner {
    fn name(&self) -> &'static str {
        "DynamicReductionPruner"
    }
}
