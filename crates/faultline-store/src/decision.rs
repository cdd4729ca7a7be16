use std::collections::BTreeSet;

use faultline_model::{Behaviour, FailureMode, FaultUid, Faultload};
use serde::{Deserialize, Serialize};

use crate::dynamic::HistoricResult;

/// Outcome of checking a candidate faultload.
///
/// Ordered by strength, so combining decisions is `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PruneDecision {
    Keep,
    /// Skip this candidate only.
    Prune,
    /// Skip this candidate and everything reachable by adding faults to it.
    PruneSupersets,
}

impl PruneDecision {
    pub fn max(self, other: PruneDecision) -> PruneDecision {
        std::cmp::max(self, other)
    }

    pub fn is_keep(self) -> bool {
        self == PruneDecision::Keep
    }

    /// The strongest of `decisions`, `Keep` when empty.
    pub fn max_of(decisions: impl IntoIterator<Item = PruneDecision>) -> PruneDecision {
        decisions.into_iter().fold(PruneDecision::Keep, PruneDecision::max)
    }
}

/// Read-only view of the run's knowledge, as pruners see it.
pub trait PruneContext: Sync {
    fn failure_modes(&self) -> &[FailureMode];

    /// Every injection point discovered so far.
    fn points(&self) -> &[FaultUid];

    fn expected_behaviours(&self, faultload: &Faultload) -> BTreeSet<Behaviour>;

    fn expected_points(&self, faultload: &Faultload) -> BTreeSet<FaultUid> {
        self.expected_behaviours(faultload)
            .into_iter()
            .map(|b| b.uid)
            .collect()
    }

    fn historic_results(&self) -> &[HistoricResult];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(PruneDecision::Keep < PruneDecision::Prune);
        assert!(PruneDecision::Prune < PruneDecision::PruneSupersets);
        assert_eq!(
            PruneDecision::Prune.max(PruneDecision::Keep),
            PruneDecision::Prune
        );
        assert_eq!(
            PruneDecision::max_of([PruneDecision::Prune, PruneDecision::PruneSupersets]),
            PruneDecision::PruneSupersets
        );
        assert_eq!(PruneDecision::max_of([]), PruneDecision::Keep);
    }
}
