use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::behaviour::Behaviour;
use crate::mode::FailureMode;
use crate::uid::FaultUid;

/// One fault to inject: a failure mode at an injection point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fault {
    pub uid: FaultUid,
    pub mode: FailureMode,
}

impl Fault {
    pub fn new(uid: FaultUid, mode: FailureMode) -> Self {
        Self { uid, mode }
    }

    pub fn is_transient(&self) -> bool {
        self.uid.is_transient()
    }

    pub fn is_persistent(&self) -> bool {
        self.uid.is_persistent()
    }

    pub fn as_behaviour(&self) -> Behaviour {
        Behaviour::new(self.uid.clone(), Some(self.mode.clone()))
    }

    /// Matching uid and equal mode.
    pub fn matches(&self, other: &Fault) -> bool {
        self.mode == other.mode && self.uid.matches(&other.uid)
    }

    /// Every element of `subset` matches some element of `superset`.
    pub fn is_subset_of<'a>(
        subset: impl IntoIterator<Item = &'a Fault>,
        superset: &[Fault],
    ) -> bool {
        subset
            .into_iter()
            .all(|f| superset.iter().any(|other| f.matches(other)))
    }

    /// One fault per mode at `point`, in mode order.
    pub fn all_faults(point: &FaultUid, modes: &[FailureMode]) -> Vec<Fault> {
        modes
            .iter()
            .map(|mode| Fault::new(point.clone(), mode.clone()))
            .collect()
    }

    /// Every way of picking one mode for each of `points`.
    pub fn all_combinations(points: &[FaultUid], modes: &[FailureMode]) -> Vec<BTreeSet<Fault>> {
        let mut combinations = vec![BTreeSet::new()];
        for point in points {
            let mut next = Vec::with_capacity(combinations.len() * modes.len());
            for current in &combinations {
                for fault in Self::all_faults(point, modes) {
                    let mut extended = current.clone();
                    extended.insert(fault);
                    next.push(extended);
                }
            }
            combinations = next;
        }
        combinations
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.mode, self.uid)
    }
}
