use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fault::Fault;
use crate::mode::FailureMode;
use crate::uid::FaultUid;

/// An observed outcome at a point. `mode == None` means the point behaved
/// normally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Behaviour {
    pub uid: FaultUid,
    pub mode: Option<FailureMode>,
}

impl Behaviour {
    pub fn new(uid: FaultUid, mode: Option<FailureMode>) -> Self {
        Self { uid, mode }
    }

    /// Normal behaviour at `uid`.
    pub fn none(uid: FaultUid) -> Self {
        Self { uid, mode: None }
    }

    pub fn is_fault(&self) -> bool {
        self.mode.is_some()
    }

    pub fn fault(&self) -> Option<Fault> {
        self.mode
            .as_ref()
            .map(|mode| Fault::new(self.uid.clone(), mode.clone()))
    }

    pub fn as_mode(&self, mode: FailureMode) -> Behaviour {
        Behaviour::new(self.uid.clone(), Some(mode))
    }

    pub fn matches(&self, other: &Behaviour) -> bool {
        self.mode == other.mode && self.uid.matches(&other.uid)
    }

    /// Every behaviour in `subset` matches some behaviour in `superset`.
    pub fn is_subset_of<'a, 'b>(
        subset: impl IntoIterator<Item = &'a Behaviour>,
        superset: impl IntoIterator<Item = &'b Behaviour> + Clone,
    ) -> bool {
        subset
            .into_iter()
            .all(|b| Self::contains(superset.clone(), b))
    }

    pub fn contains<'a>(collection: impl IntoIterator<Item = &'a Behaviour>, behaviour: &Behaviour) -> bool {
        collection.into_iter().any(|other| other.matches(behaviour))
    }
}

impl fmt::Display for Behaviour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.mode {
            Some(mode) => write!(f, "[{}] {}", mode, self.uid),
            None => write!(f, "{}", self.uid),
        }
    }
}
