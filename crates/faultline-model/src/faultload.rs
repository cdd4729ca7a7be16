use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fault::Fault;
use crate::uid::FaultUid;

/// The set of faults injected in one test execution.
///
/// Unordered and duplicate-free: two faultloads are equal iff they hold the
/// same faults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Faultload {
    faults: BTreeSet<Fault>,
}

impl Faultload {
    pub fn new(faults: impl IntoIterator<Item = Fault>) -> Self {
        Self {
            faults: faults.into_iter().collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> &BTreeSet<Fault> {
        &self.faults
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fault> {
        self.faults.iter()
    }

    pub fn len(&self) -> usize {
        self.faults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faults.is_empty()
    }

    pub fn contains(&self, fault: &Fault) -> bool {
        self.faults.contains(fault)
    }

    pub fn uids(&self) -> BTreeSet<FaultUid> {
        self.faults.iter().map(|f| f.uid.clone()).collect()
    }

    pub fn union(&self, other: &Faultload) -> Faultload {
        Self {
            faults: self.faults.union(&other.faults).cloned().collect(),
        }
    }

    pub fn difference(&self, other: &Faultload) -> Faultload {
        Self {
            faults: self.faults.difference(&other.faults).cloned().collect(),
        }
    }

    pub fn is_subset_of(&self, other: &Faultload) -> bool {
        self.faults.is_subset(&other.faults)
    }

    pub fn with(&self, fault: Fault) -> Faultload {
        let mut faults = self.faults.clone();
        faults.insert(fault);
        Self { faults }
    }

    pub fn into_faults(self) -> BTreeSet<Fault> {
        self.faults
    }
}

impl FromIterator<Fault> for Faultload {
    fn from_iter<I: IntoIterator<Item = Fault>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl<'a> IntoIterator for &'a Faultload {
    type Item = &'a Fault;
    type IntoIter = std::collections::btree_set::Iter<'a, Fault>;

    fn into_iter(self) -> Self::IntoIter {
        self.faults.iter()
    }
}

impl fmt::Display for Faultload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let faults: Vec<String> = self.faults.iter().map(Fault::to_string).collect();
        write!(f, "{{{}}}", faults.join(", "))
    }
}
