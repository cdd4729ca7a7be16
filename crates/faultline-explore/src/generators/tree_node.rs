use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use faultline_model::{Fault, Faultload};

/// A node of the exploration tree: the faults added along one expansion
/// path.
///
/// Equality and hashing use only the set of faults, so two paths reaching
/// the same combination in a different order (or repeating a fault) are the
/// same node.
#[derive(Debug, Clone)]
pub struct TreeNode {
    value: Vec<Fault>,
    key: BTreeSet<Fault>,
}

impl TreeNode {
    pub fn new(value: Vec<Fault>) -> Self {
        let key = value.iter().cloned().collect();
        Self { value, key }
    }

    pub fn root() -> Self {
        Self::new(Vec::new())
    }

    /// Faults in the order they were added.
    pub fn value(&self) -> &[Fault] {
        &self.value
    }

    pub fn faults(&self) -> &BTreeSet<Fault> {
        &self.key
    }

    pub fn len(&self) -> usize {
        self.key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }

    pub fn with(&self, fault: Fault) -> TreeNode {
        let mut value = self.value.clone();
        value.push(fault);
        TreeNode::new(value)
    }

    pub fn to_faultload(&self) -> Faultload {
        Faultload::new(self.key.iter().cloned())
    }
}

impl PartialEq for TreeNode {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for TreeNode {}

impl Hash for TreeNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl From<BTreeSet<Fault>> for TreeNode {
    fn from(faults: BTreeSet<Fault>) -> Self {
        Self::new(faults.into_iter().collect())
    }
}

impl fmt::Display for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_faultload())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faultline_model::{FailureMode, FaultInjectionPoint, FaultUid};
    use std::collections::HashSet;

    fn fault(name: &str) -> Fault {
        let uid = FaultUid::root(FaultInjectionPoint::new("A", "A1", 0))
            .as_child(FaultInjectionPoint::new(name, "POST /", 0));
        Fault::new(uid, FailureMode::http_error(500))
    }

    #[test]
    fn test_order_does_not_matter() {
        let a = TreeNode::root().with(fault("B")).with(fault("C"));
        let b = TreeNode::root().with(fault("C")).with(fault("B"));
        assert_eq!(a, b);
        assert_ne!(a.value(), b.value());

        let set: HashSet<TreeNode> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_duplicates_collapse() {
        let node = TreeNode::new(vec![fault("B"), fault("B")]);
        assert_eq!(node.len(), 1);
        assert_eq!(node, TreeNode::new(vec![fault("B")]));
        assert_eq!(node.to_faultload().len(), 1);
    }
}
