//! A single hop in a causal request path.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// String segment that matches any value.
pub const ANY_WILDCARD: &str = "*";

/// Count that matches any occurrence. Faults on such a point are persistent.
pub const ANY_COUNT: i32 = -1;

/// One call site: the destination service, the operation signature, the
/// payload pattern and the how-many-th occurrence of that call it is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FaultInjectionPoint {
    pub destination: String,
    pub signature: String,
    #[serde(default)]
    pub payload: String,
    /// Calls made before this one in the same parent. `None` matches any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_stack: Option<BTreeMap<String, i32>>,
    pub count: i32,
}

impl FaultInjectionPoint {
    pub fn new(destination: impl Into<String>, signature: impl Into<String>, count: i32) -> Self {
        Self {
            destination: destination.into(),
            signature: signature.into(),
            payload: String::new(),
            call_stack: None,
            count,
        }
    }

    /// A point with every segment set to the wildcard.
    pub fn any() -> Self {
        Self {
            destination: ANY_WILDCARD.to_string(),
            signature: ANY_WILDCARD.to_string(),
            payload: ANY_WILDCARD.to_string(),
            call_stack: None,
            count: ANY_COUNT,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn with_call_stack(mut self, call_stack: BTreeMap<String, i32>) -> Self {
        self.call_stack = Some(call_stack);
        self
    }

    pub fn with_count(mut self, count: i32) -> Self {
        self.count = count;
        self
    }

    pub fn as_any_count(&self) -> Self {
        self.clone().with_count(ANY_COUNT)
    }

    pub fn as_any_payload(&self) -> Self {
        self.clone().with_payload(ANY_WILDCARD)
    }

    pub fn as_any_call_stack(&self) -> Self {
        Self {
            call_stack: None,
            ..self.clone()
        }
    }

    pub fn is_any_destination(&self) -> bool {
        self.destination == ANY_WILDCARD
    }

    pub fn is_any_signature(&self) -> bool {
        self.signature == ANY_WILDCARD
    }

    pub fn is_any_payload(&self) -> bool {
        self.payload == ANY_WILDCARD
    }

    /// A fault on this point fires on one specific occurrence.
    pub fn is_transient(&self) -> bool {
        self.count >= 0
    }

    /// A fault on this point fires on every occurrence.
    pub fn is_persistent(&self) -> bool {
        self.count < 0
    }

    /// Segment-wise match, where a wildcard on either side matches anything.
    pub fn matches(&self, other: &FaultInjectionPoint) -> bool {
        self.matches_up_to_count(other) && count_matches(self.count, other.count)
    }

    /// Like [`matches`](Self::matches), but ignores the occurrence count.
    pub fn matches_up_to_count(&self, other: &FaultInjectionPoint) -> bool {
        segment_matches(&self.destination, &other.destination)
            && segment_matches(&self.signature, &other.signature)
            && segment_matches(&self.payload, &other.payload)
            && call_stack_matches(self.call_stack.as_ref(), other.call_stack.as_ref())
    }

    /// Short form used for the ancestors of a point: `dest#n`.
    pub fn simplified(&self) -> String {
        format!("{}{}", self.destination, count_suffix(self.count))
    }
}

fn segment_matches(a: &str, b: &str) -> bool {
    a == ANY_WILDCARD || b == ANY_WILDCARD || a == b
}

fn count_matches(a: i32, b: i32) -> bool {
    a < 0 || b < 0 || a == b
}

fn call_stack_matches(a: Option<&BTreeMap<String, i32>>, b: Option<&BTreeMap<String, i32>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

fn count_suffix(count: i32) -> String {
    if count < 0 {
        "#∞".to_string()
    } else {
        format!("#{count}")
    }
}

impl fmt::Display for FaultInjectionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.destination, self.signature)?;
        if !self.payload.is_empty() && !self.is_any_payload() {
            write!(f, "({})", self.payload)?;
        }
        if let Some(call_stack) = &self.call_stack {
            let entries: Vec<String> = call_stack.iter().map(|(k, v)| format!("{k}:{v}")).collect();
            write!(f, "{{{}}}", entries.join(","))?;
        }
        write!(f, "{}", count_suffix(self.count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_destination_matches_concrete() {
        let concrete = FaultInjectionPoint::new("orders", "GET /orders", 0);
        let wildcard = FaultInjectionPoint::new(ANY_WILDCARD, "GET /orders", 0);
        assert!(concrete.matches(&wildcard));
        assert!(wildcard.matches(&concrete));
    }

    #[test]
    fn test_exact_segments_must_agree() {
        let a = FaultInjectionPoint::new("orders", "GET /orders", 0);
        let b = FaultInjectionPoint::new("payments", "GET /orders", 0);
        assert!(!a.matches(&b));
    }

    #[test]
    fn test_any_count_matches_every_occurrence() {
        let first = FaultInjectionPoint::new("orders", "GET", 0);
        let third = FaultInjectionPoint::new("orders", "GET", 2);
        assert!(!first.matches(&third));
        assert!(first.matches_up_to_count(&third));
        assert!(first.as_any_count().matches(&third));
        assert!(first.as_any_count().is_persistent());
        assert!(third.is_transient());
    }

    #[test]
    fn test_call_stack_absent_matches_any() {
        let mut stack = BTreeMap::new();
        stack.insert("inventory".to_string(), 1);
        let with_stack = FaultInjectionPoint::new("orders", "GET", 0).with_call_stack(stack);
        let without = FaultInjectionPoint::new("orders", "GET", 0);
        let empty = FaultInjectionPoint::new("orders", "GET", 0).with_call_stack(BTreeMap::new());
        assert!(with_stack.matches(&without));
        assert!(!with_stack.matches(&empty));
    }

    #[test]
    fn test_display() {
        let point = FaultInjectionPoint::new("orders", "GET", 1).with_payload("abc");
        assert_eq!(point.to_string(), "orders:GET(abc)#1");
        assert_eq!(point.as_any_count().to_string(), "orders:GET(abc)#∞");
        assert_eq!(point.simplified(), "orders#1");
    }
}
