//! Hierarchical injection point identifiers.
//!
//! A [`FaultUid`] is the path of hops from the request root down to one
//! call. Two wildcard shapes exist besides concrete paths: [`FaultUid::any`]
//! matches every uid, and [`FaultUid::any_origin`] matches a point regardless
//! of the causal path that led to it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::point::FaultInjectionPoint;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("Fault uid stack must have at least one point")]
    EmptyStack,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "FaultUidRepr", into = "FaultUidRepr")]
pub struct FaultUid {
    stack: Vec<FaultInjectionPoint>,
    any_origin: bool,
}

#[derive(Serialize, Deserialize)]
struct FaultUidRepr {
    stack: Vec<FaultInjectionPoint>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    any_origin: bool,
}

impl TryFrom<FaultUidRepr> for FaultUid {
    type Error = ModelError;

    fn try_from(repr: FaultUidRepr) -> Result<Self, Self::Error> {
        let uid = FaultUid::new(repr.stack)?;
        Ok(if repr.any_origin {
            FaultUid::any_origin(uid.point().clone())
        } else {
            uid
        })
    }
}

impl From<FaultUid> for FaultUidRepr {
    fn from(uid: FaultUid) -> Self {
        Self {
            stack: uid.stack,
            any_origin: uid.any_origin,
        }
    }
}

impl FaultUid {
    pub fn new(stack: Vec<FaultInjectionPoint>) -> Result<Self, ModelError> {
        if stack.is_empty() {
            return Err(ModelError::EmptyStack);
        }
        Ok(Self {
            stack,
            any_origin: false,
        })
    }

    /// The uid of the request entering the system.
    pub fn root(point: FaultInjectionPoint) -> Self {
        Self {
            stack: vec![point],
            any_origin: false,
        }
    }

    /// Matches every uid.
    pub fn any() -> Self {
        Self::any_origin(FaultInjectionPoint::any())
    }

    /// Matches `point` reached through any causal path.
    pub fn any_origin(point: FaultInjectionPoint) -> Self {
        Self {
            stack: vec![point],
            any_origin: true,
        }
    }

    pub fn stack(&self) -> &[FaultInjectionPoint] {
        &self.stack
    }

    /// The last hop.
    pub fn point(&self) -> &FaultInjectionPoint {
        // The stack is never empty, see `new`.
        &self.stack[self.stack.len() - 1]
    }

    pub fn count(&self) -> i32 {
        self.point().count
    }

    pub fn destination(&self) -> &str {
        &self.point().destination
    }

    pub fn is_any(&self) -> bool {
        self.any_origin && *self.point() == FaultInjectionPoint::any()
    }

    pub fn is_any_origin(&self) -> bool {
        self.any_origin
    }

    /// A uid with a single hop is the root request.
    pub fn is_initial(&self) -> bool {
        !self.any_origin && self.stack.len() == 1
    }

    pub fn has_parent(&self) -> bool {
        !self.any_origin && self.stack.len() > 1
    }

    pub fn parent(&self) -> Option<FaultUid> {
        if !self.has_parent() {
            return None;
        }
        Some(Self {
            stack: self.stack[..self.stack.len() - 1].to_vec(),
            any_origin: false,
        })
    }

    pub fn as_child(&self, point: FaultInjectionPoint) -> FaultUid {
        let mut stack = self.stack.clone();
        stack.push(point);
        Self {
            stack,
            any_origin: self.any_origin,
        }
    }

    fn map_point(&self, f: impl FnOnce(&FaultInjectionPoint) -> FaultInjectionPoint) -> FaultUid {
        let mut stack = self.stack.clone();
        let last = stack.len() - 1;
        stack[last] = f(&self.stack[last]);
        Self {
            stack,
            any_origin: self.any_origin,
        }
    }

    pub fn as_any_count(&self) -> FaultUid {
        self.map_point(FaultInjectionPoint::as_any_count)
    }

    pub fn as_any_payload(&self) -> FaultUid {
        self.map_point(FaultInjectionPoint::as_any_payload)
    }

    pub fn with_count(&self, count: i32) -> FaultUid {
        self.map_point(|p| p.clone().with_count(count))
    }

    pub fn is_transient(&self) -> bool {
        self.point().is_transient()
    }

    pub fn is_persistent(&self) -> bool {
        self.point().is_persistent()
    }

    /// Concrete path: no wildcard origin, and no hop that is persistent or
    /// has a wildcard destination, signature or payload.
    pub fn is_normal_form(&self) -> bool {
        if self.any_origin {
            return false;
        }
        self.stack.iter().all(|p| {
            !p.is_persistent() && !p.is_any_destination() && !p.is_any_signature() && !p.is_any_payload()
        })
    }

    pub fn matches(&self, other: &FaultUid) -> bool {
        self.matches_with(other, FaultInjectionPoint::matches)
    }

    pub fn matches_up_to_count(&self, other: &FaultUid) -> bool {
        self.matches_with(other, FaultInjectionPoint::matches_up_to_count)
    }

    fn matches_with(
        &self,
        other: &FaultUid,
        hop_matches: fn(&FaultInjectionPoint, &FaultInjectionPoint) -> bool,
    ) -> bool {
        if self.any_origin || other.any_origin {
            return hop_matches(self.point(), other.point());
        }
        self.stack.len() == other.stack.len()
            && self.stack.iter().zip(&other.stack).all(|(a, b)| hop_matches(a, b))
    }

    /// Whether any uid in `collection` matches `uid`.
    pub fn contains<'a>(collection: impl IntoIterator<Item = &'a FaultUid>, uid: &FaultUid) -> bool {
        collection.into_iter().any(|other| other.matches(uid))
    }
}

impl fmt::Display for FaultUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.any_origin {
            write!(f, "*>")?;
        }
        for hop in &self.stack[..self.stack.len() - 1] {
            write!(f, "{}>", hop.simplified())?;
        }
        write!(f, "{}", self.point())
    }
}
