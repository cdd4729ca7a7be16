//! Learned causal model of the system under test.
//!
//! Four kinds of implications are kept, all in insertion order:
//! - downstream requests: a point and the calls it makes
//! - inclusions: a set of sibling behaviours that makes another sibling appear
//! - exclusions: a set of sibling behaviours that makes another sibling vanish
//! - upstream responses: a set of child behaviours that determines how the
//!   parent responds
//!
//! [`ImplicationsStore::expected_behaviours`] replays the model from the root
//! request to predict every behaviour of a faultload.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use faultline_model::{Behaviour, Fault, FaultUid};
use tracing::debug;

use crate::error::StoreError;

#[derive(Debug, Clone)]
struct DownstreamRequests {
    cause: FaultUid,
    effects: Vec<FaultUid>,
}

#[derive(Debug, Clone)]
struct Substitution {
    causes: Vec<Behaviour>,
    effect: FaultUid,
}

#[derive(Debug, Clone)]
struct UpstreamResponse {
    causes: Vec<Behaviour>,
    effect: Behaviour,
}

#[derive(Debug, Clone, Copy)]
enum SubstitutionKind {
    Inclusion,
    Exclusion,
}

#[derive(Debug, Clone, Default)]
pub struct ImplicationsStore {
    downstream: Vec<DownstreamRequests>,
    inclusions: Vec<Substitution>,
    exclusions: Vec<Substitution>,
    upstream: Vec<UpstreamResponse>,
}

impl ImplicationsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_downstream_requests(&self, cause: &FaultUid) -> bool {
        self.downstream.iter().any(|d| d.cause.matches(cause))
    }

    /// Record the calls `cause` makes. The first set recorded for a point
    /// wins; later ones return `Ok(false)`.
    pub fn add_downstream_requests(
        &mut self,
        cause: &FaultUid,
        effects: impl IntoIterator<Item = FaultUid>,
    ) -> Result<bool, StoreError> {
        require_normal_form(cause)?;

        let mut unique: Vec<FaultUid> = Vec::new();
        for effect in effects {
            require_normal_form(&effect)?;
            require_parent(&effect, cause)?;
            if !unique.contains(&effect) {
                unique.push(effect);
            }
        }

        if self.has_downstream_requests(cause) {
            return Ok(false);
        }

        debug!(cause = %cause, effects = unique.len(), "new downstream requests");
        self.downstream.push(DownstreamRequests {
            cause: cause.clone(),
            effects: unique,
        });
        Ok(true)
    }

    pub fn has_upstream_response(&self, causes: &[Behaviour], effect: &Behaviour) -> bool {
        self.upstream
            .iter()
            .any(|u| u.effect.matches(effect) && Behaviour::is_subset_of(&u.causes, causes))
    }

    /// Record that the child behaviours `causes` make the parent respond
    /// with `effect`.
    pub fn add_upstream_response(
        &mut self,
        causes: impl IntoIterator<Item = Behaviour>,
        effect: Behaviour,
    ) -> Result<bool, StoreError> {
        if !effect.is_fault() {
            return Err(StoreError::NotAFault(effect.to_string()));
        }
        require_normal_form(&effect.uid)?;

        let causes = dedup(causes);
        for cause in &causes {
            require_normal_form(&cause.uid)?;
            require_parent(&cause.uid, &effect.uid)?;
        }

        if self.has_upstream_response(&causes, &effect) {
            return Ok(false);
        }

        debug!(effect = %effect, causes = causes.len(), "new upstream response");
        self.upstream.push(UpstreamResponse { causes, effect });
        Ok(true)
    }

    /// Record that the sibling behaviours `causes` make `effect` appear.
    pub fn add_inclusion_effect(
        &mut self,
        causes: impl IntoIterator<Item = Behaviour>,
        effect: FaultUid,
    ) -> Result<bool, StoreError> {
        self.add_effect(causes, effect, SubstitutionKind::Inclusion)
    }

    /// Record that the sibling behaviours `causes` make `effect` disappear.
    pub fn add_exclusion_effect(
        &mut self,
        causes: impl IntoIterator<Item = Behaviour>,
        effect: FaultUid,
    ) -> Result<bool, StoreError> {
        self.add_effect(causes, effect, SubstitutionKind::Exclusion)
    }

    fn add_effect(
        &mut self,
        causes: impl IntoIterator<Item = Behaviour>,
        effect: FaultUid,
        kind: SubstitutionKind,
    ) -> Result<bool, StoreError> {
        let causes = dedup(causes);
        if causes.is_empty() {
            return Err(StoreError::EmptyCauses);
        }
        require_normal_form(&effect)?;

        let common_parent = effect.parent();
        for cause in &causes {
            require_normal_form(&cause.uid)?;
            let shares_parent = match (cause.uid.parent(), &common_parent) {
                (Some(parent), Some(common)) => parent.matches(common),
                (None, None) => true,
                _ => false,
            };
            if !shares_parent {
                return Err(StoreError::ParentMismatch {
                    uid: cause.uid.to_string(),
                    expected_parent: common_parent
                        .as_ref()
                        .map(FaultUid::to_string)
                        .unwrap_or_default(),
                });
            }
        }

        let target = match kind {
            SubstitutionKind::Inclusion => &mut self.inclusions,
            SubstitutionKind::Exclusion => &mut self.exclusions,
        };

        // A smaller condition for the same effect already covers this one.
        if target
            .iter()
            .any(|s| s.effect.matches(&effect) && Behaviour::is_subset_of(&s.causes, &causes))
        {
            return Ok(false);
        }

        target.retain(|s| !(s.effect.matches(&effect) && Behaviour::is_subset_of(&causes, &s.causes)));
        debug!(?kind, effect = %effect, causes = causes.len(), "new substitution");
        target.push(Substitution { causes, effect });
        Ok(true)
    }

    /// The root request, once its downstream calls are known.
    pub fn root_cause(&self) -> Option<&FaultUid> {
        self.downstream
            .iter()
            .map(|d| &d.cause)
            .find(|cause| cause.is_initial())
    }

    pub fn is_inclusion_effect(&self, uid: &FaultUid) -> bool {
        self.inclusions.iter().any(|s| s.effect.matches(uid))
    }

    pub fn is_inclusion_cause(&self, behaviour: &Behaviour) -> bool {
        self.inclusions
            .iter()
            .any(|s| Behaviour::contains(&s.causes, behaviour))
    }

    /// Every behaviour the model predicts when injecting `perturbations`.
    /// Empty until the root request's calls are known.
    pub fn expected_behaviours<'a>(
        &self,
        perturbations: impl IntoIterator<Item = &'a Fault>,
    ) -> BTreeSet<Behaviour> {
        let Some(root) = self.root_cause() else {
            return BTreeSet::new();
        };
        self.behaviours_from(root, perturbations)
    }

    /// Like [`expected_behaviours`](Self::expected_behaviours), starting at
    /// `cause` instead of the root.
    pub fn behaviours_from<'a>(
        &self,
        cause: &FaultUid,
        perturbations: impl IntoIterator<Item = &'a Fault>,
    ) -> BTreeSet<Behaviour> {
        let perturbations: Vec<&Fault> = perturbations.into_iter().collect();
        let (behaviour, mut transitive) = self.unfold(cause, &perturbations);
        transitive.push(behaviour);
        transitive.into_iter().collect()
    }

    /// The behaviour of `cause` and everything below it.
    fn unfold(&self, cause: &FaultUid, perturbations: &[&Fault]) -> (Behaviour, Vec<Behaviour>) {
        // An injected fault hides whatever the call would have done.
        if let Some(fault) = perturbations.iter().find(|f| f.uid.matches(cause)) {
            return (Behaviour::new(cause.clone(), Some(fault.mode.clone())), Vec::new());
        }

        let Some(requests) = self.downstream.iter().find(|d| d.cause.matches(cause)) else {
            return (Behaviour::none(cause.clone()), Vec::new());
        };

        let mut upstreams: Vec<Behaviour> = Vec::new();
        let mut effects: HashMap<FaultUid, Vec<Behaviour>> = HashMap::new();
        for effect in &requests.effects {
            let (behaviour, below) = self.unfold(effect, perturbations);
            effects.insert(behaviour.uid.clone(), below);
            push_unique(&mut upstreams, behaviour);
        }

        self.apply_substitutions(cause, &mut upstreams, &mut effects, perturbations);

        let mut transitive: Vec<Behaviour> = Vec::new();
        for upstream in &upstreams {
            push_unique(&mut transitive, upstream.clone());
            for below in effects.get(&upstream.uid).into_iter().flatten() {
                push_unique(&mut transitive, below.clone());
            }
        }

        let response = self
            .upstream
            .iter()
            .find(|u| u.effect.uid.matches(cause) && Behaviour::is_subset_of(&u.causes, &upstreams));
        match response {
            Some(response) => (response.effect.clone(), transitive),
            None => (Behaviour::none(cause.clone()), transitive),
        }
    }

    /// Apply exclusions and inclusions among the children of `cause` until
    /// nothing changes. Each substitution fires at most once.
    fn apply_substitutions(
        &self,
        cause: &FaultUid,
        upstreams: &mut Vec<Behaviour>,
        effects: &mut HashMap<FaultUid, Vec<Behaviour>>,
        perturbations: &[&Fault],
    ) {
        let related = |s: &&Substitution| s.effect.parent().is_some_and(|p| p.matches(cause));
        let mut exclusions: Vec<&Substitution> = self.exclusions.iter().filter(related).collect();
        let mut inclusions: Vec<&Substitution> = self.inclusions.iter().filter(related).collect();

        loop {
            let mut changed = false;

            let mut i = 0;
            while i < exclusions.len() {
                let exclusion = exclusions[i];
                if Behaviour::is_subset_of(&exclusion.causes, upstreams.iter()) {
                    upstreams.retain(|u| !u.uid.matches(&exclusion.effect));
                    effects.remove(&exclusion.effect);
                    exclusions.remove(i);
                    changed = true;
                } else {
                    i += 1;
                }
            }

            let mut i = 0;
            while i < inclusions.len() {
                let inclusion = inclusions[i];
                if Behaviour::is_subset_of(&inclusion.causes, upstreams.iter()) {
                    let (behaviour, below) = self.unfold(&inclusion.effect, perturbations);
                    effects.insert(behaviour.uid.clone(), below);
                    push_unique(upstreams, behaviour);
                    inclusions.remove(i);
                    changed = true;
                } else {
                    i += 1;
                }
            }

            if !changed {
                break;
            }
        }
    }

    pub fn report(&self) -> BTreeMap<String, String> {
        let mut report = BTreeMap::new();
        report.insert("downstream_count".to_string(), self.downstream.len().to_string());
        report.insert("inclusion_count".to_string(), self.inclusions.len().to_string());
        report.insert("exclusion_count".to_string(), self.exclusions.len().to_string());
        report.insert("upstream_count".to_string(), self.upstream.len().to_string());

        if !self.downstream.is_empty() {
            let lines: Vec<String> = self
                .downstream
                .iter()
                .map(|d| format!("{} -> {}", d.cause, join(&d.effects)))
                .collect();
            report.insert("downstream".to_string(), lines.join("\n"));
        }
        for (key, substitutions) in [("inclusions", &self.inclusions), ("exclusions", &self.exclusions)] {
            if substitutions.is_empty() {
                continue;
            }
            let lines: Vec<String> = substitutions
                .iter()
                .map(|s| format!("{} => {}", join(&s.causes), s.effect))
                .collect();
            report.insert(key.to_string(), lines.join("\n"));
        }
        if !self.upstream.is_empty() {
            let lines: Vec<String> = self
                .upstream
                .iter()
                .map(|u| format!("{} => {}", join(&u.causes), u.effect))
                .collect();
            report.insert("upstream".to_string(), lines.join("\n"));
        }
        report
    }
}

fn require_normal_form(uid: &FaultUid) -> Result<(), StoreError> {
    if uid.is_normal_form() {
        Ok(())
    } else {
        Err(StoreError::NotNormalForm(uid.to_string()))
    }
}

fn require_parent(child: &FaultUid, parent: &FaultUid) -> Result<(), StoreError> {
    match child.parent() {
        Some(actual) if actual.matches(parent) => Ok(()),
        _ => Err(StoreError::ParentMismatch {
            uid: child.to_string(),
            expected_parent: parent.to_string(),
        }),
    }
}

fn dedup(items: impl IntoIterator<Item = Behaviour>) -> Vec<Behaviour> {
    let mut unique = Vec::new();
    for item in items {
        push_unique(&mut unique, item);
    }
    unique
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    let parts: Vec<String> = items.iter().map(T::to_string).collect();
    format!("[{}]", parts.join(", "))
}
