use std::collections::{BTreeMap, BTreeSet, HashSet};

use faultline_model::{Behaviour, FailureMode, Fault, FaultUid, Faultload};
use faultline_trace::TraceReport;
use serde::Serialize;
use tracing::{debug, info};

use crate::decision::{PruneContext, PruneDecision};
use crate::error::StoreError;
use crate::implications::ImplicationsStore;

/// An executed faultload and the behaviours it produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricResult {
    pub faults: BTreeSet<Fault>,
    pub behaviours: Vec<Behaviour>,
}

/// Everything learned during one run: the causal model, the discovered
/// points and the record of what may be skipped.
#[derive(Debug, Clone)]
pub struct DynamicAnalysisStore {
    modes: Vec<FailureMode>,
    points: Vec<FaultUid>,
    implications: ImplicationsStore,
    happy_path: BTreeMap<FaultUid, TraceReport>,
    redundant_faultloads: Vec<BTreeSet<Fault>>,
    redundant_uid_subsets: Vec<BTreeSet<FaultUid>>,
    redundant_fault_subsets: Vec<BTreeSet<Fault>>,
    history: Vec<HistoricResult>,
}

impl DynamicAnalysisStore {
    pub fn new(modes: Vec<FailureMode>) -> Self {
        Self {
            modes,
            points: Vec::new(),
            implications: ImplicationsStore::new(),
            happy_path: BTreeMap::new(),
            redundant_faultloads: Vec::new(),
            redundant_uid_subsets: Vec::new(),
            redundant_fault_subsets: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn modes(&self) -> &[FailureMode] {
        &self.modes
    }

    pub fn points(&self) -> &[FaultUid] {
        &self.points
    }

    pub fn implications(&self) -> &ImplicationsStore {
        &self.implications
    }

    pub fn has_point(&self, uid: &FaultUid) -> bool {
        self.points.contains(uid)
    }

    /// Returns false when the point was already known.
    pub fn add_point(&mut self, uid: FaultUid) -> bool {
        if self.has_point(&uid) {
            return false;
        }
        debug!(point = %uid, "new injection point");
        self.points.push(uid);
        true
    }

    pub fn happy_path(&self) -> &BTreeMap<FaultUid, TraceReport> {
        &self.happy_path
    }

    pub fn happy_path_report(&self, uid: &FaultUid) -> Option<&TraceReport> {
        self.happy_path.get(uid)
    }

    pub fn add_happy_path(&mut self, report: TraceReport) {
        self.happy_path.insert(report.uid.clone(), report);
    }

    pub fn add_historic_result(&mut self, faults: BTreeSet<Fault>, behaviours: Vec<Behaviour>) {
        self.history.push(HistoricResult { faults, behaviours });
    }

    pub fn history(&self) -> &[HistoricResult] {
        &self.history
    }

    /// The calls `cause` makes downstream when nothing goes wrong.
    pub fn add_downstream_requests(
        &mut self,
        cause: &FaultUid,
        children: impl IntoIterator<Item = FaultUid>,
    ) -> Result<bool, StoreError> {
        self.implications.add_downstream_requests(cause, children)
    }

    /// Child behaviours `condition` make the parent respond with `effect`.
    pub fn add_upstream_response(
        &mut self,
        condition: impl IntoIterator<Item = Behaviour>,
        effect: Behaviour,
    ) -> Result<bool, StoreError> {
        self.implications.add_upstream_response(condition, effect)
    }

    /// Record `point` and the condition under which it appears.
    pub fn add_condition_for_point(
        &mut self,
        condition: Vec<Behaviour>,
        point: FaultUid,
    ) -> Result<bool, StoreError> {
        let is_new_point = self.add_point(point.clone());
        if !self.implications.add_inclusion_effect(condition.clone(), point.clone())? {
            return Ok(false);
        }

        let condition = join(&condition);
        if is_new_point {
            info!(%condition, point = %point, "new precondition for novel point");
        } else {
            info!(%condition, point = %point, "new precondition for existing point");
        }
        Ok(true)
    }

    pub fn add_exclusion(&mut self, condition: Vec<Behaviour>, point: FaultUid) -> Result<bool, StoreError> {
        self.implications.add_exclusion_effect(condition, point)
    }

    pub fn has_uid_subset(&self, uids: &BTreeSet<FaultUid>) -> bool {
        self.redundant_uid_subsets.iter().any(|s| s.is_subset(uids))
    }

    /// Mark every faultload injecting at all of `subset` as redundant.
    pub fn prune_uid_subset(&mut self, subset: BTreeSet<FaultUid>) -> bool {
        if self.has_uid_subset(&subset) {
            return false;
        }
        self.redundant_uid_subsets.retain(|s| !subset.is_subset(s));
        debug!(size = subset.len(), "pruned point subset");
        self.redundant_uid_subsets.push(subset);
        true
    }

    pub fn has_fault_subset(&self, faults: &BTreeSet<Fault>) -> bool {
        self.redundant_fault_subsets.iter().any(|s| s.is_subset(faults))
    }

    /// Mark every faultload containing all of `subset` as redundant.
    pub fn prune_fault_subset(&mut self, subset: BTreeSet<Fault>) -> Result<bool, StoreError> {
        let mut uids = HashSet::new();
        for fault in &subset {
            if !uids.insert(&fault.uid) {
                return Err(StoreError::AmbiguousSubset(fault.uid.to_string()));
            }
        }

        if self.has_fault_subset(&subset) {
            return Ok(false);
        }
        self.redundant_fault_subsets.retain(|s| !subset.is_subset(s));
        debug!(size = subset.len(), "pruned fault subset");
        self.redundant_fault_subsets.push(subset);
        Ok(true)
    }

    pub fn has_faultload(&self, faults: &BTreeSet<Fault>) -> bool {
        self.redundant_faultloads.contains(faults)
    }

    /// Mark exactly this faultload as redundant.
    pub fn prune_faultload(&mut self, faults: BTreeSet<Fault>) -> bool {
        if self.has_faultload(&faults) {
            return false;
        }
        self.redundant_faultloads.push(faults);
        true
    }

    pub fn is_redundant(&self, faultload: &Faultload) -> PruneDecision {
        if self.has_fault_subset(faultload.faults()) {
            debug!(%faultload, "redundant by pruned fault subset");
            return PruneDecision::PruneSupersets;
        }
        if self.has_uid_subset(&faultload.uids()) {
            debug!(%faultload, "redundant by pruned point subset");
            return PruneDecision::PruneSupersets;
        }
        if self.has_faultload(faultload.faults()) {
            debug!(%faultload, "redundant faultload");
            return PruneDecision::Prune;
        }
        PruneDecision::Keep
    }

    pub fn expected_behaviours<'a>(&self, faults: impl IntoIterator<Item = &'a Fault>) -> BTreeSet<Behaviour> {
        self.implications.expected_behaviours(faults)
    }

    pub fn expected_points<'a>(&self, faults: impl IntoIterator<Item = &'a Fault>) -> BTreeSet<FaultUid> {
        self.expected_behaviours(faults)
            .into_iter()
            .map(|b| b.uid)
            .collect()
    }

    pub fn report(&self) -> BTreeMap<String, String> {
        let mut report = self.implications.report();
        report.insert("points".to_string(), self.points.len().to_string());
        report.insert("happy_path".to_string(), self.happy_path.len().to_string());
        report.insert(
            "redundant_faultloads".to_string(),
            self.redundant_faultloads.len().to_string(),
        );
        report.insert(
            "redundant_uid_subsets".to_string(),
            self.redundant_uid_subsets.len().to_string(),
        );
        report.insert(
            "redundant_fault_subsets".to_string(),
            self.redundant_fault_subsets.len().to_string(),
        );
        report
    }
}

impl PruneContext for DynamicAnalysisStore {
    fn failure_modes(&self) -> &[FailureMode] {
        &self.modes
    }

    fn points(&self) -> &[FaultUid] {
        &self.points
    }

    fn expected_behaviours(&self, faultload: &Faultload) -> BTreeSet<Behaviour> {
        self.implications.expected_behaviours(faultload)
    }

    fn historic_results(&self) -> &[HistoricResult] {
        &self.history
    }
}

fn join(behaviours: &[Behaviour]) -> String {
    let parts: Vec<String> = behaviours.iter().map(Behaviour::to_string).collect();
    format!("[{}]", parts.join(", "))
}
