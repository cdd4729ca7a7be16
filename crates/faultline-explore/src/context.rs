use std::collections::{BTreeMap, BTreeSet};

use faultline_model::{Behaviour, FailureMode, Fault, FaultUid};
use faultline_store::{DynamicAnalysisStore, StoreError};
use faultline_trace::TraceReport;
use tracing::warn;

/// What a feedback handler may read and write while processing one result.
///
/// Store invariant violations are logged and reported as `false`; a single
/// bad observation never ends the run.
pub struct FeedbackContext<'a> {
    store: &'a mut DynamicAnalysisStore,
    explore_requests: Vec<BTreeSet<Fault>>,
}

impl<'a> FeedbackContext<'a> {
    pub fn new(store: &'a mut DynamicAnalysisStore) -> Self {
        Self {
            store,
            explore_requests: Vec::new(),
        }
    }

    pub fn store(&self) -> &DynamicAnalysisStore {
        self.store
    }

    pub fn failure_modes(&self) -> &[FailureMode] {
        self.store.modes()
    }

    pub fn points(&self) -> &[FaultUid] {
        self.store.points()
    }

    pub fn happy_path(&self) -> &BTreeMap<FaultUid, TraceReport> {
        self.store.happy_path()
    }

    pub fn happy_path_report(&self, uid: &FaultUid) -> Option<&TraceReport> {
        self.store.happy_path_report(uid)
    }

    pub fn expected_behaviours<'f>(&self, faults: impl IntoIterator<Item = &'f Fault>) -> BTreeSet<Behaviour> {
        self.store.expected_behaviours(faults)
    }

    pub fn expected_points<'f>(&self, faults: impl IntoIterator<Item = &'f Fault>) -> BTreeSet<FaultUid> {
        self.store.expected_points(faults)
    }

    pub fn report_point(&mut self, uid: FaultUid) -> bool {
        self.store.add_point(uid)
    }

    pub fn report_happy_path(&mut self, report: TraceReport) {
        self.store.add_happy_path(report);
    }

    /// `cause` calls `effects` when nothing goes wrong.
    pub fn report_downstream_requests(&mut self, cause: &FaultUid, effects: impl IntoIterator<Item = FaultUid>) -> bool {
        let result = self.store.add_downstream_requests(cause, effects);
        accepted(result, "downstream requests")
    }

    /// `causes` at the children make the parent respond with `effect`.
    pub fn report_upstream_response(&mut self, causes: Vec<Behaviour>, effect: Behaviour) -> bool {
        let result = self.store.add_upstream_response(causes, effect);
        accepted(result, "upstream response")
    }

    /// `point` appears when `condition` holds.
    pub fn report_precondition(&mut self, condition: Vec<Behaviour>, point: FaultUid) -> bool {
        let result = self.store.add_condition_for_point(condition, point);
        accepted(result, "precondition")
    }

    /// `point` disappears when `condition` holds.
    pub fn report_exclusion(&mut self, condition: Vec<Behaviour>, point: FaultUid) -> bool {
        let result = self.store.add_exclusion(condition, point);
        accepted(result, "exclusion")
    }

    pub fn prune_uid_subset(&mut self, subset: BTreeSet<FaultUid>) -> bool {
        self.store.prune_uid_subset(subset)
    }

    pub fn prune_fault_subset(&mut self, subset: BTreeSet<Fault>) -> bool {
        let result = self.store.prune_fault_subset(subset);
        accepted(result, "fault subset")
    }

    pub fn prune_faultload(&mut self, faults: BTreeSet<Fault>) -> bool {
        self.store.prune_faultload(faults)
    }

    /// Prune every way of extending `faults` with a fault at `point`.
    pub fn prune_exploration(&mut self, faults: &BTreeSet<Fault>, point: &FaultUid) -> bool {
        let extensions: Vec<Fault> = Fault::all_faults(point, self.store.modes());
        let mut changed = false;
        for fault in extensions {
            let mut subset = faults.clone();
            subset.insert(fault);
            changed |= self.prune_fault_subset(subset);
        }
        changed
    }

    /// Ask the generators to try `faults` next.
    pub fn explore_from(&mut self, faults: BTreeSet<Fault>) {
        self.explore_requests.push(faults);
    }

    pub fn into_explore_requests(self) -> Vec<BTreeSet<Fault>> {
        self.explore_requests
    }
}

fn accepted(result: Result<bool, StoreError>, what: &str) -> bool {
    match result {
        Ok(added) => added,
        Err(err) => {
            warn!(error = %err, "rejected {what}");
            false
        }
    }
}
