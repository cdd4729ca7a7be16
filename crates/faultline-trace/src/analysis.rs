//! Causal tree reconstruction from flat span reports.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use faultline_model::{Behaviour, Fault, FaultUid};
use tracing::{debug, warn};

use crate::report::TraceReport;
use crate::traversal::TraversalStrategy;

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("Trace JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Span '{span_id}' references unknown parent span '{parent_span_id}'")]
    BrokenParentLink {
        span_id: String,
        parent_span_id: String,
    },

    #[error("Span '{span_id}' at {uid} is not a child of its parent span at {parent}")]
    MismatchedParent {
        span_id: String,
        uid: String,
        parent: String,
    },

    #[error("Multiple reports for point {0}")]
    DuplicatePoint(String),
}

/// The reconstructed call tree of one execution.
///
/// Parent/child relations follow the injection point paths: every prefix of
/// a reported path is a parent of the longer path. Parent-span references,
/// when present, must resolve to a report in the same list and agree with
/// that structure.
#[derive(Debug, Clone)]
pub struct TraceAnalysis {
    reports: Vec<TraceReport>,
    by_uid: HashMap<FaultUid, usize>,
    root: Option<usize>,
    fault_uids: Vec<FaultUid>,
    injected_faults: BTreeSet<Fault>,
    reported_faults: BTreeSet<Fault>,
    behaviours: Vec<Behaviour>,
    edges: Vec<(FaultUid, FaultUid)>,
    children: HashMap<FaultUid, Vec<FaultUid>>,
    parents: HashMap<FaultUid, FaultUid>,
    concurrent: BTreeMap<FaultUid, BTreeSet<FaultUid>>,
    has_incomplete: bool,
    has_multiple_initial: bool,
}

impl TraceAnalysis {
    pub fn new(reports: Vec<TraceReport>) -> Result<Self, TraceError> {
        check_span_links(&reports)?;

        let mut analysis = Self {
            reports: Vec::with_capacity(reports.len()),
            by_uid: HashMap::new(),
            root: None,
            fault_uids: Vec::new(),
            injected_faults: BTreeSet::new(),
            reported_faults: BTreeSet::new(),
            behaviours: Vec::new(),
            edges: Vec::new(),
            children: HashMap::new(),
            parents: HashMap::new(),
            concurrent: BTreeMap::new(),
            has_incomplete: false,
            has_multiple_initial: false,
        };

        for report in reports {
            analysis.add_report(report)?;
        }

        for (parent, _) in &analysis.edges {
            if !analysis.by_uid.contains_key(parent) {
                debug!(parent = %parent, "missing report for parent");
                analysis.has_incomplete = true;
            }
        }

        Ok(analysis)
    }

    /// Parse a JSON array of reports.
    pub fn from_json(json: &str) -> Result<Self, TraceError> {
        let reports: Vec<TraceReport> = serde_json::from_str(json)?;
        Self::new(reports)
    }

    fn add_report(&mut self, report: TraceReport) -> Result<(), TraceError> {
        if self.by_uid.contains_key(&report.uid) {
            return Err(TraceError::DuplicatePoint(report.uid.to_string()));
        }

        self.behaviours.push(report.behaviour());
        if let Some(fault) = report.fault() {
            self.reported_faults.insert(fault);
        }
        if let Some(fault) = &report.injected_fault {
            self.injected_faults.insert(fault.clone());
        }

        let mut current = report.uid.clone();
        while let Some(parent) = current.parent() {
            self.add_edge(parent.clone(), current);
            current = parent;
        }

        for other in &report.concurrent_to {
            self.concurrent
                .entry(report.uid.clone())
                .or_default()
                .insert(other.clone());
            self.concurrent
                .entry(other.clone())
                .or_default()
                .insert(report.uid.clone());
        }

        if report.response.is_none() {
            self.has_incomplete = true;
        }

        let index = self.reports.len();
        if report.is_initial {
            if self.root.is_some() {
                self.has_multiple_initial = true;
            }
            self.root = Some(index);
        } else if !self.fault_uids.contains(&report.uid) {
            self.fault_uids.push(report.uid.clone());
        }

        self.by_uid.insert(report.uid.clone(), index);
        self.reports.push(report);
        Ok(())
    }

    fn add_edge(&mut self, parent: FaultUid, child: FaultUid) {
        if self.parents.contains_key(&child) {
            return;
        }
        self.parents.insert(child.clone(), parent.clone());
        self.children
            .entry(parent.clone())
            .or_default()
            .push(child.clone());
        self.edges.push((parent, child));
    }

    pub fn reports(&self) -> &[TraceReport] {
        &self.reports
    }

    pub fn report(&self, uid: &FaultUid) -> Option<&TraceReport> {
        self.by_uid.get(uid).map(|&i| &self.reports[i])
    }

    pub fn root_report(&self) -> Option<&TraceReport> {
        self.root.map(|i| &self.reports[i])
    }

    /// Every reported point except the initial request.
    pub fn fault_uids(&self) -> &[FaultUid] {
        &self.fault_uids
    }

    pub fn injected_faults(&self) -> &BTreeSet<Fault> {
        &self.injected_faults
    }

    /// Injected faults plus the error responses observed elsewhere.
    pub fn reported_faults(&self) -> &BTreeSet<Fault> {
        &self.reported_faults
    }

    pub fn behaviours(&self) -> &[Behaviour] {
        &self.behaviours
    }

    pub fn edges(&self) -> &[(FaultUid, FaultUid)] {
        &self.edges
    }

    pub fn concurrent(&self) -> &BTreeMap<FaultUid, BTreeSet<FaultUid>> {
        &self.concurrent
    }

    pub fn parent(&self, uid: &FaultUid) -> Option<&FaultUid> {
        self.parents.get(uid)
    }

    pub fn parent_report(&self, uid: &FaultUid) -> Option<&TraceReport> {
        self.parent(uid).and_then(|p| self.report(p))
    }

    pub fn children(&self, uid: &FaultUid) -> &[FaultUid] {
        self.children.get(uid).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Reports of the children of `uid`, skipping children without a report.
    pub fn child_reports(&self, uid: &FaultUid) -> Vec<&TraceReport> {
        self.children(uid).iter().filter_map(|c| self.report(c)).collect()
    }

    pub fn descendants(&self, uid: &FaultUid) -> Vec<FaultUid> {
        let mut found = Vec::new();
        let mut seen = HashSet::new();
        let mut queue: VecDeque<&FaultUid> = self.children(uid).iter().collect();
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            found.push(next.clone());
            queue.extend(self.children(next));
        }
        found
    }

    /// Siblings of `uid` under the same parent.
    pub fn neighbours(&self, uid: &FaultUid) -> Vec<FaultUid> {
        match self.parent(uid) {
            Some(parent) => self
                .children(parent)
                .iter()
                .filter(|c| *c != uid)
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn is_descendant_of(&self, ancestor: &FaultUid, uid: &FaultUid) -> bool {
        let mut current = self.parent(uid);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.parent(parent);
        }
        false
    }

    pub fn are_concurrent(&self, a: &FaultUid, b: &FaultUid) -> bool {
        self.concurrent.get(a).is_some_and(|set| set.contains(b))
    }

    /// All points in traversal order from the root, followed by any point
    /// the walk could not reach.
    pub fn fault_uids_in_order(&self, strategy: &TraversalStrategy) -> Vec<FaultUid> {
        let mut ordered = match self.root_report() {
            Some(root) => strategy.traverse(&root.uid, &self.edges),
            None => Vec::new(),
        };

        let mut missing = 0;
        for uid in &self.fault_uids {
            if !ordered.contains(uid) {
                ordered.push(uid.clone());
                missing += 1;
            }
        }
        if missing > 0 {
            warn!(missing, "points missing from trace tree");
        }

        ordered
    }

    /// Reports in traversal order, optionally leaving out the initial one.
    pub fn reports_in_order(&self, strategy: &TraversalStrategy, include_initial: bool) -> Vec<&TraceReport> {
        let mut ordered: Vec<&TraceReport> = match self.root_report() {
            Some(root) => {
                let edges: Vec<(FaultUid, FaultUid)> = self
                    .edges
                    .iter()
                    .filter(|(p, c)| self.by_uid.contains_key(p) && self.by_uid.contains_key(c))
                    .cloned()
                    .collect();
                strategy
                    .traverse(&root.uid, &edges)
                    .iter()
                    .filter_map(|uid| self.report(uid))
                    .collect()
            }
            None => Vec::new(),
        };

        let mut missing = 0;
        for report in &self.reports {
            if !ordered.iter().any(|r| r.uid == report.uid) {
                ordered.push(report);
                missing += 1;
            }
        }
        if missing > 0 {
            warn!(missing, "reports missing from trace tree");
        }

        ordered.retain(|r| include_initial || !r.is_initial);
        ordered
    }

    /// A trace that cannot be trusted for learning: in-flight or missing
    /// reports, no initial report, or more than one.
    pub fn is_invalid(&self) -> bool {
        if self.has_multiple_initial {
            debug!("trace has multiple initial reports");
            return true;
        }
        if self.has_incomplete {
            debug!("trace is incomplete");
            return true;
        }
        if self.root.is_none() {
            warn!("trace has no initial report");
            return true;
        }
        false
    }

    /// The baseline reports, when this trace injected nothing.
    pub fn happy_path(&self) -> Option<&[TraceReport]> {
        if self.injected_faults.is_empty() {
            Some(&self.reports)
        } else {
            None
        }
    }
}

fn check_span_links(reports: &[TraceReport]) -> Result<(), TraceError> {
    let spans: HashMap<&str, &TraceReport> = reports
        .iter()
        .filter(|r| !r.span_id.is_empty())
        .map(|r| (r.span_id.as_str(), r))
        .collect();

    for report in reports {
        let Some(parent_span_id) = report.parent_span_id.as_deref() else {
            continue;
        };
        if parent_span_id.is_empty() {
            continue;
        }

        let parent = spans
            .get(parent_span_id)
            .ok_or_else(|| TraceError::BrokenParentLink {
                span_id: report.span_id.clone(),
                parent_span_id: parent_span_id.to_string(),
            })?;

        if report.uid.parent().as_ref() != Some(&parent.uid) {
            return Err(TraceError::MismatchedParent {
                span_id: report.span_id.clone(),
                uid: report.uid.to_string(),
                parent: parent.uid.to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::TraceResponse;
    use crate::traversal::TraversalOrder;
    use faultline_model::{FailureMode, FaultInjectionPoint};

    fn hop(name: &str) -> FaultInjectionPoint {
        FaultInjectionPoint::new(name, name, 0)
    }

    fn uid(names: &[&str]) -> FaultUid {
        FaultUid::new(names.iter().map(|n| hop(n)).collect()).unwrap()
    }

    fn report(names: &[&str], span: &str, parent_span: Option<&str>) -> TraceReport {
        let mut report = TraceReport::new("t1", span, uid(names));
        report.parent_span_id = parent_span.map(str::to_string);
        report.is_initial = names.len() == 1;
        report
    }

    fn build_tree() -> Vec<TraceReport> {
        vec![
            report(&["A"], "s1", None),
            report(&["A", "B"], "s2", Some("s1")),
            report(&["A", "B", "C"], "s3", Some("s2")),
            report(&["A", "D"], "s4", Some("s1")),
        ]
    }

    #[test]
    fn test_tree_from_uid_paths() {
        let trace = TraceAnalysis::new(build_tree()).unwrap();
        assert!(!trace.is_invalid());
        assert_eq!(trace.root_report().map(|r| &r.uid), Some(&uid(&["A"])));
        assert_eq!(trace.fault_uids().len(), 3);
        assert_eq!(trace.children(&uid(&["A"])), &[uid(&["A", "B"]), uid(&["A", "D"])]);
        assert_eq!(trace.parent(&uid(&["A", "B", "C"])), Some(&uid(&["A", "B"])));
        assert_eq!(trace.neighbours(&uid(&["A", "B"])), vec![uid(&["A", "D"])]);
        assert_eq!(trace.descendants(&uid(&["A"])).len(), 3);
        assert!(trace.is_descendant_of(&uid(&["A"]), &uid(&["A", "B", "C"])));
        assert!(!trace.is_descendant_of(&uid(&["A", "D"]), &uid(&["A", "B", "C"])));
    }

    #[test]
    fn test_points_in_order() {
        let trace = TraceAnalysis::new(build_tree()).unwrap();
        let bfs = trace.fault_uids_in_order(&TraversalStrategy::new(TraversalOrder::BreadthFirst));
        assert_eq!(
            bfs,
            vec![uid(&["A"]), uid(&["A", "B"]), uid(&["A", "D"]), uid(&["A", "B", "C"])]
        );

        let reports = trace.reports_in_order(&TraversalStrategy::new(TraversalOrder::DepthFirstPostOrder), false);
        let order: Vec<&str> = reports.iter().map(|r| r.uid.destination()).collect();
        assert_eq!(order, vec!["C", "B", "D"]);
    }

    #[test]
    fn test_broken_parent_link_is_fatal() {
        let mut reports = build_tree();
        reports[2].parent_span_id = Some("nope".to_string());
        let err = TraceAnalysis::new(reports).unwrap_err();
        assert!(matches!(err, TraceError::BrokenParentLink { .. }));
    }

    #[test]
    fn test_mismatched_parent_is_fatal() {
        let mut reports = build_tree();
        reports[2].parent_span_id = Some("s4".to_string());
        let err = TraceAnalysis::new(reports).unwrap_err();
        assert!(matches!(err, TraceError::MismatchedParent { .. }));
    }

    #[test]
    fn test_duplicate_point_is_fatal() {
        let mut reports = build_tree();
        reports.push(report(&["A", "D"], "s5", Some("s1")));
        assert!(matches!(
            TraceAnalysis::new(reports),
            Err(TraceError::DuplicatePoint(_))
        ));
    }

    #[test]
    fn test_missing_parent_report_is_invalid() {
        let reports = vec![report(&["A"], "s1", None), report(&["A", "B", "C"], "s3", None)];
        let trace = TraceAnalysis::new(reports).unwrap();
        assert!(trace.is_invalid());
        // The unreported parent still shows up in the relation.
        assert_eq!(trace.children(&uid(&["A"])), &[uid(&["A", "B"])]);
        assert!(trace.child_reports(&uid(&["A"])).is_empty());
    }

    #[test]
    fn test_in_flight_and_rootless_traces_are_invalid() {
        let mut reports = build_tree();
        reports[3].response = None;
        assert!(TraceAnalysis::new(reports).unwrap().is_invalid());

        let rootless = build_tree()
            .into_iter()
            .skip(1)
            .map(|mut r| {
                r.parent_span_id = None;
                r
            })
            .collect();
        assert!(TraceAnalysis::new(rootless).unwrap().is_invalid());

        let mut double = build_tree();
        double[1].is_initial = true;
        assert!(TraceAnalysis::new(double).unwrap().is_invalid());
    }

    #[test]
    fn test_faults_and_happy_path() {
        let trace = TraceAnalysis::new(build_tree()).unwrap();
        assert_eq!(trace.happy_path().map(<[TraceReport]>::len), Some(4));
        assert!(trace.reported_faults().is_empty());

        let mut reports = build_tree();
        let injected = Fault::new(uid(&["A", "B", "C"]), FailureMode::http_error(503));
        reports[2].injected_fault = Some(injected.clone());
        reports[1].response = Some(TraceResponse {
            status: 503,
            duration_ms: 1.0,
            body: String::new(),
        });
        let trace = TraceAnalysis::new(reports).unwrap();
        assert!(trace.happy_path().is_none());
        assert_eq!(trace.injected_faults().len(), 1);
        assert_eq!(trace.reported_faults().len(), 2);
        assert!(trace.reported_faults().contains(&injected));
    }

    #[test]
    fn test_concurrency_is_symmetric() {
        let mut reports = build_tree();
        reports[1].concurrent_to = vec![uid(&["A", "D"])];
        let trace = TraceAnalysis::new(reports).unwrap();
        assert!(trace.are_concurrent(&uid(&["A", "B"]), &uid(&["A", "D"])));
        assert!(trace.are_concurrent(&uid(&["A", "D"]), &uid(&["A", "B"])));
        assert!(!trace.are_concurrent(&uid(&["A", "B"]), &uid(&["A", "B", "C"])));
    }
}
