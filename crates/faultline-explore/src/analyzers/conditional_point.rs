use std::collections::{BTreeMap, BTreeSet};

use faultline_model::{Behaviour, Fault, FaultUid};
use tracing::{debug, info};

use crate::component::{FeedbackHandler, Reporter};
use crate::context::FeedbackContext;
use crate::result::FaultloadResult;

/// Learns points that only appear under a condition, such as a retry that
/// only happens once the first attempt failed.
///
/// With `optimize_for_retries`, a detected retry replaces the chain of
/// single retries with one persistent fault at the retried call and asks the
/// generators to explore that next.
#[derive(Debug, Default)]
pub struct ConditionalPointDetector {
    optimize_for_retries: bool,
    preconditions: usize,
    retries: Vec<(Fault, FaultUid)>,
}

impl ConditionalPointDetector {
    pub fn new(optimize_for_retries: bool) -> Self {
        Self {
            optimize_for_retries,
            ..Self::default()
        }
    }

    /// The fault at the previous attempt of `point`, if `point` is a retry.
    fn retried_fault(
        &self,
        point: &FaultUid,
        expected: &BTreeSet<Behaviour>,
        context: &FeedbackContext<'_>,
    ) -> Option<Fault> {
        // Only one attempt of the call is made when nothing fails.
        let happy_attempts = context
            .happy_path()
            .keys()
            .filter(|uid| uid.matches_up_to_count(point))
            .count();
        if happy_attempts != 1 {
            return None;
        }

        expected
            .iter()
            .filter(|b| {
                b.uid.matches_up_to_count(point) && b.uid.is_transient() && b.uid.count() == point.count() - 1
            })
            .find_map(Behaviour::fault)
    }

    fn handle_retry(
        &mut self,
        retried: Fault,
        retry: FaultUid,
        injected: &BTreeSet<Fault>,
        context: &mut FeedbackContext<'_>,
    ) {
        let persistent = Fault::new(retried.uid.as_any_count(), retried.mode.clone());
        info!(retried = %retried, persistent = %persistent, "retry detected");

        context.prune_uid_subset([retry.clone()].into());
        context.prune_uid_subset([retried.uid.clone(), persistent.uid.clone()].into());
        context.report_point(persistent.uid.clone());

        let mut starting: BTreeSet<Fault> = injected
            .iter()
            .filter(|f| !f.uid.matches(&persistent.uid))
            .cloned()
            .collect();
        starting.insert(persistent);
        let reachable = context.expected_points(&starting);
        starting.retain(|f| FaultUid::contains(&reachable, &f.uid));

        context.explore_from(starting);
        self.retries.push((retried, retry));
    }
}

impl FeedbackHandler for ConditionalPointDetector {
    fn handle_feedback(&mut self, result: &FaultloadResult, context: &mut FeedbackContext<'_>) {
        let injected = result.trace.injected_faults();
        let expected_points = context.expected_points(injected);
        let expected_behaviours = context.expected_behaviours(injected);

        let mut appeared: BTreeMap<FaultUid, Vec<FaultUid>> = BTreeMap::new();
        for uid in result.trace.fault_uids() {
            if FaultUid::contains(&expected_points, uid) {
                continue;
            }
            let Some(parent) = result.trace.parent(uid) else {
                continue;
            };
            if FaultUid::contains(&expected_points, parent) {
                appeared.entry(parent.clone()).or_default().push(uid.clone());
            }
        }

        for (parent, points) in appeared {
            let causes: Vec<Behaviour> = result
                .trace
                .child_reports(&parent)
                .into_iter()
                .map(|child| child.behaviour())
                .filter(Behaviour::is_fault)
                .collect();
            if causes.is_empty() {
                debug!(parent = %parent, count = points.len(), "points appeared without a failing call");
                continue;
            }

            for point in points {
                if context.report_precondition(causes.clone(), point.clone()) {
                    self.preconditions += 1;
                }
                if !self.optimize_for_retries {
                    continue;
                }
                if let Some(retried) = self.retried_fault(&point, &expected_behaviours, context) {
                    self.handle_retry(retried, point, injected, context);
                }
            }
        }
    }
}

impl Reporter for ConditionalPointDetector {
    fn name(&self) -> &'static str {
        "ConditionalPointDetector"
    }

    fn report(&self) -> BTreeMap<String, String> {
        let mut report = BTreeMap::new();
        report.insert("preconditions".to_string(), self.preconditions.to_string());
        report.insert("retries".to_string(), self.retries.len().to_string());
        if !self.retries.is_empty() {
            let lines: Vec<String> = self
                .retries
                .iter()
                .map(|(retried, retry)| format!("{retried} -> {retry}"))
                .collect();
            report.insert("retried".to_string(), lines.join("\n"));
        }
        report
    }
}
