use std::collections::{BTreeMap, HashSet};

use faultline_model::FaultUid;
use tracing::debug;

use super::breadth_first;
use crate::component::{FeedbackHandler, Reporter};
use crate::context::FeedbackContext;
use crate::result::FaultloadResult;

/// Learns which calls each point makes downstream.
#[derive(Debug, Default)]
pub struct ParentChildDetector {
    known: HashSet<FaultUid>,
}

impl ParentChildDetector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeedbackHandler for ParentChildDetector {
    fn handle_feedback(&mut self, result: &FaultloadResult, context: &mut FeedbackContext<'_>) {
        for report in result.trace.reports_in_order(&breadth_first(), true) {
            let cause = &report.uid;
            if self.known.contains(cause) {
                continue;
            }
            let children = result.trace.children(cause);
            if children.is_empty() {
                continue;
            }

            debug!(point = %cause, children = children.len(), "learned downstream calls");
            self.known.insert(cause.clone());
            context.report_downstream_requests(cause, children.iter().cloned());
        }
    }
}

impl Reporter for ParentChildDetector {
    fn name(&self) -> &'static str {
        "ParentChildDetector"
    }

    fn report(&self) -> BTreeMap<String, String> {
        let mut report = BTreeMap::new();
        report.insert("parents".to_string(), self.known.len().to_string());
        report
    }
}
