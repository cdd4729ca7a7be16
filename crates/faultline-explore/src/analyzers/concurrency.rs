use std::collections::{BTreeMap, BTreeSet};

use faultline_model::FaultUid;

use crate::component::{FeedbackHandler, Reporter};
use crate::context::FeedbackContext;
use crate::result::FaultloadResult;

/// Keeps the concurrency relation of the latest trace. Reporting only.
#[derive(Debug, Default)]
pub struct ConcurrencyDetector {
    latest: BTreeMap<FaultUid, BTreeSet<FaultUid>>,
    traces_with_concurrency: usize,
}

impl ConcurrencyDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn concurrent(&self) -> &BTreeMap<FaultUid, BTreeSet<FaultUid>> {
        &self.latest
    }
}

impl FeedbackHandler for ConcurrencyDetector {
    fn handle_feedback(&mut self, result: &FaultloadResult, _context: &mut FeedbackContext<'_>) {
        self.latest = result.trace.concurrent().clone();
        if !self.latest.is_empty() {
            self.traces_with_concurrency += 1;
        }
    }
}

impl Reporter for ConcurrencyDetector {
    fn name(&self) -> &'static str {
        "ConcurrencyDetector"
    }

    fn report(&self) -> BTreeMap<String, String> {
        let mut report = BTreeMap::new();
        report.insert(
            "traces_with_concurrency".to_string(),
            self.traces_with_concurrency.to_string(),
        );
        for (uid, others) in &self.latest {
            let others: Vec<String> = others.iter().map(FaultUid::to_string).collect();
            report.insert(uid.to_string(), others.join(", "));
        }
        report
    }
}
