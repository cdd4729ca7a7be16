use std::collections::BTreeMap;

use faultline_model::FaultUid;
use tracing::debug;

use crate::component::{FeedbackHandler, Reporter};
use crate::context::FeedbackContext;
use crate::result::FaultloadResult;

const MAX_BODY_LEN: usize = 80;

/// Records the baseline reports of the zero-fault run.
///
/// A report only counts as happy when it responded normally and none of its
/// own calls failed.
#[derive(Debug, Default)]
pub struct HappyPathDetector {
    recorded: Vec<(FaultUid, u16, String)>,
}

impl HappyPathDetector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeedbackHandler for HappyPathDetector {
    fn handle_feedback(&mut self, result: &FaultloadResult, context: &mut FeedbackContext<'_>) {
        if !result.is_initial() {
            return;
        }

        for report in result.trace.reports() {
            if report.is_erroneous() || context.happy_path_report(&report.uid).is_some() {
                continue;
            }
            let children = result.trace.child_reports(&report.uid);
            if children.iter().any(|child| child.has_fault_behaviour()) {
                continue;
            }

            debug!(point = %report.uid, "happy path");
            let (status, body) = match &report.response {
                Some(response) => (response.status, truncate(&response.body)),
                None => (0, String::new()),
            };
            self.recorded.push((report.uid.clone(), status, body));
            context.report_happy_path(report.clone());
        }
    }
}

impl Reporter for HappyPathDetector {
    fn name(&self) -> &'static str {
        "HappyPathDetector"
    }

    fn report(&self) -> BTreeMap<String, String> {
        let mut report = BTreeMap::new();
        report.insert("count".to_string(), self.recorded.len().to_string());
        let lines: Vec<String> = self
            .recorded
            .iter()
            .map(|(uid, status, body)| format!("{uid} -> {status} {body}").trim_end().to_string())
            .collect();
        report.insert("paths".to_string(), lines.join("\n"));
        report
    }
}

fn truncate(body: &str) -> String {
    if body.chars().count() <= MAX_BODY_LEN {
        return body.to_string();
    }
    let mut short: String = body.chars().take(MAX_BODY_LEN).collect();
    short.push_str("...");
    short
}
