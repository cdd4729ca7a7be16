use std::collections::BTreeSet;

use faultline_model::{Fault, Faultload};
use faultline_trace::TraceAnalysis;

/// One finished execution: what was asked for and what happened.
#[derive(Debug, Clone)]
pub struct FaultloadResult {
    pub faultload: Faultload,
    pub trace: TraceAnalysis,
    pub passed: bool,
}

impl FaultloadResult {
    pub fn new(faultload: Faultload, trace: TraceAnalysis, passed: bool) -> Self {
        Self {
            faultload,
            trace,
            passed,
        }
    }

    /// The baseline run injects nothing.
    pub fn is_initial(&self) -> bool {
        self.faultload.is_empty()
    }

    /// Intended faults that the trace does not report as injected.
    pub fn not_injected_faults(&self) -> BTreeSet<Fault> {
        self.faultload
            .faults()
            .difference(self.trace.injected_faults())
            .cloned()
            .collect()
    }
}
