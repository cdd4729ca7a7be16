use faultline_model::mode::DELAY;
use faultline_model::{Behaviour, Faultload};
use faultline_store::ImplicationsStore;
use faultline_trace::{TraceAnalysis, TraceError, TraceReport, TraceResponse};
use tracing::debug;

/// What one execution of a faultload produced.
#[derive(Debug, Clone)]
pub struct Execution {
    pub trace: TraceAnalysis,
    /// Whether the test itself passed.
    pub passed: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),
    #[error("Execution failed: {0}")]
    Failed(String),
}

/// Runs the system under test with a faultload injected.
pub trait Executor {
    fn execute(&mut self, faultload: &Faultload) -> Result<Execution, ExecutorError>;
}

/// Executes against a known causal model instead of a real system.
///
/// Every behaviour the model predicts for a faultload becomes one report.
/// A run passes when the root request responds normally.
#[derive(Debug, Clone)]
pub struct ModelExecutor {
    model: ImplicationsStore,
    executions: Vec<Faultload>,
}

impl ModelExecutor {
    pub fn new(model: ImplicationsStore) -> Self {
        Self {
            model,
            executions: Vec::new(),
        }
    }

    /// Every faultload executed so far, in order.
    pub fn executions(&self) -> &[Faultload] {
        &self.executions
    }

    fn report_for(behaviour: &Behaviour, faultload: &Faultload) -> TraceReport {
        let uid = behaviour.uid.clone();
        let mut report = TraceReport::new("model", uid.to_string(), uid.clone());
        report.parent_span_id = uid.parent().map(|parent| parent.to_string());
        report.is_initial = uid.is_initial();
        report.injected_fault = faultload.iter().find(|f| f.uid.matches(&uid)).cloned();

        let status = match &behaviour.mode {
            None => 200,
            Some(mode) if mode.kind == DELAY => 200,
            Some(mode) => mode.status().unwrap_or(500),
        };
        report.response = Some(TraceResponse {
            status,
            duration_ms: 1.0,
            body: String::new(),
        });
        report
    }
}

impl Executor for ModelExecutor {
    fn execute(&mut self, faultload: &Faultload) -> Result<Execution, ExecutorError> {
        let Some(root) = self.model.root_cause().cloned() else {
            return Err(ExecutorError::Failed("model has no root request".to_string()));
        };

        let behaviours = self.model.expected_behaviours(faultload);
        let passed = behaviours.iter().all(|b| b.uid != root || b.mode.is_none());
        let reports: Vec<TraceReport> = behaviours
            .iter()
            .map(|behaviour| Self::report_for(behaviour, faultload))
            .collect();

        debug!(%faultload, reports = reports.len(), passed, "simulated execution");
        self.executions.push(faultload.clone());
        Ok(Execution {
            trace: TraceAnalysis::new(reports)?,
            passed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faultline_model::{FailureMode, Fault, FaultInjectionPoint, FaultUid};

    fn root() -> FaultUid {
        FaultUid::root(FaultInjectionPoint::new("A", "A1", 0))
    }

    fn b() -> FaultUid {
        root().as_child(FaultInjectionPoint::new("B", "B1", 0))
    }

    fn model() -> ImplicationsStore {
        let mut model = ImplicationsStore::new();
        model.add_downstream_requests(&root(), [b()]).unwrap();
        let failed = Behaviour::new(b(), Some(FailureMode::http_error(503)));
        let error = Behaviour::new(root(), Some(FailureMode::http_error(502)));
        model.add_upstream_response([failed], error).unwrap();
        model
    }

    #[test]
    fn test_happy_run_passes() {
        let mut executor = ModelExecutor::new(model());
        let execution = executor.execute(&Faultload::empty()).unwrap();

        assert!(execution.passed);
        assert_eq!(execution.trace.reports().len(), 2);
        assert!(execution.trace.happy_path().is_some());
        assert!(!execution.trace.is_invalid());
    }

    #[test]
    fn test_injected_fault_propagates() {
        let mut executor = ModelExecutor::new(model());
        let fault = Fault::new(b(), FailureMode::http_error(503));
        let execution = executor.execute(&Faultload::new([fault.clone()])).unwrap();

        assert!(!execution.passed);
        assert!(execution.trace.injected_faults().contains(&fault));
        assert_eq!(execution.trace.root_report().and_then(|r| r.response.as_ref()).map(|r| r.status), Some(502));
        assert_eq!(executor.executions().len(), 1);
    }

    #[test]
    fn test_empty_model_is_an_error() {
        let mut executor = ModelExecutor::new(ImplicationsStore::new());
        assert!(matches!(
            executor.execute(&Faultload::empty()),
            Err(ExecutorError::Failed(_))
        ));
    }
}
