use faultline_model::{Behaviour, FailureMode, Fault, FaultUid};
use serde::{Deserialize, Serialize};

/// The response a point returned to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceResponse {
    pub status: u16,
    #[serde(default)]
    pub duration_ms: f64,
    #[serde(default)]
    pub body: String,
}

impl TraceResponse {
    pub fn ok() -> Self {
        Self {
            status: 200,
            duration_ms: 0.0,
            body: String::new(),
        }
    }

    /// Anything outside the 2xx range.
    pub fn is_erroneous(&self) -> bool {
        !(200..300).contains(&self.status)
    }
}

/// One span's runtime record, as reported by the instrumentation proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceReport {
    pub trace_id: String,
    pub span_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    pub uid: FaultUid,
    #[serde(default)]
    pub concurrent_to: Vec<FaultUid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub injected_fault: Option<Fault>,
    #[serde(default)]
    pub is_initial: bool,
    /// Absent while the call is still in flight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<TraceResponse>,
}

impl TraceReport {
    pub fn new(trace_id: impl Into<String>, span_id: impl Into<String>, uid: FaultUid) -> Self {
        Self {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
            parent_span_id: None,
            uid,
            concurrent_to: Vec::new(),
            injected_fault: None,
            is_initial: false,
            response: Some(TraceResponse::ok()),
        }
    }

    pub fn is_erroneous(&self) -> bool {
        self.response.as_ref().is_some_and(TraceResponse::is_erroneous)
    }

    /// Injected here, or failed here.
    pub fn has_fault_behaviour(&self) -> bool {
        self.injected_fault.is_some() || self.is_erroneous()
    }

    /// Failed without a fault injected at this point: the failure came from
    /// further down the call tree.
    pub fn has_indirect_fault_behaviour(&self) -> bool {
        self.injected_fault.is_none() && self.is_erroneous()
    }

    /// The fault observed at this point: the injected one, or an HTTP error
    /// carrying the erroneous status.
    pub fn fault(&self) -> Option<Fault> {
        if let Some(fault) = &self.injected_fault {
            return Some(fault.clone());
        }
        let response = self.response.as_ref().filter(|r| r.is_erroneous())?;
        Some(Fault::new(self.uid.clone(), FailureMode::http_error(response.status)))
    }

    pub fn behaviour(&self) -> Behaviour {
        Behaviour::new(self.uid.clone(), self.fault().map(|f| f.mode))
    }
}
