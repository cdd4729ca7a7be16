use std::fmt;

use serde::{Deserialize, Serialize};

pub const HTTP_ERROR: &str = "HTTP_ERROR";
pub const DELAY: &str = "DELAY";
pub const OMISSION: &str = "OMISSION";

/// A parameterized fault type. Equality is structural over type and args.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FailureMode {
    #[serde(rename = "type")]
    pub kind: String,
    pub args: Vec<String>,
}

impl FailureMode {
    pub fn new(kind: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            kind: kind.into(),
            args,
        }
    }

    /// Respond with an HTTP error status instead of forwarding the call.
    pub fn http_error(status: u16) -> Self {
        Self::new(HTTP_ERROR, vec![status.to_string()])
    }

    pub fn delay(ms: u64) -> Self {
        Self::new(DELAY, vec![ms.to_string()])
    }

    /// Drop the call without a response.
    pub fn omission() -> Self {
        Self::new(OMISSION, vec![])
    }

    /// The status code carried by an `HTTP_ERROR` mode.
    pub fn status(&self) -> Option<u16> {
        if self.kind != HTTP_ERROR {
            return None;
        }
        self.args.first()?.parse().ok()
    }

    /// The common HTTP server-side failures: 500, 502, 503 and 504.
    pub fn default_modes() -> Vec<FailureMode> {
        [500, 502, 503, 504].into_iter().map(Self::http_error).collect()
    }
}

impl fmt::Display for FailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.args.join(","))
    }
}
