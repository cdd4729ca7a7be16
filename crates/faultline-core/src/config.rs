//! Run configuration and limits.
//!
//! Everything is passed in explicitly; nothing here reads the environment.

use std::time::Instant;

use faultline_trace::TraversalOrder;
use serde::{Deserialize, Serialize};

/// Configuration for a single exploration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Order in which trace points are considered for expansion.
    pub traversal: TraversalOrder,
    /// Grow faultloads level by level instead of chasing the newest one.
    pub breadth_first: bool,
    pub limits: RunLimits,
    /// Stop the whole run at the first failing execution.
    pub fail_stop: bool,
    /// Collapse detected retry chains into one persistent fault.
    pub optimize_for_retries: bool,
    /// Prune every candidate containing a fault that had no visible impact.
    pub optimize_for_impactless: bool,
    /// Ask every pruner about every candidate, even after one has pruned it.
    pub check_all_pruners: bool,
    /// Seed for the random traversal order.
    pub seed: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            traversal: TraversalOrder::DepthFirstPreOrder,
            breadth_first: true,
            limits: RunLimits::default(),
            fail_stop: false,
            optimize_for_retries: true,
            optimize_for_impactless: false,
            check_all_pruners: false,
            seed: 42,
        }
    }
}

/// Bounds on a run. `None` means unbounded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunLimits {
    /// Maximum number of executions, the initial one included.
    pub max_test_cases: Option<u64>,
    /// Maximum wall-clock seconds.
    pub max_time_secs: Option<u64>,
    /// Maximum number of faults in one faultload.
    pub max_faultload_size: Option<usize>,
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Every generator ran out of candidates.
    Exhausted,
    /// The execution limit was reached.
    TestCaseLimit,
    /// The wall-clock limit was reached.
    TimeLimit,
    /// An execution failed with fail-stop enabled.
    FailStop,
    /// The zero-fault run already reported faults, so nothing it shows can
    /// be attributed to injected ones.
    InitialRunFaulty,
    /// The caller asked the run to stop.
    Aborted,
}

/// Checks a run's progress against its [`RunLimits`].
#[derive(Debug, Clone)]
pub struct LimitChecker {
    limits: RunLimits,
    start_time: Instant,
}

impl LimitChecker {
    pub fn new(limits: RunLimits) -> Self {
        Self {
            limits,
            start_time: Instant::now(),
        }
    }

    /// The reason to stop after `executed` executions, if any.
    pub fn check(&self, executed: u64) -> Option<StopReason> {
        if let Some(max) = self.limits.max_test_cases {
            if executed >= max {
                return Some(StopReason::TestCaseLimit);
            }
        }
        if let Some(max) = self.limits.max_time_secs {
            if self.start_time.elapsed().as_secs() >= max {
                return Some(StopReason::TimeLimit);
            }
        }
        None
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn limits(&self) -> &RunLimits {
        &self.limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RunnerConfig::default();
        assert_eq!(config.traversal, TraversalOrder::DepthFirstPreOrder);
        assert!(config.optimize_for_retries);
        assert!(!config.fail_stop);
        assert_eq!(config.limits, RunLimits::default());
    }

    #[test]
    fn test_unbounded_never_stops() {
        let checker = LimitChecker::new(RunLimits::default());
        assert_eq!(checker.check(u64::MAX), None);
    }

    #[test]
    fn test_test_case_limit() {
        let checker = LimitChecker::new(RunLimits {
            max_test_cases: Some(3),
            ..Default::default()
        });
        assert_eq!(checker.check(2), None);
        assert_eq!(checker.check(3), Some(StopReason::TestCaseLimit));
    }

    #[test]
    fn test_zero_time_limit_stops_immediately() {
        let checker = LimitChecker::new(RunLimits {
            max_time_secs: Some(0),
            ..Default::default()
        });
        assert_eq!(checker.check(0), Some(StopReason::TimeLimit));
    }

    #[test]
    fn test_config_serializes_traversal_name() {
        let json = serde_json::to_string(&RunnerConfig::default()).unwrap();
        assert!(json.contains("\"dfs-pre\""));

        let parsed: RunnerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, RunnerConfig::default());
    }
}
