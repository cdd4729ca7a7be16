//! Orchestration of a fault-injection exploration run.
//!
//! A [`StrategyRunner`] asks its generators for candidate faultloads, hands
//! each to an [`Executor`], and feeds the resulting trace back to every
//! analyzer, pruner and generator until the search space or a limit is
//! exhausted.

pub mod config;
pub mod executor;
pub mod logging;
pub mod runner;

pub use config::{LimitChecker, RunLimits, RunnerConfig, StopReason};
pub use executor::{Execution, Executor, ExecutorError, ModelExecutor};
pub use runner::{RunSummary, RunnerError, StrategyRunner};
