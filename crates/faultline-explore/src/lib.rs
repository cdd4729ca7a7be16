//! Feedback-driven components of an exploration run.
//!
//! Analyzers learn from finished executions, pruners decide which candidates
//! can be skipped, and generators enumerate the candidates. All of them see a
//! run's knowledge through [`FeedbackContext`] (when learning) or
//! [`PruneContext`](faultline_store::PruneContext) (when deciding).

pub mod analyzers;
pub mod component;
pub mod context;
pub mod generators;
pub mod pruners;
pub mod result;

pub use component::{Analyzer, FeedbackHandler, Generator, Pruner, Reporter};
pub use context::FeedbackContext;
pub use result::FaultloadResult;
