//! Knowledge accumulated over one exploration run.
//!
//! [`ImplicationsStore`] holds the learned causal model and can predict the
//! behaviours of an untried faultload. [`DynamicAnalysisStore`] wraps it with
//! the known points, the happy path, the pruned subsets and the history of
//! executed faultloads.

pub mod decision;
pub mod dynamic;
pub mod error;
pub mod implications;

pub use decision::{PruneContext, PruneDecision};
pub use dynamic::{DynamicAnalysisStore, HistoricResult};
pub use error::StoreError;
pub use implications::ImplicationsStore;
