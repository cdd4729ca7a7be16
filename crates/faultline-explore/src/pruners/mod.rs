//! Pruners decide which candidates can be skipped.

pub mod dynamic_reduction;
pub mod fail_stop;
pub mod faultload_size;
pub mod no_impact;
pub mod unreachability;

pub use dynamic_reduction::DynamicReductionPruner;
pub use fail_stop::FailStopPruner;
pub use faultload_size::FaultloadSizePruner;
pub use no_impact::NoImpactPruner;
pub use unreachability::UnreachabilityPruner;
