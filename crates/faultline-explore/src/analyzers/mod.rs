//! Analyzers learn one kind of fact from every finished execution.

pub mod concurrency;
pub mod conditional_point;
pub mod error_propagation;
pub mod happens_before;
pub mod happy_path;
pub mod parent_child;
pub mod redundancy;
pub mod status;
pub mod timing;

pub use concurrency::ConcurrencyDetector;
pub use conditional_point::ConditionalPointDetector;
pub use error_propagation::ErrorPropagationDetector;
pub use happens_before::HappensBeforeNeighbourDetector;
pub use happy_path::HappyPathDetector;
pub use parent_child::ParentChildDetector;
pub use redundancy::RedundancyAnalyzer;
pub use status::StatusAnalyzer;
pub use timing::{TimingAnalyzer, TimingStats};

use faultline_trace::{TraversalOrder, TraversalStrategy};

/// Analyzers walk traces level by level so parents are seen before children.
fn breadth_first() -> TraversalStrategy {
    TraversalStrategy::new(TraversalOrder::BreadthFirst)
}
