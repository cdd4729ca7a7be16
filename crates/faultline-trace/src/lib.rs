pub mod analysis;
pub mod report;
pub mod traversal;

pub use analysis::{TraceAnalysis, TraceError};
pub use report::{TraceReport, TraceResponse};
pub use traversal::{TraversalOrder, TraversalStrategy};
