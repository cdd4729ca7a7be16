pub mod behaviour;
pub mod combinatorics;
pub mod fault;
pub mod faultload;
pub mod mode;
pub mod point;
pub mod uid;

pub use behaviour::Behaviour;
pub use fault::Fault;
pub use faultload::Faultload;
pub use mode::FailureMode;
pub use point::FaultInjectionPoint;
pub use uid::{FaultUid, ModelError};
