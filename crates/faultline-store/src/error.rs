#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Implication must have at least one cause")]
    EmptyCauses,

    #[error("Point {0} is not in normal form")]
    NotNormalForm(String),

    #[error("Point {uid} is not a child of {expected_parent}")]
    ParentMismatch { uid: String, expected_parent: String },

    #[error("Upstream response effect {0} is not a fault")]
    NotAFault(String),

    #[error("Fault subset has more than one fault for point {0}")]
    AmbiguousSubset(String),
}
