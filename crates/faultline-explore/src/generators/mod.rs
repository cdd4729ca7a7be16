//! Candidate generators.

pub mod depth_first;
pub mod dynamic_exploration;
pub mod tree_node;

pub use depth_first::DepthFirstStrategy;
pub use dynamic_exploration::DynamicExplorationGenerator;
pub use tree_node::TreeNode;
