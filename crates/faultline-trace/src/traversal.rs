//! Node orderings over a parent/child edge list.
//!
//! Every walk keeps one visited set for its whole duration, so a node is
//! emitted at most once and cyclic edge lists terminate. Walks are iterative
//! with an explicit stack or queue.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraversalOrder {
    #[serde(rename = "dfs-pre")]
    DepthFirstPreOrder,
    #[serde(rename = "dfs-reverse-pre")]
    DepthFirstReversePreOrder,
    #[serde(rename = "dfs-post")]
    DepthFirstPostOrder,
    #[serde(rename = "dfs-reverse-post")]
    DepthFirstReversePostOrder,
    #[serde(rename = "bfs")]
    BreadthFirst,
    #[serde(rename = "bfs-reverse")]
    BreadthFirstReverse,
    Random,
}

impl TraversalOrder {
    pub const ALL: [TraversalOrder; 7] = [
        Self::DepthFirstPreOrder,
        Self::DepthFirstReversePreOrder,
        Self::DepthFirstPostOrder,
        Self::DepthFirstReversePostOrder,
        Self::BreadthFirst,
        Self::BreadthFirstReverse,
        Self::Random,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::DepthFirstPreOrder => "dfs-pre",
            Self::DepthFirstReversePreOrder => "dfs-reverse-pre",
            Self::DepthFirstPostOrder => "dfs-post",
            Self::DepthFirstReversePostOrder => "dfs-reverse-post",
            Self::BreadthFirst => "bfs",
            Self::BreadthFirstReverse => "bfs-reverse",
            Self::Random => "random",
        }
    }

    fn is_reversed(self) -> bool {
        matches!(
            self,
            Self::DepthFirstReversePreOrder | Self::DepthFirstReversePostOrder | Self::BreadthFirstReverse
        )
    }
}

impl fmt::Display for TraversalOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown traversal order '{0}'")]
pub struct UnknownTraversalOrder(pub String);

impl FromStr for TraversalOrder {
    type Err = UnknownTraversalOrder;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|order| order.name() == s)
            .ok_or_else(|| UnknownTraversalOrder(s.to_string()))
    }
}

/// Walks a tree in a fixed [`TraversalOrder`].
#[derive(Debug, Clone)]
pub struct TraversalStrategy {
    order: TraversalOrder,
    seed: u64,
}

impl TraversalStrategy {
    pub fn new(order: TraversalOrder) -> Self {
        Self { order, seed: 0 }
    }

    /// Seed for [`TraversalOrder::Random`]. Other orders ignore it.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn order(&self) -> TraversalOrder {
        self.order
    }

    pub fn traverse<T: Clone + Eq + Hash>(&self, root: &T, edges: &[(T, T)]) -> Vec<T> {
        match self.order {
            TraversalOrder::BreadthFirst | TraversalOrder::BreadthFirstReverse => {
                self.breadth_first(root, edges)
            }
            TraversalOrder::Random => self.random(root, edges),
            _ => self.depth_first(root, edges),
        }
    }

    fn depth_first<T: Clone + Eq + Hash>(&self, root: &T, edges: &[(T, T)]) -> Vec<T> {
        let pre_order = matches!(
            self.order,
            TraversalOrder::DepthFirstPreOrder | TraversalOrder::DepthFirstReversePreOrder
        );

        let mut visited = HashSet::new();
        visited.insert(root.clone());
        let mut result = Vec::new();

        // (node, its children, index of the next child to descend into)
        let mut stack: Vec<(T, Vec<T>, usize)> = Vec::new();
        stack.push(self.enter(root.clone(), edges, &mut visited, &mut result, pre_order));

        while let Some(frame) = stack.last_mut() {
            if frame.2 < frame.1.len() {
                let child = frame.1[frame.2].clone();
                frame.2 += 1;
                let next = self.enter(child, edges, &mut visited, &mut result, pre_order);
                stack.push(next);
            } else if let Some((node, _, _)) = stack.pop() {
                if !pre_order {
                    result.push(node);
                }
            }
        }

        result
    }

    /// Claims the unvisited children of `node` so deeper frames skip them.
    fn enter<T: Clone + Eq + Hash>(
        &self,
        node: T,
        edges: &[(T, T)],
        visited: &mut HashSet<T>,
        result: &mut Vec<T>,
        pre_order: bool,
    ) -> (T, Vec<T>, usize) {
        let mut children: Vec<T> = Vec::new();
        for (parent, child) in edges {
            if *parent == node && visited.insert(child.clone()) {
                children.push(child.clone());
            }
        }
        if self.order.is_reversed() {
            children.reverse();
        }
        if pre_order {
            result.push(node.clone());
        }
        (node, children, 0)
    }

    fn breadth_first<T: Clone + Eq + Hash>(&self, root: &T, edges: &[(T, T)]) -> Vec<T> {
        let mut visited = HashSet::new();
        let mut result = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(root.clone());

        while let Some(node) = queue.pop_front() {
            if !visited.insert(node.clone()) {
                continue;
            }

            let mut children: Vec<T> = edges
                .iter()
                .filter(|(parent, _)| *parent == node)
                .map(|(_, child)| child.clone())
                .collect();
            if self.order.is_reversed() {
                children.reverse();
            }
            queue.extend(children);
            result.push(node);
        }

        result
    }

    fn random<T: Clone + Eq + Hash>(&self, root: &T, edges: &[(T, T)]) -> Vec<T> {
        let mut seen = HashSet::new();
        let mut nodes = Vec::new();
        for node in std::iter::once(root).chain(edges.iter().flat_map(|(a, b)| [a, b])) {
            if seen.insert(node.clone()) {
                nodes.push(node.clone());
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        nodes.shuffle(&mut rng);
        nodes
    }
}
