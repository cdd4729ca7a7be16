use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use faultline_model::{FailureMode, Fault, FaultUid, Faultload};
use faultline_store::{DynamicAnalysisStore, PruneDecision};
use faultline_trace::TraversalStrategy;
use tracing::{debug, info};

use super::tree_node::TreeNode;
use crate::component::{FeedbackHandler, Generator, Reporter};
use crate::context::FeedbackContext;
use crate::result::FaultloadResult;

/// Grows faultloads one fault at a time from what each execution revealed.
///
/// Every executed faultload is extended with one fault at each known point
/// that its trace reached but that it did not already inject at. Nodes are
/// deduplicated by their fault set, so each combination is considered once.
#[derive(Debug)]
pub struct DynamicExplorationGenerator {
    strategy: TraversalStrategy,
    /// Expand siblings before children. Otherwise new nodes jump the queue.
    breadth_first: bool,
    root: TreeNode,
    to_visit: VecDeque<TreeNode>,
    considered: HashSet<TreeNode>,
    pruned: HashSet<TreeNode>,
    /// Parent to children, in the order they were added.
    expansion_tree: HashMap<TreeNode, Vec<TreeNode>>,
    /// Order in which generated nodes were handed out.
    node_index: HashMap<TreeNode, usize>,
    generated: usize,
    redundant: usize,
    queue_sizes: Vec<usize>,
}

impl DynamicExplorationGenerator {
    pub fn new(strategy: TraversalStrategy, breadth_first: bool) -> Self {
        let root = TreeNode::root();
        let mut node_index = HashMap::new();
        node_index.insert(root.clone(), 0);
        let mut considered = HashSet::new();
        considered.insert(root.clone());

        Self {
            strategy,
            breadth_first,
            root,
            to_visit: VecDeque::new(),
            considered,
            pruned: HashSet::new(),
            expansion_tree: HashMap::new(),
            node_index,
            generated: 0,
            redundant: 0,
            queue_sizes: Vec::new(),
        }
    }

    pub fn queue_len(&self) -> usize {
        self.to_visit.len()
    }

    pub fn considered_count(&self) -> usize {
        self.considered.len()
    }

    /// Returns false if the node was seen before.
    fn add_node(&mut self, node: TreeNode, add_last: bool) -> bool {
        if self.considered.contains(&node) {
            return false;
        }
        self.considered.insert(node.clone());
        if add_last {
            self.to_visit.push_back(node);
        } else {
            self.to_visit.push_front(node);
        }
        true
    }

    fn add_to_tree(&mut self, parent: &TreeNode, child: TreeNode) {
        self.expansion_tree.entry(parent.clone()).or_default().push(child);
    }

    fn expand(&mut self, node: &TreeNode, mut points: Vec<FaultUid>, modes: &[FailureMode]) {
        if points.is_empty() {
            return;
        }
        // Pushing to the front reverses insertion order, so undo it up front.
        if !self.breadth_first {
            points.reverse();
        }

        let add_last = self.breadth_first;
        for point in &points {
            for fault in Fault::all_faults(point, modes) {
                let child = node.with(fault);
                if self.add_node(child.clone(), add_last) {
                    self.add_to_tree(node, child);
                }
            }
        }
    }

    /// The expansion tree as indented lines, one node per line.
    pub fn render_tree(&self) -> String {
        let mut lines = Vec::new();
        let mut stack = vec![(&self.root, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            let index = match self.node_index.get(node) {
                Some(i) => i.to_string(),
                None => "-".to_string(),
            };
            let marker = if self.pruned.contains(node) { " (pruned)" } else { "" };
            lines.push(format!("{}[{index}] {node}{marker}", "  ".repeat(depth)));

            if let Some(children) = self.expansion_tree.get(node) {
                for child in children.iter().rev() {
                    stack.push((child, depth + 1));
                }
            }
        }
        lines.join("\n")
    }
}

impl Generator for DynamicExplorationGenerator {
    fn generate(
        &mut self,
        store: &DynamicAnalysisStore,
        prune: &mut dyn FnMut(&Faultload) -> PruneDecision,
    ) -> Option<Faultload> {
        while let Some(node) = self.to_visit.pop_front() {
            let faultload = node.to_faultload();

            let mut decision = store.is_redundant(&faultload);
            if decision.is_keep() {
                decision = prune(&faultload);
            } else {
                self.redundant += 1;
            }

            if !decision.is_keep() {
                debug!(%faultload, ?decision, "skipping candidate");
                self.pruned.insert(node);
                continue;
            }

            self.generated += 1;
            if self.generated.is_power_of_two() {
                info!(
                    generated = self.generated,
                    queued = self.to_visit.len(),
                    "exploration progress"
                );
            }
            self.node_index.insert(node, self.generated);
            self.queue_sizes.push(self.to_visit.len());
            return Some(faultload);
        }

        self.queue_sizes.push(0);
        None
    }

    fn explore_from(&mut self, faults: BTreeSet<Fault>) -> bool {
        let node = TreeNode::from(faults);
        if !self.add_node(node.clone(), false) {
            return false;
        }
        info!(node = %node, "exploring new point");
        let root = self.root.clone();
        self.add_to_tree(&root, node);
        true
    }
}

impl FeedbackHandler for DynamicExplorationGenerator {
    fn handle_feedback(&mut self, result: &FaultloadResult, context: &mut FeedbackContext<'_>) {
        let observed = result.trace.fault_uids_in_order(&self.strategy);
        for point in &observed {
            context.report_point(point.clone());
        }

        let injected: Vec<Fault> = result.trace.injected_faults().iter().cloned().collect();
        let injected_points: Vec<FaultUid> = injected.iter().map(|f| f.uid.clone()).collect();
        let known: Vec<&FaultUid> = context.points().iter().filter(|p| !p.is_initial()).collect();

        let mut to_explore = Vec::new();
        for point in &observed {
            for candidate in &known {
                if point.matches(candidate) && !FaultUid::contains(&injected_points, candidate) {
                    to_explore.push((*candidate).clone());
                }
            }
        }

        let modes = context.failure_modes().to_vec();
        self.expand(&TreeNode::new(injected), to_explore, &modes);
    }
}

impl Reporter for DynamicExplorationGenerator {
    fn name(&self) -> &'static str {
        "DynamicExplorationGenerator"
    }

    fn report(&self) -> BTreeMap<String, String> {
        let mut report = BTreeMap::new();
        report.insert("generated".to_string(), self.generated.to_string());
        report.insert("considered".to_string(), self.considered.len().to_string());
        report.insert("pruned".to_string(), self.pruned.len().to_string());
        report.insert("redundant".to_string(), self.redundant.to_string());
        report.insert("queue_size_left".to_string(), self.to_visit.len().to_string());

        let max = self.queue_sizes.iter().copied().max().unwrap_or(0);
        report.insert("max_queue_size".to_string(), max.to_string());
        if !self.queue_sizes.is_empty() {
            let avg = self.queue_sizes.iter().sum::<usize>() as f64 / self.queue_sizes.len() as f64;
            report.insert("avg_queue_size".to_string(), format!("{avg:.1}"));
        }
        report.insert("tree".to_string(), self.render_tree());
        report
    }
}
