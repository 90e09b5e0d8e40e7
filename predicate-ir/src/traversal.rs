//! Whole-graph traversal helpers (spec §4.3 "Traversal") built on top of
//! [`MergeGraph`]'s children/parents accessors. These are pure read-only
//! walks; mutation (rewriting) is `transform.rs`'s job.

use crate::merge_graph::MergeGraph;
use crate::node::NodeRef;
use std::collections::{HashSet, VecDeque};

/// Breadth-first descent from `roots`, visiting each reachable node
/// exactly once (first occurrence wins, matching how a DAG's shared
/// subtrees should only be processed once per pass).
pub fn breadth_first_descent(graph: &MergeGraph, roots: &[NodeRef]) -> Vec<NodeRef> {
    let mut seen = HashSet::new();
    let mut queue: VecDeque<NodeRef> = roots.iter().copied().collect();
    let mut order = Vec::new();
    for r in roots {
        seen.insert(*r);
    }
    while let Some(node) = queue.pop_front() {
        order.push(node);
        for child in graph.children_of(node) {
            if seen.insert(child) {
                queue.push_back(child);
            }
        }
    }
    order
}

/// Breadth-first ascent from `start`, visiting every node that can reach
/// `start` (i.e. walking parent edges outward). Used by transform passes
/// that need to notify ancestors a child changed.
pub fn breadth_first_ascent(graph: &MergeGraph, start: NodeRef) -> Vec<NodeRef> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(start);
    seen.insert(start);
    let mut order = Vec::new();
    while let Some(node) = queue.pop_front() {
        order.push(node);
        for parent in graph.parents_of(node) {
            if seen.insert(parent) {
                queue.push_back(parent);
            }
        }
    }
    order
}

/// Every leaf (childless) node reachable from `roots`.
pub fn leaves(graph: &MergeGraph, roots: &[NodeRef]) -> Vec<NodeRef> {
    breadth_first_descent(graph, roots)
        .into_iter()
        .filter(|n| graph.children_of(*n).is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::LiteralNode;
    use crate::value::Value;

    #[test]
    fn descent_visits_shared_child_once() {
        let mut g = MergeGraph::new();
        let leaf = g.insert(Box::new(LiteralNode::new(Some(Value::number(1)))));
        let root = g.add_root(Box::new(LiteralNode::new(Some(Value::number(2)))));
        let order = breadth_first_descent(&g, &[root, leaf]);
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn leaves_of_literal_graph_are_all_nodes() {
        let mut g = MergeGraph::new();
        let root = g.add_root(Box::new(LiteralNode::new(Some(Value::number(1)))));
        assert_eq!(leaves(&g, &[root]), vec![root]);
    }
}
