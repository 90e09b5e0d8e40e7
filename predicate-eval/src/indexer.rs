//! Walks the DAG once at the start of a transaction to assign dense slot
//! indices and record the traversal order (spec §4.6 "the indexer").

use predicate_ir::{MergeGraph, NodeRef};
use std::collections::HashMap;

/// A dense index assignment over every node reachable from a graph's
/// roots, built once per transaction and then reused by
/// [`crate::GraphEvalState`] for the transaction's lifetime.
#[derive(Debug)]
pub struct Indexer {
    order: Vec<NodeRef>,
    index_of: HashMap<NodeRef, usize>,
}

impl Indexer {
    /// Indexes every node reachable from `graph`'s roots, in breadth-first
    /// order.
    pub fn build(graph: &MergeGraph) -> Self {
        let order = breadth_first(graph, graph.roots());
        let index_of = order
            .iter()
            .enumerate()
            .map(|(i, n)| (*n, i))
            .collect();
        Self { order, index_of }
    }

    /// The dense index assigned to `node`, if it was reachable from the
    /// roots at indexing time.
    pub fn index_of(&self, node: NodeRef) -> Option<usize> {
        self.index_of.get(&node).copied()
    }

    /// Total number of indexed nodes.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no nodes were indexed (an empty graph).
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Nodes in traversal order.
    pub fn order(&self) -> &[NodeRef] {
        &self.order
    }
}

fn breadth_first(graph: &MergeGraph, roots: &[NodeRef]) -> Vec<NodeRef> {
    use std::collections::{HashSet, VecDeque};
    let mut seen: HashSet<NodeRef> = roots.iter().copied().collect();
    let mut queue: VecDeque<NodeRef> = roots.iter().copied().collect();
    let mut out = Vec::new();
    while let Some(n) = queue.pop_front() {
        out.push(n);
        for child in graph.children_of(n) {
            if seen.insert(child) {
                queue.push_back(child);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use predicate_ir::{LiteralNode, Value};

    #[test]
    fn indexes_every_reachable_node() {
        let mut g = MergeGraph::new();
        let root = g.add_root(Box::new(LiteralNode::new(Some(Value::number(1)))));
        let idx = Indexer::build(&g);
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.index_of(root), Some(0));
    }
}
