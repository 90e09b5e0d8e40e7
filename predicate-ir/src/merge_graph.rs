//! The structurally-deduplicating DAG (spec §4.4 "MergeGraph"). Built on
//! `petgraph`'s `StableGraph`, the same graph crate the core evaluation
//! engine this workspace was grown from uses for its own node DAG — nodes
//! keep stable indices across removal, which both hash-consing and the
//! transform-history table below depend on.

use crate::call_factory::CallFactory;
use crate::error::{Error, Result};
use crate::eval_context::Reporter;
use crate::node::{Node, NodeKind, NodeRef, TransformOutcome};
use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::Direction;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

type Ix = petgraph::graph::DefaultIx;

fn to_index(n: NodeRef) -> NodeIndex<Ix> {
    NodeIndex::new(n.index())
}

fn to_ref(i: NodeIndex<Ix>) -> NodeRef {
    NodeRef(i.index())
}

/// The shared, reference-counted DAG of [`Node`]s (spec §3 "Node", §4.4).
///
/// Structurally identical subtrees are merged on insertion: two call nodes
/// with the same name, same ordered-vs-unordered kind, and the same
/// (already-canonical) children resolve to the same [`NodeRef`]. Because
/// children are canonicalised before their parent is inserted, hashing a
/// candidate node only ever needs to look one level down — the children's
/// indices already stand in for their whole subtrees.
pub struct MergeGraph {
    graph: StableGraph<Box<dyn Node>, u32>,
    /// Structural-hash bucket -> candidate node indices sharing that hash.
    hash_index: HashMap<u64, Vec<NodeIndex<Ix>>>,
    /// Root nodes registered via [`Self::add_root`].
    roots: Vec<NodeRef>,
    /// `replace`'s history: old index -> the index it was replaced by.
    /// Path-compressed on lookup so `find_transform` is amortised O(1).
    transform_history: HashMap<NodeIndex<Ix>, NodeIndex<Ix>>,
    /// The node whose `transform` call is currently in progress, if any —
    /// its `Box<dyn Node>` has been swapped out for a [`Tombstone`] for
    /// the duration of the call (see [`Self::transform_pass`]).
    transforming: Option<NodeIndex<Ix>>,
    /// A self-edit (`set_children(self_ref, ..)`) made while `self_ref`'s
    /// own `transform` call is in progress, queued up because the real
    /// node isn't in the graph to receive it yet.
    pending_self_children: Option<Vec<NodeRef>>,
}

impl MergeGraph {
    /// A fresh, empty graph.
    pub fn new() -> Self {
        Self {
            graph: StableGraph::new(),
            hash_index: HashMap::new(),
            roots: Vec::new(),
            transform_history: HashMap::new(),
            transforming: None,
            pending_self_children: None,
        }
    }

    /// This node's structural hash: its [`NodeKind`] plus its children's
    /// indices, order-sensitive only when the kind says so.
    pub fn node_hash(&self, node: &dyn Node) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        let mut hasher = DefaultHasher::new();
        match node.kind() {
            NodeKind::Literal(v) => {
                0u8.hash(&mut hasher);
                // `Value` has no `Hash` impl (its `PartialEq` special-cases
                // float bit-patterns); its `Display` form is already the
                // canonical textual rendering, so hash that instead.
                v.map(|v| v.to_string()).hash(&mut hasher);
            }
            NodeKind::Call { name, ordered } => {
                1u8.hash(&mut hasher);
                name.hash(&mut hasher);
                let mut children: Vec<usize> = node.children().iter().map(|r| r.0).collect();
                if !ordered {
                    children.sort_unstable();
                }
                children.hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    fn structurally_equal(&self, a: &dyn Node, b: &dyn Node) -> bool {
        match (a.kind(), b.kind()) {
            (NodeKind::Literal(va), NodeKind::Literal(vb)) => va == vb,
            (
                NodeKind::Call {
                    name: na,
                    ordered: oa,
                },
                NodeKind::Call {
                    name: nb,
                    ordered: ob,
                },
            ) => {
                if na != nb || oa != ob {
                    return false;
                }
                let (ca, cb) = (a.children(), b.children());
                if oa {
                    ca == cb
                } else {
                    let mut sa = ca.to_vec();
                    let mut sb = cb.to_vec();
                    sa.sort_unstable();
                    sb.sort_unstable();
                    sa == sb
                }
            }
            _ => false,
        }
    }

    /// Insert `node`, returning an existing [`NodeRef`] if a structurally
    /// identical node is already present, or a fresh one otherwise. This is
    /// the engine's sole insertion path; `add_root`/`add`/`transform`
    /// implementations that synthesize new nodes all route through it.
    pub fn insert(&mut self, node: Box<dyn Node>) -> NodeRef {
        let hash = self.node_hash(node.as_ref());
        if let Some(candidates) = self.hash_index.get(&hash) {
            for &idx in candidates {
                if let Some(existing) = self.graph.node_weight(idx) {
                    if self.structurally_equal(existing.as_ref(), node.as_ref()) {
                        return to_ref(idx);
                    }
                }
            }
        }
        let children: Vec<NodeRef> = node.children().to_vec();
        let idx = self.graph.add_node(node);
        for (ordinal, child) in children.iter().enumerate() {
            self.graph
                .add_edge(idx, to_index(*child), ordinal as u32);
        }
        self.hash_index.entry(hash).or_default().push(idx);
        to_ref(idx)
    }

    /// Register `node` (already inserted via [`Self::insert`], or inserted
    /// here as a convenience) as one of the graph's roots, so traversal and
    /// whole-graph transform passes reach it.
    pub fn add_root(&mut self, node: Box<dyn Node>) -> NodeRef {
        let r = self.insert(node);
        self.roots.push(r);
        r
    }

    /// All registered roots, in registration order.
    pub fn roots(&self) -> &[NodeRef] {
        &self.roots
    }

    /// Registers an already-[`Self::insert`]ed node as an additional root,
    /// so whole-graph passes (transform, traversal) reach it. Idempotent.
    /// Needed by callers (e.g. `predicate::EngineConfig`) that parse a rule
    /// condition via `predicate_ir::parser`, which inserts nodes bottom-up
    /// but has no reason to know which of them is the rule's own root.
    pub fn mark_root(&mut self, node: NodeRef) {
        if !self.roots.contains(&node) {
            self.roots.push(node);
        }
    }

    /// The current, canonical replacement target for `node` — follows
    /// [`Self::replace`]'s history to its end, compressing the path so
    /// later lookups for the same starting point are O(1).
    pub fn find_transform(&mut self, node: NodeRef) -> NodeRef {
        let mut cur = to_index(node);
        let mut path = Vec::new();
        while let Some(&next) = self.transform_history.get(&cur) {
            path.push(cur);
            cur = next;
        }
        for p in path {
            self.transform_history.insert(p, cur);
        }
        to_ref(cur)
    }

    /// Record that `old` has been replaced by `new` everywhere in the
    /// graph, rewriting every parent edge that pointed at `old` and noting
    /// the substitution in the transform-history table so later
    /// [`Self::find_transform`] calls resolve it.
    pub fn replace(&mut self, old: NodeRef, new: NodeRef) -> Result<()> {
        let old_idx = to_index(old);
        let new_idx = to_index(new);
        if old_idx == new_idx {
            return Ok(());
        }
        let parents: Vec<(NodeIndex<Ix>, u32)> = self
            .graph
            .edges_directed(old_idx, Direction::Incoming)
            .map(|e| (e.source(), *e.weight()))
            .collect();
        for (parent, ordinal) in parents {
            if let Some(edge) = self.graph.find_edge(parent, old_idx) {
                self.graph.remove_edge(edge);
            }
            self.graph.add_edge(parent, new_idx, ordinal);
        }
        for root in self.roots.iter_mut() {
            if *root == old {
                *root = new;
            }
        }
        self.transform_history.insert(old_idx, new_idx);
        self.graph.remove_node(old_idx);
        Ok(())
    }

    /// Replace `node`'s child list in place (used by `transform`
    /// implementations that edit their own children rather than replacing
    /// themselves wholesale).
    pub fn set_children(&mut self, node: NodeRef, children: Vec<NodeRef>) -> Result<()> {
        let idx = to_index(node);
        let old_edges: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| e.id())
            .collect();
        for e in old_edges {
            self.graph.remove_edge(e);
        }
        for (ordinal, child) in children.iter().enumerate() {
            self.graph.add_edge(idx, to_index(*child), ordinal as u32);
        }
        if self.transforming == Some(idx) {
            // `node`'s real `Box<dyn Node>` is temporarily out of the
            // graph (see `transform_pass`); queue the edit for when it's
            // swapped back in.
            self.pending_self_children = Some(children);
        } else if let Some(weight) = self.graph.node_weight_mut(idx) {
            weight.replace_children(children);
        } else {
            return Err(Error::NotFound(format!("node {node} not found")));
        }
        Ok(())
    }

    /// Shared access to `node`'s concrete [`Node`].
    pub fn get(&self, node: NodeRef) -> Result<&dyn Node> {
        self.graph
            .node_weight(to_index(node))
            .map(|b| b.as_ref())
            .ok_or_else(|| Error::NotFound(format!("node {node} not found")))
    }

    /// `node`'s children, in the order recorded at insertion time.
    pub fn children_of(&self, node: NodeRef) -> Vec<NodeRef> {
        self.get(node)
            .map(|n| n.children().to_vec())
            .unwrap_or_default()
    }

    /// `node`'s parents (nodes with an outgoing edge to it), unordered.
    pub fn parents_of(&self, node: NodeRef) -> Vec<NodeRef> {
        self.graph
            .neighbors_directed(to_index(node), Direction::Incoming)
            .map(to_ref)
            .collect()
    }

    /// Total live node count.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Removes a node that no longer has any parents and is not a root.
    /// Used by transform passes cleaning up orphaned subtrees after a
    /// `replace`. No-ops (rather than erroring) if the node still has
    /// parents, since garbage-collecting a still-referenced node would be
    /// a transform bug, not a caller error.
    pub fn remove_if_orphaned(&mut self, node: NodeRef) {
        if self.roots.contains(&node) {
            return;
        }
        let idx = to_index(node);
        let has_parent = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .next()
            .is_some();
        if !has_parent {
            self.graph.remove_node(idx);
        }
    }

    /// Renders `node`'s whole subtree to its canonical textual form (spec
    /// §4.3 `to_s`), recursing through children and calling
    /// [`Node::render`] bottom-up.
    pub fn node_to_s(&self, node: NodeRef) -> Result<String> {
        let n = self.get(node)?;
        let mut child_strs = Vec::with_capacity(n.children().len());
        for &child in n.children() {
            child_strs.push(self.node_to_s(child)?);
        }
        Ok(n.render(&child_strs))
    }

    /// Runs [`Node::pre_transform`] over every node reachable from the
    /// roots, accumulating any reported errors/warnings.
    pub fn pre_transform_all(&self, reporter: &mut Reporter) -> Result<()> {
        for root in self.roots.clone() {
            self.pre_transform_from(root, reporter)?;
        }
        Ok(())
    }

    fn pre_transform_from(&self, node: NodeRef, reporter: &mut Reporter) -> Result<()> {
        let n = self.get(node)?;
        n.pre_transform(reporter)?;
        for &child in n.children() {
            self.pre_transform_from(child, reporter)?;
        }
        Ok(())
    }

    /// Like [`Self::pre_transform_all`], but for [`Node::post_transform`].
    pub fn post_transform_all(&self, reporter: &mut Reporter) -> Result<()> {
        for root in self.roots.clone() {
            self.post_transform_from(root, reporter)?;
        }
        Ok(())
    }

    fn post_transform_from(&self, node: NodeRef, reporter: &mut Reporter) -> Result<()> {
        let n = self.get(node)?;
        n.post_transform(reporter)?;
        for &child in n.children() {
            self.post_transform_from(child, reporter)?;
        }
        Ok(())
    }

    /// Runs one downward `transform` pass over every node reachable from
    /// the roots, returning whether any node changed. The driver in
    /// [`crate::transform::transform_graph`] calls this repeatedly to a
    /// fixed point (spec §4.5).
    pub fn transform_pass(&mut self, factory: &CallFactory, reporter: &mut Reporter) -> Result<bool> {
        let mut visited = std::collections::HashSet::new();
        let mut stack: Vec<NodeRef> = self.roots.clone();
        let mut any_changed = false;
        while let Some(node) = stack.pop() {
            let node = self.find_transform(node);
            if !visited.insert(node) {
                continue;
            }
            let children = self.children_of(node);
            stack.extend(children);

            // `transform` needs `&mut self` (to call `replace`/`set_children`)
            // while also being a method *on* the node living inside
            // `self.graph`. Swap the node out for a placeholder for the
            // duration of the call so there's no simultaneous borrow of
            // `self` and of the node it owns, then swap the real node back
            // in — unless `transform` replaced or removed it outright.
            let idx = to_index(node);
            let mut real = match self.graph.node_weight_mut(idx) {
                Some(slot) => std::mem::replace(slot, Box::new(Tombstone)),
                None => continue,
            };
            self.transforming = Some(idx);
            let outcome = real.transform(node, self, factory, reporter);
            self.transforming = None;
            if let Some(children) = self.pending_self_children.take() {
                real.replace_children(children);
            }
            if let Some(slot) = self.graph.node_weight_mut(idx) {
                *slot = real;
            }
            if outcome?.changed() {
                any_changed = true;
            }
        }
        Ok(any_changed)
    }
}

/// A placeholder occupying a node's graph slot while its real `Box<dyn
/// Node>` has been taken out to call `transform` on (see
/// [`MergeGraph::transform_pass`]). Never reachable from a root and never
/// evaluated; its methods only exist to satisfy the `Node` trait.
#[derive(Debug)]
struct Tombstone;

impl Node for Tombstone {
    fn children(&self) -> &[NodeRef] {
        &[]
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "<tombstone>",
            ordered: true,
        }
    }
    fn render(&self, _child_strs: &[String]) -> String {
        "<tombstone>".to_string()
    }
    fn replace_children(&mut self, _children: Vec<NodeRef>) {}
    fn eval_calculate(
        &self,
        _self_ref: NodeRef,
        _state: &mut dyn crate::eval_context::EvalContext,
        _ctx: &dyn crate::eval_context::TxnContext,
    ) -> Result<()> {
        Err(Error::InvalidState(
            "attempted to evaluate a tombstone node".to_string(),
        ))
    }
}

impl Default for MergeGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval_context::{EvalContext, TxnContext};
    use crate::node::LiteralNode;
    use crate::value::Value;

    #[test]
    fn identical_literals_merge() {
        let mut g = MergeGraph::new();
        let a = g.insert(Box::new(LiteralNode::new(Some(Value::number(1)))));
        let b = g.insert(Box::new(LiteralNode::new(Some(Value::number(1)))));
        assert_eq!(a, b);
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn distinct_literals_do_not_merge() {
        let mut g = MergeGraph::new();
        let a = g.insert(Box::new(LiteralNode::new(Some(Value::number(1)))));
        let b = g.insert(Box::new(LiteralNode::new(Some(Value::number(2)))));
        assert_ne!(a, b);
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn replace_rewrites_find_transform() {
        let mut g = MergeGraph::new();
        let a = g.add_root(Box::new(LiteralNode::new(Some(Value::number(1)))));
        let b = g.insert(Box::new(LiteralNode::new(Some(Value::number(2)))));
        g.replace(a, b).unwrap();
        assert_eq!(g.find_transform(a), b);
        assert_eq!(g.roots(), &[b]);
    }

    #[allow(dead_code)]
    fn silence_unused(_: &mut dyn EvalContext, _: &dyn TxnContext) {}
}
