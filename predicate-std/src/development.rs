//! `p`, `identity`, `sequence` (spec §4.7 "Development").

use predicate_ir::{EvalContext, Node, NodeKind, NodeRef, Reporter, Result, TxnContext, Value};
use std::any::Any;

/// `p args… x`: traces `args…` to the log and returns `x` unchanged.
#[derive(Debug, Clone)]
pub struct PNode {
    children: Vec<NodeRef>,
}

impl PNode {
    /// Builds a `p args… x` node over one or more children (the last is
    /// the pass-through value).
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl Node for PNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "p",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(p {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.is_empty() {
            reporter.error(None, "`p` requires at least 1 argument".to_string());
        }
        Ok(())
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        let Some((x, trace_args)) = self.children.split_last() else {
            state.finish(self_ref);
            return Ok(());
        };
        let mut traced = Vec::with_capacity(trace_args.len());
        for &a in trace_args {
            let v = state.eval(a, ctx)?;
            if !state.is_finished(a) {
                return Ok(());
            }
            traced.push(v);
        }
        let xv = state.eval(*x, ctx)?;
        if !state.is_finished(*x) {
            return Ok(());
        }
        tracing::debug!(?traced, "p");
        if let Some(xv) = xv {
            state.alias(self_ref, xv)?;
        }
        state.finish(self_ref);
        Ok(())
    }
}

/// `identity x`: returns `x` unchanged. Deliberately has no `transform`
/// override — unlike most single-child wrappers it must survive to
/// evaluation time unmodified, e.g. as a debugging aid that pins a
/// sub-expression's value in a trace.
#[derive(Debug, Clone)]
pub struct IdentityNode {
    children: Vec<NodeRef>,
}

impl IdentityNode {
    /// Builds an `identity x` node.
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl Node for IdentityNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "identity",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(identity {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.len() != 1 {
            reporter.error(None, "`identity` expects 1 argument".to_string());
        }
        Ok(())
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        let Some(&x) = self.children.first() else {
            state.finish(self_ref);
            return Ok(());
        };
        state.forward(self_ref, x)?;
        let _ = state.eval(x, ctx)?;
        Ok(())
    }
}

/// This node's incremental progress: the next integer to emit.
struct SequenceProgress(i64);

/// `sequence start [stop [step]]`: emits one more integer per evaluation,
/// finite (and inclusive of `stop`) when `stop` is given, otherwise
/// unbounded. `step` defaults to `1`.
#[derive(Debug, Clone)]
pub struct SequenceNode {
    children: Vec<NodeRef>,
}

impl SequenceNode {
    /// Builds a `sequence` node over 1-3 children: `start`, optional
    /// `stop`, optional `step`.
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl Node for SequenceNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "sequence",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(sequence {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.is_empty() || self.children.len() > 3 {
            reporter.error(
                None,
                format!("`sequence` expects 1-3 arguments, got {}", self.children.len()),
            );
        }
        Ok(())
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        let mut bounds = Vec::with_capacity(self.children.len());
        for &c in &self.children {
            let v = state.eval(c, ctx)?;
            if !state.is_finished(c) {
                return Ok(());
            }
            bounds.push(v);
        }
        let start = bounds.first().and_then(|v| v.as_ref()).and_then(Value::as_number).unwrap_or(0);
        let stop = bounds.get(1).and_then(|v| v.as_ref()).and_then(Value::as_number);
        let step = bounds
            .get(2)
            .and_then(|v| v.as_ref())
            .and_then(Value::as_number)
            .unwrap_or(1);

        let first_call = state.scratch(self_ref).is_none();
        if first_call {
            state.setup_local_list(self_ref)?;
        }

        let pos = match state
            .scratch(self_ref)
            .get_or_insert_with(|| Box::new(SequenceProgress(start)) as Box<dyn Any>)
            .downcast_mut::<SequenceProgress>()
        {
            Some(p) => p.0,
            None => start,
        };

        state.append_to_list(self_ref, Value::number(pos))?;

        let reached_end = match stop {
            Some(stop) if step >= 0 => pos >= stop,
            Some(stop) => pos <= stop,
            None => false,
        };
        if reached_end {
            state.finish(self_ref);
        } else if let Some(p) = state
            .scratch(self_ref)
            .as_mut()
            .and_then(|b| b.downcast_mut::<SequenceProgress>())
        {
            p.0 = pos + step;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use predicate_ir::{LiteralNode, MergeGraph, Phase};
    use std::sync::Arc;

    struct Ctx;
    impl TxnContext for Ctx {
        fn phase(&self) -> Phase {
            Phase::Request
        }
    }

    #[test]
    fn sequence_grows_one_element_per_evaluation_then_finishes() {
        let mut g = MergeGraph::new();
        let start = g.insert(Box::new(LiteralNode::new(Some(Value::number(1)))));
        let stop = g.insert(Box::new(LiteralNode::new(Some(Value::number(3)))));
        let seq_ref = g.add_root(Box::new(SequenceNode::new(vec![start, stop])));
        let graph = Arc::new(g);
        let mut state = predicate_eval::GraphEvalState::new(graph);

        let sizes: Vec<usize> = (0..4)
            .map(|_| {
                state.eval(seq_ref, &Ctx).unwrap();
                state
                    .value(seq_ref)
                    .and_then(|v| v.as_list())
                    .map(|l| l.len())
                    .unwrap_or(0)
            })
            .collect();
        assert_eq!(sizes, vec![1, 2, 3, 3]);
        assert!(state.is_finished(seq_ref));
    }

    #[test]
    fn identity_forwards_to_its_child() {
        let mut g = MergeGraph::new();
        let lit = g.insert(Box::new(LiteralNode::new(Some(Value::number(9)))));
        let id_ref = g.add_root(Box::new(IdentityNode::new(vec![lit])));
        let graph = Arc::new(g);
        let mut state = predicate_eval::GraphEvalState::new(graph);
        let v = state.eval(id_ref, &Ctx).unwrap().unwrap();
        assert_eq!(v.as_number(), Some(9));
    }
}
