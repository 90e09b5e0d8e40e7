//! `true`, `false`, `not`, `and`/`or`, `andSC`/`orSC`, `if` (spec §4.7
//! "Boolean").

use predicate_ir::{
    is_truthy, CallFactory, EvalContext, MergeGraph, Node, NodeKind, NodeRef, Reporter, Result,
    TransformOutcome, TxnContext, Value,
};

/// `true`: 0-arity, always `''`. Folds itself to a literal on the first
/// transform pass, same as any other zero-argument pure call.
#[derive(Debug, Clone)]
pub struct TrueNode;

impl Node for TrueNode {
    fn children(&self) -> &[NodeRef] {
        &[]
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "true",
            ordered: true,
        }
    }
    fn render(&self, _child_strs: &[String]) -> String {
        "(true)".to_string()
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        debug_assert!(children.is_empty());
    }
    fn transform(
        &self,
        self_ref: NodeRef,
        graph: &mut MergeGraph,
        _factory: &CallFactory,
        _reporter: &mut Reporter,
    ) -> Result<TransformOutcome> {
        let lit = graph.insert(Box::new(predicate_ir::LiteralNode::new(Some(
            Value::truthy_literal(),
        ))));
        graph.replace(self_ref, lit)?;
        Ok(TransformOutcome::Changed)
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        _ctx: &dyn TxnContext,
    ) -> Result<()> {
        state.alias(self_ref, Value::truthy_literal())?;
        state.finish(self_ref);
        Ok(())
    }
}

/// `false`: 0-arity, always the absent singular `:`.
#[derive(Debug, Clone)]
pub struct FalseNode;

impl Node for FalseNode {
    fn children(&self) -> &[NodeRef] {
        &[]
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "false",
            ordered: true,
        }
    }
    fn render(&self, _child_strs: &[String]) -> String {
        "(false)".to_string()
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        debug_assert!(children.is_empty());
    }
    fn transform(
        &self,
        self_ref: NodeRef,
        graph: &mut MergeGraph,
        _factory: &CallFactory,
        _reporter: &mut Reporter,
    ) -> Result<TransformOutcome> {
        let lit = graph.insert(Box::new(predicate_ir::LiteralNode::new(None)));
        graph.replace(self_ref, lit)?;
        Ok(TransformOutcome::Changed)
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        _ctx: &dyn TxnContext,
    ) -> Result<()> {
        state.finish(self_ref);
        Ok(())
    }
}

/// `not x`: truthy child -> `:`, falsy child -> `''`.
#[derive(Debug, Clone)]
pub struct NotNode {
    children: Vec<NodeRef>,
}

impl NotNode {
    /// Builds a `not` node over exactly one child.
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl Node for NotNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "not",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(not {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.len() != 1 {
            reporter.error(
                None,
                format!("`not` expects 1 argument, got {}", self.children.len()),
            );
        }
        Ok(())
    }
    fn transform(
        &self,
        self_ref: NodeRef,
        graph: &mut MergeGraph,
        _factory: &CallFactory,
        _reporter: &mut Reporter,
    ) -> Result<TransformOutcome> {
        let Some(&child) = self.children.first() else {
            return Ok(TransformOutcome::Unchanged);
        };
        let child_node = graph.get(child)?;
        if let NodeKind::Literal(v) = child_node.kind() {
            let folded = if is_truthy(v) {
                Value::empty_list()
            } else {
                Value::truthy_literal()
            };
            let lit = graph.insert(Box::new(predicate_ir::LiteralNode::new(Some(folded))));
            graph.replace(self_ref, lit)?;
            return Ok(TransformOutcome::Changed);
        }
        Ok(TransformOutcome::Unchanged)
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        let Some(&child) = self.children.first() else {
            state.finish(self_ref);
            return Ok(());
        };
        let v = state.eval(child, ctx)?;
        if !state.is_finished(child) {
            return Ok(());
        }
        if is_truthy(v.as_ref()) {
            state.finish(self_ref);
        } else {
            state.alias(self_ref, Value::truthy_literal())?;
            state.finish(self_ref);
        }
        Ok(())
    }
}

/// Shared implementation backing `and`/`or`/`andSC`/`orSC`: all four
/// short-circuit at the first decisive child in argument order during
/// evaluation; only `and`/`or` (not their `SC` siblings) dedupe and
/// canonicalise argument order at transform time, since canonicalisation
/// is what lets two differently-written but equivalent rules merge into
/// one node and `SC` variants' argument order is part of their contract.
#[derive(Debug, Clone)]
pub struct AggregateNode {
    children: Vec<NodeRef>,
    kind: AggregateKind,
    canonicalise: bool,
}

/// Which of the two decisive-short-circuit aggregates this node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    /// `and`/`andSC`: decisive on the first falsy child.
    And,
    /// `or`/`orSC`: decisive on the first truthy child.
    Or,
}

impl AggregateNode {
    /// Builds a canonicalising (`and`/`or`) aggregate node.
    pub fn new(kind: AggregateKind, children: Vec<NodeRef>) -> Self {
        Self {
            children,
            kind,
            canonicalise: true,
        }
    }

    /// Builds a short-circuit (`andSC`/`orSC`) aggregate node, which
    /// preserves argument order and is never canonicalised/deduped.
    pub fn new_short_circuit(kind: AggregateKind, children: Vec<NodeRef>) -> Self {
        Self {
            children,
            kind,
            canonicalise: false,
        }
    }

    fn name(&self) -> &'static str {
        match (self.kind, self.canonicalise) {
            (AggregateKind::And, true) => "and",
            (AggregateKind::And, false) => "andSC",
            (AggregateKind::Or, true) => "or",
            (AggregateKind::Or, false) => "orSC",
        }
    }

    fn decisive(&self, truthy: bool) -> bool {
        match self.kind {
            AggregateKind::And => !truthy,
            AggregateKind::Or => truthy,
        }
    }
}

impl Node for AggregateNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: self.name(),
            ordered: !self.canonicalise,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("({} {})", self.name(), child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.is_empty() {
            reporter.error(None, format!("`{}` requires at least 1 argument", self.name()));
        }
        Ok(())
    }
    fn transform(
        &self,
        self_ref: NodeRef,
        graph: &mut MergeGraph,
        _factory: &CallFactory,
        _reporter: &mut Reporter,
    ) -> Result<TransformOutcome> {
        // Fold the whole node on the first literal child that's already
        // decisive for this aggregate.
        for &child in &self.children {
            if let NodeKind::Literal(v) = graph.get(child)?.kind() {
                if self.decisive(is_truthy(v)) {
                    let folded = match self.kind {
                        AggregateKind::And => Value::empty_list(),
                        AggregateKind::Or => Value::truthy_literal(),
                    };
                    let lit =
                        graph.insert(Box::new(predicate_ir::LiteralNode::new(Some(folded))));
                    graph.replace(self_ref, lit)?;
                    return Ok(TransformOutcome::Changed);
                }
            }
        }

        // A non-decisive literal child (`[]`/absent for `or`, any
        // truthy literal for `and`) is this aggregate's own identity
        // element and can be dropped before the single-arg/canonicalise
        // steps below.
        let retained: Vec<NodeRef> = self
            .children
            .iter()
            .copied()
            .filter(|&c| match graph.get(c).map(Node::kind) {
                Ok(NodeKind::Literal(v)) => self.decisive(is_truthy(v)),
                _ => true,
            })
            .collect();
        if retained.len() != self.children.len() {
            if retained.is_empty() {
                let neutral = match self.kind {
                    AggregateKind::And => Some(Value::truthy_literal()),
                    AggregateKind::Or => None,
                };
                let lit = graph.insert(Box::new(predicate_ir::LiteralNode::new(neutral)));
                graph.replace(self_ref, lit)?;
            } else {
                graph.set_children(self_ref, retained)?;
            }
            return Ok(TransformOutcome::Changed);
        }

        if self.children.len() == 1 {
            graph.replace(self_ref, self.children[0])?;
            return Ok(TransformOutcome::Changed);
        }

        if self.canonicalise {
            let mut deduped: Vec<NodeRef> = Vec::new();
            for &c in &self.children {
                if !deduped.contains(&c) {
                    deduped.push(c);
                }
            }
            deduped.sort_unstable();
            if deduped != self.children {
                graph.set_children(self_ref, deduped)?;
                return Ok(TransformOutcome::Changed);
            }
        }

        Ok(TransformOutcome::Unchanged)
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        for &child in &self.children {
            let v = state.eval(child, ctx)?;
            if !state.is_finished(child) {
                // Can't yet tell whether this child is decisive; suspend
                // until a later phase re-enters this node.
                return Ok(());
            }
            if self.decisive(is_truthy(v.as_ref())) {
                match self.kind {
                    AggregateKind::And => state.finish(self_ref),
                    AggregateKind::Or => {
                        state.alias(self_ref, Value::truthy_literal())?;
                        state.finish(self_ref);
                    }
                }
                return Ok(());
            }
        }
        match self.kind {
            AggregateKind::And => {
                state.alias(self_ref, Value::truthy_literal())?;
                state.finish(self_ref);
            }
            AggregateKind::Or => state.finish(self_ref),
        }
        Ok(())
    }
}

/// `if cond t f`: returns `t` if `cond` is truthy, else `f`.
#[derive(Debug, Clone)]
pub struct IfNode {
    children: Vec<NodeRef>,
}

impl IfNode {
    /// Builds an `if` node over exactly three children: `cond`, `t`, `f`.
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl Node for IfNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "if",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(if {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.len() != 3 {
            reporter.error(
                None,
                format!("`if` expects 3 arguments, got {}", self.children.len()),
            );
        }
        Ok(())
    }
    fn transform(
        &self,
        self_ref: NodeRef,
        graph: &mut MergeGraph,
        _factory: &CallFactory,
        _reporter: &mut Reporter,
    ) -> Result<TransformOutcome> {
        let [cond, t, f] = self.children[..] else {
            return Ok(TransformOutcome::Unchanged);
        };
        if let NodeKind::Literal(v) = graph.get(cond)?.kind() {
            let target = if is_truthy(v) { t } else { f };
            graph.replace(self_ref, target)?;
            return Ok(TransformOutcome::Changed);
        }
        Ok(TransformOutcome::Unchanged)
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        let [cond, t, f] = self.children[..] else {
            state.finish(self_ref);
            return Ok(());
        };
        let cv = state.eval(cond, ctx)?;
        if !state.is_finished(cond) {
            return Ok(());
        }
        let branch = if is_truthy(cv.as_ref()) { t } else { f };
        state.forward(self_ref, branch)?;
        let _ = state.eval(branch, ctx)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use predicate_ir::LiteralNode;

    struct Ctx;
    impl TxnContext for Ctx {
        fn phase(&self) -> predicate_ir::Phase {
            predicate_ir::Phase::Request
        }
    }

    #[test]
    fn not_folds_literal_truthy_to_empty_list() {
        let mut g = MergeGraph::new();
        let lit = g.insert(Box::new(LiteralNode::new(Some(Value::truthy_literal()))));
        g.add_root(Box::new(NotNode::new(vec![lit])));
        let factory = CallFactory::new();
        let mut reporter = Reporter::new();
        g.transform_pass(&factory, &mut reporter).unwrap();
        let root = g.roots()[0];
        assert_eq!(g.node_to_s(root).unwrap(), "[]");
        assert!(!reporter.has_errors());
    }

    #[test]
    fn and_aggregate_short_circuits_on_false() {
        let mut g = MergeGraph::new();
        let truthy = g.insert(Box::new(LiteralNode::new(Some(Value::truthy_literal()))));
        let falsy = g.insert(Box::new(LiteralNode::new(None)));
        let and_ref = g.add_root(Box::new(AggregateNode::new(
            AggregateKind::And,
            vec![truthy, falsy],
        )));
        let graph = std::sync::Arc::new(g);
        let mut state = predicate_eval::GraphEvalState::new(graph);
        let ctx = Ctx;
        let v = state.eval(and_ref, &ctx).unwrap();
        assert!(v.is_none());
    }

    #[test]
    fn or_aggregate_returns_truthy_on_first_match() {
        let mut g = MergeGraph::new();
        let falsy = g.insert(Box::new(LiteralNode::new(None)));
        let truthy = g.insert(Box::new(LiteralNode::new(Some(Value::number(1)))));
        let or_ref = g.add_root(Box::new(AggregateNode::new(
            AggregateKind::Or,
            vec![falsy, truthy],
        )));
        let graph = std::sync::Arc::new(g);
        let mut state = predicate_eval::GraphEvalState::new(graph);
        let ctx = Ctx;
        let v = state.eval(or_ref, &ctx).unwrap();
        assert_eq!(v.unwrap(), Value::truthy_literal());
    }

    #[test]
    fn if_picks_branch_by_condition() {
        let mut g = MergeGraph::new();
        let cond = g.insert(Box::new(LiteralNode::new(Some(Value::truthy_literal()))));
        let t = g.insert(Box::new(LiteralNode::new(Some(Value::number(1)))));
        let f = g.insert(Box::new(LiteralNode::new(Some(Value::number(2)))));
        let if_ref = g.add_root(Box::new(IfNode::new(vec![cond, t, f])));
        let graph = std::sync::Arc::new(g);
        let mut state = predicate_eval::GraphEvalState::new(graph);
        let ctx = Ctx;
        let v = state.eval(if_ref, &ctx).unwrap();
        assert_eq!(v.unwrap().as_number(), Some(1));
    }
}
