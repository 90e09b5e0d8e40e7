//! `isLonger`, `isSimple`, `isFinished`, `isLiteral`, `isHomogeneous`
//! (spec §4.7 "Predicate introspection"): all return truthy/absent.

use predicate_ir::{
    CallFactory, EvalContext, MergeGraph, Node, NodeKind, NodeRef, Reporter, Result,
    TransformOutcome, TxnContext, Value,
};

fn to_elements(v: &Value) -> Vec<Value> {
    match v.as_list() {
        Some(items) => items.to_vec(),
        None => vec![v.clone()],
    }
}

fn truthy_or_absent(state: &mut dyn EvalContext, self_ref: NodeRef, cond: bool) -> Result<()> {
    if cond {
        state.alias(self_ref, Value::truthy_literal())?;
    }
    state.finish(self_ref);
    Ok(())
}

/// `isLonger n v`: truthy when `v`'s stream has more than `n` elements.
#[derive(Debug, Clone)]
pub struct IsLongerNode {
    children: Vec<NodeRef>,
}

impl IsLongerNode {
    /// Builds an `isLonger n v` node.
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl Node for IsLongerNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "isLonger",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(isLonger {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.len() != 2 {
            reporter.error(None, "`isLonger` expects 2 arguments".to_string());
        }
        Ok(())
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        let [n_arg, v_arg] = self.children[..] else {
            state.finish(self_ref);
            return Ok(());
        };
        let n = state.eval(n_arg, ctx)?;
        if !state.is_finished(n_arg) {
            return Ok(());
        }
        let v = state.eval(v_arg, ctx)?;
        if !state.is_finished(v_arg) {
            return Ok(());
        }
        let n = n.as_ref().and_then(Value::as_number).unwrap_or(0);
        let len = v.as_ref().map(to_elements).unwrap_or_default().len() as i64;
        truthy_or_absent(state, self_ref, len > n)
    }
}

/// `isSimple v`: truthy when `v`'s stream representation has exactly one
/// element.
#[derive(Debug, Clone)]
pub struct IsSimpleNode {
    children: Vec<NodeRef>,
}

impl IsSimpleNode {
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl Node for IsSimpleNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "isSimple",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(isSimple {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.len() != 1 {
            reporter.error(None, "`isSimple` expects 1 argument".to_string());
        }
        Ok(())
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        let Some(&v_arg) = self.children.first() else {
            state.finish(self_ref);
            return Ok(());
        };
        let v = state.eval(v_arg, ctx)?;
        if !state.is_finished(v_arg) {
            return Ok(());
        }
        let simple = v.as_ref().map(to_elements).map(|e| e.len() == 1).unwrap_or(false);
        truthy_or_absent(state, self_ref, simple)
    }
}

/// `isFinished v`: truthy once `v`'s node has finished evaluating this
/// transaction.
#[derive(Debug, Clone)]
pub struct IsFinishedNode {
    children: Vec<NodeRef>,
}

impl IsFinishedNode {
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl Node for IsFinishedNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "isFinished",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(isFinished {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.len() != 1 {
            reporter.error(None, "`isFinished` expects 1 argument".to_string());
        }
        Ok(())
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        let Some(&v_arg) = self.children.first() else {
            state.finish(self_ref);
            return Ok(());
        };
        // Nudge `v_arg` forward, but don't suspend on it: "is it finished"
        // must itself be answerable (and re-askable) before `v_arg` is.
        let _ = state.eval(v_arg, ctx)?;
        truthy_or_absent(state, self_ref, state.is_finished(v_arg))
    }
}

/// `isLiteral v`: whether `v` is (or has already folded to) a literal
/// node. This is purely structural, so it is resolved entirely at
/// transform time — by the time the graph reaches a fixed point every
/// reachable `isLiteral` node has been folded to `''`/`:`. `eval_calculate`
/// is unreachable in a validated, fully-transformed graph.
#[derive(Debug, Clone)]
pub struct IsLiteralNode {
    children: Vec<NodeRef>,
}

impl IsLiteralNode {
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl Node for IsLiteralNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "isLiteral",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(isLiteral {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.len() != 1 {
            reporter.error(None, "`isLiteral` expects 1 argument".to_string());
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
        let Some(&v_arg) = self.children.first() else {
            return Ok(TransformOutcome::Unchanged);
        };
        let is_literal = matches!(graph.get(v_arg)?.kind(), NodeKind::Literal(_));
        let folded = if is_literal {
            Value::truthy_literal()
        } else {
            return Ok(TransformOutcome::Unchanged);
        };
        let lit = graph.insert(Box::new(predicate_ir::LiteralNode::new(Some(folded))));
        graph.replace(self_ref, lit)?;
        Ok(TransformOutcome::Changed)
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        _ctx: &dyn TxnContext,
    ) -> Result<()> {
        // Its argument never settled into a literal through transformation;
        // truthfully absent rather than truthy.
        state.finish(self_ref);
        Ok(())
    }
}

/// `isHomogeneous v`: truthy when every element of `v`'s stream shares the
/// same payload type.
#[derive(Debug, Clone)]
pub struct IsHomogeneousNode {
    children: Vec<NodeRef>,
}

impl IsHomogeneousNode {
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

fn type_tag(v: &Value) -> &'static str {
    match v.payload() {
        predicate_ir::Payload::String(_) => "string",
        predicate_ir::Payload::Number(_) => "number",
        predicate_ir::Payload::Float(_) => "float",
        predicate_ir::Payload::List(_) => "list",
    }
}

impl Node for IsHomogeneousNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "isHomogeneous",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(isHomogeneous {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.len() != 1 {
            reporter.error(None, "`isHomogeneous` expects 1 argument".to_string());
        }
        Ok(())
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        let Some(&v_arg) = self.children.first() else {
            state.finish(self_ref);
            return Ok(());
        };
        let v = state.eval(v_arg, ctx)?;
        if !state.is_finished(v_arg) {
            return Ok(());
        }
        let elements = v.as_ref().map(to_elements).unwrap_or_default();
        let homogeneous = match elements.split_first() {
            Some((first, rest)) => rest.iter().all(|e| type_tag(e) == type_tag(first)),
            None => true,
        };
        truthy_or_absent(state, self_ref, homogeneous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use predicate_ir::{LiteralNode, Phase};
    use std::sync::Arc;

    struct Ctx;
    impl TxnContext for Ctx {
        fn phase(&self) -> Phase {
            Phase::Request
        }
    }

    #[test]
    fn is_longer_compares_stream_length() {
        let mut g = MergeGraph::new();
        let n = g.insert(Box::new(LiteralNode::new(Some(Value::number(1)))));
        let list = g.insert(Box::new(LiteralNode::new(Some(Value::list(vec![
            Value::number(1),
            Value::number(2),
        ])))));
        let longer_ref = g.add_root(Box::new(IsLongerNode::new(vec![n, list])));
        let graph = Arc::new(g);
        let mut state = predicate_eval::GraphEvalState::new(graph);
        let v = state.eval(longer_ref, &Ctx).unwrap();
        assert_eq!(v.unwrap(), Value::truthy_literal());
    }

    #[test]
    fn is_literal_folds_at_transform_time() {
        let mut g = MergeGraph::new();
        let lit = g.insert(Box::new(LiteralNode::new(Some(Value::number(1)))));
        g.add_root(Box::new(IsLiteralNode::new(vec![lit])));
        let factory = CallFactory::new();
        let mut reporter = Reporter::new();
        g.transform_pass(&factory, &mut reporter).unwrap();
        let root = g.roots()[0];
        assert_eq!(g.node_to_s(root).unwrap(), "''");
    }

    #[test]
    fn is_homogeneous_detects_mixed_types() {
        let mut g = MergeGraph::new();
        let list = g.insert(Box::new(LiteralNode::new(Some(Value::list(vec![
            Value::number(1),
            Value::string(*b"x"),
        ])))));
        let homog_ref = g.add_root(Box::new(IsHomogeneousNode::new(vec![list])));
        let graph = Arc::new(g);
        let mut state = predicate_eval::GraphEvalState::new(graph);
        let v = state.eval(homog_ref, &Ctx).unwrap();
        assert!(v.is_none());
    }
}
