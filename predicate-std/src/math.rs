//! `add`, `mult`, `neg`, `recip`, `min`, `max` (spec §4.7 "Math").

use crate::fold::fold_if_all_literal;
use predicate_ir::{
    CallFactory, EvalContext, MergeGraph, Node, NodeKind, NodeRef, Payload, Reporter, Result,
    TransformOutcome, TxnContext, Value,
};

/// A numeric value, kept as int or widened to float depending on what the
/// two operands of a binary operator call for.
#[derive(Clone, Copy, Debug)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(v: &Value) -> Option<Self> {
        match v.payload() {
            Payload::Number(n) => Some(Num::Int(*n)),
            Payload::Float(f) => Some(Num::Float(*f)),
            _ => None,
        }
    }

    fn to_value(self) -> Value {
        match self {
            Num::Int(n) => Value::number(n),
            Num::Float(f) => Value::float(f),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(f) => f,
        }
    }
}

/// Which binary arithmetic a [`BinaryOpNode`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Mult,
}

fn apply_binary(op: BinaryOp, a: Num, b: Num) -> Num {
    match (op, a, b) {
        (BinaryOp::Add, Num::Int(a), Num::Int(b)) => Num::Int(a.wrapping_add(b)),
        (BinaryOp::Mult, Num::Int(a), Num::Int(b)) => Num::Int(a.wrapping_mul(b)),
        (BinaryOp::Add, a, b) => Num::Float(a.as_f64() + b.as_f64()),
        (BinaryOp::Mult, a, b) => Num::Float(a.as_f64() * b.as_f64()),
    }
}

/// `add`/`mult`: scalar-scalar produces a scalar; scalar-list or
/// list-scalar applies element-wise, preserving names and passing
/// non-numeric elements through unchanged.
#[derive(Debug, Clone)]
pub struct BinaryOpNode {
    op: BinaryOp,
    children: Vec<NodeRef>,
}

impl BinaryOpNode {
    pub fn add(children: Vec<NodeRef>) -> Self {
        Self {
            op: BinaryOp::Add,
            children,
        }
    }
    pub fn mult(children: Vec<NodeRef>) -> Self {
        Self {
            op: BinaryOp::Mult,
            children,
        }
    }
    fn name(&self) -> &'static str {
        match self.op {
            BinaryOp::Add => "add",
            BinaryOp::Mult => "mult",
        }
    }
}

/// The pure computation behind `add`/`mult`, shared between incremental
/// evaluation and constant-folding: absent if either operand is absent.
fn binary_result(op: BinaryOp, a: Option<&Value>, b: Option<&Value>) -> Option<Value> {
    let (a, b) = (a?, b?);
    match (a.is_list(), b.is_list()) {
        (false, false) => Num::of(a).zip(Num::of(b)).map(|(na, nb)| apply_binary(op, na, nb).to_value()),
        (false, true) => Some(elementwise(op, a, b, true)),
        (true, false) => Some(elementwise(op, b, a, false)),
        (true, true) => None,
    }
}

fn elementwise(op: BinaryOp, scalar: &Value, list: &Value, scalar_is_lhs: bool) -> Value {
    let items = list.as_list().unwrap_or(&[]);
    let out: Vec<Value> = items
        .iter()
        .map(|item| match Num::of(item) {
            Some(n) => {
                let scalar_n = Num::of(scalar).expect("scalar operand is numeric");
                let result = if scalar_is_lhs {
                    apply_binary(op, scalar_n, n)
                } else {
                    apply_binary(op, n, scalar_n)
                };
                let mut v = result.to_value();
                if let Some(name) = item.name() {
                    v = v.with_name(name.to_vec());
                }
                v
            }
            None => item.clone(),
        })
        .collect();
    Value::list(out)
}

impl Node for BinaryOpNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: self.name(),
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("({} {})", self.name(), child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.len() != 2 {
            reporter.error(None, format!("`{}` expects 2 arguments", self.name()));
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
        if self.children.len() != 2 {
            return Ok(TransformOutcome::Unchanged);
        }
        let op = self.op;
        fold_if_all_literal(self_ref, &self.children, graph, |operands| {
            binary_result(op, operands[0], operands[1])
        })
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        let [a_arg, b_arg] = self.children[..] else {
            state.finish(self_ref);
            return Ok(());
        };
        let a = state.eval(a_arg, ctx)?;
        if !state.is_finished(a_arg) {
            return Ok(());
        }
        let b = state.eval(b_arg, ctx)?;
        if !state.is_finished(b_arg) {
            return Ok(());
        }
        if let Some(result) = binary_result(self.op, a.as_ref(), b.as_ref()) {
            state.alias(self_ref, result)?;
        }
        state.finish(self_ref);
        Ok(())
    }
}

/// Which unary, element-wise arithmetic a [`UnaryOpNode`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnaryOp {
    Neg,
    Recip,
}

fn apply_unary(op: UnaryOp, n: Num) -> Num {
    match (op, n) {
        (UnaryOp::Neg, Num::Int(n)) => Num::Int(-n),
        (UnaryOp::Neg, Num::Float(f)) => Num::Float(-f),
        (UnaryOp::Recip, n) => Num::Float(1.0 / n.as_f64()),
    }
}

/// The pure computation behind `neg`/`recip`, shared between incremental
/// evaluation and constant-folding.
fn unary_result(op: UnaryOp, v: Option<&Value>) -> Option<Value> {
    let v = v?;
    let apply_one = |item: &Value| -> Value {
        match Num::of(item) {
            Some(n) => {
                let mut r = apply_unary(op, n).to_value();
                if let Some(name) = item.name() {
                    r = r.with_name(name.to_vec());
                }
                r
            }
            None => item.clone(),
        }
    };
    Some(match v.as_list() {
        Some(items) => Value::list(items.iter().map(apply_one).collect::<Vec<_>>()),
        None => apply_one(v),
    })
}

/// `neg v` / `recip v`: applied element-wise across `v`'s stream;
/// non-numeric elements pass through unchanged.
#[derive(Debug, Clone)]
pub struct UnaryOpNode {
    op: UnaryOp,
    children: Vec<NodeRef>,
}

impl UnaryOpNode {
    pub fn neg(children: Vec<NodeRef>) -> Self {
        Self {
            op: UnaryOp::Neg,
            children,
        }
    }
    pub fn recip(children: Vec<NodeRef>) -> Self {
        Self {
            op: UnaryOp::Recip,
            children,
        }
    }
    fn name(&self) -> &'static str {
        match self.op {
            UnaryOp::Neg => "neg",
            UnaryOp::Recip => "recip",
        }
    }
}

impl Node for UnaryOpNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: self.name(),
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("({} {})", self.name(), child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.len() != 1 {
            reporter.error(None, format!("`{}` expects 1 argument", self.name()));
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
        if self.children.len() != 1 {
            return Ok(TransformOutcome::Unchanged);
        }
        let op = self.op;
        fold_if_all_literal(self_ref, &self.children, graph, |operands| {
            unary_result(op, operands[0])
        })
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        let Some(&arg) = self.children.first() else {
            state.finish(self_ref);
            return Ok(());
        };
        let v = state.eval(arg, ctx)?;
        if !state.is_finished(arg) {
            return Ok(());
        }
        if let Some(result) = unary_result(self.op, v.as_ref()) {
            state.alias(self_ref, result)?;
        }
        state.finish(self_ref);
        Ok(())
    }
}

/// Which direction [`ReduceNode`] reduces toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reduce {
    Min,
    Max,
}

/// `min v` / `max v`: reduces `v`'s stream to its smallest/largest numeric
/// element, ignoring non-numeric elements; absent input (or no numeric
/// elements) → absent.
#[derive(Debug, Clone)]
pub struct ReduceNode {
    reduce: Reduce,
    children: Vec<NodeRef>,
}

impl ReduceNode {
    pub fn min(children: Vec<NodeRef>) -> Self {
        Self {
            reduce: Reduce::Min,
            children,
        }
    }
    pub fn max(children: Vec<NodeRef>) -> Self {
        Self {
            reduce: Reduce::Max,
            children,
        }
    }
    fn name(&self) -> &'static str {
        match self.reduce {
            Reduce::Min => "min",
            Reduce::Max => "max",
        }
    }
}

/// The pure computation behind `min`/`max`, shared between incremental
/// evaluation and constant-folding.
fn reduce_result(reduce: Reduce, v: Option<&Value>) -> Option<Value> {
    let v = v?;
    let elements: Vec<&Value> = match v.as_list() {
        Some(items) => items.iter().collect(),
        None => vec![v],
    };
    elements
        .into_iter()
        .filter_map(|e| Num::of(e).map(|n| (n.as_f64(), e)))
        .reduce(|a, b| match reduce {
            Reduce::Min => {
                if b.0 < a.0 {
                    b
                } else {
                    a
                }
            }
            Reduce::Max => {
                if b.0 > a.0 {
                    b
                } else {
                    a
                }
            }
        })
        .map(|(_, v)| v.clone())
}

impl Node for ReduceNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: self.name(),
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("({} {})", self.name(), child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.len() != 1 {
            reporter.error(None, format!("`{}` expects 1 argument", self.name()));
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
        if self.children.len() != 1 {
            return Ok(TransformOutcome::Unchanged);
        }
        let reduce = self.reduce;
        fold_if_all_literal(self_ref, &self.children, graph, |operands| {
            reduce_result(reduce, operands[0])
        })
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        let Some(&arg) = self.children.first() else {
            state.finish(self_ref);
            return Ok(());
        };
        let v = state.eval(arg, ctx)?;
        if !state.is_finished(arg) {
            return Ok(());
        }
        if let Some(result) = reduce_result(self.reduce, v.as_ref()) {
            state.alias(self_ref, result)?;
        }
        state.finish(self_ref);
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
    fn add_scalar_scalar_stays_int() {
        let mut g = MergeGraph::new();
        let a = g.insert(Box::new(LiteralNode::new(Some(Value::number(2)))));
        let b = g.insert(Box::new(LiteralNode::new(Some(Value::number(3)))));
        let add_ref = g.add_root(Box::new(BinaryOpNode::add(vec![a, b])));
        let graph = Arc::new(g);
        let mut state = predicate_eval::GraphEvalState::new(graph);
        let v = state.eval(add_ref, &Ctx).unwrap().unwrap();
        assert_eq!(v.as_number(), Some(5));
    }

    #[test]
    fn add_scalar_float_widens() {
        let mut g = MergeGraph::new();
        let a = g.insert(Box::new(LiteralNode::new(Some(Value::number(2)))));
        let b = g.insert(Box::new(LiteralNode::new(Some(Value::float(0.5)))));
        let add_ref = g.add_root(Box::new(BinaryOpNode::add(vec![a, b])));
        let graph = Arc::new(g);
        let mut state = predicate_eval::GraphEvalState::new(graph);
        let v = state.eval(add_ref, &Ctx).unwrap().unwrap();
        assert_eq!(v.as_float(), Some(2.5));
    }

    #[test]
    fn add_scalar_list_applies_elementwise_and_preserves_names() {
        let mut g = MergeGraph::new();
        let scalar = g.insert(Box::new(LiteralNode::new(Some(Value::number(1)))));
        let list = g.insert(Box::new(LiteralNode::new(Some(Value::list(vec![
            Value::number(1).with_name("a"),
            Value::string(*b"skip"),
        ])))));
        let add_ref = g.add_root(Box::new(BinaryOpNode::add(vec![scalar, list])));
        let graph = Arc::new(g);
        let mut state = predicate_eval::GraphEvalState::new(graph);
        let v = state.eval(add_ref, &Ctx).unwrap().unwrap();
        let items = v.as_list().unwrap();
        assert_eq!(items[0].as_number(), Some(2));
        assert_eq!(items[0].name(), Some(&b"a"[..]));
        assert_eq!(items[1].as_string(), Some(&b"skip"[..]));
    }

    #[test]
    fn min_ignores_non_numeric_and_picks_smallest() {
        let mut g = MergeGraph::new();
        let list = g.insert(Box::new(LiteralNode::new(Some(Value::list(vec![
            Value::number(5),
            Value::string(*b"x"),
            Value::number(1),
        ])))));
        let min_ref = g.add_root(Box::new(ReduceNode::min(vec![list])));
        let graph = Arc::new(g);
        let mut state = predicate_eval::GraphEvalState::new(graph);
        let v = state.eval(min_ref, &Ctx).unwrap().unwrap();
        assert_eq!(v.as_number(), Some(1));
    }
}
