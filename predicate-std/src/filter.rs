//! `eq`/`ne`/`lt`/`le`/`gt`/`ge`, `typed`, `named`/`namedi`/`namedRx` and
//! their `notNamed…` negations (spec §4.7 "Filter"): each emits the
//! subsequence of its subject's stream whose elements satisfy a predicate.

use crate::fold::fold_if_all_literal;
use predicate_ir::{
    CallFactory, EvalContext, MergeGraph, Node, NodeKind, NodeRef, Reporter, Result,
    TransformOutcome, TxnContext, Value,
};
use regex::{Regex, RegexBuilder};
use std::any::Any;

fn to_elements(v: &Value) -> Vec<Value> {
    match v.as_list() {
        Some(items) => items.to_vec(),
        None => vec![v.clone()],
    }
}

/// Which relational test a [`CompareNode`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareKind {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// `eq lit v` / `ne lit v` / `lt n v` / `le n v` / `gt n v` / `ge n v`:
/// keeps the elements of `v`'s stream that compare true against the first
/// argument. `eq`/`ne` compare by value equality; the four relational
/// forms compare numerically and drop non-numeric elements.
#[derive(Debug, Clone)]
pub struct CompareNode {
    kind: CompareKind,
    children: Vec<NodeRef>,
}

impl CompareNode {
    pub fn eq(children: Vec<NodeRef>) -> Self {
        Self {
            kind: CompareKind::Eq,
            children,
        }
    }
    pub fn ne(children: Vec<NodeRef>) -> Self {
        Self {
            kind: CompareKind::Ne,
            children,
        }
    }
    pub fn lt(children: Vec<NodeRef>) -> Self {
        Self {
            kind: CompareKind::Lt,
            children,
        }
    }
    pub fn le(children: Vec<NodeRef>) -> Self {
        Self {
            kind: CompareKind::Le,
            children,
        }
    }
    pub fn gt(children: Vec<NodeRef>) -> Self {
        Self {
            kind: CompareKind::Gt,
            children,
        }
    }
    pub fn ge(children: Vec<NodeRef>) -> Self {
        Self {
            kind: CompareKind::Ge,
            children,
        }
    }

    fn name(&self) -> &'static str {
        match self.kind {
            CompareKind::Eq => "eq",
            CompareKind::Ne => "ne",
            CompareKind::Lt => "lt",
            CompareKind::Le => "le",
            CompareKind::Gt => "gt",
            CompareKind::Ge => "ge",
        }
    }

    fn matches(&self, operand: &Value, elem: &Value) -> bool {
        match self.kind {
            // Compared by payload only: a stream element's name is its
            // position in the stream, not part of the value being tested.
            CompareKind::Eq => operand.payload() == elem.payload(),
            CompareKind::Ne => operand.payload() != elem.payload(),
            CompareKind::Lt | CompareKind::Le | CompareKind::Gt | CompareKind::Ge => {
                match (operand.as_numeric(), elem.as_numeric()) {
                    (Some(a), Some(b)) => match self.kind {
                        CompareKind::Lt => b < a,
                        CompareKind::Le => b <= a,
                        CompareKind::Gt => b > a,
                        CompareKind::Ge => b >= a,
                        _ => unreachable!(),
                    },
                    _ => false,
                }
            }
        }
    }

    /// The pure filtering behind this comparison, shared between
    /// incremental evaluation and constant-folding.
    fn filtered(&self, operand: Option<&Value>, v: Option<&Value>) -> Value {
        let elements = v.map(to_elements).unwrap_or_default();
        match operand {
            Some(operand) => {
                Value::list(elements.into_iter().filter(|e| self.matches(operand, e)).collect::<Vec<_>>())
            }
            None => Value::list(Vec::new()),
        }
    }
}

impl Node for CompareNode {
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
            reporter.error(
                None,
                format!("`{}` expects 2 arguments, got {}", self.name(), self.children.len()),
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
        if self.children.len() != 2 {
            return Ok(TransformOutcome::Unchanged);
        }
        fold_if_all_literal(self_ref, &self.children, graph, |operands| {
            Some(self.filtered(operands[0], operands[1]))
        })
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        let [operand_arg, v_arg] = self.children[..] else {
            state.finish(self_ref);
            return Ok(());
        };
        let operand = state.eval(operand_arg, ctx)?;
        if !state.is_finished(operand_arg) {
            return Ok(());
        }
        let v = state.eval(v_arg, ctx)?;
        if !state.is_finished(v_arg) {
            return Ok(());
        }
        state.setup_local_list(self_ref)?;
        if let Some(operand) = &operand {
            for elem in v.as_ref().map(to_elements).unwrap_or_default() {
                if self.matches(operand, &elem) {
                    state.append_to_list(self_ref, elem)?;
                }
            }
        }
        state.finish(self_ref);
        Ok(())
    }
}

/// `typed tag v`: keeps the elements of `v`'s stream whose payload matches
/// `tag` ∈ {`string`, `number`, `float`, `list`}.
#[derive(Debug, Clone)]
pub struct TypedNode {
    children: Vec<NodeRef>,
}

impl TypedNode {
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

fn type_tag_matches(tag: &[u8], v: &Value) -> bool {
    let matched = match v.payload() {
        predicate_ir::Payload::String(_) => "string",
        predicate_ir::Payload::Number(_) => "number",
        predicate_ir::Payload::Float(_) => "float",
        predicate_ir::Payload::List(_) => "list",
    };
    tag == matched.as_bytes()
}

/// The pure filtering behind `typed`, shared between incremental
/// evaluation and constant-folding.
fn typed_filtered(tag: Option<&Value>, v: Option<&Value>) -> Value {
    let elements = v.map(to_elements).unwrap_or_default();
    match tag.and_then(Value::as_string) {
        Some(tag) => Value::list(elements.into_iter().filter(|e| type_tag_matches(tag, e)).collect::<Vec<_>>()),
        None => Value::list(Vec::new()),
    }
}

impl Node for TypedNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "typed",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(typed {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.len() != 2 {
            reporter.error(None, "`typed` expects 2 arguments".to_string());
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
        fold_if_all_literal(self_ref, &self.children, graph, |operands| {
            Some(typed_filtered(operands[0], operands[1]))
        })
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        let [tag_arg, v_arg] = self.children[..] else {
            state.finish(self_ref);
            return Ok(());
        };
        let tag = state.eval(tag_arg, ctx)?;
        if !state.is_finished(tag_arg) {
            return Ok(());
        }
        let v = state.eval(v_arg, ctx)?;
        if !state.is_finished(v_arg) {
            return Ok(());
        }
        state.setup_local_list(self_ref)?;
        if let Some(tag) = tag.as_ref().and_then(Value::as_string) {
            for elem in v.as_ref().map(to_elements).unwrap_or_default() {
                if type_tag_matches(tag, &elem) {
                    state.append_to_list(self_ref, elem)?;
                }
            }
        }
        state.finish(self_ref);
        Ok(())
    }
}

/// Which name-matching rule a [`NamedNode`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameTest {
    Exact,
    CaseInsensitive,
    Regex,
}

/// Cached compiled regex for a `namedRx`/`notNamedRx` node, bound lazily
/// on first touch and cached in the evaluation slot's scratch (nodes live
/// in a read-only, `Arc`-shared graph; see `GraphEvalState::initialize`).
struct CompiledPattern(Regex);

/// `named key v` / `namedi key v` / `namedRx pattern v`, and their
/// `notNamed…` negations: keeps (or drops) the elements of `v`'s stream
/// whose name matches.
#[derive(Debug, Clone)]
pub struct NamedNode {
    test: NameTest,
    negate: bool,
    children: Vec<NodeRef>,
}

impl NamedNode {
    pub fn named(children: Vec<NodeRef>) -> Self {
        Self {
            test: NameTest::Exact,
            negate: false,
            children,
        }
    }
    pub fn namedi(children: Vec<NodeRef>) -> Self {
        Self {
            test: NameTest::CaseInsensitive,
            negate: false,
            children,
        }
    }
    pub fn named_rx(children: Vec<NodeRef>) -> Self {
        Self {
            test: NameTest::Regex,
            negate: false,
            children,
        }
    }
    pub fn not_named(children: Vec<NodeRef>) -> Self {
        Self {
            test: NameTest::Exact,
            negate: true,
            children,
        }
    }
    pub fn not_namedi(children: Vec<NodeRef>) -> Self {
        Self {
            test: NameTest::CaseInsensitive,
            negate: true,
            children,
        }
    }
    pub fn not_named_rx(children: Vec<NodeRef>) -> Self {
        Self {
            test: NameTest::Regex,
            negate: true,
            children,
        }
    }

    fn name(&self) -> &'static str {
        match (self.test, self.negate) {
            (NameTest::Exact, false) => "named",
            (NameTest::CaseInsensitive, false) => "namedi",
            (NameTest::Regex, false) => "namedRx",
            (NameTest::Exact, true) => "notNamed",
            (NameTest::CaseInsensitive, true) => "notNamedi",
            (NameTest::Regex, true) => "notNamedRx",
        }
    }

    /// The pure filtering behind this name test, shared between
    /// incremental evaluation and constant-folding. Constant-folding
    /// compiles a `namedRx` pattern fresh rather than reusing a slot's
    /// cached regex, since there is no slot to cache it in at transform
    /// time.
    fn filtered(&self, key: Option<&Value>, v: Option<&Value>) -> Value {
        let Some(key) = key.and_then(Value::as_string) else {
            return Value::list(Vec::new());
        };
        let compiled_rx: Option<Regex> = if self.test == NameTest::Regex {
            let pattern = String::from_utf8_lossy(key).into_owned();
            Some(
                RegexBuilder::new(&pattern)
                    .build()
                    .unwrap_or_else(|_| Regex::new("$^").expect("empty-never-match regex")),
            )
        } else {
            None
        };
        let elements = v.map(to_elements).unwrap_or_default();
        let kept = elements
            .into_iter()
            .filter(|elem| {
                let elem_name = elem.name().unwrap_or(&[]);
                let hit = match self.test {
                    NameTest::Exact => elem_name == key,
                    NameTest::CaseInsensitive => elem_name.eq_ignore_ascii_case(key),
                    NameTest::Regex => compiled_rx
                        .as_ref()
                        .is_some_and(|re| re.is_match(&String::from_utf8_lossy(elem_name))),
                };
                hit != self.negate
            })
            .collect::<Vec<_>>();
        Value::list(kept)
    }
}

impl Node for NamedNode {
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
        fold_if_all_literal(self_ref, &self.children, graph, |operands| {
            Some(self.filtered(operands[0], operands[1]))
        })
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        let [key_arg, v_arg] = self.children[..] else {
            state.finish(self_ref);
            return Ok(());
        };
        let key = state.eval(key_arg, ctx)?;
        if !state.is_finished(key_arg) {
            return Ok(());
        }
        let v = state.eval(v_arg, ctx)?;
        if !state.is_finished(v_arg) {
            return Ok(());
        }
        let Some(key) = key.as_ref().and_then(Value::as_string) else {
            state.setup_local_list(self_ref)?;
            state.finish(self_ref);
            return Ok(());
        };

        // Compile (or reuse) the pattern once up front, caching it in this
        // node's scratch slot, then drop the borrow of `state` before the
        // loop below also needs to call `append_to_list` on it.
        let compiled_rx: Option<Regex> = if self.test == NameTest::Regex {
            let pattern = String::from_utf8_lossy(key).into_owned();
            let scratch = state.scratch(self_ref);
            let cached = scratch
                .get_or_insert_with(|| {
                    let re = RegexBuilder::new(&pattern)
                        .build()
                        .unwrap_or_else(|_| Regex::new("$^").expect("empty-never-match regex"));
                    Box::new(CompiledPattern(re)) as Box<dyn Any>
                })
                .downcast_ref::<CompiledPattern>()
                .expect("scratch holds CompiledPattern");
            Some(cached.0.clone())
        } else {
            None
        };

        state.setup_local_list(self_ref)?;
        for elem in v.as_ref().map(to_elements).unwrap_or_default() {
            let elem_name = elem.name().unwrap_or(&[]);
            let hit = match self.test {
                NameTest::Exact => elem_name == key,
                NameTest::CaseInsensitive => elem_name.eq_ignore_ascii_case(key),
                NameTest::Regex => compiled_rx
                    .as_ref()
                    .is_some_and(|re| re.is_match(&String::from_utf8_lossy(elem_name))),
            };
            if hit != self.negate {
                state.append_to_list(self_ref, elem)?;
            }
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
    fn eq_keeps_matching_elements() {
        let mut g = MergeGraph::new();
        let lit = g.insert(Box::new(LiteralNode::new(Some(Value::number(2)))));
        let list = g.insert(Box::new(LiteralNode::new(Some(Value::list(vec![
            Value::number(1),
            Value::number(2),
            Value::number(2),
        ])))));
        let eq_ref = g.add_root(Box::new(CompareNode::eq(vec![lit, list])));
        let graph = Arc::new(g);
        let mut state = predicate_eval::GraphEvalState::new(graph);
        let v = state.eval(eq_ref, &Ctx).unwrap().unwrap();
        assert_eq!(v.as_list().unwrap().len(), 2);
    }

    #[test]
    fn gt_drops_non_numeric_elements() {
        let mut g = MergeGraph::new();
        let threshold = g.insert(Box::new(LiteralNode::new(Some(Value::number(1)))));
        let list = g.insert(Box::new(LiteralNode::new(Some(Value::list(vec![
            Value::number(2),
            Value::string(*b"x"),
        ])))));
        let gt_ref = g.add_root(Box::new(CompareNode::gt(vec![threshold, list])));
        let graph = Arc::new(g);
        let mut state = predicate_eval::GraphEvalState::new(graph);
        let v = state.eval(gt_ref, &Ctx).unwrap().unwrap();
        assert_eq!(v.as_list().unwrap().len(), 1);
    }

    #[test]
    fn namedi_matches_case_insensitively() {
        let mut g = MergeGraph::new();
        let key = g.insert(Box::new(LiteralNode::new(Some(Value::string(*b"X")))));
        let list = g.insert(Box::new(LiteralNode::new(Some(Value::list(vec![
            Value::number(1).with_name("x"),
            Value::number(2).with_name("y"),
        ])))));
        let namedi_ref = g.add_root(Box::new(NamedNode::namedi(vec![key, list])));
        let graph = Arc::new(g);
        let mut state = predicate_eval::GraphEvalState::new(graph);
        let v = state.eval(namedi_ref, &Ctx).unwrap().unwrap();
        assert_eq!(v.as_list().unwrap().len(), 1);
    }

    #[test]
    fn not_named_negates_the_match() {
        let mut g = MergeGraph::new();
        let key = g.insert(Box::new(LiteralNode::new(Some(Value::string(*b"x")))));
        let list = g.insert(Box::new(LiteralNode::new(Some(Value::list(vec![
            Value::number(1).with_name("x"),
            Value::number(2).with_name("y"),
        ])))));
        let not_named_ref = g.add_root(Box::new(NamedNode::not_named(vec![key, list])));
        let graph = Arc::new(g);
        let mut state = predicate_eval::GraphEvalState::new(graph);
        let v = state.eval(not_named_ref, &Ctx).unwrap().unwrap();
        assert_eq!(v.as_list().unwrap().len(), 1);
        assert_eq!(v.as_list().unwrap()[0].name(), Some(&b"y"[..]));
    }
}
