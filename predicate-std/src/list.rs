//! `setName`, `pushName`, `cat`, `list`, `first`/`rest`/`nth`, `flatten`,
//! `focus`, `scatter`/`gather` (spec §4.7 "List").

use crate::fold::fold_if_all_literal;
use predicate_ir::{
    CallFactory, EvalContext, LiteralNode, MergeGraph, Node, NodeKind, NodeRef, Reporter, Result,
    TransformOutcome, TxnContext, Value,
};
use std::any::Any;

/// A value's stream representation: a list's own elements, or the value
/// itself as a single-element stream.
fn to_elements(v: &Value) -> Vec<Value> {
    match v.as_list() {
        Some(items) => items.to_vec(),
        None => vec![v.clone()],
    }
}

/// Evaluates every child, returning `None` (suspending) if any isn't
/// finished yet this phase.
fn eval_all(
    children: &[NodeRef],
    state: &mut dyn EvalContext,
    ctx: &dyn TxnContext,
) -> Result<Option<Vec<Option<Value>>>> {
    let mut out = Vec::with_capacity(children.len());
    for &c in children {
        let v = state.eval(c, ctx)?;
        if !state.is_finished(c) {
            return Ok(None);
        }
        out.push(v);
    }
    Ok(Some(out))
}

/// `setName name v`: copies `v` with its name replaced by `name`'s string
/// value.
#[derive(Debug, Clone)]
pub struct SetNameNode {
    children: Vec<NodeRef>,
}

impl SetNameNode {
    /// Builds a `setName name v` node.
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl Node for SetNameNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "setName",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(setName {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.len() != 2 {
            reporter.error(
                None,
                format!("`setName` expects 2 arguments, got {}", self.children.len()),
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
            set_name_result(operands[0], operands[1])
        })
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        let [name_arg, value_arg] = self.children[..] else {
            state.finish(self_ref);
            return Ok(());
        };
        let Some(values) = eval_all(&[name_arg, value_arg], state, ctx)? else {
            return Ok(());
        };
        if let Some(result) = set_name_result(values[0].as_ref(), values[1].as_ref()) {
            state.alias(self_ref, result)?;
        }
        state.finish(self_ref);
        Ok(())
    }
}

fn set_name_result(name: Option<&Value>, value: Option<&Value>) -> Option<Value> {
    let name_bytes = name.and_then(Value::as_string).map(<[u8]>::to_vec).unwrap_or_default();
    value.map(|v| v.clone().with_name(name_bytes))
}

/// `pushName v`: pushes `v`'s own name down into each of its children,
/// recursively. Implemented over `Value`, not `Node` — it operates on an
/// already-evaluated value tree, not the call graph.
fn push_name(v: Value) -> Value {
    let name = v.name().map(|n| n.to_vec());
    match v.as_list() {
        Some(items) => {
            let items: Vec<Value> = items
                .iter()
                .cloned()
                .map(|item| {
                    let item = push_name(item);
                    match &name {
                        Some(n) => item.with_name(n.clone()),
                        None => item,
                    }
                })
                .collect();
            let list = Value::list(items);
            match name {
                Some(n) => list.with_name(n),
                None => list,
            }
        }
        None => v,
    }
}

#[derive(Debug, Clone)]
pub struct PushNameNode {
    children: Vec<NodeRef>,
}

impl PushNameNode {
    /// Builds a `pushName v` node.
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl Node for PushNameNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "pushName",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(pushName {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.len() != 1 {
            reporter.error(None, "`pushName` expects 1 argument".to_string());
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
        fold_if_all_literal(self_ref, &self.children, graph, |operands| {
            operands[0].cloned().map(push_name)
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
        if let Some(v) = v {
            state.alias(self_ref, push_name(v))?;
        }
        state.finish(self_ref);
        Ok(())
    }
}

/// `cat x1…xn`: concatenates the stream representation of every argument,
/// incrementally — each evaluation copies over whatever new elements an
/// argument has produced since the last one, rather than waiting for every
/// argument to finish before emitting anything.
#[derive(Debug, Clone)]
pub struct CatNode {
    children: Vec<NodeRef>,
}

impl CatNode {
    /// Builds a `cat` node over one or more children.
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl Node for CatNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "cat",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(cat {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.is_empty() {
            reporter.error(None, "`cat` requires at least 1 argument".to_string());
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
        // Splice a nested `cat` child's own children directly into this
        // node's child list.
        let mut new_children = Vec::with_capacity(self.children.len());
        let mut changed = false;
        for &c in &self.children {
            if let NodeKind::Call { name: "cat", .. } = graph.get(c)?.kind() {
                new_children.extend(graph.children_of(c));
                changed = true;
            } else {
                new_children.push(c);
            }
        }
        if changed {
            graph.set_children(self_ref, new_children)?;
            return Ok(TransformOutcome::Changed);
        }
        fold_if_all_literal(self_ref, &self.children, graph, |operands| {
            let mut out = Vec::new();
            for operand in operands {
                out.extend(operand.map(to_elements).unwrap_or_default());
            }
            Some(Value::list(out))
        })
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        if state.scratch(self_ref).is_none() {
            state.setup_local_list(self_ref)?;
            *state.scratch(self_ref) = Some(Box::new(vec![0usize; self.children.len()]) as Box<dyn Any>);
        }
        // Every child gets to advance on every call, but a later child's
        // elements only join `cat`'s own list once every earlier child has
        // fully finished — otherwise an earlier child's later elements
        // would need to land *before* already-copied elements from a
        // later one, which an append-only list can't do.
        let mut prefix_finished = true;
        for (i, &c) in self.children.iter().enumerate() {
            let v = state.eval(c, ctx)?;
            if prefix_finished {
                let elements = v.as_ref().map(to_elements).unwrap_or_default();
                let copied = state
                    .scratch(self_ref)
                    .as_mut()
                    .unwrap()
                    .downcast_mut::<Vec<usize>>()
                    .expect("scratch holds per-child copy counts")[i];
                for elem in elements.iter().skip(copied).cloned() {
                    state.append_to_list(self_ref, elem)?;
                }
                state
                    .scratch(self_ref)
                    .as_mut()
                    .unwrap()
                    .downcast_mut::<Vec<usize>>()
                    .expect("scratch holds per-child copy counts")[i] = elements.len();
            }
            if !state.is_finished(c) {
                prefix_finished = false;
            }
        }
        if self.children.iter().all(|&c| state.is_finished(c)) {
            state.finish(self_ref);
        }
        Ok(())
    }
}

/// `list x1…xn`: an exact list with one element per argument.
#[derive(Debug, Clone)]
pub struct ListNode {
    children: Vec<NodeRef>,
}

impl ListNode {
    /// Builds a `list` node over one or more children.
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl Node for ListNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "list",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(list {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.is_empty() {
            reporter.error(None, "`list` requires at least 1 argument".to_string());
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
        fold_if_all_literal(self_ref, &self.children, graph, |operands| {
            Some(Value::list(
                operands
                    .iter()
                    .map(|v| v.cloned().unwrap_or_else(Value::empty_list))
                    .collect::<Vec<_>>(),
            ))
        })
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        let Some(values) = eval_all(&self.children, state, ctx)? else {
            return Ok(());
        };
        state.setup_local_list(self_ref)?;
        for v in values {
            state.append_to_list(self_ref, v.unwrap_or_else(Value::empty_list))?;
        }
        state.finish(self_ref);
        Ok(())
    }
}

/// Which stream-positional selector a [`SelectNode`] implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selector {
    First,
    Rest,
    Nth,
}

/// `first v` / `rest v` / `nth k v`: stream head/tail/1-based index.
/// Out-of-range indices produce the absent singular, matching `rest`'s
/// never-erroring contract.
#[derive(Debug, Clone)]
pub struct SelectNode {
    selector: Selector,
    children: Vec<NodeRef>,
}

impl SelectNode {
    /// `first v`.
    pub fn first(children: Vec<NodeRef>) -> Self {
        Self {
            selector: Selector::First,
            children,
        }
    }
    /// `rest v`.
    pub fn rest(children: Vec<NodeRef>) -> Self {
        Self {
            selector: Selector::Rest,
            children,
        }
    }
    /// `nth k v`.
    pub fn nth(children: Vec<NodeRef>) -> Self {
        Self {
            selector: Selector::Nth,
            children,
        }
    }

    fn name(&self) -> &'static str {
        match self.selector {
            Selector::First => "first",
            Selector::Rest => "rest",
            Selector::Nth => "nth",
        }
    }

    /// The pure computation behind this selector, shared between
    /// incremental evaluation and constant-folding.
    fn selected(&self, values: &[Option<&Value>]) -> Option<Value> {
        let (index, subject) = match self.selector {
            Selector::Nth => {
                let k = values[0].and_then(Value::as_number).unwrap_or(0);
                (k, values[1])
            }
            Selector::First => (1, values[0]),
            Selector::Rest => (0, values[0]),
        };
        let elements = subject.map(to_elements).unwrap_or_default();
        if self.selector == Selector::Rest {
            Some(Value::list(elements.into_iter().skip(1).collect::<Vec<_>>()))
        } else if index >= 1 {
            elements.get((index - 1) as usize).cloned()
        } else {
            None
        }
    }
}

impl Node for SelectNode {
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
        let expected = if self.selector == Selector::Nth { 2 } else { 1 };
        if self.children.len() != expected {
            reporter.error(
                None,
                format!(
                    "`{}` expects {} argument(s), got {}",
                    self.name(),
                    expected,
                    self.children.len()
                ),
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
        let expected = if self.selector == Selector::Nth { 2 } else { 1 };
        if self.children.len() != expected {
            return Ok(TransformOutcome::Unchanged);
        }
        fold_if_all_literal(self_ref, &self.children, graph, |operands| self.selected(operands))
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        let Some(values) = eval_all(&self.children, state, ctx)? else {
            return Ok(());
        };
        let refs: Vec<Option<&Value>> = values.iter().map(Option::as_ref).collect();
        if self.selector == Selector::Rest {
            state.setup_local_list(self_ref)?;
            if let Some(result) = self.selected(&refs) {
                for e in result.as_list().unwrap_or(&[]).iter().cloned() {
                    state.append_to_list(self_ref, e)?;
                }
            }
        } else if let Some(v) = self.selected(&refs) {
            state.alias(self_ref, v)?;
        }
        state.finish(self_ref);
        Ok(())
    }
}

/// `flatten v`: one level of nested-list flattening.
#[derive(Debug, Clone)]
pub struct FlattenNode {
    children: Vec<NodeRef>,
}

impl FlattenNode {
    /// Builds a `flatten v` node.
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl Node for FlattenNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "flatten",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(flatten {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.len() != 1 {
            reporter.error(None, "`flatten` expects 1 argument".to_string());
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
        fold_if_all_literal(self_ref, &self.children, graph, |operands| {
            Some(flatten_result(operands[0]))
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
        state.setup_local_list(self_ref)?;
        for inner in flatten_result(v.as_ref()).as_list().unwrap_or(&[]).iter().cloned() {
            state.append_to_list(self_ref, inner)?;
        }
        state.finish(self_ref);
        Ok(())
    }
}

fn flatten_result(v: Option<&Value>) -> Value {
    let mut out = Vec::new();
    if let Some(v) = v {
        for elem in to_elements(v) {
            out.extend(to_elements(&elem));
        }
    }
    Value::list(out)
}

/// `focus key v`: for each element of `v`'s stream, extract its
/// sub-element named `key`, preserving the element's own name.
#[derive(Debug, Clone)]
pub struct FocusNode {
    children: Vec<NodeRef>,
}

impl FocusNode {
    /// Builds a `focus key v` node.
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl Node for FocusNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "focus",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(focus {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.len() != 2 {
            reporter.error(None, "`focus` expects 2 arguments".to_string());
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
            Some(focus_result(operands[0], operands[1]))
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
        let Some(values) = eval_all(&[key_arg, v_arg], state, ctx)? else {
            return Ok(());
        };
        state.setup_local_list(self_ref)?;
        for named in focus_result(values[0].as_ref(), values[1].as_ref())
            .as_list()
            .unwrap_or(&[])
            .iter()
            .cloned()
        {
            state.append_to_list(self_ref, named)?;
        }
        state.finish(self_ref);
        Ok(())
    }
}

fn focus_result(key: Option<&Value>, v: Option<&Value>) -> Value {
    let key = key.and_then(Value::as_string).unwrap_or(&[]).to_vec();
    let elements = v.map(to_elements).unwrap_or_default();
    let mut out = Vec::new();
    for elem in elements {
        if let Some(sub) = elem
            .as_list()
            .and_then(|items| items.iter().find(|i| i.name() == Some(key.as_slice())))
        {
            let named = match elem.name() {
                Some(n) => sub.clone().with_name(n.to_vec()),
                None => sub.clone().unnamed(),
            };
            out.push(named);
        }
    }
    Value::list(out)
}

/// Which direction a [`ScatterGatherNode`] converts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScatterGather {
    Scatter,
    Gather,
}

/// `scatter v` / `gather v`: invert between "a list of named values" and
/// "a single list value containing that list".
#[derive(Debug, Clone)]
pub struct ScatterGatherNode {
    mode: ScatterGather,
    children: Vec<NodeRef>,
}

impl ScatterGatherNode {
    /// `scatter v`.
    pub fn scatter(children: Vec<NodeRef>) -> Self {
        Self {
            mode: ScatterGather::Scatter,
            children,
        }
    }
    /// `gather v`.
    pub fn gather(children: Vec<NodeRef>) -> Self {
        Self {
            mode: ScatterGather::Gather,
            children,
        }
    }
    fn name(&self) -> &'static str {
        match self.mode {
            ScatterGather::Scatter => "scatter",
            ScatterGather::Gather => "gather",
        }
    }

    /// The pure computation behind `scatter`/`gather`, shared between
    /// incremental evaluation and constant-folding.
    fn converted(&self, v: Option<&Value>) -> Value {
        match self.mode {
            ScatterGather::Gather => Value::list(v.map(to_elements).unwrap_or_default()),
            ScatterGather::Scatter => {
                let mut out = Vec::new();
                if let Some(v) = v {
                    out.extend(to_elements(v));
                }
                Value::list(out)
            }
        }
    }
}

impl Node for ScatterGatherNode {
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
        fold_if_all_literal(self_ref, &self.children, graph, |operands| {
            Some(self.converted(operands[0]))
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
        let result = self.converted(v.as_ref());
        match self.mode {
            ScatterGather::Gather => {
                state.alias(self_ref, result)?;
            }
            ScatterGather::Scatter => {
                state.setup_local_list(self_ref)?;
                for elem in result.as_list().unwrap_or(&[]).iter().cloned() {
                    state.append_to_list(self_ref, elem)?;
                }
            }
        }
        state.finish(self_ref);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use predicate_ir::Phase;
    use std::sync::Arc;

    struct Ctx;
    impl TxnContext for Ctx {
        fn phase(&self) -> Phase {
            Phase::Request
        }
    }

    #[test]
    fn cat_concatenates_scalars_and_lists() {
        let mut g = MergeGraph::new();
        let a = g.insert(Box::new(LiteralNode::new(Some(Value::number(1)))));
        let b = g.insert(Box::new(LiteralNode::new(Some(Value::list(vec![
            Value::number(2),
            Value::number(3),
        ])))));
        let cat_ref = g.add_root(Box::new(CatNode::new(vec![a, b])));
        let graph = Arc::new(g);
        let mut state = predicate_eval::GraphEvalState::new(graph);
        let v = state.eval(cat_ref, &Ctx).unwrap().unwrap();
        assert_eq!(v.as_list().unwrap().len(), 3);
    }

    #[test]
    fn cat_streams_each_argument_incrementally_instead_of_waiting_for_every_child() {
        use crate::development::SequenceNode;

        let mut g = MergeGraph::new();
        let a_start = g.insert(Box::new(LiteralNode::new(Some(Value::number(0)))));
        let a_stop = g.insert(Box::new(LiteralNode::new(Some(Value::number(1)))));
        let seq_a = g.add_root(Box::new(SequenceNode::new(vec![a_start, a_stop])));
        let b_start = g.insert(Box::new(LiteralNode::new(Some(Value::number(0)))));
        let b_stop = g.insert(Box::new(LiteralNode::new(Some(Value::number(3)))));
        let seq_b = g.add_root(Box::new(SequenceNode::new(vec![b_start, b_stop])));
        let cat_ref = g.add_root(Box::new(CatNode::new(vec![seq_a, seq_b])));
        let graph = Arc::new(g);
        let mut state = predicate_eval::GraphEvalState::new(graph);

        let snapshots: Vec<Vec<i64>> = (0..4)
            .map(|_| {
                state.eval(cat_ref, &Ctx).unwrap();
                state
                    .value(cat_ref)
                    .and_then(|v| v.as_list())
                    .map(|l| l.iter().filter_map(Value::as_number).collect())
                    .unwrap_or_default()
            })
            .collect();
        // `seq_a` (0..=1) finishes on the second evaluation; `seq_b`
        // (0..=3) keeps growing through the fourth. `cat` withholds
        // `seq_b`'s elements until `seq_a` is fully finished (so an
        // append-only list never has to insert `seq_a`'s later elements
        // ahead of already-copied `seq_b` ones), then flushes `seq_b`'s
        // whole backlog in one step and keeps streaming it afterward.
        assert_eq!(
            snapshots,
            vec![
                vec![0],
                vec![0, 1, 0, 1],
                vec![0, 1, 0, 1, 2],
                vec![0, 1, 0, 1, 2, 3],
            ]
        );
        assert!(state.is_finished(cat_ref));
    }

    #[test]
    fn first_and_rest_split_the_stream() {
        let mut g = MergeGraph::new();
        let list = g.insert(Box::new(LiteralNode::new(Some(Value::list(vec![
            Value::number(1),
            Value::number(2),
            Value::number(3),
        ])))));
        let first_ref = g.add_root(Box::new(SelectNode::first(vec![list])));
        let rest_ref = g.add_root(Box::new(SelectNode::rest(vec![list])));
        let graph = Arc::new(g);
        let mut state = predicate_eval::GraphEvalState::new(graph);
        let first_v = state.eval(first_ref, &Ctx).unwrap().unwrap();
        assert_eq!(first_v.as_number(), Some(1));
        let rest_v = state.eval(rest_ref, &Ctx).unwrap().unwrap();
        assert_eq!(rest_v.as_list().unwrap().len(), 2);
    }

    #[test]
    fn nth_out_of_range_is_absent() {
        let mut g = MergeGraph::new();
        let list = g.insert(Box::new(LiteralNode::new(Some(Value::list(vec![
            Value::number(1),
        ])))));
        let k = g.insert(Box::new(LiteralNode::new(Some(Value::number(5)))));
        let nth_ref = g.add_root(Box::new(SelectNode::nth(vec![k, list])));
        let graph = Arc::new(g);
        let mut state = predicate_eval::GraphEvalState::new(graph);
        let v = state.eval(nth_ref, &Ctx).unwrap();
        assert!(v.is_none());
    }

    #[test]
    fn scatter_then_gather_round_trips_a_list() {
        let mut g = MergeGraph::new();
        let list = g.insert(Box::new(LiteralNode::new(Some(Value::list(vec![
            Value::number(1),
            Value::number(2),
        ])))));
        let gathered = g.add_root(Box::new(ScatterGatherNode::gather(vec![list])));
        let graph = Arc::new(g);
        let mut state = predicate_eval::GraphEvalState::new(graph);
        let v = state.eval(gathered, &Ctx).unwrap().unwrap();
        assert_eq!(v.as_list().unwrap().len(), 1);
        assert_eq!(v.as_list().unwrap()[0].as_list().unwrap().len(), 2);
    }
}
