//! `stringReplaceRx`, `length` (spec §4.7 "String").

use crate::fold::fold_if_all_literal;
use predicate_ir::{
    CallFactory, EvalContext, MergeGraph, Node, NodeKind, NodeRef, Reporter, Result,
    TransformOutcome, TxnContext, Value,
};
use regex::{Captures, Regex};
use std::any::Any;

/// Cached compiled regex for a `stringReplaceRx` node, bound lazily on
/// first touch and cached in the evaluation slot's scratch.
struct CompiledPattern(Regex);

/// Expands `$n` (capture group `n`, `0` = whole match) and `\c` (literal
/// `c`) in a replacement template against one match's captures, per the
/// POSIX-extended replacement contract `stringReplaceRx` exposes.
fn expand_replacement(replacement: &str, caps: &Captures) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            '$' => {
                let mut digits = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        digits.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if digits.is_empty() {
                    out.push('$');
                } else if let Ok(n) = digits.parse::<usize>() {
                    if let Some(m) = caps.get(n) {
                        out.push_str(m.as_str());
                    }
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn apply_replace(compiled: &Regex, replacement: &str, subject: &str) -> Value {
    let result = compiled
        .replace_all(subject, |caps: &Captures| expand_replacement(replacement, caps))
        .into_owned();
    Value::string(result.into_bytes())
}

/// The pure computation behind `stringReplaceRx`, shared between
/// incremental evaluation and constant-folding. Constant-folding compiles
/// the pattern fresh rather than reusing a slot's cached regex, since
/// there is no slot to cache it in at transform time.
fn string_replace_result(
    pattern: Option<&Value>,
    replacement: Option<&Value>,
    subject: Option<&Value>,
) -> Option<Value> {
    let (pattern, replacement, subject) = (pattern?, replacement?, subject?);
    let (pattern_bytes, replacement_bytes, subject_bytes) =
        (pattern.as_string()?, replacement.as_string()?, subject.as_string()?);
    let pattern_str = String::from_utf8_lossy(pattern_bytes).into_owned();
    let replacement_str = String::from_utf8_lossy(replacement_bytes).into_owned();
    let subject_str = String::from_utf8_lossy(subject_bytes).into_owned();
    let re = Regex::new(&pattern_str)
        .unwrap_or_else(|_| Regex::new("$^").expect("empty-never-match regex"));
    Some(apply_replace(&re, &replacement_str, &subject_str))
}

/// `stringReplaceRx pattern replacement subject`: replaces every match of
/// `pattern` in `subject` with `replacement`.
#[derive(Debug, Clone)]
pub struct StringReplaceRxNode {
    children: Vec<NodeRef>,
}

impl StringReplaceRxNode {
    /// Builds a `stringReplaceRx pattern replacement subject` node.
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl Node for StringReplaceRxNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "stringReplaceRx",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(stringReplaceRx {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.len() != 3 {
            reporter.error(None, "`stringReplaceRx` expects 3 arguments".to_string());
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
        if self.children.len() != 3 {
            return Ok(TransformOutcome::Unchanged);
        }
        fold_if_all_literal(self_ref, &self.children, graph, |operands| {
            string_replace_result(operands[0], operands[1], operands[2])
        })
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        let [pattern_arg, replacement_arg, subject_arg] = self.children[..] else {
            state.finish(self_ref);
            return Ok(());
        };
        let pattern = state.eval(pattern_arg, ctx)?;
        if !state.is_finished(pattern_arg) {
            return Ok(());
        }
        let replacement = state.eval(replacement_arg, ctx)?;
        if !state.is_finished(replacement_arg) {
            return Ok(());
        }
        let subject = state.eval(subject_arg, ctx)?;
        if !state.is_finished(subject_arg) {
            return Ok(());
        }

        if let (Some(pattern), Some(replacement), Some(subject)) =
            (&pattern, &replacement, &subject)
        {
            let (Some(pattern_bytes), Some(replacement_bytes), Some(subject_bytes)) = (
                pattern.as_string(),
                replacement.as_string(),
                subject.as_string(),
            ) else {
                state.finish(self_ref);
                return Ok(());
            };
            let pattern_str = String::from_utf8_lossy(pattern_bytes).into_owned();
            let replacement_str = String::from_utf8_lossy(replacement_bytes).into_owned();
            let subject_str = String::from_utf8_lossy(subject_bytes).into_owned();

            let scratch = state.scratch(self_ref);
            let compiled = scratch
                .get_or_insert_with(|| {
                    let re = Regex::new(&pattern_str)
                        .unwrap_or_else(|_| Regex::new("$^").expect("empty-never-match regex"));
                    Box::new(CompiledPattern(re)) as Box<dyn Any>
                })
                .downcast_ref::<CompiledPattern>()
                .expect("scratch holds CompiledPattern");

            let result = compiled
                .0
                .replace_all(&subject_str, |caps: &Captures| {
                    expand_replacement(&replacement_str, caps)
                })
                .into_owned();
            state.alias(self_ref, Value::string(result.into_bytes()))?;
        }
        state.finish(self_ref);
        Ok(())
    }
}

/// `length v`: byte length of `v`'s canonical textual payload; applied
/// element-wise across a list.
#[derive(Debug, Clone)]
pub struct LengthNode {
    children: Vec<NodeRef>,
}

impl LengthNode {
    /// Builds a `length v` node.
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl Node for LengthNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "length",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(length {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.len() != 1 {
            reporter.error(None, "`length` expects 1 argument".to_string());
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
            length_result(operands[0])
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
        if let Some(result) = length_result(v.as_ref()) {
            state.alias(self_ref, result)?;
        }
        state.finish(self_ref);
        Ok(())
    }
}

fn length_result(v: Option<&Value>) -> Option<Value> {
    let v = v?;
    Some(match v.as_list() {
        Some(items) => Value::list(
            items
                .iter()
                .map(|i| Value::number(i.byte_len() as i64))
                .collect::<Vec<_>>(),
        ),
        None => Value::number(v.byte_len() as i64),
    })
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
    fn string_replace_rx_swaps_capture_groups() {
        let mut g = MergeGraph::new();
        let pattern = g.insert(Box::new(LiteralNode::new(Some(Value::string(
            *b"([a-z]+)=([a-z]+)",
        )))));
        let replacement = g.insert(Box::new(LiteralNode::new(Some(Value::string(*b"$2=$1")))));
        let subject = g.insert(Box::new(LiteralNode::new(Some(Value::string(
            *b"a=b&c=d&e=f",
        )))));
        let replace_ref =
            g.add_root(Box::new(StringReplaceRxNode::new(vec![pattern, replacement, subject])));
        let graph = Arc::new(g);
        let mut state = predicate_eval::GraphEvalState::new(graph);
        let v = state.eval(replace_ref, &Ctx).unwrap().unwrap();
        assert_eq!(v.as_string(), Some(&b"b=a&d=c&f=e"[..]));
    }

    #[test]
    fn length_counts_bytes_elementwise() {
        let mut g = MergeGraph::new();
        let list = g.insert(Box::new(LiteralNode::new(Some(Value::list(vec![
            Value::string(*b"ab"),
            Value::string(*b"abc"),
        ])))));
        let len_ref = g.add_root(Box::new(LengthNode::new(vec![list])));
        let graph = Arc::new(g);
        let mut state = predicate_eval::GraphEvalState::new(graph);
        let v = state.eval(len_ref, &Ctx).unwrap().unwrap();
        let items = v.as_list().unwrap();
        assert_eq!(items[0].as_number(), Some(2));
        assert_eq!(items[1].as_number(), Some(3));
    }
}
