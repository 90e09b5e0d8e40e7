//! The universal DAG element (spec §3 "Node", §4.3 "Node contract").

use crate::call_factory::CallFactory;
use crate::error::Result;
use crate::eval_context::{EvalContext, EvalEnvironment, Reporter, TxnContext};
use crate::merge_graph::MergeGraph;
use crate::value::Value;
use std::fmt;

/// A stable reference to a node living inside one [`MergeGraph`]. Plain
/// index into the graph's dense node table — the "arena-indexed graph"
/// design spec §9 calls for.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct NodeRef(pub usize);

impl NodeRef {
    /// The raw slot index.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Distinguishes a literal node from a call node for structural-equality
/// and hashing purposes (spec §4.3 "Node invariants").
pub enum NodeKind<'a> {
    /// A literal carrying a fixed [`Value`], or `None` for the singular
    /// `:` literal.
    Literal(Option<&'a Value>),
    /// A call node: a name plus whether its children are order-sensitive
    /// for hashing purposes (spec §4.3: "ordered vs. unordered call nodes
    /// differ only in `hash`").
    Call { name: &'a str, ordered: bool },
}

/// Outcome of [`Node::transform`]: either the node was left alone, or it
/// asked the driver to keep iterating because it rewrote itself or its
/// child list (spec §4.5).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TransformOutcome {
    /// No rewrite was made.
    Unchanged,
    /// The node (or its children) changed; another pass is required.
    Changed,
}

impl TransformOutcome {
    /// True if a rewrite happened.
    pub fn changed(self) -> bool {
        matches!(self, TransformOutcome::Changed)
    }
}

/// The call contract every concrete node type implements (spec §4.3, §9
/// "Polymorphism across call nodes").
///
/// All methods other than [`Node::kind`], [`Node::children`],
/// [`Node::render`], [`Node::replace_children`] and
/// [`Node::eval_calculate`] have a default no-op implementation, since most
/// concrete node types only override the one or two stages relevant to
/// their semantics (this mirrors how few call types in the standard
/// library actually need a `transform` override at all).
pub trait Node: fmt::Debug {
    /// This node's ordered list of children. Literal nodes return `&[]`.
    fn children(&self) -> &[NodeRef];

    /// Whether this is a literal or call node, and (for call nodes)
    /// whether argument order is semantically significant.
    fn kind(&self) -> NodeKind<'_>;

    /// Renders this node's own textual form given its children's
    /// already-rendered text, e.g. a call node renders
    /// `(name child_strs…)`. `to_s()` in spec §4.3 is the whole-tree
    /// composition of this, done by [`MergeGraph::node_to_s`].
    fn render(&self, child_strs: &[String]) -> String;

    /// In-place replacement of this node's child list, used by
    /// [`MergeGraph::add`]/[`MergeGraph::remove`] and by `transform`
    /// implementations that mutate their own children rather than
    /// replacing themselves wholesale.
    fn replace_children(&mut self, children: Vec<NodeRef>);

    /// Validates shape (arity, child kinds) before the first transform
    /// pass. Defaults to doing nothing.
    fn pre_transform(&self, _reporter: &mut Reporter) -> Result<()> {
        Ok(())
    }

    /// Attempt one rewrite step against the shared graph. Implementations
    /// that want to replace themselves call
    /// `graph.replace(self_ref, new_node)`; implementations that want to
    /// edit their own children call `graph.add`/`graph.remove`. Defaults to
    /// reporting no change.
    fn transform(
        &self,
        _self_ref: NodeRef,
        _graph: &mut MergeGraph,
        _factory: &CallFactory,
        _reporter: &mut Reporter,
    ) -> Result<TransformOutcome> {
        Ok(TransformOutcome::Unchanged)
    }

    /// Runs once a transformation pass has reached a fixed point, for
    /// final consistency checks. Defaults to doing nothing.
    fn post_transform(&self, _reporter: &mut Reporter) -> Result<()> {
        Ok(())
    }

    /// Binds this node to the per-transaction environment: resolves
    /// variable-store handles, compiles regexes, looks up operator
    /// instances. Runs once per transaction during the initializer pass.
    /// Defaults to doing nothing.
    fn pre_eval(&mut self, _env: &dyn EvalEnvironment, _reporter: &mut Reporter) -> Result<()> {
        Ok(())
    }

    /// Drives this node's evaluation forward for the current phase. Must
    /// call `state.eval(child, ctx)` to obtain (and, transitively,
    /// trigger) each child's value, and must leave the slot either
    /// unfinished (to be re-entered in a later phase) or finished via
    /// `state.finish()`/`state.finish_true()`/`state.finish_false()`.
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()>;
}

/// A literal node: a fixed value (or the singular `:`), produced by the
/// parser for string/number/float/list/named/empty-list literals.
#[derive(Debug, Clone)]
pub struct LiteralNode {
    value: Option<Value>,
}

impl LiteralNode {
    /// Construct a literal node carrying `value` (`None` for `:`).
    pub fn new(value: Option<Value>) -> Self {
        Self { value }
    }

    /// The literal's value, if not the singular `:`.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }
}

impl Node for LiteralNode {
    fn children(&self) -> &[NodeRef] {
        &[]
    }

    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Literal(self.value.as_ref())
    }

    fn render(&self, _child_strs: &[String]) -> String {
        match &self.value {
            Some(v) => v.to_string(),
            None => ":".to_string(),
        }
    }

    fn replace_children(&mut self, children: Vec<NodeRef>) {
        debug_assert!(
            children.is_empty(),
            "literal nodes never have children"
        );
    }

    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        _ctx: &dyn TxnContext,
    ) -> Result<()> {
        if let Some(v) = &self.value {
            state.alias(self_ref, v.clone())?;
        }
        state.finish(self_ref);
        Ok(())
    }
}
