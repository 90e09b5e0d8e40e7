//! Wires every standard call name to its constructor (spec §4.2 "Call
//! factory"). `register_stdlib` is the one function `predicate`'s engine
//! configuration calls; templates registered via `PredicateDefine` add to
//! the same factory afterwards through `CallFactory::register_template`
//! plus `template::make_template_call`.

use crate::boolean::{AggregateKind, AggregateNode, FalseNode, IfNode, NotNode, TrueNode};
use crate::development::{IdentityNode, PNode, SequenceNode};
use crate::filter::{CompareNode, NamedNode, TypedNode};
use crate::ironbee::{
    AskNode, FOperatorNode, FinishPhaseNode, OperatorNode, TransformationNode, VarNode,
    WaitPhaseNode,
};
use crate::list::{
    CatNode, FlattenNode, FocusNode, ListNode, PushNameNode, ScatterGatherNode, SelectNode,
    SetNameNode,
};
use crate::math::{BinaryOpNode, ReduceNode, UnaryOpNode};
use crate::predicate::{
    IsFinishedNode, IsHomogeneousNode, IsLiteralNode, IsLongerNode, IsSimpleNode,
};
use crate::string::{LengthNode, StringReplaceRxNode};
use crate::template::RefNode;
use predicate_ir::{CallFactory, Node, NodeRef};

/// Registers one `name` whose constructor can't fail (the common case: a
/// node type built directly from its children).
fn register_infallible(
    factory: &mut CallFactory,
    name: &'static str,
    ctor: impl Fn(Vec<NodeRef>) -> Box<dyn Node> + Send + Sync + 'static,
) {
    factory.register(name, Box::new(move |children| Ok(ctor(children))));
}

/// Populates `factory` with every call in the standard library (spec §4.7:
/// boolean, list, filter, math, string, development, predicate
/// introspection, IronBee integration; `ref` for template bodies). Template
/// names themselves (`define`d by configuration) are registered
/// separately, since each needs its own per-name constructor and a
/// `TemplateDef` — see `template::make_template_call`.
pub fn register_stdlib(factory: &mut CallFactory) {
    // Boolean.
    register_infallible(factory, "true", |_| Box::new(TrueNode));
    register_infallible(factory, "false", |_| Box::new(FalseNode));
    register_infallible(factory, "not", |c| Box::new(NotNode::new(c)));
    register_infallible(factory, "and", |c| {
        Box::new(AggregateNode::new(AggregateKind::And, c))
    });
    register_infallible(factory, "or", |c| {
        Box::new(AggregateNode::new(AggregateKind::Or, c))
    });
    register_infallible(factory, "andSC", |c| {
        Box::new(AggregateNode::new_short_circuit(AggregateKind::And, c))
    });
    register_infallible(factory, "orSC", |c| {
        Box::new(AggregateNode::new_short_circuit(AggregateKind::Or, c))
    });
    register_infallible(factory, "if", |c| Box::new(IfNode::new(c)));

    // List.
    register_infallible(factory, "setName", |c| Box::new(SetNameNode::new(c)));
    register_infallible(factory, "pushName", |c| Box::new(PushNameNode::new(c)));
    register_infallible(factory, "cat", |c| Box::new(CatNode::new(c)));
    register_infallible(factory, "list", |c| Box::new(ListNode::new(c)));
    register_infallible(factory, "first", |c| Box::new(SelectNode::first(c)));
    register_infallible(factory, "rest", |c| Box::new(SelectNode::rest(c)));
    register_infallible(factory, "nth", |c| Box::new(SelectNode::nth(c)));
    register_infallible(factory, "flatten", |c| Box::new(FlattenNode::new(c)));
    register_infallible(factory, "focus", |c| Box::new(FocusNode::new(c)));
    register_infallible(factory, "scatter", |c| Box::new(ScatterGatherNode::scatter(c)));
    register_infallible(factory, "gather", |c| Box::new(ScatterGatherNode::gather(c)));

    // Filter.
    register_infallible(factory, "eq", |c| Box::new(CompareNode::eq(c)));
    register_infallible(factory, "ne", |c| Box::new(CompareNode::ne(c)));
    register_infallible(factory, "lt", |c| Box::new(CompareNode::lt(c)));
    register_infallible(factory, "le", |c| Box::new(CompareNode::le(c)));
    register_infallible(factory, "gt", |c| Box::new(CompareNode::gt(c)));
    register_infallible(factory, "ge", |c| Box::new(CompareNode::ge(c)));
    register_infallible(factory, "typed", |c| Box::new(TypedNode::new(c)));
    register_infallible(factory, "named", |c| Box::new(NamedNode::named(c)));
    register_infallible(factory, "namedi", |c| Box::new(NamedNode::namedi(c)));
    register_infallible(factory, "namedRx", |c| Box::new(NamedNode::named_rx(c)));
    register_infallible(factory, "notNamed", |c| Box::new(NamedNode::not_named(c)));
    register_infallible(factory, "notNamedi", |c| Box::new(NamedNode::not_namedi(c)));
    register_infallible(factory, "notNamedRx", |c| Box::new(NamedNode::not_named_rx(c)));

    // Math.
    register_infallible(factory, "add", |c| Box::new(BinaryOpNode::add(c)));
    register_infallible(factory, "mult", |c| Box::new(BinaryOpNode::mult(c)));
    register_infallible(factory, "neg", |c| Box::new(UnaryOpNode::neg(c)));
    register_infallible(factory, "recip", |c| Box::new(UnaryOpNode::recip(c)));
    register_infallible(factory, "min", |c| Box::new(ReduceNode::min(c)));
    register_infallible(factory, "max", |c| Box::new(ReduceNode::max(c)));

    // String.
    register_infallible(factory, "stringReplaceRx", |c| {
        Box::new(StringReplaceRxNode::new(c))
    });
    register_infallible(factory, "length", |c| Box::new(LengthNode::new(c)));

    // Predicate introspection.
    register_infallible(factory, "isLonger", |c| Box::new(IsLongerNode::new(c)));
    register_infallible(factory, "isSimple", |c| Box::new(IsSimpleNode::new(c)));
    register_infallible(factory, "isFinished", |c| Box::new(IsFinishedNode::new(c)));
    register_infallible(factory, "isLiteral", |c| Box::new(IsLiteralNode::new(c)));
    register_infallible(factory, "isHomogeneous", |c| {
        Box::new(IsHomogeneousNode::new(c))
    });

    // Development.
    register_infallible(factory, "p", |c| Box::new(PNode::new(c)));
    register_infallible(factory, "identity", |c| Box::new(IdentityNode::new(c)));
    register_infallible(factory, "sequence", |c| Box::new(SequenceNode::new(c)));

    // IronBee integration.
    register_infallible(factory, "var", |c| Box::new(VarNode::new(c)));
    register_infallible(factory, "operator", |c| Box::new(OperatorNode::new(c)));
    register_infallible(factory, "foperator", |c| Box::new(FOperatorNode::new(c)));
    register_infallible(factory, "transformation", |c| {
        Box::new(TransformationNode::new(c))
    });
    register_infallible(factory, "waitPhase", |c| Box::new(WaitPhaseNode::new(c)));
    register_infallible(factory, "finishPhase", |c| Box::new(FinishPhaseNode::new(c)));
    register_infallible(factory, "ask", |c| Box::new(AskNode::new(c)));

    // Template: `ref` is a call like any other; `define`d template names
    // are registered by configuration loading, not here.
    register_infallible(factory, "ref", |c| Box::new(RefNode::new(c)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_standard_call_is_registered() {
        let mut factory = CallFactory::new();
        register_stdlib(&mut factory);
        for name in [
            "true", "false", "not", "and", "or", "andSC", "orSC", "if", "setName", "pushName",
            "cat", "list", "first", "rest", "nth", "flatten", "focus", "scatter", "gather", "eq",
            "ne", "lt", "le", "gt", "ge", "typed", "named", "namedi", "namedRx", "notNamed",
            "notNamedi", "notNamedRx", "add", "mult", "neg", "recip", "min", "max",
            "stringReplaceRx", "length", "isLonger", "isSimple", "isFinished", "isLiteral",
            "isHomogeneous", "p", "identity", "sequence", "var", "operator", "foperator",
            "transformation", "waitPhase", "finishPhase", "ask", "ref",
        ] {
            assert!(factory.is_registered(name), "{name} not registered");
        }
    }

    #[test]
    fn constructed_node_reports_its_requested_name() {
        let mut factory = CallFactory::new();
        register_stdlib(&mut factory);
        let node = factory.construct("add", Vec::new()).unwrap();
        assert!(matches!(
            node.kind(),
            predicate_ir::NodeKind::Call { name: "add", .. }
        ));
    }
}
