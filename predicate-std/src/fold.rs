//! The shared constant-folding rewrite: "any call whose children are all
//! literals and whose semantics are pure" folds to its literal result
//! (spec §4.5's rewrite table, final row). Each pure call family below
//! supplies only the pure function over already-resolved operands;
//! this module handles recognising the all-literal case and splicing
//! the folded literal into the graph.

use predicate_ir::{MergeGraph, Node, NodeKind, NodeRef, Result, TransformOutcome, Value};

/// If every node in `children` is a literal, calls `compute` with their
/// values (`None` standing for the absent singular `:`) and replaces
/// `self_ref` with a literal node holding the result. Leaves the graph
/// untouched (and returns `Unchanged`) if any child isn't yet a literal.
pub(crate) fn fold_if_all_literal(
    self_ref: NodeRef,
    children: &[NodeRef],
    graph: &mut MergeGraph,
    compute: impl FnOnce(&[Option<&Value>]) -> Option<Value>,
) -> Result<TransformOutcome> {
    let mut operands = Vec::with_capacity(children.len());
    for &child in children {
        match graph.get(child)?.kind() {
            NodeKind::Literal(v) => operands.push(v),
            NodeKind::Call { .. } => return Ok(TransformOutcome::Unchanged),
        }
    }
    let folded = compute(&operands);
    let lit = graph.insert(Box::new(predicate_ir::LiteralNode::new(folded)));
    graph.replace(self_ref, lit)?;
    Ok(TransformOutcome::Changed)
}
