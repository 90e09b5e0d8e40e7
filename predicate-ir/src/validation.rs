//! Composable shape validation over a node's children (spec §4.3
//! "pre_transform"). Concrete [`crate::node::Node`] implementations in
//! `predicate-std` build their `pre_transform` bodies out of these
//! predicates rather than hand-rolling arity checks each time.

use crate::eval_context::Reporter;
use crate::merge_graph::MergeGraph;
use crate::node::{NodeKind, NodeRef};

/// Reports an error (and returns `false`) unless `node` has exactly
/// `expected` children.
pub fn require_arity(
    graph: &MergeGraph,
    node: NodeRef,
    call: &str,
    expected: usize,
    reporter: &mut Reporter,
) -> bool {
    let actual = graph.children_of(node).len();
    if actual != expected {
        reporter.error(
            Some(node),
            format!("`{call}` expects {expected} argument(s), got {actual}"),
        );
        false
    } else {
        true
    }
}

/// Reports an error (and returns `false`) unless `node` has at least
/// `min` children.
pub fn require_min_arity(
    graph: &MergeGraph,
    node: NodeRef,
    call: &str,
    min: usize,
    reporter: &mut Reporter,
) -> bool {
    let actual = graph.children_of(node).len();
    if actual < min {
        reporter.error(
            Some(node),
            format!("`{call}` expects at least {min} argument(s), got {actual}"),
        );
        false
    } else {
        true
    }
}

/// Reports an error (and returns `false`) unless `child` is a literal
/// node, as required by calls whose arguments must be compile-time
/// constants (e.g. a field name or regex pattern).
pub fn require_literal_child(
    graph: &MergeGraph,
    node: NodeRef,
    child: NodeRef,
    call: &str,
    reporter: &mut Reporter,
) -> bool {
    match graph.get(child) {
        Ok(n) => match n.kind() {
            NodeKind::Literal(_) => true,
            NodeKind::Call { .. } => {
                reporter.error(
                    Some(node),
                    format!("`{call}` requires a literal argument, found a call"),
                );
                false
            }
        },
        Err(e) => {
            reporter.error(Some(node), format!("`{call}`: {e}"));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::LiteralNode;
    use crate::value::Value;

    #[test]
    fn arity_check_reports_mismatch() {
        let mut g = MergeGraph::new();
        let n = g.add_root(Box::new(LiteralNode::new(Some(Value::number(1)))));
        let mut r = Reporter::new();
        assert!(!require_arity(&g, n, "foo", 2, &mut r));
        assert!(r.has_errors());
    }

    #[test]
    fn literal_child_check_passes_for_literal() {
        let mut g = MergeGraph::new();
        let lit = g.insert(Box::new(LiteralNode::new(Some(Value::number(1)))));
        let mut r = Reporter::new();
        assert!(require_literal_child(&g, lit, lit, "foo", &mut r));
        assert!(!r.has_errors());
    }
}
