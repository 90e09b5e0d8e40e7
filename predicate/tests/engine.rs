//! End-to-end coverage across the whole workspace: parsing, transform,
//! and incremental evaluation driven together the way a real embedding
//! would, plus the quantified invariants each crate's unit tests only
//! check in isolation.

use predicate::config;
use predicate::{EngineConfig, Host};
use predicate_ir::parser::{parse_root, Cursor};
use predicate_ir::{
    is_truthy, CallFactory, EvalContext, MergeGraph, NodeRef, Phase, Reporter, TxnContext, Value,
    VariableStore,
};
use predicate_std::register_stdlib;
use std::path::Path;
use std::sync::Arc;

struct Ctx(Phase);
impl TxnContext for Ctx {
    fn phase(&self) -> Phase {
        self.0
    }
}

/// Parses `text` into a fresh graph without running the transform
/// pipeline, for assertions about raw `eval_calculate` semantics that
/// transform-time folding would otherwise short-circuit.
fn parse_untransformed(text: &str) -> (Arc<MergeGraph>, NodeRef) {
    let mut factory = CallFactory::new();
    register_stdlib(&mut factory);
    let mut graph = MergeGraph::new();
    let mut cursor = Cursor::start();
    let root = parse_root(text, &mut cursor, &factory, &mut graph).unwrap();
    graph.mark_root(root);
    (Arc::new(graph), root)
}

fn eval_once(graph: &Arc<MergeGraph>, root: NodeRef, phase: Phase) -> Option<Value> {
    let mut state = predicate_eval::GraphEvalState::new(Arc::clone(graph));
    state.eval(root, &Ctx(phase)).unwrap()
}

// ---------------------------------------------------------------------
// Quantified invariants (spec §8).
// ---------------------------------------------------------------------

#[test]
fn parse_round_trips_a_representative_sample() {
    let texts = [
        "42",
        "-3",
        "3.5",
        "'hello'",
        ":",
        "[]",
        "foo:42",
        "(eq 'a' 'b')",
        "(and (true) (false))",
        "(list 1 2 3)",
    ];
    for text in texts {
        let (graph, root) = parse_untransformed(text);
        assert_eq!(graph.node_to_s(root).unwrap(), text, "round-trip of `{text}`");
    }
}

#[test]
fn structural_sharing_merges_identical_subtrees() {
    let (graph, root) = parse_untransformed("(eq (cat 'a' 'b') (cat 'a' 'b'))");
    let children = graph.children_of(root);
    assert_eq!(children.len(), 2);
    assert_eq!(
        children[0], children[1],
        "two textually identical `cat` calls must merge into one node"
    );
}

#[test]
fn transform_reaches_a_fixed_point() {
    let mut factory = CallFactory::new();
    register_stdlib(&mut factory);
    let mut graph = MergeGraph::new();
    let mut cursor = Cursor::start();
    let root = parse_root("(not (not (not (false))))", &mut cursor, &factory, &mut graph).unwrap();
    graph.mark_root(root);

    let mut reporter = Reporter::new();
    predicate_ir::transform::transform_graph(&mut graph, &factory, &mut reporter).unwrap();

    let mut reporter = Reporter::new();
    let changed = graph.transform_pass(&factory, &mut reporter).unwrap();
    assert!(!changed, "a further pass after fixed point must report no change");
}

#[test]
fn demorgans_law_holds_across_truthy_and_falsy_operands() {
    let cases = [
        ("(true)", "(true)"),
        ("(true)", "(false)"),
        ("(false)", "(true)"),
        ("(false)", "(false)"),
        ("'nonempty'", "(false)"),
    ];
    for (a, b) in cases {
        let lhs_text = format!("(and {a} {b})");
        let rhs_text = format!("(not (or (not {a}) (not {b})))");

        let (lhs_graph, lhs_root) = parse_untransformed(&lhs_text);
        let (rhs_graph, rhs_root) = parse_untransformed(&rhs_text);

        let lhs = eval_once(&lhs_graph, lhs_root, Phase::None);
        let rhs = eval_once(&rhs_graph, rhs_root, Phase::None);

        assert_eq!(
            is_truthy(lhs.as_ref()),
            is_truthy(rhs.as_ref()),
            "DeMorgan mismatch for a={a} b={b}: lhs={lhs:?} rhs={rhs:?}"
        );
    }
}

#[test]
fn finishing_is_monotonic_and_append_only() {
    let (graph, root) = parse_untransformed("(sequence 0 4)");
    let mut state = predicate_eval::GraphEvalState::new(graph);

    let mut previous: Vec<Value> = Vec::new();
    let mut saw_finished = false;
    for _ in 0..6 {
        let v = state.eval(root, &Ctx(Phase::None)).unwrap();
        let current: Vec<Value> = v.and_then(|v| v.as_list().map(<[Value]>::to_vec)).unwrap_or_default();
        assert!(
            current.len() >= previous.len() && current[..previous.len()] == previous[..],
            "emitted values must only ever grow by appending"
        );
        if saw_finished {
            assert_eq!(current, previous, "no further change is allowed once finished");
        }
        saw_finished = state.is_finished(root);
        previous = current;
    }
    assert!(saw_finished);
}

#[test]
fn forwarding_is_not_idempotent_but_resolves_through() {
    use predicate_ir::LiteralNode;
    let mut g = MergeGraph::new();
    let a = g.add_root(Box::new(LiteralNode::new(None)));
    let b = g.add_root(Box::new(LiteralNode::new(Some(Value::number(9)))));
    let graph = Arc::new(g);
    let mut state = predicate_eval::GraphEvalState::new(graph);

    state.forward(a, b).unwrap();
    let err = state.forward(a, b);
    assert!(err.is_err(), "forwarding the same slot twice must fail");

    let via_a = state.eval(a, &Ctx(Phase::None)).unwrap();
    let via_b = state.eval(b, &Ctx(Phase::None)).unwrap();
    assert_eq!(via_a, via_b);
}

// ---------------------------------------------------------------------
// End-to-end scenarios (spec §8).
// ---------------------------------------------------------------------

#[test]
fn scenario_or_of_two_absent_branches_is_absent_but_truthy_branch_wins() {
    let (g1, r1) = parse_untransformed("(or '' [])");
    let truthy = eval_once(&g1, r1, Phase::None);
    assert!(is_truthy(truthy.as_ref()));

    let (g2, r2) = parse_untransformed("(or [] [])");
    let absent = eval_once(&g2, r2, Phase::None);
    assert!(absent.is_none(), "exhausting `or` with no decisive child must stay absent");
}

#[test]
fn scenario_double_negation_transforms_to_the_empty_list() {
    let mut factory = CallFactory::new();
    register_stdlib(&mut factory);
    let mut graph = MergeGraph::new();
    let mut cursor = Cursor::start();
    let root = parse_root("(not (not (false)))", &mut cursor, &factory, &mut graph).unwrap();
    graph.mark_root(root);

    let mut reporter = Reporter::new();
    predicate_ir::transform::transform_graph(&mut graph, &factory, &mut reporter).unwrap();
    let root = graph.find_transform(root);
    assert_eq!(graph.node_to_s(root).unwrap(), "[]");

    let mut reporter = Reporter::new();
    assert!(!graph.transform_pass(&factory, &mut reporter).unwrap());
}

struct ArgsStore;
impl VariableStore for ArgsStore {
    fn lookup(&self, key: &[u8]) -> Option<Value> {
        if key == b"ARGS" {
            Some(Value::list(vec![
                Value::string(*b"bar").with_name("x"),
                Value::string(*b"foo").with_name("y"),
            ]))
        } else {
            None
        }
    }
}

struct ArgsHost;
impl Host for ArgsHost {
    fn variables(&self) -> Option<&dyn VariableStore> {
        Some(&ArgsStore)
    }
}

#[test]
fn scenario_namedi_lookup_against_request_args() {
    let mut cfg = EngineConfig::new();
    cfg.add_rule(
        "mismatch",
        "(eq 'foo' (namedi 'x' (var 'ARGS')))",
        Phase::None,
        false,
    )
    .unwrap();
    cfg.add_rule(
        "match",
        "(eq 'bar' (namedi 'x' (var 'ARGS')))",
        Phase::None,
        false,
    )
    .unwrap();
    let engine = cfg.finish().unwrap();

    let mut txn = engine.begin_transaction();
    txn.advance_phase(Phase::Request, &ArgsHost).unwrap();

    assert!(txn.is_finished(&engine.rules()[0]));
    assert!(txn.is_finished(&engine.rules()[1]));
}

#[test]
fn scenario_string_replace_rx_swaps_captured_groups() {
    let (graph, root) =
        parse_untransformed("(stringReplaceRx '([a-z]+)=([a-z]+)' '$2=$1' 'a=b&c=d&e=f')");
    let v = eval_once(&graph, root, Phase::None).unwrap();
    assert_eq!(v.as_string(), Some("b=a&d=c&f=e".as_bytes()));
}

#[test]
fn scenario_template_call_expands_to_a_structurally_identical_var() {
    let mut cfg = EngineConfig::new();
    config::load_str(
        &mut cfg,
        Path::new("<test>"),
        "PredicateDefine foo name (var (ref 'name'))\n",
    )
    .unwrap();
    cfg.add_rule("via_template", "(foo 'REQUEST_URI')", Phase::None, false)
        .unwrap();
    cfg.add_rule("direct", "(var 'REQUEST_URI')", Phase::None, false)
        .unwrap();
    let engine = cfg.finish().unwrap();

    assert_eq!(engine.rules()[0].root, engine.rules()[1].root);
}

#[test]
fn scenario_sequence_and_cat_stream_incrementally() {
    let (seq_graph, seq_root) = parse_untransformed("(sequence 1 3)");
    let mut seq_state = predicate_eval::GraphEvalState::new(seq_graph);

    let mut sizes = Vec::new();
    let mut finished_at = None;
    for i in 0..4 {
        let v = seq_state.eval(seq_root, &Ctx(Phase::None)).unwrap();
        sizes.push(v.and_then(|v| v.as_list().map(<[Value]>::len)).unwrap_or(0));
        if seq_state.is_finished(seq_root) && finished_at.is_none() {
            finished_at = Some(i);
        }
    }
    assert_eq!(sizes, vec![1, 2, 3, 3]);
    assert_eq!(finished_at, Some(2));

    let (cat_graph, cat_root) = parse_untransformed("(cat (sequence 0 1) (sequence 0 3))");
    let mut cat_state = predicate_eval::GraphEvalState::new(cat_graph);
    let mut snapshots: Vec<Vec<i64>> = Vec::new();
    let mut cat_finished_at = None;
    for i in 0..4 {
        cat_state.eval(cat_root, &Ctx(Phase::None)).unwrap();
        let elements: Vec<i64> = cat_state
            .value(cat_root)
            .and_then(|v| v.as_list())
            .map(|l| l.iter().filter_map(Value::as_number).collect())
            .unwrap_or_default();
        snapshots.push(elements);
        if cat_state.is_finished(cat_root) && cat_finished_at.is_none() {
            cat_finished_at = Some(i);
        }
    }
    assert_eq!(
        snapshots,
        vec![
            vec![0],
            vec![0, 1, 0, 1],
            vec![0, 1, 0, 1, 2],
            vec![0, 1, 0, 1, 2, 3],
        ]
    );
    assert_eq!(cat_finished_at, Some(3));
}
