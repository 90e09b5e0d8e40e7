//! Engine configuration and the per-transaction driving surface (spec §6
//! "External interfaces").
//!
//! [`EngineConfig`] is the mutable, configuration-time builder: it owns the
//! [`predicate_ir::MergeGraph`] being built up by rule parsing and
//! `PredicateDefine` template registration, runs the transform-to-fixed-
//! point pipeline, and yields an immutable, `Arc`-shared [`Engine`] once
//! validation settles. [`Engine::begin_transaction`] then drives one
//! [`predicate_eval::GraphEvalState`] per transaction against whatever
//! [`Host`] bindings the caller supplies — a concrete IronBee binding is
//! out of scope, so `Host` is the seam a real embedding fills in.

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};

use predicate_ir::{
    CallFactory, EvalContext, Logger, MergeGraph, NodeRef, Operator, Phase, ReportLevel, Reporter,
    Transformation, TxnContext, Value, VariableStore,
};
use std::collections::HashSet;
use std::sync::Arc;

/// One named rule's predicate, as registered via [`EngineConfig::add_rule`]:
/// its (transformed) root node, the phase it's bound to fire in (or
/// [`Phase::None`] for a phaseless rule), and whether `set_predicate_vars`
/// publishes its emitted values (spec §6 "set_predicate_vars").
#[derive(Clone, Debug)]
pub struct Rule {
    /// The id the rule was registered under (for trace/report lookups).
    pub id: String,
    /// This rule's predicate root.
    pub root: NodeRef,
    /// The phase this rule fires in, or `Phase::None` if phaseless.
    pub phase: Phase,
    /// Whether this rule publishes its emitted values via
    /// `set_predicate_vars`.
    pub set_predicate_vars: bool,
}

/// The host surfaces one transaction may bind to (spec §6). Every accessor
/// defaults to "not bound", mirroring [`TxnContext`]'s own defaults — a
/// host only overrides what it actually provides; nodes that need a
/// surface the host doesn't supply finish absent rather than erroring
/// (spec §7).
pub trait Host {
    /// The host's variable store, for `var`/`ask`.
    fn variables(&self) -> Option<&dyn VariableStore> {
        None
    }
    /// Look up a host operator by name, for `operator`/`foperator`.
    fn operator(&self, _name: &str) -> Option<&dyn Operator> {
        None
    }
    /// Look up a host transformation by name, for `transformation`.
    fn transformation(&self, _name: &str) -> Option<&dyn Transformation> {
        None
    }
    /// The host's logging sink.
    fn logger(&self) -> Option<&dyn Logger> {
        None
    }
}

/// Adapts a `&dyn Host` plus the phase currently being driven into the
/// `TxnContext` shape `eval_calculate` actually consumes.
struct BoundCtx<'a> {
    phase: Phase,
    host: &'a dyn Host,
}

impl TxnContext for BoundCtx<'_> {
    fn phase(&self) -> Phase {
        self.phase
    }
    fn variables(&self) -> Option<&dyn VariableStore> {
        self.host.variables()
    }
    fn operator(&self, name: &str) -> Option<&dyn Operator> {
        self.host.operator(name)
    }
    fn transformation(&self, name: &str) -> Option<&dyn Transformation> {
        self.host.transformation(name)
    }
    fn logger(&self) -> Option<&dyn Logger> {
        self.host.logger()
    }
}

/// One published `set_predicate_vars` value (spec §6): `PREDICATE_VALUE`
/// plus, when the source `Value` carried a name, `PREDICATE_VALUE_NAME`.
#[derive(Clone, Debug)]
pub struct PublishedValue {
    /// The rule that published this value.
    pub rule_id: String,
    /// `PREDICATE_VALUE_NAME`, if the emitted `Value` was named.
    pub name: Option<String>,
    /// `PREDICATE_VALUE`.
    pub value: Value,
}

/// The mutable, configuration-time builder (spec §6's configuration
/// loading phase). Not `Sync` — build it, call [`Self::finish`], then
/// share the resulting [`Engine`] instead.
pub struct EngineConfig {
    graph: MergeGraph,
    factory: CallFactory,
    rules: Vec<Rule>,
    strict: bool,
}

impl EngineConfig {
    /// A fresh configuration with the standard call library already
    /// registered (spec §4.7).
    pub fn new() -> Self {
        let mut factory = CallFactory::new();
        predicate_std::register_stdlib(&mut factory);
        Self {
            graph: MergeGraph::new(),
            factory,
            rules: Vec::new(),
            strict: false,
        }
    }

    /// Mutable access to the call factory, so configuration loading can
    /// register `PredicateDefine`d templates before parsing rule bodies
    /// that reference them.
    pub fn factory_mut(&mut self) -> &mut CallFactory {
        &mut self.factory
    }

    /// Whether a validation error anywhere in the graph aborts the whole
    /// configuration (`PredicateAssertValid`, spec §6) rather than just
    /// disabling the rules whose predicates it touches (the default).
    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    /// Parses `text` as one standalone s-expression and inserts it into
    /// the graph *without* registering it as a root — used for template
    /// bodies (`PredicateDefine`'s `BODY`), which are only reachable once
    /// copied into a call site by `TemplateCallNode::transform`.
    pub fn parse_root(&mut self, text: &str) -> Result<NodeRef> {
        let mut cursor = predicate_ir::parser::Cursor::start();
        let node =
            predicate_ir::parser::parse_root(text, &mut cursor, &self.factory, &mut self.graph)?;
        Ok(node)
    }

    /// Parses `text` as one rule-condition form, registers its root as a
    /// graph root, and records it under `id`/`phase`/`set_predicate_vars`.
    pub fn add_rule(
        &mut self,
        id: impl Into<String>,
        text: &str,
        phase: Phase,
        set_predicate_vars: bool,
    ) -> Result<NodeRef> {
        let root = self.parse_root(text)?;
        self.graph.mark_root(root);
        self.rules.push(Rule {
            id: id.into(),
            root,
            phase,
            set_predicate_vars,
        });
        Ok(root)
    }

    /// Runs the transform pipeline to a fixed point, then settles
    /// validation: in strict mode any reported error aborts with
    /// [`Error::Invalid`]; otherwise only the rules whose predicate
    /// subtree actually contains an errored node are dropped (spec §7:
    /// evaluation/validation errors fault the individual predicate, not
    /// the whole configuration), consuming this builder into an
    /// immutable, shareable [`Engine`].
    pub fn finish(mut self) -> Result<Engine> {
        let mut reporter = Reporter::new();
        predicate_ir::transform::transform_graph(&mut self.graph, &self.factory, &mut reporter)?;

        // A rule's root can itself be folded or expanded away during
        // transform (a literal-folding boolean, a template call) — walk
        // each one through to wherever `replace` actually left it.
        for rule in &mut self.rules {
            rule.root = self.graph.find_transform(rule.root);
        }

        if reporter.has_errors() && self.strict {
            let first = reporter
                .entries()
                .iter()
                .find(|e| e.level == ReportLevel::Error)
                .map(|e| e.message.clone())
                .unwrap_or_default();
            return Err(Error::Invalid {
                error_count: reporter.error_count(),
                first,
            });
        }

        let error_nodes: HashSet<NodeRef> = reporter
            .entries()
            .iter()
            .filter(|e| e.level == ReportLevel::Error)
            .filter_map(|e| e.node)
            .collect();

        let rules = if error_nodes.is_empty() {
            self.rules
        } else {
            let graph = &self.graph;
            self.rules
                .into_iter()
                .filter(|rule| {
                    let reachable =
                        predicate_ir::traversal::breadth_first_descent(graph, &[rule.root]);
                    let bad = reachable.iter().any(|n| error_nodes.contains(n));
                    if bad {
                        tracing::warn!(rule = %rule.id, "disabling rule: predicate failed validation");
                    }
                    !bad
                })
                .collect()
        };

        Ok(Engine {
            graph: Arc::new(self.graph),
            rules,
        })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The immutable, `Arc`-shared result of loading a configuration (spec §5
/// "configuration arena"): a transformed [`MergeGraph`] plus the rules
/// bound to it. Cheap to clone — the graph is behind an `Arc` — so many
/// transactions can evaluate against the same `Engine` concurrently
/// without locking (spec §5).
#[derive(Clone)]
pub struct Engine {
    graph: Arc<MergeGraph>,
    rules: Vec<Rule>,
}

impl Engine {
    /// The rules this engine was configured with, in registration order
    /// (rules a strict-less `finish()` disabled for validation errors are
    /// already excluded).
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Renders a node's transformed subtree back to its canonical textual
    /// form (`PredicateDebugReport`, spec §6).
    pub fn debug_report(&self, root: NodeRef) -> Result<String> {
        Ok(self.graph.node_to_s(root)?)
    }

    /// Starts a fresh transaction: a new [`predicate_eval::GraphEvalState`]
    /// over this engine's shared graph (spec §5: the per-transaction state
    /// is exclusively owned by whoever drives it, never shared).
    pub fn begin_transaction(&self) -> Transaction {
        Transaction {
            state: predicate_eval::GraphEvalState::new(Arc::clone(&self.graph)),
            rules: self.rules.clone(),
        }
    }
}

/// Per-transaction driving surface: advances every bound rule through one
/// phase at a time, collecting `set_predicate_vars` publications as each
/// rule's predicate produces values (spec §6).
pub struct Transaction {
    state: predicate_eval::GraphEvalState,
    rules: Vec<Rule>,
}

impl Transaction {
    /// Drives every rule whose phase is at-or-before `phase` (or
    /// phaseless) one step forward against `host`, returning the
    /// `set_predicate_vars` publications this step produced.
    pub fn advance_phase(&mut self, phase: Phase, host: &dyn Host) -> Result<Vec<PublishedValue>> {
        let ctx = BoundCtx { phase, host };
        let mut published = Vec::new();
        for i in 0..self.rules.len() {
            let (root, id, wants_publish, rule_phase) = {
                let r = &self.rules[i];
                (r.root, r.id.clone(), r.set_predicate_vars, r.phase)
            };
            if rule_phase != Phase::None && !rule_phase.at_or_before(phase) {
                continue;
            }
            let value = self.state.eval(root, &ctx)?;
            if wants_publish {
                if let Some(v) = value {
                    published.extend(publish_value(&id, &v));
                }
            }
        }
        Ok(published)
    }

    /// Whether `rule`'s predicate has finished (no further values will be
    /// produced this transaction).
    pub fn is_finished(&self, rule: &Rule) -> bool {
        self.state.is_finished(rule.root)
    }
}

/// Expands one emitted value into its `set_predicate_vars` publications: a
/// list publishes one entry per element (spec §6 "once per Value"),
/// anything else publishes itself once. See `DESIGN.md` for why a present
/// list is read as "a stream of emitted values" here rather than one
/// compound value.
fn publish_value(rule_id: &str, value: &Value) -> Vec<PublishedValue> {
    let elements: Vec<&Value> = match value.as_list() {
        Some(items) if !items.is_empty() => items.iter().collect(),
        _ => vec![value],
    };
    elements
        .into_iter()
        .map(|v| PublishedValue {
            rule_id: rule_id.to_string(),
            name: v.name().map(|n| String::from_utf8_lossy(n).into_owned()),
            value: v.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoHost;
    impl Host for NoHost {}

    #[test]
    fn literal_rule_finishes_with_its_literal_value() {
        let mut cfg = EngineConfig::new();
        cfg.add_rule("r1", "'hello'", Phase::None, false).unwrap();
        let engine = cfg.finish().unwrap();
        let mut txn = engine.begin_transaction();
        let published = txn.advance_phase(Phase::Request, &NoHost).unwrap();
        assert!(published.is_empty());
        assert!(txn.is_finished(&engine.rules()[0]));
    }

    #[test]
    fn set_predicate_vars_publishes_each_list_element() {
        let mut cfg = EngineConfig::new();
        cfg.add_rule("r1", "(list 1 2 3)", Phase::None, true)
            .unwrap();
        let engine = cfg.finish().unwrap();
        let mut txn = engine.begin_transaction();
        let published = txn.advance_phase(Phase::Request, &NoHost).unwrap();
        assert_eq!(published.len(), 3);
        assert_eq!(published[1].value.as_number(), Some(2));
    }

    #[test]
    fn phased_rule_waits_for_its_phase() {
        let mut cfg = EngineConfig::new();
        cfg.add_rule("late", "'x'", Phase::Response, false).unwrap();
        let engine = cfg.finish().unwrap();
        let mut txn = engine.begin_transaction();
        txn.advance_phase(Phase::RequestHeader, &NoHost).unwrap();
        assert!(!txn.is_finished(&engine.rules()[0]));
        txn.advance_phase(Phase::Response, &NoHost).unwrap();
        assert!(txn.is_finished(&engine.rules()[0]));
    }

    #[test]
    fn strict_mode_aborts_on_unknown_call_while_default_disables_the_rule() {
        // `ref` outside a template body is a transform-time error (spec
        // §4.7 "Template"), not a parse error, so it reaches `finish()`.
        let mut lenient = EngineConfig::new();
        lenient
            .add_rule("bad", "(ref 'x')", Phase::None, false)
            .unwrap();
        let engine = lenient.finish().unwrap();
        assert!(engine.rules().is_empty());

        let mut strict = EngineConfig::new();
        strict.set_strict(true);
        strict.add_rule("bad", "(ref 'x')", Phase::None, false).unwrap();
        assert!(matches!(strict.finish(), Err(Error::Invalid { .. })));
    }
}
