//! The per-node evaluation protocol (spec §4.6), the transaction phase
//! enumeration (spec §6 "Phase source"), the pre-evaluation binding
//! environment, and the validation/transform `Reporter` (spec §4.6, §6).
//!
//! The concrete evaluation state machine that *implements* [`EvalContext`]
//! lives in `predicate-eval`; this crate only defines the contract so that
//! [`crate::node::Node::eval_calculate`] can depend on it without a
//! circular crate dependency.

use crate::error::Result;
use crate::host::{Logger, Operator, Transformation, VariableStore};
use crate::node::NodeRef;
use crate::value::Value;
use std::any::Any;
use std::fmt;

/// A named checkpoint in a transaction's lifecycle (spec §6, GLOSSARY
/// "Phase"). `None` is the sentinel for "phaseless" — a phaseless rule's
/// predicate is expected to finish within a single `eval` call regardless
/// of which phase it runs in.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Phase {
    /// No phase association (phaseless rules).
    None,
    /// Request line and headers are available.
    RequestHeader,
    /// The full request, including body, is available.
    Request,
    /// Response line and headers are available.
    ResponseHeader,
    /// The full response, including body, is available.
    Response,
}

impl Phase {
    /// This phase's position in the chronological sequence
    /// request-header < request < response-header < response, or `None` if
    /// this phase doesn't participate in that ordering (the `NONE`
    /// sentinel).
    pub fn ordinal(self) -> Option<u8> {
        match self {
            Phase::None => None,
            Phase::RequestHeader => Some(0),
            Phase::Request => Some(1),
            Phase::ResponseHeader => Some(2),
            Phase::Response => Some(3),
        }
    }

    /// True if `self` has occurred at or before `other` in the
    /// chronological phase sequence.
    pub fn at_or_before(self, other: Phase) -> bool {
        matches!((self.ordinal(), other.ordinal()), (Some(a), Some(b)) if a <= b)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::None => "NONE",
            Phase::RequestHeader => "REQUEST_HEADER",
            Phase::Request => "REQUEST",
            Phase::ResponseHeader => "RESPONSE_HEADER",
            Phase::Response => "RESPONSE",
        };
        write!(f, "{s}")
    }
}

/// Per-transaction context handed to every `eval_calculate`/`eval` call:
/// the current phase plus the host surfaces a node may need while
/// evaluating (variable lookups that weren't resolved ahead of time at
/// `pre_eval`, and the logger).
pub trait TxnContext {
    /// The phase this transaction is currently being driven through.
    fn phase(&self) -> Phase;

    /// The host's variable store, if this transaction is bound to one.
    /// `None` in configurations with no host (or in unit tests), in which
    /// case `var`/`ask` nodes finish absent.
    fn variables(&self) -> Option<&dyn VariableStore> {
        None
    }

    /// Look up a host operator by name, for the `operator`/`foperator`
    /// call family.
    fn operator(&self, _name: &str) -> Option<&dyn Operator> {
        None
    }

    /// Look up a host transformation by name, for the `transformation`
    /// call.
    fn transformation(&self, _name: &str) -> Option<&dyn Transformation> {
        None
    }

    /// The host's logging sink, if bound.
    fn logger(&self) -> Option<&dyn Logger> {
        None
    }
}

/// The environment handed to [`crate::node::Node::pre_eval`]: host
/// bindings resolved once per transaction, before any evaluation happens.
pub trait EvalEnvironment {
    /// The phase the transaction will start evaluation in (binding occurs
    /// before the first phase begins).
    fn phase(&self) -> Phase;
}

/// The per-node evaluation-slot protocol (spec §4.6 "Per-node protocol").
///
/// Every method that names a `node: NodeRef` operates on *that* node's
/// slot, not necessarily the caller's own — in practice a node only ever
/// touches its own slot (the identity the evaluator passed into
/// `eval_calculate`) except through [`EvalContext::eval`], which triggers
/// (and returns the result of) a *different* node's evaluation.
pub trait EvalContext {
    /// Initialise `node`'s slot as *local*, owning an (initially empty)
    /// list payload. Requires the slot to be *unset*.
    fn setup_local_list(&mut self, node: NodeRef) -> Result<()>;

    /// Append a value to `node`'s local list. Requires *local* mode.
    fn append_to_list(&mut self, node: NodeRef, value: Value) -> Result<()>;

    /// Bind `node`'s slot to an externally-owned value (read-only).
    /// Requires the slot to be *unset*.
    fn alias(&mut self, node: NodeRef, value: Value) -> Result<()>;

    /// Delegate `node`'s slot to another node's slot. Requires `node`'s
    /// slot to be *unset*; cycle-free and transitive.
    fn forward(&mut self, node: NodeRef, target: NodeRef) -> Result<()>;

    /// Mark `node`'s slot as finished: its value is now fixed for the
    /// rest of the transaction.
    fn finish(&mut self, node: NodeRef);

    /// Convenience: alias the canonical truthy literal `''` and finish.
    fn finish_true(&mut self, node: NodeRef) -> Result<()> {
        self.alias(node, Value::truthy_literal())?;
        self.finish(node);
        Ok(())
    }

    /// Convenience: finish with no aliased value (the absent singular
    /// `:`).
    fn finish_false(&mut self, node: NodeRef) {
        self.finish(node);
    }

    /// Whether `node`'s slot has finished.
    fn is_finished(&self, node: NodeRef) -> bool;

    /// `node`'s current value, if any has been produced yet this
    /// transaction (resolves aliasing/forwarding).
    fn value(&self, node: NodeRef) -> Option<&Value>;

    /// Opaque per-node scratch state, preserved across incremental
    /// evaluations within one transaction (spec §9 "coroutine-like
    /// incremental evaluation"). Concrete node types
    /// `downcast_mut`/`downcast_ref` this to their own progress-tracking
    /// type.
    fn scratch(&mut self, node: NodeRef) -> &mut Option<Box<dyn Any>>;

    /// Evaluate (if not already finished) and return `node`'s current
    /// value, resolving forwarding chains. This is how a node drives its
    /// children.
    fn eval(&mut self, node: NodeRef, ctx: &dyn TxnContext) -> Result<Option<Value>>;
}

/// Severity of one [`Reporter`] entry.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ReportLevel {
    /// Informational; never aborts configuration load.
    Warn,
    /// Fatal to configuration load unless the host runs in lenient mode
    /// (spec §7).
    Error,
}

/// One accumulated validation/transformation report entry, optionally
/// attached to the node that produced it.
#[derive(Clone, Debug)]
pub struct ReportEntry {
    /// The node this entry is about, if any.
    pub node: Option<NodeRef>,
    /// Severity.
    pub level: ReportLevel,
    /// Human-readable message.
    pub message: String,
}

/// Accumulates warnings/errors attached to nodes during validation and
/// transformation (spec §4.6, §6 "Reporter"). Validation warnings never
/// abort; errors abort configuration load unless the host runs leniently.
#[derive(Default, Debug)]
pub struct Reporter {
    entries: Vec<ReportEntry>,
    error_count: usize,
    warn_count: usize,
}

impl Reporter {
    /// A fresh, empty reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error attached to `node` (or engine-wide, if `None`).
    pub fn error(&mut self, node: Option<NodeRef>, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(node = ?node, "{message}");
        self.entries.push(ReportEntry {
            node,
            level: ReportLevel::Error,
            message,
        });
        self.error_count += 1;
    }

    /// Record a warning attached to `node` (or engine-wide, if `None`).
    pub fn warn(&mut self, node: Option<NodeRef>, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(node = ?node, "{message}");
        self.entries.push(ReportEntry {
            node,
            level: ReportLevel::Warn,
            message,
        });
        self.warn_count += 1;
    }

    /// Whether any error has been reported.
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Total errors reported.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Total warnings reported.
    pub fn warn_count(&self) -> usize {
        self.warn_count
    }

    /// All entries recorded so far, in order.
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_ordering() {
        assert!(Phase::RequestHeader.at_or_before(Phase::Request));
        assert!(Phase::Response.at_or_before(Phase::Response));
        assert!(!Phase::Response.at_or_before(Phase::Request));
        assert!(!Phase::None.at_or_before(Phase::Request));
    }

    #[test]
    fn reporter_counts() {
        let mut r = Reporter::new();
        r.warn(None, "careful");
        r.error(Some(NodeRef(3)), "bad");
        assert_eq!(r.warn_count(), 1);
        assert_eq!(r.error_count(), 1);
        assert!(r.has_errors());
    }
}
