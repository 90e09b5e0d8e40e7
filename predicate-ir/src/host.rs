//! Host surfaces the core consumes (spec §6 "Host surfaces"). These are
//! traits only — no concrete IronBee, or any other host, binding lives in
//! this workspace. `predicate-std`'s IronBee-integration call family
//! (`var`, `operator`, `foperator`, `transformation`, `waitPhase`,
//! `finishPhase`, `ask`) is implemented purely against these interfaces.

use crate::eval_context::Phase;
use crate::value::Value;
use bumpalo::Bump;

/// Indexed, named field lookup against the host's data store.
pub trait VariableStore {
    /// Look up a named field. Absent fields return `None`, matching the
    /// value model's "absent" convention rather than an error.
    fn lookup(&self, key: &[u8]) -> Option<Value>;

    /// Look up a field by a pre-resolved index, for stores that support
    /// resolving a name to a fast handle once at `pre_eval` time. Default
    /// implementation always misses, which is always correct (just
    /// slower) for stores that don't support indexed lookup.
    fn lookup_indexed(&self, _index: usize) -> Option<Value> {
        None
    }

    /// Resolve `key` to a fast handle for later [`Self::lookup_indexed`]
    /// calls, if this store supports it.
    fn index_of(&self, _key: &[u8]) -> Option<usize> {
        None
    }
}

/// A host-pluggable matcher/capture operator (e.g. string matching,
/// normalisation) invoked through the `operator`/`foperator` call family.
pub trait Operator {
    /// Instantiate an operator instance bound to `params` (e.g. a compiled
    /// pattern). Called once per node at `pre_eval`.
    fn create(&self, name: &str, params: &Value) -> crate::error::Result<Box<dyn OperatorInstance>>;
}

/// A single compiled operator instance, reused across every evaluation of
/// its owning node within one transaction's lifetime.
pub trait OperatorInstance {
    /// Runs the operator against `input`, appending any capture groups to
    /// `captures`. Returns whether the operator matched.
    fn execute(
        &self,
        phase: Phase,
        input: &Value,
        captures: &mut Vec<Value>,
    ) -> crate::error::Result<bool>;

    /// Whether this operator instance supports being invoked once per
    /// streamed input element (`foperator`) rather than once per whole
    /// input.
    fn is_stream(&self) -> bool {
        false
    }
}

/// A host-pluggable element-wise transformation (e.g. normalisation)
/// invoked through the `transformation` call.
pub trait Transformation {
    /// Applies `name` (with its configured `params`, already baked into
    /// the transformation instance at construction) to `value`, allocating
    /// any new bytes from `memory`.
    fn execute(&self, name: &str, memory: &Bump, value: &Value) -> crate::error::Result<Value>;
}

/// A read-only source for the transaction's current phase (spec §6
/// "Phase source").
pub trait PhaseSource {
    /// The current phase.
    fn current_phase(&self) -> Phase;
}

/// Structured or textual logging sink (spec §6 "Logger"). Numeric levels
/// follow syslog convention: emergency(0)…trace(9); [`Logger`]
/// implementations built on `tracing` (as `predicate`'s does) collapse
/// levels 0–3 onto `tracing::Level::ERROR`, since `tracing` only has five
/// severities.
pub trait Logger {
    /// Emit one log record.
    fn log(&self, level: u8, file: &str, line: u32, message: &str);
}
