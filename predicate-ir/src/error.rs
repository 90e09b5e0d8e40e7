use thiserror::Error;

/// The engine-wide error type.
///
/// Every fallible contract in this crate (and in `predicate-std` /
/// `predicate-eval`, which both depend on this type directly rather than
/// wrapping it) returns one of these variants. The host-facing facade in
/// the `predicate` crate wraps this type for configuration-load errors that
/// need additional context (a file path, a rule id).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// The parser rejected input at a given byte offset.
    #[error("syntax error at byte {pointer}: {message}")]
    Syntax {
        /// Byte offset of the offending lexeme.
        pointer: usize,
        /// Human-readable description.
        message: String,
    },

    /// The call factory has no constructor registered for this name.
    #[error("unknown call: {0}")]
    UnknownCall(String),

    /// A factory generator produced a node whose reported name differs
    /// from the name it was asked to construct.
    #[error("invalid registration for `{requested}`: constructor produced node named `{produced}`")]
    InvalidRegistration {
        /// The name passed to the factory.
        requested: String,
        /// The name the constructed node actually reports.
        produced: String,
    },

    /// A call node was found with the wrong arity, wrong child type, or a
    /// non-literal where a literal is required.
    #[error("invalid arguments to `{call}`: {reason}")]
    InvalidArguments {
        /// Name of the call.
        call: String,
        /// Why the arguments are invalid.
        reason: String,
    },

    /// An illegal evaluation-state transition (double finish, append to an
    /// aliased slot, forwarding a finished slot, etc).
    #[error("invalid evaluation state: {0}")]
    InvalidState(String),

    /// Lookup miss in the variable store, the operator registry, or the
    /// transform-history table.
    #[error("not found: {0}")]
    NotFound(String),

    /// A host operator or transformation signalled failure.
    #[error("host operator failure: {0}")]
    HostOperatorFailure(String),

    /// An arena allocation failed.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The graph failed a structural-invariant check during validation.
    #[error("validation failed: {0}")]
    Validation(String),
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;
