//! The facade error type (spec §7 "user-visible failure behaviour"):
//! every core error gains the configuration-load context (a file path, the
//! offending directive) that a host operator actually needs to act on.

use std::path::Path;
use thiserror::Error;

/// Errors surfaced while loading or applying an engine configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// A core engine error encountered while processing `directive` in a
    /// configuration file.
    #[error("{path}: `{directive}`: {source}")]
    Directive {
        /// The configuration file being processed.
        path: String,
        /// The directive line that failed.
        directive: String,
        /// The underlying core error.
        #[source]
        source: predicate_ir::Error,
    },

    /// A core engine error with no further configuration-load context.
    #[error(transparent)]
    Core(#[from] predicate_ir::Error),

    /// `PredicateAssertValid` (or an implicit validation at the end of
    /// loading) found validation errors; configuration load refuses to
    /// continue (spec §7: "errors abort configuration load unless lenient
    /// mode").
    #[error("configuration invalid ({error_count} error(s)), first: {first}")]
    Invalid {
        /// Total errors the reporter accumulated.
        error_count: usize,
        /// The first reported error's message, for a quick top-line cause.
        first: String,
    },

    /// A directive line didn't match any recognised grammar.
    #[error("malformed directive: {0}")]
    MalformedDirective(String),

    /// A directive named a path (`PredicateDebugReport`, `PredicateTrace`,
    /// …) that couldn't be read or written.
    #[error("{path}: {source}")]
    Io {
        /// The path the directive named.
        path: String,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Attaches directive context to a core error.
    pub fn directive(path: impl AsRef<Path>, directive: impl Into<String>, source: predicate_ir::Error) -> Self {
        Error::Directive {
            path: path.as_ref().display().to_string(),
            directive: directive.into(),
            source,
        }
    }

    /// Builds an [`Error::Io`] from a path and the I/O failure it produced.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
