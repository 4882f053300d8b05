//! Line parsing errors.

use crate::document::parser::DocumentError;
use serde::Serialize;
use thiserror::Error;

/// One extraction step of the line parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Leading timestamp.
    Timestamp,
    /// Bracketed context tag.
    Context,
    /// Operation keyword.
    Operation,
    /// Namespace after the operation.
    Namespace,
    /// Embedded documents.
    Document,
    /// `name:integer` counters.
    Counters,
    /// `locks(micros)` timings.
    Locks,
    /// Trailing `<n>ms`.
    Duration,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timestamp => write!(f, "timestamp"),
            Self::Context => write!(f, "context"),
            Self::Operation => write!(f, "operation"),
            Self::Namespace => write!(f, "namespace"),
            Self::Document => write!(f, "document"),
            Self::Counters => write!(f, "counters"),
            Self::Locks => write!(f, "locks"),
            Self::Duration => write!(f, "duration"),
        }
    }
}

/// What went wrong in a failing stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    /// The line does not start with a recognized timestamp.
    #[error("No recognized timestamp format at start of line")]
    TimestampFormat,

    /// A `[` context tag is never closed.
    #[error("Unterminated context tag starting at offset {offset}")]
    UnterminatedContext {
        /// Byte offset of the opening bracket.
        offset: usize,
    },

    /// An embedded document is malformed.
    #[error("Invalid document: {source}")]
    DocumentSyntax {
        /// Byte offset in the line of the first offending character.
        offset: usize,
        /// The underlying document error.
        #[source]
        source: DocumentError,
    },

    /// A `name:value` field whose value is not an integer.
    #[error("Invalid value '{value}' for '{name}' at offset {offset}")]
    CounterParse {
        /// The field name.
        name: String,
        /// The value as printed.
        value: String,
        /// Byte offset of the value.
        offset: usize,
    },
}

impl LineError {
    /// Byte offset in the line where the problem starts, when known.
    #[must_use]
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::TimestampFormat => None,
            Self::UnterminatedContext { offset }
            | Self::DocumentSyntax { offset, .. }
            | Self::CounterParse { offset, .. } => Some(*offset),
        }
    }
}

/// A log line that could not be parsed.
///
/// Parsing is all-or-nothing: a failure never comes with a partial event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} stage failed: {error}")]
pub struct ParseFailure {
    /// The line as given.
    pub line: String,
    /// The stage that failed.
    pub stage: Stage,
    /// The cause.
    #[source]
    pub error: LineError,
}
