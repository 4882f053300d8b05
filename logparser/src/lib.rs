//! Mongolog Parser Library
//!
//! Parses MongoDB server log lines into structured events and reduces the
//! query documents they carry to canonical query shapes.
//!
//! # Modules
//!
//! - [`line`] - Log line parsing into [`LogEvent`]s
//! - [`document`] - Parser for the extended-JSON documents embedded in lines
//! - [`shape`] - Canonical query shapes
//! - [`config`] - Parser configuration
//!
//! # Example
//!
//! ```
//! use logparser::{compute_shape, parse_log_line, parse_query, Operation};
//!
//! let event = parse_log_line(
//!     "Mon Feb 23 03:20:19.670 [conn7] query test.users query: { age: { $gt: 21 } } nreturned:3 4ms",
//! )
//! .unwrap();
//!
//! assert_eq!(event.operation, Operation::Query);
//! assert_eq!(event.counter("nreturned"), Some(3));
//! assert_eq!(event.duration_ms, Some(4));
//!
//! let other = parse_query("{ age: { $gt: 65 } }").unwrap();
//! assert_eq!(event.query_shape, Some(compute_shape(&other)));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod document;
pub mod line;
pub mod shape;

pub use config::{ConfigError, ParserConfig};
pub use document::{parse_document, parse_query, parse_query_with, DocumentError, Value};
pub use line::{
    parse_log_line, LineError, LineParser, LogEvent, Namespace, Operation, ParseFailure,
    Severity, Stage, Timestamp, YearlessTimestamp,
};
pub use shape::{compute_shape, compute_shape_with_depth};

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde_json;
