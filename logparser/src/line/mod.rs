//! Log line parsing.
//!
//! Turns one line of server log text into a [`LogEvent`], or into a
//! [`ParseFailure`] naming the stage that rejected it.

mod error;
mod event;
mod parser;
mod timestamp;

pub use error::{LineError, ParseFailure, Stage};
pub use event::{LogEvent, Namespace, Operation, Severity};
pub use parser::{parse_log_line, LineParser};
pub use timestamp::{Timestamp, YearlessTimestamp};
