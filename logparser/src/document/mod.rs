//! Extended-JSON documents as printed in server logs.
//!
//! The dialect is a superset of JSON: keys may be bare, strings may use single
//! quotes, regex literals (`/^a/i`) and constructor calls (`ObjectId('…')`,
//! `new Date(0)`, `Timestamp 1412180887000|1`) may appear wherever a value can.

pub mod parser;
pub mod value;

pub use parser::{parse_document, parse_query, parse_query_with, DocumentError};
pub use value::Value;
