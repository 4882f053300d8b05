//! Canonical query shapes.
//!
//! A shape keeps the structure of a query document and drops every literal,
//! so that `{ a: 5 }` and `{ a: "x" }` both become `{ "a": 1 }`.
//!
//! Rules:
//! - Objects keep every key in source order: `{ "k": <shape>, ... }`, `{}` when empty.
//! - Every scalar (including regexes and constructor calls) becomes `1`.
//! - Arrays list the distinct shapes of their elements in order of first
//!   appearance: `[ 1, 2, 3 ]` becomes `[ 1 ]` and `[ { a: 1 }, { b: 2 } ]`
//!   becomes `[ { "a": 1 }, { "b": 1 } ]`. Array length is not part of the shape.
//!
//! # Example
//!
//! ```
//! use logparser::{compute_shape, parse_query};
//!
//! let query = parse_query("{ expireAfterSeconds: { $exists: true } }").unwrap();
//! assert_eq!(compute_shape(&query), r#"{ "expireAfterSeconds": { "$exists": 1 } }"#);
//! ```

use crate::config::DEFAULT_MAX_DEPTH;
use crate::document::value::{write_quoted, Value};
use std::fmt::{self, Write};

/// Computes the canonical shape of a query document.
///
/// Never fails: anything the parser produces has a shape. Nodes nested deeper
/// than the default limit are rendered as `1`.
#[must_use]
pub fn compute_shape(value: &Value) -> String {
    compute_shape_with_depth(value, DEFAULT_MAX_DEPTH)
}

/// Same as [`compute_shape`] with an explicit nesting limit.
#[must_use]
pub fn compute_shape_with_depth(value: &Value, max_depth: usize) -> String {
    Shape {
        value,
        depth_left: max_depth,
    }
    .to_string()
}

/// Renders the shape of `value`, erasing nodes once `depth_left` runs out.
struct Shape<'a> {
    value: &'a Value,
    depth_left: usize,
}

impl Shape<'_> {
    fn child(&self, value: &Value) -> String {
        compute_shape_with_depth(value, self.depth_left - 1)
    }
}

impl fmt::Display for Shape<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.depth_left == 0 || self.value.is_scalar() {
            return f.write_char('1');
        }

        match self.value {
            Value::Object(fields) if fields.is_empty() => f.write_str("{}"),
            Value::Object(fields) => {
                f.write_str("{ ")?;
                for (i, (key, field)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_quoted(f, key)?;
                    write!(f, ": {}", self.child(field))?;
                }
                f.write_str(" }")
            }
            Value::Array(items) if items.is_empty() => f.write_str("[]"),
            Value::Array(items) => {
                let mut distinct: Vec<String> = Vec::new();
                for item in items {
                    let shape = self.child(item);
                    if !distinct.contains(&shape) {
                        distinct.push(shape);
                    }
                }
                write!(f, "[ {} ]", distinct.join(", "))
            }
            _ => f.write_char('1'),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parser::parse_query;

    fn shape(text: &str) -> String {
        compute_shape(&parse_query(text).unwrap())
    }

    #[test]
    fn test_shape_nested_object() {
        assert_eq!(
            shape("{ expireAfterSeconds: { $exists: true } }"),
            r#"{ "expireAfterSeconds": { "$exists": 1 } }"#
        );
    }

    #[test]
    fn test_shape_erases_every_scalar_kind() {
        let expected = r#"{ "a": 1, "b": 1, "c": 1, "d": 1, "e": 1, "f": 1, "g": 1 }"#;
        assert_eq!(
            shape("{ a: null, b: true, c: 5, d: 2.5, e: 'x', f: /^x/i, g: ObjectId('ab') }"),
            expected
        );
    }

    #[test]
    fn test_shape_ignores_literal_values() {
        assert_eq!(
            shape("{ user: 'alice', age: { $gt: 30 } }"),
            shape("{ user: \"bob\", age: { $gt: 45.5 } }")
        );
    }

    #[test]
    fn test_shape_keeps_key_order() {
        assert_ne!(shape("{ a: 1, b: 1 }"), shape("{ b: 1, a: 1 }"));
        assert_eq!(shape("{ b: 1, a: 1 }"), r#"{ "b": 1, "a": 1 }"#);
    }

    #[test]
    fn test_shape_empty_containers() {
        assert_eq!(shape("{}"), "{}");
        assert_eq!(shape("{ a: [] }"), r#"{ "a": [] }"#);
    }

    #[test]
    fn test_shape_homogeneous_array_collapses() {
        assert_eq!(shape("{ a: { $in: [ 1, 2, 3 ] } }"), r#"{ "a": { "$in": [ 1 ] } }"#);
        assert_eq!(shape("{ a: { $in: [ 7 ] } }"), shape("{ a: { $in: [ 1, 'x', 3.5 ] } }"));
    }

    #[test]
    fn test_shape_heterogeneous_array_keeps_distinct_shapes() {
        assert_eq!(
            shape("{ $or: [ { a: 1 }, { b: 2 }, { a: 3 } ] }"),
            r#"{ "$or": [ { "a": 1 }, { "b": 1 } ] }"#
        );
    }

    #[test]
    fn test_shape_array_differs_from_scalar() {
        assert_ne!(shape("{ a: [ 1 ] }"), shape("{ a: 1 }"));
    }

    #[test]
    fn test_shape_escapes_keys() {
        assert_eq!(shape(r#"{ "a\"b": 1 }"#), r#"{ "a\"b": 1 }"#);
    }

    #[test]
    fn test_shape_is_idempotent() {
        for text in [
            "{ a: 1 }",
            "{ $or: [ { a: 1 }, { b: [ 1, 2 ] } ], c: { $exists: false } }",
            r#"{ "weird key": { "quo\"te": /x/ }, n: [] , e: {} }"#,
            "{ ts: { $gte: Timestamp 1412180887000|1 }, d: new Date(1) }",
        ] {
            let first = shape(text);
            assert_eq!(shape(&first), first, "shape of shape differs for {text}");
        }
    }

    #[test]
    fn test_shape_depth_is_bounded() {
        let deep = parse_query("{ a: { b: { c: 1 } } }").unwrap();
        assert_eq!(
            compute_shape_with_depth(&deep, 2),
            r#"{ "a": { "b": 1 } }"#
        );
    }
}
