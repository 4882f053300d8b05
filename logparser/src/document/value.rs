//! Value model for documents embedded in log lines.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// A node of a parsed document or literal.
///
/// The tree mirrors the text it was parsed from: object keys keep their
/// original order (duplicates included) and no literal is coerced into
/// another type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `null`
    Null,
    /// `true` or `false`
    Bool(bool),
    /// Integer literal without fraction or exponent.
    Int(i64),
    /// Floating point literal.
    Float(f64),
    /// Single or double quoted string, escapes resolved.
    String(String),
    /// Regular expression literal (`/pattern/flags`).
    Regex {
        /// The pattern between the slashes, escapes kept verbatim.
        pattern: String,
        /// Trailing option letters.
        flags: String,
    },
    /// `[ ... ]`
    Array(Vec<Value>),
    /// `{ key: value, ... }` in source order.
    Object(Vec<(String, Value)>),
    /// A database-specific literal wrapper such as `ObjectId('...')`,
    /// `new Date(...)` or `NumberLong(...)`.
    Constructor {
        /// Constructor name without any `new` keyword.
        name: String,
        /// Arguments in source order.
        args: Vec<Value>,
    },
}

impl Value {
    /// Returns the first value stored under `key` if this is an object.
    ///
    /// # Examples
    ///
    /// ```
    /// use logparser::{parse_query, Value};
    ///
    /// let query = parse_query("{ a: 1, b: 'x' }").unwrap();
    /// assert_eq!(query.get("b"), Some(&Value::String("x".to_string())));
    /// assert_eq!(query.get("c"), None);
    /// ```
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Object(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Returns `true` for every variant that has no children.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::Array(_) | Self::Object(_))
    }
}

/// Writes `s` as a double quoted string using JSON escapes.
pub(crate) fn write_quoted(out: &mut impl std::fmt::Write, s: &str) -> std::fmt::Result {
    out.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => out.write_str("\\\"")?,
            '\\' => out.write_str("\\\\")?,
            '\n' => out.write_str("\\n")?,
            '\r' => out.write_str("\\r")?,
            '\t' => out.write_str("\\t")?,
            c if c.is_control() => write!(out, "\\u{:04x}", u32::from(c))?,
            c => out.write_char(c)?,
        }
    }
    out.write_char('"')
}

fn is_bare_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | '-'))
}

fn write_float(f: &mut std::fmt::Formatter<'_>, value: f64) -> std::fmt::Result {
    if value.is_nan() {
        write!(f, "NaN")
    } else if value.is_infinite() {
        write!(f, "{}Infinity", if value < 0.0 { "-" } else { "" })
    } else {
        // Debug keeps the fraction on whole numbers so the text parses back as a float.
        write!(f, "{value:?}")
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(fl) => write_float(f, *fl),
            Self::String(s) => write_quoted(f, s),
            Self::Regex { pattern, flags } => write!(f, "/{pattern}/{flags}"),
            Self::Array(items) if items.is_empty() => write!(f, "[]"),
            Self::Array(items) => {
                write!(f, "[ ")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, " ]")
            }
            Self::Object(fields) if fields.is_empty() => write!(f, "{{}}"),
            Self::Object(fields) => {
                write!(f, "{{ ")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if is_bare_key(key) {
                        write!(f, "{key}")?;
                    } else {
                        write_quoted(f, key)?;
                    }
                    write!(f, ": {value}")?;
                }
                write!(f, " }}")
            }
            Self::Constructor { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(fl) => serializer.serialize_f64(*fl),
            Self::String(s) => serializer.serialize_str(s),
            Self::Regex { pattern, flags } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("$regex", pattern)?;
                map.serialize_entry("$options", flags)?;
                map.end()
            }
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (key, value) in fields {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Self::Constructor { name, args } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(&format!("${name}"), args)?;
                map.end()
            }
        }
    }
}
