//! Extended-JSON document parser using nom.
//!
//! Parses documents like:
//! - `{ expireAfterSeconds: { $exists: true } }`
//! - `{ _id: ObjectId('54eaa9e3e4b0c5a3b5d1a2f1'), ts: new Date(1424659219670) }`
//! - `{ name: /^bo/i, tags: [ "a", 'b' ], ts: Timestamp 1412180887000|1 }`
//!
//! Errors are reported as byte offsets into the source text, recovered from
//! the length of the input left unparsed at the point of failure.

use super::value::Value;
use crate::config::ParserConfig;
use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, take_while1, take_while_m_n},
    character::complete::{alpha0, anychar, char, digit0, digit1, multispace0, multispace1, one_of},
    combinator::{cut, map, map_opt, map_res, not, opt, peek, recognize, value, verify},
    error::{ErrorKind, FromExternalError, ParseError},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, separated_pair, terminated},
    IResult, Parser,
};
use thiserror::Error;

/// Errors that can occur while parsing a document.
///
/// Every variant carries the byte offset of the first offending character;
/// when the input ran out, the offset is the length of the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// The input ended inside an unclosed object, array or constructor.
    #[error("Unexpected end of input at offset {offset}")]
    UnexpectedEnd {
        /// Byte offset of the end of input.
        offset: usize,
    },

    /// A quoted string was never closed.
    #[error("Unterminated string starting at offset {offset}")]
    UnterminatedString {
        /// Byte offset of the opening quote.
        offset: usize,
    },

    /// A regular expression literal was never closed.
    #[error("Unterminated regular expression starting at offset {offset}")]
    UnterminatedRegex {
        /// Byte offset of the opening slash.
        offset: usize,
    },

    /// A character that cannot start or continue the current construct.
    #[error("Unexpected character '{found}' at offset {offset}")]
    UnexpectedChar {
        /// Byte offset of the character.
        offset: usize,
        /// The character found.
        found: char,
    },

    /// A closing delimiter that does not match the open construct.
    #[error("Mismatched delimiter at offset {offset}: expected '{expected}', found '{found}'")]
    Mismatched {
        /// Byte offset of the wrong delimiter.
        offset: usize,
        /// The delimiter that would close the open construct.
        expected: char,
        /// The delimiter found instead.
        found: char,
    },

    /// A bare word that is neither a keyword nor a constructor call.
    #[error("Unknown identifier '{ident}' at offset {offset}")]
    UnknownIdentifier {
        /// Byte offset of the identifier.
        offset: usize,
        /// The identifier text.
        ident: String,
    },

    /// Text that looks like a number but does not parse as one.
    #[error("Invalid number '{text}' at offset {offset}")]
    InvalidNumber {
        /// Byte offset of the number.
        offset: usize,
        /// The offending text.
        text: String,
    },

    /// Nesting went deeper than the configured limit.
    #[error("Nesting deeper than {max_depth} levels at offset {offset}")]
    DepthExceeded {
        /// Byte offset of the container that crossed the limit.
        offset: usize,
        /// The configured limit.
        max_depth: usize,
    },

    /// Non-whitespace text after a complete standalone document.
    #[error("Unexpected trailing content at offset {offset}")]
    TrailingContent {
        /// Byte offset of the first trailing character.
        offset: usize,
    },

    /// The standalone document text is empty.
    #[error("Empty document")]
    Empty,
}

impl DocumentError {
    /// Byte offset of the first offending character.
    #[must_use]
    pub fn offset(&self) -> usize {
        match self {
            Self::UnexpectedEnd { offset }
            | Self::UnterminatedString { offset }
            | Self::UnterminatedRegex { offset }
            | Self::UnexpectedChar { offset, .. }
            | Self::Mismatched { offset, .. }
            | Self::UnknownIdentifier { offset, .. }
            | Self::InvalidNumber { offset, .. }
            | Self::DepthExceeded { offset, .. }
            | Self::TrailingContent { offset } => *offset,
            Self::Empty => 0,
        }
    }
}

/// Parses the literal starting at byte offset `start` of `src`.
///
/// Leading whitespace is skipped. On success returns the value and the byte
/// offset immediately after its last character; the rest of `src` is left
/// untouched.
///
/// # Errors
///
/// Returns a `DocumentError` if the literal is malformed, unterminated or
/// nested deeper than `max_depth`.
///
/// # Examples
///
/// ```
/// use logparser::{parse_document, Value};
///
/// let line = "query: { a: 1 } nscanned:3";
/// let (value, end) = parse_document(line, 7, 100).unwrap();
/// assert_eq!(value.get("a"), Some(&Value::Int(1)));
/// assert_eq!(&line[end..], " nscanned:3");
/// ```
pub fn parse_document(
    src: &str,
    start: usize,
    max_depth: usize,
) -> Result<(Value, usize), DocumentError> {
    let input = src.get(start..).unwrap_or_default();
    match document(input, max_depth) {
        Ok((rest, value)) => Ok((value, src.len() - rest.len())),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(e.into_document_error(src.len())),
        Err(nom::Err::Incomplete(_)) => Err(DocumentError::UnexpectedEnd { offset: src.len() }),
    }
}

/// Parses a standalone document string into a `Value`.
///
/// Surrounding whitespace is ignored; error offsets are relative to the
/// trimmed text.
///
/// # Errors
///
/// Returns a `DocumentError` if:
/// - The text is empty
/// - The document is malformed
/// - Anything other than whitespace follows the document
///
/// # Examples
///
/// ```
/// use logparser::{parse_query, Value};
///
/// let query = parse_query(r#"{ "status": "A", qty: { $lt: 30 } }"#).unwrap();
/// assert_eq!(query.get("status"), Some(&Value::String("A".to_string())));
/// ```
pub fn parse_query(text: &str) -> Result<Value, DocumentError> {
    parse_query_with(text, &ParserConfig::default())
}

/// Same as [`parse_query`] with an explicit configuration.
///
/// # Errors
///
/// See [`parse_query`].
pub fn parse_query_with(text: &str, config: &ParserConfig) -> Result<Value, DocumentError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(DocumentError::Empty);
    }

    let (value, end) = parse_document(text, 0, config.max_depth)?;
    let rest = &text[end..];
    let trailing = end + (rest.len() - rest.trim_start().len());
    if trailing == text.len() {
        Ok(value)
    } else {
        Err(DocumentError::TrailingContent { offset: trailing })
    }
}

// ============================================================================
// Grammar
// ============================================================================

type PResult<'a, T> = IResult<&'a str, T, Syntax<'a>>;

/// Parse error carrying the unparsed input at the point of failure; the
/// byte offset is recovered from its length once the whole source is known.
#[derive(Debug, Clone, PartialEq)]
struct Syntax<'a> {
    at: &'a str,
    problem: Problem,
}

#[derive(Debug, Clone, PartialEq)]
enum Problem {
    Unexpected,
    Expected(char),
    UnterminatedString,
    UnterminatedRegex,
    UnknownIdentifier(String),
    InvalidNumber,
    DepthExceeded(usize),
}

impl<'a> Syntax<'a> {
    fn new(at: &'a str, problem: Problem) -> Self {
        Self { at, problem }
    }

    fn into_document_error(self, src_len: usize) -> DocumentError {
        let offset = src_len.saturating_sub(self.at.len());
        match (self.problem, self.at.chars().next()) {
            (Problem::UnterminatedString, _) => DocumentError::UnterminatedString { offset },
            (Problem::UnterminatedRegex, _) => DocumentError::UnterminatedRegex { offset },
            (Problem::UnknownIdentifier(ident), _) => {
                DocumentError::UnknownIdentifier { offset, ident }
            }
            (Problem::InvalidNumber, _) => DocumentError::InvalidNumber {
                offset,
                text: number_text(self.at).to_string(),
            },
            (Problem::DepthExceeded(max_depth), _) => {
                DocumentError::DepthExceeded { offset, max_depth }
            }
            (_, None) => DocumentError::UnexpectedEnd { offset },
            (Problem::Expected(expected @ ('}' | ']' | ')')), Some(found @ ('}' | ']' | ')'))) => {
                DocumentError::Mismatched {
                    offset,
                    expected,
                    found,
                }
            }
            (_, Some(found)) => DocumentError::UnexpectedChar { offset, found },
        }
    }
}

impl<'a> ParseError<&'a str> for Syntax<'a> {
    fn from_error_kind(input: &'a str, _kind: ErrorKind) -> Self {
        Self::new(input, Problem::Unexpected)
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }

    fn from_char(input: &'a str, expected: char) -> Self {
        Self::new(input, Problem::Expected(expected))
    }
}

impl<'a, E> FromExternalError<&'a str, E> for Syntax<'a> {
    fn from_external_error(input: &'a str, _kind: ErrorKind, _error: E) -> Self {
        Self::new(input, Problem::InvalidNumber)
    }
}

fn fail<'a, T>(at: &'a str, problem: Problem) -> PResult<'a, T> {
    Err(nom::Err::Failure(Syntax::new(at, problem)))
}

/// The number-like text at the start of `input`, for error messages.
fn number_text(input: &str) -> &str {
    let end = input
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')))
        .unwrap_or(input.len());
    &input[..end]
}

/// Nesting level of the container being parsed.
#[derive(Debug, Clone, Copy)]
struct Depth {
    level: usize,
    max: usize,
}

impl Depth {
    fn new(max: usize) -> Self {
        Self { level: 0, max }
    }

    /// Steps into the container opening at `at`.
    fn enter<'a>(self, at: &'a str) -> Result<Self, nom::Err<Syntax<'a>>> {
        if self.level >= self.max {
            return Err(nom::Err::Failure(Syntax::new(
                at,
                Problem::DepthExceeded(self.max),
            )));
        }
        Ok(Self {
            level: self.level + 1,
            ..self
        })
    }
}

fn document(input: &str, max_depth: usize) -> PResult<'_, Value> {
    let (input, _) = ws(input)?;
    any_value(input, Depth::new(max_depth))
}

fn ws(input: &str) -> PResult<'_, &str> {
    multispace0(input)
}

fn open(input: &str, delimiter: char) -> PResult<'_, char> {
    char(delimiter).parse(input)
}

fn comma(input: &str) -> PResult<'_, char> {
    delimited(ws, char(','), ws).parse(input)
}

/// Closing delimiter, allowing one trailing comma before it.
fn closing<'a>(delimiter: char) -> impl Parser<&'a str, Output = char, Error = Syntax<'a>> {
    preceded((ws, opt(char(',')), ws), char(delimiter))
}

fn any_value<'a>(input: &'a str, depth: Depth) -> PResult<'a, Value> {
    alt((
        |i: &'a str| object(i, depth),
        |i: &'a str| array(i, depth),
        map(quoted_string, Value::String),
        regex,
        number,
        |i: &'a str| word(i, depth),
    ))
    .parse(input)
}

// ============================================================================
// Containers
// ============================================================================

fn object<'a>(input: &'a str, depth: Depth) -> PResult<'a, Value> {
    let (rest, _) = open(input, '{')?;
    let depth = depth.enter(input)?;
    cut(map(
        terminated(
            preceded(ws, separated_list0(comma, move |i: &'a str| field(i, depth))),
            closing('}'),
        ),
        Value::Object,
    ))
    .parse(rest)
}

fn field<'a>(input: &'a str, depth: Depth) -> PResult<'a, (String, Value)> {
    pair(
        key,
        cut(preceded((ws, char(':'), ws), |i: &'a str| {
            any_value(i, depth)
        })),
    )
    .parse(input)
}

fn key(input: &str) -> PResult<'_, String> {
    alt((quoted_string, map(take_while1(is_key_char), String::from))).parse(input)
}

fn is_key_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, ':' | ',' | '{' | '}' | '[' | ']' | '"' | '\'')
}

fn array<'a>(input: &'a str, depth: Depth) -> PResult<'a, Value> {
    let (rest, _) = open(input, '[')?;
    let depth = depth.enter(input)?;
    cut(map(
        terminated(
            preceded(ws, separated_list0(comma, move |i: &'a str| any_value(i, depth))),
            closing(']'),
        ),
        Value::Array,
    ))
    .parse(rest)
}

// ============================================================================
// Scalars
// ============================================================================

/// Single- or double-quoted string with backslash escapes.
fn quoted_string(input: &str) -> PResult<'_, String> {
    let (body, quote) = quote_mark(input)?;
    let stop = if quote == '"' { "\"\\" } else { "'\\" };
    let (rest, text) = alt((
        escaped_transform(is_not(stop), '\\', escape),
        value(String::new(), tag("")),
    ))
    .parse(body)?;

    match open(rest, quote) {
        Ok((rest, _)) => Ok((rest, text)),
        Err(_) => fail(input, Problem::UnterminatedString),
    }
}

fn quote_mark(input: &str) -> PResult<'_, char> {
    one_of("\"'").parse(input)
}

/// The character after a backslash; unknown escapes keep the character.
fn escape(input: &str) -> PResult<'_, char> {
    alt((
        value('\n', char('n')),
        value('\t', char('t')),
        value('\r', char('r')),
        value('\u{8}', char('b')),
        value('\u{c}', char('f')),
        unicode_escape,
        anychar,
    ))
    .parse(input)
}

fn unicode_escape(input: &str) -> PResult<'_, char> {
    map_opt(
        preceded(
            char('u'),
            take_while_m_n(4, 4, |c: char| c.is_ascii_hexdigit()),
        ),
        |hex: &str| u32::from_str_radix(hex, 16).ok().and_then(char::from_u32),
    )
    .parse(input)
}

/// `/pattern/flags`; `\/` does not end the pattern.
fn regex(input: &str) -> PResult<'_, Value> {
    let (body, _) = open(input, '/')?;
    let (rest, pattern) = regex_pattern(body)?;

    let Ok((rest, _)) = open(rest, '/') else {
        return fail(input, Problem::UnterminatedRegex);
    };
    let (rest, flags) = regex_flags(rest)?;
    Ok((
        rest,
        Value::Regex {
            pattern: pattern.to_string(),
            flags: flags.to_string(),
        },
    ))
}

fn regex_pattern(input: &str) -> PResult<'_, &str> {
    recognize(many0(alt((
        recognize(pair(char('\\'), anychar)),
        is_not("/\\"),
    ))))
    .parse(input)
}

fn regex_flags(input: &str) -> PResult<'_, &str> {
    alpha0(input)
}

fn number_start(input: &str) -> PResult<'_, char> {
    one_of("+-.0123456789").parse(input)
}

fn number(input: &str) -> PResult<'_, Value> {
    let (_, _) = peek(number_start).parse(input)?;
    match alt((infinity, integer, float)).parse(input) {
        Ok(parsed) => Ok(parsed),
        Err(_) => fail(input, Problem::InvalidNumber),
    }
}

fn infinity(input: &str) -> PResult<'_, Value> {
    map(terminated(opt(one_of("+-")), tag("Infinity")), |sign| {
        Value::Float(if sign == Some('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        })
    })
    .parse(input)
}

fn integer(input: &str) -> PResult<'_, Value> {
    map(
        map_res(
            terminated(
                recognize(pair(opt(one_of("+-")), digit1)),
                not(one_of(".eE")),
            ),
            str::parse::<i64>,
        ),
        Value::Int,
    )
    .parse(input)
}

/// Fractions, exponents and integers too large for i64.
fn float(input: &str) -> PResult<'_, Value> {
    map(
        map_res(
            verify(
                recognize((
                    opt(one_of("+-")),
                    digit0,
                    opt(pair(char('.'), digit0)),
                    opt((one_of("eE"), opt(one_of("+-")), digit0)),
                )),
                |text: &str| text.bytes().any(|b| b.is_ascii_digit()),
            ),
            str::parse::<f64>,
        ),
        Value::Float,
    )
    .parse(input)
}

// ============================================================================
// Words and constructors
// ============================================================================

fn identifier(input: &str) -> PResult<'_, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '$')(input)
}

fn call_open(input: &str) -> PResult<'_, char> {
    preceded(ws, char('(')).parse(input)
}

fn word<'a>(input: &'a str, depth: Depth) -> PResult<'a, Value> {
    let (rest, name) = identifier(input)?;

    match name {
        "true" => return Ok((rest, Value::Bool(true))),
        "false" => return Ok((rest, Value::Bool(false))),
        "null" => return Ok((rest, Value::Null)),
        "NaN" => return Ok((rest, Value::Float(f64::NAN))),
        "Infinity" => return Ok((rest, Value::Float(f64::INFINITY))),
        _ => {}
    }

    if name == "new" {
        if let Ok((after, class)) = preceded(multispace1, identifier).parse(rest) {
            if call_open(after).is_ok() {
                return constructor(after, class, depth);
            }
        }
        return fail(input, Problem::UnknownIdentifier(name.to_string()));
    }

    if call_open(rest).is_ok() {
        return constructor(rest, name, depth);
    }

    match name {
        "MinKey" | "MaxKey" | "undefined" => Ok((
            rest,
            Value::Constructor {
                name: name.to_string(),
                args: Vec::new(),
            },
        )),
        "Timestamp" => legacy_timestamp(input, rest),
        _ => fail(input, Problem::UnknownIdentifier(name.to_string())),
    }
}

/// `Name(arg, ...)` with `input` just after the name.
fn constructor<'a>(input: &'a str, name: &str, depth: Depth) -> PResult<'a, Value> {
    let (call, _) = ws(input)?;
    let depth = depth.enter(call)?;
    let (rest, args) = cut(delimited(
        pair(char('('), ws),
        separated_list0(comma, |i: &'a str| argument(i, depth)),
        closing(')'),
    ))
    .parse(call)?;

    Ok((
        rest,
        Value::Constructor {
            name: name.to_string(),
            args,
        },
    ))
}

/// A constructor argument, falling back to a bare token such as the hex
/// payload of `BinData(0, 3AE2F1)`.
fn argument<'a>(input: &'a str, depth: Depth) -> PResult<'a, Value> {
    if input.starts_with(['{', '[', '"', '\'']) {
        return any_value(input, depth);
    }

    match terminated(
        |i: &'a str| any_value(i, depth),
        peek(preceded(ws, one_of(",)"))),
    )
    .parse(input)
    {
        Ok(parsed) => Ok(parsed),
        Err(e) => match bare_token(input) {
            Ok((rest, token)) => Ok((rest, Value::String(token.to_string()))),
            Err(_) => Err(e),
        },
    }
}

fn bare_token(input: &str) -> PResult<'_, &str> {
    take_while1(|c: char| !c.is_whitespace() && c != ',' && c != ')')(input)
}

/// `Timestamp 1412180887000|1` as printed by 2.x servers; `rest` follows
/// the word `Timestamp` at `input`.
fn legacy_timestamp<'a>(input: &'a str, rest: &'a str) -> PResult<'a, Value> {
    let parsed = preceded(
        ws,
        separated_pair(
            map_res(digit1, str::parse::<i64>),
            char('|'),
            map_res(digit1, str::parse::<i64>),
        ),
    )
    .parse(rest);

    match parsed {
        Ok((rest, (seconds, increment))) => Ok((
            rest,
            Value::Constructor {
                name: "Timestamp".to_string(),
                args: vec![Value::Int(seconds), Value::Int(increment)],
            },
        )),
        Err(_) => fail(input, Problem::UnknownIdentifier("Timestamp".to_string())),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(fields: Vec<(&str, Value)>) -> Value {
        Value::Object(
            fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    #[test]
    fn test_parse_simple_object() {
        let value = parse_query("{ expireAfterSeconds: { $exists: true } }").unwrap();
        assert_eq!(
            value,
            obj(vec![(
                "expireAfterSeconds",
                obj(vec![("$exists", Value::Bool(true))])
            )])
        );
    }

    #[test]
    fn test_parse_quoted_keys() {
        let value = parse_query(r#"{ "a b": 1, 'c': 2, d.e: 3 }"#).unwrap();
        assert_eq!(
            value,
            obj(vec![
                ("a b", Value::Int(1)),
                ("c", Value::Int(2)),
                ("d.e", Value::Int(3)),
            ])
        );
    }

    #[test]
    fn test_parse_keeps_duplicate_keys_in_order() {
        let value = parse_query("{ b: 1, a: 2, b: 3 }").unwrap();
        match value {
            Value::Object(fields) => {
                let keys: Vec<&str> = fields.iter().map(|(k, _)| k.as_str()).collect();
                assert_eq!(keys, vec!["b", "a", "b"]);
            }
            _ => panic!("Expected object"),
        }
    }

    #[test]
    fn test_parse_scalars() {
        let value =
            parse_query("{ a: null, b: false, c: -42, d: 3.5, e: 1e3, f: 'x', g: NaN }").unwrap();
        assert_eq!(value.get("a"), Some(&Value::Null));
        assert_eq!(value.get("b"), Some(&Value::Bool(false)));
        assert_eq!(value.get("c"), Some(&Value::Int(-42)));
        assert_eq!(value.get("d"), Some(&Value::Float(3.5)));
        assert_eq!(value.get("e"), Some(&Value::Float(1000.0)));
        assert_eq!(value.get("f"), Some(&Value::String("x".to_string())));
        assert!(matches!(value.get("g"), Some(Value::Float(f)) if f.is_nan()));
    }

    #[test]
    fn test_parse_integer_overflow_becomes_float() {
        let value = parse_query("{ a: 99999999999999999999 }").unwrap();
        assert_eq!(value.get("a"), Some(&Value::Float(1e20)));
    }

    #[test]
    fn test_parse_string_escapes() {
        let value = parse_query(r#"{ a: "x\"}y", b: 'it\'s', c: "A\n" }"#).unwrap();
        assert_eq!(value.get("a"), Some(&Value::String("x\"}y".to_string())));
        assert_eq!(value.get("b"), Some(&Value::String("it's".to_string())));
        assert_eq!(value.get("c"), Some(&Value::String("A\n".to_string())));
    }

    #[test]
    fn test_parse_unicode_text_and_escapes() {
        let value = parse_query(r#"{ café: "\u00e9é ✓", e: '', s: "\u12G" }"#).unwrap();
        assert_eq!(value.get("café"), Some(&Value::String("éé ✓".to_string())));
        assert_eq!(value.get("e"), Some(&Value::String(String::new())));
        assert_eq!(value.get("s"), Some(&Value::String("u12G".to_string())));

        // Offsets are byte offsets.
        let err = parse_query("{ é: @ }").unwrap_err();
        assert_eq!(err, DocumentError::UnexpectedChar { offset: 6, found: '@' });
    }

    #[test]
    fn test_parse_delimiters_inside_quotes() {
        let value = parse_query("{ a: '{ [ ] }', b: \"),\" }").unwrap();
        assert_eq!(value.get("a"), Some(&Value::String("{ [ ] }".to_string())));
        assert_eq!(value.get("b"), Some(&Value::String("),".to_string())));
    }

    #[test]
    fn test_parse_regex() {
        let value = parse_query(r"{ name: /^a\/b/im }").unwrap();
        assert_eq!(
            value.get("name"),
            Some(&Value::Regex {
                pattern: r"^a\/b".to_string(),
                flags: "im".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_arrays() {
        let value = parse_query("{ $in: [ 1, 'two', [ 3 ], {} ], e: [] }").unwrap();
        assert_eq!(
            value.get("$in"),
            Some(&Value::Array(vec![
                Value::Int(1),
                Value::String("two".to_string()),
                Value::Array(vec![Value::Int(3)]),
                Value::Object(vec![]),
            ]))
        );
        assert_eq!(value.get("e"), Some(&Value::Array(vec![])));
    }

    #[test]
    fn test_parse_constructors() {
        let value = parse_query(
            "{ _id: ObjectId('54eaa9e3'), ts: new Date(1424659219670), n: NumberLong(5), k: MinKey }",
        )
        .unwrap();
        assert_eq!(
            value.get("_id"),
            Some(&Value::Constructor {
                name: "ObjectId".to_string(),
                args: vec![Value::String("54eaa9e3".to_string())],
            })
        );
        assert_eq!(
            value.get("ts"),
            Some(&Value::Constructor {
                name: "Date".to_string(),
                args: vec![Value::Int(1_424_659_219_670)],
            })
        );
        assert_eq!(
            value.get("k"),
            Some(&Value::Constructor {
                name: "MinKey".to_string(),
                args: vec![],
            })
        );
    }

    #[test]
    fn test_parse_constructor_bare_argument() {
        let value = parse_query("{ b: BinData(0, 3AE2F1) }").unwrap();
        assert_eq!(
            value.get("b"),
            Some(&Value::Constructor {
                name: "BinData".to_string(),
                args: vec![Value::Int(0), Value::String("3AE2F1".to_string())],
            })
        );
    }

    #[test]
    fn test_parse_legacy_timestamp() {
        let value = parse_query("{ ts: { $gte: Timestamp 1412180887000|1 } }").unwrap();
        assert_eq!(
            value.get("ts").and_then(|ts| ts.get("$gte")),
            Some(&Value::Constructor {
                name: "Timestamp".to_string(),
                args: vec![Value::Int(1_412_180_887_000), Value::Int(1)],
            })
        );
    }

    #[test]
    fn test_parse_trailing_comma() {
        let value = parse_query("{ a: 1, }").unwrap();
        assert_eq!(value, obj(vec![("a", Value::Int(1))]));
    }

    #[test]
    fn test_parse_document_reports_end_position() {
        let line = "query: { a: { b: [1, 2] } } ntoreturn:0";
        let (_, end) = parse_document(line, 7, 100).unwrap();
        assert_eq!(&line[end..], " ntoreturn:0");
    }

    #[test]
    fn test_parse_unterminated_object() {
        let text = "{ a: { $exists: true";
        let err = parse_query(text).unwrap_err();
        assert_eq!(err, DocumentError::UnexpectedEnd { offset: text.len() });
    }

    #[test]
    fn test_parse_unterminated_string() {
        let err = parse_query("{ a: 'abc }").unwrap_err();
        assert_eq!(err, DocumentError::UnterminatedString { offset: 5 });
    }

    #[test]
    fn test_parse_unterminated_regex() {
        let err = parse_query("{ a: /abc }").unwrap_err();
        assert_eq!(err, DocumentError::UnterminatedRegex { offset: 5 });
    }

    #[test]
    fn test_parse_mismatched_delimiter() {
        let err = parse_query("{ a: [ 1, 2 } }").unwrap_err();
        assert_eq!(
            err,
            DocumentError::Mismatched {
                offset: 12,
                expected: ']',
                found: '}',
            }
        );
    }

    #[test]
    fn test_parse_unexpected_char() {
        let err = parse_query("{ a: 1 b: 2 }").unwrap_err();
        assert_eq!(
            err,
            DocumentError::UnexpectedChar {
                offset: 7,
                found: 'b',
            }
        );

        let err = parse_query("{ a: @ }").unwrap_err();
        assert_eq!(err.offset(), 5);
    }

    #[test]
    fn test_parse_unknown_identifier() {
        let err = parse_query("{ a: bogus }").unwrap_err();
        assert_eq!(
            err,
            DocumentError::UnknownIdentifier {
                offset: 5,
                ident: "bogus".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_depth_limit() {
        let config = ParserConfig::default().with_max_depth(3);
        assert!(parse_query_with("{ a: { b: { c: 1 } } }", &config).is_ok());

        let err = parse_query_with("{ a: { b: { c: { d: 1 } } } }", &config).unwrap_err();
        assert_eq!(
            err,
            DocumentError::DepthExceeded {
                offset: 15,
                max_depth: 3,
            }
        );
    }

    #[test]
    fn test_parse_pathological_nesting_fails_cleanly() {
        let text = "[".repeat(100_000);
        let err = parse_query(&text).unwrap_err();
        assert!(matches!(err, DocumentError::DepthExceeded { .. }));
    }

    #[test]
    fn test_parse_trailing_content() {
        let err = parse_query("{ a: 1 } extra").unwrap_err();
        assert_eq!(err, DocumentError::TrailingContent { offset: 9 });
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(parse_query("   ").unwrap_err(), DocumentError::Empty);
    }

    #[test]
    fn test_parse_with_surrounding_whitespace() {
        let value = parse_query("  \t{ a: 1 }\n").unwrap();
        assert_eq!(value, obj(vec![("a", Value::Int(1))]));
    }

    #[test]
    fn test_display_round_trips_through_parser() {
        let text = r#"{ a: [ 1, 2.5, "x" ], "b c": { $regex: /^a/i }, d: ObjectId("ab"), e: null }"#;
        let value = parse_query(text).unwrap();
        assert_eq!(parse_query(&value.to_string()).unwrap(), value);
    }
}
