//! Log line parser.
//!
//! A line runs through an ordered pipeline of stages over a shared cursor:
//!
//! 1. timestamp (plus the optional `severity component` pair of 3.x logs)
//! 2. `[context]`
//! 3. operation keyword and namespace
//! 4. fields: embedded documents, `planSummary:`, counters and lock timings
//! 5. trailing `<n>ms` duration
//!
//! Stages never backtrack into text an earlier stage consumed. A stage whose
//! construct is absent is skipped; a stage whose construct is present but
//! malformed fails the whole line.
//!
//! Lines with an unrecognized operation are parsed leniently: their body is
//! free text, kept whole as `message`. A dotted `db.collection` token after
//! the keyword is taken as the namespace, and tokens that are not fields, or
//! fields that fail to parse, are stepped over.

use super::error::{LineError, ParseFailure, Stage};
use super::event::{LogEvent, Namespace, Operation, Severity};
use super::timestamp::timestamp;
use crate::config::ParserConfig;
use crate::document::parser::parse_document;
use nom::{
    bytes::complete::{tag, take_till, take_till1, take_while1},
    character::complete::{char, digit1, satisfy, space1},
    combinator::{eof, map, map_opt, map_res, peek, recognize},
    sequence::{delimited, preceded, terminated},
    IResult, Parser,
};
use tracing::{debug, trace};

const LOCKS_TAG: &str = "locks(micros)";

type StageResult<T> = Result<T, (Stage, LineError)>;

/// Parses one log line with the default configuration.
///
/// # Errors
///
/// Returns a `ParseFailure` naming the failing stage if:
/// - The line does not start with a recognized timestamp
/// - A context tag is not closed
/// - An embedded document is malformed
/// - A counter or lock timing has a non-integer value
///
/// # Examples
///
/// ```
/// use logparser::{parse_log_line, Operation};
///
/// let line = "Mon Feb 23 03:20:19.670 [TTLMonitor] query local.system.indexes \
///             query: { expireAfterSeconds: { $exists: true } } ntoreturn:0 ntoskip:0 \
///             nscanned:0 keyUpdates:0 locks(micros) r:86 nreturned:0 reslen:20 0ms";
/// let event = parse_log_line(line).unwrap();
///
/// assert_eq!(event.operation, Operation::Query);
/// assert_eq!(event.context.as_deref(), Some("TTLMonitor"));
/// assert_eq!(
///     event.query_shape.as_deref(),
///     Some(r#"{ "expireAfterSeconds": { "$exists": 1 } }"#)
/// );
/// assert_eq!(event.locks.get("locks(micros) r"), Some(&86));
/// assert_eq!(event.duration_ms, Some(0));
/// ```
pub fn parse_log_line(line: &str) -> Result<LogEvent, ParseFailure> {
    LineParser::default().parse(line)
}

/// Line parser with an explicit configuration.
///
/// Holds no state between lines; one instance can be shared by any number
/// of threads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineParser {
    config: ParserConfig,
}

impl LineParser {
    /// Creates a parser using `config`.
    #[must_use]
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration in use.
    #[must_use]
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parses one log line.
    ///
    /// # Errors
    ///
    /// See [`parse_log_line`].
    pub fn parse(&self, line: &str) -> Result<LogEvent, ParseFailure> {
        self.run(line).map_err(|(stage, error)| {
            debug!(%stage, %error, "Failed to parse log line");
            ParseFailure {
                line: line.to_string(),
                stage,
                error,
            }
        })
    }

    fn run(&self, line: &str) -> StageResult<LogEvent> {
        let (rest, ts) =
            timestamp(line).map_err(|_| (Stage::Timestamp, LineError::TimestampFormat))?;
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return Err((Stage::Timestamp, LineError::TimestampFormat));
        }

        let mut pipeline = Pipeline {
            line,
            rest,
            max_depth: self.config.max_depth,
            event: LogEvent::new(ts),
        };

        pipeline.severity_and_component();
        pipeline.context()?;
        pipeline.skip_spaces();
        let body_start = pipeline.offset();

        if pipeline.operation() {
            let strict = pipeline.event.operation != Operation::Other;
            pipeline.namespace(strict);
            pipeline.fields(strict)?;
        }
        pipeline.duration_and_message(body_start);

        let mut event = pipeline.event;
        event.attach_shape(self.config.max_depth);
        Ok(event)
    }
}

// ============================================================================
// Stage pipeline
// ============================================================================

struct Pipeline<'a> {
    line: &'a str,
    rest: &'a str,
    max_depth: usize,
    event: LogEvent,
}

impl<'a> Pipeline<'a> {
    fn offset(&self) -> usize {
        self.offset_of(self.rest)
    }

    fn offset_of(&self, tail: &str) -> usize {
        self.line.len() - tail.len()
    }

    fn skip_spaces(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn severity_and_component(&mut self) {
        if let Ok((rest, (severity, component))) = severity_component(self.rest) {
            self.event.severity = Some(severity);
            self.event.component = Some(component.to_string());
            self.rest = rest;
        }
    }

    fn context(&mut self) -> StageResult<()> {
        self.skip_spaces();
        if !self.rest.starts_with('[') {
            trace!(stage = %Stage::Context, "No context tag");
            return Ok(());
        }

        let offset = self.offset();
        let (rest, context) = context_tag(self.rest)
            .map_err(|_| (Stage::Context, LineError::UnterminatedContext { offset }))?;
        self.event.context = Some(context.to_string());
        self.rest = rest;
        Ok(())
    }

    /// Reads the operation keyword. Returns `false` when the body does not
    /// start with a standalone word, in which case no field scan happens.
    fn operation(&mut self) -> bool {
        match identifier(self.rest) {
            Ok((rest, keyword)) if rest.is_empty() || rest.starts_with(char::is_whitespace) => {
                self.event.operation = Operation::from_keyword(keyword);
                if self.event.operation == Operation::Other {
                    trace!(stage = %Stage::Operation, keyword, "Unrecognized operation");
                }
                self.rest = rest;
                true
            }
            _ => {
                trace!(stage = %Stage::Operation, "No operation keyword");
                false
            }
        }
    }

    fn namespace(&mut self, strict: bool) {
        self.skip_spaces();
        match value_token(self.rest) {
            Ok((rest, token)) if is_namespace(token, strict) => {
                self.event.namespace = Some(Namespace::parse(token));
                self.rest = rest;
            }
            _ => trace!(stage = %Stage::Namespace, "No namespace"),
        }
    }

    fn fields(&mut self, strict: bool) -> StageResult<()> {
        loop {
            self.skip_spaces();
            let before = self.rest;
            let more = match self.field() {
                Ok(true) => true,
                Ok(false) if strict => false,
                Err(failure) if strict => return Err(failure),
                Ok(false) => self.skip_token(),
                Err((stage, error)) => {
                    trace!(%stage, %error, "Skipping malformed field on free-text line");
                    self.rest = before;
                    self.skip_token()
                }
            };
            if !more {
                return Ok(());
            }
        }
    }

    /// Steps over one free-text token. The last token is left in place since
    /// it may be the duration.
    fn skip_token(&mut self) -> bool {
        match value_token(self.rest) {
            Ok((rest, _)) if !rest.trim().is_empty() => {
                self.rest = rest;
                true
            }
            _ => false,
        }
    }

    /// Consumes one field. Returns `false` if the cursor is not on a field.
    fn field(&mut self) -> StageResult<bool> {
        if let Ok((rest, _)) = locks_tag(self.rest) {
            self.rest = rest;
            self.locks()?;
            return Ok(true);
        }

        let Ok((after_name, name)) = field_name(self.rest) else {
            return Ok(false);
        };
        let spaced = after_name.starts_with(char::is_whitespace);
        let value = after_name.trim_start();

        if name == "planSummary" && spaced {
            self.rest = value;
            self.plan_summary();
            return Ok(true);
        }

        if value.starts_with('{') {
            self.document(name, value)?;
            return Ok(true);
        }

        if name == "command" && spaced {
            if let Ok((doc, command)) = terminated(identifier, space1).parse(value) {
                if doc.starts_with('{') {
                    self.event.command_name = Some(command.to_string());
                    self.document(name, doc)?;
                    return Ok(true);
                }
            }
        }

        if spaced || after_name.is_empty() {
            return Ok(false);
        }
        self.counter(name, after_name)?;
        Ok(true)
    }

    fn document(&mut self, name: &str, at: &str) -> StageResult<()> {
        let offset = self.offset_of(at);
        let (doc, end) = parse_document(self.line, offset, self.max_depth).map_err(|source| {
            (
                Stage::Document,
                LineError::DocumentSyntax {
                    offset: source.offset(),
                    source,
                },
            )
        })?;
        self.rest = &self.line[end..];

        if matches!(name, "query" | "command") && self.event.query.is_none() {
            self.event.query = Some(doc);
        } else {
            let key = self.document_key(name);
            self.event.documents.insert(key, doc);
        }
        Ok(())
    }

    /// `name`, or `name_2`, `name_3`... when the key is already taken in the
    /// flattened event.
    fn document_key(&self, name: &str) -> String {
        let taken = |key: &str| {
            self.event.documents.contains_key(key) || (key == "query" && self.event.query.is_some())
        };
        if !taken(name) {
            return name.to_string();
        }
        (2_usize..)
            .map(|n| format!("{name}_{n}"))
            .find(|key| !taken(key.as_str()))
            .unwrap_or_else(|| name.to_string())
    }

    fn counter(&mut self, name: &str, at: &'a str) -> StageResult<()> {
        let offset = self.offset_of(at);
        let (rest, text) = value_token(at).map_err(|_| {
            (
                Stage::Counters,
                LineError::CounterParse {
                    name: name.to_string(),
                    value: String::new(),
                    offset,
                },
            )
        })?;
        let value = text.parse::<i64>().map_err(|_| {
            (
                Stage::Counters,
                LineError::CounterParse {
                    name: name.to_string(),
                    value: text.to_string(),
                    offset,
                },
            )
        })?;

        self.event.counters.insert(name.to_string(), value);
        self.rest = rest;
        Ok(())
    }

    /// `locks(micros) r:86 w:12`; labels are single letters so the counters
    /// that usually follow (`nreturned:0`) are left alone.
    fn locks(&mut self) -> StageResult<()> {
        let mut timings = Vec::new();
        let mut rest = self.rest;

        while let Ok((after, (label, text))) = lock_pair(rest.trim_start()) {
            let key = format!("{LOCKS_TAG} {label}");
            let offset = self.offset_of(rest.trim_start()) + 2;
            let micros = text.parse::<i64>().map_err(|_| {
                (
                    Stage::Locks,
                    LineError::CounterParse {
                        name: key.clone(),
                        value: text.to_string(),
                        offset,
                    },
                )
            })?;
            timings.push((key, micros));
            rest = after;
        }

        if timings.is_empty() {
            trace!(stage = %Stage::Locks, "Lock tag without timings");
        }
        self.event.locks.extend(timings);
        self.rest = rest;
        Ok(())
    }

    /// Free text after `planSummary:` up to the next counter-like token.
    fn plan_summary(&mut self) {
        let mut end = 0;
        for token in self.rest.split(' ') {
            if !token.is_empty() && ends_plan_summary(token) {
                break;
            }
            end += token.len() + 1;
        }
        let end = end.min(self.rest.len());

        let summary = self.rest[..end].trim();
        if !summary.is_empty() {
            self.event.plan_summary = Some(summary.to_string());
        }
        self.rest = &self.rest[end..];
    }

    fn duration_and_message(&mut self, body_start: usize) {
        let remaining = self.rest.trim_end();
        let (head, last) = remaining
            .rsplit_once(char::is_whitespace)
            .unwrap_or(("", remaining));

        let leftover = match duration_token(last) {
            Ok((_, ms)) => {
                self.event.duration_ms = Some(ms);
                head
            }
            Err(_) => {
                trace!(stage = %Stage::Duration, "No duration suffix");
                remaining
            }
        };

        let message = if self.event.operation == Operation::Other {
            let body_end = self.offset() + leftover.len();
            self.line.get(body_start..body_end).unwrap_or_default()
        } else {
            leftover
        };
        let message = message.trim();
        if !message.is_empty() {
            self.event.message = Some(message.to_string());
        }
    }
}

// ============================================================================
// Token parsers
// ============================================================================

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)
}

/// `name:` with nothing between the name and the colon.
fn field_name(input: &str) -> IResult<&str, &str> {
    terminated(identifier, char(':')).parse(input)
}

fn value_token(input: &str) -> IResult<&str, &str> {
    take_till1(char::is_whitespace)(input)
}

fn locks_tag(input: &str) -> IResult<&str, &str> {
    tag(LOCKS_TAG)(input)
}

/// `r:86`
fn lock_pair(input: &str) -> IResult<&str, (char, &str)> {
    map(
        (satisfy(|c| c.is_ascii_alphabetic()), char(':'), value_token),
        |(label, _, value)| (label, value),
    )
    .parse(input)
}

/// A whole `<n>ms` token.
fn duration_token(input: &str) -> IResult<&str, i64> {
    map_res(terminated(digit1, (tag("ms"), eof)), |digits: &str| {
        digits.parse::<i64>()
    })
    .parse(input)
}

fn context_tag(input: &str) -> IResult<&str, &str> {
    delimited(char('['), take_till(|c: char| c == ']'), char(']')).parse(input)
}

/// ` I COMMAND` in front of the context of 3.x lines.
fn severity_component(input: &str) -> IResult<&str, (Severity, &str)> {
    map(
        (
            preceded(
                space1,
                map_opt(satisfy(|c| c.is_ascii_uppercase()), Severity::from_letter),
            ),
            preceded(
                space1,
                take_while1(|c: char| c.is_ascii_uppercase() || c == '_' || c == '-'),
            ),
            peek(space1),
        ),
        |(severity, component, _)| (severity, component),
    )
    .parse(input)
}

/// `name:value` with a non-blank value.
fn counter_token(input: &str) -> IResult<&str, &str> {
    recognize((identifier, char(':'), satisfy(|c| !c.is_whitespace()))).parse(input)
}

/// Known operations take whatever token follows the keyword; free-text lines
/// only a dotted `db.collection`.
fn is_namespace(token: &str, strict: bool) -> bool {
    if token.contains(':') || token.starts_with(['{', '[']) || duration_token(token).is_ok() {
        return false;
    }
    strict
        || (token.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
            && token.contains('.')
            && !token.ends_with('.'))
}

fn ends_plan_summary(token: &str) -> bool {
    counter_token(token).is_ok() || token.starts_with(LOCKS_TAG) || duration_token(token).is_ok()
}
