//! Structured events produced from log lines.

use super::timestamp::Timestamp;
use crate::document::value::Value;
use crate::shape::compute_shape_with_depth;
use serde::Serialize;
use std::collections::BTreeMap;

/// The operation a log line reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// A find.
    Query,
    /// An insert.
    Insert,
    /// An update.
    Update,
    /// A remove.
    Remove,
    /// A cursor continuation.
    Getmore,
    /// A database command.
    Command,
    /// Anything else, including lines that report no operation at all.
    Other,
}

impl Operation {
    /// Maps a log keyword to an operation; unknown keywords map to `Other`.
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "query" => Self::Query,
            "insert" => Self::Insert,
            "update" => Self::Update,
            "remove" => Self::Remove,
            "getmore" => Self::Getmore,
            "command" => Self::Command,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Query => write!(f, "query"),
            Self::Insert => write!(f, "insert"),
            Self::Update => write!(f, "update"),
            Self::Remove => write!(f, "remove"),
            Self::Getmore => write!(f, "getmore"),
            Self::Command => write!(f, "command"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Message severity printed by 3.x servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Severity {
    /// `F`
    #[serde(rename = "F")]
    Fatal,
    /// `E`
    #[serde(rename = "E")]
    Error,
    /// `W`
    #[serde(rename = "W")]
    Warning,
    /// `I`
    #[serde(rename = "I")]
    Info,
    /// `D`
    #[serde(rename = "D")]
    Debug,
}

impl Severity {
    /// Maps a severity letter to its level.
    #[must_use]
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'F' => Some(Self::Fatal),
            'E' => Some(Self::Error),
            'W' => Some(Self::Warning),
            'I' => Some(Self::Info),
            'D' => Some(Self::Debug),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fatal => write!(f, "F"),
            Self::Error => write!(f, "E"),
            Self::Warning => write!(f, "W"),
            Self::Info => write!(f, "I"),
            Self::Debug => write!(f, "D"),
        }
    }
}

/// A `database.collection` namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Namespace {
    /// The namespace as printed.
    #[serde(rename = "namespace")]
    pub name: String,
    /// Everything before the first `.`.
    pub database: String,
    /// Everything after the first `.`, if there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

impl Namespace {
    /// Splits a namespace on its first `.`.
    ///
    /// # Example
    ///
    /// ```
    /// use logparser::Namespace;
    ///
    /// let ns = Namespace::parse("local.system.indexes");
    /// assert_eq!(ns.database, "local");
    /// assert_eq!(ns.collection.as_deref(), Some("system.indexes"));
    /// ```
    #[must_use]
    pub fn parse(name: &str) -> Self {
        let (database, collection) = match name.split_once('.') {
            Some((db, coll)) => (db, Some(coll.to_string())),
            None => (name, None),
        };
        Self {
            name: name.to_string(),
            database: database.to_string(),
            collection,
        }
    }
}

/// The structured form of one log line.
///
/// Counters, lock timings and additional documents are flattened into the
/// top level when serialized, so an event renders as one flat JSON object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEvent {
    /// When the line was written.
    pub timestamp: Timestamp,

    /// Severity letter (3.x format only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,

    /// Component name (3.x format only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,

    /// The bracketed context, such as a connection or thread name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// The reported operation.
    pub operation: Operation,

    /// The namespace the operation addressed.
    #[serde(flatten)]
    pub namespace: Option<Namespace>,

    /// The query or command document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,

    /// Canonical shape of `query`; set whenever `query` is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_shape: Option<String>,

    /// Command name printed before the command document (`command: find { ... }`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_name: Option<String>,

    /// Raw `planSummary:` text.
    #[serde(rename = "planSummary", skip_serializing_if = "Option::is_none")]
    pub plan_summary: Option<String>,

    /// Other named documents on the line, such as `update: { ... }`.
    #[serde(flatten)]
    pub documents: BTreeMap<String, Value>,

    /// Integer counters such as `nscanned` or `reslen`.
    #[serde(flatten)]
    pub counters: BTreeMap<String, i64>,

    /// Lock timings in microseconds, keyed like `locks(micros) r`.
    #[serde(flatten)]
    pub locks: BTreeMap<String, i64>,

    /// Duration from the trailing `<n>ms`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,

    /// Text no stage could interpret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LogEvent {
    /// Creates an event with only a timestamp and `Other` as operation.
    #[must_use]
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            severity: None,
            component: None,
            context: None,
            operation: Operation::Other,
            namespace: None,
            query: None,
            query_shape: None,
            command_name: None,
            plan_summary: None,
            documents: BTreeMap::new(),
            counters: BTreeMap::new(),
            locks: BTreeMap::new(),
            duration_ms: None,
            message: None,
        }
    }

    /// Returns the counter stored under `name`.
    #[must_use]
    pub fn counter(&self, name: &str) -> Option<i64> {
        self.counters.get(name).copied()
    }

    /// Computes `query_shape` from `query`, limiting recursion to `max_depth`.
    pub fn attach_shape(&mut self, max_depth: usize) {
        self.query_shape = self
            .query
            .as_ref()
            .map(|query| compute_shape_with_depth(query, max_depth));
    }
}
