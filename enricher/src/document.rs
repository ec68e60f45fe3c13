//! Task document model.
//!
//! Task documents are shared, loosely-typed JSON written by several agents. The
//! pipeline keeps the document as a raw [`Value`] tree so that fields it does
//! not interpret survive a rewrite byte-for-byte (key order included), and
//! layers typed views on top: [`Collection`] names the record sequences the
//! pipeline walks, and [`Deferred`] reads a sentinel-bearing field as either
//! `Unresolved` or `Resolved(value)`.

use serde_json::{Map, Value, json};

pub const TASK_ID: &str = "task_id";
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";
pub const KNOWLEDGE_POOL: &str = "knowledge_pool";
pub const FINDINGS: &str = "findings";
pub const PHASE_COMPRESSIONS: &str = "phase_compressions";
pub const DECISIONS: &str = "decisions";
pub const BLOCKERS: &str = "blockers";
pub const DESIGN_FINDINGS: &str = "design_findings";
pub const EXECUTION_PLAN: &str = "execution_plan";
pub const PHASES: &str = "phases";
pub const IMPLEMENTATION_ARTIFACTS: &str = "implementation_artifacts";

/// Marker a writer sets on a freshly created document.
pub const NEEDS_INITIALIZATION: &str = "_NEEDS_INITIALIZATION";
/// One-shot scaffold removed during initialization.
pub const INSTRUCTIONS: &str = "_INSTRUCTIONS";

/// Reserved literals standing in for "compute this later".
///
/// None of them contains a digit, so they cannot collide with a real
/// ISO-8601 timestamp or a numeric count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentinel {
    /// Any timestamp field, resolved by the enrich pass.
    Timestamp,
    /// Per-record `token_count` and phase `output_tokens`.
    TokenCount,
    /// Phase-compression token accounting.
    CompressionTokens,
    /// Timestamps written alongside a phase compression.
    CompressionTimestamp,
}

impl Sentinel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Sentinel::Timestamp => "TIMESTAMP_PH",
            Sentinel::TokenCount => "TOKEN_COUNT_PH",
            Sentinel::CompressionTokens => "TOKENS_CALCULATE",
            Sentinel::CompressionTimestamp => "TIMESTAMP_COMPRESS",
        }
    }

    pub fn matches(self, value: &Value) -> bool {
        value.as_str() == Some(self.as_str())
    }

    pub fn to_value(self) -> Value {
        Value::String(self.as_str().to_string())
    }

    /// True if the sentinel appears anywhere in `value`.
    pub fn occurs_in(self, value: &Value) -> bool {
        match value {
            Value::String(_) => self.matches(value),
            Value::Array(items) => items.iter().any(|item| self.occurs_in(item)),
            Value::Object(map) => map.values().any(|item| self.occurs_in(item)),
            _ => false,
        }
    }
}

/// A field whose value may still be a sentinel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Deferred<T> {
    Unresolved,
    Resolved(T),
}

impl<T> Deferred<T> {
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Deferred::Unresolved)
    }

    pub fn resolved(self) -> Option<T> {
        match self {
            Deferred::Unresolved => None,
            Deferred::Resolved(value) => Some(value),
        }
    }
}

impl<'a> Deferred<&'a Value> {
    /// Classify a raw field. Absent fields are `None`.
    pub fn read(field: Option<&'a Value>, sentinel: Sentinel) -> Option<Self> {
        let value = field?;
        if sentinel.matches(value) {
            Some(Deferred::Unresolved)
        } else {
            Some(Deferred::Resolved(value))
        }
    }
}

impl Deferred<u64> {
    /// Read a token count. Non-numeric, non-sentinel values yield `None`.
    pub fn token_count(field: Option<&Value>, sentinel: Sentinel) -> Option<Self> {
        match Deferred::read(field, sentinel)? {
            Deferred::Unresolved => Some(Deferred::Unresolved),
            Deferred::Resolved(value) => numeric_count(value).map(Deferred::Resolved),
        }
    }
}

/// Resolved token counts may have been written as floats by some writers.
fn numeric_count(value: &Value) -> Option<u64> {
    if let Some(count) = value.as_u64() {
        return Some(count);
    }
    value
        .as_f64()
        .filter(|count| count.is_finite() && *count >= 0.0)
        .map(|count| count.round() as u64)
}

/// Record sequences inside a task document that the pipeline walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    /// `knowledge_pool.findings`
    Findings,
    /// Top-level `design_findings`, written by some design agents.
    DesignFindings,
    /// `knowledge_pool.decisions`
    Decisions,
    /// `knowledge_pool.blockers`
    Blockers,
    /// Top-level `implementation_artifacts`.
    Artifacts,
    /// `execution_plan.phases`
    Phases,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Findings,
        Collection::DesignFindings,
        Collection::Decisions,
        Collection::Blockers,
        Collection::Artifacts,
        Collection::Phases,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Collection::Findings => "knowledge_pool.findings",
            Collection::DesignFindings => "design_findings",
            Collection::Decisions => "knowledge_pool.decisions",
            Collection::Blockers => "knowledge_pool.blockers",
            Collection::Artifacts => "implementation_artifacts",
            Collection::Phases => "execution_plan.phases",
        }
    }

    /// True for sequences whose entries must satisfy the Finding invariants.
    pub fn holds_findings(self) -> bool {
        matches!(self, Collection::Findings | Collection::DesignFindings)
    }

    fn path(self) -> (Option<&'static str>, &'static str) {
        match self {
            Collection::Findings => (Some(KNOWLEDGE_POOL), FINDINGS),
            Collection::DesignFindings => (None, DESIGN_FINDINGS),
            Collection::Decisions => (Some(KNOWLEDGE_POOL), DECISIONS),
            Collection::Blockers => (Some(KNOWLEDGE_POOL), BLOCKERS),
            Collection::Artifacts => (None, IMPLEMENTATION_ARTIFACTS),
            Collection::Phases => (Some(EXECUTION_PLAN), PHASES),
        }
    }

    pub fn get(self, doc: &Value) -> Option<&Vec<Value>> {
        let (parent, key) = self.path();
        let container = match parent {
            Some(parent) => doc.get(parent)?,
            None => doc,
        };
        container.get(key)?.as_array()
    }

    pub fn get_mut(self, doc: &mut Value) -> Option<&mut Vec<Value>> {
        let (parent, key) = self.path();
        let container = match parent {
            Some(parent) => doc.get_mut(parent)?,
            None => doc,
        };
        container.get_mut(key)?.as_array_mut()
    }
}

/// Default `knowledge_pool` with its four required containers.
pub fn default_knowledge_pool() -> Value {
    json!({
        FINDINGS: [],
        PHASE_COMPRESSIONS: {},
        DECISIONS: [],
        BLOCKERS: [],
    })
}

/// `task_id` for diagnostics.
pub fn task_id(doc: &Value) -> &str {
    doc.get(TASK_ID)
        .and_then(Value::as_str)
        .unwrap_or("UNKNOWN")
}

pub fn stamp_updated_at(doc: &mut Value, now: &str) {
    if let Some(map) = doc.as_object_mut() {
        map.insert(UPDATED_AT.to_string(), Value::String(now.to_string()));
    }
}

/// Python-style truthiness used for document markers.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// A value writers use to mean "nothing here yet".
pub fn is_empty_value(value: &Value) -> bool {
    !is_truthy(value) && !matches!(value, Value::Bool(_) | Value::Number(_))
}

/// Resolved numeric token count of a record, if any.
pub fn resolved_token_count(record: &Map<String, Value>) -> Option<u64> {
    Deferred::token_count(record.get("token_count"), Sentinel::TokenCount)?.resolved()
}
