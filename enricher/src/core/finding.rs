//! Finding normalization and audit.
//!
//! A surviving finding always carries `id`, `category`, `confidence`,
//! `content`, `dependencies`, `validates`, `tags`, `timestamp` and
//! `token_count`. Missing fields are synthesized; `timestamp` and
//! `token_count` get their sentinels so the enrichment pass still resolves
//! them. Entries that are not records cannot be repaired and must be dropped
//! by the caller.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::core::structure::type_name;
use crate::document::{Deferred, Sentinel};

pub const ID: &str = "id";
pub const AGENT: &str = "agent";
pub const PHASE: &str = "phase";
pub const CATEGORY: &str = "category";
pub const CONFIDENCE: &str = "confidence";
pub const CONTENT: &str = "content";
pub const DEPENDENCIES: &str = "dependencies";
pub const VALIDATES: &str = "validates";
pub const TAGS: &str = "tags";
pub const TIMESTAMP: &str = "timestamp";
pub const TOKEN_COUNT: &str = "token_count";

const DEFAULT_CATEGORY: &str = "unknown";
const DEFAULT_CONFIDENCE: f64 = 0.5;

static MICROSECOND_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.\d{6}").expect("static regex compiles")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepairError {
    #[error("entry #{position} is a {found}, not a record")]
    NotRepairable { position: usize, found: &'static str },
}

/// A finding that satisfies the Finding invariants.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFinding {
    pub record: Map<String, Value>,
    /// Fields that had to be synthesized, in insertion order.
    pub repairs: Vec<String>,
}

/// Sequence tag synthesized for a finding without an `id`.
pub fn synthesized_id(position: usize) -> String {
    format!("F-{position:03}")
}

/// Repair `entry`, the finding at 1-based `position` in its sequence.
pub fn normalize_finding(entry: Value, position: usize) -> Result<NormalizedFinding, RepairError> {
    let mut record = match entry {
        Value::Object(record) => record,
        other => {
            return Err(RepairError::NotRepairable {
                position,
                found: type_name(&other),
            });
        }
    };
    let mut repairs = Vec::new();

    let mut insert_missing = |record: &mut Map<String, Value>, key: &str, value: Value| {
        if !record.contains_key(key) {
            repairs.push(format!("added missing {key}: {value}"));
            record.insert(key.to_string(), value);
        }
    };

    insert_missing(&mut record, ID, Value::String(synthesized_id(position)));
    insert_missing(&mut record, CATEGORY, json!(DEFAULT_CATEGORY));
    insert_missing(&mut record, CONFIDENCE, json!(DEFAULT_CONFIDENCE));
    insert_missing(&mut record, CONTENT, json!({}));
    for key in [DEPENDENCIES, VALIDATES, TAGS] {
        insert_missing(&mut record, key, json!([]));
    }
    insert_missing(&mut record, TIMESTAMP, Sentinel::Timestamp.to_value());
    insert_missing(&mut record, TOKEN_COUNT, Sentinel::TokenCount.to_value());

    Ok(NormalizedFinding { record, repairs })
}

/// True if the finding still carries a per-record sentinel.
pub fn has_placeholders(record: &Map<String, Value>) -> bool {
    record.get(TIMESTAMP).is_some_and(|v| Sentinel::Timestamp.matches(v))
        || record.get(TOKEN_COUNT).is_some_and(|v| Sentinel::TokenCount.matches(v))
}

/// Writer mistakes worth reporting on a finding that carries placeholders.
///
/// Writers must leave `timestamp` and `token_count` as sentinels; values they
/// computed themselves are kept but flagged.
pub fn audit_finding(record: &Map<String, Value>) -> Vec<String> {
    let mut issues = Vec::new();

    for key in [AGENT, PHASE] {
        if !record.contains_key(key) {
            issues.push(format!("missing {key}, which cannot be synthesized"));
        }
    }

    if let Some(Deferred::Resolved(timestamp)) =
        Deferred::read(record.get(TIMESTAMP), Sentinel::Timestamp)
    {
        let text = timestamp
            .as_str()
            .map_or_else(|| timestamp.to_string(), str::to_string);
        let blank = timestamp.is_null() || text.is_empty();
        if !blank && MICROSECOND_TIMESTAMP.is_match(&text) {
            issues.push(format!(
                "writer supplied a real timestamp instead of '{}'",
                Sentinel::Timestamp.as_str()
            ));
        } else if !blank {
            issues.push(format!(
                "writer supplied invalid timestamp {text} (should be '{}')",
                Sentinel::Timestamp.as_str()
            ));
        }
    }

    match Deferred::token_count(record.get(TOKEN_COUNT), Sentinel::TokenCount) {
        Some(Deferred::Resolved(0)) => issues.push(format!(
            "writer supplied token_count=0 (should be '{}')",
            Sentinel::TokenCount.as_str()
        )),
        Some(Deferred::Resolved(count)) => issues.push(format!(
            "writer calculated token_count={count} (should be '{}')",
            Sentinel::TokenCount.as_str()
        )),
        _ => {}
    }

    match record.get(CONFIDENCE) {
        Some(confidence) if !confidence.is_number() => {
            issues.push(format!("confidence is a {}, not a number", type_name(confidence)));
        }
        _ => {}
    }

    issues
}
