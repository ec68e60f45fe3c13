//! Structural contracts of a parsed task document.
//!
//! - `knowledge_pool.phase_compressions` is a mapping (absent or sequence
//!   values become `{}`).
//! - `knowledge_pool.findings`, `.decisions`, `.blockers` exist (default `[]`).
//! - `phase_compressions` fields found outside `knowledge_pool` with an empty
//!   value are upstream duplication artifacts and are removed.
//!
//! Documents without a `knowledge_pool` are left alone apart from the sweep;
//! creating the pool is the job of initialization.

use serde_json::{Map, Value};

use crate::core::types::PassReport;
use crate::document::{
    BLOCKERS, DECISIONS, FINDINGS, KNOWLEDGE_POOL, PHASE_COMPRESSIONS, default_knowledge_pool,
    is_empty_value,
};

/// Repair the document in place. Every mutation is recorded as a fix.
pub fn validate_structure(doc: &mut Value) -> PassReport {
    let mut report = PassReport::default();
    let Some(root) = doc.as_object_mut() else {
        report.warn("document root is not an object");
        return report;
    };

    if let Some(pool) = root.get_mut(KNOWLEDGE_POOL) {
        ensure_pool_containers(pool, &mut report);
    }
    sweep_stray_compressions(root, "", &mut report);
    report
}

/// Ensure the four knowledge-pool containers exist with the right shape.
pub fn ensure_pool_containers(pool: &mut Value, report: &mut PassReport) {
    let Some(pool_map) = pool.as_object_mut() else {
        report.fix(format!(
            "replaced non-object {KNOWLEDGE_POOL} ({}) with defaults",
            type_name(pool)
        ));
        *pool = default_knowledge_pool();
        return;
    };

    match pool_map.get(PHASE_COMPRESSIONS) {
        None => {
            pool_map.insert(PHASE_COMPRESSIONS.to_string(), Value::Object(Map::new()));
            report.fix(format!("added missing {KNOWLEDGE_POOL}.{PHASE_COMPRESSIONS}"));
        }
        Some(Value::Object(_)) => {}
        Some(other) => {
            let found = type_name(other);
            pool_map.insert(PHASE_COMPRESSIONS.to_string(), Value::Object(Map::new()));
            report.fix(format!(
                "replaced {KNOWLEDGE_POOL}.{PHASE_COMPRESSIONS} ({found}) with an empty mapping"
            ));
        }
    }

    for key in [FINDINGS, DECISIONS, BLOCKERS] {
        match pool_map.get(key) {
            None | Some(Value::Null) => {
                pool_map.insert(key.to_string(), Value::Array(Vec::new()));
                report.fix(format!("added missing {KNOWLEDGE_POOL}.{key}"));
            }
            Some(Value::Array(_)) => {}
            Some(other) => report.warn(format!(
                "{KNOWLEDGE_POOL}.{key} is {} instead of an array; left as is",
                type_name(other)
            )),
        }
    }
}

/// Remove empty `phase_compressions` fields outside `knowledge_pool`.
fn sweep_stray_compressions(map: &mut Map<String, Value>, path: &str, report: &mut PassReport) {
    if map.get(PHASE_COMPRESSIONS).is_some_and(is_empty_value) {
        map.shift_remove(PHASE_COMPRESSIONS);
        report.fix(format!(
            "removed empty {} outside {KNOWLEDGE_POOL}",
            join_path(path, PHASE_COMPRESSIONS)
        ));
    }

    for (key, value) in map.iter_mut() {
        if path.is_empty() && key == KNOWLEDGE_POOL {
            continue;
        }
        sweep_value(value, &join_path(path, key), report);
    }
}

fn sweep_value(value: &mut Value, path: &str, report: &mut PassReport) {
    match value {
        Value::Object(map) => sweep_stray_compressions(map, path, report),
        Value::Array(items) => {
            for (index, item) in items.iter_mut().enumerate() {
                sweep_value(item, &format!("{path}[{index}]"), report);
            }
        }
        _ => {}
    }
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
