//! Placeholder resolution.
//!
//! Writers cannot compute timestamps or token counts themselves, so they leave
//! sentinels that this engine resolves in a fixed order:
//!
//! 1. Timestamp sentinels, anywhere in the document, become `now`.
//! 2. Finding and artifact `token_count` sentinels are counted from the
//!    record's serialized `content`.
//! 3. Phase `output_tokens` sentinels become the sum of resolved
//!    `token_count`s of `knowledge_pool.findings` in that phase.
//!
//! Step 3 only sees counts that are already numbers: a finding whose count is
//! still a sentinel at that point is left out of the sum. Running step 2 first
//! makes every record finding count within the same pass.
//!
//! Only sentinel → value transitions happen, so a second run over the output
//! changes nothing.

use serde_json::{Map, Value};

use crate::core::finding::{CONTENT, ID, PHASE, TOKEN_COUNT};
use crate::core::tokens::TokenCounter;
use crate::core::types::PassReport;
use crate::document::{Collection, Sentinel, resolved_token_count, stamp_updated_at};

pub const OUTPUT_TOKENS: &str = "output_tokens";
const PHASE_NAME: &str = "name";
const ARTIFACT_PATH: &str = "path";

/// Resolve every per-record sentinel in `doc`, stamping `updated_at` with
/// `now` if anything changed.
pub fn enrich_placeholders(doc: &mut Value, now: &str, counter: &dyn TokenCounter) -> PassReport {
    let mut report = PassReport::default();

    let timestamps = resolve_sentinel(doc, Sentinel::Timestamp, now);
    if timestamps > 0 {
        report.fix(format!(
            "replaced {timestamps} {} placeholder(s) with {now}",
            Sentinel::Timestamp.as_str()
        ));
    }

    for collection in [Collection::Findings, Collection::DesignFindings] {
        resolve_finding_counts(doc, collection, counter, &mut report);
    }
    resolve_artifact_counts(doc, counter, &mut report);
    aggregate_phase_tokens(doc, &mut report);

    if report.changed() {
        stamp_updated_at(doc, now);
    }
    report
}

/// Replace every string equal to `sentinel` with `replacement`, at any depth.
///
/// Returns the number of replacements.
pub fn resolve_sentinel(value: &mut Value, sentinel: Sentinel, replacement: &str) -> usize {
    match value {
        Value::String(_) if sentinel.matches(value) => {
            *value = Value::String(replacement.to_string());
            1
        }
        Value::Array(items) => items
            .iter_mut()
            .map(|item| resolve_sentinel(item, sentinel, replacement))
            .sum(),
        Value::Object(map) => map
            .values_mut()
            .map(|item| resolve_sentinel(item, sentinel, replacement))
            .sum(),
        _ => 0,
    }
}

fn resolve_finding_counts(
    doc: &mut Value,
    collection: Collection,
    counter: &dyn TokenCounter,
    report: &mut PassReport,
) {
    let Some(findings) = collection.get_mut(doc) else {
        return;
    };
    for (index, finding) in findings.iter_mut().enumerate() {
        let Some(record) = finding.as_object_mut() else {
            continue;
        };
        if !record.get(TOKEN_COUNT).is_some_and(|v| Sentinel::TokenCount.matches(v)) {
            continue;
        }
        let text = record.get(CONTENT).map_or_else(|| "{}".to_string(), Value::to_string);
        let count = counter.count(&text);
        record.insert(TOKEN_COUNT.to_string(), Value::from(count));
        report.fix(format!(
            "{} {}: token_count={count}",
            collection.label(),
            record_label(record, ID, index)
        ));
    }
}

fn resolve_artifact_counts(doc: &mut Value, counter: &dyn TokenCounter, report: &mut PassReport) {
    let Some(artifacts) = Collection::Artifacts.get_mut(doc) else {
        return;
    };
    for (index, artifact) in artifacts.iter_mut().enumerate() {
        let record = match artifact {
            Value::Object(record) => record,
            Value::String(_) => continue,
            _ => {
                report.warn(format!(
                    "{} #{index} is neither a record nor a path; skipped",
                    Collection::Artifacts.label()
                ));
                continue;
            }
        };
        if !record.get(TOKEN_COUNT).is_some_and(|v| Sentinel::TokenCount.matches(v)) {
            continue;
        }
        let text = match record.get(CONTENT) {
            Some(content) => content.to_string(),
            None => Value::Object(record.clone()).to_string(),
        };
        let count = counter.count(&text);
        record.insert(TOKEN_COUNT.to_string(), Value::from(count));
        report.fix(format!(
            "{} {}: token_count={count}",
            Collection::Artifacts.label(),
            record_label(record, ARTIFACT_PATH, index)
        ));
    }
}

fn aggregate_phase_tokens(doc: &mut Value, report: &mut PassReport) {
    let findings = Collection::Findings.get(doc).cloned().unwrap_or_default();
    let Some(phases) = Collection::Phases.get_mut(doc) else {
        return;
    };
    for phase in phases.iter_mut() {
        let Some(record) = phase.as_object_mut() else {
            continue;
        };
        if !record.get(OUTPUT_TOKENS).is_some_and(|v| Sentinel::TokenCount.matches(v)) {
            continue;
        }
        let name = record
            .get(PHASE_NAME)
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let (total, counted) = phase_output_tokens(&findings, &name);
        record.insert(OUTPUT_TOKENS.to_string(), Value::from(total));
        report.fix(format!(
            "phase {name}: output_tokens={total} ({counted} findings)"
        ));
    }
}

/// Sum of resolved `token_count`s of findings whose `phase` is `phase`.
///
/// Returns the sum and the number of findings that contributed. Findings
/// whose count is still a sentinel (or not a number) are excluded.
pub fn phase_output_tokens(findings: &[Value], phase: &str) -> (u64, usize) {
    findings
        .iter()
        .filter_map(Value::as_object)
        .filter(|record| record.get(PHASE).and_then(Value::as_str) == Some(phase))
        .filter_map(resolved_token_count)
        .fold((0, 0), |(total, counted), count| (total + count, counted + 1))
}

fn record_label(record: &Map<String, Value>, key: &str, index: usize) -> String {
    match record.get(key).and_then(Value::as_str) {
        Some(label) => label.to_string(),
        None => format!("#{index}"),
    }
}
