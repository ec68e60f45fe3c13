//! Phase-compression token accounting.
//!
//! A compression written with `original_token_count: "TOKENS_CALCULATE"` gets
//! all three derived fields computed at once, so a compression is never left
//! partially resolved:
//!
//! - `original_token_count`: sum of resolved `token_count`s of the findings
//!   listed in `critical_findings`.
//! - `compressed_token_count`: tokens of the `summary` text.
//! - `compression_ratio`: original / compressed rounded to one decimal, or 0
//!   when the summary is empty.
//!
//! Unresolvable references only produce warnings; the result is then an
//! underestimate.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::core::finding::{ID, TOKEN_COUNT};
use crate::core::tokens::TokenCounter;
use crate::core::types::CompressionOutcome;
use crate::document::{Deferred, Sentinel};

pub const SUMMARY: &str = "summary";
pub const CRITICAL_FINDINGS: &str = "critical_findings";
pub const ORIGINAL_TOKEN_COUNT: &str = "original_token_count";
pub const COMPRESSED_TOKEN_COUNT: &str = "compressed_token_count";
pub const COMPRESSION_RATIO: &str = "compression_ratio";

/// True if `compression` still waits for token accounting.
pub fn needs_accounting(compression: &Map<String, Value>) -> bool {
    compression
        .get(ORIGINAL_TOKEN_COUNT)
        .is_some_and(|v| Sentinel::CompressionTokens.matches(v))
}

/// Compute and write the token accounting of one phase compression.
///
/// Returns `None` when the compression is not waiting for accounting.
pub fn finalize_compression(
    compression: &mut Map<String, Value>,
    findings: &[Value],
    counter: &dyn TokenCounter,
) -> Option<CompressionOutcome> {
    if !needs_accounting(compression) {
        return None;
    }

    let mut warnings = Vec::new();
    let referenced: Vec<&str> = match compression.get(CRITICAL_FINDINGS) {
        Some(Value::Array(ids)) => ids.iter().filter_map(Value::as_str).collect(),
        None | Some(Value::Null) => Vec::new(),
        Some(_) => {
            warnings.push(format!("{CRITICAL_FINDINGS} is not a list of ids"));
            Vec::new()
        }
    };

    if referenced.is_empty() {
        warnings.push(format!(
            "no {CRITICAL_FINDINGS} listed; original token count cannot be calculated"
        ));
        let outcome = CompressionOutcome {
            original_token_count: 0,
            compressed_token_count: 0,
            compression_ratio: 0.0,
            matched: 0,
            referenced: 0,
            warnings,
        };
        write_outcome(compression, &outcome);
        return Some(outcome);
    }

    let wanted: HashSet<&str> = referenced.iter().copied().collect();
    let mut original = 0;
    let mut matched = 0;
    for record in findings.iter().filter_map(Value::as_object) {
        let Some(id) = record.get(ID).and_then(Value::as_str) else {
            continue;
        };
        if !wanted.contains(id) {
            continue;
        }
        matched += 1;
        match Deferred::token_count(record.get(TOKEN_COUNT), Sentinel::TokenCount) {
            Some(Deferred::Resolved(count)) => original += count,
            Some(Deferred::Unresolved) => {
                warnings.push(format!("{id} has no resolved token_count yet; counted as 0"));
            }
            None => warnings.push(format!("{id} has no numeric token_count; counted as 0")),
        }
    }
    if matched != referenced.len() {
        warnings.push(format!(
            "found {matched}/{} critical findings",
            referenced.len()
        ));
    }

    let summary = compression
        .get(SUMMARY)
        .and_then(Value::as_str)
        .unwrap_or_default();
    let compressed = counter.count(summary);

    let outcome = CompressionOutcome {
        original_token_count: original,
        compressed_token_count: compressed,
        compression_ratio: compression_ratio(original, compressed),
        matched,
        referenced: referenced.len(),
        warnings,
    };
    write_outcome(compression, &outcome);
    Some(outcome)
}

/// `original / compressed` rounded to one decimal, ties to even; 0 when not
/// computable.
pub fn compression_ratio(original: u64, compressed: u64) -> f64 {
    if compressed == 0 {
        return 0.0;
    }
    (original as f64 / compressed as f64 * 10.0).round_ties_even() / 10.0
}

/// Stored ratio: a one-decimal float, or the integer 0 when not computable.
fn ratio_value(outcome: &CompressionOutcome) -> Value {
    if outcome.compressed_token_count == 0 {
        Value::from(0)
    } else {
        Value::from(outcome.compression_ratio)
    }
}

fn write_outcome(compression: &mut Map<String, Value>, outcome: &CompressionOutcome) {
    compression.insert(
        ORIGINAL_TOKEN_COUNT.to_string(),
        Value::from(outcome.original_token_count),
    );
    compression.insert(
        COMPRESSED_TOKEN_COUNT.to_string(),
        Value::from(outcome.compressed_token_count),
    );
    compression.insert(COMPRESSION_RATIO.to_string(), ratio_value(outcome));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn byte_counter(text: &str) -> u64 {
        text.len() as u64
    }

    fn compression(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn findings() -> Vec<Value> {
        vec![
            json!({"id": "F-001", "token_count": 100}),
            json!({"id": "F-002", "token_count": 50}),
            json!({"id": "F-003", "token_count": 7}),
        ]
    }

    #[test]
    fn ratio_is_original_over_compressed() {
        let mut record = compression(json!({
            "summary": "a".repeat(30),
            "critical_findings": ["F-001", "F-002"],
            "original_token_count": "TOKENS_CALCULATE",
            "compressed_token_count": "TOKENS_CALCULATE",
            "compression_ratio": "TOKENS_CALCULATE",
            "timestamp": "2026-10-19T09:30:00"
        }));
        let outcome = finalize_compression(&mut record, &findings(), &byte_counter).expect("runs");
        assert_eq!(outcome.original_token_count, 150);
        assert_eq!(outcome.compressed_token_count, 30);
        assert!((outcome.compression_ratio - 5.0).abs() < f64::EPSILON);
        assert!(outcome.warnings.is_empty());
        assert_eq!(record["original_token_count"], json!(150));
        assert_eq!(record["compressed_token_count"], json!(30));
        assert_eq!(record["compression_ratio"], json!(5.0));
        assert_eq!(record["timestamp"], "2026-10-19T09:30:00");
    }

    #[test]
    fn empty_reference_list_zeroes_all_fields() {
        let mut record = compression(json!({
            "summary": "short",
            "critical_findings": [],
            "original_token_count": "TOKENS_CALCULATE"
        }));
        let outcome = finalize_compression(&mut record, &findings(), &byte_counter).expect("runs");
        assert_eq!(outcome.original_token_count, 0);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(record["original_token_count"], json!(0));
        assert_eq!(record["compressed_token_count"], json!(0));
        assert_eq!(record["compression_ratio"], json!(0));
    }

    #[test]
    fn missing_reference_yields_partial_sum_and_warning() {
        let mut record = compression(json!({
            "summary": "ten bytes!",
            "critical_findings": ["F-001", "F-404"],
            "original_token_count": "TOKENS_CALCULATE"
        }));
        let outcome = finalize_compression(&mut record, &findings(), &byte_counter).expect("runs");
        assert_eq!(outcome.original_token_count, 100);
        assert_eq!((outcome.matched, outcome.referenced), (1, 2));
        assert_eq!(outcome.warnings, vec!["found 1/2 critical findings".to_string()]);
        assert!((outcome.compression_ratio - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_summary_gives_zero_ratio() {
        let mut record = compression(json!({
            "critical_findings": ["F-003"],
            "original_token_count": "TOKENS_CALCULATE"
        }));
        let outcome = finalize_compression(&mut record, &findings(), &byte_counter).expect("runs");
        assert_eq!(outcome.original_token_count, 7);
        assert_eq!(outcome.compressed_token_count, 0);
        assert_eq!(record["compression_ratio"], json!(0));
    }

    #[test]
    fn resolved_compression_is_not_recomputed() {
        let mut record = compression(json!({
            "summary": "x",
            "critical_findings": ["F-001"],
            "original_token_count": 100,
            "compressed_token_count": 1,
            "compression_ratio": 100.0
        }));
        let before = record.clone();
        assert!(finalize_compression(&mut record, &findings(), &byte_counter).is_none());
        assert_eq!(record, before);
    }

    #[test]
    fn unresolved_finding_counts_contribute_nothing() {
        let findings = vec![
            json!({"id": "F-001", "token_count": "TOKEN_COUNT_PH"}),
            json!({"id": "F-002", "token_count": 40}),
        ];
        let mut record = compression(json!({
            "summary": "abcd",
            "critical_findings": ["F-001", "F-002"],
            "original_token_count": "TOKENS_CALCULATE"
        }));
        let outcome = finalize_compression(&mut record, &findings, &byte_counter).expect("runs");
        assert_eq!(outcome.original_token_count, 40);
        assert_eq!(outcome.matched, 2);
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn ratio_rounds_to_one_decimal() {
        assert!((compression_ratio(100, 3) - 33.3).abs() < 1e-9);
        assert!((compression_ratio(2, 3) - 0.7).abs() < 1e-9);
        assert!(compression_ratio(5, 0).abs() < f64::EPSILON);
    }

    #[test]
    fn ratio_ties_round_to_even() {
        assert!((compression_ratio(5, 4) - 1.2).abs() < 1e-9);
        assert!((compression_ratio(1, 4) - 0.2).abs() < 1e-9);
        assert!((compression_ratio(7, 4) - 1.8).abs() < 1e-9);
    }

    #[test]
    fn repeated_reference_counts_toward_the_mismatch() {
        let mut record = compression(json!({
            "summary": "abcd",
            "critical_findings": ["F-001", "F-001"],
            "original_token_count": "TOKENS_CALCULATE"
        }));
        let outcome = finalize_compression(&mut record, &findings(), &byte_counter).expect("runs");
        assert_eq!(outcome.original_token_count, 100);
        assert_eq!((outcome.matched, outcome.referenced), (1, 2));
        assert_eq!(outcome.warnings, vec!["found 1/2 critical findings".to_string()]);
        assert_eq!(record["compression_ratio"], json!(25.0));
    }
}
