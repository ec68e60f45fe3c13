//! Textual duplicate-key repair.
//!
//! JSON parsers keep the last of several identical keys in one object and drop
//! the rest without a trace, so writers that append a second
//! `"phase_compressions": {}` after a populated one silently lose data. This
//! pass runs on the raw text, before parsing, and uses indentation as a proxy
//! for nesting depth:
//!
//! - The scope opens on a line declaring `scope_key` with a block value and
//!   closes on the first later line at or left of that indentation that starts
//!   with a closing delimiter.
//! - Inside the scope only direct members are considered, i.e. lines at the
//!   indentation of the scope's first member.
//! - The first non-trivial occurrence of `repeated_key` is kept, and every
//!   later occurrence is deleted together with its whole value block.
//! - A trivial (`{}`, `[]`, `null`) occurrence is held back: it is deleted
//!   once a non-trivial occurrence follows, and kept otherwise. A lone empty
//!   member is never removed.
//! - A trailing comma left dangling before a closing delimiter by a deletion
//!   is stripped so the output still parses.
//!
//! Documents that are not pretty-printed (one object per line) pass through
//! unchanged.

use crate::core::types::DuplicateRepair;

#[derive(Debug)]
struct Scope {
    indent: usize,
    member_indent: Option<usize>,
    kept: bool,
    /// Output line of the trivial occurrence emitted while nothing is kept.
    pending: Option<usize>,
}

/// Remove duplicate `repeated_key` members inside every `scope_key` object.
pub fn repair_duplicate_keys(raw: &str, scope_key: &str, repeated_key: &str) -> DuplicateRepair {
    let mut out = Output::default();
    let mut scope: Option<Scope> = None;
    let mut skipping: Option<usize> = None;
    let mut removed = 0;
    let mut lines_removed = 0;

    for line in raw.split('\n') {
        let indent = indent_of(line);

        if let Some(block_indent) = skipping {
            lines_removed += 1;
            if indent <= block_indent && starts_with_closer(line) {
                skipping = None;
            }
            out.mark_deletion();
            continue;
        }

        let Some(current) = scope.as_mut() else {
            let opens_scope = member_value(line, scope_key)
                .is_some_and(|value| value.starts_with('{') && opens_block(value));
            if opens_scope {
                scope = Some(Scope {
                    indent,
                    member_indent: None,
                    kept: false,
                    pending: None,
                });
            }
            out.emit(line);
            continue;
        };

        if !line.trim().is_empty() && indent <= current.indent && starts_with_closer(line) {
            scope = None;
            out.emit(line);
            continue;
        }

        if current.member_indent.is_none() && !line.trim().is_empty() {
            current.member_indent = Some(indent);
        }

        let is_member = current.member_indent == Some(indent);
        let value = if is_member {
            member_value(line, repeated_key)
        } else {
            None
        };
        let Some(value) = value else {
            out.emit(line);
            continue;
        };

        if !current.kept {
            if !is_trivial(value) {
                if let Some(index) = current.pending.take() {
                    out.lines.remove(index);
                    removed += 1;
                    lines_removed += 1;
                }
                current.kept = true;
                out.emit(line);
                continue;
            }
            if current.pending.is_none() {
                current.pending = Some(out.lines.len());
                out.emit(line);
                continue;
            }
        }

        removed += 1;
        lines_removed += 1;
        if opens_block(value) {
            skipping = Some(indent);
        }
        out.mark_deletion();
    }

    if removed == 0 {
        return DuplicateRepair {
            text: raw.to_string(),
            removed,
            lines_removed,
        };
    }

    DuplicateRepair {
        text: out.lines.join("\n"),
        removed,
        lines_removed,
    }
}

#[derive(Default)]
struct Output {
    lines: Vec<String>,
    after_deletion: bool,
}

impl Output {
    fn mark_deletion(&mut self) {
        self.after_deletion = true;
    }

    fn emit(&mut self, line: &str) {
        if self.after_deletion && starts_with_closer(line) {
            self.strip_dangling_comma();
        }
        if !line.trim().is_empty() {
            self.after_deletion = false;
        }
        self.lines.push(line.to_string());
    }

    fn strip_dangling_comma(&mut self) {
        let Some(last) = self.lines.iter_mut().rev().find(|l| !l.trim().is_empty()) else {
            return;
        };
        let end = last.trim_end().len();
        if last[..end].ends_with(',') {
            last.replace_range(end - 1..end, "");
        }
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn starts_with_closer(line: &str) -> bool {
    line.trim_start().starts_with(['}', ']'])
}

/// Value text of a line declaring `"key": value`, if it does.
fn member_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let rest = line.trim_start().strip_prefix('"')?;
    let rest = rest.strip_prefix(key)?.strip_prefix('"')?;
    let rest = rest.trim_start().strip_prefix(':')?;
    Some(rest.trim())
}

fn value_body(value: &str) -> &str {
    value.trim().trim_end_matches(',').trim_end()
}

fn opens_block(value: &str) -> bool {
    value_body(value).ends_with(['{', '['])
}

fn is_trivial(value: &str) -> bool {
    let compact: String = value_body(value)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    matches!(compact.as_str(), "{}" | "[]" | "null" | "\"\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    const SCOPE: &str = "knowledge_pool";
    const KEY: &str = "phase_compressions";

    fn repair(raw: &str) -> (Value, DuplicateRepair) {
        let repaired = repair_duplicate_keys(raw, SCOPE, KEY);
        let parsed: Value = serde_json::from_str(&repaired.text).expect("repaired text parses");
        (parsed, repaired)
    }

    fn occurrences(text: &str) -> usize {
        text.matches("\"phase_compressions\"").count()
    }

    #[test]
    fn empty_first_occurrence_yields_to_populated_one() {
        let raw = r#"{
  "task_id": "T-1",
  "knowledge_pool": {
    "findings": [],
    "phase_compressions": {},
    "decisions": [],
    "blockers": [],
    "phase_compressions": {
      "design": {
        "summary": "compressed design",
        "critical_findings": ["F-001"]
      }
    }
  }
}"#;
        let (parsed, repaired) = repair(raw);
        assert_eq!(repaired.removed, 1);
        assert_eq!(repaired.lines_removed, 1);
        assert_eq!(occurrences(&repaired.text), 1);
        assert_eq!(
            parsed["knowledge_pool"]["phase_compressions"]["design"]["summary"],
            "compressed design"
        );
    }

    #[test]
    fn lone_empty_occurrence_is_kept() {
        let raw = r#"{
  "task_id": "T-1",
  "knowledge_pool": {
    "findings": [],
    "phase_compressions": {},
    "decisions": [],
    "blockers": []
  }
}"#;
        let repaired = repair_duplicate_keys(raw, SCOPE, KEY);
        assert_eq!(repaired.removed, 0);
        assert!(!repaired.changed());
        assert_eq!(repaired.text, raw);
    }

    #[test]
    fn repeated_empty_occurrences_collapse_to_the_first() {
        let raw = r#"{
  "knowledge_pool": {
    "phase_compressions": {},
    "findings": [],
    "phase_compressions": {}
  }
}"#;
        let (parsed, repaired) = repair(raw);
        assert_eq!(repaired.removed, 1);
        assert_eq!(occurrences(&repaired.text), 1);
        assert_eq!(parsed["knowledge_pool"]["phase_compressions"], serde_json::json!({}));
        assert_eq!(parsed["knowledge_pool"]["findings"], serde_json::json!([]));
    }

    #[test]
    fn held_back_empty_occurrence_yields_after_another_empty_one() {
        let raw = r#"{
  "knowledge_pool": {
    "phase_compressions": {},
    "phase_compressions": [],
    "phase_compressions": {
      "design": {}
    }
  }
}"#;
        let (parsed, repaired) = repair(raw);
        assert_eq!(repaired.removed, 2);
        assert_eq!(occurrences(&repaired.text), 1);
        assert!(parsed["knowledge_pool"]["phase_compressions"]["design"].is_object());
    }

    #[test]
    fn later_populated_duplicate_is_removed_with_nested_lines() {
        let raw = r#"{
  "knowledge_pool": {
    "findings": [],
    "phase_compressions": {
      "design": {
        "summary": "first"
      }
    },
    "decisions": [],
    "phase_compressions": {
      "implementation": {
        "summary": "second",
        "notes": {
          "phase_compressions": {
            "inner": {}
          }
        }
      }
    }
  }
}"#;
        let (parsed, repaired) = repair(raw);
        assert_eq!(repaired.removed, 1);
        assert_eq!(repaired.lines_removed, 10);
        assert_eq!(occurrences(&repaired.text), 1);
        assert!(!repaired.text.contains("second"));
        assert!(!repaired.text.contains("inner"));
        let compressions = &parsed["knowledge_pool"]["phase_compressions"];
        assert_eq!(compressions["design"]["summary"], "first");
        assert!(compressions.get("implementation").is_none());
        assert_eq!(parsed["knowledge_pool"]["decisions"], serde_json::json!([]));
    }

    #[test]
    fn trailing_inline_duplicate_does_not_leave_dangling_comma() {
        let raw = r#"{
  "knowledge_pool": {
    "phase_compressions": {
      "design": {"summary": "kept"}
    },
    "blockers": [],
    "phase_compressions": {}
  },
  "updated_at": "2026-01-01T00:00:00"
}"#;
        let (parsed, repaired) = repair(raw);
        assert_eq!(repaired.removed, 1);
        assert!(repaired.text.contains("\"blockers\": []\n"));
        assert_eq!(
            parsed["knowledge_pool"]["phase_compressions"]["design"]["summary"],
            "kept"
        );
    }

    #[test]
    fn deeper_keys_inside_kept_block_are_not_duplicates() {
        let raw = r#"{
  "knowledge_pool": {
    "phase_compressions": {
      "design": {
        "phase_compressions": "mentioned in content"
      }
    }
  }
}"#;
        let repaired = repair_duplicate_keys(raw, SCOPE, KEY);
        assert_eq!(repaired.removed, 0);
        assert_eq!(repaired.text, raw);
    }

    #[test]
    fn occurrences_outside_scope_are_untouched() {
        let raw = r#"{
  "phase_compressions": {},
  "knowledge_pool": {
    "phase_compressions": {
      "design": {}
    }
  },
  "execution_plan": {
    "phase_compressions": {}
  }
}"#;
        let repaired = repair_duplicate_keys(raw, SCOPE, KEY);
        assert_eq!(repaired.removed, 0);
        assert_eq!(occurrences(&repaired.text), 3);
    }

    #[test]
    fn minified_documents_pass_through() {
        let raw = r#"{"knowledge_pool":{"phase_compressions":{},"phase_compressions":{"a":{}}}}"#;
        let repaired = repair_duplicate_keys(raw, SCOPE, KEY);
        assert!(!repaired.changed());
        assert_eq!(repaired.text, raw);
    }

    #[test]
    fn array_valued_duplicate_block_is_removed() {
        let raw = r#"{
  "knowledge_pool": {
    "phase_compressions": {
      "design": {}
    },
    "phase_compressions": [
      {
        "phase": "design"
      }
    ],
    "findings": []
  }
}"#;
        let (parsed, repaired) = repair(raw);
        assert_eq!(repaired.removed, 1);
        assert_eq!(repaired.lines_removed, 5);
        assert!(parsed["knowledge_pool"]["phase_compressions"].is_object());
    }
}
