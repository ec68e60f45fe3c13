//! Pre-write validation.
//!
//! Runs on the content a writer is about to persist, before it reaches
//! storage: duplicate-key repair on the raw text, then structural validation.
//! The stage never touches the file; it hands back the event with
//! `tool_input.content` substituted when a fix was applied.

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::structure::validate_structure;
use crate::io::config::EnricherConfig;
use crate::io::event::{PathCheck, WRITE_TOOL, classify_path};
use crate::io::task_store::{render_task, repair_text};
use crate::pass::log_report;

const STAGE: &str = "pre-write";

/// Validate the event's proposed content and return the event to emit.
pub fn run(raw_event: &str, config: &EnricherConfig) -> Result<String> {
    let mut event: Value = serde_json::from_str(raw_event).context("parse hook event")?;
    if let Some(content) = rewritten_content(&event, config) {
        event["tool_input"]["content"] = Value::String(content);
    }
    serde_json::to_string(&event).context("serialize hook event")
}

fn rewritten_content(event: &Value, config: &EnricherConfig) -> Option<String> {
    if event.get("tool_name").and_then(Value::as_str) != Some(WRITE_TOOL) {
        debug!(stage = STAGE, "not a write; passing through");
        return None;
    }
    let tool_input = event.get("tool_input")?;
    let path = tool_input.get("file_path").and_then(Value::as_str)?;
    match classify_path(path, config) {
        PathCheck::Task => {}
        PathCheck::NotTask => {
            debug!(stage = STAGE, path, "not a task document; passing through");
            return None;
        }
        PathCheck::Traversal => {
            warn!(stage = STAGE, path, "rejected path with parent-directory segment");
            return None;
        }
    }
    let content = tool_input
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default();
    validate_content(content)
}

/// Repaired content, or `None` when the content should be written as is.
///
/// Unparseable content is left alone so the write fails on its own terms.
pub fn validate_content(content: &str) -> Option<String> {
    if content.trim().is_empty() {
        warn!(stage = STAGE, "empty content; skipping validation");
        return None;
    }

    let repair = repair_text(content);
    let mut doc: Value = match serde_json::from_str(&repair.text) {
        Ok(doc) => doc,
        Err(err) => {
            let preview: String = content.chars().take(200).collect();
            warn!(
                stage = STAGE,
                %err,
                preview = %preview,
                "content is not valid JSON; leaving unchanged"
            );
            return None;
        }
    };
    if repair.changed() {
        info!(
            stage = STAGE,
            removed = repair.removed,
            lines = repair.lines_removed,
            "removed duplicate phase_compressions"
        );
    }

    let report = validate_structure(&mut doc);
    log_report(STAGE, &doc, &report);
    if !repair.changed() && !report.changed() {
        return None;
    }
    match render_task(&doc) {
        Ok(rendered) => Some(rendered),
        Err(err) => {
            warn!(stage = STAGE, error = %format!("{err:#}"), "could not render repaired content");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_event(path: &str, content: &str) -> String {
        json!({
            "session_id": "abc",
            "tool_name": "Write",
            "tool_input": {"file_path": path, "content": content}
        })
        .to_string()
    }

    fn emitted_content(output: &str) -> String {
        let event: Value = serde_json::from_str(output).expect("event json");
        event["tool_input"]["content"]
            .as_str()
            .expect("content")
            .to_string()
    }

    #[test]
    fn adds_missing_compressions_mapping() {
        let content = json!({
            "task_id": "T-1",
            "knowledge_pool": {"findings": [], "decisions": [], "blockers": []}
        })
        .to_string();
        let output = run(
            &write_event("/r/.claude/tasks/T-1.json", &content),
            &EnricherConfig::default(),
        )
        .expect("run");
        let rewritten: Value = serde_json::from_str(&emitted_content(&output)).expect("json");
        assert_eq!(rewritten["knowledge_pool"]["phase_compressions"], json!({}));
        let event: Value = serde_json::from_str(&output).expect("json");
        assert_eq!(event["session_id"], "abc");
    }

    #[test]
    fn repairs_duplicate_keys_before_parsing() {
        let content = "{\n  \"knowledge_pool\": {\n    \"findings\": [],\n    \"phase_compressions\": {},\n    \"decisions\": [],\n    \"blockers\": [],\n    \"phase_compressions\": {\n      \"design\": {\n        \"summary\": \"kept\"\n      }\n    }\n  }\n}";
        let rewritten = validate_content(content).expect("rewritten");
        assert_eq!(rewritten.matches("\"phase_compressions\"").count(), 1);
        let doc: Value = serde_json::from_str(&rewritten).expect("json");
        assert_eq!(
            doc["knowledge_pool"]["phase_compressions"]["design"]["summary"],
            "kept"
        );
    }

    #[test]
    fn valid_content_is_not_rewritten() {
        let content = json!({
            "knowledge_pool": {
                "findings": [], "phase_compressions": {}, "decisions": [], "blockers": []
            }
        })
        .to_string();
        assert!(validate_content(&content).is_none());
    }

    #[test]
    fn invalid_and_empty_content_pass_through() {
        assert!(validate_content("{\"task_id\": ").is_none());
        assert!(validate_content("  \n").is_none());
    }

    #[test]
    fn non_task_and_non_write_events_are_echoed() {
        let config = EnricherConfig::default();
        let content = json!({"knowledge_pool": {}}).to_string();

        let other = write_event("/r/notes/T-1.json", &content);
        let output = run(&other, &config).expect("run");
        assert_eq!(emitted_content(&output), content);

        let edit = json!({"tool_name": "Edit", "tool_input": {"file_path": "/r/.claude/tasks/T-1.json"}});
        let output = run(&edit.to_string(), &config).expect("run");
        assert_eq!(serde_json::from_str::<Value>(&output).expect("json"), edit);
    }

    #[test]
    fn unparseable_event_is_an_error() {
        assert!(run("not json", &EnricherConfig::default()).is_err());
    }
}
