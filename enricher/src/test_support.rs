//! Test-only helpers for building task documents and task directories.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use tempfile::TempDir;

use crate::core::tokens::TokenCounter;
use crate::io::config::{EnricherConfig, ReadinessConfig};

/// Fixed pass instant for exact-match assertions.
pub const NOW: &str = "2026-10-19T09:30:00.000000-04:00";

/// Deterministic counter: one token per whitespace-separated word.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordCounter;

impl TokenCounter for WordCounter {
    fn count(&self, text: &str) -> u64 {
        text.split_whitespace().count() as u64
    }
}

/// A finding as a writer leaves it: placeholders for timestamp and count.
pub fn pending_finding(id: &str, phase: &str, content: Value) -> Value {
    json!({
        "id": id,
        "agent": "architect",
        "phase": phase,
        "category": "analysis",
        "confidence": 0.8,
        "content": content,
        "dependencies": [],
        "validates": [],
        "tags": [],
        "timestamp": "TIMESTAMP_PH",
        "token_count": "TOKEN_COUNT_PH"
    })
}

/// A finding whose placeholders are already resolved.
pub fn resolved_finding(id: &str, phase: &str, token_count: u64) -> Value {
    let mut finding = pending_finding(id, phase, json!({"summary": id}));
    finding["timestamp"] = json!(NOW);
    finding["token_count"] = json!(token_count);
    finding
}

/// A new task document as written, before initialization.
pub fn new_task(task_id: &str) -> Value {
    json!({
        "task_id": task_id,
        "_NEEDS_INITIALIZATION": true,
        "_INSTRUCTIONS": {"findings": "append to knowledge_pool.findings"},
        "title": format!("{task_id} title"),
        "execution_plan": {"phases": [
            {"name": "design", "output_tokens": "TOKEN_COUNT_PH"},
            {"name": "implementation", "output_tokens": "TOKEN_COUNT_PH"}
        ]}
    })
}

/// Config that never sleeps while polling.
pub fn instant_config() -> EnricherConfig {
    EnricherConfig {
        readiness: ReadinessConfig {
            attempts: 2,
            delay_ms: 0,
            min_bytes: 50,
        },
        active_dir: None,
        ..EnricherConfig::default()
    }
}

/// A temporary project with a `.claude/tasks/` directory.
pub struct TaskDir {
    _temp: TempDir,
    root: PathBuf,
}

impl TaskDir {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().to_path_buf();
        fs::create_dir_all(root.join(".claude/tasks/active")).expect("create task dir");
        Self { _temp: temp, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn task_path(&self, name: &str) -> PathBuf {
        self.root.join(".claude/tasks").join(name)
    }

    pub fn active_dir(&self) -> PathBuf {
        self.root.join(".claude/tasks/active")
    }

    /// Write `doc` pretty-printed, as an agent would.
    pub fn write(&self, path: &Path, doc: &Value) {
        let text = serde_json::to_string_pretty(doc).expect("serialize");
        fs::write(path, text).expect("write task");
    }

    pub fn read(&self, path: &Path) -> Value {
        let text = fs::read_to_string(path).expect("read task");
        serde_json::from_str(&text).expect("parse task")
    }

    /// JSON Lines transcript naming `paths` as written.
    pub fn transcript(&self, paths: &[&Path]) -> PathBuf {
        let lines: Vec<String> = paths
            .iter()
            .map(|path| {
                json!({
                    "type": "tool_use",
                    "name": "Write",
                    "arguments": {"file_path": path.to_string_lossy()}
                })
                .to_string()
            })
            .collect();
        let transcript = self.root.join("transcript.jsonl");
        fs::write(&transcript, lines.join("\n")).expect("write transcript");
        transcript
    }
}

impl Default for TaskDir {
    fn default() -> Self {
        Self::new()
    }
}

/// Hook event for a `Write` of `path`.
pub fn write_event(path: &Path) -> Value {
    json!({
        "tool_name": "Write",
        "tool_input": {"file_path": path.to_string_lossy()}
    })
}
