//! Hook event records and the task path contract.

use std::io::Read;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::io::config::EnricherConfig;

/// Tool whose events trigger the write-bound stages.
pub const WRITE_TOOL: &str = "Write";

/// Event delivered on stdin by the host.
///
/// Only the fields the stages read are modeled; pre-write keeps the raw record
/// so it can echo unknown fields back unchanged.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HookEvent {
    pub tool_name: String,
    pub tool_input: ToolInput,
    pub transcript_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolInput {
    pub file_path: Option<String>,
    pub content: Option<String>,
}

impl HookEvent {
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("parse hook event")
    }

    pub fn is_write(&self) -> bool {
        self.tool_name == WRITE_TOOL
    }

    pub fn file_path(&self) -> Option<&str> {
        self.tool_input
            .file_path
            .as_deref()
            .filter(|path| !path.is_empty())
    }
}

/// Read the whole event from stdin.
pub fn read_stdin() -> Result<String> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("read hook event from stdin")?;
    Ok(raw)
}

/// Where a path stands with respect to task storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathCheck {
    Task,
    NotTask,
    /// Contains a `..` segment; rejected before any other check.
    Traversal,
}

pub fn classify_path(path: &str, config: &EnricherConfig) -> PathCheck {
    if Path::new(path)
        .components()
        .any(|component| component == Component::ParentDir)
    {
        return PathCheck::Traversal;
    }
    let suffix = format!(".{}", config.task_extension.trim_start_matches('.'));
    if path.contains(&config.task_dir_marker) && path.ends_with(&suffix) {
        PathCheck::Task
    } else {
        PathCheck::NotTask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_post_write_event() {
        let event = HookEvent::parse(
            r#"{"tool_name":"Write","tool_input":{"file_path":"/p/.claude/tasks/T-1.json"},"session_id":"s"}"#,
        )
        .expect("parse");
        assert!(event.is_write());
        assert_eq!(event.file_path(), Some("/p/.claude/tasks/T-1.json"));
        assert!(event.transcript_path.is_none());
    }

    #[test]
    fn parses_completion_event_without_tool_fields() {
        let event = HookEvent::parse(r#"{"transcript_path":"/tmp/t.jsonl"}"#).expect("parse");
        assert!(!event.is_write());
        assert_eq!(event.file_path(), None);
        assert_eq!(event.transcript_path, Some(PathBuf::from("/tmp/t.jsonl")));
    }

    #[test]
    fn classifies_paths() {
        let cfg = EnricherConfig::default();
        assert_eq!(
            classify_path("/repo/.claude/tasks/T-1.json", &cfg),
            PathCheck::Task
        );
        assert_eq!(
            classify_path("/repo/.claude/tasks/active/T-1.json", &cfg),
            PathCheck::Task
        );
        assert_eq!(classify_path("/repo/src/main.rs", &cfg), PathCheck::NotTask);
        assert_eq!(
            classify_path("/repo/.claude/tasks/T-1.json.bak", &cfg),
            PathCheck::NotTask
        );
        assert_eq!(
            classify_path("/repo/.claude/tasks/../secrets.json", &cfg),
            PathCheck::Traversal
        );
    }
}
