//! Task documents touched during a session.
//!
//! A transcript is JSON Lines; each tool invocation is an entry like
//! `{"type": "tool_use", "name": "Write", "arguments": {"file_path": ...}}`.
//! Lines that do not parse are skipped: the host may still be appending.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::io::config::EnricherConfig;
use crate::io::event::{PathCheck, classify_path};

const TOOL_USE: &str = "tool_use";
const FILE_TOOLS: [&str; 3] = ["Write", "Edit", "Read"];

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default, alias = "input")]
    arguments: Value,
}

/// Task document paths named by file-tool entries, in first-seen order.
pub fn task_paths_from_transcript(path: &Path, config: &EnricherConfig) -> Result<Vec<String>> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(task_paths_from_lines(&raw, config))
}

pub fn task_paths_from_lines(raw: &str, config: &EnricherConfig) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for (index, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entry: Entry = match serde_json::from_str(line) {
            Ok(entry) => entry,
            Err(err) => {
                debug!(line = index + 1, %err, "skip unparseable transcript line");
                continue;
            }
        };
        if entry.kind != TOOL_USE || !FILE_TOOLS.contains(&entry.name.as_str()) {
            continue;
        }
        let Some(file_path) = entry.arguments.get("file_path").and_then(Value::as_str) else {
            continue;
        };
        if classify_path(file_path, config) == PathCheck::NotTask {
            continue;
        }
        if !found.iter().any(|seen| seen == file_path) {
            debug!(tool = %entry.name, path = file_path, "task document in transcript");
            found.push(file_path.to_string());
        }
    }
    found
}

/// Task documents directly inside `dir`, sorted by path.
///
/// A missing directory yields no paths.
pub fn active_task_paths(dir: &Path, config: &EnricherConfig) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let extension = config.task_extension.trim_start_matches('.');
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read directory {}", dir.display()))? {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
