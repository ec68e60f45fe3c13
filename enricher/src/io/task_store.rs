//! Task documents on disk.
//!
//! The host writes task documents from another process, so a stage first
//! polls until the file looks complete, then parses it through the textual
//! duplicate-key repair. Rewrites are pretty-printed with 2-space indentation
//! and land atomically.

use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

use crate::core::duplicate_keys::repair_duplicate_keys;
use crate::core::types::DuplicateRepair;
use crate::document::{KNOWLEDGE_POOL, PHASE_COMPRESSIONS};
use crate::io::config::ReadinessConfig;

/// A parsed task document and the textual repair applied before parsing.
#[derive(Debug, Clone)]
pub struct LoadedTask {
    pub doc: Value,
    pub repair: DuplicateRepair,
}

/// Poll `path` until its content is larger than `min_bytes`.
///
/// Sleeps `delay_ms` before every attempt. Returns `None` if the file never
/// stabilizes; that is "not ready yet", not an error.
pub fn wait_until_ready(path: &Path, readiness: &ReadinessConfig) -> Option<String> {
    let delay = Duration::from_millis(readiness.delay_ms);
    for attempt in 1..=readiness.attempts {
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        match fs::read_to_string(path) {
            Ok(content) if content.len() > readiness.min_bytes => {
                debug!(path = %path.display(), attempt, "document ready");
                return Some(content);
            }
            Ok(content) => debug!(
                path = %path.display(),
                attempt,
                bytes = content.len(),
                "document too small"
            ),
            Err(err) => debug!(path = %path.display(), attempt, %err, "document not readable"),
        }
    }
    None
}

/// Remove duplicate `phase_compressions` members inside `knowledge_pool`.
pub fn repair_text(raw: &str) -> DuplicateRepair {
    repair_duplicate_keys(raw, KNOWLEDGE_POOL, PHASE_COMPRESSIONS)
}

/// Repair then parse raw document text.
pub fn parse_task(raw: &str) -> Result<LoadedTask> {
    let repair = repair_text(raw);
    let doc = serde_json::from_str(&repair.text).context("parse task document")?;
    Ok(LoadedTask { doc, repair })
}

pub fn read_task(path: &Path) -> Result<LoadedTask> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_task(&raw).with_context(|| format!("load {}", path.display()))
}

/// Pretty-printed document text with a trailing newline.
pub fn render_task(doc: &Value) -> Result<String> {
    let mut payload = serde_json::to_string_pretty(doc).context("serialize task document")?;
    payload.push('\n');
    Ok(payload)
}

/// Rewrite the whole document at `path`.
pub fn write_task(path: &Path, doc: &Value) -> Result<()> {
    let payload = render_task(doc)?;
    super::write_atomic(path, &payload)
}
