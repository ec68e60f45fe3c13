//! State shared by every stage of one pipeline invocation.
//!
//! A pass captures `now` once, so every timestamp it writes is textually
//! identical, and persists a document only when some component changed it.

use std::path::Path;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::tokens::TokenCounter;
use crate::core::types::PassReport;
use crate::document::{stamp_updated_at, task_id};
use crate::io::clock::now_timestamp;
use crate::io::config::EnricherConfig;
use crate::io::event::{HookEvent, PathCheck, classify_path};
use crate::io::task_store::{LoadedTask, parse_task, wait_until_ready, write_task};

pub struct PassContext<'a> {
    pub config: &'a EnricherConfig,
    pub counter: &'a dyn TokenCounter,
    /// The single instant stamped by this pass.
    pub now: String,
}

impl<'a> PassContext<'a> {
    pub fn new(config: &'a EnricherConfig, counter: &'a dyn TokenCounter) -> Self {
        Self::at(config, counter, now_timestamp(config.utc_timestamps))
    }

    pub fn at(config: &'a EnricherConfig, counter: &'a dyn TokenCounter, now: String) -> Self {
        Self {
            config,
            counter,
            now,
        }
    }
}

/// Why a stage did not look at a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotWrite,
    NoPath,
    NotTask,
    Traversal,
    NotMarked,
    Missing,
}

/// What a stage did with one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Skipped(SkipReason),
    /// The document never stabilized within the readiness budget.
    NotReady,
    Unchanged,
    Written,
    /// The document could not be processed; logged, not propagated.
    Failed,
}

/// The task document a write event points at, if it is one.
pub fn write_target<'e>(
    event: &'e HookEvent,
    ctx: &PassContext<'_>,
) -> Result<&'e str, SkipReason> {
    if !event.is_write() {
        return Err(SkipReason::NotWrite);
    }
    let path = event.file_path().ok_or(SkipReason::NoPath)?;
    check_task_path(path, ctx)?;
    Ok(path)
}

pub fn check_task_path(path: &str, ctx: &PassContext<'_>) -> Result<(), SkipReason> {
    match classify_path(path, ctx.config) {
        PathCheck::Task => Ok(()),
        PathCheck::NotTask => Err(SkipReason::NotTask),
        PathCheck::Traversal => {
            warn!(path, "rejected path with parent-directory segment");
            Err(SkipReason::Traversal)
        }
    }
}

/// Wait for a freshly written document and parse it.
pub fn load_when_ready(path: &Path, ctx: &PassContext<'_>) -> Result<Option<LoadedTask>> {
    let Some(raw) = wait_until_ready(path, &ctx.config.readiness) else {
        info!(
            path = %path.display(),
            attempts = ctx.config.readiness.attempts,
            "document not ready; skipping"
        );
        return Ok(None);
    };
    let loaded = parse_task(&raw)?;
    Ok(Some(loaded))
}

/// Rewrite `doc` if the textual repair or any component changed it.
pub fn persist_if_changed(
    path: &Path,
    loaded: &mut LoadedTask,
    report: &PassReport,
    ctx: &PassContext<'_>,
) -> Result<StageOutcome> {
    if !loaded.repair.changed() && !report.changed() {
        debug!(path = %path.display(), task = task_id(&loaded.doc), "no changes");
        return Ok(StageOutcome::Unchanged);
    }
    stamp_updated_at(&mut loaded.doc, &ctx.now);
    write_task(path, &loaded.doc)?;
    info!(path = %path.display(), task = task_id(&loaded.doc), "document rewritten");
    Ok(StageOutcome::Written)
}

/// Emit a component report through tracing.
pub fn log_report(stage: &str, doc: &Value, report: &PassReport) {
    let task = task_id(doc);
    for fix in &report.fixes {
        info!(stage, task, "{fix}");
    }
    for warning in &report.warnings {
        warn!(stage, task, "{warning}");
    }
    if report.dropped > 0 {
        warn!(stage, task, dropped = report.dropped, "dropped unrepairable entries");
    }
}

pub fn log_duplicate_repair(stage: &str, loaded: &LoadedTask) {
    if loaded.repair.changed() {
        info!(
            stage,
            task = task_id(&loaded.doc),
            removed = loaded.repair.removed,
            lines = loaded.repair.lines_removed,
            "removed duplicate phase_compressions"
        );
    }
}
