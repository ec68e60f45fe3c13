//! Post-write initialization of new task documents.
//!
//! A writer marks a fresh document with `_NEEDS_INITIALIZATION`; the marker is
//! the only thing separating a new document from an existing one, so nothing
//! happens without it.

use std::path::Path;

use anyhow::Result;
use serde_json::Value;
use tracing::debug;

use crate::core::structure::ensure_pool_containers;
use crate::core::types::PassReport;
use crate::document::{
    CREATED_AT, INSTRUCTIONS, KNOWLEDGE_POOL, NEEDS_INITIALIZATION, UPDATED_AT,
    default_knowledge_pool, is_truthy, task_id,
};
use crate::io::event::HookEvent;
use crate::pass::{
    PassContext, SkipReason, StageOutcome, load_when_ready, log_duplicate_repair, log_report,
    persist_if_changed, write_target,
};

const STAGE: &str = "init";

pub fn run(event: &HookEvent, ctx: &PassContext<'_>) -> Result<StageOutcome> {
    let path = match write_target(event, ctx) {
        Ok(path) => path,
        Err(reason) => {
            debug!(stage = STAGE, ?reason, "skipped");
            return Ok(StageOutcome::Skipped(reason));
        }
    };
    initialize_file(Path::new(path), ctx)
}

pub fn initialize_file(path: &Path, ctx: &PassContext<'_>) -> Result<StageOutcome> {
    let Some(mut loaded) = load_when_ready(path, ctx)? else {
        return Ok(StageOutcome::NotReady);
    };
    log_duplicate_repair(STAGE, &loaded);
    let Some(report) = initialize_document(&mut loaded.doc, &ctx.now) else {
        debug!(stage = STAGE, task = task_id(&loaded.doc), "no initialization marker");
        return Ok(StageOutcome::Skipped(SkipReason::NotMarked));
    };
    log_report(STAGE, &loaded.doc, &report);
    persist_if_changed(path, &mut loaded, &report, ctx)
}

/// Initialize a marked document. Returns `None` if the marker is absent or
/// falsy.
pub fn initialize_document(doc: &mut Value, now: &str) -> Option<PassReport> {
    let root = doc.as_object_mut()?;
    if !root.get(NEEDS_INITIALIZATION).is_some_and(is_truthy) {
        return None;
    }

    let mut report = PassReport::default();
    root.shift_remove(NEEDS_INITIALIZATION);
    report.fix(format!("removed {NEEDS_INITIALIZATION} marker"));

    root.insert(CREATED_AT.to_string(), Value::String(now.to_string()));
    root.insert(UPDATED_AT.to_string(), Value::String(now.to_string()));
    report.fix(format!("stamped {CREATED_AT}/{UPDATED_AT}: {now}"));

    if root.shift_remove(INSTRUCTIONS).is_some() {
        report.fix(format!("removed {INSTRUCTIONS}"));
    }

    match root.get_mut(KNOWLEDGE_POOL) {
        Some(pool) => ensure_pool_containers(pool, &mut report),
        None => {
            root.insert(KNOWLEDGE_POOL.to_string(), default_knowledge_pool());
            report.fix(format!("initialized {KNOWLEDGE_POOL}"));
        }
    }
    Some(report)
}
