//! Post-write enrichment.
//!
//! Finds the task documents a session touched and, for each, repairs finding
//! records, drops entries that are not records, then resolves placeholders.
//! Every document is an independent unit: a failure on one is logged and the
//! rest are still processed.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::finding::{ID, audit_finding, has_placeholders, normalize_finding};
use crate::core::placeholders::enrich_placeholders;
use crate::core::structure::type_name;
use crate::core::types::PassReport;
use crate::document::{Collection, task_id};
use crate::io::event::HookEvent;
use crate::io::task_store::read_task;
use crate::io::transcript::{active_task_paths, task_paths_from_transcript};
use crate::pass::{
    PassContext, SkipReason, StageOutcome, check_task_path, log_duplicate_repair, log_report,
    persist_if_changed,
};

const STAGE: &str = "enrich";

/// Enrich every task document the event refers to.
///
/// Returns one outcome per candidate path, in processing order.
pub fn run(event: &HookEvent, ctx: &PassContext<'_>) -> Vec<(PathBuf, StageOutcome)> {
    let candidates = candidate_paths(event, ctx);
    info!(stage = STAGE, candidates = candidates.len(), "enriching task documents");

    let mut outcomes = Vec::with_capacity(candidates.len());
    for path in candidates {
        let outcome = match enrich_path(&path, ctx) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    stage = STAGE,
                    path = %path.display(),
                    error = %format!("{err:#}"),
                    "enrichment failed"
                );
                StageOutcome::Failed
            }
        };
        outcomes.push((path, outcome));
    }
    outcomes
}

/// Paths named by the transcript and the event, falling back to the active
/// task directory when neither names one.
pub fn candidate_paths(event: &HookEvent, ctx: &PassContext<'_>) -> Vec<PathBuf> {
    let mut paths: Vec<String> = Vec::new();
    if let Some(transcript) = &event.transcript_path {
        match task_paths_from_transcript(transcript, ctx.config) {
            Ok(found) => paths.extend(found),
            Err(err) => warn!(
                stage = STAGE,
                error = %format!("{err:#}"),
                "could not scan transcript"
            ),
        }
    }
    if let Some(path) = event.file_path() {
        if !paths.iter().any(|seen| seen == path) {
            paths.push(path.to_string());
        }
    }

    if !paths.is_empty() {
        return paths.into_iter().map(PathBuf::from).collect();
    }
    let Some(active_dir) = ctx
        .config
        .active_dir
        .as_ref()
        .filter(|dir| !dir.as_os_str().is_empty())
    else {
        return Vec::new();
    };
    debug!(
        stage = STAGE,
        dir = %active_dir.display(),
        "no task documents named; checking active tasks"
    );
    match active_task_paths(active_dir, ctx.config) {
        Ok(found) => found,
        Err(err) => {
            warn!(stage = STAGE, error = %format!("{err:#}"), "could not list active tasks");
            Vec::new()
        }
    }
}

pub fn enrich_path(path: &Path, ctx: &PassContext<'_>) -> Result<StageOutcome> {
    let shown = path.to_string_lossy();
    if let Err(reason) = check_task_path(&shown, ctx) {
        return Ok(StageOutcome::Skipped(reason));
    }
    if !path.exists() {
        debug!(stage = STAGE, path = %shown, "document does not exist");
        return Ok(StageOutcome::Skipped(SkipReason::Missing));
    }
    let mut loaded = read_task(path).context("load for enrichment")?;
    log_duplicate_repair(STAGE, &loaded);
    let report = enrich_document(&mut loaded.doc, ctx);
    log_report(STAGE, &loaded.doc, &report);
    persist_if_changed(path, &mut loaded, &report, ctx)
}

/// Normalize finding collections, then resolve placeholders.
pub fn enrich_document(doc: &mut Value, ctx: &PassContext<'_>) -> PassReport {
    let mut report = PassReport::default();
    for collection in [Collection::Findings, Collection::DesignFindings] {
        normalize_collection(doc, collection, &mut report);
    }
    for collection in [Collection::Decisions, Collection::Blockers] {
        flag_non_records(doc, collection, &mut report);
    }
    report.merge(enrich_placeholders(doc, &ctx.now, ctx.counter));
    if report.changed() {
        debug!(
            stage = STAGE,
            task = task_id(doc),
            fixes = report.fixes.len(),
            "document enriched"
        );
    }
    report
}

/// Repair every entry of a finding collection, dropping the unrepairable ones.
fn normalize_collection(doc: &mut Value, collection: Collection, report: &mut PassReport) {
    let Some(entries) = collection.get_mut(doc) else {
        return;
    };
    let label = collection.label();
    let mut seen_ids = HashSet::new();
    let mut kept = Vec::with_capacity(entries.len());

    for (index, entry) in std::mem::take(entries).into_iter().enumerate() {
        let normalized = match normalize_finding(entry, index + 1) {
            Ok(normalized) => normalized,
            Err(err) => {
                report.fix(format!("{label}: dropped {err}"));
                report.warn(format!("{label}: {err}; entry dropped"));
                report.dropped += 1;
                continue;
            }
        };
        let id = normalized
            .record
            .get(ID)
            .map_or_else(|| format!("#{}", index + 1), display_id);
        for repair in &normalized.repairs {
            report.fix(format!("{label} {id}: {repair}"));
        }
        if has_placeholders(&normalized.record) {
            for issue in audit_finding(&normalized.record) {
                report.warn(format!("{label} {id}: {issue}"));
            }
        }
        if !seen_ids.insert(id.clone()) {
            report.warn(format!("{label}: duplicate id {id}"));
        }
        kept.push(Value::Object(normalized.record));
    }
    *entries = kept;
}

fn flag_non_records(doc: &Value, collection: Collection, report: &mut PassReport) {
    let Some(entries) = collection.get(doc) else {
        return;
    };
    for (index, entry) in entries.iter().enumerate() {
        if !entry.is_object() {
            report.warn(format!(
                "{} #{} is a {}, not a record; left untouched",
                collection.label(),
                index + 1,
                type_name(entry)
            ));
        }
    }
}

fn display_id(id: &Value) -> String {
    id.as_str().map_or_else(|| id.to_string(), str::to_string)
}
