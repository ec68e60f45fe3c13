//! Post-write phase-compression finalization.
//!
//! Runs after a writer stores a phase compression. The findings it references
//! must already carry real token counts, which the enrich stage of an earlier
//! pass provides; references to findings that are not enriched yet count as 0.

use std::path::Path;

use anyhow::Result;
use serde_json::Value;
use tracing::debug;

use crate::core::compression::finalize_compression;
use crate::core::placeholders::resolve_sentinel;
use crate::core::structure::validate_structure;
use crate::core::types::PassReport;
use crate::document::{Collection, KNOWLEDGE_POOL, PHASE_COMPRESSIONS, Sentinel};
use crate::io::event::HookEvent;
use crate::pass::{
    PassContext, StageOutcome, load_when_ready, log_duplicate_repair, log_report,
    persist_if_changed, write_target,
};

const STAGE: &str = "finalize";

pub fn run(event: &HookEvent, ctx: &PassContext<'_>) -> Result<StageOutcome> {
    let path = match write_target(event, ctx) {
        Ok(path) => path,
        Err(reason) => {
            debug!(stage = STAGE, ?reason, "skipped");
            return Ok(StageOutcome::Skipped(reason));
        }
    };
    finalize_file(Path::new(path), ctx)
}

pub fn finalize_file(path: &Path, ctx: &PassContext<'_>) -> Result<StageOutcome> {
    let Some(mut loaded) = load_when_ready(path, ctx)? else {
        return Ok(StageOutcome::NotReady);
    };
    log_duplicate_repair(STAGE, &loaded);
    let report = finalize_document(&mut loaded.doc, ctx);
    log_report(STAGE, &loaded.doc, &report);
    persist_if_changed(path, &mut loaded, &report, ctx)
}

/// Validate structure, resolve compression timestamps, then compute the token
/// accounting of every compression still waiting for it.
pub fn finalize_document(doc: &mut Value, ctx: &PassContext<'_>) -> PassReport {
    let mut report = validate_structure(doc);

    let stamped = resolve_sentinel(doc, Sentinel::CompressionTimestamp, &ctx.now);
    if stamped > 0 {
        report.fix(format!(
            "replaced {stamped} {} placeholder(s) with {}",
            Sentinel::CompressionTimestamp.as_str(),
            ctx.now
        ));
    }

    let findings = Collection::Findings.get(doc).cloned().unwrap_or_default();
    let Some(compressions) = doc
        .get_mut(KNOWLEDGE_POOL)
        .and_then(|pool| pool.get_mut(PHASE_COMPRESSIONS))
        .and_then(Value::as_object_mut)
    else {
        return report;
    };

    for (phase, compression) in compressions.iter_mut() {
        let Some(record) = compression.as_object_mut() else {
            report.warn(format!("{PHASE_COMPRESSIONS}.{phase} is not a record; skipped"));
            continue;
        };
        let Some(outcome) = finalize_compression(record, &findings, ctx.counter) else {
            continue;
        };
        report.fix(format!(
            "{phase}: {} -> {} tokens ({}x compression)",
            outcome.original_token_count, outcome.compressed_token_count, outcome.compression_ratio
        ));
        for warning in outcome.warnings {
            report.warn(format!("{phase}: {warning}"));
        }
    }
    report
}
