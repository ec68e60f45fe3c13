//! Standalone structural repair of stored task documents.

use std::path::Path;

use anyhow::{Context, Result};

use crate::core::structure::validate_structure;
use crate::io::task_store::read_task;
use crate::pass::{PassContext, StageOutcome, log_duplicate_repair, log_report, persist_if_changed};

const STAGE: &str = "repair";

/// Run the textual and structural repairs on `path`, rewriting it if either
/// changed something.
pub fn repair_file(path: &Path, ctx: &PassContext<'_>) -> Result<StageOutcome> {
    let mut loaded = read_task(path).context("load for repair")?;
    log_duplicate_repair(STAGE, &loaded);
    let report = validate_structure(&mut loaded.doc);
    log_report(STAGE, &loaded.doc, &report);
    persist_if_changed(path, &mut loaded, &report, ctx)
}
