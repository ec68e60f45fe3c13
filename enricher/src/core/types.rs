//! Shared deterministic types for the repair and enrichment components.
//!
//! Components mutate the document in place and describe what they did through
//! a [`PassReport`]. Fix and warning lists are kept in application order so
//! logged output is stable across runs.

/// What a component changed, and what it could not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// One entry per mutation applied to the document.
    pub fixes: Vec<String>,
    /// Non-fatal problems: missing references, suspicious writer values.
    pub warnings: Vec<String>,
    /// Entries removed because they could not be repaired.
    pub dropped: usize,
}

impl PassReport {
    /// True if the document was mutated.
    pub fn changed(&self) -> bool {
        !self.fixes.is_empty()
    }

    pub fn fix(&mut self, message: impl Into<String>) {
        self.fixes.push(message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn merge(&mut self, other: PassReport) {
        self.fixes.extend(other.fixes);
        self.warnings.extend(other.warnings);
        self.dropped += other.dropped;
    }
}

/// Result of the textual duplicate-key pre-pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateRepair {
    pub text: String,
    /// Occurrences of the repeated key that were deleted.
    pub removed: usize,
    /// Lines deleted, including every line of multi-line value blocks.
    pub lines_removed: usize,
}

impl DuplicateRepair {
    pub fn changed(&self) -> bool {
        self.removed > 0
    }
}

/// Token accounting computed for one phase compression.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionOutcome {
    pub original_token_count: u64,
    pub compressed_token_count: u64,
    pub compression_ratio: f64,
    /// Critical finding ids that resolved to a finding.
    pub matched: usize,
    /// Critical finding ids listed.
    pub referenced: usize,
    pub warnings: Vec<String>,
}
