//! Repair and enrichment pipeline for shared task documents.
//!
//! Agents write task documents with placeholders for values they cannot
//! compute (timestamps, token counts) and occasionally with structural
//! defects. This crate repairs and enriches those documents across four
//! lifecycle events, each idempotent. The architecture enforces a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (duplicate-key repair, structural
//!   validation, finding normalization, placeholder resolution, compression
//!   accounting). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (config, hook events, transcripts,
//!   task files, tokenizer, clock).
//!
//! Orchestration modules ([`pre_write`], [`initialize`], [`enrich`],
//! [`finalize`], [`repair`]) coordinate core logic with I/O to implement the
//! CLI commands.

pub mod core;
pub mod document;
pub mod enrich;
pub mod finalize;
pub mod initialize;
pub mod io;
pub mod logging;
pub mod pass;
pub mod pre_write;
pub mod repair;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
