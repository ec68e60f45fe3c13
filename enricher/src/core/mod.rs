//! Deterministic, pure logic shared by the enrichment stages.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! documents (or raw text, for duplicate-key repair) and return deterministic
//! outputs suitable for tests. Time and tokenization are injected.

pub mod compression;
pub mod duplicate_keys;
pub mod finding;
pub mod placeholders;
pub mod structure;
pub mod tokens;
pub mod types;
