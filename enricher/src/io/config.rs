//! Enricher configuration stored under `.claude/task-enricher.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = ".claude/task-enricher.toml";

/// Enricher configuration (TOML).
///
/// Hooks run without arguments beyond the subcommand, so every field has a
/// default and a missing file is not an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EnricherConfig {
    /// Path substring that identifies task storage.
    pub task_dir_marker: String,

    /// Extension (without dot) of task documents.
    pub task_extension: String,

    /// Directory scanned by the enrich stage when the transcript names no
    /// task documents. An empty path disables the fallback.
    pub active_dir: Option<PathBuf>,

    /// Stamp UTC instead of the local offset.
    pub utc_timestamps: bool,

    pub readiness: ReadinessConfig,
    pub tokens: TokenConfig,
    pub logging: LoggingConfig,
}

/// Bounded polling for a document another process is still writing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReadinessConfig {
    pub attempts: u32,
    /// Delay before every attempt, the first included.
    pub delay_ms: u64,
    /// Content must be strictly larger than this many bytes.
    pub min_bytes: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenEncoding {
    Cl100kBase,
    O200kBase,
    Heuristic,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TokenConfig {
    pub encoding: TokenEncoding,
    /// Used by the heuristic counter, and as the fallback when the BPE
    /// tables cannot be loaded.
    pub heuristic_chars_per_token: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Append-only diagnostic file, in addition to stderr.
    pub file: Option<PathBuf>,
}

impl Default for EnricherConfig {
    fn default() -> Self {
        Self {
            task_dir_marker: ".claude/tasks/".to_string(),
            task_extension: "json".to_string(),
            active_dir: Some(PathBuf::from(".claude/tasks/active")),
            utc_timestamps: false,
            readiness: ReadinessConfig::default(),
            tokens: TokenConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay_ms: 500,
            min_bytes: 50,
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            encoding: TokenEncoding::Cl100kBase,
            heuristic_chars_per_token: 4,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl EnricherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.task_dir_marker.trim().is_empty() {
            return Err(anyhow!("task_dir_marker must be non-empty"));
        }
        if self.task_extension.trim().is_empty() {
            return Err(anyhow!("task_extension must be non-empty"));
        }
        if self.readiness.attempts == 0 {
            return Err(anyhow!("readiness.attempts must be > 0"));
        }
        if self.tokens.heuristic_chars_per_token == 0 {
            return Err(anyhow!("tokens.heuristic_chars_per_token must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EnricherConfig::default()`.
pub fn load_config(path: &Path) -> Result<EnricherConfig> {
    if !path.exists() {
        let cfg = EnricherConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EnricherConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &EnricherConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    super::write_atomic(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, EnricherConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("config.toml");
        let mut cfg = EnricherConfig::default();
        cfg.tokens.encoding = TokenEncoding::Heuristic;
        cfg.logging.file = Some(PathBuf::from("/tmp/enricher.log"));
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "utc_timestamps = true\n[readiness]\ndelay_ms = 0\n[tokens]\nencoding = \"o200k_base\"\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert!(cfg.utc_timestamps);
        assert_eq!(cfg.readiness.delay_ms, 0);
        assert_eq!(cfg.readiness.attempts, 5);
        assert_eq!(cfg.tokens.encoding, TokenEncoding::O200kBase);
        assert_eq!(cfg.task_dir_marker, ".claude/tasks/");
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[readiness]\nattempts = 0\n").expect("write");
        let err = load_config(&path).expect_err("invalid");
        assert!(format!("{err:#}").contains("readiness.attempts must be > 0"));
    }
}
