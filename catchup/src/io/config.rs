//! Driver configuration stored in `catchup.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Driver configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DriverConfig {
    /// Model-inference command (argv). Receives the unprocessed input suffix
    /// on stdin and must emit one result line per input line on stdout.
    pub command: Vec<String>,

    /// Directory holding `<job>/nl.tsv` dataset files.
    pub data_root: PathBuf,

    /// Directory receiving `<job>.tsv` / `<job>.err` result files.
    pub results_root: PathBuf,

    /// Wall-clock budget in seconds for one subprocess attempt.
    pub attempt_timeout_secs: u64,

    /// Bytes of child stderr retained in memory for diagnostics. The full
    /// stderr stream always reaches the error file regardless.
    pub stderr_tail_bytes: usize,

    /// Give up after this many attempts (0 = unbounded).
    pub max_attempts: u32,

    /// Give up after this many consecutive attempts without output growth
    /// (0 = never, the legacy unconditional retry loop).
    pub stall_limit: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            command: vec!["python3".to_string(), "run_model.py".to_string()],
            data_root: PathBuf::from("datasets"),
            results_root: PathBuf::from("results"),
            attempt_timeout_secs: 6 * 60 * 60,
            stderr_tail_bytes: 8192,
            max_attempts: 0,
            stall_limit: 3,
        }
    }
}

impl DriverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.command.is_empty() || self.command[0].trim().is_empty() {
            return Err(anyhow!("command must be a non-empty array"));
        }
        if self.attempt_timeout_secs == 0 {
            return Err(anyhow!("attempt_timeout_secs must be > 0"));
        }
        if self.stderr_tail_bytes == 0 {
            return Err(anyhow!("stderr_tail_bytes must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `DriverConfig::default()`.
pub fn load_config(path: &Path) -> Result<DriverConfig> {
    if !path.exists() {
        let cfg = DriverConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: DriverConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &DriverConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, DriverConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("catchup.toml");
        let cfg = DriverConfig {
            command: vec!["cat".to_string()],
            max_attempts: 5,
            ..DriverConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn empty_command_is_rejected() {
        let cfg = DriverConfig {
            command: Vec::new(),
            ..DriverConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("catchup.toml");
        fs::write(&path, "command = [\"cat\"]\nstall_limit = 1\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.command, vec!["cat".to_string()]);
        assert_eq!(cfg.stall_limit, 1);
        assert_eq!(cfg.data_root, PathBuf::from("datasets"));
    }
}
