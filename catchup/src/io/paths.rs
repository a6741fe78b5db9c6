//! Canonical file paths for a job.
//!
//! A job identifier names a dataset directory and keys the result files:
//! input records live at `<data_root>/<job>/nl.tsv`, results are appended to
//! `<results_root>/<job>.tsv`, and subprocess diagnostics to
//! `<results_root>/<job>.err`.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

/// Name of the input file inside a job's dataset directory.
pub const INPUT_FILE: &str = "nl.tsv";

/// All canonical paths for one job.
#[derive(Debug, Clone)]
pub struct JobPaths {
    pub job: String,
    pub input_path: PathBuf,
    pub results_dir: PathBuf,
    pub output_path: PathBuf,
    pub error_path: PathBuf,
}

impl JobPaths {
    /// Derive paths for `job` under the configured roots.
    pub fn new(data_root: &Path, results_root: &Path, job: &str) -> Result<Self> {
        validate_job_id(job)?;
        Ok(Self {
            job: job.to_string(),
            input_path: data_root.join(job).join(INPUT_FILE),
            results_dir: results_root.to_path_buf(),
            output_path: results_root.join(format!("{job}.tsv")),
            error_path: results_root.join(format!("{job}.err")),
        })
    }
}

/// Validate that a job id is safe for use as a path component.
pub fn validate_job_id(job: &str) -> Result<()> {
    if job.is_empty() {
        return Err(anyhow!("job id must not be empty"));
    }
    if job == "." || job == ".." {
        return Err(anyhow!("job id must not be '.' or '..'"));
    }
    if job
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-'))
    {
        return Err(anyhow!("job id must be [A-Za-z0-9._-] only (got '{job}')"));
    }
    Ok(())
}
