//! Inference backend abstraction.
//!
//! The [`Inference`] trait decouples the catch-up loop from the actual
//! model-execution program. Tests use scripted backends that append
//! predetermined result lines without spawning processes.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::io::process::run_streaming;
use crate::io::results::ResultFiles;

/// Parameters for one inference attempt.
#[derive(Debug, Clone)]
pub struct InferRequest<'a> {
    /// Newline-terminated batch of unprocessed input records.
    pub batch: &'a str,
    /// Maximum time to wait for the attempt to complete.
    pub timeout: Duration,
    /// Bytes of child stderr retained in memory for diagnostics.
    pub stderr_tail_bytes: usize,
}

/// What one attempt did, as observed by the driver.
///
/// A failed attempt is data, not an error: the loop re-measures the files
/// and decides whether to retry.
#[derive(Debug, Clone)]
pub struct InferReport {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    /// Result lines the attempt appended to the output file.
    pub lines_emitted: u64,
}

/// Abstraction over model-execution backends.
pub trait Inference {
    /// Run one attempt: consume `request.batch` on stdin, append results to
    /// `files`. Errors are reserved for driver misconfiguration (for
    /// example a missing binary); a failing model run returns a report.
    fn infer(&self, request: &InferRequest<'_>, files: &ResultFiles) -> Result<InferReport>;
}

/// Backend that spawns the configured model command.
pub struct CommandInference {
    argv: Vec<String>,
}

impl CommandInference {
    pub fn new(argv: Vec<String>) -> Result<Self> {
        if argv.is_empty() || argv[0].trim().is_empty() {
            return Err(anyhow!("inference command must not be empty"));
        }
        Ok(Self { argv })
    }
}

impl Inference for CommandInference {
    #[instrument(skip_all, fields(command = %self.argv[0], timeout_secs = request.timeout.as_secs()))]
    fn infer(&self, request: &InferRequest<'_>, files: &ResultFiles) -> Result<InferReport> {
        info!(batch_bytes = request.batch.len(), "starting inference attempt");

        let mut cmd = Command::new(&self.argv[0]);
        cmd.args(&self.argv[1..]);

        let stdout_sink = files.output_appender()?;
        let stderr_sink = files.error_appender()?;

        let output = run_streaming(
            cmd,
            request.batch.as_bytes(),
            request.timeout,
            stdout_sink,
            stderr_sink,
            request.stderr_tail_bytes,
        )
        .context("run inference command")?;

        if output.timed_out {
            warn!(
                timeout_secs = request.timeout.as_secs(),
                lines_emitted = output.stdout_lines,
                "inference attempt timed out"
            );
        } else if !output.status.success() {
            warn!(
                exit_code = ?output.status.code(),
                stderr_tail = %output.stderr_tail,
                "inference attempt failed"
            );
        } else {
            debug!(lines_emitted = output.stdout_lines, "inference attempt finished");
        }

        Ok(InferReport {
            success: output.status.success() && !output.timed_out,
            exit_code: output.status.code(),
            timed_out: output.timed_out,
            lines_emitted: output.stdout_lines,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::paths::JobPaths;
    use std::fs;

    fn prepared_files(root: &std::path::Path) -> ResultFiles {
        let paths =
            JobPaths::new(&root.join("datasets"), &root.join("results"), "job").expect("paths");
        ResultFiles::prepare(&paths).expect("prepare")
    }

    #[test]
    fn cat_backend_emits_one_line_per_input_line() {
        let temp = tempfile::tempdir().expect("tempdir");
        let files = prepared_files(temp.path());
        let backend = CommandInference::new(vec!["cat".to_string()]).expect("backend");

        let report = backend
            .infer(
                &InferRequest {
                    batch: "a\tx\nb\ty\n",
                    timeout: Duration::from_secs(5),
                    stderr_tail_bytes: 1024,
                },
                &files,
            )
            .expect("infer");

        assert!(report.success);
        assert_eq!(report.lines_emitted, 2);
        assert_eq!(files.output_lines().expect("count"), 2);
    }

    #[test]
    fn failing_backend_reports_without_erroring() {
        let temp = tempfile::tempdir().expect("tempdir");
        let files = prepared_files(temp.path());
        let backend = CommandInference::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo boom >&2; exit 7".to_string(),
        ])
        .expect("backend");

        let report = backend
            .infer(
                &InferRequest {
                    batch: "a\n",
                    timeout: Duration::from_secs(5),
                    stderr_tail_bytes: 1024,
                },
                &files,
            )
            .expect("infer");

        assert!(!report.success);
        assert_eq!(report.exit_code, Some(7));
        assert_eq!(report.lines_emitted, 0);
        let diagnostics = fs::read_to_string(files.error_path()).expect("read err");
        assert_eq!(diagnostics, "boom\n");
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(CommandInference::new(Vec::new()).is_err());
    }
}
