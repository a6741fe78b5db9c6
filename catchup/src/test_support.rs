//! Test-only helpers: temp job fixtures and a scripted inference backend.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, anyhow};

use crate::io::inference::{InferReport, InferRequest, Inference};
use crate::io::paths::JobPaths;
use crate::io::results::ResultFiles;

/// A job rooted in a temp directory with the canonical dataset layout.
pub struct TestJob {
    temp: tempfile::TempDir,
    paths: JobPaths,
}

impl TestJob {
    pub fn new(job: &str) -> Result<Self> {
        let temp = tempfile::tempdir().context("tempdir")?;
        let paths = JobPaths::new(
            &temp.path().join("datasets"),
            &temp.path().join("results"),
            job,
        )?;
        Ok(Self { temp, paths })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn paths(&self) -> &JobPaths {
        &self.paths
    }

    pub fn result_files(&self) -> Result<ResultFiles> {
        ResultFiles::prepare(&self.paths)
    }

    /// Write the input file as newline-terminated records.
    pub fn write_input(&self, records: &[&str]) -> Result<()> {
        write_lines(&self.paths.input_path, records)
    }

    /// Seed the output file, simulating a previous partial run.
    pub fn write_output(&self, records: &[&str]) -> Result<()> {
        write_lines(&self.paths.output_path, records)
    }
}

fn write_lines(path: &Path, records: &[&str]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut buf = String::new();
    for record in records {
        buf.push_str(record);
        buf.push('\n');
    }
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}

/// One scripted response from [`ScriptedInference`].
#[derive(Debug, Clone)]
pub struct ScriptedAttempt {
    pub lines: Vec<String>,
    pub stderr: String,
    pub exit_code: i32,
}

impl ScriptedAttempt {
    /// Successful attempt emitting `lines`.
    pub fn lines(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|s| s.to_string()).collect(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    /// Crashing attempt: no output, diagnostics on stderr, exit 1.
    pub fn crash(stderr: &str) -> Self {
        Self {
            lines: Vec::new(),
            stderr: format!("{stderr}\n"),
            exit_code: 1,
        }
    }

    /// Same attempt but exiting with `code` (partial output then failure).
    pub fn failing(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }
}

/// Inference backend that replays a fixed script and records the batches it
/// was given, without spawning processes.
pub struct ScriptedInference {
    script: RefCell<VecDeque<ScriptedAttempt>>,
    batches: RefCell<Vec<String>>,
}

impl ScriptedInference {
    pub fn new(script: Vec<ScriptedAttempt>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            batches: RefCell::new(Vec::new()),
        }
    }

    /// Batches received so far, in invocation order.
    pub fn batches(&self) -> Vec<String> {
        self.batches.borrow().clone()
    }
}

impl Inference for ScriptedInference {
    fn infer(&self, request: &InferRequest<'_>, files: &ResultFiles) -> Result<InferReport> {
        self.batches.borrow_mut().push(request.batch.to_string());
        let attempt = self
            .script
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted inference ran out of attempts"))?;

        let mut out = files.output_appender()?;
        for line in &attempt.lines {
            writeln!(out, "{line}").context("append scripted line")?;
        }
        let mut err = files.error_appender()?;
        err.write_all(attempt.stderr.as_bytes())
            .context("append scripted stderr")?;

        Ok(InferReport {
            success: attempt.exit_code == 0,
            exit_code: Some(attempt.exit_code),
            timed_out: false,
            lines_emitted: attempt.lines.len() as u64,
        })
    }
}
