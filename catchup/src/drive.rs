//! The catch-up loop behind `catchup run`.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::core::progress::{Phase, RetryBudget, StallTracker, phase};
use crate::io::config::DriverConfig;
use crate::io::inference::{InferRequest, Inference};
use crate::io::lines::{count_lines, tail_lines};
use crate::io::paths::JobPaths;
use crate::io::results::ResultFiles;

/// Retry policy for a drive invocation.
#[derive(Debug, Clone)]
pub struct DrivePolicy {
    pub timeout: Duration,
    pub stderr_tail_bytes: usize,
    pub max_attempts: u32,
    pub stall_limit: u32,
}

impl DrivePolicy {
    pub fn from_config(cfg: &DriverConfig) -> Self {
        Self {
            timeout: Duration::from_secs(cfg.attempt_timeout_secs),
            stderr_tail_bytes: cfg.stderr_tail_bytes,
            max_attempts: cfg.max_attempts,
            stall_limit: cfg.stall_limit,
        }
    }
}

/// Reason why `run_catchup` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// The output file caught up with the input (deficit reached zero).
    Complete,
    /// Repeated attempts left the output line count unchanged.
    Stalled {
        deficit: u64,
        attempts_without_progress: u32,
    },
    /// The configured attempt budget ran out with a remaining deficit.
    AttemptsExhausted { deficit: u64, max_attempts: u32 },
}

/// Summary of a drive invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub job: String,
    pub attempts: u32,
    pub stop: LoopStop,
}

/// What a single attempt did, for progress reporting.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    /// Attempt number (1-indexed).
    pub attempt: u32,
    /// Deficit measured before the attempt.
    pub deficit: u64,
    /// Result lines the attempt appended.
    pub lines_emitted: u64,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

/// Line counts for `catchup status`.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub job: String,
    pub input_lines: u64,
    pub output_lines: u64,
    pub phase: Phase,
}

/// Measure a job without invoking the inference backend.
pub fn job_status(paths: &JobPaths) -> Result<JobStatus> {
    let input_lines = count_lines(&paths.input_path)
        .with_context(|| format!("count {}", paths.input_path.display()))?;
    let output_lines = count_lines(&paths.output_path)
        .with_context(|| format!("count {}", paths.output_path.display()))?;
    Ok(JobStatus {
        job: paths.job.clone(),
        input_lines,
        output_lines,
        phase: phase(input_lines, output_lines),
    })
}

/// Drive a job until its output catches up with its input.
///
/// Each iteration re-measures both files from their actual observed state,
/// so a partial write from a crashed attempt only shrinks the next batch.
/// A failing attempt is retried with a recomputed deficit until the stall
/// detector or the attempt budget (when enabled) gives up.
pub fn run_catchup<I: Inference, F: FnMut(&AttemptOutcome)>(
    paths: &JobPaths,
    files: &ResultFiles,
    policy: &DrivePolicy,
    inference: &I,
    mut on_attempt: F,
) -> Result<LoopOutcome> {
    let mut stall = StallTracker::new(policy.stall_limit);
    let mut budget = RetryBudget::new(policy.max_attempts);

    loop {
        let in_lines = count_lines(&paths.input_path)
            .with_context(|| format!("count {}", paths.input_path.display()))?;
        let out_lines = files.output_lines()?;

        let deficit = match phase(in_lines, out_lines) {
            Phase::Done => {
                info!(
                    job = %paths.job,
                    in_lines,
                    out_lines,
                    attempts = budget.attempts(),
                    "output caught up with input"
                );
                return Ok(LoopOutcome {
                    job: paths.job.clone(),
                    attempts: budget.attempts(),
                    stop: LoopStop::Complete,
                });
            }
            Phase::Running { deficit } => deficit,
        };

        debug!(job = %paths.job, in_lines, out_lines, deficit, "attempting catch-up");
        let batch = tail_lines(&paths.input_path, deficit)
            .with_context(|| format!("tail {}", paths.input_path.display()))?;

        let report = inference.infer(
            &InferRequest {
                batch: &batch,
                timeout: policy.timeout,
                stderr_tail_bytes: policy.stderr_tail_bytes,
            },
            files,
        )?;

        let exhausted = budget.record_attempt();
        on_attempt(&AttemptOutcome {
            attempt: budget.attempts(),
            deficit,
            lines_emitted: report.lines_emitted,
            success: report.success,
            exit_code: report.exit_code,
            timed_out: report.timed_out,
        });

        let observed = files.output_lines()?;
        let stalled = stall.observe(out_lines, observed);
        if observed >= in_lines {
            // Caught up; the next iteration confirms against a fresh input
            // measurement and terminates.
            continue;
        }
        if stalled {
            info!(
                job = %paths.job,
                deficit = in_lines - observed,
                attempts_without_progress = stall.attempts_without_progress(),
                "giving up: no output growth"
            );
            return Ok(LoopOutcome {
                job: paths.job.clone(),
                attempts: budget.attempts(),
                stop: LoopStop::Stalled {
                    deficit: in_lines - observed,
                    attempts_without_progress: stall.attempts_without_progress(),
                },
            });
        }
        if exhausted {
            info!(
                job = %paths.job,
                deficit = in_lines - observed,
                max_attempts = budget.max_attempts(),
                "giving up: attempt budget exhausted"
            );
            return Ok(LoopOutcome {
                job: paths.job.clone(),
                attempts: budget.attempts(),
                stop: LoopStop::AttemptsExhausted {
                    deficit: in_lines - observed,
                    max_attempts: budget.max_attempts(),
                },
            });
        }
    }
}
