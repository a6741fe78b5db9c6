//! Catch-up loop driver for batch model inference.
//!
//! Derives a job's input/output/error paths from a job identifier, feeds the
//! unprocessed suffix of the input to the configured model command, and
//! repeats until the append-only output file has caught up in line count.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use catchup::drive::{DrivePolicy, LoopStop, run_catchup};
use catchup::exit_codes;
use catchup::io::config::load_config;
use catchup::io::inference::CommandInference;
use catchup::io::paths::JobPaths;
use catchup::io::results::ResultFiles;
use catchup::{drive, logging};

#[derive(Parser)]
#[command(
    name = "catchup",
    version,
    about = "Retry-until-complete driver for batch model inference"
)]
struct Cli {
    /// Path to the driver config file.
    #[arg(long, default_value = "catchup.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drive a job until its output file catches up with its input.
    Run {
        /// Job identifier (dataset directory under the data root).
        job: String,
        /// Override the configured attempt budget (0 = unbounded).
        #[arg(long)]
        max_attempts: Option<u32>,
        /// Override the configured stall limit (0 = never give up).
        #[arg(long)]
        stall_limit: Option<u32>,
    },
    /// Print a job's line counts and deficit without running inference.
    Status {
        /// Job identifier (dataset directory under the data root).
        job: String,
        /// Emit the status as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            job,
            max_attempts,
            stall_limit,
        } => cmd_run(&cli.config, &job, max_attempts, stall_limit),
        Command::Status { job, json } => cmd_status(&cli.config, &job, json),
    }
}

fn cmd_run(
    config_path: &Path,
    job: &str,
    max_attempts: Option<u32>,
    stall_limit: Option<u32>,
) -> Result<i32> {
    let mut cfg = load_config(config_path).context("load config")?;
    if let Some(n) = max_attempts {
        cfg.max_attempts = n;
    }
    if let Some(n) = stall_limit {
        cfg.stall_limit = n;
    }

    let paths = JobPaths::new(&cfg.data_root, &cfg.results_root, job)?;
    let files = ResultFiles::prepare(&paths).context("prepare result files")?;
    let inference = CommandInference::new(cfg.command.clone())?;
    let policy = DrivePolicy::from_config(&cfg);

    let outcome = run_catchup(&paths, &files, &policy, &inference, |attempt| {
        println!(
            "attempt: job={} n={} deficit={} emitted={} success={}",
            job, attempt.attempt, attempt.deficit, attempt.lines_emitted, attempt.success
        );
    })?;

    match outcome.stop {
        LoopStop::Complete => {
            println!(
                "done: job={} attempts={} output={}",
                job,
                outcome.attempts,
                paths.output_path.display()
            );
            Ok(exit_codes::OK)
        }
        LoopStop::Stalled {
            deficit,
            attempts_without_progress,
        } => {
            println!(
                "stalled: job={} deficit={} attempts_without_progress={} errors={}",
                job,
                deficit,
                attempts_without_progress,
                paths.error_path.display()
            );
            Ok(exit_codes::STALLED)
        }
        LoopStop::AttemptsExhausted {
            deficit,
            max_attempts,
        } => {
            println!(
                "exhausted: job={} deficit={} max_attempts={} errors={}",
                job,
                deficit,
                max_attempts,
                paths.error_path.display()
            );
            Ok(exit_codes::EXHAUSTED)
        }
    }
}

fn cmd_status(config_path: &Path, job: &str, json: bool) -> Result<i32> {
    let cfg = load_config(config_path).context("load config")?;
    let paths = JobPaths::new(&cfg.data_root, &cfg.results_root, job)?;
    let status = drive::job_status(&paths)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&status).context("serialize status")?
        );
    } else {
        let deficit = status.input_lines.saturating_sub(status.output_lines);
        println!(
            "status: job={} input={} output={} deficit={}",
            status.job, status.input_lines, status.output_lines, deficit
        );
    }
    Ok(exit_codes::OK)
}
