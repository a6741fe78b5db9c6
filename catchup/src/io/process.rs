//! Helpers for running a child process with a timeout and streamed output.
//!
//! Stdout is appended to the output file line by line, flushing as lines
//! arrive, so a killed or crashed child still leaves its completed lines
//! behind for the next deficit measurement. Stderr is appended to the error
//! file in full, with a bounded tail kept in memory for diagnostics.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Summary of a streamed child invocation.
#[derive(Debug)]
pub struct StreamedOutput {
    pub status: ExitStatus,
    pub timed_out: bool,
    /// Complete lines appended to the stdout sink.
    pub stdout_lines: u64,
    /// Bytes appended to the stderr sink.
    pub stderr_bytes: u64,
    /// Last `stderr_tail_limit` bytes of stderr, lossily decoded.
    pub stderr_tail: String,
}

/// Run a command, feeding `stdin` and streaming stdout/stderr to the sinks.
///
/// Output is drained concurrently while the child runs, so neither pipe can
/// deadlock. On timeout the child is killed and the lines flushed so far
/// remain in the sink.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs()))]
pub fn run_streaming(
    mut cmd: Command,
    stdin: &[u8],
    timeout: Duration,
    stdout_sink: File,
    stderr_sink: File,
    stderr_tail_limit: usize,
) -> Result<StreamedOutput> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let child_stdin = child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("stdin was not piped"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    // All three pipes are serviced from their own threads so the main thread
    // reaches wait_timeout immediately. A batch larger than the OS pipe
    // buffer fed to a child that never drains stdin would otherwise block
    // write_all and keep the timeout from ever firing.
    let stdout_handle = thread::spawn(move || tee_lines(stdout, stdout_sink));
    let stderr_handle =
        thread::spawn(move || tee_bytes(stderr, stderr_sink, stderr_tail_limit));
    let input = stdin.to_vec();
    let stdin_handle = thread::spawn(move || feed_stdin(child_stdin, &input));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    // Killing the child closes its pipe ends, so these joins cannot hang.
    let stdout_lines = join_reader(stdout_handle).context("join stdout")?;
    let (stderr_bytes, stderr_tail) = join_reader(stderr_handle).context("join stderr")?;
    join_reader(stdin_handle).context("join stdin")?;

    debug!(exit_code = ?status.code(), timed_out, stdout_lines, "command finished");
    Ok(StreamedOutput {
        status,
        timed_out,
        stdout_lines,
        stderr_bytes,
        stderr_tail,
    })
}

/// Write the batch to the child's stdin and close it to signal EOF.
fn feed_stdin(mut sink: std::process::ChildStdin, input: &[u8]) -> Result<()> {
    match sink.write_all(input) {
        Ok(()) => Ok(()),
        // A child that exits before draining stdin closes the pipe; its exit
        // status carries the failure, so the write is not an error here.
        Err(e) if e.kind() == ErrorKind::BrokenPipe => {
            warn!("child closed stdin early");
            Ok(())
        }
        Err(e) => Err(e).context("write stdin"),
    }
}

fn join_reader<T>(handle: thread::JoinHandle<Result<T>>) -> Result<T> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

/// Copy lines from `reader` to `sink`, flushing each one as it completes.
fn tee_lines<R: Read>(reader: R, sink: File) -> Result<u64> {
    let mut buf_reader = BufReader::new(reader);
    let mut writer = BufWriter::new(sink);
    let mut lines = 0u64;

    loop {
        let mut line = Vec::new();
        let n = buf_reader
            .read_until(b'\n', &mut line)
            .context("read stdout line")?;
        if n == 0 {
            break;
        }
        writer.write_all(&line).context("append stdout line")?;
        writer.flush().context("flush stdout line")?;
        lines += 1;
    }

    Ok(lines)
}

/// Copy `reader` to `sink`, keeping the last `tail_limit` bytes in memory.
fn tee_bytes<R: Read>(mut reader: R, sink: File, tail_limit: usize) -> Result<(u64, String)> {
    let mut writer = BufWriter::new(sink);
    let mut tail: Vec<u8> = Vec::new();
    let mut total = 0u64;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read stderr")?;
        if n == 0 {
            break;
        }
        writer.write_all(&chunk[..n]).context("append stderr")?;
        total += n as u64;

        tail.extend_from_slice(&chunk[..n]);
        if tail.len() > tail_limit {
            let drop = tail.len() - tail_limit;
            tail.drain(..drop);
        }
    }
    writer.flush().context("flush stderr")?;

    Ok((total, String::from_utf8_lossy(&tail).into_owned()))
}
