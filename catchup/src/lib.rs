//! Catch-up loop driver for batch model inference.
//!
//! A job is a dataset of newline-delimited records plus an append-only
//! result file. The output file's line count is the progress marker: the
//! driver computes the deficit between input and output, feeds the
//! unprocessed suffix of the input to an external inference command, and
//! repeats until the output has caught up. Because progress lives entirely
//! in the files, an interrupted run resumes exactly where it left off.
//!
//! The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (deficit computation, stall
//!   detection, retry budgets). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (line counting, result files,
//!   process execution). Isolated to enable scripted backends in tests.
//!
//! [`drive`] coordinates core logic with I/O to implement the loop behind
//! the `catchup run` command.

pub mod core;
pub mod drive;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
