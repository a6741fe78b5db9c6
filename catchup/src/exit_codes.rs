//! Stable exit codes for catchup CLI commands.

/// The job converged (output caught up with input), or `status` printed.
pub const OK: i32 = 0;
/// Invalid job id/config/paths or a non-retryable driver error.
pub const INVALID: i32 = 1;
/// The stall detector fired: repeated attempts without output growth.
pub const STALLED: i32 = 2;
/// The configured `max_attempts` ran out with a remaining deficit.
pub const EXHAUSTED: i32 = 3;
