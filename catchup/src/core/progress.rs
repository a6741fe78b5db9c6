//! Deficit computation, stall detection, and retry budgets.
//!
//! The driver's only progress cursor is the output file's line count. These
//! helpers turn observed line counts into decisions; they never touch the
//! filesystem themselves.

use serde::Serialize;

/// Where a job stands relative to its input.
///
/// Two states, evaluated once per loop iteration: `Running` while the output
/// file is behind the input, `Done` once it has caught up (or overtaken it,
/// which a well-behaved backend never causes but the driver tolerates).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Running { deficit: u64 },
    Done,
}

/// Classify observed input/output line counts.
pub fn phase(in_lines: u64, out_lines: u64) -> Phase {
    if out_lines >= in_lines {
        Phase::Done
    } else {
        Phase::Running {
            deficit: in_lines - out_lines,
        }
    }
}

/// Detects attempts that stop making forward progress.
///
/// Feed it the output line counts measured before and after each attempt.
/// It reports a stall once `limit` consecutive attempts show no growth. A
/// limit of 0 disables detection (the original unconditional-retry
/// behavior). Growth is relative to the pre-attempt count, so output seeded
/// by an earlier run never masks a stalled attempt.
#[derive(Debug, Clone)]
pub struct StallTracker {
    limit: u32,
    without_progress: u32,
}

impl StallTracker {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            without_progress: 0,
        }
    }

    /// Record one attempt's before/after output line counts. Returns true
    /// once the stall limit is reached.
    pub fn observe(&mut self, before: u64, after: u64) -> bool {
        if after > before {
            self.without_progress = 0;
        } else {
            self.without_progress += 1;
        }
        self.limit > 0 && self.without_progress >= self.limit
    }

    /// Consecutive attempts observed without output growth.
    pub fn attempts_without_progress(&self) -> u32 {
        self.without_progress
    }
}

/// Counts attempts against a configured maximum. A maximum of 0 means
/// unbounded.
#[derive(Debug, Clone)]
pub struct RetryBudget {
    max_attempts: u32,
    attempts: u32,
}

impl RetryBudget {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            attempts: 0,
        }
    }

    /// Record one attempt. Returns true when the budget is exhausted.
    pub fn record_attempt(&mut self) -> bool {
        self.attempts += 1;
        self.max_attempts > 0 && self.attempts >= self.max_attempts
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_is_done_when_output_caught_up() {
        assert_eq!(phase(5, 5), Phase::Done);
        assert_eq!(phase(5, 7), Phase::Done);
        assert_eq!(phase(0, 0), Phase::Done);
    }

    #[test]
    fn phase_reports_deficit_while_behind() {
        assert_eq!(phase(5, 3), Phase::Running { deficit: 2 });
        assert_eq!(phase(5, 0), Phase::Running { deficit: 5 });
    }

    #[test]
    fn missing_input_counts_as_zero_and_is_done() {
        // Input file absent is modeled as in_lines = 0.
        assert_eq!(phase(0, 3), Phase::Done);
    }

    #[test]
    fn stall_tracker_fires_after_limit_without_growth() {
        let mut tracker = StallTracker::new(3);
        assert!(!tracker.observe(3, 3));
        assert!(!tracker.observe(3, 3));
        assert!(tracker.observe(3, 3));
        assert_eq!(tracker.attempts_without_progress(), 3);
    }

    #[test]
    fn stall_tracker_resets_on_growth() {
        let mut tracker = StallTracker::new(2);
        assert!(!tracker.observe(3, 3));
        assert!(!tracker.observe(3, 4));
        assert!(!tracker.observe(4, 4));
        assert!(tracker.observe(4, 4));
    }

    #[test]
    fn stall_tracker_seeded_output_does_not_count_as_growth() {
        // Output resumed at 3 lines; the attempts themselves add nothing.
        let mut tracker = StallTracker::new(2);
        assert!(!tracker.observe(3, 3));
        assert!(tracker.observe(3, 3));
    }

    #[test]
    fn stall_tracker_disabled_never_fires() {
        let mut tracker = StallTracker::new(0);
        for _ in 0..100 {
            assert!(!tracker.observe(3, 3));
        }
    }

    #[test]
    fn retry_budget_exhausts_at_max() {
        let mut budget = RetryBudget::new(2);
        assert!(!budget.record_attempt());
        assert!(budget.record_attempt());
        assert_eq!(budget.attempts(), 2);
    }

    #[test]
    fn retry_budget_zero_is_unbounded() {
        let mut budget = RetryBudget::new(0);
        for _ in 0..1000 {
            assert!(!budget.record_attempt());
        }
    }
}
