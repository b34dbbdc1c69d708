use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded retry policy for per-tile downloads.
///
/// Kept as a plain value so the schedule and abort threshold can be tested
/// without any network code.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts per tile, including the first.
    pub max_attempts: u32,
    /// Base backoff; attempt `k` (1-based) waits `k * backoff_base_ms`.
    pub backoff_base_ms: u64,
    /// Abort the whole fetch when failed tiles exceed this fraction.
    pub abort_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 500,
            abort_fraction: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after attempt `attempt` (1-based) failed.
    /// Returns `None` once the attempt budget is spent.
    pub fn backoff_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            None
        } else {
            Some(Duration::from_millis(self.backoff_base_ms * attempt as u64))
        }
    }

    /// Whether `failures` out of `total` units exhausts the failure budget.
    pub fn budget_exceeded(&self, failures: usize, total: usize) -> bool {
        failures as f64 > total as f64 * self.abort_fraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_linearly_then_stops() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff_after(1), Some(Duration::from_millis(500)));
        assert_eq!(p.backoff_after(2), Some(Duration::from_millis(1000)));
        assert_eq!(p.backoff_after(3), None);
    }

    #[test]
    fn abort_threshold_is_strictly_greater() {
        let p = RetryPolicy::default();
        // 20 of 100 is exactly the 20% budget, still tolerated.
        assert!(!p.budget_exceeded(20, 100));
        assert!(p.budget_exceeded(21, 100));
        assert!(!p.budget_exceeded(0, 1));
        assert!(p.budget_exceeded(1, 1));
    }
}
