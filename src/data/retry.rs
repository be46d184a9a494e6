//! Retry schedule for transient upstream failures

use backoff::{backoff::Backoff, ExponentialBackoff};
use std::time::Duration;

/// Longest single wait between attempts
const MAX_RETRY_INTERVAL: Duration = Duration::from_secs(60);

/// How many times a failed request is retried and how long to wait between tries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base delay; the n-th retry after the first waits `factor * 2^(n-2)`
    pub backoff_factor: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_factor: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Creates the delay schedule for one request
    pub fn schedule(&self) -> RetrySchedule {
        RetrySchedule {
            retries: 0,
            backoff: ExponentialBackoff {
                current_interval: self.backoff_factor,
                initial_interval: self.backoff_factor,
                randomization_factor: 0.0,
                multiplier: 2.0,
                max_interval: MAX_RETRY_INTERVAL,
                max_elapsed_time: None,
                ..Default::default()
            },
        }
    }

    /// Total attempts a request may make
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Produces the wait before each retry of a single request
///
/// The first retry goes out immediately, later ones back off exponentially:
/// 0s, 1s, 2s, 4s with the default factor.
pub struct RetrySchedule {
    retries: u32,
    backoff: ExponentialBackoff,
}

impl RetrySchedule {
    /// Returns how long to wait before the next retry
    pub fn next_delay(&mut self) -> Duration {
        self.retries += 1;
        if self.retries == 1 {
            return Duration::ZERO;
        }
        self.backoff.next_backoff().unwrap_or(MAX_RETRY_INTERVAL)
    }
}

/// Determine if an HTTP status code is worth retrying
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable_status() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(502));
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(504));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(501));
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.max_attempts(), 4);
    }

    #[test]
    fn test_schedule_doubles_after_immediate_retry() {
        let mut schedule = RetryPolicy::default().schedule();
        let delays: Vec<u128> = (0..4).map(|_| schedule.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![0, 1000, 2000, 4000]);
    }

    #[test]
    fn test_zero_factor_never_waits() {
        let policy = RetryPolicy {
            max_retries: 3,
            backoff_factor: Duration::ZERO,
        };
        let mut schedule = policy.schedule();
        for _ in 0..3 {
            assert!(schedule.next_delay() < Duration::from_millis(1));
        }
    }
}
