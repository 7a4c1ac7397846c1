use rand::Rng;
use std::time::Duration;

/// Upper bound on jitter as a fraction of the un-jittered delay.
pub const JITTER_RATIO: f64 = 0.3;

/// High-level classification of an error for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Server asked us to slow down (429).
    Throttled,
    /// Network-level failure (connection reset, DNS, timeout).
    Connection,
    /// Transient server failure (500, 502, 503, 504).
    Http5xx(u16),
    /// Any other error (never retried).
    Other,
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Exponential backoff with positive jitter and a cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first failed attempt.
    pub max_retries: u32,
    /// Delay before the first retry (before jitter).
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (0-based) with a fixed jitter
    /// fraction in `[0, 1]`: `min(initial * 2^attempt + jitter, max_delay)`
    /// where jitter is `fraction * 30%` of the un-jittered delay.
    pub fn backoff(&self, attempt: u32, jitter_fraction: f64) -> Duration {
        let factor = 1u32 << attempt.min(20);
        let base = self.initial_delay.saturating_mul(factor);
        let fraction = jitter_fraction.clamp(0.0, 1.0);
        let jitter = base.mul_f64(JITTER_RATIO * fraction);
        base.saturating_add(jitter).min(self.max_delay)
    }

    /// Decide whether failed attempt `attempt` (0-based) should be retried.
    ///
    /// The attempt numbered `max_retries` is the last one; its error is final.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_retries {
            return RetryDecision::NoRetry;
        }

        match kind {
            ErrorKind::Other => RetryDecision::NoRetry,
            ErrorKind::Connection | ErrorKind::Throttled | ErrorKind::Http5xx(_) => {
                let fraction: f64 = rand::thread_rng().gen_range(0.0..=1.0);
                RetryDecision::RetryAfter(self.backoff(attempt, fraction))
            }
        }
    }
}
