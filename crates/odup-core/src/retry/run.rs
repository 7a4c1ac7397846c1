//! Retry loop: run an async operation until success or policy says stop.

use std::future::Future;

use super::classify;
use super::policy::{ErrorKind, RetryDecision, RetryPolicy};
use crate::error::UploadError;

/// Runs `op` until it succeeds or the retry policy says to stop.
/// On retryable failure, sleeps for the backoff duration then tries again.
/// The last error is returned unchanged.
pub async fn run_with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, UploadError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, UploadError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(v) => {
                if attempt > 0 {
                    tracing::debug!(attempts = attempt + 1, "succeeded after retry");
                }
                return Ok(v);
            }
            Err(e) => {
                let kind = classify::classify(&e);
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => {
                        if kind != ErrorKind::Other {
                            tracing::warn!(error = %e, attempts = attempt + 1, "retries exhausted");
                        }
                        return Err(e);
                    }
                    RetryDecision::RetryAfter(d) => {
                        tracing::warn!(
                            error = %e,
                            attempt,
                            ?kind,
                            delay_ms = d.as_millis() as u64,
                            "transient failure, retrying"
                        );
                        tokio::time::sleep(d).await;
                        attempt += 1;
                    }
                }
            }
        }
    }
}
