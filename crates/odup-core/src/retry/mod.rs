//! Retry and backoff policy.
//!
//! This module encapsulates error classification (throttling, transient
//! server failures, connection failures) and exponential backoff decisions
//! so the chunk engine and the single-shot path share one policy.

mod classify;
mod policy;
mod run;

pub use classify::{classify, classify_http_status};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
