//! Per-chunk progress snapshot.

use std::sync::Arc;
use std::time::Duration;

/// Progress after one chunk. `speed` is the instantaneous rate of that chunk
/// alone; `speed` and `eta` may be infinite or NaN for very fast chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferProgress {
    /// Bytes acknowledged so far (`end + 1` of the last chunk).
    pub uploaded: u64,
    pub total: u64,
    /// Percent complete with two decimals, e.g. `"41.67"`.
    pub percentage: String,
    /// Bytes per second.
    pub speed: f64,
    /// Seconds remaining at `speed`.
    pub eta: f64,
}

impl TransferProgress {
    pub fn after_chunk(uploaded: u64, total: u64, chunk_bytes: u64, elapsed: Duration) -> Self {
        let percentage = if total == 0 {
            100.0
        } else {
            uploaded as f64 / total as f64 * 100.0
        };
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        let speed = chunk_bytes as f64 / elapsed_ms * 1000.0;
        let eta = total.saturating_sub(uploaded) as f64 / speed;
        TransferProgress {
            uploaded,
            total,
            percentage: format!("{:.2}", percentage),
            speed,
            eta,
        }
    }
}

/// Progress callback, invoked once per chunk.
pub type ProgressFn = Arc<dyn Fn(&TransferProgress) + Send + Sync>;
