//! Bounded-concurrency task queue.
//!
//! Keeps up to `max_concurrency` tasks running at once; when one finishes,
//! the next queued task is started until the backlog is empty. Failures are
//! counted, never propagated.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::error::UploadError;

/// One unit of work: a file upload, typically.
pub type Task = Pin<Box<dyn Future<Output = Result<(), UploadError>> + Send>>;

/// Outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub success: usize,
    pub failed: usize,
    pub total: usize,
}

impl QueueStats {
    pub fn finished(&self) -> usize {
        self.success + self.failed
    }
}

#[derive(Default)]
struct QueueState {
    backlog: VecDeque<Task>,
    running: usize,
    success: usize,
    failed: usize,
}

struct Shared {
    max_concurrency: usize,
    total: usize,
    state: Mutex<QueueState>,
    idle: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start backlog tasks while there is capacity. Caller holds the lock.
    fn admit(self: &Arc<Self>, state: &mut QueueState) {
        while state.running < self.max_concurrency {
            let Some(task) = state.backlog.pop_front() else {
                break;
            };
            state.running += 1;
            let shared = Arc::clone(self);
            tokio::spawn(async move {
                // Inner spawn so a panicking task is still counted.
                let outcome = match tokio::spawn(task).await {
                    Ok(result) => result,
                    Err(e) => Err(UploadError::Other(format!("task aborted: {}", e))),
                };
                shared.finish(outcome);
            });
        }
    }

    fn finish(self: &Arc<Self>, outcome: Result<(), UploadError>) {
        let mut state = self.lock();
        state.running -= 1;
        match outcome {
            Ok(()) => state.success += 1,
            Err(e) => {
                state.failed += 1;
                tracing::warn!(
                    error = %e,
                    failed = state.failed,
                    total = self.total,
                    "queued task failed"
                );
            }
        }
        self.admit(&mut state);
        if state.backlog.is_empty() && state.running == 0 {
            self.idle.notify_waiters();
        }
    }
}

/// FIFO queue with at most `max_concurrency` tasks in flight.
///
/// `submit` must be called from inside a tokio runtime.
#[derive(Clone)]
pub struct ConcurrencyQueue {
    shared: Arc<Shared>,
}

impl ConcurrencyQueue {
    /// `total_tasks` is informational (reported in stats and logs).
    /// A `max_concurrency` of zero is treated as one.
    pub fn new(max_concurrency: usize, total_tasks: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                max_concurrency: max_concurrency.max(1),
                total: total_tasks,
                state: Mutex::new(QueueState::default()),
                idle: Notify::new(),
            }),
        }
    }

    /// Enqueue `task` and start it right away if a slot is free. Never blocks.
    pub fn submit<F>(&self, task: F)
    where
        F: Future<Output = Result<(), UploadError>> + Send + 'static,
    {
        let mut state = self.shared.lock();
        state.backlog.push_back(Box::pin(task));
        self.shared.admit(&mut state);
    }

    /// Resolves once the backlog is empty and nothing is running.
    pub async fn await_completion(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a finish between check and await is not lost.
            notified.as_mut().enable();
            {
                let state = self.shared.lock();
                if state.backlog.is_empty() && state.running == 0 {
                    return;
                }
            }
            notified.await;
        }
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.shared.lock();
        QueueStats {
            success: state.success,
            failed: state.failed,
            total: self.shared.total,
        }
    }

    pub fn running(&self) -> usize {
        self.shared.lock().running
    }
}
