//! Queue substrate contract
//!
//! The core is a stateless client of a durable at-least-once queue. The
//! trait mirrors the substrate's atomic claim operation plus the three
//! possible outcomes of an attempt: acknowledge, reschedule, archive.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, Notify};

use super::task::Task;
use crate::error::CoreError;

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Durably accept a task. Returns once the substrate owns it, not once
    /// it has been processed.
    async fn enqueue(&self, task: Task) -> Result<(), CoreError>;

    /// Wait for the next due task on one of `queues` and claim it. Claiming
    /// atomically increments the task's attempt count.
    async fn claim_next(&self, queues: &[String]) -> Result<Task, CoreError>;

    /// The attempt succeeded; remove the task.
    async fn acknowledge(&self, task: &Task) -> Result<(), CoreError>;

    /// The attempt failed; hand the task out again after `delay`.
    async fn reschedule(&self, task: &Task, delay: Duration) -> Result<(), CoreError>;

    /// Retries are exhausted; move the task to the terminal failure archive.
    async fn archive(&self, task: &Task) -> Result<(), CoreError>;
}

#[derive(Default)]
struct MemoryState {
    pending: Vec<Task>,
    archived: Vec<Task>,
}

/// In-process queue used by tests. Honors `process_at`, counts attempts at
/// claim time and keeps a failure archive, but is not durable across
/// process restarts.
#[derive(Default)]
pub struct MemoryQueue {
    state: Mutex<MemoryState>,
    notify: Notify,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks moved to the failure archive, oldest first.
    pub async fn archived(&self) -> Vec<Task> {
        self.state.lock().await.archived.clone()
    }

    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }
}

#[async_trait]
impl TaskQueue for MemoryQueue {
    async fn enqueue(&self, task: Task) -> Result<(), CoreError> {
        self.state.lock().await.pending.push(task);
        self.notify.notify_one();
        Ok(())
    }

    async fn claim_next(&self, queues: &[String]) -> Result<Task, CoreError> {
        loop {
            let next_due = {
                let mut state = self.state.lock().await;
                let now = Utc::now();

                let mut best: Option<usize> = None;
                for i in 0..state.pending.len() {
                    let task = &state.pending[i];
                    if !queues.contains(&task.queue) || task.process_at > now {
                        continue;
                    }
                    match best {
                        Some(b) if state.pending[b].process_at <= task.process_at => {}
                        _ => best = Some(i),
                    }
                }

                if let Some(i) = best {
                    let mut task = state.pending.remove(i);
                    task.attempts += 1;
                    return Ok(task);
                }

                // Nothing due yet: sleep until the earliest matching task.
                state
                    .pending
                    .iter()
                    .filter(|t| queues.contains(&t.queue))
                    .map(|t| (t.process_at - now).to_std().unwrap_or(Duration::ZERO))
                    .min()
            };

            match next_due {
                Some(wait) => {
                    tokio::select! {
                        _ = self.notify.notified() => {}
                        _ = tokio::time::sleep(wait.max(Duration::from_millis(1))) => {}
                    }
                }
                None => self.notify.notified().await,
            }
        }
    }

    async fn acknowledge(&self, _task: &Task) -> Result<(), CoreError> {
        // Claiming already removed the task from pending.
        Ok(())
    }

    async fn reschedule(&self, task: &Task, delay: Duration) -> Result<(), CoreError> {
        let mut requeued = task.clone();
        requeued.process_at =
            Utc::now() + chrono::Duration::milliseconds(delay.as_millis() as i64);

        self.state.lock().await.pending.push(requeued);
        self.notify.notify_one();
        Ok(())
    }

    async fn archive(&self, task: &Task) -> Result<(), CoreError> {
        self.state.lock().await.archived.push(task.clone());
        Ok(())
    }
}
