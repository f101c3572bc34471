//! Task processor
//!
//! A pool of worker loops that claim tasks from the queue substrate,
//! dispatch them by type to a registered handler and report the outcome:
//! acknowledge on success, reschedule with exponential backoff while
//! attempts remain, archive once the retry ceiling is hit. Each attempt runs
//! under its own timeout; exceeding it counts as a handler failure.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::queue::TaskQueue;
use super::task::Task;
use crate::error::{CoreError, ErrorKind};

/// A type-specific task handler.
///
/// The substrate is at-least-once: handlers must be idempotent or tolerant
/// of duplicate side effects, keyed by the stable task id where needed.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn process(&self, task: &Task) -> Result<(), CoreError>;
}

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Queues to consume, highest priority first.
    pub queues: Vec<String>,
    /// Number of concurrent worker loops.
    pub concurrency: usize,
    /// Per-attempt handler timeout.
    pub attempt_timeout: Duration,
    /// Base delay for exponential retry backoff.
    pub retry_base: Duration,
    /// Backoff ceiling.
    pub retry_cap: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            queues: vec!["critical".to_string(), "default".to_string()],
            concurrency: 4,
            attempt_timeout: Duration::from_secs(30),
            retry_base: Duration::from_millis(500),
            retry_cap: Duration::from_secs(300),
        }
    }
}

pub struct TaskProcessor {
    queue: Arc<dyn TaskQueue>,
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
    config: ProcessorConfig,
}

impl TaskProcessor {
    pub fn new(queue: Arc<dyn TaskQueue>, config: ProcessorConfig) -> Self {
        Self {
            queue,
            handlers: HashMap::new(),
            config,
        }
    }

    /// Register the handler for a task type. Later registrations replace
    /// earlier ones.
    pub fn register(&mut self, task_type: impl Into<String>, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(task_type.into(), handler);
    }

    /// Run the worker pool until `shutdown` flips to true. Workers finish
    /// their in-flight attempt before exiting.
    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        info!(
            concurrency = self.config.concurrency,
            queues = ?self.config.queues,
            "starting task processor"
        );

        let mut workers = Vec::with_capacity(self.config.concurrency);
        for worker_id in 0..self.config.concurrency {
            let processor = self.clone();
            let shutdown = shutdown.clone();
            workers.push(tokio::spawn(async move {
                processor.worker_loop(worker_id, shutdown).await;
            }));
        }

        for worker in workers {
            let _ = worker.await;
        }
        info!("task processor stopped");
    }

    async fn worker_loop(&self, worker_id: usize, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                debug!(worker_id, "worker shutting down");
                return;
            }

            let claimed = tokio::select! {
                _ = shutdown.changed() => {
                    debug!(worker_id, "worker shutting down");
                    return;
                }
                claimed = self.queue.claim_next(&self.config.queues) => claimed,
            };

            let task = match claimed {
                Ok(task) => task,
                Err(err) => {
                    error!(worker_id, error = %err, "failed to claim task");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            self.process_one(worker_id, task).await;
        }
    }

    async fn process_one(&self, worker_id: usize, task: Task) {
        debug!(
            worker_id,
            task_id = %task.id,
            task_type = %task.task_type,
            attempt = task.attempts,
            "task claimed"
        );

        match self.dispatch(&task).await {
            Ok(()) => {
                if let Err(err) = self.queue.acknowledge(&task).await {
                    error!(task_id = %task.id, error = %err, "failed to acknowledge task");
                    return;
                }
                info!(
                    task_id = %task.id,
                    task_type = %task.task_type,
                    attempt = task.attempts,
                    "task processed"
                );
            }
            Err(err) => self.handle_failure(task, err).await,
        }
    }

    async fn dispatch(&self, task: &Task) -> Result<(), CoreError> {
        let handler = self
            .handlers
            .get(&task.task_type)
            .ok_or_else(|| CoreError::UnknownTaskType(task.task_type.clone()))?;

        match tokio::time::timeout(self.config.attempt_timeout, handler.process(task)).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::AttemptTimeout(self.config.attempt_timeout)),
        }
    }

    async fn handle_failure(&self, task: Task, err: CoreError) {
        // Validation failures are deterministic: a malformed payload or an
        // unregistered type can never succeed, so retrying only burns
        // attempts. Everything else gets the retry policy.
        let retryable = err.kind() != ErrorKind::Validation;

        if retryable && task.attempts < task.max_retry {
            let delay = self.retry_delay(task.attempts);
            warn!(
                task_id = %task.id,
                task_type = %task.task_type,
                attempt = task.attempts,
                max_retry = task.max_retry,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "task attempt failed, rescheduling"
            );
            if let Err(requeue_err) = self.queue.reschedule(&task, delay).await {
                error!(task_id = %task.id, error = %requeue_err, "failed to reschedule task");
            }
        } else {
            error!(
                task_id = %task.id,
                task_type = %task.task_type,
                attempts = task.attempts,
                error = %err,
                "task failed permanently, archiving"
            );
            if let Err(archive_err) = self.queue.archive(&task).await {
                error!(task_id = %task.id, error = %archive_err, "failed to archive task");
            }
        }
    }

    /// Exponential backoff with jitter: `retry_base * 2^(attempt-1)` capped
    /// at `retry_cap`, plus up to 25% jitter.
    fn retry_delay(&self, attempt: i32) -> Duration {
        let shift = (attempt.max(1) - 1).min(16) as u32;
        let exp = self.config.retry_base.saturating_mul(1u32 << shift);
        let capped = exp.min(self.config.retry_cap);
        let jitter_ms = rand::thread_rng().gen_range(0..=capped.as_millis() as u64 / 4);
        capped + Duration::from_millis(jitter_ms)
    }
}
