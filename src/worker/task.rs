//! Task model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::time::Duration;

pub const QUEUE_CRITICAL: &str = "critical";
pub const QUEUE_DEFAULT: &str = "default";

/// One unit of deferred work.
///
/// Created by the distributor, owned by the queue substrate until a worker
/// claims it, removed on success or moved to the failure archive once
/// `attempts` reaches `max_retry`. The ulid `id` is stable across
/// redeliveries and serves as the idempotency key for handler side effects.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: String,
    pub task_type: String,
    /// Opaque payload bytes; the handler owns the encoding.
    pub payload: Vec<u8>,
    pub queue: String,
    pub max_retry: i32,
    /// Attempts so far, incremented atomically when a worker claims the task.
    pub attempts: i32,
    /// Earliest time the task may be processed.
    pub process_at: DateTime<Utc>,
}

/// Per-task delivery options.
#[derive(Debug, Clone)]
pub struct TaskOptions {
    pub queue: String,
    pub max_retry: i32,
    /// Optional delay before the first processing attempt.
    pub delay: Option<Duration>,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            queue: QUEUE_DEFAULT.to_string(),
            max_retry: 10,
            delay: None,
        }
    }
}

impl TaskOptions {
    /// Options for the critical queue.
    pub fn critical() -> Self {
        Self {
            queue: QUEUE_CRITICAL.to_string(),
            ..Self::default()
        }
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    pub fn with_max_retry(mut self, max_retry: i32) -> Self {
        self.max_retry = max_retry;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}
