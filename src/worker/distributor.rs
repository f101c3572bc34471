//! Task distributor
//!
//! Serializes a task description and hands it to the durable queue
//! substrate. `distribute` returns once the substrate has accepted the task,
//! not once it has been processed. If the substrate rejects the enqueue the
//! error propagates so the caller can fail the parent operation instead of
//! silently dropping the side effect.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::handlers::{PayloadSendVerifyEmail, TASK_SEND_VERIFY_EMAIL};
use super::queue::TaskQueue;
use super::task::{Task, TaskOptions};
use crate::error::CoreError;

pub struct TaskDistributor {
    queue: Arc<dyn TaskQueue>,
}

impl TaskDistributor {
    pub fn new(queue: Arc<dyn TaskQueue>) -> Self {
        Self { queue }
    }

    /// Enqueue `payload` under `task_type`. Returns the generated task id.
    pub async fn distribute(
        &self,
        task_type: &str,
        payload: Vec<u8>,
        options: TaskOptions,
    ) -> Result<String, CoreError> {
        let id = ulid::Ulid::new().to_string();
        let process_at = match options.delay {
            Some(delay) => Utc::now() + chrono::Duration::milliseconds(delay.as_millis() as i64),
            None => Utc::now(),
        };

        let task = Task {
            id: id.clone(),
            task_type: task_type.to_string(),
            payload,
            queue: options.queue,
            max_retry: options.max_retry,
            attempts: 0,
            process_at,
        };
        let queue_name = task.queue.clone();

        self.queue.enqueue(task).await?;

        info!(
            task_id = %id,
            task_type,
            queue = %queue_name,
            "task enqueued"
        );

        Ok(id)
    }

    /// Schedule a verification email for `payload.username`.
    pub async fn distribute_send_verify_email(
        &self,
        payload: &PayloadSendVerifyEmail,
        options: TaskOptions,
    ) -> Result<String, CoreError> {
        let bytes = serde_json::to_vec(payload)?;
        self.distribute(TASK_SEND_VERIFY_EMAIL, bytes, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::queue::MemoryQueue;
    use crate::worker::task::QUEUE_CRITICAL;
    use std::time::Duration;

    #[tokio::test]
    async fn test_distribute_stamps_id_and_options() {
        let queue = Arc::new(MemoryQueue::new());
        let distributor = TaskDistributor::new(queue.clone());

        let id = distributor
            .distribute(
                "task:test",
                b"hello".to_vec(),
                TaskOptions::critical().with_max_retry(5),
            )
            .await
            .expect("should distribute");

        let claimed = queue
            .claim_next(&[QUEUE_CRITICAL.to_string()])
            .await
            .expect("should claim");
        assert_eq!(claimed.id, id);
        assert_eq!(claimed.task_type, "task:test");
        assert_eq!(claimed.payload, b"hello");
        assert_eq!(claimed.max_retry, 5);
    }

    #[tokio::test]
    async fn test_distribute_verify_email_payload_roundtrip() {
        let queue = Arc::new(MemoryQueue::new());
        let distributor = TaskDistributor::new(queue.clone());

        let payload = PayloadSendVerifyEmail {
            username: "alice".to_string(),
        };
        distributor
            .distribute_send_verify_email(&payload, TaskOptions::default())
            .await
            .expect("should distribute");

        let claimed = queue
            .claim_next(&[crate::worker::task::QUEUE_DEFAULT.to_string()])
            .await
            .expect("should claim");
        assert_eq!(claimed.task_type, TASK_SEND_VERIFY_EMAIL);

        let decoded: PayloadSendVerifyEmail =
            serde_json::from_slice(&claimed.payload).expect("payload should decode");
        assert_eq!(decoded.username, "alice");
    }

    #[tokio::test]
    async fn test_distribute_applies_delay() {
        let queue = Arc::new(MemoryQueue::new());
        let distributor = TaskDistributor::new(queue.clone());

        distributor
            .distribute(
                "task:test",
                Vec::new(),
                TaskOptions::default().with_delay(Duration::from_secs(60)),
            )
            .await
            .expect("should distribute");

        let result = tokio::time::timeout(
            Duration::from_millis(50),
            queue.claim_next(&[crate::worker::task::QUEUE_DEFAULT.to_string()]),
        )
        .await;
        assert!(result.is_err(), "delayed task must not be due yet");
    }
}
