//! End-to-end worker tests over the in-memory queue substrate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use monoledger::CoreError;
use monoledger::mail::{EmailSender, MemorySender};
use monoledger::worker::handlers::PayloadSendVerifyEmail;
use monoledger::worker::processor::TaskHandler;
use monoledger::worker::task::Task;
use monoledger::worker::{
    MemoryQueue, ProcessorConfig, QUEUE_CRITICAL, TaskDistributor, TaskOptions, TaskProcessor,
};

/// Test handler that turns the verify-email payload into an outgoing mail,
/// without touching a database.
struct MailingHandler {
    mailer: Arc<MemorySender>,
}

#[async_trait]
impl TaskHandler for MailingHandler {
    async fn process(&self, task: &Task) -> Result<(), CoreError> {
        let payload: PayloadSendVerifyEmail = serde_json::from_slice(&task.payload)?;
        let body = format!("Hello {}, please verify your email.", payload.username);
        self.mailer
            .send_email(
                "Welcome",
                &body,
                &[format!("{}@email.com", payload.username)],
                &[],
            )
            .await
    }
}

fn test_config(queues: Vec<String>) -> ProcessorConfig {
    ProcessorConfig {
        queues,
        concurrency: 2,
        attempt_timeout: Duration::from_secs(1),
        retry_base: Duration::from_millis(1),
        retry_cap: Duration::from_millis(5),
    }
}

#[tokio::test]
async fn test_distribute_then_process_sends_email() {
    let queue = Arc::new(MemoryQueue::new());
    let mailer = Arc::new(MemorySender::new());

    let distributor = TaskDistributor::new(queue.clone());
    let mut processor = TaskProcessor::new(
        queue.clone(),
        test_config(vec![QUEUE_CRITICAL.to_string()]),
    );
    processor.register(
        monoledger::worker::handlers::TASK_SEND_VERIFY_EMAIL,
        Arc::new(MailingHandler {
            mailer: mailer.clone(),
        }),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run = tokio::spawn(Arc::new(processor).run(shutdown_rx));

    distributor
        .distribute_send_verify_email(
            &PayloadSendVerifyEmail {
                username: "alice".to_string(),
            },
            TaskOptions::critical().with_max_retry(3),
        )
        .await
        .expect("enqueue must succeed once the substrate accepted the task");

    let mut sent = Vec::new();
    for _ in 0..200 {
        sent = mailer.sent();
        if !sent.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(sent.len(), 1, "exactly one email for one task");
    assert_eq!(sent[0].to, vec!["alice@email.com"]);
    assert!(sent[0].html_body.contains("alice"));
    assert!(queue.archived().await.is_empty());

    shutdown_tx.send(true).expect("should signal shutdown");
    run.await.expect("processor should stop cleanly");
}

#[tokio::test]
async fn test_delayed_task_is_processed_after_delay() {
    let queue = Arc::new(MemoryQueue::new());
    let mailer = Arc::new(MemorySender::new());

    let distributor = TaskDistributor::new(queue.clone());
    let mut processor = TaskProcessor::new(
        queue.clone(),
        test_config(vec!["default".to_string()]),
    );
    processor.register(
        monoledger::worker::handlers::TASK_SEND_VERIFY_EMAIL,
        Arc::new(MailingHandler {
            mailer: mailer.clone(),
        }),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run = tokio::spawn(Arc::new(processor).run(shutdown_rx));

    distributor
        .distribute_send_verify_email(
            &PayloadSendVerifyEmail {
                username: "bob".to_string(),
            },
            TaskOptions::default().with_delay(Duration::from_millis(100)),
        )
        .await
        .expect("should distribute");

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(mailer.sent().is_empty(), "task must wait out its delay");

    let mut sent = Vec::new();
    for _ in 0..200 {
        sent = mailer.sent();
        if !sent.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(sent.len(), 1);

    shutdown_tx.send(true).expect("should signal shutdown");
    run.await.expect("processor should stop cleanly");
}

#[tokio::test]
async fn test_failing_handler_hits_retry_ceiling_and_archives() {
    struct AlwaysFails;

    #[async_trait]
    impl TaskHandler for AlwaysFails {
        async fn process(&self, _task: &Task) -> Result<(), CoreError> {
            Err(CoreError::MailDelivery("mail api returned 503".into()))
        }
    }

    let queue = Arc::new(MemoryQueue::new());
    let distributor = TaskDistributor::new(queue.clone());

    let mut processor = TaskProcessor::new(
        queue.clone(),
        test_config(vec!["default".to_string()]),
    );
    processor.register("task:doomed", Arc::new(AlwaysFails));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run = tokio::spawn(Arc::new(processor).run(shutdown_rx));

    distributor
        .distribute(
            "task:doomed",
            b"{}".to_vec(),
            TaskOptions::default().with_max_retry(4),
        )
        .await
        .expect("should distribute");

    let mut archived = Vec::new();
    for _ in 0..200 {
        archived = queue.archived().await;
        if !archived.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].attempts, 4, "attempted exactly max_retry times");
    assert_eq!(queue.pending_len().await, 0);

    shutdown_tx.send(true).expect("should signal shutdown");
    run.await.expect("processor should stop cleanly");
}
