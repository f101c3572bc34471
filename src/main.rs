use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::info;

use monoledger::config::AppConfig;
use monoledger::logging;
use monoledger::mail::{ApiMailer, EmailSender};
use monoledger::store::Store;
use monoledger::worker::handlers::{SendVerifyEmailHandler, TASK_SEND_VERIFY_EMAIL};
use monoledger::worker::{PgQueue, TaskProcessor, TaskQueue};

#[tokio::main]
async fn main() -> Result<()> {
    let env = std::env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());
    let config = AppConfig::load(&env);
    let _guard = logging::init_logging(&config);

    let store = Store::connect(&config.postgres_url)
        .await
        .context("cannot connect to postgres")?;
    store.health_check().await.context("database health check failed")?;

    let queue: Arc<dyn TaskQueue> = Arc::new(PgQueue::new(store.pool().clone(), &config.worker));
    let mailer: Arc<dyn EmailSender> = Arc::new(ApiMailer::new(config.mail.clone()));

    let mut processor = TaskProcessor::new(queue, config.worker.processor_config());
    processor.register(
        TASK_SEND_VERIFY_EMAIL,
        Arc::new(SendVerifyEmailHandler::new(
            store.clone(),
            mailer,
            config.verify_email.clone(),
        )),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let processor = Arc::new(processor);
    let processor_task = tokio::spawn(processor.run(shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("cannot listen for shutdown signal")?;
    info!("shutdown signal received, draining workers");

    shutdown_tx
        .send(true)
        .context("cannot signal worker shutdown")?;
    processor_task.await.context("task processor panicked")?;

    Ok(())
}
