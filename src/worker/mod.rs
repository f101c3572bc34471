//! Durable background task queue
//!
//! The request path hands slow, failure-prone side effects to the
//! [`distributor::TaskDistributor`], which serializes them onto a durable
//! at-least-once queue behind the [`queue::TaskQueue`] trait. The
//! [`processor::TaskProcessor`] runs a pool of workers that claim tasks,
//! dispatch them by type to a registered handler, and apply retry with
//! exponential backoff on failure. Handlers must tolerate redelivery; the
//! substrate gives no exactly-once guarantee.

pub mod distributor;
pub mod handlers;
pub mod pg_queue;
pub mod processor;
pub mod queue;
pub mod task;

pub use distributor::TaskDistributor;
pub use pg_queue::PgQueue;
pub use processor::{ProcessorConfig, TaskHandler, TaskProcessor};
pub use queue::{MemoryQueue, TaskQueue};
pub use task::{QUEUE_CRITICAL, QUEUE_DEFAULT, Task, TaskOptions};
