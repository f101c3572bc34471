//! monoledger — atomic money movement over PostgreSQL plus a durable
//! background task queue.
//!
//! The two coupled subsystems live in [`store`] (deadlock-free multi-row
//! transactions for transfers and email verification) and [`worker`]
//! (distributor + processor over an at-least-once queue substrate). The
//! protocol layer in front of them is intentionally out of scope; it
//! consumes [`store::Store::transfer_tx`], [`store::Store::verify_email_tx`]
//! and [`worker::TaskDistributor::distribute`].

pub mod config;
pub mod error;
pub mod logging;
pub mod mail;
pub mod store;
pub mod util;
pub mod worker;

pub use error::{CoreError, ErrorKind};
pub use store::Store;
