//! Core error types
//!
//! Every fallible operation in the store and worker layers returns
//! [`CoreError`]. Callers that need to decide on retry or response mapping
//! use [`CoreError::kind`] rather than matching individual variants.

use thiserror::Error;

/// Coarse classification used for retry and response-mapping decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or out-of-range input, rejected before any lock is taken.
    Validation,
    /// A referenced row does not exist.
    NotFound,
    /// The operation is valid but conflicts with current state.
    Conflict,
    /// Temporary failure; the whole operation may be retried.
    Transient,
    /// Unexpected failure, or a transient failure after retries ran out.
    Fatal,
}

/// Error type shared by the transactional store and the task worker.
#[derive(Error, Debug)]
pub enum CoreError {
    // === Validation ===
    #[error("amount must be greater than zero")]
    InvalidAmount,

    #[error("source and destination account cannot be the same")]
    SameAccount,

    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("malformed task payload: {0}")]
    TaskPayload(#[from] serde_json::Error),

    #[error("no handler registered for task type: {0}")]
    UnknownTaskType(String),

    // === Not found ===
    #[error("account not found: {0}")]
    AccountNotFound(i64),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("verification email not found: {0}")]
    VerifyEmailNotFound(i64),

    #[error("verification code does not match")]
    VerifyCodeMismatch,

    // === Conflict ===
    #[error("insufficient balance on account {account_id}: have {balance}, need {required}")]
    InsufficientBalance {
        account_id: i64,
        balance: i64,
        required: i64,
    },

    #[error("account currencies do not match: {from} vs {to}")]
    CurrencyMismatch { from: String, to: String },

    #[error("verification code already used")]
    VerifyCodeUsed,

    #[error("verification code expired")]
    VerifyCodeExpired,

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    // === Transient ===
    #[error("transaction serialization failure: {0}")]
    Serialization(String),

    #[error("database temporarily unavailable: {0}")]
    Unavailable(String),

    #[error("task queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error("mail delivery failed: {0}")]
    MailDelivery(String),

    #[error("task attempt timed out after {0:?}")]
    AttemptTimeout(std::time::Duration),

    // === Fatal ===
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("database error: {0}")]
    Database(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Classify this error for retry and response-mapping decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidAmount
            | CoreError::SameAccount
            | CoreError::UnsupportedCurrency(_)
            | CoreError::TaskPayload(_)
            | CoreError::UnknownTaskType(_) => ErrorKind::Validation,

            CoreError::AccountNotFound(_)
            | CoreError::UserNotFound(_)
            | CoreError::VerifyEmailNotFound(_)
            | CoreError::VerifyCodeMismatch => ErrorKind::NotFound,

            CoreError::InsufficientBalance { .. }
            | CoreError::CurrencyMismatch { .. }
            | CoreError::VerifyCodeUsed
            | CoreError::VerifyCodeExpired
            | CoreError::UniqueViolation(_) => ErrorKind::Conflict,

            CoreError::Serialization(_)
            | CoreError::Unavailable(_)
            | CoreError::QueueUnavailable(_)
            | CoreError::MailDelivery(_)
            | CoreError::AttemptTimeout(_) => ErrorKind::Transient,

            CoreError::RetriesExhausted { .. }
            | CoreError::Database(_)
            | CoreError::Internal(_) => ErrorKind::Fatal,
        }
    }

    /// True if retrying the whole operation may succeed.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

// SQLSTATE 23505 = unique_violation, 40001 = serialization_failure,
// 40P01 = deadlock_detected.
impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some("23505") => CoreError::UniqueViolation(db_err.message().to_string()),
                Some("40001") | Some("40P01") => {
                    CoreError::Serialization(db_err.message().to_string())
                }
                _ => CoreError::Database(err.to_string()),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                CoreError::Unavailable(err.to_string())
            }
            _ => CoreError::Database(err.to_string()),
        }
    }
}
