//! Task handlers
//!
//! Handlers run under at-least-once delivery: a redelivered send mints a
//! fresh single-use code and sends one more email, which is harmless. The
//! consumption side stays safe because codes are consumed under a row lock
//! in the verify-email transaction.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::processor::TaskHandler;
use super::task::Task;
use crate::config::VerifyEmailConfig;
use crate::error::CoreError;
use crate::mail::EmailSender;
use crate::store::Store;
use crate::store::queries::{self, CreateVerifyEmailParams};
use crate::util::random;

pub const TASK_SEND_VERIFY_EMAIL: &str = "task:send_verify_email";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadSendVerifyEmail {
    pub username: String,
}

/// Sends the account verification email for a newly registered user.
pub struct SendVerifyEmailHandler {
    store: Store,
    mailer: Arc<dyn EmailSender>,
    config: VerifyEmailConfig,
}

impl SendVerifyEmailHandler {
    pub fn new(store: Store, mailer: Arc<dyn EmailSender>, config: VerifyEmailConfig) -> Self {
        Self {
            store,
            mailer,
            config,
        }
    }
}

#[async_trait]
impl TaskHandler for SendVerifyEmailHandler {
    async fn process(&self, task: &Task) -> Result<(), CoreError> {
        let payload: PayloadSendVerifyEmail = serde_json::from_slice(&task.payload)?;

        // A missing user is retryable: the enqueue may race the creating
        // transaction's commit.
        let user = queries::get_user(self.store.pool(), &payload.username)
            .await?
            .ok_or_else(|| CoreError::UserNotFound(payload.username.clone()))?;

        let verify_email = queries::create_verify_email(
            self.store.pool(),
            &CreateVerifyEmailParams {
                username: user.username.clone(),
                email: user.email.clone(),
                secret_code: random::random_string(32),
                expired_at: Utc::now() + Duration::minutes(self.config.code_ttl_mins),
            },
        )
        .await?;

        let verify_url = format!(
            "{}/v1/verify_email?email_id={}&secret_code={}",
            self.config.base_url, verify_email.id, verify_email.secret_code
        );
        let subject = "Welcome to Monoledger";
        let body = format!(
            "Hello {},<br/>\
             Thank you for registering with us!<br/>\
             Please <a href=\"{}\">click here</a> to verify your email address.<br/>",
            user.full_name, verify_url
        );

        self.mailer
            .send_email(subject, &body, &[user.email.clone()], &[])
            .await?;

        info!(
            task_id = %task.id,
            username = %user.username,
            email = %user.email,
            "verification email sent"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_roundtrip() {
        let payload = PayloadSendVerifyEmail {
            username: "alice".to_string(),
        };
        let bytes = serde_json::to_vec(&payload).expect("should encode");
        let decoded: PayloadSendVerifyEmail =
            serde_json::from_slice(&bytes).expect("should decode");
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_garbage_payload_is_a_validation_error() {
        let err: CoreError = serde_json::from_slice::<PayloadSendVerifyEmail>(b"not-json")
            .map_err(CoreError::from)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }
}
