//! Row types for the ledger tables
//!
//! Balances and amounts are integer minor currency units. Timestamps come
//! back from PostgreSQL as `TIMESTAMPTZ`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A bank account. Currency is immutable after creation; the balance never
/// goes negative after a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Account {
    pub id: i64,
    pub owner: String,
    pub balance: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// One signed ledger line: positive = credit, negative = debit.
/// Every committed transfer produces exactly two entries summing to zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Entry {
    pub id: i64,
    pub account_id: i64,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// A committed movement of money between two distinct accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Transfer {
    pub id: i64,
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct User {
    pub username: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub full_name: String,
    pub email: String,
    pub password_changed_at: DateTime<Utc>,
    pub is_email_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// A single-use email verification code. Consumable at most once and only
/// before `expired_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct VerifyEmail {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub secret_code: String,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}
