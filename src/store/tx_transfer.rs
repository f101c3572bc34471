//! Money transfer transaction
//!
//! Moves money between two accounts atomically: one transfer row, a debit
//! and a credit entry, and both balance updates commit together or not at
//! all. Concurrent transfers between the same pair of accounts (in either
//! direction) are serialized by acquiring the two row locks in ascending
//! account-id order, which removes the circular wait that symmetric
//! opposite-direction transfers would otherwise produce.

use futures::future::FutureExt;
use tracing::info;

use super::models::{Account, Entry, Transfer};
use super::queries;
use super::{RetryPolicy, Store, retry_transient};
use crate::error::CoreError;

#[derive(Debug, Clone, Copy)]
pub struct TransferTxParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    /// Amount in minor currency units; must be positive.
    pub amount: i64,
}

impl TransferTxParams {
    /// Input validation, applied before any lock or transaction is opened.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.amount <= 0 {
            return Err(CoreError::InvalidAmount);
        }
        if self.from_account_id == self.to_account_id {
            return Err(CoreError::SameAccount);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TransferTxResult {
    pub transfer: Transfer,
    /// Post-update snapshots.
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

impl Store {
    /// Transfer `amount` from one account to another.
    ///
    /// Transient failures (serialization or deadlock aborts) retry the whole
    /// transaction under the default [`RetryPolicy`]; deterministic failures
    /// (missing account, insufficient balance, currency mismatch) surface
    /// immediately.
    pub async fn transfer_tx(&self, arg: TransferTxParams) -> Result<TransferTxResult, CoreError> {
        arg.validate()?;

        let policy = RetryPolicy::default();
        let result = retry_transient(&policy, || self.transfer_tx_once(arg)).await?;

        info!(
            transfer_id = result.transfer.id,
            from_account_id = arg.from_account_id,
            to_account_id = arg.to_account_id,
            amount = arg.amount,
            "transfer committed"
        );

        Ok(result)
    }

    async fn transfer_tx_once(&self, arg: TransferTxParams) -> Result<TransferTxResult, CoreError> {
        self.execute(move |conn| {
            async move {
                // Canonical lock order: smaller account id first, regardless
                // of transfer direction.
                let (first_id, second_id) = if arg.from_account_id < arg.to_account_id {
                    (arg.from_account_id, arg.to_account_id)
                } else {
                    (arg.to_account_id, arg.from_account_id)
                };

                let first = queries::get_account_for_update(&mut *conn, first_id)
                    .await?
                    .ok_or(CoreError::AccountNotFound(first_id))?;
                let second = queries::get_account_for_update(&mut *conn, second_id)
                    .await?
                    .ok_or(CoreError::AccountNotFound(second_id))?;

                let (from_account, to_account) = if first.id == arg.from_account_id {
                    (first, second)
                } else {
                    (second, first)
                };

                if from_account.currency != to_account.currency {
                    return Err(CoreError::CurrencyMismatch {
                        from: from_account.currency,
                        to: to_account.currency,
                    });
                }

                if from_account.balance < arg.amount {
                    return Err(CoreError::InsufficientBalance {
                        account_id: from_account.id,
                        balance: from_account.balance,
                        required: arg.amount,
                    });
                }

                let transfer = queries::create_transfer(
                    &mut *conn,
                    arg.from_account_id,
                    arg.to_account_id,
                    arg.amount,
                )
                .await?;

                let from_entry =
                    queries::create_entry(&mut *conn, arg.from_account_id, -arg.amount).await?;
                let to_entry =
                    queries::create_entry(&mut *conn, arg.to_account_id, arg.amount).await?;

                // Write balances in the same canonical order as the locks.
                let (from_account, to_account) = if arg.from_account_id < arg.to_account_id {
                    let from_account =
                        queries::add_account_balance(&mut *conn, arg.from_account_id, -arg.amount)
                            .await?;
                    let to_account =
                        queries::add_account_balance(&mut *conn, arg.to_account_id, arg.amount)
                            .await?;
                    (from_account, to_account)
                } else {
                    let to_account =
                        queries::add_account_balance(&mut *conn, arg.to_account_id, arg.amount)
                            .await?;
                    let from_account =
                        queries::add_account_balance(&mut *conn, arg.from_account_id, -arg.amount)
                            .await?;
                    (from_account, to_account)
                };

                Ok(TransferTxResult {
                    transfer,
                    from_account,
                    to_account,
                    from_entry,
                    to_entry,
                })
            }
            .boxed()
        })
        .await
    }
}
