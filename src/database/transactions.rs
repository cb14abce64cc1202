// ABOUTME: Transaction management with RAII guards and retry for meal mutations
// ABOUTME: Rolls back uncommitted work on drop and retries lock contention with exponential backoff
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

//! Transaction management with RAII guards and retry patterns
//!
//! Every line mutation and its meal totals delta run in one [`TransactionGuard`]. The
//! guard rolls back if it is dropped before `commit()`, so an error anywhere between the
//! line write and the totals update leaves no partial state behind.
//!
//! Mutations are wrapped in [`retry_transaction`]: `SQLite` serializes writers, and a
//! writer that loses the race for the database lock gets `database is locked` once its
//! busy timeout expires. Those errors are retried with exponential backoff; everything
//! else propagates on the first failure.
//!
//! ```text
//! retry_transaction(|| async {
//!     let mut guard = db.begin().await?;
//!     meals::lock_meal(guard.executor()?, meal_id).await?;
//!     lines::insert_line(guard.executor()?, &line).await?;
//!     meals::apply_totals_delta(guard.executor()?, meal_id, &line.nutrients).await?;
//!     guard.commit().await
//! }, max_retries).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use sqlx::{Database, Transaction};
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::errors::{AppError, AppResult, ErrorCode};

/// Retry a transaction operation if it fails due to lock contention or timeout
///
/// Backoff doubles from 20 ms per attempt (20, 40, 80, 160 ms, ...). Non-retryable errors
/// (constraint violations, validation failures, missing rows) are returned immediately.
///
/// # Errors
///
/// Returns the last error once `max_retries` attempts have failed, or the first
/// non-retryable error
pub async fn retry_transaction<F, Fut, T>(mut f: F, max_retries: u32) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempts: u32 = 0;
    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempts += 1;
                if !is_retryable(&e) {
                    debug!(
                        attempts = attempts,
                        error = %e,
                        "Transaction failed with non-retryable error"
                    );
                    return Err(e);
                }
                if attempts >= max_retries {
                    error!(
                        attempts = attempts,
                        max_retries = max_retries,
                        error = %e,
                        "Transaction failed after max retries"
                    );
                    return Err(e);
                }

                let backoff_ms = 10_u64 * (1_u64 << attempts.min(16));
                warn!(
                    attempt = attempts,
                    max_retries = max_retries,
                    backoff_ms = backoff_ms,
                    error = %e,
                    "Transaction failed with retryable error, retrying after backoff"
                );
                sleep(Duration::from_millis(backoff_ms)).await;
            }
        }
    }
}

/// Only database-level failures are candidates for retry
fn is_retryable(error: &AppError) -> bool {
    error.code == ErrorCode::DatabaseError && is_retryable_error(&format!("{error:?}"))
}

/// Check if a database error message describes a transient condition
///
/// Lock, busy, and timeout conditions are transient. Constraint violations and
/// connection or permission failures are not.
pub(crate) fn is_retryable_error(error_msg: &str) -> bool {
    let error_lower = error_msg.to_lowercase();

    if error_lower.contains("unique constraint")
        || error_lower.contains("foreign key constraint")
        || error_lower.contains("check constraint")
        || error_lower.contains("not null constraint")
        || error_lower.contains("connection refused")
        || error_lower.contains("permission denied")
    {
        return false;
    }

    error_lower.contains("deadlock")
        || error_lower.contains("locked")
        || error_lower.contains("busy")
        || error_lower.contains("timeout")
        || error_lower.contains("timed out")
        || error_lower.contains("could not serialize")
}

/// RAII guard for database transactions ensuring automatic rollback on drop
///
/// `commit()` consumes the guard. Queries run through [`TransactionGuard::executor`].
pub struct TransactionGuard<'c, DB: Database> {
    transaction: Option<Transaction<'c, DB>>,
    committed: bool,
}

impl<'c, DB: Database> TransactionGuard<'c, DB> {
    /// Create a new transaction guard from an existing `SQLx` transaction
    #[must_use]
    pub fn new(transaction: Transaction<'c, DB>) -> Self {
        Self {
            transaction: Some(transaction),
            committed: false,
        }
    }

    /// Commit the transaction and consume the guard
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the commit fails (including `database is locked`,
    /// which the retry wrapper treats as transient)
    pub async fn commit(mut self) -> AppResult<()> {
        match self.transaction.take() {
            Some(tx) => {
                tx.commit()
                    .await
                    .map_err(|e| AppError::database(format!("Transaction commit failed: {e}")))?;
                self.committed = true;
                debug!("Transaction committed");
                Ok(())
            }
            None => Err(AppError::internal(
                "Transaction already consumed - cannot commit",
            )),
        }
    }

    /// Explicitly rollback the transaction and consume the guard
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the rollback fails
    pub async fn rollback(mut self) -> AppResult<()> {
        match self.transaction.take() {
            Some(tx) => {
                tx.rollback()
                    .await
                    .map_err(|e| AppError::database(format!("Transaction rollback failed: {e}")))?;
                debug!("Transaction rolled back explicitly");
                Ok(())
            }
            None => Err(AppError::internal(
                "Transaction already consumed - cannot rollback",
            )),
        }
    }

    /// Check if the transaction has been committed
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        self.committed
    }

    /// Mutable access to the transaction's connection for executing queries
    ///
    /// # Errors
    ///
    /// Returns `InternalError` if the guard was already committed or rolled back
    pub fn executor(&mut self) -> AppResult<&mut <DB as Database>::Connection> {
        self.transaction.as_deref_mut().ok_or_else(|| {
            AppError::internal("Transaction already consumed - guard used after commit/rollback")
        })
    }
}

impl<DB: Database> Drop for TransactionGuard<'_, DB> {
    fn drop(&mut self) {
        if self.transaction.is_some() && !self.committed {
            debug!("Transaction dropped without commit - rolling back");
        }
    }
}

/// `SQLite` transaction guard
pub type SqliteTransactionGuard<'c> = TransactionGuard<'c, sqlx::Sqlite>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_errors_are_retryable() {
        assert!(is_retryable_error("error returned from database: (code: 5) database is locked"));
        assert!(is_retryable_error("SQLITE_BUSY: database busy"));
        assert!(is_retryable_error("pool timed out while waiting for an open connection"));
    }

    #[test]
    fn test_constraint_errors_are_not_retryable() {
        assert!(!is_retryable_error("FOREIGN KEY constraint failed"));
        assert!(!is_retryable_error("UNIQUE constraint failed: meals.id"));
        assert!(!is_retryable_error("something unexpected"));
    }

    #[test]
    fn test_domain_errors_are_never_retried() {
        let err = AppError::incompatible_unit("slice is locked to scoop");
        assert!(!is_retryable(&err));
        let err = AppError::database("database is locked");
        assert!(is_retryable(&err));
    }
}
