//! Credit Ledger & Overpayment Resolution Engine
//!
//! The one part of the portal with real invariants: an account's balance
//! must always reconcile to its transaction history, every mutation is one
//! atomic unit of work, and reversals refuse to corrupt history.
//!
//! - [`account`] — find-or-create the per-(club, user) account
//! - [`recorder`] — the only writer of balances; appends ledger entries
//! - [`resolver`] — the three overpayment resolution strategies
//! - [`reversal`] — compensating transactions with invoice cascade
//! - [`apply`] — spend balance against an invoice, manual adjustments

pub mod account;
pub mod apply;
pub mod recorder;
pub mod resolver;
pub mod reversal;

use std::future::Future;

use crate::db::{RepoError, is_write_conflict};
use shared::AppError;
use thiserror::Error;

/// Engine error taxonomy. Business-rule failures are routine operational
/// conditions and carry the specific reason the administrative UI surfaces.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0}")]
    NotFound(String),

    #[error("No overpayment found for this payment")]
    NoOverpayment,

    #[error("No pending invoice available to apply the overpayment to")]
    NoTargetInvoice,

    #[error("Insufficient credit balance: have {available}, need {required}")]
    InsufficientBalance { available: i64, required: i64 },

    #[error("Reversal would drive the balance negative: have {available}, need {required}")]
    WouldUnderflow { available: i64, required: i64 },

    #[error("Transaction is already reversed")]
    AlreadyReversed,

    #[error("Only credit additions and usages can be reversed")]
    NotReversible,

    #[error("Concurrent write conflict")]
    Conflict,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<RepoError> for LedgerError {
    fn from(err: RepoError) -> Self {
        if is_write_conflict(&err) {
            return LedgerError::Conflict;
        }
        match err {
            RepoError::NotFound(msg) => LedgerError::NotFound(msg),
            RepoError::Duplicate(_) => LedgerError::Conflict,
            RepoError::Validation(msg) => LedgerError::Validation(msg),
            RepoError::Database(msg) => LedgerError::Database(msg),
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::from(RepoError::from(err))
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(msg) => AppError::NotFound(msg),
            LedgerError::Conflict => {
                AppError::Conflict("Concurrent write conflict, please retry".into())
            }
            LedgerError::Validation(msg) => AppError::Validation(msg),
            LedgerError::Database(msg) => AppError::Database(msg),
            other => AppError::BusinessRule(other.to_string()),
        }
    }
}

/// Bounded retries for conflicting units of work before surfacing
/// [`LedgerError::Conflict`] to the caller.
pub(crate) const MAX_CONFLICT_RETRIES: u32 = 3;

/// Backoff between conflict retries.
pub(crate) const CONFLICT_BACKOFF_MS: u64 = 20;

/// Run `op` up to `1 + MAX_CONFLICT_RETRIES` times, retrying only on
/// [`LedgerError::Conflict`]. Each attempt is a whole unit of work; a stale
/// read is never continued.
pub(crate) async fn with_conflict_retry<T, F, Fut>(mut op: F) -> Result<T, LedgerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LedgerError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(LedgerError::Conflict) if attempt < MAX_CONFLICT_RETRIES => {
                attempt += 1;
                tracing::debug!(attempt, "Write conflict, retrying unit of work");
                tokio::time::sleep(std::time::Duration::from_millis(
                    CONFLICT_BACKOFF_MS * u64::from(attempt),
                ))
                .await;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_conflicts_until_the_work_lands() {
        let attempts = AtomicU32::new(0);
        let out = with_conflict_retry(|| {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(LedgerError::Conflict)
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(out, 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_bounded_retries() {
        let attempts = AtomicU32::new(0);
        let err = with_conflict_retry::<(), _, _>(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(LedgerError::Conflict) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict));
        assert_eq!(attempts.load(Ordering::SeqCst), 1 + MAX_CONFLICT_RETRIES);
    }

    #[tokio::test]
    async fn non_conflict_errors_surface_immediately() {
        let attempts = AtomicU32::new(0);
        let err = with_conflict_retry::<(), _, _>(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(LedgerError::NotReversible) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, LedgerError::NotReversible));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn locked_and_busy_map_to_conflict() {
        for msg in ["database is locked", "database is busy"] {
            let err = LedgerError::from(RepoError::Database(msg.into()));
            assert!(matches!(err, LedgerError::Conflict));
        }
    }
}
