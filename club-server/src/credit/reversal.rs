//! Reversal Engine
//!
//! A reversal never edits or deletes the original entry. It appends a
//! compensating `credit_reversed` entry with the opposite balance effect,
//! flips the original's reversal flags exactly once, and cascades onto any
//! invoice the original entry had paid down.

use serde::Serialize;
use sqlx::SqlitePool;

use super::{LedgerError, recorder, with_conflict_retry};
use crate::db::repository::{account, application, invoice, transaction};
use shared::models::{
    CreditAccount, CreditApplication, CreditSource, CreditTransaction, Invoice, TransactionKind,
};
use shared::types::ActorContext;

/// What a successful reversal did.
#[derive(Debug, Serialize)]
pub struct ReversalOutcome {
    /// The original entry with its reversal flags set
    pub original: CreditTransaction,
    /// The compensating entry
    pub reversal: CreditTransaction,
    /// Account summary after the compensation
    pub account: CreditAccount,
    /// The application that was undone, when the original had paid an invoice
    pub application: Option<CreditApplication>,
    /// The invoice reopened by the cascade
    pub restored_invoice: Option<Invoice>,
}

/// Reverse one ledger entry.
pub async fn reverse(
    pool: &SqlitePool,
    ctx: &ActorContext,
    transaction_id: i64,
    reason: String,
) -> Result<ReversalOutcome, LedgerError> {
    if reason.trim().is_empty() {
        return Err(LedgerError::Validation("a reversal reason is required".into()));
    }
    with_conflict_retry(|| reverse_once(pool, ctx, transaction_id, reason.clone())).await
}

async fn reverse_once(
    pool: &SqlitePool,
    ctx: &ActorContext,
    transaction_id: i64,
    reason: String,
) -> Result<ReversalOutcome, LedgerError> {
    let mut tx = pool.begin().await?;

    let original = transaction::find_by_id_conn(&mut *tx, &ctx.club_id, transaction_id)
        .await?
        .ok_or_else(|| {
            LedgerError::NotFound(format!("Transaction {transaction_id} not found"))
        })?;

    if original.is_reversed {
        return Err(LedgerError::AlreadyReversed);
    }
    // A compensating entry is itself final.
    if original.kind == TransactionKind::CreditReversed {
        return Err(LedgerError::NotReversible);
    }

    let magnitude = original.amount.abs();

    // Undoing an addition pulls the balance back down; if the member has
    // already spent that credit, the reversal must not drive it negative.
    if original.kind == TransactionKind::CreditAdded {
        let acct = account::find_by_id(&mut *tx, original.account_id)
            .await?
            .ok_or_else(|| {
                LedgerError::Database(format!("account {} missing", original.account_id))
            })?;
        if acct.current_balance < magnitude {
            return Err(LedgerError::WouldUnderflow {
                available: acct.current_balance,
                required: magnitude,
            });
        }
    }

    let recorded = recorder::record(
        &mut *tx,
        ctx,
        recorder::RecordRequest {
            account_id: original.account_id,
            kind: TransactionKind::CreditReversed,
            amount: magnitude,
            description: format!("Reversal of transaction {}: {}", original.id, reason),
            source: CreditSource::System,
            payment_id: original.payment_id,
            invoice_id: original.invoice_id,
            reverses: Some(&original),
            note: Some(reason.clone()),
        },
    )
    .await?;

    let now = shared::util::now_millis();
    let flipped = transaction::mark_reversed(
        &mut *tx,
        original.id,
        recorded.transaction.id,
        &reason,
        ctx.actor_id,
        now,
    )
    .await?;
    if !flipped {
        // Lost the race; rolling back discards the compensating entry.
        return Err(LedgerError::AlreadyReversed);
    }

    // Cascade: a reversed usage reopens the invoice it had paid down.
    let (application, restored_invoice) = match original.kind {
        TransactionKind::CreditUsed => {
            match application::find_by_transaction(&mut *tx, original.id).await? {
                Some(app) => {
                    let undone =
                        application::mark_reversed(&mut *tx, app.id, &reason, ctx.actor_id, now)
                            .await?;
                    if !undone {
                        return Err(LedgerError::AlreadyReversed);
                    }
                    invoice::restore(&mut *tx, app.invoice_id, app.amount, now).await?;
                    let inv = invoice::find_by_id_conn(&mut *tx, &ctx.club_id, app.invoice_id)
                        .await?
                        .ok_or_else(|| {
                            LedgerError::Database(format!("invoice {} missing", app.invoice_id))
                        })?;
                    (Some(app), Some(inv))
                }
                None => (None, None),
            }
        }
        _ => (None, None),
    };

    let original = transaction::find_by_id_conn(&mut *tx, &ctx.club_id, original.id)
        .await?
        .ok_or_else(|| LedgerError::Database(format!("transaction {} missing", original.id)))?;

    tx.commit().await?;

    Ok(ReversalOutcome {
        original,
        reversal: recorded.transaction,
        account: recorded.account,
        application,
        restored_invoice,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credit::account::get_or_create;
    use crate::credit::recorder::{self, RecordRequest};
    use crate::db::schema;
    use shared::models::InvoiceStatus;
    use shared::types::Role;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        schema::init(&pool).await.unwrap();
        pool
    }

    fn admin() -> ActorContext {
        ActorContext {
            club_id: "club-1".into(),
            actor_id: 1,
            role: Role::Admin,
        }
    }

    async fn seed_addition(pool: &SqlitePool, amount: i64) -> CreditTransaction {
        let mut conn = pool.acquire().await.unwrap();
        let acct = get_or_create(&mut conn, "club-1", 7).await.unwrap();
        let recorded = recorder::record(
            &mut conn,
            &admin(),
            RecordRequest {
                account_id: acct.id,
                kind: TransactionKind::CreditAdded,
                amount,
                description: "manual grant".into(),
                source: CreditSource::Manual,
                payment_id: None,
                invoice_id: None,
                reverses: None,
                note: None,
            },
        )
        .await
        .unwrap();
        recorded.transaction
    }

    #[tokio::test]
    async fn reversal_inverts_the_balance_effect_exactly() {
        let pool = test_pool().await;
        let original = seed_addition(&pool, 10_000).await;

        let out = reverse(&pool, &admin(), original.id, "entry error".into())
            .await
            .unwrap();

        assert_eq!(out.reversal.kind, TransactionKind::CreditReversed);
        assert_eq!(out.reversal.amount, -10_000);
        assert_eq!(out.reversal.balance_before, 10_000);
        assert_eq!(out.reversal.balance_after, 0);
        assert_eq!(out.account.current_balance, 0);
        assert_eq!(out.account.total_credits_added, 0);

        assert!(out.original.is_reversed);
        assert_eq!(out.original.reversed_by_tx, Some(out.reversal.id));
        assert_eq!(out.original.reversal_reason.as_deref(), Some("entry error"));
        assert_eq!(out.original.reversed_by, Some(1));
    }

    #[tokio::test]
    async fn second_reversal_of_the_same_entry_is_rejected() {
        let pool = test_pool().await;
        let original = seed_addition(&pool, 5_000).await;

        reverse(&pool, &admin(), original.id, "entry error".into())
            .await
            .unwrap();
        let err = reverse(&pool, &admin(), original.id, "again".into())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyReversed));

        // The balance was only compensated once.
        let acct = crate::db::repository::account::find_by_user(&pool, "club-1", 7)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(acct.current_balance, 0);
    }

    #[tokio::test]
    async fn reversal_entries_are_final() {
        let pool = test_pool().await;
        let original = seed_addition(&pool, 5_000).await;
        let out = reverse(&pool, &admin(), original.id, "entry error".into())
            .await
            .unwrap();

        let err = reverse(&pool, &admin(), out.reversal.id, "undo the undo".into())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotReversible));
    }

    #[tokio::test]
    async fn reversing_spent_credit_is_rejected() {
        let pool = test_pool().await;
        let original = seed_addition(&pool, 10_000).await;

        // Spend most of it, then try to take the addition back.
        {
            let mut conn = pool.acquire().await.unwrap();
            recorder::record(
                &mut conn,
                &admin(),
                RecordRequest {
                    account_id: original.account_id,
                    kind: TransactionKind::CreditUsed,
                    amount: 8_000,
                    description: "applied to invoice".into(),
                    source: CreditSource::System,
                    payment_id: None,
                    invoice_id: None,
                    reverses: None,
                    note: None,
                },
            )
            .await
            .unwrap();
        }

        let err = reverse(&pool, &admin(), original.id, "entry error".into())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::WouldUnderflow {
                available: 2_000,
                required: 10_000
            }
        ));
    }

    #[tokio::test]
    async fn reversing_a_usage_reopens_the_invoice() {
        let pool = test_pool().await;
        seed_addition(&pool, 10_000).await;

        {
            let mut conn = pool.acquire().await.unwrap();
            invoice::insert_raw(
                &mut conn,
                &Invoice {
                    id: 11,
                    club_id: "club-1".into(),
                    user_id: 7,
                    total: 6_000,
                    status: InvoiceStatus::Pending,
                    paid_at: None,
                    created_at: 1_000,
                    updated_at: 1_000,
                },
            )
            .await
            .unwrap();
        }

        let applied = crate::credit::apply::apply_credit(&pool, &admin(), 7, 11, None, None)
            .await
            .unwrap();
        assert_eq!(applied.invoice.status, InvoiceStatus::Paid);

        let out = reverse(&pool, &admin(), applied.transaction.id, "wrong invoice".into())
            .await
            .unwrap();

        assert_eq!(out.account.current_balance, 10_000);
        let app = out.application.unwrap();
        assert_eq!(app.amount, 6_000);
        let inv = out.restored_invoice.unwrap();
        assert_eq!(inv.total, 6_000);
        assert_eq!(inv.status, InvoiceStatus::Pending);
        assert!(inv.paid_at.is_none());
    }

    #[tokio::test]
    async fn history_reconciles_after_reversals() {
        let pool = test_pool().await;
        let first = seed_addition(&pool, 10_000).await;
        seed_addition(&pool, 3_000).await;
        reverse(&pool, &admin(), first.id, "entry error".into())
            .await
            .unwrap();

        let acct = crate::db::repository::account::find_by_user(&pool, "club-1", 7)
            .await
            .unwrap()
            .unwrap();
        let entries = crate::db::repository::transaction::list_by_account(&pool, acct.id)
            .await
            .unwrap();
        assert_eq!(entries.len(), 3);

        // Summing every signed delta reproduces the balance.
        let full_sum: i64 = entries.iter().map(|t| t.amount).sum();
        assert_eq!(full_sum, acct.current_balance);

        // So does replaying only live entries: a reversed original and its
        // compensating entry annihilate as a pair.
        let live_sum: i64 = entries
            .iter()
            .filter(|t| !t.is_reversed && t.kind != TransactionKind::CreditReversed)
            .map(|t| t.amount)
            .sum();
        assert_eq!(live_sum, acct.current_balance);
    }

    #[tokio::test]
    async fn blank_reason_is_rejected() {
        let pool = test_pool().await;
        let original = seed_addition(&pool, 1_000).await;
        let err = reverse(&pool, &admin(), original.id, "  ".into())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }
}
