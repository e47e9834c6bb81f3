//! Credit application and manual adjustments.
//!
//! Applying credit spends balance against one pending invoice, recording a
//! `credit_used` entry plus a `credit_application` link so a later reversal
//! can reopen that exact invoice. Manual adjustments are plain ledger
//! entries with a `manual` source.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::{LedgerError, account, recorder, with_conflict_retry};
use crate::db::repository::{account as account_repo, application, invoice};
use shared::models::{
    ApplicationStatus, CreditAccount, CreditApplication, CreditSource, CreditTransaction,
    Invoice, InvoiceStatus, TransactionKind,
};
use shared::types::ActorContext;

/// Result of applying credit to an invoice.
#[derive(Debug, Serialize)]
pub struct ApplyOutcome {
    /// Amount actually spent, capped by balance and by the invoice total
    pub applied: i64,
    pub transaction: CreditTransaction,
    pub application: CreditApplication,
    pub invoice: Invoice,
    pub account: CreditAccount,
}

/// Spend a member's credit against one pending invoice.
///
/// `amount` caps the spend; when omitted, as much as possible is applied.
/// The actual amount is `min(requested, balance, invoice total)`.
pub async fn apply_credit(
    pool: &SqlitePool,
    ctx: &ActorContext,
    user_id: i64,
    invoice_id: i64,
    amount: Option<i64>,
    note: Option<String>,
) -> Result<ApplyOutcome, LedgerError> {
    if let Some(requested) = amount {
        if requested <= 0 {
            return Err(LedgerError::Validation(
                "amount must be a positive number of cents".into(),
            ));
        }
    }
    with_conflict_retry(|| apply_once(pool, ctx, user_id, invoice_id, amount, note.clone())).await
}

async fn apply_once(
    pool: &SqlitePool,
    ctx: &ActorContext,
    user_id: i64,
    invoice_id: i64,
    amount: Option<i64>,
    note: Option<String>,
) -> Result<ApplyOutcome, LedgerError> {
    let mut tx = pool.begin().await?;

    let acct = account_repo::find_by_user_conn(&mut *tx, &ctx.club_id, user_id)
        .await?
        .ok_or_else(|| {
            LedgerError::NotFound(format!("Credit account for user {user_id} not found"))
        })?;

    let inv = invoice::find_by_id_conn(&mut *tx, &ctx.club_id, invoice_id)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("Invoice {invoice_id} not found")))?;
    if inv.status != InvoiceStatus::Pending {
        return Err(LedgerError::Validation(format!(
            "Invoice {invoice_id} is not pending"
        )));
    }

    let applied = amount
        .unwrap_or(acct.current_balance)
        .min(acct.current_balance)
        .min(inv.total);
    if applied <= 0 {
        return Err(LedgerError::InsufficientBalance {
            available: acct.current_balance,
            required: amount.unwrap_or(inv.total),
        });
    }

    let recorded = recorder::record(
        &mut *tx,
        ctx,
        recorder::RecordRequest {
            account_id: acct.id,
            kind: TransactionKind::CreditUsed,
            amount: applied,
            description: format!("Credit applied to invoice {invoice_id}"),
            source: CreditSource::System,
            payment_id: None,
            invoice_id: Some(invoice_id),
            reverses: None,
            note: note.clone(),
        },
    )
    .await?;

    let now = shared::util::now_millis();
    let app = CreditApplication {
        id: shared::util::snowflake_id(),
        account_id: acct.id,
        invoice_id,
        transaction_id: recorded.transaction.id,
        amount: applied,
        status: ApplicationStatus::Applied,
        reversal_reason: None,
        reversed_by: None,
        reversed_at: None,
        created_at: now,
    };
    application::insert(&mut *tx, &app).await?;

    let new_total = inv.total - applied;
    let (status, paid_at) = if new_total <= 0 {
        (InvoiceStatus::Paid, Some(now))
    } else {
        (InvoiceStatus::Pending, None)
    };
    invoice::apply_amount(&mut *tx, invoice_id, new_total, status, paid_at, now).await?;

    let inv = invoice::find_by_id_conn(&mut *tx, &ctx.club_id, invoice_id)
        .await?
        .ok_or_else(|| LedgerError::Database(format!("invoice {invoice_id} missing")))?;

    tx.commit().await?;

    Ok(ApplyOutcome {
        applied,
        transaction: recorded.transaction,
        application: app,
        invoice: inv,
        account: recorded.account,
    })
}

/// Direction of a manual balance adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustDirection {
    Add,
    Deduct,
}

/// Result of a manual adjustment.
#[derive(Debug, Serialize)]
pub struct AdjustOutcome {
    pub transaction: CreditTransaction,
    pub account: CreditAccount,
}

/// Manually grant or deduct credit, with an operator-supplied description.
pub async fn adjust(
    pool: &SqlitePool,
    ctx: &ActorContext,
    user_id: i64,
    direction: AdjustDirection,
    amount: i64,
    description: String,
    note: Option<String>,
) -> Result<AdjustOutcome, LedgerError> {
    if description.trim().is_empty() {
        return Err(LedgerError::Validation(
            "a description is required for manual adjustments".into(),
        ));
    }
    with_conflict_retry(|| {
        adjust_once(
            pool,
            ctx,
            user_id,
            direction,
            amount,
            description.clone(),
            note.clone(),
        )
    })
    .await
}

async fn adjust_once(
    pool: &SqlitePool,
    ctx: &ActorContext,
    user_id: i64,
    direction: AdjustDirection,
    amount: i64,
    description: String,
    note: Option<String>,
) -> Result<AdjustOutcome, LedgerError> {
    let mut tx = pool.begin().await?;

    let acct = account::get_or_create(&mut *tx, &ctx.club_id, user_id).await?;
    let kind = match direction {
        AdjustDirection::Add => TransactionKind::CreditAdded,
        AdjustDirection::Deduct => TransactionKind::CreditUsed,
    };
    let recorded = recorder::record(
        &mut *tx,
        ctx,
        recorder::RecordRequest {
            account_id: acct.id,
            kind,
            amount,
            description,
            source: CreditSource::Manual,
            payment_id: None,
            invoice_id: None,
            reverses: None,
            note,
        },
    )
    .await?;

    tx.commit().await?;

    Ok(AdjustOutcome {
        transaction: recorded.transaction,
        account: recorded.account,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
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

    async fn seed_invoice(pool: &SqlitePool, id: i64, total: i64) {
        let mut conn = pool.acquire().await.unwrap();
        invoice::insert_raw(
            &mut conn,
            &Invoice {
                id,
                club_id: "club-1".into(),
                user_id: 7,
                total,
                status: InvoiceStatus::Pending,
                paid_at: None,
                created_at: 1_000,
                updated_at: 1_000,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn adjust_add_creates_the_account_and_credits_it() {
        let pool = test_pool().await;
        let out = adjust(
            &pool,
            &admin(),
            7,
            AdjustDirection::Add,
            2_500,
            "goodwill credit".into(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(out.account.current_balance, 2_500);
        assert_eq!(out.transaction.kind, TransactionKind::CreditAdded);
        assert_eq!(out.transaction.source, CreditSource::Manual);
    }

    #[tokio::test]
    async fn adjust_deduct_cannot_go_negative() {
        let pool = test_pool().await;
        adjust(
            &pool,
            &admin(),
            7,
            AdjustDirection::Add,
            1_000,
            "grant".into(),
            None,
        )
        .await
        .unwrap();

        let err = adjust(
            &pool,
            &admin(),
            7,
            AdjustDirection::Deduct,
            1_500,
            "claw back".into(),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
    }

    #[tokio::test]
    async fn apply_spends_up_to_the_invoice_total() {
        let pool = test_pool().await;
        adjust(&pool, &admin(), 7, AdjustDirection::Add, 10_000, "grant".into(), None)
            .await
            .unwrap();
        seed_invoice(&pool, 11, 6_000).await;

        let out = apply_credit(&pool, &admin(), 7, 11, None, None).await.unwrap();
        assert_eq!(out.applied, 6_000);
        assert_eq!(out.invoice.total, 0);
        assert_eq!(out.invoice.status, InvoiceStatus::Paid);
        assert!(out.invoice.paid_at.is_some());
        assert_eq!(out.account.current_balance, 4_000);
        assert_eq!(out.application.status, ApplicationStatus::Applied);
        assert_eq!(out.application.transaction_id, out.transaction.id);
    }

    #[tokio::test]
    async fn apply_is_capped_by_the_balance() {
        let pool = test_pool().await;
        adjust(&pool, &admin(), 7, AdjustDirection::Add, 2_000, "grant".into(), None)
            .await
            .unwrap();
        seed_invoice(&pool, 11, 6_000).await;

        let out = apply_credit(&pool, &admin(), 7, 11, None, None).await.unwrap();
        assert_eq!(out.applied, 2_000);
        assert_eq!(out.invoice.total, 4_000);
        assert_eq!(out.invoice.status, InvoiceStatus::Pending);
        assert_eq!(out.account.current_balance, 0);
    }

    #[tokio::test]
    async fn explicit_amount_caps_the_spend() {
        let pool = test_pool().await;
        adjust(&pool, &admin(), 7, AdjustDirection::Add, 10_000, "grant".into(), None)
            .await
            .unwrap();
        seed_invoice(&pool, 11, 6_000).await;

        let out = apply_credit(&pool, &admin(), 7, 11, Some(1_500), None)
            .await
            .unwrap();
        assert_eq!(out.applied, 1_500);
        assert_eq!(out.invoice.total, 4_500);
        assert_eq!(out.account.current_balance, 8_500);
    }

    #[tokio::test]
    async fn apply_rejects_non_pending_invoices() {
        let pool = test_pool().await;
        adjust(&pool, &admin(), 7, AdjustDirection::Add, 10_000, "grant".into(), None)
            .await
            .unwrap();
        seed_invoice(&pool, 11, 6_000).await;
        apply_credit(&pool, &admin(), 7, 11, None, None).await.unwrap();

        // Now paid.
        let err = apply_credit(&pool, &admin(), 7, 11, None, None).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn apply_with_zero_balance_is_rejected() {
        let pool = test_pool().await;
        adjust(&pool, &admin(), 7, AdjustDirection::Add, 1_000, "grant".into(), None)
            .await
            .unwrap();
        adjust(&pool, &admin(), 7, AdjustDirection::Deduct, 1_000, "spent".into(), None)
            .await
            .unwrap();
        seed_invoice(&pool, 11, 6_000).await;

        let err = apply_credit(&pool, &admin(), 7, 11, None, None).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
    }

    #[tokio::test]
    async fn apply_without_an_account_is_not_found() {
        let pool = test_pool().await;
        seed_invoice(&pool, 11, 6_000).await;
        let err = apply_credit(&pool, &admin(), 7, 11, None, None).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }
}
