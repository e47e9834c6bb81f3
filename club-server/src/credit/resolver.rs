//! Overpayment Resolver
//!
//! A payment overpays when it is completed and its amount strictly exceeds
//! its linked invoice's total. Three resolution strategies, each one atomic
//! unit of work: convert the excess to credit, refund it via a compensating
//! payment record, or move it onto the member's oldest other pending
//! invoice. Whatever the strategy, the original payment is corrected in
//! place to the invoice total and never deleted.

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use super::{LedgerError, account, recorder, with_conflict_retry};
use crate::db::repository::{invoice, payment};
use shared::models::{
    CreditAccount, CreditSource, CreditTransaction, Invoice, InvoiceStatus, Payment,
    PaymentStatus, TransactionKind,
};
use shared::types::ActorContext;

/// The three resolution strategies, dispatched as a tagged variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    ConvertToCredit,
    Refund,
    ApplyToNextInvoice,
}

impl ResolutionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStrategy::ConvertToCredit => "convert_to_credit",
            ResolutionStrategy::Refund => "refund",
            ResolutionStrategy::ApplyToNextInvoice => "apply_to_next_invoice",
        }
    }
}

/// What a successful resolution did. Fields are populated per strategy.
#[derive(Debug, Serialize)]
pub struct ResolutionOutcome {
    pub strategy: ResolutionStrategy,
    /// Excess amount that was resolved, in cents
    pub overpayment: i64,
    /// The original payment after correction
    pub payment: Payment,
    /// Ledger entry, when the strategy credited the account
    pub transaction: Option<CreditTransaction>,
    /// Account summary after the resolution, when the ledger was touched
    pub account: Option<CreditAccount>,
    /// Compensating negative payment (refund strategy)
    pub refund_payment: Option<Payment>,
    /// Target invoice after application (apply_to_next_invoice strategy)
    pub applied_invoice: Option<Invoice>,
    /// Payment record created for the applied amount
    pub applied_payment: Option<Payment>,
    /// Excess beyond the target invoice that was converted to credit
    pub leftover_credited: i64,
}

/// Resolve one overpaid payment with the chosen strategy.
///
/// Conflicting units of work are retried a bounded number of times; business
/// rejections (`NoOverpayment`, `NoTargetInvoice`, ...) are returned as-is.
pub async fn resolve(
    pool: &SqlitePool,
    ctx: &ActorContext,
    payment_id: i64,
    strategy: ResolutionStrategy,
    note: Option<String>,
) -> Result<ResolutionOutcome, LedgerError> {
    with_conflict_retry(|| resolve_once(pool, ctx, payment_id, strategy, note.clone())).await
}

async fn resolve_once(
    pool: &SqlitePool,
    ctx: &ActorContext,
    payment_id: i64,
    strategy: ResolutionStrategy,
    note: Option<String>,
) -> Result<ResolutionOutcome, LedgerError> {
    let mut tx = pool.begin().await?;

    let pay = payment::find_by_id_conn(&mut *tx, &ctx.club_id, payment_id)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("Payment {payment_id} not found")))?;

    // Only a completed payment with a linked invoice can overpay.
    if pay.status != PaymentStatus::Completed {
        return Err(LedgerError::NoOverpayment);
    }
    let invoice_id = pay.invoice_id.ok_or(LedgerError::NoOverpayment)?;
    let inv = invoice::find_by_id_conn(&mut *tx, &ctx.club_id, invoice_id)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("Invoice {invoice_id} not found")))?;

    let overpayment = pay.amount - inv.total;
    if overpayment <= 0 {
        return Err(LedgerError::NoOverpayment);
    }

    let outcome = match strategy {
        ResolutionStrategy::ConvertToCredit => {
            convert_to_credit(&mut *tx, ctx, &pay, &inv, overpayment, note).await?
        }
        ResolutionStrategy::Refund => refund(&mut *tx, ctx, &pay, &inv, overpayment, note).await?,
        ResolutionStrategy::ApplyToNextInvoice => {
            apply_to_next_invoice(&mut *tx, ctx, &pay, &inv, overpayment, note).await?
        }
    };

    tx.commit().await?;
    Ok(outcome)
}

/// Strategy 1: the excess becomes account credit.
async fn convert_to_credit(
    conn: &mut SqliteConnection,
    ctx: &ActorContext,
    pay: &Payment,
    inv: &Invoice,
    overpayment: i64,
    note: Option<String>,
) -> Result<ResolutionOutcome, LedgerError> {
    let acct = account::get_or_create(&mut *conn, &ctx.club_id, pay.user_id).await?;

    let recorded = recorder::record(
        &mut *conn,
        ctx,
        recorder::RecordRequest {
            account_id: acct.id,
            kind: TransactionKind::CreditAdded,
            amount: overpayment,
            description: format!("Overpayment on payment {} converted to credit", pay.id),
            source: CreditSource::Overpayment,
            payment_id: Some(pay.id),
            invoice_id: None,
            reverses: None,
            note: note.clone(),
        },
    )
    .await?;

    let corrected = correct_original(&mut *conn, pay, inv, "converted to credit", note).await?;

    Ok(ResolutionOutcome {
        strategy: ResolutionStrategy::ConvertToCredit,
        overpayment,
        payment: corrected,
        transaction: Some(recorded.transaction),
        account: Some(recorded.account),
        refund_payment: None,
        applied_invoice: None,
        applied_payment: None,
        leftover_credited: 0,
    })
}

/// Strategy 2: the excess leaves via cash. A negative-amount compensating
/// payment is created; the ledger is never touched.
async fn refund(
    conn: &mut SqliteConnection,
    ctx: &ActorContext,
    pay: &Payment,
    inv: &Invoice,
    overpayment: i64,
    note: Option<String>,
) -> Result<ResolutionOutcome, LedgerError> {
    let reference = match &pay.reference {
        Some(r) => format!("refund-{r}"),
        None => format!("refund-{}", pay.id),
    };
    let refund_payment = payment::insert(
        &mut *conn,
        &payment::NewPayment {
            club_id: ctx.club_id.clone(),
            user_id: pay.user_id,
            invoice_id: None,
            amount: -overpayment,
            method: pay.method.clone(),
            reference: Some(reference),
            status: PaymentStatus::Refund,
            note: note.clone(),
        },
    )
    .await?;

    let corrected = correct_original(&mut *conn, pay, inv, "overpayment refunded", note).await?;

    Ok(ResolutionOutcome {
        strategy: ResolutionStrategy::Refund,
        overpayment,
        payment: corrected,
        transaction: None,
        account: None,
        refund_payment: Some(refund_payment),
        applied_invoice: None,
        applied_payment: None,
        leftover_credited: 0,
    })
}

/// Strategy 3: the excess pays down the member's oldest other pending
/// invoice. Anything beyond that invoice's total is converted to credit in
/// the same unit of work, so no money is silently dropped.
async fn apply_to_next_invoice(
    conn: &mut SqliteConnection,
    ctx: &ActorContext,
    pay: &Payment,
    inv: &Invoice,
    overpayment: i64,
    note: Option<String>,
) -> Result<ResolutionOutcome, LedgerError> {
    let target = invoice::oldest_other_pending(&mut *conn, &ctx.club_id, pay.user_id, pay.invoice_id)
        .await?
        .ok_or(LedgerError::NoTargetInvoice)?;

    let applied = overpayment.min(target.total);
    let new_total = target.total - applied;
    let now = shared::util::now_millis();
    let (status, paid_at) = if new_total <= 0 {
        (InvoiceStatus::Paid, Some(now))
    } else {
        (InvoiceStatus::Pending, None)
    };
    invoice::apply_amount(&mut *conn, target.id, new_total, status, paid_at, now).await?;

    let applied_payment = payment::insert(
        &mut *conn,
        &payment::NewPayment {
            club_id: ctx.club_id.clone(),
            user_id: pay.user_id,
            invoice_id: Some(target.id),
            amount: applied,
            method: pay.method.clone(),
            reference: Some(format!("overpayment-{}", pay.id)),
            status: PaymentStatus::Completed,
            note: note.clone(),
        },
    )
    .await?;

    // Leftover beyond the target invoice lands on the ledger.
    let leftover = overpayment - applied;
    let (transaction, account) = if leftover > 0 {
        let acct = account::get_or_create(&mut *conn, &ctx.club_id, pay.user_id).await?;
        let recorded = recorder::record(
            &mut *conn,
            ctx,
            recorder::RecordRequest {
                account_id: acct.id,
                kind: TransactionKind::CreditAdded,
                amount: leftover,
                description: format!(
                    "Overpayment on payment {} remaining after applying to invoice {}",
                    pay.id, target.id
                ),
                source: CreditSource::Overpayment,
                payment_id: Some(pay.id),
                invoice_id: None,
                reverses: None,
                note: note.clone(),
            },
        )
        .await?;
        (Some(recorded.transaction), Some(recorded.account))
    } else {
        (None, None)
    };

    let corrected = correct_original(&mut *conn, pay, inv, "applied to next invoice", note).await?;

    let applied_invoice = invoice::find_by_id_conn(&mut *conn, &ctx.club_id, target.id)
        .await?
        .ok_or_else(|| LedgerError::Database(format!("invoice {} missing", target.id)))?;

    Ok(ResolutionOutcome {
        strategy: ResolutionStrategy::ApplyToNextInvoice,
        overpayment,
        payment: corrected,
        transaction,
        account,
        refund_payment: None,
        applied_invoice: Some(applied_invoice),
        applied_payment: Some(applied_payment),
        leftover_credited: leftover,
    })
}

/// Correct the original payment down to its invoice total and append the
/// resolution note, preserving any existing note text.
async fn correct_original(
    conn: &mut SqliteConnection,
    pay: &Payment,
    inv: &Invoice,
    action: &str,
    note: Option<String>,
) -> Result<Payment, LedgerError> {
    let suffix = match note {
        Some(n) => format!("Overpayment {action}: {n}"),
        None => format!("Overpayment {action}"),
    };
    let merged = match &pay.note {
        Some(existing) => format!("{existing} | {suffix}"),
        None => suffix,
    };
    let now = shared::util::now_millis();
    Ok(payment::correct_amount(&mut *conn, pay.id, inv.total, Some(&merged), now).await?)
}
