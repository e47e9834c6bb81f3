//! Credit ledger endpoints

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use validator::Validate;

use crate::audit::{AuditAction, AuditLogRequest};
use crate::auth::require_admin;
use crate::credit::apply::{self, AdjustDirection, AdjustOutcome, ApplyOutcome};
use crate::credit::resolver::{self, ResolutionOutcome, ResolutionStrategy};
use crate::credit::reversal::{self, ReversalOutcome};
use crate::db::repository::{account, transaction};
use crate::state::AppState;
use shared::error::AppError;
use shared::models::{CreditAccount, CreditTransaction};
use shared::types::{ActorContext, PaginatedResponse};

use super::ApiResult;

const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize, Validate)]
pub struct ResolveRequest {
    pub payment_id: i64,
    pub strategy: ResolutionStrategy,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

/// POST /api/credit/resolve
pub async fn resolve_overpayment(
    State(state): State<AppState>,
    Extension(ctx): Extension<ActorContext>,
    Json(req): Json<ResolveRequest>,
) -> ApiResult<ResolutionOutcome> {
    require_admin(&ctx)?;
    req.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let outcome =
        resolver::resolve(&state.pool, &ctx, req.payment_id, req.strategy, req.note).await?;

    let action = match outcome.strategy {
        ResolutionStrategy::ConvertToCredit => AuditAction::OverpaymentConverted,
        ResolutionStrategy::Refund => AuditAction::OverpaymentRefunded,
        ResolutionStrategy::ApplyToNextInvoice => AuditAction::OverpaymentApplied,
    };
    state.audit.log(AuditLogRequest {
        club_id: ctx.club_id.clone(),
        actor_id: ctx.actor_id,
        action,
        resource_type: "payment",
        resource_id: outcome.payment.id,
        detail: Some(serde_json::json!({
            "strategy": outcome.strategy.as_str(),
            "overpayment": outcome.overpayment,
            "transaction_id": outcome.transaction.as_ref().map(|t| t.id),
            "applied_invoice_id": outcome.applied_invoice.as_ref().map(|i| i.id),
            "leftover_credited": outcome.leftover_credited,
        })),
    });

    Ok(Json(outcome))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReverseRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

/// POST /api/credit/transactions/{id}/reverse
pub async fn reverse_transaction(
    State(state): State<AppState>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<i64>,
    Json(req): Json<ReverseRequest>,
) -> ApiResult<ReversalOutcome> {
    require_admin(&ctx)?;
    req.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let outcome = reversal::reverse(&state.pool, &ctx, id, req.reason).await?;

    state.audit.log(AuditLogRequest {
        club_id: ctx.club_id.clone(),
        actor_id: ctx.actor_id,
        action: AuditAction::TransactionReversed,
        resource_type: "credit_transaction",
        resource_id: outcome.original.id,
        detail: Some(serde_json::json!({
            "reversal_id": outcome.reversal.id,
            "amount": outcome.reversal.amount,
            "reason": outcome.original.reversal_reason,
            "restored_invoice_id": outcome.restored_invoice.as_ref().map(|i| i.id),
        })),
    });

    Ok(Json(outcome))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ApplyRequest {
    pub user_id: i64,
    pub invoice_id: i64,
    #[validate(range(min = 1))]
    pub amount: Option<i64>,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

/// POST /api/credit/apply
pub async fn apply_credit(
    State(state): State<AppState>,
    Extension(ctx): Extension<ActorContext>,
    Json(req): Json<ApplyRequest>,
) -> ApiResult<ApplyOutcome> {
    require_admin(&ctx)?;
    req.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let outcome = apply::apply_credit(
        &state.pool,
        &ctx,
        req.user_id,
        req.invoice_id,
        req.amount,
        req.note,
    )
    .await?;

    state.audit.log(AuditLogRequest {
        club_id: ctx.club_id.clone(),
        actor_id: ctx.actor_id,
        action: AuditAction::CreditApplied,
        resource_type: "invoice",
        resource_id: outcome.invoice.id,
        detail: Some(serde_json::json!({
            "user_id": req.user_id,
            "applied": outcome.applied,
            "transaction_id": outcome.transaction.id,
            "invoice_status": outcome.invoice.status,
        })),
    });

    Ok(Json(outcome))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustRequest {
    pub user_id: i64,
    pub direction: AdjustDirection,
    #[validate(range(min = 1))]
    pub amount: i64,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

/// POST /api/credit/adjust
pub async fn adjust_balance(
    State(state): State<AppState>,
    Extension(ctx): Extension<ActorContext>,
    Json(req): Json<AdjustRequest>,
) -> ApiResult<AdjustOutcome> {
    require_admin(&ctx)?;
    req.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let outcome = apply::adjust(
        &state.pool,
        &ctx,
        req.user_id,
        req.direction,
        req.amount,
        req.description,
        req.note,
    )
    .await?;

    state.audit.log(AuditLogRequest {
        club_id: ctx.club_id.clone(),
        actor_id: ctx.actor_id,
        action: AuditAction::CreditAdjusted,
        resource_type: "credit_transaction",
        resource_id: outcome.transaction.id,
        detail: Some(serde_json::json!({
            "user_id": req.user_id,
            "amount": outcome.transaction.amount,
            "balance_after": outcome.transaction.balance_after,
        })),
    });

    Ok(Json(outcome))
}

/// GET /api/credit/accounts/{user_id}
pub async fn get_account(
    State(state): State<AppState>,
    Extension(ctx): Extension<ActorContext>,
    Path(user_id): Path<i64>,
) -> ApiResult<CreditAccount> {
    if !ctx.can_read_user(user_id) {
        return Err(AppError::forbidden("Members may only read their own account"));
    }

    let acct = account::find_by_user(&state.pool, &ctx.club_id, user_id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::not_found(format!("Credit account for user {user_id}")))?;

    Ok(Json(acct))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub kind: Option<String>,
    pub from: Option<i64>,
    pub to: Option<i64>,
}

/// GET /api/credit/accounts/{user_id}/transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(ctx): Extension<ActorContext>,
    Path(user_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<PaginatedResponse<CreditTransaction>> {
    if !ctx.can_read_user(user_id) {
        return Err(AppError::forbidden("Members may only read their own history"));
    }

    let kind = match query.kind.as_deref() {
        Some(s) => Some(s.parse().map_err(AppError::Validation)?),
        None => None,
    };
    let filter = transaction::HistoryFilter {
        kind,
        from: query.from,
        to: query.to,
    };
    let limit = query.limit.unwrap_or(20).clamp(1, MAX_PAGE_SIZE);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * limit;

    let items = transaction::list(&state.pool, &ctx.club_id, user_id, &filter, limit, offset)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    let total = transaction::count(&state.pool, &ctx.club_id, user_id, &filter)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(PaginatedResponse {
        items,
        page,
        limit,
        total,
    }))
}
