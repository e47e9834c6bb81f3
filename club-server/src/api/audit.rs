//! Audit log endpoint

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::auth::require_admin;
use crate::db::repository::audit_log::{self, AuditEntry};
use crate::state::AppState;
use shared::error::AppError;
use shared::types::{ActorContext, PaginatedResponse};

use super::ApiResult;

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// GET /api/audit
pub async fn audit_log(
    State(state): State<AppState>,
    Extension(ctx): Extension<ActorContext>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<PaginatedResponse<AuditEntry>> {
    require_admin(&ctx)?;

    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * limit;

    // Count first so a row landing between the two queries can only make
    // `items` ahead of `total`, never report entries the page doesn't show.
    let total = audit_log::count(&state.pool, &ctx.club_id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    let items = audit_log::query(&state.pool, &ctx.club_id, limit, offset)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(PaginatedResponse {
        items,
        page,
        limit,
        total,
    }))
}
