//! API routes for club-server

pub mod audit;
pub mod credit;
pub mod health;

use axum::routing::{get, post};
use axum::{Router, middleware};
use http::HeaderName;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::auth::auth_middleware;
use crate::state::AppState;

pub type ApiResult<T> = Result<axum::Json<T>, shared::error::AppError>;

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Everything under /api requires a valid bearer token.
    let authed = Router::new()
        .route("/api/credit/resolve", post(credit::resolve_overpayment))
        .route(
            "/api/credit/transactions/{id}/reverse",
            post(credit::reverse_transaction),
        )
        .route("/api/credit/apply", post(credit::apply_credit))
        .route("/api/credit/adjust", post(credit::adjust_balance))
        .route("/api/credit/accounts/{user_id}", get(credit::get_account))
        .route(
            "/api/credit/accounts/{user_id}/transactions",
            get(credit::list_transactions),
        )
        .route("/api/audit", get(audit::audit_log))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let x_request_id = HeaderName::from_static("x-request-id");
    Router::new()
        .route("/health", get(health::health_check))
        .merge(authed)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .with_state(state)
}
