//! JWT authentication for the portal API.
//!
//! Every authenticated request carries a bearer token naming the actor, the
//! club they operate in, and their role. The middleware verifies the token
//! and inserts an [`ActorContext`] request extension; handlers never read
//! ambient identity.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use shared::error::AppError;
use shared::types::{ActorContext, Role};

/// JWT claims for portal actors
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Actor id
    pub sub: String,
    /// Club the token is scoped to
    pub club: String,
    /// Actor role
    pub role: Role,
    /// Expiration (Unix timestamp seconds)
    pub exp: usize,
    /// Issued at (Unix timestamp seconds)
    pub iat: usize,
}

const JWT_EXPIRY_HOURS: i64 = 24;

/// Create a JWT token for an actor
pub fn create_token(
    actor_id: i64,
    club_id: &str,
    role: Role,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now();
    let claims = Claims {
        sub: actor_id.to_string(),
        club: club_id.to_string(),
        role,
        exp: (now + chrono::Duration::hours(JWT_EXPIRY_HOURS)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Middleware that verifies the bearer token and attaches the actor context
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized.into_response())?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::InvalidToken.into_response())?;

    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!("JWT validation failed: {e}");
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::InvalidToken,
        }
        .into_response()
    })?;

    let actor_id: i64 = token_data
        .claims
        .sub
        .parse()
        .map_err(|_| AppError::InvalidToken.into_response())?;

    request.extensions_mut().insert(ActorContext {
        club_id: token_data.claims.club,
        actor_id,
        role: token_data.claims.role,
    });

    Ok(next.run(request).await)
}

/// Guard for operations reserved to club staff
pub fn require_admin(ctx: &ActorContext) -> Result<(), AppError> {
    if ctx.role.is_admin() {
        Ok(())
    } else {
        Err(AppError::forbidden("This operation requires a staff role"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_claims() {
        let token = create_token(42, "club-1", Role::Finance, "test-secret").unwrap();
        let data = jsonwebtoken::decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"test-secret"),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(data.claims.sub, "42");
        assert_eq!(data.claims.club, "club-1");
        assert_eq!(data.claims.role, Role::Finance);
    }

    #[test]
    fn member_is_not_admin() {
        let ctx = ActorContext {
            club_id: "club-1".into(),
            actor_id: 7,
            role: Role::Member,
        };
        assert!(require_admin(&ctx).is_err());
    }
}
