//! Cross-cutting request types
//!
//! `ActorContext` is the explicit caller identity threaded through every
//! operation — club, actor and role travel as parameters, never as ambient
//! request-scoped state.

use serde::{Deserialize, Serialize};

/// Role attached to an authenticated caller.
///
/// `Admin` and `Finance` hold the administrative capability required by
/// mutating credit operations; `Member` may only read their own account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Finance,
    Member,
}

impl Role {
    /// Whether this role carries the administrative/finance capability.
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::Finance)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Finance => "finance",
            Role::Member => "member",
        }
    }
}

/// Authenticated caller identity, extracted from the request token.
#[derive(Debug, Clone)]
pub struct ActorContext {
    /// Owning club (tenant)
    pub club_id: String,
    /// Acting user id
    pub actor_id: i64,
    /// Caller role
    pub role: Role,
}

impl ActorContext {
    /// Whether this caller may read data belonging to `user_id`.
    pub fn can_read_user(&self, user_id: i64) -> bool {
        self.role.is_admin() || self.actor_id == user_id
    }
}

/// Paginated list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}
