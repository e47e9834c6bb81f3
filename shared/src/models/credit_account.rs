//! Credit Account Model

use serde::{Deserialize, Serialize};

/// Per-(club, user) prepaid balance.
///
/// Created lazily on the first credit-affecting event, never deleted.
/// `current_balance` is mutated exclusively by the transaction recorder and
/// always reconciles to the account's transaction history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct CreditAccount {
    pub id: i64,
    pub club_id: String,
    pub user_id: i64,
    /// Available balance in cents, never negative
    pub current_balance: i64,
    /// Lifetime cents added (net of reversed additions)
    pub total_credits_added: i64,
    /// Lifetime cents used (net of reversed usages)
    pub total_credits_used: i64,
    pub last_activity_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}
