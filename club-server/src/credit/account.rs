//! Credit Account Manager
//!
//! Find-or-create for the per-(club, user) account. Exposes no balance
//! mutation: every write to `current_balance` goes through the recorder.

use sqlx::SqliteConnection;

use super::LedgerError;
use crate::db::repository::account;
use shared::models::CreditAccount;

/// Return the existing account or create one with zero balances.
///
/// Runs inside the caller's unit of work; safe under concurrent first-use
/// (unique constraint + insert-or-ignore + refetch).
pub async fn get_or_create(
    conn: &mut SqliteConnection,
    club_id: &str,
    user_id: i64,
) -> Result<CreditAccount, LedgerError> {
    Ok(account::ensure(conn, club_id, user_id).await?)
}
