//! Credit Account Repository

use super::{RepoError, RepoResult};
use shared::models::CreditAccount;
use sqlx::{SqliteConnection, SqlitePool};

/// Get or create the account for (club, user).
///
/// `INSERT OR IGNORE` against the UNIQUE(club_id, user_id) constraint, then
/// refetch — safe under concurrent first-use, two racers converge on the
/// same row.
pub async fn ensure(
    conn: &mut SqliteConnection,
    club_id: &str,
    user_id: i64,
) -> RepoResult<CreditAccount> {
    let now = shared::util::now_millis();
    let id = shared::util::snowflake_id();
    sqlx::query(
        "INSERT OR IGNORE INTO credit_account
            (id, club_id, user_id, current_balance, total_credits_added, total_credits_used, created_at, updated_at)
         VALUES (?1, ?2, ?3, 0, 0, 0, ?4, ?4)",
    )
    .bind(id)
    .bind(club_id)
    .bind(user_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    find_by_user_conn(conn, club_id, user_id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to ensure credit account".into()))
}

pub async fn find_by_user(
    pool: &SqlitePool,
    club_id: &str,
    user_id: i64,
) -> RepoResult<Option<CreditAccount>> {
    let row = sqlx::query_as::<_, CreditAccount>(
        "SELECT * FROM credit_account WHERE club_id = ?1 AND user_id = ?2",
    )
    .bind(club_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn find_by_user_conn(
    conn: &mut SqliteConnection,
    club_id: &str,
    user_id: i64,
) -> RepoResult<Option<CreditAccount>> {
    let row = sqlx::query_as::<_, CreditAccount>(
        "SELECT * FROM credit_account WHERE club_id = ?1 AND user_id = ?2",
    )
    .bind(club_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

/// Read an account inside the caller's transaction.
pub async fn find_by_id(
    conn: &mut SqliteConnection,
    id: i64,
) -> RepoResult<Option<CreditAccount>> {
    let row = sqlx::query_as::<_, CreditAccount>("SELECT * FROM credit_account WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row)
}

/// Write the new balance and lifetime totals.
///
/// Only the transaction recorder calls this; every other component goes
/// through it.
pub async fn update_balances(
    conn: &mut SqliteConnection,
    id: i64,
    current_balance: i64,
    total_credits_added: i64,
    total_credits_used: i64,
    now: i64,
) -> RepoResult<()> {
    let rows = sqlx::query(
        "UPDATE credit_account
            SET current_balance = ?1,
                total_credits_added = ?2,
                total_credits_used = ?3,
                last_activity_at = ?4,
                updated_at = ?4
          WHERE id = ?5",
    )
    .bind(current_balance)
    .bind(total_credits_added)
    .bind(total_credits_used)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Credit account {id} not found")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
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

    #[tokio::test]
    async fn ensure_creates_once_and_is_idempotent() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let a = ensure(&mut conn, "club-1", 42).await.unwrap();
        assert_eq!(a.current_balance, 0);
        assert_eq!(a.total_credits_added, 0);

        let b = ensure(&mut conn, "club-1", 42).await.unwrap();
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn accounts_are_scoped_per_club() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let a = ensure(&mut conn, "club-1", 42).await.unwrap();
        let b = ensure(&mut conn, "club-2", 42).await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn update_balances_rejects_missing_account() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let err = update_balances(&mut conn, 999, 100, 100, 0, 1000)
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));
    }
}
