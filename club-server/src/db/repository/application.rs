//! Credit Application Repository

use super::RepoResult;
use shared::models::CreditApplication;
use sqlx::SqliteConnection;

pub async fn insert(conn: &mut SqliteConnection, app: &CreditApplication) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO credit_application
            (id, account_id, invoice_id, transaction_id, amount, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(app.id)
    .bind(app.account_id)
    .bind(app.invoice_id)
    .bind(app.transaction_id)
    .bind(app.amount)
    .bind(app.status.as_str())
    .bind(app.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// The application row created alongside a credit-used transaction, if any.
pub async fn find_by_transaction(
    conn: &mut SqliteConnection,
    transaction_id: i64,
) -> RepoResult<Option<CreditApplication>> {
    let row = sqlx::query_as::<_, CreditApplication>(
        "SELECT * FROM credit_application WHERE transaction_id = ?1",
    )
    .bind(transaction_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

/// Flip an application to `reversed`, exactly once.
pub async fn mark_reversed(
    conn: &mut SqliteConnection,
    id: i64,
    reason: &str,
    actor_id: i64,
    now: i64,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE credit_application
            SET status = 'reversed',
                reversal_reason = ?1,
                reversed_by = ?2,
                reversed_at = ?3
          WHERE id = ?4 AND status = 'applied'",
    )
    .bind(reason)
    .bind(actor_id)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(rows.rows_affected() > 0)
}
