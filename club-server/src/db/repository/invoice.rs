//! Invoice Repository
//!
//! While a credit application exists against an invoice, its pending ⇄ paid
//! transitions happen only inside the credit core's units of work.

use super::{RepoError, RepoResult};
use shared::models::{Invoice, InvoiceStatus};
use sqlx::SqliteConnection;

pub async fn find_by_id_conn(
    conn: &mut SqliteConnection,
    club_id: &str,
    id: i64,
) -> RepoResult<Option<Invoice>> {
    let row =
        sqlx::query_as::<_, Invoice>("SELECT * FROM invoice WHERE id = ?1 AND club_id = ?2")
            .bind(id)
            .bind(club_id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(row)
}

/// Oldest pending invoice for the member, excluding the one already tied to
/// the payment being resolved. Ties on created_at break by id, so the pick
/// is deterministic.
pub async fn oldest_other_pending(
    conn: &mut SqliteConnection,
    club_id: &str,
    user_id: i64,
    exclude_id: Option<i64>,
) -> RepoResult<Option<Invoice>> {
    let row = sqlx::query_as::<_, Invoice>(
        "SELECT * FROM invoice
          WHERE club_id = ?1 AND user_id = ?2 AND status = 'pending'
            AND (?3 IS NULL OR id != ?3)
          ORDER BY created_at ASC, id ASC
          LIMIT 1",
    )
    .bind(club_id)
    .bind(user_id)
    .bind(exclude_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

/// Write a credit application's effect: reduced total, and the paid flip
/// when the remaining total reaches zero.
pub async fn apply_amount(
    conn: &mut SqliteConnection,
    id: i64,
    new_total: i64,
    status: InvoiceStatus,
    paid_at: Option<i64>,
    now: i64,
) -> RepoResult<()> {
    let rows = sqlx::query(
        "UPDATE invoice SET total = ?1, status = ?2, paid_at = ?3, updated_at = ?4 WHERE id = ?5",
    )
    .bind(new_total)
    .bind(status.as_str())
    .bind(paid_at)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Invoice {id} not found")));
    }
    Ok(())
}

/// Undo a credit application: add the reversed amount back, reopen the
/// invoice, clear its paid timestamp.
pub async fn restore(
    conn: &mut SqliteConnection,
    id: i64,
    add_back: i64,
    now: i64,
) -> RepoResult<()> {
    let rows = sqlx::query(
        "UPDATE invoice
            SET total = total + ?1, status = 'pending', paid_at = NULL, updated_at = ?2
          WHERE id = ?3",
    )
    .bind(add_back)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Invoice {id} not found")));
    }
    Ok(())
}

/// Seed helper for tests and fixtures: insert an invoice with a known id.
pub async fn insert_raw(conn: &mut SqliteConnection, invoice: &Invoice) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO invoice
            (id, club_id, user_id, total, status, paid_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )
    .bind(invoice.id)
    .bind(&invoice.club_id)
    .bind(invoice.user_id)
    .bind(invoice.total)
    .bind(invoice.status.as_str())
    .bind(invoice.paid_at)
    .bind(invoice.created_at)
    .bind(invoice.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
