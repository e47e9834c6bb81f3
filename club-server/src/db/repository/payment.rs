//! Payment Repository
//!
//! Payments are external records: the credit core reads them, corrects the
//! amount of an overpaid one in place, and inserts refund/transfer records.
//! It never deletes a payment.

use super::{RepoError, RepoResult};
use shared::models::{Payment, PaymentStatus};
use sqlx::{SqliteConnection, SqlitePool};

pub async fn find_by_id(
    pool: &SqlitePool,
    club_id: &str,
    id: i64,
) -> RepoResult<Option<Payment>> {
    let row =
        sqlx::query_as::<_, Payment>("SELECT * FROM payment WHERE id = ?1 AND club_id = ?2")
            .bind(id)
            .bind(club_id)
            .fetch_optional(pool)
            .await?;
    Ok(row)
}

/// Read a payment inside the caller's unit of work.
pub async fn find_by_id_conn(
    conn: &mut SqliteConnection,
    club_id: &str,
    id: i64,
) -> RepoResult<Option<Payment>> {
    let row =
        sqlx::query_as::<_, Payment>("SELECT * FROM payment WHERE id = ?1 AND club_id = ?2")
            .bind(id)
            .bind(club_id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(row)
}

/// Fields for a payment record created by the credit core (refund or
/// forward-applied amount).
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub club_id: String,
    pub user_id: i64,
    pub invoice_id: Option<i64>,
    pub amount: i64,
    pub method: String,
    pub reference: Option<String>,
    pub status: PaymentStatus,
    pub note: Option<String>,
}

pub async fn insert(conn: &mut SqliteConnection, new: &NewPayment) -> RepoResult<Payment> {
    let now = shared::util::now_millis();
    let id = shared::util::snowflake_id();
    sqlx::query(
        "INSERT INTO payment
            (id, club_id, user_id, invoice_id, amount, method, reference, status, note, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
    )
    .bind(id)
    .bind(&new.club_id)
    .bind(new.user_id)
    .bind(new.invoice_id)
    .bind(new.amount)
    .bind(&new.method)
    .bind(&new.reference)
    .bind(new.status.as_str())
    .bind(&new.note)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(Payment {
        id,
        club_id: new.club_id.clone(),
        user_id: new.user_id,
        invoice_id: new.invoice_id,
        amount: new.amount,
        method: new.method.clone(),
        reference: new.reference.clone(),
        status: new.status,
        note: new.note.clone(),
        created_at: now,
        updated_at: now,
    })
}

/// Correct a payment's stored amount in place and replace its note.
pub async fn correct_amount(
    conn: &mut SqliteConnection,
    id: i64,
    amount: i64,
    note: Option<&str>,
    now: i64,
) -> RepoResult<Payment> {
    let rows = sqlx::query(
        "UPDATE payment SET amount = ?1, note = ?2, updated_at = ?3 WHERE id = ?4",
    )
    .bind(amount)
    .bind(note)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Payment {id} not found")));
    }

    let row = sqlx::query_as::<_, Payment>("SELECT * FROM payment WHERE id = ?1")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(row)
}

/// Seed helper for tests and fixtures: insert a payment with a known id.
pub async fn insert_raw(conn: &mut SqliteConnection, payment: &Payment) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO payment
            (id, club_id, user_id, invoice_id, amount, method, reference, status, note, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )
    .bind(payment.id)
    .bind(&payment.club_id)
    .bind(payment.user_id)
    .bind(payment.invoice_id)
    .bind(payment.amount)
    .bind(&payment.method)
    .bind(&payment.reference)
    .bind(payment.status.as_str())
    .bind(&payment.note)
    .bind(payment.created_at)
    .bind(payment.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
