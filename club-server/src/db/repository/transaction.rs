//! Credit Transaction Repository
//!
//! Append-only: rows are inserted once and only the reversal-marking fields
//! ever change, guarded so the marking happens exactly once.

use super::RepoResult;
use shared::models::{CreditTransaction, TransactionContext, TransactionKind};
use sqlx::{SqliteConnection, SqlitePool};

/// Append a ledger entry. The caller (transaction recorder) has already
/// computed the signed delta and the balance snapshots.
pub async fn insert(conn: &mut SqliteConnection, tx: &CreditTransaction) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO credit_transaction
            (id, account_id, club_id, user_id, kind, amount, balance_before, balance_after,
             description, source, payment_id, invoice_id, is_reversed, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 0, ?13)",
    )
    .bind(tx.id)
    .bind(tx.account_id)
    .bind(&tx.club_id)
    .bind(tx.user_id)
    .bind(tx.kind.as_str())
    .bind(tx.amount)
    .bind(tx.balance_before)
    .bind(tx.balance_after)
    .bind(&tx.description)
    .bind(tx.source.as_str())
    .bind(tx.payment_id)
    .bind(tx.invoice_id)
    .bind(tx.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Persist the structured audit context for a transaction.
pub async fn insert_context(
    conn: &mut SqliteConnection,
    ctx: &TransactionContext,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO transaction_context
            (transaction_id, schema_version, actor_id, actor_role, payment_id, invoice_id, note, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )
    .bind(ctx.transaction_id)
    .bind(ctx.schema_version)
    .bind(ctx.actor_id)
    .bind(&ctx.actor_role)
    .bind(ctx.payment_id)
    .bind(ctx.invoice_id)
    .bind(&ctx.note)
    .bind(ctx.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Read a transaction inside the caller's unit of work.
pub async fn find_by_id_conn(
    conn: &mut SqliteConnection,
    club_id: &str,
    id: i64,
) -> RepoResult<Option<CreditTransaction>> {
    let row = sqlx::query_as::<_, CreditTransaction>(
        "SELECT * FROM credit_transaction WHERE id = ?1 AND club_id = ?2",
    )
    .bind(id)
    .bind(club_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

/// Mark a transaction reversed, exactly once.
///
/// The `is_reversed = 0` predicate is the concurrency guard: a second
/// reversal racing the first updates zero rows and the caller rolls back.
pub async fn mark_reversed(
    conn: &mut SqliteConnection,
    id: i64,
    reversed_by_tx: i64,
    reason: &str,
    actor_id: i64,
    now: i64,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE credit_transaction
            SET is_reversed = 1,
                reversed_by_tx = ?1,
                reversal_reason = ?2,
                reversed_by = ?3,
                reversed_at = ?4
          WHERE id = ?5 AND is_reversed = 0",
    )
    .bind(reversed_by_tx)
    .bind(reason)
    .bind(actor_id)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(rows.rows_affected() > 0)
}

/// History filters for [`list`] and [`count`].
#[derive(Debug, Default, Clone)]
pub struct HistoryFilter {
    pub kind: Option<TransactionKind>,
    pub from: Option<i64>,
    pub to: Option<i64>,
}

const HISTORY_WHERE: &str = "club_id = ?1 AND user_id = ?2
    AND (?3 IS NULL OR kind = ?3)
    AND (?4 IS NULL OR created_at >= ?4)
    AND (?5 IS NULL OR created_at <= ?5)";

/// Page through a member's transaction history in creation order.
pub async fn list(
    pool: &SqlitePool,
    club_id: &str,
    user_id: i64,
    filter: &HistoryFilter,
    limit: i64,
    offset: i64,
) -> RepoResult<Vec<CreditTransaction>> {
    let sql = format!(
        "SELECT * FROM credit_transaction WHERE {HISTORY_WHERE}
         ORDER BY created_at ASC, id ASC LIMIT ?6 OFFSET ?7"
    );
    let rows = sqlx::query_as::<_, CreditTransaction>(&sql)
        .bind(club_id)
        .bind(user_id)
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(filter.from)
        .bind(filter.to)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn count(
    pool: &SqlitePool,
    club_id: &str,
    user_id: i64,
    filter: &HistoryFilter,
) -> RepoResult<i64> {
    let sql = format!("SELECT COUNT(*) FROM credit_transaction WHERE {HISTORY_WHERE}");
    let (total,): (i64,) = sqlx::query_as(&sql)
        .bind(club_id)
        .bind(user_id)
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(pool)
        .await?;
    Ok(total)
}

/// All entries for an account in creation order (reconciliation checks).
pub async fn list_by_account(
    pool: &SqlitePool,
    account_id: i64,
) -> RepoResult<Vec<CreditTransaction>> {
    let rows = sqlx::query_as::<_, CreditTransaction>(
        "SELECT * FROM credit_transaction WHERE account_id = ?1 ORDER BY created_at ASC, id ASC",
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn find_context(
    pool: &SqlitePool,
    transaction_id: i64,
) -> RepoResult<Option<TransactionContext>> {
    let row = sqlx::query_as::<_, TransactionContext>(
        "SELECT * FROM transaction_context WHERE transaction_id = ?1",
    )
    .bind(transaction_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
