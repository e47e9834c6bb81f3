//! Idempotent schema creation
//!
//! Every statement is `CREATE ... IF NOT EXISTS`, so startup against an
//! existing database is a no-op.

use sqlx::SqlitePool;

const STATEMENTS: &[&str] = &[
    // Materialized per-(club, user) account summary. The UNIQUE constraint
    // is what makes concurrent first-use safe (insert-or-ignore + refetch).
    "CREATE TABLE IF NOT EXISTS credit_account (
        id INTEGER PRIMARY KEY,
        club_id TEXT NOT NULL,
        user_id INTEGER NOT NULL,
        current_balance INTEGER NOT NULL DEFAULT 0,
        total_credits_added INTEGER NOT NULL DEFAULT 0,
        total_credits_used INTEGER NOT NULL DEFAULT 0,
        last_activity_at INTEGER,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        UNIQUE(club_id, user_id)
    )",
    // Append-only ledger. Rows are immutable except the reversal-marking
    // fields, which are set exactly once.
    "CREATE TABLE IF NOT EXISTS credit_transaction (
        id INTEGER PRIMARY KEY,
        account_id INTEGER NOT NULL REFERENCES credit_account(id),
        club_id TEXT NOT NULL,
        user_id INTEGER NOT NULL,
        kind TEXT NOT NULL,
        amount INTEGER NOT NULL,
        balance_before INTEGER NOT NULL,
        balance_after INTEGER NOT NULL,
        description TEXT NOT NULL,
        source TEXT NOT NULL,
        payment_id INTEGER,
        invoice_id INTEGER,
        is_reversed INTEGER NOT NULL DEFAULT 0,
        reversed_by_tx INTEGER,
        reversal_reason TEXT,
        reversed_by INTEGER,
        reversed_at INTEGER,
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_credit_tx_account
        ON credit_transaction(account_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_credit_tx_user
        ON credit_transaction(club_id, user_id, created_at)",
    // Structured, versioned audit context — one row per transaction.
    "CREATE TABLE IF NOT EXISTS transaction_context (
        transaction_id INTEGER PRIMARY KEY REFERENCES credit_transaction(id),
        schema_version INTEGER NOT NULL,
        actor_id INTEGER NOT NULL,
        actor_role TEXT NOT NULL,
        payment_id INTEGER,
        invoice_id INTEGER,
        note TEXT,
        created_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS credit_application (
        id INTEGER PRIMARY KEY,
        account_id INTEGER NOT NULL REFERENCES credit_account(id),
        invoice_id INTEGER NOT NULL REFERENCES invoice(id),
        transaction_id INTEGER NOT NULL REFERENCES credit_transaction(id),
        amount INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'applied',
        reversal_reason TEXT,
        reversed_by INTEGER,
        reversed_at INTEGER,
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_credit_app_tx
        ON credit_application(transaction_id)",
    // External records: owned by the surrounding product, read and corrected
    // here under the same unit of work as the ledger writes that touch them.
    "CREATE TABLE IF NOT EXISTS invoice (
        id INTEGER PRIMARY KEY,
        club_id TEXT NOT NULL,
        user_id INTEGER NOT NULL,
        total INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        paid_at INTEGER,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_invoice_user
        ON invoice(club_id, user_id, status, created_at)",
    "CREATE TABLE IF NOT EXISTS payment (
        id INTEGER PRIMARY KEY,
        club_id TEXT NOT NULL,
        user_id INTEGER NOT NULL,
        invoice_id INTEGER REFERENCES invoice(id),
        amount INTEGER NOT NULL,
        method TEXT NOT NULL,
        reference TEXT,
        status TEXT NOT NULL DEFAULT 'completed',
        note TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS audit_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        club_id TEXT NOT NULL,
        actor_id INTEGER,
        action TEXT NOT NULL,
        resource_type TEXT NOT NULL,
        resource_id TEXT NOT NULL,
        detail TEXT,
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_audit_log_club
        ON audit_log(club_id, created_at)",
];

/// Create all tables and indexes if they do not exist yet.
pub async fn init(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for stmt in STATEMENTS {
        sqlx::query(stmt).execute(pool).await?;
    }
    Ok(())
}
