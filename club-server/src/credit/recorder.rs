//! Transaction Recorder
//!
//! The single writer of account balances. Reads the current balance inside
//! the caller's unit of work, enforces the non-negative-balance invariant,
//! appends the ledger entry with its `balance_before`/`balance_after`
//! snapshots, updates the account summary, and writes the structured audit
//! context side-record.

use sqlx::SqliteConnection;

use super::LedgerError;
use crate::db::repository::{account, transaction};
use shared::models::{
    CONTEXT_SCHEMA_VERSION, CreditAccount, CreditSource, CreditTransaction, TransactionContext,
    TransactionKind,
};
use shared::types::ActorContext;

/// One recording request. `amount` is a non-negative magnitude; the sign of
/// the balance effect is derived from `kind` (and from the original entry's
/// kind when recording a reversal).
pub struct RecordRequest<'a> {
    pub account_id: i64,
    pub kind: TransactionKind,
    pub amount: i64,
    pub description: String,
    pub source: CreditSource,
    pub payment_id: Option<i64>,
    pub invoice_id: Option<i64>,
    /// The entry being compensated, required when `kind` is `CreditReversed`
    pub reverses: Option<&'a CreditTransaction>,
    pub note: Option<String>,
}

/// Result of a successful recording: the appended entry and the updated
/// account summary.
#[derive(Debug)]
pub struct Recorded {
    pub transaction: CreditTransaction,
    pub account: CreditAccount,
}

/// Append a transaction and update the account atomically with the caller's
/// unit of work.
pub async fn record(
    conn: &mut SqliteConnection,
    ctx: &ActorContext,
    req: RecordRequest<'_>,
) -> Result<Recorded, LedgerError> {
    if req.amount <= 0 {
        return Err(LedgerError::Validation(
            "amount must be a positive number of cents".into(),
        ));
    }

    let acct = account::find_by_id(conn, req.account_id)
        .await?
        .ok_or_else(|| LedgerError::Database(format!("account {} missing", req.account_id)))?;

    // Signed balance delta and lifetime-total adjustments by kind.
    let (delta, added_delta, used_delta) = match req.kind {
        TransactionKind::CreditAdded => (req.amount, req.amount, 0),
        TransactionKind::CreditUsed => (-req.amount, 0, req.amount),
        TransactionKind::CreditReversed => match req.reverses.map(|orig| orig.kind) {
            Some(TransactionKind::CreditAdded) => (-req.amount, -req.amount, 0),
            Some(TransactionKind::CreditUsed) => (req.amount, 0, -req.amount),
            _ => return Err(LedgerError::NotReversible),
        },
    };

    let balance_before = acct.current_balance;
    let balance_after = balance_before + delta;
    if balance_after < 0 {
        return Err(LedgerError::InsufficientBalance {
            available: balance_before,
            required: req.amount,
        });
    }

    let now = shared::util::now_millis();
    let tx = CreditTransaction {
        id: shared::util::snowflake_id(),
        account_id: acct.id,
        club_id: acct.club_id.clone(),
        user_id: acct.user_id,
        kind: req.kind,
        amount: delta,
        balance_before,
        balance_after,
        description: req.description,
        source: req.source,
        payment_id: req.payment_id,
        invoice_id: req.invoice_id,
        is_reversed: false,
        reversed_by_tx: None,
        reversal_reason: None,
        reversed_by: None,
        reversed_at: None,
        created_at: now,
    };
    transaction::insert(conn, &tx).await?;

    account::update_balances(
        conn,
        acct.id,
        balance_after,
        acct.total_credits_added + added_delta,
        acct.total_credits_used + used_delta,
        now,
    )
    .await?;

    transaction::insert_context(
        conn,
        &TransactionContext {
            transaction_id: tx.id,
            schema_version: CONTEXT_SCHEMA_VERSION,
            actor_id: ctx.actor_id,
            actor_role: ctx.role.as_str().to_string(),
            payment_id: req.payment_id,
            invoice_id: req.invoice_id,
            note: req.note,
            created_at: now,
        },
    )
    .await?;

    let account = account::find_by_id(conn, acct.id)
        .await?
        .ok_or_else(|| LedgerError::Database(format!("account {} missing", acct.id)))?;

    Ok(Recorded {
        transaction: tx,
        account,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credit::account::get_or_create;
    use crate::db::schema;
    use shared::types::Role;
    use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        schema::init(&pool).await.unwrap();
        pool
    }

    fn admin() -> ActorContext {
        ActorContext {
            club_id: "club-1".into(),
            actor_id: 1,
            role: Role::Admin,
        }
    }

    fn add_req(account_id: i64, amount: i64) -> RecordRequest<'static> {
        RecordRequest {
            account_id,
            kind: TransactionKind::CreditAdded,
            amount,
            description: "manual grant".into(),
            source: CreditSource::Manual,
            payment_id: None,
            invoice_id: None,
            reverses: None,
            note: None,
        }
    }

    #[tokio::test]
    async fn add_then_use_updates_balance_and_totals() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let ctx = admin();
        let acct = get_or_create(&mut conn, "club-1", 7).await.unwrap();

        let added = record(&mut conn, &ctx, add_req(acct.id, 500)).await.unwrap();
        assert_eq!(added.transaction.balance_before, 0);
        assert_eq!(added.transaction.balance_after, 500);
        assert_eq!(added.account.current_balance, 500);
        assert_eq!(added.account.total_credits_added, 500);

        let used = record(
            &mut conn,
            &ctx,
            RecordRequest {
                kind: TransactionKind::CreditUsed,
                amount: 200,
                description: "applied to invoice".into(),
                ..add_req(acct.id, 200)
            },
        )
        .await
        .unwrap();
        assert_eq!(used.transaction.amount, -200);
        assert_eq!(used.transaction.balance_before, 500);
        assert_eq!(used.transaction.balance_after, 300);
        assert_eq!(used.account.current_balance, 300);
        assert_eq!(used.account.total_credits_used, 200);
    }

    #[tokio::test]
    async fn rejects_usage_exceeding_balance() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let ctx = admin();
        let acct = get_or_create(&mut conn, "club-1", 7).await.unwrap();
        record(&mut conn, &ctx, add_req(acct.id, 100)).await.unwrap();

        let err = record(
            &mut conn,
            &ctx,
            RecordRequest {
                kind: TransactionKind::CreditUsed,
                amount: 150,
                ..add_req(acct.id, 150)
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientBalance {
                available: 100,
                required: 150
            }
        ));
    }

    #[tokio::test]
    async fn rejects_non_positive_amounts() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let ctx = admin();
        let acct = get_or_create(&mut conn, "club-1", 7).await.unwrap();

        for bad in [0, -50] {
            let err = record(&mut conn, &ctx, add_req(acct.id, bad))
                .await
                .unwrap_err();
            assert!(matches!(err, LedgerError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn snapshots_chain_across_entries() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let ctx = admin();
        let acct = get_or_create(&mut conn, "club-1", 7).await.unwrap();

        for amount in [100, 250, 75] {
            record(&mut conn, &ctx, add_req(acct.id, amount)).await.unwrap();
        }
        drop(conn);

        let entries = crate::db::repository::transaction::list_by_account(&pool, acct.id)
            .await
            .unwrap();
        assert_eq!(entries.len(), 3);
        for pair in entries.windows(2) {
            assert_eq!(pair[0].balance_after, pair[1].balance_before);
        }
    }

    #[tokio::test]
    async fn listing_order_matches_creation_order_in_a_burst() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let ctx = admin();
        let acct = get_or_create(&mut conn, "club-1", 7).await.unwrap();

        // Ten entries land within the same millisecond; the listing must
        // still replay them in creation order with an unbroken snapshot
        // chain.
        let mut inserted = Vec::new();
        for _ in 0..10 {
            let out = record(&mut conn, &ctx, add_req(acct.id, 30)).await.unwrap();
            inserted.push(out.transaction.id);
        }
        drop(conn);

        let entries = crate::db::repository::transaction::list_by_account(&pool, acct.id)
            .await
            .unwrap();
        let listed: Vec<i64> = entries.iter().map(|e| e.id).collect();
        assert_eq!(listed, inserted);
        assert_eq!(entries[0].balance_before, 0);
        for pair in entries.windows(2) {
            assert_eq!(pair[0].balance_after, pair[1].balance_before);
        }
        assert_eq!(entries.last().unwrap().balance_after, 300);
    }

    #[tokio::test]
    async fn writes_versioned_context_record() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let ctx = admin();
        let acct = get_or_create(&mut conn, "club-1", 7).await.unwrap();

        let recorded = record(
            &mut conn,
            &ctx,
            RecordRequest {
                payment_id: Some(9001),
                note: Some("from overpaid payment".into()),
                ..add_req(acct.id, 300)
            },
        )
        .await
        .unwrap();
        drop(conn);

        let stored =
            crate::db::repository::transaction::find_context(&pool, recorded.transaction.id)
                .await
                .unwrap()
                .expect("context row");
        assert_eq!(stored.schema_version, CONTEXT_SCHEMA_VERSION);
        assert_eq!(stored.actor_id, 1);
        assert_eq!(stored.actor_role, "admin");
        assert_eq!(stored.payment_id, Some(9001));
        assert_eq!(stored.note.as_deref(), Some("from overpaid payment"));
    }
}
