//! Best-effort audit trail for credit operations.
//!
//! Handlers hand finished operations to [`AuditLogger::log`], which pushes
//! them onto a bounded mpsc channel; a background worker drains the channel
//! into the `audit_log` table. Logging never blocks or fails a financial
//! mutation: when the buffer is full the entry is dropped with a warning.

use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::mpsc;

use crate::db::repository::audit_log;

/// Auditable actions, stored as their snake_case names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    OverpaymentConverted,
    OverpaymentRefunded,
    OverpaymentApplied,
    TransactionReversed,
    CreditApplied,
    CreditAdjusted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::OverpaymentConverted => "overpayment_converted",
            AuditAction::OverpaymentRefunded => "overpayment_refunded",
            AuditAction::OverpaymentApplied => "overpayment_applied",
            AuditAction::TransactionReversed => "transaction_reversed",
            AuditAction::CreditApplied => "credit_applied",
            AuditAction::CreditAdjusted => "credit_adjusted",
        }
    }
}

/// One entry handed to the logger.
#[derive(Debug)]
pub struct AuditLogRequest {
    pub club_id: String,
    pub actor_id: i64,
    pub action: AuditAction,
    pub resource_type: &'static str,
    pub resource_id: i64,
    pub detail: Option<serde_json::Value>,
}

/// Handle for submitting audit entries from request handlers.
#[derive(Clone)]
pub struct AuditLogger {
    tx: mpsc::Sender<AuditLogRequest>,
}

impl AuditLogger {
    /// Create the logger and spawn its worker on the current runtime.
    pub fn spawn(pool: SqlitePool, buffer_size: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer_size);
        tokio::spawn(run_worker(pool, rx));
        Self { tx }
    }

    /// Submit an entry without waiting. Drops the entry when the buffer is
    /// full or the worker has stopped.
    pub fn log(&self, req: AuditLogRequest) {
        if let Err(e) = self.tx.try_send(req) {
            tracing::warn!("Audit entry dropped: {e}");
        }
    }
}

async fn run_worker(pool: SqlitePool, mut rx: mpsc::Receiver<AuditLogRequest>) {
    tracing::info!("Audit log worker started");

    while let Some(req) = rx.recv().await {
        let now = shared::util::now_millis();
        match audit_log::insert(
            &pool,
            &req.club_id,
            req.actor_id,
            req.action.as_str(),
            req.resource_type,
            &req.resource_id.to_string(),
            req.detail.as_ref(),
            now,
        )
        .await
        {
            Ok(()) => {
                tracing::debug!(
                    action = req.action.as_str(),
                    resource = req.resource_type,
                    resource_id = req.resource_id,
                    "Audit entry recorded"
                );
            }
            Err(e) => {
                tracing::error!("Failed to write audit entry: {e:?}");
            }
        }
    }

    tracing::info!("Audit log channel closed, worker stopping");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn entries_reach_the_table() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        schema::init(&pool).await.unwrap();

        let logger = AuditLogger::spawn(pool.clone(), 8);
        logger.log(AuditLogRequest {
            club_id: "club-1".into(),
            actor_id: 1,
            action: AuditAction::CreditAdjusted,
            resource_type: "credit_transaction",
            resource_id: 42,
            detail: Some(serde_json::json!({ "amount": 500 })),
        });

        // Worker runs asynchronously; poll briefly for the row.
        let mut entries = Vec::new();
        for _ in 0..50 {
            entries = audit_log::query(&pool, "club-1", 10, 0).await.unwrap();
            if !entries.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "credit_adjusted");
        assert_eq!(entries[0].resource_id, "42");
    }
}
