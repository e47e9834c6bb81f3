//! Audit log operations

use super::RepoResult;
use serde::Serialize;
use sqlx::SqlitePool;

/// Write an audit log entry
pub async fn insert(
    pool: &SqlitePool,
    club_id: &str,
    actor_id: i64,
    action: &str,
    resource_type: &str,
    resource_id: &str,
    detail: Option<&serde_json::Value>,
    now: i64,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO audit_log (club_id, actor_id, action, resource_type, resource_id, detail, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(club_id)
    .bind(actor_id)
    .bind(action)
    .bind(resource_type)
    .bind(resource_id)
    .bind(detail.map(|d| d.to_string()))
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Audit log entry as returned to the administrative UI
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: i64,
    pub actor_id: Option<i64>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub detail: Option<String>,
    pub created_at: i64,
}

/// Query audit log entries for a club, newest first (paginated)
pub async fn query(
    pool: &SqlitePool,
    club_id: &str,
    limit: i64,
    offset: i64,
) -> RepoResult<Vec<AuditEntry>> {
    let rows: Vec<AuditEntry> = sqlx::query_as(
        "SELECT id, actor_id, action, resource_type, resource_id, detail, created_at
           FROM audit_log WHERE club_id = ?1
          ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3",
    )
    .bind(club_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn count(pool: &SqlitePool, club_id: &str) -> RepoResult<i64> {
    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM audit_log WHERE club_id = ?1")
        .bind(club_id)
        .fetch_one(pool)
        .await?;
    Ok(total)
}
