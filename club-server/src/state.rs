//! Application state for club-server

use sqlx::SqlitePool;

use crate::audit::AuditLogger;
use crate::config::Config;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection pool
    pub pool: SqlitePool,
    /// Best-effort audit trail
    pub audit: AuditLogger,
    /// JWT secret for actor authentication
    pub jwt_secret: String,
    /// Deployment environment name
    pub environment: String,
}

impl AppState {
    /// Connect, run schema migrations and spawn the audit worker.
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let pool = crate::db::connect(&config.database_url).await?;
        crate::db::schema::init(&pool).await?;
        let audit = AuditLogger::spawn(pool.clone(), config.audit_buffer_size);

        Ok(Self {
            pool,
            audit,
            jwt_secret: config.jwt_secret.clone(),
            environment: config.environment.clone(),
        })
    }

    /// Build state around an existing pool. Used by integration tests.
    pub fn with_pool(pool: SqlitePool, jwt_secret: &str) -> Self {
        let audit = AuditLogger::spawn(pool.clone(), 64);
        Self {
            pool,
            audit,
            jwt_secret: jwt_secret.to_string(),
            environment: "test".to_string(),
        }
    }
}
