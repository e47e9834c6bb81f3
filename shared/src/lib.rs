//! Shared types for the club portal
//!
//! Domain models, the unified error type, and small utilities used by the
//! server crate. Models derive `sqlx::FromRow` behind the `db` feature so
//! non-database consumers stay free of sqlx.

pub mod error;
pub mod models;
pub mod types;
pub mod util;

// Re-exports
pub use error::{AppError, AppResult};
pub use serde::{Deserialize, Serialize};
pub use types::{ActorContext, PaginatedResponse, Role};
