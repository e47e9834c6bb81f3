//! Repository Module
//!
//! Free-function repositories over the SQLite tables. Functions that must
//! participate in a caller's transaction take `&mut SqliteConnection`;
//! standalone reads take `&SqlitePool`.

pub mod account;
pub mod application;
pub mod audit_log;
pub mod invoice;
pub mod payment;
pub mod transaction;

pub use super::{RepoError, RepoResult};
