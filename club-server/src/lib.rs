//! club-server — Club administration portal backend
//!
//! Credit ledger and overpayment resolution for multi-tenant club
//! administration: per-member prepaid credit accounts, an immutable
//! transaction ledger with balance snapshots, overpayment resolution
//! strategies and auditable reversals.

pub mod api;
pub mod audit;
pub mod auth;
pub mod config;
pub mod credit;
pub mod db;
pub mod state;
