//! Domain models for the credit ledger core
//!
//! All ids are snowflake i64, all timestamps Unix milliseconds, all monetary
//! amounts i64 minor units (cents). SQLite has no decimal type and cents keep
//! the arithmetic exact.

pub mod credit_account;
pub mod credit_application;
pub mod credit_transaction;
pub mod invoice;
pub mod payment;

// Re-exports
pub use credit_account::CreditAccount;
pub use credit_application::{ApplicationStatus, CreditApplication};
pub use credit_transaction::{
    CONTEXT_SCHEMA_VERSION, CreditSource, CreditTransaction, TransactionContext, TransactionKind,
};
pub use invoice::{Invoice, InvoiceStatus};
pub use payment::{Payment, PaymentStatus};
