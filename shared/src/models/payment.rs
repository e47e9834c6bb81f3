//! Payment Model (external record, read and corrected by the credit core)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    /// Negative-amount compensating record created by a refund resolution
    Refund,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Refund => "refund",
        }
    }
}

/// A member payment. The credit core never deletes payments; an overpaid one
/// is corrected in place down to its invoice total, with provenance kept on
/// the ledger transaction that absorbed the difference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: i64,
    pub club_id: String,
    pub user_id: i64,
    pub invoice_id: Option<i64>,
    /// Cents; negative for refund records
    pub amount: i64,
    pub method: String,
    pub reference: Option<String>,
    pub status: PaymentStatus,
    pub note: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}
