//! Invoice Model (external record, read and corrected by the credit core)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Void,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Void => "void",
        }
    }
}

/// A member invoice. While a credit application exists against it, its
/// `pending ⇄ paid` transitions are driven only by credit application and
/// its reversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Invoice {
    pub id: i64,
    pub club_id: String,
    pub user_id: i64,
    /// Remaining total in cents
    pub total: i64,
    pub status: InvoiceStatus,
    pub paid_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}
