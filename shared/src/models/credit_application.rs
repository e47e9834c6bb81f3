//! Credit Application Model

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Applied,
    Reversed,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::Reversed => "reversed",
        }
    }
}

/// Records that a credit amount was applied against a specific invoice.
///
/// Exists only for `credit_used` transactions whose target was an invoice;
/// flipped to `reversed` when that transaction is reversed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct CreditApplication {
    pub id: i64,
    pub account_id: i64,
    pub invoice_id: i64,
    pub transaction_id: i64,
    /// Applied cents
    pub amount: i64,
    pub status: ApplicationStatus,
    pub reversal_reason: Option<String>,
    pub reversed_by: Option<i64>,
    pub reversed_at: Option<i64>,
    pub created_at: i64,
}
