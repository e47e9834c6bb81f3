//! Credit Transaction Model

use serde::{Deserialize, Serialize};

/// Ledger entry kind. Determines the sign of the balance effect:
/// additions increase, usages decrease, reversals invert their original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    CreditAdded,
    CreditUsed,
    CreditReversed,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::CreditAdded => "credit_added",
            TransactionKind::CreditUsed => "credit_used",
            TransactionKind::CreditReversed => "credit_reversed",
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit_added" => Ok(TransactionKind::CreditAdded),
            "credit_used" => Ok(TransactionKind::CreditUsed),
            "credit_reversed" => Ok(TransactionKind::CreditReversed),
            other => Err(format!("unknown transaction kind: {other}")),
        }
    }
}

/// Where a balance-affecting event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum CreditSource {
    Overpayment,
    Manual,
    System,
}

impl CreditSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditSource::Overpayment => "overpayment",
            CreditSource::Manual => "manual",
            CreditSource::System => "system",
        }
    }
}

/// Immutable, append-only ledger entry.
///
/// `amount` is the signed balance delta; `balance_before`/`balance_after`
/// are snapshots taken at creation — the audit trail, not derived at read
/// time. Only the reversal-marking fields may change after insert, exactly
/// once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct CreditTransaction {
    pub id: i64,
    pub account_id: i64,
    pub club_id: String,
    /// Subject of the credit (not necessarily the actor)
    pub user_id: i64,
    pub kind: TransactionKind,
    /// Signed balance delta in cents
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub description: String,
    pub source: CreditSource,
    /// Source payment, when the event originated from one
    pub payment_id: Option<i64>,
    /// Target invoice, for usages applied against one
    pub invoice_id: Option<i64>,
    pub is_reversed: bool,
    /// The compensating transaction, once reversed
    pub reversed_by_tx: Option<i64>,
    pub reversal_reason: Option<String>,
    pub reversed_by: Option<i64>,
    pub reversed_at: Option<i64>,
    pub created_at: i64,
}

/// Structured audit context for one transaction.
///
/// Versioned side-record keyed by transaction id — replaces the free-form
/// JSON metadata blob the legacy system attached to transactions, so readers
/// get typed columns instead of parsing untyped data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct TransactionContext {
    pub transaction_id: i64,
    pub schema_version: i64,
    pub actor_id: i64,
    pub actor_role: String,
    pub payment_id: Option<i64>,
    pub invoice_id: Option<i64>,
    pub note: Option<String>,
    pub created_at: i64,
}

/// Current context schema version
pub const CONTEXT_SCHEMA_VERSION: i64 = 1;
