//! Ledger transaction rows and DTOs.

use ledger_core::ledger::{LedgerEntry, PaymentMethod, TransactionKind, TransactionMeta};
use ledger_core::types::{DbId, Money, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Transaction {
    pub id: DbId,
    pub kind: String,
    pub amount: Money,
    pub lesson_id: Option<DbId>,
    pub user_id: Option<DbId>,
    pub branch_id: Option<DbId>,
    pub company_id: Option<DbId>,
    pub meta: serde_json::Value,
    pub archived_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl Transaction {
    pub fn kind(&self) -> Option<TransactionKind> {
        TransactionKind::parse(&self.kind)
    }

    pub fn parsed_meta(&self) -> TransactionMeta {
        TransactionMeta::from_json(&self.meta)
    }

    /// View for the attribution logic. `None` for an unrecognised kind.
    pub fn to_entry(&self) -> Option<LedgerEntry> {
        Some(LedgerEntry {
            id: self.id,
            kind: self.kind()?,
            amount: self.amount,
            created_at: self.created_at,
            meta: self.parsed_meta(),
        })
    }
}

// ---------------------------------------------------------------------------
// Create DTO
// ---------------------------------------------------------------------------

/// A new ledger entry. The payment method is typed at write time.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTransaction {
    pub kind: TransactionKind,
    pub amount: Money,
    pub lesson_id: Option<DbId>,
    pub user_id: Option<DbId>,
    pub branch_id: Option<DbId>,
    pub company_id: Option<DbId>,
    pub payment_method: Option<PaymentMethod>,
    pub nominal_price: Option<Money>,
    #[serde(default)]
    pub personal: bool,
}

impl CreateTransaction {
    /// A bare entry of `kind` with no lesson or metadata.
    pub fn new(kind: TransactionKind, amount: Money) -> Self {
        Self {
            kind,
            amount,
            lesson_id: None,
            user_id: None,
            branch_id: None,
            company_id: None,
            payment_method: None,
            nominal_price: None,
            personal: false,
        }
    }

    pub fn meta(&self) -> TransactionMeta {
        TransactionMeta {
            payment_method: self.payment_method,
            nominal_price: self.nominal_price,
            personal: self.personal,
        }
    }
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// Filter for ledger listings. Archived entries are hidden.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionQuery {
    pub user_id: Option<DbId>,
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
