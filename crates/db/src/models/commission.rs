//! Commission rate history rows.

use ledger_core::types::{DbId, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CommissionRate {
    pub id: DbId,
    pub therapist_id: DbId,
    pub percent: Decimal,
    pub effective_from: Timestamp,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
}

/// Set a new percent. Takes effect now unless `effective_from` is given.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommissionRate {
    pub percent: Decimal,
    pub effective_from: Option<Timestamp>,
}
