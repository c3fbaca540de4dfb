//! Prepaid pass rows and DTOs.

use ledger_core::ledger::PaymentMethod;
use ledger_core::pass::unit_price;
use ledger_core::status::{PassStatus, StatusId};
use ledger_core::types::{DbId, Money, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Pass {
    pub id: DbId,
    pub child_id: DbId,
    pub branch_id: Option<DbId>,
    pub total_lessons: i32,
    pub remaining_lessons: i32,
    pub total_price: Money,
    pub status_id: StatusId,
    pub valid_until: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Pass {
    pub fn status(&self) -> Option<PassStatus> {
        PassStatus::from_id(self.status_id)
    }

    pub fn unit_price(&self) -> Option<Money> {
        unit_price(self.total_price, self.total_lessons)
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PassUsage {
    pub id: DbId,
    pub pass_id: DbId,
    pub lesson_id: DbId,
    pub created_at: Timestamp,
}

/// Issue a pass. A REVENUE entry for `total_price` is written with it.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePass {
    pub child_id: DbId,
    pub branch_id: Option<DbId>,
    pub total_lessons: i32,
    pub total_price: Money,
    pub valid_until: Option<Timestamp>,
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsumePass {
    pub lesson_id: DbId,
}

/// Result of a refund: the pass after the update and the correction entry.
#[derive(Debug, Clone, Serialize)]
pub struct PassRefund {
    pub pass: Pass,
    pub correction: crate::models::transaction::Transaction,
}
