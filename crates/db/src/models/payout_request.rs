//! Payout request rows.

use ledger_core::status::{PayoutStatus, StatusId};
use ledger_core::types::{DbId, Money, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use crate::models::checkpoint::SettlementCheckpoint;
use crate::models::transaction::Transaction;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PayoutRequest {
    pub id: DbId,
    pub therapist_id: DbId,
    pub status_id: StatusId,
    pub final_amount: Option<Money>,
    pub confirmed_at: Option<Timestamp>,
    pub confirmed_by: Option<DbId>,
    pub cancelled_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PayoutRequest {
    pub fn status(&self) -> Option<PayoutStatus> {
        PayoutStatus::from_id(self.status_id)
    }
}

/// Everything a successful confirmation wrote.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmedPayout {
    pub request: PayoutRequest,
    pub transaction: Transaction,
    pub checkpoint: SettlementCheckpoint,
    pub lesson_ids: Vec<DbId>,
}
