//! Settlement checkpoints: explicit records of closed windows.

use ledger_core::settlement::SettlementTotals;
use ledger_core::types::{DbId, Money, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SettlementCheckpoint {
    pub id: DbId,
    pub therapist_id: DbId,
    pub payout_request_id: DbId,
    pub transaction_id: Option<DbId>,
    pub window_from: Timestamp,
    pub closed_at: Timestamp,
    pub net: Money,
    pub lesson_count: i32,
    pub created_at: Timestamp,
}

/// A closed window recomputed from lesson data.
#[derive(Debug, Clone, Serialize)]
pub struct WindowPreview {
    pub therapist_id: DbId,
    pub window_from: Timestamp,
    pub window_to: Timestamp,
    /// Net recorded when the window closed, when one was recorded.
    pub recorded_net: Option<Money>,
    pub replayed: SettlementTotals,
}
