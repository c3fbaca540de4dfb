//! Lesson rows as seen by the ledger.

use ledger_core::commission::ShareSnapshot;
use ledger_core::status::{LessonPayoutStatus, StatusId};
use ledger_core::types::{DbId, Money, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Lesson {
    pub id: DbId,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
    pub therapist_id: DbId,
    pub branch_id: Option<DbId>,
    pub child_id: Option<DbId>,
    pub payout_status_id: StatusId,
    pub settled_at: Option<Timestamp>,
    pub paid_at: Option<Timestamp>,
    pub payout_request_id: Option<DbId>,
    pub commission_percent_at_time: Option<Decimal>,
    pub therapist_share_at_time: Option<Money>,
    pub leader_share_at_time: Option<Money>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Lesson {
    pub fn payout_status(&self) -> Option<LessonPayoutStatus> {
        LessonPayoutStatus::from_id(self.payout_status_id)
    }

    pub fn snapshot(&self) -> ShareSnapshot {
        ShareSnapshot {
            commission_percent: self.commission_percent_at_time,
            therapist_share: self.therapist_share_at_time,
            leader_share: self.leader_share_at_time,
        }
    }
}

/// Lessons are created by the scheduling layer; this DTO is used for seeding.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateLesson {
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
    pub therapist_id: DbId,
    pub branch_id: Option<DbId>,
    pub child_id: Option<DbId>,
}
