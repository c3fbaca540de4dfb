//! Payout request lifecycle rules.
//!
//! ```text
//! (none) --create--> PENDING --confirm--> PAID
//!                       \--cancel / stale--> CANCELLED
//! ```
//!
//! PAID and CANCELLED are terminal. Persistence and locking live in
//! `ledger_db::PayoutRequestRepo`; this module only decides.

use serde::Serialize;

use crate::attribution::{is_fully_personal, LessonFacts};
use crate::commission::CommissionSchedule;
use crate::error::CoreError;
use crate::settlement::{totals_for, SettlementTotals};
use crate::status::{LessonPayoutStatus, PayoutStatus};
use crate::types::{DbId, Timestamp};

/// Message surfaced when new lessons invalidate a pending request.
pub const STALE_NEW_LESSONS: &str = "new lessons appeared, resubmit";

/// Message surfaced when nothing is left to pay at confirmation.
pub const STALE_EMPTY: &str = "no eligible lessons remain for this request";

// ---------------------------------------------------------------------------
// Eligibility
// ---------------------------------------------------------------------------

/// Settled before `now`, not paid out, and not purely personal.
pub fn is_eligible(facts: &LessonFacts, now: Timestamp) -> bool {
    facts.payout_status == LessonPayoutStatus::None
        && facts.settled_at.is_some_and(|s| s < now)
        && !is_fully_personal(facts)
}

pub fn eligible_count(lessons: &[LessonFacts], now: Timestamp) -> usize {
    lessons.iter().filter(|l| is_eligible(l, now)).count()
}

/// Whether a request created at `created_at` has been overtaken by lessons
/// settled after it.
pub fn is_stale(created_at: Timestamp, lessons: &[LessonFacts], now: Timestamp) -> bool {
    lessons.iter().any(|l| {
        is_eligible(l, now) && l.settled_at.is_some_and(|s| created_at < s && s < now)
    })
}

/// The eligible set a request covers: eligible lessons settled no later
/// than the request's creation.
pub fn frozen_set(created_at: Timestamp, lessons: &[LessonFacts], now: Timestamp) -> Vec<&LessonFacts> {
    lessons
        .iter()
        .filter(|l| is_eligible(l, now) && l.settled_at.is_some_and(|s| s <= created_at))
        .collect()
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// Guard for `create`: no other PENDING request and something to pay.
pub fn ensure_can_create(
    existing_pending: Option<DbId>,
    eligible: usize,
) -> Result<(), CoreError> {
    if let Some(existing_id) = existing_pending {
        return Err(CoreError::DuplicatePendingRequest { existing_id });
    }
    if eligible == 0 {
        return Err(CoreError::Validation(
            "No eligible lessons to request a payout for".into(),
        ));
    }
    Ok(())
}

/// Guard for `confirm`: only PENDING requests can be confirmed.
pub fn ensure_confirmable(request_id: DbId, status: PayoutStatus) -> Result<(), CoreError> {
    match status {
        PayoutStatus::Pending => Ok(()),
        PayoutStatus::Paid => Err(CoreError::Conflict(format!(
            "Payout request {request_id} is already paid"
        ))),
        PayoutStatus::Cancelled => Err(CoreError::Conflict(format!(
            "Payout request {request_id} is cancelled"
        ))),
    }
}

/// Result of a cancel call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// PENDING moved to CANCELLED.
    Cancelled,
    /// Already CANCELLED; nothing changed.
    AlreadyCancelled,
}

pub fn cancel_transition(request_id: DbId, status: PayoutStatus) -> Result<CancelOutcome, CoreError> {
    match status {
        PayoutStatus::Pending => Ok(CancelOutcome::Cancelled),
        PayoutStatus::Cancelled => Ok(CancelOutcome::AlreadyCancelled),
        PayoutStatus::Paid => Err(CoreError::Conflict(format!(
            "Payout request {request_id} is already paid and cannot be cancelled"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Confirmation plan
// ---------------------------------------------------------------------------

/// What a confirmation will write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayoutPlan {
    pub request_id: DbId,
    pub therapist_id: DbId,
    /// Earliest `settled_at` in the set; the checkpoint's window start.
    pub window_from: Timestamp,
    pub totals: SettlementTotals,
}

/// Compute the payout for a PENDING request.
///
/// Checks staleness first, then sums exactly the frozen set. An empty set
/// is a [`CoreError::StaleRequest`]: a zero payout is never written
/// silently.
pub fn plan_payout(
    request_id: DbId,
    therapist_id: DbId,
    created_at: Timestamp,
    lessons: &[LessonFacts],
    schedule: &CommissionSchedule,
    now: Timestamp,
) -> Result<PayoutPlan, CoreError> {
    if is_stale(created_at, lessons, now) {
        return Err(CoreError::StaleRequest {
            request_id,
            reason: STALE_NEW_LESSONS.into(),
        });
    }

    let set = frozen_set(created_at, lessons, now);
    let Some(window_from) = set.iter().filter_map(|l| l.settled_at).min() else {
        return Err(CoreError::StaleRequest {
            request_id,
            reason: STALE_EMPTY.into(),
        });
    };

    Ok(PayoutPlan {
        request_id,
        therapist_id,
        window_from,
        totals: totals_for(set, schedule, now),
    })
}
