//! Commission split between therapist and leader.
//!
//! The therapist's percent can change over time. A lesson captures the
//! percent and both shares when it settles ([`ShareSnapshot::capture`]);
//! later rate changes never touch a captured snapshot.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::attribution::{full_price, LessonFacts};
use crate::error::CoreError;
use crate::money::{percent_of, round_money};
use crate::types::{Money, Timestamp};

/// Percent used when a therapist has no configured rate.
pub const DEFAULT_COMMISSION_PERCENT: i64 = 50;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Commission values frozen on a lesson at settlement time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShareSnapshot {
    pub commission_percent: Option<Decimal>,
    pub therapist_share: Option<Money>,
    pub leader_share: Option<Money>,
}

impl ShareSnapshot {
    /// Split `price` at `percent`. The leader share is the remainder so the
    /// two shares always add up to the price.
    pub fn capture(price: Money, percent: Decimal) -> Self {
        let therapist = percent_of(price, percent);
        let leader = round_money(price - therapist);
        Self {
            commission_percent: Some(percent),
            therapist_share: Some(therapist),
            leader_share: Some(leader),
        }
    }

    /// `leader_share × 100 / (100 − percent)`, when both are usable.
    pub fn reconstruct_price(&self) -> Option<Money> {
        let percent = self.commission_percent?;
        let leader = self.leader_share.filter(|l| *l > Decimal::ZERO)?;
        let leader_percent = Decimal::ONE_HUNDRED - percent;
        if leader_percent <= Decimal::ZERO {
            return None;
        }
        Some(round_money(leader * Decimal::ONE_HUNDRED / leader_percent))
    }

    /// Sum of whichever shares are stored.
    pub fn stored_total(&self) -> Money {
        self.therapist_share.unwrap_or_default() + self.leader_share.unwrap_or_default()
    }

    /// The stored therapist share, if it is set and non-zero.
    pub fn frozen_therapist_share(&self) -> Option<Money> {
        self.therapist_share.filter(|s| !s.is_zero())
    }
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// A dated change of a therapist's commission percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateChange {
    pub effective_from: Timestamp,
    pub percent: Decimal,
}

/// A therapist's percent history plus the organization default.
#[derive(Debug, Clone, PartialEq)]
pub struct CommissionSchedule {
    default_percent: Decimal,
    /// Sorted by `effective_from` ascending.
    changes: Vec<RateChange>,
}

impl CommissionSchedule {
    pub fn new(default_percent: Decimal, mut changes: Vec<RateChange>) -> Self {
        changes.sort_by_key(|c| c.effective_from);
        Self {
            default_percent,
            changes,
        }
    }

    /// Schedule with no recorded changes.
    pub fn flat(percent: Decimal) -> Self {
        Self::new(percent, Vec::new())
    }

    /// Percent in force at instant `at`.
    pub fn percent_at(&self, at: Timestamp) -> Decimal {
        self.changes
            .iter()
            .rev()
            .find(|c| c.effective_from <= at)
            .map(|c| c.percent)
            .unwrap_or(self.default_percent)
    }

    pub fn current_percent(&self, now: Timestamp) -> Decimal {
        self.percent_at(now)
    }

    pub fn changes(&self) -> &[RateChange] {
        &self.changes
    }
}

/// Validate that a percent lies in `0..=100`.
pub fn validate_percent(percent: Decimal) -> Result<(), CoreError> {
    if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
        return Err(CoreError::Validation(format!(
            "Commission percent must be between 0 and 100, got {percent}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Shares
// ---------------------------------------------------------------------------

/// Percent that applies to a lesson: its snapshot, else the rate in force
/// when it settled, else (never settled) the current rate.
pub fn effective_percent(facts: &LessonFacts, schedule: &CommissionSchedule, now: Timestamp) -> Decimal {
    if let Some(percent) = facts.snapshot.commission_percent {
        return percent;
    }
    match facts.settled_at {
        Some(settled_at) => schedule.percent_at(settled_at),
        None => schedule.current_percent(now),
    }
}

/// The therapist's entitlement for one lesson.
pub fn therapist_share(facts: &LessonFacts, schedule: &CommissionSchedule, now: Timestamp) -> Money {
    if let Some(frozen) = facts.snapshot.frozen_therapist_share() {
        return frozen;
    }
    percent_of(full_price(facts), effective_percent(facts, schedule, now))
}

/// The leader's part of the lesson price.
pub fn leader_share(facts: &LessonFacts, schedule: &CommissionSchedule, now: Timestamp) -> Money {
    round_money(full_price(facts) - therapist_share(facts, schedule, now))
}
