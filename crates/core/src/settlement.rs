//! Settlement windows: net balance between a therapist and the leader.
//!
//! `net = therapist_share_sum − cash_therapist`. Positive means the leader
//! owes the therapist; negative means the therapist holds more cash than
//! their entitled share.
//!
//! Everything here is a pure function of the lesson facts passed in, so a
//! window computed twice over the same ledger state gives the same result.

use chrono::{Datelike, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::attribution::{full_price, is_fully_personal, who_paid, LessonFacts, Payer};
use crate::commission::{therapist_share, CommissionSchedule};
use crate::error::CoreError;
use crate::money::round_money;
use crate::types::{DbId, Money, Timestamp};

/// Longest window a caller may request explicitly.
pub const MAX_WINDOW_DAYS: i64 = 731;

/// Upper bound on lessons loaded for a single window.
pub const MAX_LESSONS_PER_QUERY: i64 = 5_000;

/// An unpaid backlog must be loaded whole: a truncated one would hide the
/// newest lessons from the staleness check. Loaders fetch one row past the
/// limit and pass the count here.
pub fn ensure_backlog_complete(therapist_id: DbId, loaded: usize, limit: i64) -> Result<(), CoreError> {
    if loaded as i64 > limit {
        return Err(CoreError::Validation(format!(
            "Therapist {therapist_id} has more than {limit} unpaid lessons; settle in smaller windows"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Window
// ---------------------------------------------------------------------------

/// Half-open interval `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementWindow {
    pub from: Timestamp,
    pub to: Timestamp,
}

impl SettlementWindow {
    pub fn new(from: Timestamp, to: Timestamp) -> Result<Self, CoreError> {
        if from >= to {
            return Err(CoreError::Validation(format!(
                "Window start {from} must be before its end {to}"
            )));
        }
        Ok(Self { from, to })
    }

    /// Reject windows longer than [`MAX_WINDOW_DAYS`].
    pub fn validate_span(&self) -> Result<(), CoreError> {
        if self.to - self.from > Duration::days(MAX_WINDOW_DAYS) {
            return Err(CoreError::Validation(format!(
                "Window may span at most {MAX_WINDOW_DAYS} days"
            )));
        }
        Ok(())
    }

    pub fn contains(&self, at: Timestamp) -> bool {
        self.from <= at && at < self.to
    }
}

/// Display periods for the running balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementPeriod {
    Week,
    Month,
    HalfYear,
    Year,
}

impl SettlementPeriod {
    /// Start of the period containing `now` (UTC).
    ///
    /// Week starts Monday 00:00. Half-year covers the current month and the
    /// five before it.
    pub fn start(self, now: Timestamp) -> Timestamp {
        let today = now.date_naive();
        let date = match self {
            Self::Week => {
                today - Duration::days(i64::from(today.weekday().num_days_from_monday()))
            }
            Self::Month => first_of_month(today.year(), today.month()),
            Self::HalfYear => {
                let months = today.year() * 12 + today.month0() as i32 - 5;
                first_of_month(months.div_euclid(12), months.rem_euclid(12) as u32 + 1)
            }
            Self::Year => first_of_month(today.year(), 1),
        };
        Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
    }
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Totals
// ---------------------------------------------------------------------------

/// Result of a settlement computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementTotals {
    /// Full price of lessons where the therapist kept the cash.
    pub cash_therapist: Money,
    /// Therapist entitlement over the same lessons, whoever was paid.
    pub therapist_share_sum: Money,
    pub net: Money,
    pub lesson_count: u32,
    pub lesson_ids: Vec<DbId>,
}

impl SettlementTotals {
    pub fn empty() -> Self {
        Self {
            cash_therapist: Decimal::ZERO,
            therapist_share_sum: Decimal::ZERO,
            net: Decimal::ZERO,
            lesson_count: 0,
            lesson_ids: Vec::new(),
        }
    }
}

/// Sum shares and therapist cash over exactly the given lessons.
///
/// Fully personal lessons are skipped. The caller picks the set; this is
/// what payout confirmation uses for its frozen eligible set.
pub fn totals_for<'a, I>(lessons: I, schedule: &CommissionSchedule, now: Timestamp) -> SettlementTotals
where
    I: IntoIterator<Item = &'a LessonFacts>,
{
    let mut cash = Decimal::ZERO;
    let mut shares = Decimal::ZERO;
    let mut lesson_ids = Vec::new();

    for facts in lessons {
        if is_fully_personal(facts) {
            continue;
        }
        // UNKNOWN payer is not therapist cash: only explicit evidence moves
        // money to the therapist side of the balance.
        if who_paid(facts) == Payer::Therapist {
            cash += full_price(facts);
        }
        shares += therapist_share(facts, schedule, now);
        lesson_ids.push(facts.lesson_id);
    }

    let cash_therapist = round_money(cash);
    let therapist_share_sum = round_money(shares);
    SettlementTotals {
        cash_therapist,
        therapist_share_sum,
        net: round_money(therapist_share_sum - cash_therapist),
        lesson_count: lesson_ids.len() as u32,
        lesson_ids,
    }
}

/// Whether a lesson belongs to the window's computation.
///
/// The lesson must be settled inside the window, not fully personal, and
/// not already paid before `window.to`. A lesson paid exactly at `to` was
/// paid by this window's own checkpoint and stays in so it can be replayed.
/// Paid lessons without a recorded `paid_at` predate checkpoints and are
/// kept too.
pub fn included_in_window(facts: &LessonFacts, window: &SettlementWindow) -> bool {
    let Some(settled_at) = facts.settled_at else {
        return false;
    };
    if !window.contains(settled_at) || is_fully_personal(facts) {
        return false;
    }
    !(facts.is_paid() && facts.paid_at.is_some_and(|paid_at| paid_at < window.to))
}

/// Net balance over `[from, to)`.
pub fn compute_settlement_window(
    lessons: &[LessonFacts],
    window: &SettlementWindow,
    schedule: &CommissionSchedule,
    now: Timestamp,
) -> SettlementTotals {
    totals_for(
        lessons.iter().filter(|l| included_in_window(l, window)),
        schedule,
        now,
    )
}

/// Running balance from the start of `period` until `now`. Display only;
/// payout confirmation always works against explicit boundaries.
pub fn compute_settlement(
    lessons: &[LessonFacts],
    period: SettlementPeriod,
    schedule: &CommissionSchedule,
    now: Timestamp,
) -> SettlementTotals {
    match SettlementWindow::new(period.start(now), now) {
        Ok(window) => compute_settlement_window(lessons, &window, schedule, now),
        Err(_) => SettlementTotals::empty(),
    }
}

// ---------------------------------------------------------------------------
// Income
// ---------------------------------------------------------------------------

/// How an income aggregate treats lessons whose payer is UNKNOWN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownPayerPolicy {
    /// Leader dashboards: money with no evidence is assumed to reach the leader.
    CountAsLeader,
    /// Reconciliation views: unknown money is reported separately only.
    Exclude,
}

/// Income split for a leader dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeSummary {
    pub leader_income: Money,
    pub therapist_cash: Money,
    /// Price of UNKNOWN-payer lessons, whatever the policy.
    pub unknown_income: Money,
    pub unknown_lessons: u32,
    pub lesson_count: u32,
    pub total: Money,
    pub policy: UnknownPayerPolicy,
}

/// Aggregate lesson prices by payer over a window.
pub fn income_summary(
    lessons: &[LessonFacts],
    window: &SettlementWindow,
    policy: UnknownPayerPolicy,
) -> IncomeSummary {
    let mut leader = Decimal::ZERO;
    let mut therapist = Decimal::ZERO;
    let mut unknown = Decimal::ZERO;
    let mut unknown_lessons = 0u32;
    let mut lesson_count = 0u32;

    for facts in lessons {
        let Some(settled_at) = facts.settled_at else {
            continue;
        };
        if !window.contains(settled_at) || is_fully_personal(facts) {
            continue;
        }
        lesson_count += 1;
        let price = full_price(facts);
        match who_paid(facts) {
            Payer::Leader => leader += price,
            Payer::Therapist => therapist += price,
            Payer::Unknown => {
                unknown += price;
                unknown_lessons += 1;
                if policy == UnknownPayerPolicy::CountAsLeader {
                    leader += price;
                }
            }
        }
    }

    let total = match policy {
        UnknownPayerPolicy::CountAsLeader => leader + therapist,
        UnknownPayerPolicy::Exclude => leader + therapist + unknown,
    };

    IncomeSummary {
        leader_income: round_money(leader),
        therapist_cash: round_money(therapist),
        unknown_income: round_money(unknown),
        unknown_lessons,
        lesson_count,
        total: round_money(total),
        policy,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::attribution::tests::{entry, lesson, ts};
    use crate::commission::ShareSnapshot;
    use crate::ledger::{PaymentMethod, TransactionKind};
    use crate::status::LessonPayoutStatus;

    fn flat() -> CommissionSchedule {
        CommissionSchedule::flat(Decimal::from(50))
    }

    fn therapist_cash_lesson(id: DbId, price: i64, settled_minute: i64) -> LessonFacts {
        let mut e = entry(id * 10, TransactionKind::CashHeld, 0, settled_minute - 1);
        e.meta.payment_method = Some(PaymentMethod::TherapistCash);
        let mut facts = lesson(id, vec![e]);
        facts.child_rate = Some(Decimal::from(price));
        facts.settled_at = Some(ts(settled_minute));
        facts
    }

    fn leader_lesson(id: DbId, price: i64, settled_minute: i64) -> LessonFacts {
        let mut facts = lesson(id, vec![entry(id * 10, TransactionKind::Revenue, price, settled_minute - 1)]);
        facts.settled_at = Some(ts(settled_minute));
        facts
    }

    fn window(from: i64, to: i64) -> SettlementWindow {
        SettlementWindow::new(ts(from), ts(to)).unwrap()
    }

    #[test]
    fn window_rejects_inverted_bounds() {
        assert!(SettlementWindow::new(ts(10), ts(10)).is_err());
        assert!(SettlementWindow::new(ts(10), ts(5)).is_err());
    }

    #[test]
    fn window_span_is_bounded() {
        let w = SettlementWindow::new(ts(0), ts(0) + Duration::days(MAX_WINDOW_DAYS + 1)).unwrap();
        assert!(w.validate_span().is_err());
        assert!(window(0, 100).validate_span().is_ok());
    }

    #[test]
    fn net_is_share_minus_therapist_cash() {
        let lessons = vec![
            therapist_cash_lesson(1, 1200, 10),
            leader_lesson(2, 1200, 20),
            leader_lesson(3, 1200, 30),
        ];
        let totals = compute_settlement_window(&lessons, &window(0, 100), &flat(), ts(200));
        assert_eq!(totals.cash_therapist, Decimal::from(1200));
        assert_eq!(totals.therapist_share_sum, Decimal::from(1800));
        assert_eq!(totals.net, Decimal::from(600));
        assert_eq!(totals.lesson_ids, vec![1, 2, 3]);
    }

    #[test]
    fn window_is_half_open() {
        let lessons = vec![leader_lesson(1, 1000, 10), leader_lesson(2, 1000, 20)];
        let totals = compute_settlement_window(&lessons, &window(10, 20), &flat(), ts(200));
        assert_eq!(totals.lesson_ids, vec![1]);
    }

    #[test]
    fn computation_is_idempotent() {
        let lessons = vec![therapist_cash_lesson(1, 900, 10), leader_lesson(2, 700, 20)];
        let w = window(0, 100);
        let first = compute_settlement_window(&lessons, &w, &flat(), ts(200));
        let second = compute_settlement_window(&lessons, &w, &flat(), ts(200));
        assert_eq!(first, second);
    }

    #[test]
    fn share_sum_never_exceeds_prices() {
        let lessons = vec![
            therapist_cash_lesson(1, 999, 10),
            leader_lesson(2, 1333, 20),
            leader_lesson(3, 1, 30),
        ];
        let schedule = CommissionSchedule::flat(Decimal::from(100));
        let totals = compute_settlement_window(&lessons, &window(0, 100), &schedule, ts(200));
        let prices: Decimal = lessons.iter().map(full_price).sum();
        assert!(totals.therapist_share_sum <= prices);
        assert_eq!(totals.net, totals.therapist_share_sum - totals.cash_therapist);
    }

    #[test]
    fn fully_personal_lessons_contribute_nothing() {
        let mut personal = therapist_cash_lesson(1, 5000, 10);
        for e in &mut personal.entries {
            e.meta.personal = true;
        }
        let lessons = vec![personal, leader_lesson(2, 1000, 20)];
        let totals = compute_settlement_window(&lessons, &window(0, 100), &flat(), ts(200));
        assert_eq!(totals.lesson_ids, vec![2]);
        assert_eq!(totals.cash_therapist, Decimal::ZERO);

        let income = income_summary(&lessons, &window(0, 100), UnknownPayerPolicy::CountAsLeader);
        assert_eq!(income.total, Decimal::from(1000));
        assert_eq!(income.lesson_count, 1);
    }

    #[test]
    fn oversized_backlog_is_refused() {
        assert!(ensure_backlog_complete(7, 3, 3).is_ok());
        assert_matches!(ensure_backlog_complete(7, 4, 3), Err(CoreError::Validation(_)));
    }

    #[test]
    fn running_balance_drops_lessons_once_paid() {
        let mut facts = leader_lesson(1, 1200, 10);
        let lessons = vec![facts.clone()];
        let before = compute_settlement(&lessons, SettlementPeriod::Month, &flat(), ts(40));
        assert_eq!(before.net, Decimal::from(600));
        assert_eq!(before.lesson_ids, vec![1]);

        facts.payout_status = LessonPayoutStatus::Paid;
        facts.paid_at = Some(ts(50));
        let after = compute_settlement(&[facts], SettlementPeriod::Month, &flat(), ts(60));
        assert_eq!(after.net, Decimal::ZERO);
        assert!(after.lesson_ids.is_empty());
    }

    #[test]
    fn checkpoint_window_still_sees_the_lessons_it_paid() {
        // Closed at 100: paid_at equals the window end.
        let mut paid_here = leader_lesson(1, 1000, 10);
        paid_here.payout_status = LessonPayoutStatus::Paid;
        paid_here.paid_at = Some(ts(100));

        // Settled inside the window but paid by an earlier close at 50.
        let mut paid_earlier = leader_lesson(2, 1000, 20);
        paid_earlier.payout_status = LessonPayoutStatus::Paid;
        paid_earlier.paid_at = Some(ts(50));

        let totals =
            compute_settlement_window(&[paid_here, paid_earlier], &window(0, 100), &flat(), ts(200));
        assert_eq!(totals.lesson_ids, vec![1]);
    }

    #[test]
    fn zero_payout_window_replays_to_non_zero_net() {
        // A legacy PAYOUT of 0 closed [0, 100); the lessons inside were paid
        // before paid_at existed.
        let mut a = therapist_cash_lesson(1, 1200, 10);
        a.payout_status = LessonPayoutStatus::Paid;
        a.snapshot = ShareSnapshot::capture(Decimal::from(1200), Decimal::from(50));
        let mut b = leader_lesson(2, 1600, 20);
        b.payout_status = LessonPayoutStatus::Paid;

        let totals = compute_settlement_window(&[a, b], &window(0, 100), &flat(), ts(200));
        assert_eq!(totals.net, Decimal::from(200));
    }

    #[test]
    fn unsettled_lessons_are_never_included() {
        let mut facts = leader_lesson(1, 1000, 10);
        facts.settled_at = None;
        assert!(!included_in_window(&facts, &window(0, 100)));
    }

    #[test]
    fn income_unknown_policy_is_explicit() {
        let mut unknown = lesson(1, vec![entry(1, TransactionKind::Debt, 0, 0)]);
        unknown.child_rate = Some(Decimal::from(500));
        let lessons = vec![unknown, leader_lesson(2, 1000, 20), therapist_cash_lesson(3, 300, 30)];

        let counted = income_summary(&lessons, &window(0, 100), UnknownPayerPolicy::CountAsLeader);
        assert_eq!(counted.leader_income, Decimal::from(1500));
        assert_eq!(counted.therapist_cash, Decimal::from(300));
        assert_eq!(counted.unknown_lessons, 1);
        assert_eq!(counted.total, Decimal::from(1800));

        let excluded = income_summary(&lessons, &window(0, 100), UnknownPayerPolicy::Exclude);
        assert_eq!(excluded.leader_income, Decimal::from(1000));
        assert_eq!(excluded.unknown_income, Decimal::from(500));
        assert_eq!(excluded.total, Decimal::from(1800));
    }

    #[test]
    fn period_starts() {
        // 2024-03-01 is a Friday.
        let now = ts(0);
        assert_eq!(SettlementPeriod::Week.start(now).to_rfc3339(), "2024-02-26T00:00:00+00:00");
        assert_eq!(SettlementPeriod::Month.start(now).to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert_eq!(SettlementPeriod::HalfYear.start(now).to_rfc3339(), "2023-10-01T00:00:00+00:00");
        assert_eq!(SettlementPeriod::Year.start(now).to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn running_settlement_covers_current_period() {
        let lessons = vec![leader_lesson(1, 1000, 10), leader_lesson(2, 1000, 20)];
        let totals = compute_settlement(&lessons, SettlementPeriod::Month, &flat(), ts(200));
        assert_eq!(totals.lesson_count, 2);
        assert_eq!(totals.net, Decimal::from(1000));
    }
}
