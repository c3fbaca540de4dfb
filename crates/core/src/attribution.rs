//! Payment attribution: who received a lesson's money and what the lesson
//! nominally cost.
//!
//! Both resolvers are pure over a [`LessonFacts`] snapshot. Personal
//! entries never take part; a lesson whose entries are all personal is
//! reported by [`is_fully_personal`] and must be skipped by every
//! organizational aggregate.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::commission::ShareSnapshot;
use crate::ledger::{LedgerEntry, TransactionKind};
use crate::money::round_money;
use crate::status::LessonPayoutStatus;
use crate::types::{DbId, Money, Timestamp};

/// Side of the settlement that received the client's money.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payer {
    Leader,
    Therapist,
    /// No evidence either way. Each call site decides how to treat it.
    Unknown,
}

/// Everything the settlement logic needs to know about one lesson.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonFacts {
    pub lesson_id: DbId,
    pub therapist_id: DbId,
    pub branch_id: Option<DbId>,
    pub settled_at: Option<Timestamp>,
    pub payout_status: LessonPayoutStatus,
    pub paid_at: Option<Timestamp>,
    /// All ledger entries linked to the lesson, in any order.
    pub entries: Vec<LedgerEntry>,
    pub snapshot: ShareSnapshot,
    /// The child's configured per-lesson rate.
    pub child_rate: Option<Money>,
    /// Per-lesson price of the pass this lesson consumed, if any.
    pub pass_unit_price: Option<Money>,
}

impl LessonFacts {
    pub fn paid_by_pass(&self) -> bool {
        self.pass_unit_price.is_some()
    }

    pub fn is_paid(&self) -> bool {
        self.payout_status == LessonPayoutStatus::Paid
    }
}

/// Non-personal entries ordered oldest first (ties broken by id).
pub fn organizational_entries(facts: &LessonFacts) -> Vec<&LedgerEntry> {
    let mut entries: Vec<&LedgerEntry> =
        facts.entries.iter().filter(|e| !e.is_personal()).collect();
    entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    entries
}

/// True when the lesson has entries and every one of them is personal.
pub fn is_fully_personal(facts: &LessonFacts) -> bool {
    !facts.entries.is_empty() && facts.entries.iter().all(LedgerEntry::is_personal)
}

/// Resolve who received the money for a lesson.
///
/// Order, first match wins:
/// 1. the lesson consumed a pass: leader;
/// 2. the latest entry's payment method;
/// 3. any REVENUE entry: leader, else any CASH_HELD entry: therapist;
/// 4. unknown.
pub fn who_paid(facts: &LessonFacts) -> Payer {
    if facts.paid_by_pass() {
        return Payer::Leader;
    }

    let entries = organizational_entries(facts);

    if let Some(method) = entries.last().and_then(|e| e.meta.payment_method) {
        return method.payer();
    }

    if entries.iter().any(|e| e.kind == TransactionKind::Revenue) {
        Payer::Leader
    } else if entries.iter().any(|e| e.kind == TransactionKind::CashHeld) {
        Payer::Therapist
    } else {
        Payer::Unknown
    }
}

/// Resolve the lesson's nominal (client-facing) price.
///
/// Fallback order: explicit `nominalPrice` > REVENUE amount > reconstruction
/// from the leader share snapshot > sum of stored shares > pass unit price >
/// child's lesson rate > zero.
pub fn full_price(facts: &LessonFacts) -> Money {
    let entries = organizational_entries(facts);

    if let Some(nominal) = entries
        .iter()
        .rev()
        .filter_map(|e| e.meta.nominal_price)
        .find(|p| *p > Decimal::ZERO)
    {
        return round_money(nominal);
    }

    if let Some(revenue) = entries
        .iter()
        .rev()
        .find(|e| e.kind == TransactionKind::Revenue && !e.amount.is_zero())
    {
        return round_money(revenue.amount.abs());
    }

    if let Some(reconstructed) = facts.snapshot.reconstruct_price() {
        return reconstructed;
    }

    let stored = facts.snapshot.stored_total();
    if stored > Decimal::ZERO {
        return round_money(stored);
    }

    if let Some(unit) = facts.pass_unit_price.filter(|p| *p > Decimal::ZERO) {
        return round_money(unit);
    }

    facts
        .child_rate
        .filter(|r| *r > Decimal::ZERO)
        .map(round_money)
        .unwrap_or(Decimal::ZERO)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ledger::{PaymentMethod, TransactionMeta};
    use chrono::{Duration, TimeZone, Utc};

    pub(crate) fn ts(minute: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap() + Duration::minutes(minute)
    }

    pub(crate) fn entry(id: DbId, kind: TransactionKind, amount: i64, minute: i64) -> LedgerEntry {
        LedgerEntry {
            id,
            kind,
            amount: Decimal::from(amount),
            created_at: ts(minute),
            meta: TransactionMeta::default(),
        }
    }

    pub(crate) fn lesson(id: DbId, entries: Vec<LedgerEntry>) -> LessonFacts {
        LessonFacts {
            lesson_id: id,
            therapist_id: 7,
            branch_id: Some(1),
            settled_at: Some(ts(60)),
            payout_status: LessonPayoutStatus::None,
            paid_at: None,
            entries,
            snapshot: ShareSnapshot::default(),
            child_rate: None,
            pass_unit_price: None,
        }
    }

    fn with_method(mut e: LedgerEntry, method: &str) -> LedgerEntry {
        e.meta.payment_method = PaymentMethod::from_legacy(method);
        e
    }

    #[test]
    fn therapist_cash_marker_on_zero_amount_entry() {
        let mut facts = lesson(
            1,
            vec![with_method(entry(1, TransactionKind::CashHeld, 0, 0), "cash_therapist")],
        );
        facts.child_rate = Some(Decimal::from(1200));
        facts.snapshot.commission_percent = Some(Decimal::from(50));

        assert_eq!(who_paid(&facts), Payer::Therapist);
        assert_eq!(full_price(&facts), Decimal::from(1200));
    }

    #[test]
    fn latest_entry_method_beats_revenue_presence() {
        let facts = lesson(
            1,
            vec![
                entry(1, TransactionKind::Revenue, 1200, 0),
                with_method(entry(2, TransactionKind::CashHeld, 0, 5), "cash_therapist"),
            ],
        );
        assert_eq!(who_paid(&facts), Payer::Therapist);
        assert_eq!(full_price(&facts), Decimal::from(1200));
    }

    #[test]
    fn only_the_latest_method_counts() {
        let facts = lesson(
            1,
            vec![
                with_method(entry(1, TransactionKind::CashHeld, 0, 0), "cash_therapist"),
                entry(2, TransactionKind::Revenue, 900, 5),
            ],
        );
        // Latest entry has no method, so kind presence decides.
        assert_eq!(who_paid(&facts), Payer::Leader);
    }

    #[test]
    fn kind_presence_fallbacks() {
        let revenue = lesson(1, vec![entry(1, TransactionKind::Revenue, 800, 0)]);
        assert_eq!(who_paid(&revenue), Payer::Leader);

        let cash = lesson(2, vec![entry(1, TransactionKind::CashHeld, 800, 0)]);
        assert_eq!(who_paid(&cash), Payer::Therapist);

        let debt = lesson(3, vec![entry(1, TransactionKind::Debt, -100, 0)]);
        assert_eq!(who_paid(&debt), Payer::Unknown);

        assert_eq!(who_paid(&lesson(4, vec![])), Payer::Unknown);
    }

    #[test]
    fn pass_usage_attributes_to_leader() {
        let mut facts = lesson(
            1,
            vec![with_method(entry(1, TransactionKind::CashHeld, 0, 0), "cash_therapist")],
        );
        facts.pass_unit_price = Some(Decimal::from(1000));
        assert_eq!(who_paid(&facts), Payer::Leader);
        assert_eq!(full_price(&facts), Decimal::from(1000));
    }

    #[test]
    fn personal_entries_are_ignored() {
        let mut personal = with_method(entry(2, TransactionKind::CashHeld, 0, 10), "cash_therapist");
        personal.meta.personal = true;
        let facts = lesson(1, vec![entry(1, TransactionKind::Revenue, 700, 0), personal]);

        assert!(!is_fully_personal(&facts));
        assert_eq!(who_paid(&facts), Payer::Leader);
        assert_eq!(full_price(&facts), Decimal::from(700));
    }

    #[test]
    fn fully_personal_detection() {
        let mut a = entry(1, TransactionKind::CashHeld, 500, 0);
        a.meta.personal = true;
        let mut b = entry(2, TransactionKind::Revenue, 500, 1);
        b.meta.personal = true;
        assert!(is_fully_personal(&lesson(1, vec![a, b])));
        assert!(!is_fully_personal(&lesson(2, vec![])));
    }

    #[test]
    fn explicit_nominal_price_wins() {
        let mut e = entry(1, TransactionKind::Revenue, 600, 0);
        e.meta.nominal_price = Some(Decimal::from(1500));
        assert_eq!(full_price(&lesson(1, vec![e])), Decimal::from(1500));
    }

    #[test]
    fn price_reconstructed_from_leader_share() {
        let mut facts = lesson(1, vec![]);
        facts.snapshot = ShareSnapshot {
            commission_percent: Some(Decimal::from(40)),
            therapist_share: None,
            leader_share: Some(Decimal::from(720)),
        };
        facts.child_rate = Some(Decimal::from(5));
        assert_eq!(full_price(&facts), Decimal::from(1200));
    }

    #[test]
    fn price_from_stored_shares_then_child_rate() {
        let mut facts = lesson(1, vec![]);
        facts.snapshot = ShareSnapshot {
            commission_percent: Some(Decimal::from(100)),
            therapist_share: Some(Decimal::from(900)),
            leader_share: Some(Decimal::ZERO),
        };
        assert_eq!(full_price(&facts), Decimal::from(900));

        let mut bare = lesson(2, vec![]);
        assert_eq!(full_price(&bare), Decimal::ZERO);
        bare.child_rate = Some(Decimal::from(1100));
        assert_eq!(full_price(&bare), Decimal::from(1100));
    }
}
