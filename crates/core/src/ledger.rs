//! Ledger entry kinds, payment methods, and transaction metadata.
//!
//! Transactions are append-only. New entries carry a typed [`PaymentMethod`]
//! written by the originating flow; rows written before that existed carry a
//! free-form `paymentMethod` string that only [`PaymentMethod::from_legacy`]
//! interprets.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::attribution::Payer;
use crate::error::CoreError;
use crate::types::{DbId, Money, Timestamp};

/// Page size cap for ledger listings.
pub const MAX_TRANSACTIONS_PER_PAGE: i64 = 500;

// ---------------------------------------------------------------------------
// Transaction kind
// ---------------------------------------------------------------------------

/// Kind of ledger entry. Stored as lowercase TEXT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Money received by the organization (leader side).
    Revenue,
    /// Cash taken by the therapist directly from the client.
    CashHeld,
    /// Adjustment to the therapist's running balance.
    TherapistBalance,
    /// Settlement paid out to (or collected from) the therapist.
    Payout,
    /// Corrective debt entry.
    Debt,
}

/// All kinds, in the order accepted by the `transactions.kind` CHECK.
pub const ALL_KINDS: [TransactionKind; 5] = [
    TransactionKind::Revenue,
    TransactionKind::CashHeld,
    TransactionKind::TherapistBalance,
    TransactionKind::Payout,
    TransactionKind::Debt,
];

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::CashHeld => "cash_held",
            Self::TherapistBalance => "therapist_balance",
            Self::Payout => "payout",
            Self::Debt => "debt",
        }
    }

    /// Parse a stored kind. Accepts the legacy upper-case spelling too.
    pub fn parse(value: &str) -> Option<Self> {
        let lower = value.trim().to_ascii_lowercase();
        ALL_KINDS.into_iter().find(|k| k.as_str() == lower)
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Payment method
// ---------------------------------------------------------------------------

/// How the client paid for a lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash handed to the therapist.
    TherapistCash,
    /// Cash handed to the leader / front desk.
    LeaderCash,
    BankTransfer,
    Card,
    /// Paid from a prepaid pass.
    Subscription,
}

/// Substrings of legacy `paymentMethod` values meaning "therapist kept the cash".
const LEGACY_THERAPIST_MARKERS: &[&str] = &["therapist", "logoped", "specialist"];

/// Substrings of legacy `paymentMethod` values meaning "the leader got the money".
const LEGACY_LEADER_MARKERS: &[&str] = &[
    "leader", "bank", "transfer", "card", "subscription", "pass", "organization",
];

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TherapistCash => "therapist_cash",
            Self::LeaderCash => "leader_cash",
            Self::BankTransfer => "bank_transfer",
            Self::Card => "card",
            Self::Subscription => "subscription",
        }
    }

    /// Which side of the settlement received the money.
    pub fn payer(self) -> Payer {
        match self {
            Self::TherapistCash => Payer::Therapist,
            Self::LeaderCash | Self::BankTransfer | Self::Card | Self::Subscription => {
                Payer::Leader
            }
        }
    }

    /// Interpret a stored `paymentMethod` string.
    ///
    /// Exact typed tags are matched first. Anything else goes through the
    /// marker heuristic used for untyped historical rows; therapist markers
    /// take precedence so `"cash_therapist"` never reads as leader cash.
    pub fn from_legacy(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_ascii_lowercase();
        if lower.is_empty() {
            return None;
        }
        if let Some(exact) = [
            Self::TherapistCash,
            Self::LeaderCash,
            Self::BankTransfer,
            Self::Card,
            Self::Subscription,
        ]
        .into_iter()
        .find(|m| m.as_str() == lower)
        {
            return Some(exact);
        }

        if LEGACY_THERAPIST_MARKERS.iter().any(|m| lower.contains(m)) {
            return Some(Self::TherapistCash);
        }
        if lower.contains("subscription") || lower.contains("pass") {
            return Some(Self::Subscription);
        }
        if lower.contains("bank") || lower.contains("transfer") {
            return Some(Self::BankTransfer);
        }
        if lower.contains("card") {
            return Some(Self::Card);
        }
        if LEGACY_LEADER_MARKERS.iter().any(|m| lower.contains(m)) {
            return Some(Self::LeaderCash);
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Parsed view of the `transactions.meta` JSON column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionMeta {
    pub payment_method: Option<PaymentMethod>,
    pub nominal_price: Option<Money>,
    /// Private payment outside the organizational ledger.
    pub personal: bool,
}

impl TransactionMeta {
    pub const KEY_PAYMENT_METHOD: &'static str = "paymentMethod";
    pub const KEY_NOMINAL_PRICE: &'static str = "nominalPrice";
    pub const KEY_PERSONAL: &'static str = "personal";

    /// Parse stored metadata. Tolerates legacy shapes: numbers or strings
    /// for `nominalPrice`, `"true"` for `personal`, free-form methods.
    pub fn from_json(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        let payment_method = obj
            .get(Self::KEY_PAYMENT_METHOD)
            .and_then(Value::as_str)
            .and_then(PaymentMethod::from_legacy);

        let nominal_price = obj.get(Self::KEY_NOMINAL_PRICE).and_then(parse_decimal);

        let personal = match obj.get(Self::KEY_PERSONAL) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        };

        Self {
            payment_method,
            nominal_price,
            personal,
        }
    }

    /// Serialize for storage. Only set keys are written.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        if let Some(method) = self.payment_method {
            obj.insert(Self::KEY_PAYMENT_METHOD.into(), Value::String(method.as_str().into()));
        }
        if let Some(price) = self.nominal_price {
            obj.insert(Self::KEY_NOMINAL_PRICE.into(), Value::String(price.to_string()));
        }
        if self.personal {
            obj.insert(Self::KEY_PERSONAL.into(), Value::Bool(true));
        }
        Value::Object(obj)
    }
}

fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else {
                n.as_f64().and_then(|f| Decimal::try_from(f).ok())
            }
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Ledger entry
// ---------------------------------------------------------------------------

/// A settled lesson only takes corrective entries. Naming a payment method
/// would change who paid after the shares were frozen.
pub fn ensure_lesson_entry_allowed(
    lesson_id: DbId,
    settled: bool,
    payment_method: Option<PaymentMethod>,
) -> Result<(), CoreError> {
    if settled && payment_method.is_some() {
        return Err(CoreError::Conflict(format!(
            "Lesson {lesson_id} is already settled; its payment method cannot change"
        )));
    }
    Ok(())
}


/// A transaction as seen by the pure settlement logic.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub id: DbId,
    pub kind: TransactionKind,
    pub amount: Money,
    pub created_at: Timestamp,
    pub meta: TransactionMeta,
}

impl LedgerEntry {
    pub fn is_personal(&self) -> bool {
        self.meta.personal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn kind_parses_legacy_upper_case() {
        assert_eq!(TransactionKind::parse("CASH_HELD"), Some(TransactionKind::CashHeld));
        assert_eq!(TransactionKind::parse("payout"), Some(TransactionKind::Payout));
        assert_eq!(TransactionKind::parse("REFUND"), None);
    }

    #[test]
    fn legacy_therapist_cash_marker() {
        assert_eq!(
            PaymentMethod::from_legacy("cash_therapist"),
            Some(PaymentMethod::TherapistCash)
        );
        assert_eq!(
            PaymentMethod::from_legacy("Cash (logoped)"),
            Some(PaymentMethod::TherapistCash)
        );
    }

    #[test]
    fn legacy_leader_markers() {
        assert_eq!(PaymentMethod::from_legacy("cash_leader"), Some(PaymentMethod::LeaderCash));
        assert_eq!(PaymentMethod::from_legacy("BANK"), Some(PaymentMethod::BankTransfer));
        assert_eq!(PaymentMethod::from_legacy("pass"), Some(PaymentMethod::Subscription));
        assert_eq!(PaymentMethod::from_legacy("online card"), Some(PaymentMethod::Card));
    }

    #[test]
    fn unrecognised_method_is_none() {
        assert_eq!(PaymentMethod::from_legacy("cash"), None);
        assert_eq!(PaymentMethod::from_legacy("   "), None);
    }

    #[test]
    fn meta_tolerates_legacy_shapes() {
        let meta = TransactionMeta::from_json(&json!({
            "paymentMethod": "cash_therapist",
            "nominalPrice": 1200,
            "personal": "true",
        }));
        assert_eq!(meta.payment_method, Some(PaymentMethod::TherapistCash));
        assert_eq!(meta.nominal_price, Some(Decimal::from(1200)));
        assert!(meta.personal);
    }

    #[test]
    fn meta_from_non_object_is_default() {
        assert_eq!(TransactionMeta::from_json(&Value::Null), TransactionMeta::default());
    }

    #[test]
    fn settled_lesson_rejects_a_new_payment_method() {
        assert!(ensure_lesson_entry_allowed(1, false, Some(PaymentMethod::Card)).is_ok());
        assert!(ensure_lesson_entry_allowed(1, true, None).is_ok());
        assert_matches!(
            ensure_lesson_entry_allowed(1, true, Some(PaymentMethod::BankTransfer)),
            Err(CoreError::Conflict(_))
        );
    }

    #[test]
    fn typed_meta_survives_storage() {
        let meta = TransactionMeta {
            payment_method: Some(PaymentMethod::BankTransfer),
            nominal_price: Some(Decimal::new(150050, 2)),
            personal: false,
        };
        let stored = meta.to_json();
        assert!(stored.get("personal").is_none());
        assert_eq!(TransactionMeta::from_json(&stored), meta);
    }
}
