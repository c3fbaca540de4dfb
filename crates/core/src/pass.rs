//! Prepaid lesson passes.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::CoreError;
use crate::money::round_money;
use crate::status::PassStatus;
use crate::types::{Money, Timestamp};

/// Largest bundle a pass may hold.
pub const MAX_PASS_LESSONS: i32 = 200;

/// Per-lesson price of a pass, `total_price / total_lessons`.
pub fn unit_price(total_price: Money, total_lessons: i32) -> Option<Money> {
    if total_lessons <= 0 {
        return None;
    }
    Some(round_money(total_price / Decimal::from(total_lessons)))
}

pub fn validate_new_pass(total_lessons: i32, total_price: Money) -> Result<(), CoreError> {
    if !(1..=MAX_PASS_LESSONS).contains(&total_lessons) {
        return Err(CoreError::Validation(format!(
            "A pass must hold between 1 and {MAX_PASS_LESSONS} lessons"
        )));
    }
    if total_price < Decimal::ZERO {
        return Err(CoreError::Validation("Pass price must not be negative".into()));
    }
    Ok(())
}

/// Check that one more lesson can be taken from the pass at `at`.
pub fn ensure_consumable(
    status: PassStatus,
    remaining_lessons: i32,
    valid_until: Option<Timestamp>,
    at: Timestamp,
) -> Result<(), CoreError> {
    if status != PassStatus::Active {
        return Err(CoreError::Conflict("Pass is not active".into()));
    }
    if valid_until.is_some_and(|until| until < at) {
        return Err(CoreError::Conflict("Pass has expired".into()));
    }
    if remaining_lessons <= 0 {
        return Err(CoreError::Conflict("Pass has no lessons left".into()));
    }
    Ok(())
}

/// Closing is only allowed once every lesson is used.
pub fn ensure_closable(status: PassStatus, remaining_lessons: i32) -> Result<(), CoreError> {
    if status != PassStatus::Active {
        return Err(CoreError::Conflict("Pass is not active".into()));
    }
    if remaining_lessons != 0 {
        return Err(CoreError::Validation(format!(
            "Pass still has {remaining_lessons} lessons; refund it instead"
        )));
    }
    Ok(())
}

/// What refunding a pass writes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefundPlan {
    /// Positive amount returned to the client. The REVENUE correction is
    /// written as its negation.
    pub amount: Money,
    pub status: PassStatus,
}

/// Refund the unused remainder of an active pass.
///
/// An untouched pass ends REFUNDED; a partly used one ends CANCELLED.
pub fn plan_refund(
    status: PassStatus,
    total_lessons: i32,
    remaining_lessons: i32,
    total_price: Money,
) -> Result<RefundPlan, CoreError> {
    if status != PassStatus::Active {
        return Err(CoreError::Conflict("Pass is not active".into()));
    }
    if remaining_lessons <= 0 {
        return Err(CoreError::Validation("Nothing left on the pass to refund".into()));
    }
    let amount = if remaining_lessons == total_lessons {
        round_money(total_price)
    } else {
        let unit = unit_price(total_price, total_lessons).unwrap_or_default();
        round_money(unit * Decimal::from(remaining_lessons))
    };
    let status = if remaining_lessons == total_lessons {
        PassStatus::Refunded
    } else {
        PassStatus::Cancelled
    };
    Ok(RefundPlan { amount, status })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};

    fn at(day: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn unit_price_divides_and_rounds() {
        assert_eq!(unit_price(Decimal::from(10000), 8), Some(Decimal::from(1250)));
        assert_eq!(unit_price(Decimal::from(1000), 3), Some(Decimal::new(33333, 2)));
        assert_eq!(unit_price(Decimal::from(1000), 0), None);
    }

    #[test]
    fn new_pass_bounds() {
        assert!(validate_new_pass(8, Decimal::from(8000)).is_ok());
        assert!(validate_new_pass(0, Decimal::from(8000)).is_err());
        assert!(validate_new_pass(8, Decimal::from(-1)).is_err());
    }

    #[test]
    fn consumption_guards() {
        assert!(ensure_consumable(PassStatus::Active, 1, Some(at(10)), at(5)).is_ok());
        assert_matches!(
            ensure_consumable(PassStatus::Active, 1, Some(at(4)), at(5)),
            Err(CoreError::Conflict(_))
        );
        assert_matches!(
            ensure_consumable(PassStatus::Active, 0, None, at(5)),
            Err(CoreError::Conflict(_))
        );
        assert_matches!(
            ensure_consumable(PassStatus::Cancelled, 3, None, at(5)),
            Err(CoreError::Conflict(_))
        );
    }

    #[test]
    fn close_requires_zero_remaining() {
        assert!(ensure_closable(PassStatus::Active, 0).is_ok());
        assert_matches!(ensure_closable(PassStatus::Active, 2), Err(CoreError::Validation(_)));
    }

    #[test]
    fn untouched_pass_refunds_in_full() {
        let plan = plan_refund(PassStatus::Active, 3, 3, Decimal::from(1000)).unwrap();
        assert_eq!(plan.amount, Decimal::from(1000));
        assert_eq!(plan.status, PassStatus::Refunded);
    }

    #[test]
    fn partly_used_pass_refunds_remainder() {
        let plan = plan_refund(PassStatus::Active, 8, 3, Decimal::from(10000)).unwrap();
        assert_eq!(plan.amount, Decimal::from(3750));
        assert_eq!(plan.status, PassStatus::Cancelled);
    }

    #[test]
    fn refund_rejects_closed_or_empty_pass() {
        assert_matches!(
            plan_refund(PassStatus::Refunded, 3, 3, Decimal::from(1000)),
            Err(CoreError::Conflict(_))
        );
        assert_matches!(
            plan_refund(PassStatus::Active, 3, 0, Decimal::from(1000)),
            Err(CoreError::Validation(_))
        );
    }
}
