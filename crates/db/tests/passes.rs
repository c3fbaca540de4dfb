//! Integration tests for prepaid passes.

mod common;

use assert_matches::assert_matches;
use chrono::Duration;
use common::*;
use ledger_core::attribution::{full_price, who_paid, Payer};
use ledger_core::error::CoreError;
use ledger_core::ledger::{PaymentMethod, TransactionKind};
use ledger_core::status::PassStatus;
use ledger_core::types::Timestamp;
use ledger_db::models::pass::{CreatePass, Pass};
use ledger_db::repositories::{LessonFactsRepo, PassRepo, TransactionRepo};
use ledger_db::LedgerDbError;
use rust_decimal::Decimal;
use sqlx::PgPool;

async fn issue(pool: &PgPool, org: &Org, lessons: i32, price: i64, valid_until: Option<Timestamp>) -> Pass {
    PassRepo::issue(
        pool,
        &CreatePass {
            child_id: org.child_id,
            branch_id: Some(org.branch_id),
            total_lessons: lessons,
            total_price: Decimal::from(price),
            valid_until,
            payment_method: Some(PaymentMethod::Card),
        },
    )
    .await
    .unwrap()
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_issue_records_sale(pool: PgPool) {
    let org = seed_org(&pool).await;
    let pass = issue(&pool, &org, 4, 2000, None).await;
    assert_eq!(pass.remaining_lessons, 4);
    assert_eq!(pass.status(), Some(PassStatus::Active));
    assert_eq!(pass.unit_price(), Some(Decimal::from(500)));

    let sale: (String, Decimal) = sqlx::query_as(
        "SELECT kind, amount FROM transactions WHERE branch_id = $1 AND lesson_id IS NULL",
    )
    .bind(org.branch_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(sale, (TransactionKind::Revenue.as_str().to_string(), Decimal::from(2000)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_issue_rejects_empty_pass(pool: PgPool) {
    let org = seed_org(&pool).await;
    let err = PassRepo::issue(
        &pool,
        &CreatePass {
            child_id: org.child_id,
            branch_id: None,
            total_lessons: 0,
            total_price: Decimal::from(100),
            valid_until: None,
            payment_method: None,
        },
    )
    .await
    .unwrap_err();
    assert_matches!(err, LedgerDbError::Core(CoreError::Validation(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_consumed_lesson_is_attributed_to_leader_at_unit_price(pool: PgPool) {
    let org = seed_org(&pool).await;
    let b = base();
    let pass = issue(&pool, &org, 4, 2000, None).await;
    let l = lesson(&pool, &org, at(b, 0)).await;

    let usage = PassRepo::consume(&pool, pass.id, l.id, at(b, 30)).await.unwrap();
    assert_eq!(usage.lesson_id, l.id);
    let pass = PassRepo::find_by_id(&pool, pass.id).await.unwrap().unwrap();
    assert_eq!(pass.remaining_lessons, 3);

    let mut conn = pool.acquire().await.unwrap();
    let facts = LessonFactsRepo::for_lesson(&mut conn, l.id).await.unwrap().unwrap();
    assert_eq!(who_paid(&facts), Payer::Leader);
    assert_eq!(full_price(&facts), Decimal::from(500));

    let settled = settle(&pool, l.id, at(b, 60)).await;
    assert_eq!(settled.therapist_share_at_time, Some(Decimal::from(250)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_lesson_consumes_at_most_one_pass(pool: PgPool) {
    let org = seed_org(&pool).await;
    let b = base();
    let pass = issue(&pool, &org, 4, 2000, None).await;
    let l = lesson(&pool, &org, at(b, 0)).await;
    PassRepo::consume(&pool, pass.id, l.id, at(b, 30)).await.unwrap();

    let err = PassRepo::consume(&pool, pass.id, l.id, at(b, 31)).await.unwrap_err();
    assert_matches!(err, LedgerDbError::Database(_));
    let pass = PassRepo::find_by_id(&pool, pass.id).await.unwrap().unwrap();
    assert_eq!(pass.remaining_lessons, 3);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_expired_pass_cannot_be_consumed(pool: PgPool) {
    let org = seed_org(&pool).await;
    let b = base();
    let pass = issue(&pool, &org, 4, 2000, Some(at(b, 0))).await;
    let l = lesson(&pool, &org, at(b, 60)).await;

    let err = PassRepo::consume(&pool, pass.id, l.id, at(b, 60)).await.unwrap_err();
    assert_matches!(err, LedgerDbError::Core(CoreError::Conflict(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_close_requires_all_lessons_used(pool: PgPool) {
    let org = seed_org(&pool).await;
    let b = base();
    let pass = issue(&pool, &org, 1, 500, None).await;

    let err = PassRepo::close(&pool, pass.id).await.unwrap_err();
    assert_matches!(err, LedgerDbError::Core(CoreError::Validation(_)));

    let l = lesson(&pool, &org, at(b, 0)).await;
    PassRepo::consume(&pool, pass.id, l.id, at(b, 30)).await.unwrap();
    let closed = PassRepo::close(&pool, pass.id).await.unwrap();
    assert_eq!(closed.status(), Some(PassStatus::Cancelled));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_refund_of_partly_used_pass(pool: PgPool) {
    let org = seed_org(&pool).await;
    let b = base();
    let pass = issue(&pool, &org, 4, 2000, None).await;
    let l = lesson(&pool, &org, at(b, 0)).await;
    PassRepo::consume(&pool, pass.id, l.id, at(b, 30)).await.unwrap();

    let refund = PassRepo::refund(&pool, pass.id, org.owner_id).await.unwrap();
    assert_eq!(refund.pass.status(), Some(PassStatus::Cancelled));
    assert_eq!(refund.pass.remaining_lessons, 0);
    assert_eq!(refund.correction.amount, Decimal::from(-1500));
    assert_eq!(refund.correction.kind(), Some(TransactionKind::Revenue));

    let stored = TransactionRepo::find_by_id(&pool, refund.correction.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.parsed_meta().payment_method, Some(PaymentMethod::Subscription));

    let err = PassRepo::refund(&pool, pass.id, org.owner_id).await.unwrap_err();
    assert_matches!(err, LedgerDbError::Core(CoreError::Conflict(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_refund_of_untouched_pass_is_full(pool: PgPool) {
    let org = seed_org(&pool).await;
    let pass = issue(&pool, &org, 3, 1000, Some(base() + Duration::days(30))).await;

    let refund = PassRepo::refund(&pool, pass.id, org.owner_id).await.unwrap();
    assert_eq!(refund.pass.status(), Some(PassStatus::Refunded));
    assert_eq!(refund.correction.amount, Decimal::from(-1000));
}
