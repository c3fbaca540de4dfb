//! Seeding helpers shared by the repository integration tests.

#![allow(dead_code)]

use chrono::{Duration, DurationRound, Utc};
use ledger_core::ledger::{PaymentMethod, TransactionKind};
use ledger_core::types::{DbId, Money, Timestamp};
use ledger_db::models::lesson::{CreateLesson, Lesson};
use ledger_db::models::org::{CreateBranch, CreateChild, CreateCompany, CreateUser};
use ledger_db::models::transaction::CreateTransaction;
use ledger_db::repositories::{LessonRepo, OrgRepo, TransactionRepo};
use rust_decimal::Decimal;
use sqlx::PgPool;

pub const DEFAULT_PERCENT: i64 = 50;

pub fn default_percent() -> Decimal {
    Decimal::from(DEFAULT_PERCENT)
}

/// Fixed reference instant ten days in the past, truncated to the hour.
pub fn base() -> Timestamp {
    (Utc::now() - Duration::days(10))
        .duration_trunc(Duration::hours(1))
        .unwrap()
}

pub fn at(base: Timestamp, minutes: i64) -> Timestamp {
    base + Duration::minutes(minutes)
}

pub struct Org {
    pub company_id: DbId,
    pub branch_id: DbId,
    pub other_branch_id: DbId,
    pub owner_id: DbId,
    pub manager_id: DbId,
    pub therapist_id: DbId,
    pub accountant_id: DbId,
    pub child_id: DbId,
}

pub async fn seed_org(pool: &PgPool) -> Org {
    let company = OrgRepo::create_company(pool, &CreateCompany { name: "Speech Studio".into() })
        .await
        .unwrap();
    let branch = OrgRepo::create_branch(
        pool,
        &CreateBranch { company_id: company.id, name: "Central".into() },
    )
    .await
    .unwrap();
    let other = OrgRepo::create_branch(
        pool,
        &CreateBranch { company_id: company.id, name: "North".into() },
    )
    .await
    .unwrap();

    let user = |name: &str, role: &str, branch_id: Option<DbId>| CreateUser {
        name: name.into(),
        role: role.into(),
        branch_id,
    };
    let owner = OrgRepo::create_user(pool, &user("Olga", "owner", None)).await.unwrap();
    let manager = OrgRepo::create_user(pool, &user("Maria", "manager", Some(branch.id)))
        .await
        .unwrap();
    let therapist = OrgRepo::create_user(pool, &user("Tanya", "therapist", Some(branch.id)))
        .await
        .unwrap();
    let accountant = OrgRepo::create_user(pool, &user("Anna", "accountant", None))
        .await
        .unwrap();
    OrgRepo::set_company_owner(pool, company.id, owner.id).await.unwrap();
    OrgRepo::set_branch_manager(pool, branch.id, manager.id).await.unwrap();

    let child = OrgRepo::create_child(
        pool,
        &CreateChild {
            name: "Kid".into(),
            branch_id: Some(branch.id),
            lesson_rate: Some(Decimal::from(600)),
        },
    )
    .await
    .unwrap();

    Org {
        company_id: company.id,
        branch_id: branch.id,
        other_branch_id: other.id,
        owner_id: owner.id,
        manager_id: manager.id,
        therapist_id: therapist.id,
        accountant_id: accountant.id,
        child_id: child.id,
    }
}

/// Insert a lesson for the org's therapist starting at `starts_at`.
pub async fn lesson(pool: &PgPool, org: &Org, starts_at: Timestamp) -> Lesson {
    LessonRepo::create(
        pool,
        &CreateLesson {
            starts_at,
            ends_at: starts_at + Duration::minutes(45),
            therapist_id: org.therapist_id,
            branch_id: Some(org.branch_id),
            child_id: Some(org.child_id),
        },
    )
    .await
    .unwrap()
}

/// Record a payment entry for a lesson.
pub async fn pay(
    pool: &PgPool,
    org: &Org,
    lesson_id: DbId,
    kind: TransactionKind,
    amount: i64,
    method: PaymentMethod,
) {
    let mut input = CreateTransaction::new(kind, Money::from(amount));
    input.lesson_id = Some(lesson_id);
    input.user_id = Some(org.therapist_id);
    input.branch_id = Some(org.branch_id);
    input.company_id = Some(org.company_id);
    input.payment_method = Some(method);
    TransactionRepo::create(pool, &input).await.unwrap();
}

/// Lesson paid in cash to the therapist; priced by the child's rate.
pub async fn therapist_cash_lesson(pool: &PgPool, org: &Org, starts_at: Timestamp) -> Lesson {
    let l = lesson(pool, org, starts_at).await;
    pay(pool, org, l.id, TransactionKind::CashHeld, 0, PaymentMethod::TherapistCash).await;
    l
}

/// Lesson paid to the leader with a REVENUE entry of `amount`.
pub async fn leader_lesson(pool: &PgPool, org: &Org, starts_at: Timestamp, amount: i64) -> Lesson {
    let l = lesson(pool, org, starts_at).await;
    pay(pool, org, l.id, TransactionKind::Revenue, amount, PaymentMethod::BankTransfer).await;
    l
}

pub async fn settle(pool: &PgPool, lesson_id: DbId, settled_at: Timestamp) -> Lesson {
    LessonRepo::settle(pool, lesson_id, default_percent(), settled_at)
        .await
        .unwrap()
}

pub async fn payout_count(pool: &PgPool, therapist_id: DbId) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM transactions WHERE kind = 'payout' AND user_id = $1",
    )
    .bind(therapist_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn paid_lesson_count(pool: &PgPool, therapist_id: DbId) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM lessons WHERE therapist_id = $1 AND payout_status_id = 2",
    )
    .bind(therapist_id)
    .fetch_one(pool)
    .await
    .unwrap()
}
