//! Caller scope enforcement across read and write endpoints.

mod common;

use axum::http::StatusCode;
use common::{at, base, body_json, decimal, get_auth, query_ts, token_for, Org};
use ledger_db::models::org::CreateUser;
use ledger_db::repositories::OrgRepo;
use rust_decimal::Decimal;
use sqlx::PgPool;

async fn seed(pool: &PgPool) -> Org {
    let org = common::seed_org(pool).await;
    let b = base();
    common::settled_leader_lesson(pool, &org, at(b, 0), 1200, at(b, 60)).await;
    common::settled_leader_lesson(pool, &org, at(b, 60), 600, at(b, 120)).await;
    org
}

fn window_query() -> String {
    let b = base();
    format!(
        "from={}&to={}",
        query_ts(b - chrono::Duration::days(1)),
        query_ts(b + chrono::Duration::days(1))
    )
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn own_manager_and_owner_see_therapist_settlement(pool: PgPool) {
    let org = seed(&pool).await;
    let app = common::build_test_app(pool);
    let uri = format!(
        "/api/v1/therapists/{}/settlement/window?{}",
        org.therapist_id,
        window_query()
    );

    for caller in [org.manager(), org.owner(), org.accountant(), org.therapist()] {
        let response = get_auth(app.clone(), &uri, &token_for(&caller)).await;
        assert_eq!(response.status(), StatusCode::OK, "{:?} should see the therapist", caller.role);
        let json = body_json(response).await;
        assert_eq!(decimal(&json["data"]["totals"]["therapist_share_sum"]), Decimal::from(900));
        assert_eq!(json["data"]["totals"]["lesson_count"], 2);
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn manager_of_other_branch_gets_scope_violation(pool: PgPool) {
    let org = seed(&pool).await;
    let app = common::build_test_app(pool);
    let token = token_for(&org.other_manager());

    let settlement = get_auth(
        app.clone(),
        &format!("/api/v1/therapists/{}/settlement", org.therapist_id),
        &token,
    )
    .await;
    assert_eq!(settlement.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(settlement).await["code"], "SCOPE_VIOLATION");

    let income = get_auth(
        app,
        &format!("/api/v1/branches/{}/income?{}", org.branch_id, window_query()),
        &token,
    )
    .await;
    assert_eq!(income.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(income).await["code"], "SCOPE_VIOLATION");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn therapist_cannot_read_a_colleague(pool: PgPool) {
    let org = seed(&pool).await;
    let colleague = OrgRepo::create_user(
        &pool,
        &CreateUser {
            name: "Vera".into(),
            role: "therapist".into(),
            branch_id: Some(org.branch_id),
        },
    )
    .await
    .unwrap();
    let app = common::build_test_app(pool);

    let response = get_auth(
        app,
        &format!("/api/v1/therapists/{}/eligible", colleague.id),
        &token_for(&org.therapist()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "SCOPE_VIOLATION");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_therapist_is_not_found(pool: PgPool) {
    let org = seed(&pool).await;
    let app = common::build_test_app(pool);

    let response = get_auth(
        app,
        "/api/v1/therapists/999999/eligible",
        &token_for(&org.accountant()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn therapist_listing_shows_only_own_entries(pool: PgPool) {
    let org = seed(&pool).await;
    let app = common::build_test_app(pool);

    let mine = body_json(
        get_auth(app.clone(), "/api/v1/transactions", &token_for(&org.therapist())).await,
    )
    .await;
    let mine = mine["data"].as_array().unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|t| t["user_id"] == org.therapist_id));

    let other = body_json(
        get_auth(app, "/api/v1/transactions", &token_for(&org.other_manager())).await,
    )
    .await;
    assert!(other["data"].as_array().unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn branch_income_respects_unknown_payer_policy(pool: PgPool) {
    let org = seed(&pool).await;
    // A settled lesson with no payment evidence is priced by the child rate (600).
    let lesson = ledger_db::repositories::LessonRepo::create(
        &pool,
        &ledger_db::models::lesson::CreateLesson {
            starts_at: at(base(), 120),
            ends_at: at(base(), 165),
            therapist_id: org.therapist_id,
            branch_id: Some(org.branch_id),
            child_id: Some(org.child_id),
        },
    )
    .await
    .unwrap();
    ledger_db::repositories::LessonRepo::settle(&pool, lesson.id, Decimal::from(50), at(base(), 180))
        .await
        .unwrap();
    let app = common::build_test_app(pool);
    let token = token_for(&org.owner());
    let uri = format!("/api/v1/branches/{}/income?{}", org.branch_id, window_query());

    let counted = body_json(get_auth(app.clone(), &uri, &token).await).await;
    assert_eq!(counted["data"]["policy"], "count_as_leader");
    assert_eq!(decimal(&counted["data"]["leader_income"]), Decimal::from(2400));
    assert_eq!(decimal(&counted["data"]["unknown_income"]), Decimal::from(600));

    let excluded = body_json(get_auth(app, &format!("{uri}&policy=exclude"), &token).await).await;
    assert_eq!(decimal(&excluded["data"]["leader_income"]), Decimal::from(1800));
    assert_eq!(excluded["data"]["unknown_lessons"], 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn inverted_window_is_rejected(pool: PgPool) {
    let org = seed(&pool).await;
    let app = common::build_test_app(pool);
    let b = base();

    let response = get_auth(
        app,
        &format!(
            "/api/v1/therapists/{}/settlement/window?from={}&to={}",
            org.therapist_id,
            query_ts(b),
            query_ts(b - chrono::Duration::days(1))
        ),
        &token_for(&org.manager()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}
