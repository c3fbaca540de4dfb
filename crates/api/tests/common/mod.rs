//! Shared helpers for the API integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use chrono::{Duration, DurationRound, Utc};
use http_body_util::BodyExt;
use ledger_api::auth::jwt::{generate_access_token, JwtConfig};
use ledger_api::config::{LedgerConfig, ServerConfig};
use ledger_api::router::build_app_router;
use ledger_api::state::AppState;
use ledger_core::ledger::{PaymentMethod, TransactionKind};
use ledger_core::scope::{CallerContext, Role};
use ledger_core::types::{DbId, Money, Timestamp};
use ledger_db::models::lesson::{CreateLesson, Lesson};
use ledger_db::models::org::{CreateBranch, CreateChild, CreateCompany, CreateUser};
use ledger_db::models::transaction::CreateTransaction;
use ledger_db::repositories::{LessonRepo, OrgRepo, TransactionRepo};
use ledger_events::{EventBus, PlatformEvent};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tokio::sync::broadcast;
use tower::ServiceExt;

pub const TEST_JWT_SECRET: &str = "test-secret-for-ledger-api";

/// Test `ServerConfig` with dev defaults and a fixed JWT secret.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            access_token_expiry_mins: 15,
        },
        ledger: LedgerConfig::default(),
    }
}

/// Full application router over `pool`, with the production middleware.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with_events(pool).0
}

/// Like [`build_test_app`], plus a receiver subscribed to the event bus
/// before any request runs.
pub fn build_test_app_with_events(pool: PgPool) -> (Router, broadcast::Receiver<PlatformEvent>) {
    let config = test_config();
    let event_bus = Arc::new(EventBus::default());
    let events = event_bus.subscribe();

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        event_bus,
    };
    (build_app_router(state, &config), events)
}

/// Drain every event published so far.
pub fn drain(events: &mut broadcast::Receiver<PlatformEvent>) -> Vec<PlatformEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

pub fn token_for(caller: &CallerContext) -> String {
    generate_access_token(caller, &test_config().jwt).unwrap()
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    json_request(app, Method::POST, uri, body, token).await
}

pub async fn put_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    json_request(app, Method::PUT, uri, body, token).await
}

async fn json_request(
    app: Router,
    method: Method,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Money fields serialize as decimal strings.
pub fn decimal(value: &serde_json::Value) -> Decimal {
    value
        .as_str()
        .unwrap_or_else(|| panic!("expected a decimal string, got {value}"))
        .parse()
        .unwrap()
}

/// RFC 3339 with a `Z` suffix, safe inside a query string.
pub fn query_ts(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

/// Reference instant ten days ago, on the hour.
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
    pub other_manager_id: DbId,
    pub therapist_id: DbId,
    pub accountant_id: DbId,
    pub child_id: DbId,
}

impl Org {
    pub fn owner(&self) -> CallerContext {
        caller(self.owner_id, Role::Owner, None, Some(self.company_id))
    }

    pub fn manager(&self) -> CallerContext {
        caller(self.manager_id, Role::Manager, Some(self.branch_id), Some(self.company_id))
    }

    pub fn other_manager(&self) -> CallerContext {
        caller(
            self.other_manager_id,
            Role::Manager,
            Some(self.other_branch_id),
            Some(self.company_id),
        )
    }

    pub fn therapist(&self) -> CallerContext {
        caller(self.therapist_id, Role::Therapist, Some(self.branch_id), Some(self.company_id))
    }

    pub fn accountant(&self) -> CallerContext {
        caller(self.accountant_id, Role::Accountant, None, None)
    }
}

fn caller(
    user_id: DbId,
    role: Role,
    branch_id: Option<DbId>,
    company_id: Option<DbId>,
) -> CallerContext {
    CallerContext {
        user_id,
        role,
        branch_id,
        company_id,
    }
}

/// One company with two branches; the therapist works in the first.
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
    let other_manager = OrgRepo::create_user(pool, &user("Nina", "manager", Some(other.id)))
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
    OrgRepo::set_branch_manager(pool, other.id, other_manager.id).await.unwrap();

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
        other_manager_id: other_manager.id,
        therapist_id: therapist.id,
        accountant_id: accountant.id,
        child_id: child.id,
    }
}

/// A lesson paid to the leader by bank transfer, settled at `settled_at`
/// under the default 50% rate.
pub async fn settled_leader_lesson(
    pool: &PgPool,
    org: &Org,
    starts_at: Timestamp,
    amount: i64,
    settled_at: Timestamp,
) -> Lesson {
    let lesson = LessonRepo::create(
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
    .unwrap();

    let mut input = CreateTransaction::new(TransactionKind::Revenue, Money::from(amount));
    input.lesson_id = Some(lesson.id);
    input.user_id = Some(org.therapist_id);
    input.branch_id = Some(org.branch_id);
    input.company_id = Some(org.company_id);
    input.payment_method = Some(PaymentMethod::BankTransfer);
    TransactionRepo::create(pool, &input).await.unwrap();

    LessonRepo::settle(pool, lesson.id, Decimal::from(50), settled_at)
        .await
        .unwrap()
}
