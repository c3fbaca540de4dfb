//! Settlement balances and the eligible backlog of a therapist.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use ledger_core::attribution::LessonFacts;
use ledger_core::commission::CommissionSchedule;
use ledger_core::payout::is_eligible;
use ledger_core::settlement::{
    compute_settlement, compute_settlement_window, totals_for, SettlementPeriod,
    SettlementTotals, SettlementWindow,
};
use ledger_core::types::{DbId, Timestamp};
use ledger_db::repositories::{CommissionRepo, LessonFactsRepo};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::handlers::scoped_therapist;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub period: Option<SettlementPeriod>,
}

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub from: Timestamp,
    pub to: Timestamp,
}

#[derive(Debug, Serialize)]
pub struct SettlementView {
    pub therapist_id: DbId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<SettlementPeriod>,
    pub from: Timestamp,
    pub to: Timestamp,
    pub totals: SettlementTotals,
}

#[derive(Debug, Serialize)]
pub struct EligibleView {
    pub therapist_id: DbId,
    pub lesson_ids: Vec<DbId>,
    /// What a request created now would pay.
    pub totals: SettlementTotals,
}

/// Lessons settled in `window` plus the therapist's commission schedule.
async fn load_window(
    state: &AppState,
    therapist_id: DbId,
    window: &SettlementWindow,
) -> AppResult<(Vec<LessonFacts>, CommissionSchedule)> {
    let mut conn = state.pool.acquire().await?;
    let lessons = LessonFactsRepo::therapist_window(&mut conn, therapist_id, window).await?;
    let schedule = CommissionRepo::schedule(
        &mut conn,
        therapist_id,
        default_percent(state),
    )
    .await?;
    Ok((lessons, schedule))
}

pub(crate) fn default_percent(state: &AppState) -> Decimal {
    state.config.ledger.default_commission_percent
}

/// GET /api/v1/therapists/{id}/settlement?period=week|month|half_year|year
///
/// Running balance since the start of the period. Display only.
pub async fn get_settlement(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(therapist_id): Path<DbId>,
    Query(query): Query<PeriodQuery>,
) -> AppResult<impl IntoResponse> {
    scoped_therapist(&state.pool, &auth.caller, therapist_id).await?;

    let period = query.period.unwrap_or(SettlementPeriod::Month);
    let now = Utc::now();
    let from = period.start(now);

    let totals = match SettlementWindow::new(from, now) {
        Ok(window) => {
            let (lessons, schedule) = load_window(&state, therapist_id, &window).await?;
            compute_settlement(&lessons, period, &schedule, now)
        }
        Err(_) => SettlementTotals::empty(),
    };

    Ok(Json(DataResponse {
        data: SettlementView {
            therapist_id,
            period: Some(period),
            from,
            to: now,
            totals,
        },
    }))
}

/// GET /api/v1/therapists/{id}/settlement/window?from=&to=
pub async fn get_settlement_window(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(therapist_id): Path<DbId>,
    Query(query): Query<WindowQuery>,
) -> AppResult<impl IntoResponse> {
    let window = SettlementWindow::new(query.from, query.to)?;
    window.validate_span()?;
    scoped_therapist(&state.pool, &auth.caller, therapist_id).await?;

    let (lessons, schedule) = load_window(&state, therapist_id, &window).await?;
    let totals = compute_settlement_window(&lessons, &window, &schedule, Utc::now());

    Ok(Json(DataResponse {
        data: SettlementView {
            therapist_id,
            period: None,
            from: window.from,
            to: window.to,
            totals,
        },
    }))
}

/// GET /api/v1/therapists/{id}/eligible
pub async fn get_eligible(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(therapist_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    scoped_therapist(&state.pool, &auth.caller, therapist_id).await?;
    let now = Utc::now();

    let mut conn = state.pool.acquire().await?;
    let lessons = LessonFactsRepo::unpaid(&mut conn, therapist_id, now).await?;
    let schedule = CommissionRepo::schedule(&mut conn, therapist_id, default_percent(&state)).await?;

    let eligible: Vec<&LessonFacts> = lessons.iter().filter(|l| is_eligible(l, now)).collect();
    let lesson_ids = eligible.iter().map(|l| l.lesson_id).collect();
    let totals = totals_for(eligible, &schedule, now);

    Ok(Json(DataResponse {
        data: EligibleView {
            therapist_id,
            lesson_ids,
            totals,
        },
    }))
}
