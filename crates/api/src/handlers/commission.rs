//! Commission rate history per therapist.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use ledger_core::types::DbId;
use ledger_db::models::commission::{CommissionRate, CreateCommissionRate};
use ledger_db::repositories::CommissionRepo;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::AppResult;
use crate::handlers::scoped_therapist;
use crate::handlers::settlement::default_percent;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireSettler;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CommissionView {
    pub therapist_id: DbId,
    pub current_percent: Decimal,
    pub rates: Vec<CommissionRate>,
}

/// GET /api/v1/therapists/{id}/commission
pub async fn get_commission(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(therapist_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    scoped_therapist(&state.pool, &auth.caller, therapist_id).await?;

    let mut conn = state.pool.acquire().await?;
    let schedule =
        CommissionRepo::schedule(&mut conn, therapist_id, default_percent(&state)).await?;
    drop(conn);
    let rates = CommissionRepo::list_for_therapist(&state.pool, therapist_id).await?;

    Ok(Json(DataResponse {
        data: CommissionView {
            therapist_id,
            current_percent: schedule.current_percent(Utc::now()),
            rates,
        },
    }))
}

/// PUT /api/v1/therapists/{id}/commission
///
/// Appends a rate change. Already settled lessons keep their snapshot.
pub async fn set_commission(
    RequireSettler(auth): RequireSettler,
    State(state): State<AppState>,
    Path(therapist_id): Path<DbId>,
    Json(input): Json<CreateCommissionRate>,
) -> AppResult<impl IntoResponse> {
    scoped_therapist(&state.pool, &auth.caller, therapist_id).await?;

    let rate = CommissionRepo::create(
        &state.pool,
        therapist_id,
        &input,
        auth.caller.user_id,
        Utc::now(),
    )
    .await?;

    tracing::info!(
        therapist_id,
        percent = %rate.percent,
        changed_by = auth.caller.user_id,
        "Commission rate changed"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: rate })))
}
