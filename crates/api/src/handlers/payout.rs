//! Handlers for the payout request lifecycle.
//!
//! Therapists open requests for their own backlog; leaders and accountants
//! confirm them. Every transition publishes a [`PayoutEvent`].

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use ledger_core::error::CoreError;
use ledger_core::payout::CancelOutcome;
use ledger_core::scope::Role;
use ledger_core::types::DbId;
use ledger_db::models::payout_request::{ConfirmedPayout, PayoutRequest};
use ledger_db::repositories::PayoutRequestRepo;
use ledger_db::LedgerDbError;
use ledger_events::{CancelReason, PayoutEvent};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::handlers::scoped_therapist;
use crate::handlers::settlement::default_percent;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::{RequireSettler, RequireTherapist};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CancelResult {
    pub request: PayoutRequest,
    pub already_cancelled: bool,
}

async fn find_request(state: &AppState, id: DbId) -> AppResult<PayoutRequest> {
    PayoutRequestRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "payout_request",
            id,
        }))
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// GET /api/v1/therapists/{id}/payout-requests/pending
///
/// The PENDING request, if any. A request overtaken by newly settled
/// lessons is cancelled on read and reported as absent.
pub async fn get_pending(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(therapist_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    scoped_therapist(&state.pool, &auth.caller, therapist_id).await?;
    let pending = PayoutRequestRepo::find_pending(&state.pool, therapist_id, Utc::now()).await?;
    Ok(Json(DataResponse { data: pending }))
}

/// GET /api/v1/therapists/{id}/payout-requests
///
/// Stale PENDING requests are cancelled on read, as in [`get_pending`].
pub async fn list_requests(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(therapist_id): Path<DbId>,
    Query(query): Query<ListQuery>,
) -> AppResult<impl IntoResponse> {
    scoped_therapist(&state.pool, &auth.caller, therapist_id).await?;
    let requests = PayoutRequestRepo::list_for_therapist(
        &state.pool,
        therapist_id,
        query.limit.unwrap_or(50),
        Utc::now(),
    )
    .await?;
    Ok(Json(DataResponse { data: requests }))
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// POST /api/v1/therapists/{id}/payout-requests
pub async fn create_request(
    RequireTherapist(auth): RequireTherapist,
    State(state): State<AppState>,
    Path(therapist_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    auth.caller.require_self_therapist(therapist_id)?;

    let request = PayoutRequestRepo::create(&state.pool, therapist_id, Utc::now()).await?;

    state.event_bus.publish(
        PayoutEvent::Requested {
            request_id: request.id,
            therapist_id,
            actor_id: auth.caller.user_id,
        }
        .into(),
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: request })))
}

/// POST /api/v1/payout-requests/{id}/cancel
///
/// The requesting therapist or a settler in scope may cancel. Cancelling an
/// already cancelled request succeeds without changes.
pub async fn cancel_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(request_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let existing = find_request(&state, request_id).await?;
    if auth.caller.role == Role::Therapist {
        auth.caller.require_self_therapist(existing.therapist_id)?;
    } else {
        auth.caller.require_settler()?;
        scoped_therapist(&state.pool, &auth.caller, existing.therapist_id).await?;
    }

    let (request, outcome) = PayoutRequestRepo::cancel(&state.pool, request_id, Utc::now()).await?;

    if outcome == CancelOutcome::Cancelled {
        state.event_bus.publish(
            PayoutEvent::Cancelled {
                request_id,
                therapist_id: request.therapist_id,
                actor_id: Some(auth.caller.user_id),
                reason: CancelReason::Manual,
            }
            .into(),
        );
    }

    Ok(Json(DataResponse {
        data: CancelResult {
            request,
            already_cancelled: outcome == CancelOutcome::AlreadyCancelled,
        },
    }))
}

/// POST /api/v1/payout-requests/{id}/confirm
///
/// Pays the request's frozen backlog atomically. A stale request comes back
/// as 409 `STALE_REQUEST` and is already cancelled.
pub async fn confirm_request(
    RequireSettler(auth): RequireSettler,
    State(state): State<AppState>,
    Path(request_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let existing = find_request(&state, request_id).await?;
    scoped_therapist(&state.pool, &auth.caller, existing.therapist_id).await?;

    let result = PayoutRequestRepo::confirm(
        &state.pool,
        request_id,
        auth.caller.user_id,
        default_percent(&state),
        Utc::now(),
    )
    .await;

    let confirmed: ConfirmedPayout = match result {
        Ok(confirmed) => confirmed,
        Err(LedgerDbError::Core(err @ CoreError::StaleRequest { .. })) => {
            state.event_bus.publish(
                PayoutEvent::Cancelled {
                    request_id,
                    therapist_id: existing.therapist_id,
                    actor_id: None,
                    reason: CancelReason::Stale,
                }
                .into(),
            );
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    state.event_bus.publish(
        PayoutEvent::Confirmed {
            request_id,
            therapist_id: existing.therapist_id,
            actor_id: auth.caller.user_id,
            transaction_id: confirmed.transaction.id,
            net: confirmed.checkpoint.net,
            lesson_count: confirmed.lesson_ids.len() as u32,
        }
        .into(),
    );

    Ok(Json(DataResponse { data: confirmed }))
}
