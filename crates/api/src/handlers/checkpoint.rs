//! Settlement checkpoints and window replay.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use ledger_core::error::CoreError;
use ledger_core::types::DbId;
use ledger_db::repositories::{CheckpointRepo, TransactionRepo};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::handlers::scoped_therapist;
use crate::handlers::settlement::default_percent;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

/// GET /api/v1/therapists/{id}/checkpoints
pub async fn list_checkpoints(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(therapist_id): Path<DbId>,
    Query(query): Query<ListQuery>,
) -> AppResult<impl IntoResponse> {
    scoped_therapist(&state.pool, &auth.caller, therapist_id).await?;
    let checkpoints =
        CheckpointRepo::list_for_therapist(&state.pool, therapist_id, query.limit.unwrap_or(50))
            .await?;
    Ok(Json(DataResponse { data: checkpoints }))
}

/// GET /api/v1/checkpoints/{id}/preview
///
/// Replays the lessons of a closed window next to the net recorded for it.
pub async fn preview_checkpoint(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(checkpoint_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let checkpoint = CheckpointRepo::find_by_id(&state.pool, checkpoint_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "checkpoint",
            id: checkpoint_id,
        }))?;
    scoped_therapist(&state.pool, &auth.caller, checkpoint.therapist_id).await?;

    let preview =
        CheckpointRepo::preview(&state.pool, checkpoint_id, default_percent(&state), Utc::now())
            .await?;
    Ok(Json(DataResponse { data: preview }))
}

/// GET /api/v1/transactions/{id}/payout-preview
///
/// Same replay keyed by a PAYOUT entry, for payouts written without a
/// checkpoint.
pub async fn preview_payout_transaction(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(transaction_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let transaction = TransactionRepo::find_by_id(&state.pool, transaction_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "transaction",
            id: transaction_id,
        }))?;
    let therapist_id = transaction.user_id.ok_or_else(|| {
        AppError::BadRequest(format!("Transaction {transaction_id} has no therapist"))
    })?;
    scoped_therapist(&state.pool, &auth.caller, therapist_id).await?;

    let preview = CheckpointRepo::preview_payout_transaction(
        &state.pool,
        transaction_id,
        default_percent(&state),
        Utc::now(),
    )
    .await?;
    Ok(Json(DataResponse { data: preview }))
}
