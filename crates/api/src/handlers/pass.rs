//! Prepaid lesson passes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use ledger_core::error::CoreError;
use ledger_core::scope::{CallerContext, Scope};
use ledger_core::types::DbId;
use ledger_db::models::pass::{ConsumePass, CreatePass, Pass};
use ledger_db::repositories::{LessonRepo, PassRepo};

use crate::error::{AppError, AppResult};
use crate::handlers::caller_scope;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireSettler;
use crate::response::DataResponse;
use crate::state::AppState;

/// Passes without a branch belong to the unrestricted scope only.
fn ensure_pass_branch(scope: &Scope, branch_id: Option<DbId>) -> Result<(), CoreError> {
    match branch_id {
        Some(branch_id) => scope.ensure_branch(branch_id),
        None if *scope == Scope::All => Ok(()),
        None => Err(CoreError::ScopeViolation(
            "Pass has no branch and is outside the caller's scope".into(),
        )),
    }
}

async fn load_scoped(
    state: &AppState,
    caller: &CallerContext,
    pass_id: DbId,
) -> AppResult<(Pass, Scope)> {
    let pass = PassRepo::find_by_id(&state.pool, pass_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "pass",
            id: pass_id,
        }))?;
    let scope = caller_scope(&state.pool, caller).await?;
    ensure_pass_branch(&scope, pass.branch_id)?;
    Ok((pass, scope))
}

/// POST /api/v1/passes
pub async fn issue_pass(
    RequireSettler(auth): RequireSettler,
    State(state): State<AppState>,
    Json(input): Json<CreatePass>,
) -> AppResult<impl IntoResponse> {
    let scope = caller_scope(&state.pool, &auth.caller).await?;
    ensure_pass_branch(&scope, input.branch_id)?;

    let pass = PassRepo::issue(&state.pool, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: pass })))
}

/// GET /api/v1/passes/{id}
pub async fn get_pass(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(pass_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let (pass, _) = load_scoped(&state, &auth.caller, pass_id).await?;
    Ok(Json(DataResponse { data: pass }))
}

/// POST /api/v1/passes/{id}/consume
///
/// Takes one lesson from the pass. The lesson is then attributed to the
/// leader at the pass's unit price.
pub async fn consume_pass(
    RequireSettler(auth): RequireSettler,
    State(state): State<AppState>,
    Path(pass_id): Path<DbId>,
    Json(input): Json<ConsumePass>,
) -> AppResult<impl IntoResponse> {
    let (_, scope) = load_scoped(&state, &auth.caller, pass_id).await?;
    let lesson = LessonRepo::find_by_id(&state.pool, input.lesson_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "lesson",
            id: input.lesson_id,
        }))?;
    scope.ensure_therapist(lesson.therapist_id, lesson.branch_id)?;

    let usage = PassRepo::consume(&state.pool, pass_id, input.lesson_id, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: usage })))
}

/// POST /api/v1/passes/{id}/close
pub async fn close_pass(
    RequireSettler(auth): RequireSettler,
    State(state): State<AppState>,
    Path(pass_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    load_scoped(&state, &auth.caller, pass_id).await?;
    let pass = PassRepo::close(&state.pool, pass_id).await?;
    Ok(Json(DataResponse { data: pass }))
}

/// POST /api/v1/passes/{id}/refund
///
/// Refunds the unused remainder and writes a negative REVENUE correction.
pub async fn refund_pass(
    RequireSettler(auth): RequireSettler,
    State(state): State<AppState>,
    Path(pass_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    load_scoped(&state, &auth.caller, pass_id).await?;
    let refund = PassRepo::refund(&state.pool, pass_id, auth.caller.user_id).await?;
    tracing::info!(
        pass_id,
        amount = %refund.correction.amount,
        actor_id = auth.caller.user_id,
        "Pass refunded"
    );
    Ok(Json(DataResponse { data: refund }))
}
