//! Ledger entries: append and list.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use ledger_core::error::CoreError;
use ledger_core::ledger::{ensure_lesson_entry_allowed, TransactionKind};
use ledger_core::scope::{Role, Scope};
use ledger_core::types::DbId;
use ledger_db::models::transaction::{CreateTransaction, TransactionQuery};
use ledger_db::repositories::{LessonRepo, OrgRepo, TransactionRepo};

use crate::error::{AppError, AppResult};
use crate::handlers::caller_scope;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/transactions?user_id=&from=&to=&limit=&offset=
pub async fn list_transactions(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<TransactionQuery>,
) -> AppResult<impl IntoResponse> {
    let scope = caller_scope(&state.pool, &auth.caller).await?;
    let transactions = TransactionRepo::list(&state.pool, &scope, &params).await?;
    Ok(Json(DataResponse { data: transactions }))
}

/// Where a new entry lands: the therapist it concerns (if any) and the
/// branch and company it is filed under.
struct Placement {
    therapist_id: Option<DbId>,
    branch_id: Option<DbId>,
    company_id: Option<DbId>,
}

/// Derive the entry's placement from the lesson, the user, or the branch,
/// in that order. Body-supplied `branch_id`/`company_id` must agree.
async fn resolve_placement(state: &AppState, input: &CreateTransaction) -> AppResult<Placement> {
    let (therapist_id, branch_id) = if let Some(lesson_id) = input.lesson_id {
        let lesson = LessonRepo::find_by_id(&state.pool, lesson_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "lesson",
                id: lesson_id,
            })?;
        if input.user_id.is_some_and(|user_id| user_id != lesson.therapist_id) {
            return Err(AppError::Core(CoreError::Validation(
                "user_id does not match the lesson's therapist".into(),
            )));
        }
        ensure_lesson_entry_allowed(lesson.id, lesson.settled_at.is_some(), input.payment_method)?;
        (Some(lesson.therapist_id), lesson.branch_id)
    } else if let Some(user_id) = input.user_id {
        let placement = OrgRepo::find_placement(&state.pool, user_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "user",
                id: user_id,
            })?;
        (Some(user_id), placement.branch_id)
    } else {
        (None, input.branch_id)
    };

    if input.branch_id.is_some() && input.branch_id != branch_id {
        return Err(AppError::Core(CoreError::Validation(
            "branch_id does not match the entry's placement".into(),
        )));
    }

    let company_id = match branch_id {
        Some(id) => Some(
            OrgRepo::find_branch(&state.pool, id)
                .await?
                .ok_or(CoreError::NotFound { entity: "branch", id })?
                .company_id,
        ),
        None => None,
    };
    if input.company_id.is_some() && input.company_id != company_id {
        return Err(AppError::Core(CoreError::Validation(
            "company_id does not match the entry's placement".into(),
        )));
    }

    Ok(Placement {
        therapist_id,
        branch_id,
        company_id,
    })
}

/// POST /api/v1/transactions
///
/// Appends one entry. PAYOUT entries are written only by confirming a
/// payout request. Therapists may record their own entries but never ones
/// linked to a lesson. Branch and company always come from the lesson or
/// user the entry concerns; lesson entries are filed under the lesson's
/// therapist.
pub async fn create_transaction(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(mut input): Json<CreateTransaction>,
) -> AppResult<impl IntoResponse> {
    if input.kind == TransactionKind::Payout {
        return Err(AppError::Core(CoreError::Validation(
            "Payout entries are written by confirming a payout request".into(),
        )));
    }

    let caller = &auth.caller;
    if caller.role == Role::Therapist {
        if input.user_id != Some(caller.user_id) {
            return Err(AppError::Core(CoreError::ScopeViolation(
                "Therapists may only record entries for themselves".into(),
            )));
        }
        if input.lesson_id.is_some() {
            return Err(AppError::Core(CoreError::Forbidden(
                "Lesson entries are recorded by a leader or accountant".into(),
            )));
        }
    }

    let scope = caller_scope(&state.pool, caller).await?;
    let placement = resolve_placement(&state, &input).await?;

    match (placement.therapist_id, placement.branch_id) {
        (Some(therapist_id), branch_id) => scope.ensure_therapist(therapist_id, branch_id)?,
        (None, Some(branch_id)) => scope.ensure_branch(branch_id)?,
        (None, None) if scope == Scope::All => {}
        (None, None) => {
            return Err(AppError::Core(CoreError::Validation(
                "branch_id is required".into(),
            )))
        }
    }

    if input.lesson_id.is_some() {
        input.user_id = placement.therapist_id;
    }
    input.branch_id = placement.branch_id;
    input.company_id = placement.company_id;

    let transaction = TransactionRepo::create(&state.pool, &input).await?;
    tracing::debug!(
        transaction_id = transaction.id,
        kind = input.kind.as_str(),
        actor_id = caller.user_id,
        "Ledger entry recorded"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: transaction })))
}
