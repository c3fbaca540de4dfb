//! Leader dashboards over a branch.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use ledger_core::error::CoreError;
use ledger_core::settlement::{income_summary, IncomeSummary, SettlementWindow, UnknownPayerPolicy};
use ledger_core::types::{DbId, Timestamp};
use ledger_db::repositories::{LessonFactsRepo, OrgRepo};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::handlers::caller_scope;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IncomeQuery {
    pub from: Timestamp,
    pub to: Timestamp,
    pub policy: Option<UnknownPayerPolicy>,
}

#[derive(Debug, Serialize)]
pub struct BranchIncome {
    pub branch_id: DbId,
    pub from: Timestamp,
    pub to: Timestamp,
    #[serde(flatten)]
    pub summary: IncomeSummary,
}

/// GET /api/v1/branches/{id}/income?from=&to=&policy=count_as_leader|exclude
///
/// Lesson prices split by who collected the money. UNKNOWN payers count
/// toward the leader unless `policy=exclude`.
pub async fn get_branch_income(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(branch_id): Path<DbId>,
    Query(query): Query<IncomeQuery>,
) -> AppResult<impl IntoResponse> {
    let window = SettlementWindow::new(query.from, query.to)?;
    window.validate_span()?;

    OrgRepo::find_branch(&state.pool, branch_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "branch",
            id: branch_id,
        }))?;
    let scope = caller_scope(&state.pool, &auth.caller).await?;
    scope.ensure_branch(branch_id)?;

    let mut conn = state.pool.acquire().await?;
    let lessons = LessonFactsRepo::branch_window(&mut conn, branch_id, &window).await?;
    let policy = query.policy.unwrap_or(UnknownPayerPolicy::CountAsLeader);

    Ok(Json(DataResponse {
        data: BranchIncome {
            branch_id,
            from: window.from,
            to: window.to,
            summary: income_summary(&lessons, &window, policy),
        },
    }))
}
