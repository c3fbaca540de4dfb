//! Lesson settlement.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use ledger_core::error::CoreError;
use ledger_core::types::DbId;
use ledger_db::repositories::LessonRepo;

use crate::error::{AppError, AppResult};
use crate::handlers::scoped_therapist;
use crate::handlers::settlement::default_percent;
use crate::middleware::rbac::RequireSettler;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/lessons/{id}/settle
///
/// Marks the lesson settled and freezes its share split. A lesson settles
/// once; a second call is a conflict.
pub async fn settle_lesson(
    RequireSettler(auth): RequireSettler,
    State(state): State<AppState>,
    Path(lesson_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let lesson = LessonRepo::find_by_id(&state.pool, lesson_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "lesson",
            id: lesson_id,
        }))?;
    scoped_therapist(&state.pool, &auth.caller, lesson.therapist_id).await?;

    let settled =
        LessonRepo::settle(&state.pool, lesson_id, default_percent(&state), Utc::now()).await?;
    Ok(Json(DataResponse { data: settled }))
}
