//! Ledger retention and audit trail.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use ledger_core::error::CoreError;
use ledger_core::scope::Scope;
use ledger_core::types::Timestamp;
use ledger_db::repositories::{AuditLogRepo, TransactionRepo};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::handlers::caller_scope;
use crate::middleware::rbac::RequireLedgerAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ArchiveRequest {
    pub start: Timestamp,
    pub end: Timestamp,
}

#[derive(Debug, Serialize)]
pub struct ArchiveResult {
    pub archived: u64,
}

#[derive(Debug, Serialize)]
pub struct PurgeResult {
    pub purged: u64,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ChainStatus {
    pub valid: bool,
    /// First entry whose hash does not match, when the chain is broken.
    pub broken_at: Option<i64>,
}

/// Purge and the audit trail span every company.
async fn require_unrestricted(state: &AppState, auth: &RequireLedgerAdmin) -> AppResult<()> {
    let scope = caller_scope(&state.pool, &auth.0.caller).await?;
    if scope != Scope::All {
        return Err(CoreError::ScopeViolation(
            "Operation requires unrestricted ledger access".into(),
        )
        .into());
    }
    Ok(())
}

/// POST /api/v1/admin/ledger/archive
///
/// Hides entries created in `[start, end]` from listings. Archived entries
/// still count toward settlement history.
pub async fn archive_ledger(
    auth: RequireLedgerAdmin,
    State(state): State<AppState>,
    Json(input): Json<ArchiveRequest>,
) -> AppResult<impl IntoResponse> {
    let scope = caller_scope(&state.pool, &auth.0.caller).await?;
    let archived = TransactionRepo::archive_range(
        &state.pool,
        &scope,
        input.start,
        input.end,
        auth.0.caller.user_id,
        Utc::now(),
    )
    .await?;
    Ok(Json(DataResponse {
        data: ArchiveResult { archived },
    }))
}

/// POST /api/v1/admin/ledger/purge
pub async fn purge_ledger(
    auth: RequireLedgerAdmin,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    require_unrestricted(&state, &auth).await?;
    let purged =
        TransactionRepo::purge_archived(&state.pool, auth.0.caller.user_id, Utc::now()).await?;
    Ok(Json(DataResponse {
        data: PurgeResult { purged },
    }))
}

/// GET /api/v1/admin/audit-logs
pub async fn list_audit_logs(
    auth: RequireLedgerAdmin,
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> AppResult<impl IntoResponse> {
    require_unrestricted(&state, &auth).await?;
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let entries = AuditLogRepo::list_recent(&state.pool, limit).await?;
    Ok(Json(DataResponse { data: entries }))
}

/// GET /api/v1/admin/audit-logs/verify
pub async fn verify_audit_chain(
    auth: RequireLedgerAdmin,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    require_unrestricted(&state, &auth).await?;
    let broken_at = AuditLogRepo::verify_chain(&state.pool).await?;
    if let Some(id) = broken_at {
        tracing::error!(audit_log_id = id, "Audit chain verification failed");
    }
    Ok(Json(DataResponse {
        data: ChainStatus {
            valid: broken_at.is_none(),
            broken_at,
        },
    }))
}
