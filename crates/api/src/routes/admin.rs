//! Route definitions for the `/admin` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Routes mounted at `/admin`.
///
/// Owner or accountant only. Purge and the audit trail also need
/// unrestricted scope.
///
/// ```text
/// POST   /ledger/archive        -> archive_ledger
/// POST   /ledger/purge          -> purge_ledger
/// GET    /audit-logs            -> list_audit_logs
/// GET    /audit-logs/verify     -> verify_audit_chain
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ledger/archive", post(admin::archive_ledger))
        .route("/ledger/purge", post(admin::purge_ledger))
        .route("/audit-logs", get(admin::list_audit_logs))
        .route("/audit-logs/verify", get(admin::verify_audit_chain))
}
