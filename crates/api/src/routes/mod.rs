pub mod admin;
pub mod health;
pub mod pass;
pub mod payout_request;
pub mod therapist;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /therapists/{id}/settlement                      running balance (?period=)
/// /therapists/{id}/settlement/window               balance over [from, to)
/// /therapists/{id}/eligible                        unpaid backlog
/// /therapists/{id}/commission                      get, set (PUT, settlers)
/// /therapists/{id}/payout-requests                 list, create (own therapist)
/// /therapists/{id}/payout-requests/pending         pending request
/// /therapists/{id}/checkpoints                     closed windows
///
/// /payout-requests/{id}/cancel                     cancel (POST)
/// /payout-requests/{id}/confirm                    confirm (POST, settlers)
///
/// /checkpoints/{id}/preview                        replay a closed window
///
/// /transactions                                    list, append
/// /transactions/{id}/payout-preview                replay by PAYOUT entry
///
/// /branches/{id}/income                            leader income (?from=&to=&policy=)
///
/// /lessons/{id}/settle                             settle (POST, settlers)
///
/// /passes                                          issue (POST, settlers)
/// /passes/{id}                                     get
/// /passes/{id}/consume                             take one lesson (POST)
/// /passes/{id}/close                               close (POST)
/// /passes/{id}/refund                              refund remainder (POST)
///
/// /admin/ledger/archive                            archive a date range (POST)
/// /admin/ledger/purge                              purge archived entries (POST)
/// /admin/audit-logs                                recent audit entries
/// /admin/audit-logs/verify                         verify the hash chain
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/therapists", therapist::router())
        .nest("/payout-requests", payout_request::router())
        .nest("/passes", pass::router())
        .nest("/admin", admin::router())
        .route(
            "/checkpoints/{id}/preview",
            get(handlers::checkpoint::preview_checkpoint),
        )
        .route(
            "/transactions",
            get(handlers::transaction::list_transactions)
                .post(handlers::transaction::create_transaction),
        )
        .route(
            "/transactions/{id}/payout-preview",
            get(handlers::checkpoint::preview_payout_transaction),
        )
        .route(
            "/branches/{id}/income",
            get(handlers::branch::get_branch_income),
        )
        .route("/lessons/{id}/settle", post(handlers::lesson::settle_lesson))
}
