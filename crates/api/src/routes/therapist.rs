//! Route definitions for the `/therapists` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::{checkpoint, commission, payout, settlement};
use crate::state::AppState;

/// Routes mounted at `/therapists`.
///
/// Every route checks the therapist against the caller's scope.
///
/// ```text
/// GET    /{id}/settlement                 -> get_settlement
/// GET    /{id}/settlement/window          -> get_settlement_window
/// GET    /{id}/eligible                   -> get_eligible
/// GET    /{id}/commission                 -> get_commission
/// PUT    /{id}/commission                 -> set_commission
/// GET    /{id}/payout-requests            -> list_requests
/// POST   /{id}/payout-requests            -> create_request
/// GET    /{id}/payout-requests/pending    -> get_pending
/// GET    /{id}/checkpoints                -> list_checkpoints
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/settlement", get(settlement::get_settlement))
        .route(
            "/{id}/settlement/window",
            get(settlement::get_settlement_window),
        )
        .route("/{id}/eligible", get(settlement::get_eligible))
        .route(
            "/{id}/commission",
            get(commission::get_commission).put(commission::set_commission),
        )
        .route(
            "/{id}/payout-requests",
            get(payout::list_requests).post(payout::create_request),
        )
        .route("/{id}/payout-requests/pending", get(payout::get_pending))
        .route("/{id}/checkpoints", get(checkpoint::list_checkpoints))
}
