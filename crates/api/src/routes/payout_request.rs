//! Route definitions for the `/payout-requests` resource.

use axum::routing::post;
use axum::Router;

use crate::handlers::payout;
use crate::state::AppState;

/// Routes mounted at `/payout-requests`.
///
/// ```text
/// POST   /{id}/cancel     -> cancel_request
/// POST   /{id}/confirm    -> confirm_request (settlers)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/cancel", post(payout::cancel_request))
        .route("/{id}/confirm", post(payout::confirm_request))
}
