//! Route definitions for the `/passes` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::pass;
use crate::state::AppState;

/// Routes mounted at `/passes`.
///
/// ```text
/// POST   /                -> issue_pass
/// GET    /{id}            -> get_pass
/// POST   /{id}/consume    -> consume_pass
/// POST   /{id}/close      -> close_pass
/// POST   /{id}/refund     -> refund_pass
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(pass::issue_pass))
        .route("/{id}", get(pass::get_pass))
        .route("/{id}/consume", post(pass::consume_pass))
        .route("/{id}/close", post(pass::close_pass))
        .route("/{id}/refund", post(pass::refund_pass))
}
