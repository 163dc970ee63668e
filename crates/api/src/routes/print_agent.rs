//! Route definitions for the agent-facing `/agent/print-jobs` protocol.
//!
//! All endpoints require the fleet agent token plus an `X-Agent-Id`
//! header.

use axum::routing::post;
use axum::Router;

use crate::handlers::print_agent;
use crate::state::AppState;

/// Routes mounted at `/agent/print-jobs`.
///
/// ```text
/// POST   /claim           -> claim_job
/// POST   /{id}/printing   -> mark_printing
/// POST   /{id}/complete   -> complete_job
/// POST   /{id}/fail       -> fail_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/claim", post(print_agent::claim_job))
        .route("/{id}/printing", post(print_agent::mark_printing))
        .route("/{id}/complete", post(print_agent::complete_job))
        .route("/{id}/fail", post(print_agent::fail_job))
}
