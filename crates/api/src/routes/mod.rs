pub mod health;
pub mod print_agent;
pub mod print_jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /print-jobs                       list, enqueue (producer JWT)
/// /print-jobs/statuses              status enumeration
/// /print-jobs/stats                 per-status counts
/// /print-jobs/{id}                  get with event history
/// /print-jobs/{id}/cancel           cancel (POST)
///
/// /agent/print-jobs/claim           claim next eligible job (agent token)
/// /agent/print-jobs/{id}/printing   report printing started
/// /agent/print-jobs/{id}/complete   report success
/// /agent/print-jobs/{id}/fail       report failure (retry or exhaust)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/print-jobs", print_jobs::router())
        .nest("/agent/print-jobs", print_agent::router())
}
