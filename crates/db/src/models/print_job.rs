//! Print job entity models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use parkprint_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `print_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PrintJob {
    pub id: DbId,
    pub job_key: Option<String>,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub printer_profile: Option<String>,
    pub priority: i32,
    pub status_id: StatusId,
    pub attempts: i32,
    pub max_retries: i32,
    pub scheduled_for: Timestamp,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<Timestamp>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub failed_at: Option<Timestamp>,
    pub cancelled_at: Option<Timestamp>,
    pub last_error: Option<String>,
    pub requested_by: DbId,
    pub requested_by_login: String,
    pub requested_by_name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Producer identity snapshot stored on every job at enqueue time.
#[derive(Debug, Clone)]
pub struct Requester {
    pub id: DbId,
    pub login: String,
    pub name: String,
}

/// DTO for enqueuing a new job via `POST /api/v1/print-jobs`.
#[derive(Debug, Clone, Deserialize)]
pub struct EnqueueJob {
    pub job_type: String,
    pub payload: serde_json::Value,
    pub printer_profile: Option<String>,
    pub priority: Option<i32>,
    /// Earliest claimable instant. Defaults to now (immediately claimable).
    pub scheduled_for: Option<Timestamp>,
    /// Caller-supplied idempotency key. A repeat enqueue with the same key
    /// returns the existing job instead of creating a new one.
    pub job_key: Option<String>,
    pub max_retries: Option<i32>,
}

/// Result of an enqueue: the job plus whether it already existed.
#[derive(Debug, Serialize)]
pub struct EnqueueOutcome {
    pub job: PrintJob,
    pub duplicate: bool,
}

/// Query parameters for `GET /api/v1/print-jobs`.
#[derive(Debug, Default, Deserialize)]
pub struct JobListQuery {
    /// Filter by status ID (e.g. 1 = queued, 5 = failed).
    pub status_id: Option<StatusId>,
    /// Filter by job type (exact match).
    pub job_type: Option<String>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Only jobs created at or after this instant.
    pub since: Option<Timestamp>,
    /// Case-insensitive substring match against job key, type, and
    /// requester login.
    pub search: Option<String>,
}

/// Filters an agent supplies when claiming work.
#[derive(Debug, Default, Deserialize)]
pub struct ClaimFilter {
    /// Restrict to these job types; empty/absent means any.
    pub job_types: Option<Vec<String>>,
    /// Restrict to these printer profiles; jobs with no profile always
    /// match.
    pub printer_profiles: Option<Vec<String>>,
    /// Also resume jobs this agent already holds (claimed/printing).
    #[serde(default)]
    pub include_assigned: bool,
}

/// Per-status row counts for the stats endpoint.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StatusCount {
    pub status_id: StatusId,
    pub count: i64,
}
