//! Print job queue constants and state machine.
//!
//! This module lives in `core` (zero internal deps) so it can be used by
//! both the repository/engine layer and the API adapter without
//! duplicating the guard table per endpoint.

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Priority constants
// ---------------------------------------------------------------------------

/// Priority value for urgent jobs (e.g. a customer waiting at the gate).
/// Claimed before all others.
pub const PRIORITY_URGENT: i32 = 10;

/// Priority value for normal jobs. Default.
pub const PRIORITY_NORMAL: i32 = 0;

/// Priority value for background jobs (end-of-day reports). Claimed last.
pub const PRIORITY_BACKGROUND: i32 = -10;

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Default ceiling on automatic retry attempts for a new job.
pub const DEFAULT_MAX_RETRIES: i32 = 3;

/// Base delay for the first retry, in seconds.
pub const RETRY_BASE_DELAY_SECS: i64 = 30;

/// Upper bound on any computed retry delay, in seconds.
pub const RETRY_MAX_DELAY_SECS: i64 = 3_600;

/// Compute the backoff delay before the next claim attempt, in seconds.
///
/// Exponential in the number of attempts already made: 30s, 60s, 120s, ...
/// capped at [`RETRY_MAX_DELAY_SECS`]. `attempts` is the attempt count at
/// the moment the failure is reported (>= 1, since a claim precedes every
/// failure).
pub fn retry_backoff_secs(attempts: i32) -> i64 {
    let exponent = attempts.saturating_sub(1).clamp(0, 30) as u32;
    RETRY_BASE_DELAY_SECS
        .saturating_mul(1i64 << exponent)
        .min(RETRY_MAX_DELAY_SECS)
}

// ---------------------------------------------------------------------------
// Listing limits
// ---------------------------------------------------------------------------

/// Default page size for job listing.
pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// Maximum page size for job listing.
pub const MAX_LIST_LIMIT: i64 = 100;

/// Number of history events returned alongside a single job.
pub const JOB_EVENT_LIMIT: i64 = 50;

/// Clamp a caller-supplied list limit into `1..=MAX_LIST_LIMIT`.
pub fn clamp_list_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

// ---------------------------------------------------------------------------
// Enqueue validation
// ---------------------------------------------------------------------------

/// Validate the required fields of an enqueue request.
///
/// `job_type` must be non-blank and `payload` must not be JSON `null`;
/// everything else is optional with defaults. The payload *shape* is
/// deliberately not validated here -- it is opaque to the queue and only
/// meaningful to the agent-side renderer.
pub fn validate_enqueue(job_type: &str, payload: &serde_json::Value) -> Result<(), CoreError> {
    if job_type.trim().is_empty() {
        return Err(CoreError::Validation("job_type is required".into()));
    }
    if payload.is_null() {
        return Err(CoreError::Validation("payload is required".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Print job status IDs matching `print_job_statuses` seed data (1-based
/// SMALLSERIAL).
///
/// The id constants are intentionally duplicated from the `db` crate's
/// `PrintJobStatus` enum because `core` must have zero internal deps.
pub mod state_machine {
    pub const QUEUED: i16 = 1;
    pub const CLAIMED: i16 = 2;
    pub const PRINTING: i16 = 3;
    pub const COMPLETED: i16 = 4;
    pub const FAILED: i16 = 5;
    pub const CANCELLED: i16 = 6;

    /// Returns the set of valid target status IDs reachable from
    /// `from_status`.
    ///
    /// Terminal states (Completed=4, Failed=5, Cancelled=6) return an empty
    /// slice because no further transitions are allowed. The
    /// claimed/printing -> queued edge is the retry re-entry path.
    pub fn valid_transitions(from_status: i16) -> &'static [i16] {
        match from_status {
            // Queued -> Claimed, Cancelled
            QUEUED => &[CLAIMED, CANCELLED],
            // Claimed -> Printing, Queued (retry), Failed, Cancelled
            CLAIMED => &[PRINTING, QUEUED, FAILED, CANCELLED],
            // Printing -> Completed, Queued (retry), Failed, Cancelled
            PRINTING => &[COMPLETED, QUEUED, FAILED, CANCELLED],
            // Terminal states
            COMPLETED | FAILED | CANCELLED => &[],
            // Unknown status: no transitions allowed
            _ => &[],
        }
    }

    /// Check whether a transition from `from` to `to` is valid.
    pub fn can_transition(from: i16, to: i16) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// Whether a status admits no further transitions.
    pub fn is_terminal(status: i16) -> bool {
        valid_transitions(status).is_empty()
    }

    /// Validate a state transition, returning an error message for invalid
    /// ones.
    pub fn validate_transition(from: i16, to: i16) -> Result<(), String> {
        if can_transition(from, to) {
            Ok(())
        } else {
            let from_name = status_name(from);
            let to_name = status_name(to);
            Err(format!(
                "Invalid transition: {from_name} ({from}) -> {to_name} ({to})"
            ))
        }
    }

    /// Human-readable name for a status ID (for error messages).
    pub fn status_name(id: i16) -> &'static str {
        match id {
            QUEUED => "queued",
            CLAIMED => "claimed",
            PRINTING => "printing",
            COMPLETED => "completed",
            FAILED => "failed",
            CANCELLED => "cancelled",
            _ => "unknown",
        }
    }
}
