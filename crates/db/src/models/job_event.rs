//! Print job event entity model.

use serde::Serialize;
use sqlx::FromRow;

use parkprint_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `print_job_events` table.
///
/// Append-only: rows are written exclusively by the queue engine as a side
/// effect of a transition and never updated or deleted.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobEvent {
    pub id: DbId,
    pub job_id: DbId,
    /// `None` marks the initial enqueue event.
    pub from_status_id: Option<StatusId>,
    pub to_status_id: StatusId,
    /// Agent id, producer login, or `"system"`.
    pub actor: String,
    pub detail: Option<String>,
    pub occurred_at: Timestamp,
}
