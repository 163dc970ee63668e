//! Queue engine behaviour tests against a real Postgres instance.
//!
//! Covers the contracts that matter: idempotent enqueue, exclusive claim
//! under concurrency, claim ordering, retry/exhaust, terminal
//! immutability, and the ownership guard.

use assert_matches::assert_matches;
use sqlx::PgPool;

use parkprint_core::error::CoreError;
use parkprint_core::print_queue::{PRIORITY_BACKGROUND, PRIORITY_URGENT};
use parkprint_db::models::print_job::{ClaimFilter, EnqueueJob, PrintJob, Requester};
use parkprint_db::models::status::PrintJobStatus;
use parkprint_db::queue::{QueueEngine, QueueError};

fn requester() -> Requester {
    Requester {
        id: 1,
        login: "cashier1".into(),
        name: "Front Desk Cashier".into(),
    }
}

fn receipt_job() -> EnqueueJob {
    EnqueueJob {
        job_type: "receipt".into(),
        payload: serde_json::json!({"ticket_id": "T1"}),
        printer_profile: None,
        priority: None,
        scheduled_for: None,
        job_key: None,
        max_retries: None,
    }
}

async fn enqueue(pool: &PgPool, input: EnqueueJob) -> PrintJob {
    QueueEngine::enqueue(pool, &input, &requester())
        .await
        .unwrap()
        .job
}

async fn claim(pool: &PgPool, agent_id: &str) -> Option<PrintJob> {
    QueueEngine::claim(pool, agent_id, &ClaimFilter::default())
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Enqueue
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn enqueue_creates_queued_job_with_initial_event(pool: PgPool) {
    let outcome = QueueEngine::enqueue(&pool, &receipt_job(), &requester())
        .await
        .unwrap();

    assert!(!outcome.duplicate);
    let job = outcome.job;
    assert_eq!(job.status_id, PrintJobStatus::Queued.id());
    assert_eq!(job.attempts, 0);
    assert_eq!(job.priority, 0);
    assert_eq!(job.requested_by_login, "cashier1");
    assert!(job.claimed_by.is_none());

    let with_events = QueueEngine::get(&pool, job.id).await.unwrap();
    assert_eq!(with_events.events.len(), 1);
    let event = &with_events.events[0];
    assert_eq!(event.from_status_id, None);
    assert_eq!(event.to_status_id, PrintJobStatus::Queued.id());
    assert_eq!(event.actor, "cashier1");
}

#[sqlx::test(migrations = "../../migrations")]
async fn enqueue_with_same_job_key_is_idempotent(pool: PgPool) {
    let mut input = receipt_job();
    input.job_key = Some("T1-print".into());

    let first = QueueEngine::enqueue(&pool, &input, &requester())
        .await
        .unwrap();
    let second = QueueEngine::enqueue(&pool, &input, &requester())
        .await
        .unwrap();

    assert!(!first.duplicate);
    assert!(second.duplicate);
    assert_eq!(first.job.id, second.job.id);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM print_jobs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn duplicate_enqueue_returns_existing_job_in_any_status(pool: PgPool) {
    let mut input = receipt_job();
    input.job_key = Some("T2-print".into());

    let job = enqueue(&pool, input.clone()).await;
    claim(&pool, "agent-1").await.unwrap();

    let again = QueueEngine::enqueue(&pool, &input, &requester())
        .await
        .unwrap();
    assert!(again.duplicate);
    assert_eq!(again.job.id, job.id);
    assert_eq!(again.job.status_id, PrintJobStatus::Claimed.id());
}

#[sqlx::test(migrations = "../../migrations")]
async fn enqueue_rejects_missing_required_fields(pool: PgPool) {
    let mut blank_type = receipt_job();
    blank_type.job_type = "  ".into();
    let err = QueueEngine::enqueue(&pool, &blank_type, &requester())
        .await
        .unwrap_err();
    assert_matches!(err, QueueError::Core(CoreError::Validation(_)));

    let mut null_payload = receipt_job();
    null_payload.payload = serde_json::Value::Null;
    let err = QueueEngine::enqueue(&pool, &null_payload, &requester())
        .await
        .unwrap_err();
    assert_matches!(err, QueueError::Core(CoreError::Validation(_)));
}

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn claim_returns_none_on_empty_queue(pool: PgPool) {
    assert!(claim(&pool, "agent-1").await.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn claim_prefers_higher_priority(pool: PgPool) {
    let mut low = receipt_job();
    low.priority = Some(PRIORITY_BACKGROUND);
    let low = enqueue(&pool, low).await;

    let mut high = receipt_job();
    high.priority = Some(PRIORITY_URGENT);
    let high = enqueue(&pool, high).await;

    let first = claim(&pool, "agent-1").await.unwrap();
    let second = claim(&pool, "agent-1").await.unwrap();

    assert_eq!(first.id, high.id);
    assert_eq!(second.id, low.id);
}

#[sqlx::test(migrations = "../../migrations")]
async fn claim_is_fifo_within_a_priority_band(pool: PgPool) {
    let older = enqueue(&pool, receipt_job()).await;
    let newer = enqueue(&pool, receipt_job()).await;

    assert_eq!(claim(&pool, "agent-1").await.unwrap().id, older.id);
    assert_eq!(claim(&pool, "agent-1").await.unwrap().id, newer.id);
}

#[sqlx::test(migrations = "../../migrations")]
async fn claim_skips_jobs_scheduled_in_the_future(pool: PgPool) {
    let mut deferred = receipt_job();
    deferred.scheduled_for = Some(chrono::Utc::now() + chrono::Duration::hours(1));
    enqueue(&pool, deferred).await;

    assert!(claim(&pool, "agent-1").await.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn claim_honours_job_type_and_profile_filters(pool: PgPool) {
    let mut ticket = receipt_job();
    ticket.job_type = "ticket".into();
    ticket.printer_profile = Some("gate-printer".into());
    let ticket = enqueue(&pool, ticket).await;

    let receipt = enqueue(&pool, receipt_job()).await;

    // Type filter: only tickets.
    let filter = ClaimFilter {
        job_types: Some(vec!["ticket".into()]),
        ..ClaimFilter::default()
    };
    let got = QueueEngine::claim(&pool, "agent-1", &filter)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(got.id, ticket.id);

    // Profile filter: a job with no profile matches any agent; the
    // remaining receipt job has no profile so it is claimable even with a
    // profile restriction.
    let filter = ClaimFilter {
        printer_profiles: Some(vec!["lobby-printer".into()]),
        ..ClaimFilter::default()
    };
    let got = QueueEngine::claim(&pool, "agent-2", &filter)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(got.id, receipt.id);
}

#[sqlx::test(migrations = "../../migrations")]
async fn claim_excludes_jobs_with_non_matching_profile(pool: PgPool) {
    let mut gated = receipt_job();
    gated.printer_profile = Some("gate-printer".into());
    enqueue(&pool, gated).await;

    let filter = ClaimFilter {
        printer_profiles: Some(vec!["lobby-printer".into()]),
        ..ClaimFilter::default()
    };
    assert!(QueueEngine::claim(&pool, "agent-1", &filter)
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn claim_sets_holder_and_bumps_attempts(pool: PgPool) {
    let job = enqueue(&pool, receipt_job()).await;

    let claimed = claim(&pool, "agent-1").await.unwrap();
    assert_eq!(claimed.id, job.id);
    assert_eq!(claimed.status_id, PrintJobStatus::Claimed.id());
    assert_eq!(claimed.claimed_by.as_deref(), Some("agent-1"));
    assert!(claimed.claimed_at.is_some());
    assert_eq!(claimed.attempts, 1);

    // The job is no longer in the claimable pool.
    assert!(claim(&pool, "agent-2").await.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn concurrent_claims_never_hand_out_the_same_job(pool: PgPool) {
    let a = enqueue(&pool, receipt_job()).await;
    let b = enqueue(&pool, receipt_job()).await;

    let filter = ClaimFilter::default();
    let (r1, r2, r3, r4) = tokio::join!(
        QueueEngine::claim(&pool, "agent-1", &filter),
        QueueEngine::claim(&pool, "agent-2", &filter),
        QueueEngine::claim(&pool, "agent-3", &filter),
        QueueEngine::claim(&pool, "agent-4", &filter),
    );

    let won: Vec<_> = [r1, r2, r3, r4]
        .into_iter()
        .filter_map(|r| r.unwrap())
        .collect();

    // Both jobs claimed, no job claimed twice.
    let mut ids: Vec<_> = won.iter().map(|j| j.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(won.len(), 2);
    assert_eq!(ids, {
        let mut expected = vec![a.id, b.id];
        expected.sort_unstable();
        expected
    });
}

#[sqlx::test(migrations = "../../migrations")]
async fn include_assigned_resumes_own_lease_without_bumping_attempts(pool: PgPool) {
    let job = enqueue(&pool, receipt_job()).await;
    let claimed = claim(&pool, "agent-1").await.unwrap();
    assert_eq!(claimed.attempts, 1);

    // Plain claim finds nothing -- the job is already held.
    assert!(claim(&pool, "agent-1").await.is_none());

    let resume = ClaimFilter {
        include_assigned: true,
        ..ClaimFilter::default()
    };
    let resumed = QueueEngine::claim(&pool, "agent-1", &resume)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resumed.id, job.id);
    assert_eq!(resumed.attempts, 1);

    // Another agent cannot resume someone else's lease.
    assert!(QueueEngine::claim(&pool, "agent-2", &resume)
        .await
        .unwrap()
        .is_none());
}

// ---------------------------------------------------------------------------
// Lifecycle: printing, complete
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn happy_path_runs_to_completion_with_full_event_trail(pool: PgPool) {
    let job = enqueue(&pool, receipt_job()).await;
    claim(&pool, "agent-1").await.unwrap();

    let printing = QueueEngine::mark_printing(&pool, job.id, "agent-1", None)
        .await
        .unwrap();
    assert_eq!(printing.status_id, PrintJobStatus::Printing.id());
    assert!(printing.started_at.is_some());

    let done = QueueEngine::complete(&pool, job.id, "agent-1", Some("printed 1 page"))
        .await
        .unwrap();
    assert_eq!(done.status_id, PrintJobStatus::Completed.id());
    assert!(done.completed_at.is_some());
    assert!(done.claimed_by.is_none());

    // Event trail, newest first: completed, printing, claimed, enqueued.
    let with_events = QueueEngine::get(&pool, job.id).await.unwrap();
    let transitions: Vec<_> = with_events
        .events
        .iter()
        .map(|e| (e.from_status_id, e.to_status_id))
        .collect();
    assert_eq!(
        transitions,
        vec![(Some(3), 4), (Some(2), 3), (Some(1), 2), (None, 1)]
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn ownership_guard_rejects_other_agents(pool: PgPool) {
    let job = enqueue(&pool, receipt_job()).await;
    claim(&pool, "agent-1").await.unwrap();

    let err = QueueEngine::mark_printing(&pool, job.id, "agent-2", None)
        .await
        .unwrap_err();
    assert_matches!(err, QueueError::Core(CoreError::Conflict(_)));

    QueueEngine::mark_printing(&pool, job.id, "agent-1", None)
        .await
        .unwrap();

    let err = QueueEngine::complete(&pool, job.id, "agent-2", None)
        .await
        .unwrap_err();
    assert_matches!(err, QueueError::Core(CoreError::Conflict(_)));

    let err = QueueEngine::fail(&pool, job.id, "agent-2", "paper jam", None)
        .await
        .unwrap_err();
    assert_matches!(err, QueueError::Core(CoreError::Conflict(_)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn complete_requires_printing_status(pool: PgPool) {
    let job = enqueue(&pool, receipt_job()).await;
    claim(&pool, "agent-1").await.unwrap();

    // Claimed but not yet printing: completing skips a lifecycle step.
    let err = QueueEngine::complete(&pool, job.id, "agent-1", None)
        .await
        .unwrap_err();
    assert_matches!(err, QueueError::Core(CoreError::InvalidStateTransition(_)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn operations_on_missing_jobs_return_not_found(pool: PgPool) {
    let err = QueueEngine::get(&pool, 999_999).await.unwrap_err();
    assert_matches!(err, QueueError::Core(CoreError::NotFound { .. }));

    let err = QueueEngine::complete(&pool, 999_999, "agent-1", None)
        .await
        .unwrap_err();
    assert_matches!(err, QueueError::Core(CoreError::NotFound { .. }));

    let err = QueueEngine::cancel(&pool, 999_999, "cashier1", None)
        .await
        .unwrap_err();
    assert_matches!(err, QueueError::Core(CoreError::NotFound { .. }));
}

// ---------------------------------------------------------------------------
// Fail / retry
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn fail_with_retries_left_requeues_with_backoff(pool: PgPool) {
    let mut input = receipt_job();
    input.max_retries = Some(1);
    let job = enqueue(&pool, input).await;
    claim(&pool, "agent-1").await.unwrap();

    let before = chrono::Utc::now();
    let failed = QueueEngine::fail(&pool, job.id, "agent-1", "printer offline", None)
        .await
        .unwrap();

    assert_eq!(failed.status_id, PrintJobStatus::Queued.id());
    assert_eq!(failed.attempts, 1);
    assert_eq!(failed.last_error.as_deref(), Some("printer offline"));
    assert!(failed.claimed_by.is_none());
    assert!(failed.claimed_at.is_none());
    // Backoff pushed the next claim window into the future.
    assert!(failed.scheduled_for > before);

    // Not claimable until the backoff elapses.
    assert!(claim(&pool, "agent-1").await.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn fail_exhausts_to_terminal_failed(pool: PgPool) {
    let mut input = receipt_job();
    input.max_retries = Some(1);
    let job = enqueue(&pool, input).await;

    // Attempt 1: fail with an immediate retry window.
    claim(&pool, "agent-1").await.unwrap();
    QueueEngine::fail(&pool, job.id, "agent-1", "printer offline", Some(0))
        .await
        .unwrap();

    // Attempt 2: retries are now exhausted.
    let reclaimed = claim(&pool, "agent-1").await.unwrap();
    assert_eq!(reclaimed.id, job.id);
    assert_eq!(reclaimed.attempts, 2);

    let dead = QueueEngine::fail(&pool, job.id, "agent-1", "printer offline", Some(0))
        .await
        .unwrap();
    assert_eq!(dead.status_id, PrintJobStatus::Failed.id());
    assert_eq!(dead.attempts, 2);
    assert_eq!(dead.last_error.as_deref(), Some("printer offline"));
    assert!(dead.failed_at.is_some());
    assert!(dead.claimed_by.is_none());

    // Terminal: never reclaimed.
    assert!(claim(&pool, "agent-1").await.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn three_failures_with_max_retries_two_end_terminal(pool: PgPool) {
    let mut input = receipt_job();
    input.max_retries = Some(2);
    let job = enqueue(&pool, input).await;

    for _ in 0..2 {
        claim(&pool, "agent-1").await.unwrap();
        let failed = QueueEngine::fail(&pool, job.id, "agent-1", "jam", Some(0))
            .await
            .unwrap();
        assert_eq!(failed.status_id, PrintJobStatus::Queued.id());
    }

    claim(&pool, "agent-1").await.unwrap();
    let dead = QueueEngine::fail(&pool, job.id, "agent-1", "jam", Some(0))
        .await
        .unwrap();
    assert_eq!(dead.status_id, PrintJobStatus::Failed.id());
    assert_eq!(dead.attempts, 3);
}

#[sqlx::test(migrations = "../../migrations")]
async fn fail_on_unclaimed_job_is_an_invalid_transition(pool: PgPool) {
    let job = enqueue(&pool, receipt_job()).await;

    let err = QueueEngine::fail(&pool, job.id, "agent-1", "jam", None)
        .await
        .unwrap_err();
    assert_matches!(err, QueueError::Core(CoreError::InvalidStateTransition(_)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn fail_requires_an_error_message(pool: PgPool) {
    let job = enqueue(&pool, receipt_job()).await;
    claim(&pool, "agent-1").await.unwrap();

    let err = QueueEngine::fail(&pool, job.id, "agent-1", "   ", None)
        .await
        .unwrap_err();
    assert_matches!(err, QueueError::Core(CoreError::Validation(_)));
}

// ---------------------------------------------------------------------------
// Cancel / terminal immutability
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn cancel_removes_queued_job_from_pool(pool: PgPool) {
    let job = enqueue(&pool, receipt_job()).await;

    let cancelled = QueueEngine::cancel(&pool, job.id, "cashier1", Some("ticket voided"))
        .await
        .unwrap();
    assert_eq!(cancelled.status_id, PrintJobStatus::Cancelled.id());
    assert!(cancelled.cancelled_at.is_some());

    assert!(claim(&pool, "agent-1").await.is_none());

    let with_events = QueueEngine::get(&pool, job.id).await.unwrap();
    let cancel_event = &with_events.events[0];
    assert_eq!(cancel_event.to_status_id, PrintJobStatus::Cancelled.id());
    assert_eq!(cancel_event.detail.as_deref(), Some("ticket voided"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn cancel_event_records_the_exact_from_status(pool: PgPool) {
    let job = enqueue(&pool, receipt_job()).await;
    claim(&pool, "agent-1").await.unwrap();
    QueueEngine::mark_printing(&pool, job.id, "agent-1", None)
        .await
        .unwrap();

    QueueEngine::cancel(&pool, job.id, "cashier1", None)
        .await
        .unwrap();

    let with_events = QueueEngine::get(&pool, job.id).await.unwrap();
    let cancel_event = &with_events.events[0];
    assert_eq!(
        cancel_event.from_status_id,
        Some(PrintJobStatus::Printing.id())
    );
    assert_eq!(cancel_event.to_status_id, PrintJobStatus::Cancelled.id());
}

#[sqlx::test(migrations = "../../migrations")]
async fn completion_after_cancellation_is_an_invalid_transition(pool: PgPool) {
    let job = enqueue(&pool, receipt_job()).await;
    claim(&pool, "agent-1").await.unwrap();

    QueueEngine::cancel(&pool, job.id, "cashier1", None)
        .await
        .unwrap();

    let err = QueueEngine::complete(&pool, job.id, "agent-1", None)
        .await
        .unwrap_err();
    assert_matches!(err, QueueError::Core(CoreError::InvalidStateTransition(_)));

    let err = QueueEngine::fail(&pool, job.id, "agent-1", "jam", None)
        .await
        .unwrap_err();
    assert_matches!(err, QueueError::Core(CoreError::InvalidStateTransition(_)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn terminal_jobs_reject_every_further_mutation(pool: PgPool) {
    let job = enqueue(&pool, receipt_job()).await;
    claim(&pool, "agent-1").await.unwrap();
    QueueEngine::mark_printing(&pool, job.id, "agent-1", None)
        .await
        .unwrap();
    QueueEngine::complete(&pool, job.id, "agent-1", None)
        .await
        .unwrap();

    let err = QueueEngine::cancel(&pool, job.id, "cashier1", None)
        .await
        .unwrap_err();
    assert_matches!(err, QueueError::Core(CoreError::InvalidStateTransition(_)));

    let err = QueueEngine::mark_printing(&pool, job.id, "agent-1", None)
        .await
        .unwrap_err();
    assert_matches!(err, QueueError::Core(CoreError::InvalidStateTransition(_)));

    let err = QueueEngine::complete(&pool, job.id, "agent-1", None)
        .await
        .unwrap_err();
    assert_matches!(err, QueueError::Core(CoreError::InvalidStateTransition(_)));
}

// ---------------------------------------------------------------------------
// List / stats
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn list_filters_and_orders_newest_first(pool: PgPool) {
    let receipt = enqueue(&pool, receipt_job()).await;

    let mut ticket = receipt_job();
    ticket.job_type = "ticket".into();
    ticket.job_key = Some("gate-7-T99".into());
    let ticket = enqueue(&pool, ticket).await;

    let all = QueueEngine::list(&pool, &Default::default()).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, ticket.id, "newest first");

    let only_tickets = QueueEngine::list(
        &pool,
        &parkprint_db::models::print_job::JobListQuery {
            job_type: Some("ticket".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(only_tickets.len(), 1);
    assert_eq!(only_tickets[0].id, ticket.id);

    let searched = QueueEngine::list(
        &pool,
        &parkprint_db::models::print_job::JobListQuery {
            search: Some("gate-7".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(searched.len(), 1);
    assert_eq!(searched[0].id, ticket.id);

    let limited = QueueEngine::list(
        &pool,
        &parkprint_db::models::print_job::JobListQuery {
            limit: Some(1),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(limited.len(), 1);

    claim(&pool, "agent-1").await.unwrap();
    let queued_only = QueueEngine::list(
        &pool,
        &parkprint_db::models::print_job::JobListQuery {
            status_id: Some(PrintJobStatus::Queued.id()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(queued_only.len(), 1);
    assert_eq!(queued_only[0].id, receipt.id);
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_since_excludes_jobs_created_before_the_cutoff(pool: PgPool) {
    let old = enqueue(&pool, receipt_job()).await;
    let recent = enqueue(&pool, receipt_job()).await;

    // Age the first job past the cutoff.
    sqlx::query(
        "UPDATE print_jobs SET created_at = created_at - interval '1 hour' WHERE id = $1",
    )
    .bind(old.id)
    .execute(&pool)
    .await
    .unwrap();

    let jobs = QueueEngine::list(
        &pool,
        &parkprint_db::models::print_job::JobListQuery {
            since: Some(chrono::Utc::now() - chrono::Duration::minutes(30)),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, recent.id);
}

#[sqlx::test(migrations = "../../migrations")]
async fn status_counts_group_by_status(pool: PgPool) {
    enqueue(&pool, receipt_job()).await;
    enqueue(&pool, receipt_job()).await;
    claim(&pool, "agent-1").await.unwrap();

    let counts = QueueEngine::status_counts(&pool).await.unwrap();
    let queued = counts
        .iter()
        .find(|c| c.status_id == PrintJobStatus::Queued.id())
        .unwrap();
    let claimed = counts
        .iter()
        .find(|c| c.status_id == PrintJobStatus::Claimed.id())
        .unwrap();
    assert_eq!(queued.count, 1);
    assert_eq!(claimed.count, 1);
}
