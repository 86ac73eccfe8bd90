//! Producer-facing queue endpoints.

use crate::{
    extractors::ValidatedJson,
    responses::{ok, ApiResult},
    state::AppState,
};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use parkq_core::{rules::not_blank, ErrorResponse};
use parkq_jobs::{Job, JobKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use utoipa::ToSchema;
use validator::Validate;

/// Creates the queue router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/enqueue", post(enqueue))
        .route("/ticket/:ticket_num/:plate_num", get(ticket_status))
        .route("/queue", get(pending))
        .route("/stats", get(stats))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Lookup request from a producer.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    /// Parking ticket number.
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "ticketNum is required"))]
    pub ticket_num: String,
    /// Licence plate number.
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "plateNum is required"))]
    pub plate_num: String,
}

/// Enqueue outcome.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EnqueueResponse {
    /// False when an identical lookup was already in flight.
    pub queued: bool,
}

/// A ticket/plate pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketKey {
    pub ticket_num: String,
    pub plate_num: String,
}

impl From<&JobKey> for TicketKey {
    fn from(key: &JobKey) -> Self {
        Self {
            ticket_num: key.ticket_num().to_string(),
            plate_num: key.plate_num().to_string(),
        }
    }
}

/// State of a lookup. A finished lookup is reported once.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketStatusResponse {
    /// One of `pending`, `assigned`, `completed`, `failed`.
    pub status: String,
    /// Lookup result, once finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub response: Option<Value>,
    /// Worker holding the lease.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    /// Current lease deadline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_expires_at: Option<DateTime<Utc>>,
    /// Number of times the job has been leased.
    pub attempts: u32,
}

impl From<&Job> for TicketStatusResponse {
    fn from(job: &Job) -> Self {
        Self {
            status: job.status().to_string(),
            response: job.result().cloned(),
            assigned_to: job.assigned_worker().map(ToString::to_string),
            lease_expires_at: job.lease_expires_at(),
            attempts: job.attempts(),
        }
    }
}

/// Pending lookups, oldest first.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PendingResponse {
    pub pending: Vec<TicketKey>,
}

/// Queue counters.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub pending: usize,
    pub assigned: usize,
    pub completed: usize,
    pub failed: usize,
    pub workers: usize,
    pub busy_workers: usize,
}

// ============================================================================
// Handler Functions
// ============================================================================

/// Queue a lookup.
#[utoipa::path(
    post,
    path = "/enqueue",
    tag = "queue",
    request_body = EnqueueRequest,
    responses(
        (status = 200, description = "Lookup queued or already in flight", body = EnqueueResponse),
        (status = 400, description = "Missing ticket or plate", body = ErrorResponse),
        (status = 409, description = "Duplicate rejected", body = ErrorResponse),
        (status = 503, description = "Queue full", body = ErrorResponse)
    )
)]
pub async fn enqueue(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<EnqueueRequest>,
) -> ApiResult<EnqueueResponse> {
    let outcome = state
        .gateway
        .enqueue(&request.ticket_num, &request.plate_num)?;

    ok(EnqueueResponse {
        queued: outcome.queued(),
    })
}

/// Read the state of a lookup. A completed or failed result is removed once
/// it has been returned.
#[utoipa::path(
    get,
    path = "/ticket/{ticket_num}/{plate_num}",
    tag = "queue",
    params(
        ("ticket_num" = String, Path, description = "Parking ticket number"),
        ("plate_num" = String, Path, description = "Licence plate number")
    ),
    responses(
        (status = 200, description = "Lookup state", body = TicketStatusResponse),
        (status = 404, description = "Unknown or already delivered", body = ErrorResponse)
    )
)]
pub async fn ticket_status(
    State(state): State<AppState>,
    Path((ticket_num, plate_num)): Path<(String, String)>,
) -> ApiResult<TicketStatusResponse> {
    debug!(ticket_num = %ticket_num, plate_num = %plate_num, "Status request");

    let job = state.gateway.status(&ticket_num, &plate_num)?;
    ok(TicketStatusResponse::from(&job))
}

/// List pending lookups.
#[utoipa::path(
    get,
    path = "/queue",
    tag = "queue",
    responses(
        (status = 200, description = "Pending lookups, oldest first", body = PendingResponse)
    )
)]
pub async fn pending(State(state): State<AppState>) -> ApiResult<PendingResponse> {
    let pending = state.gateway.pending().iter().map(TicketKey::from).collect();
    ok(PendingResponse { pending })
}

/// Queue counters.
#[utoipa::path(
    get,
    path = "/stats",
    tag = "queue",
    responses(
        (status = 200, description = "Queue counters", body = StatsResponse)
    )
)]
pub async fn stats(State(state): State<AppState>) -> ApiResult<StatsResponse> {
    let stats = state.gateway.stats();
    ok(StatsResponse {
        pending: stats.jobs.pending,
        assigned: stats.jobs.assigned,
        completed: stats.jobs.completed,
        failed: stats.jobs.failed,
        workers: stats.workers,
        busy_workers: stats.busy_workers,
    })
}
