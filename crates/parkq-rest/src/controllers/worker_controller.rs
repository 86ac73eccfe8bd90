//! Worker-facing lease endpoints.

use crate::{
    controllers::queue_controller::TicketKey,
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
use parkq_jobs::{LookupOutcome, WorkOffer, WorkerInfo};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use utoipa::ToSchema;
use validator::Validate;

/// Creates the worker router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/work/:client_id", get(request_work))
        .route("/heartbeat", post(heartbeat))
        .route("/result", post(submit_result))
        .route("/disconnect", post(disconnect))
        .route("/workers", get(list_workers))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Worker identification.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "clientId is required"))]
    pub client_id: String,
}

/// Lease renewal request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "clientId is required"))]
    pub client_id: String,
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "ticketNum is required"))]
    pub ticket_num: String,
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "plateNum is required"))]
    pub plate_num: String,
}

/// Lookup outcome reported by a worker. A present `error` marks the lookup
/// failed; otherwise `response` is stored as the result.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResultRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "clientId is required"))]
    pub client_id: String,
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "ticketNum is required"))]
    pub ticket_num: String,
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "plateNum is required"))]
    pub plate_num: String,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub response: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ResultRequest {
    fn outcome(&self) -> LookupOutcome {
        match &self.error {
            Some(message) => LookupOutcome::Error(message.clone()),
            None => LookupOutcome::Success(self.response.clone().unwrap_or(Value::Null)),
        }
    }
}

/// Acknowledgement.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OkResponse {
    pub ok: bool,
}

/// A job leased to the caller.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignedWork {
    pub ticket_num: String,
    pub plate_num: String,
    pub lease_expires_at: DateTime<Utc>,
}

/// No new job: `busy` (the caller already holds one) or `none`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkStatus {
    pub status: String,
    /// Job still held, when busy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<TicketKey>,
}

/// Answer to a work poll.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum WorkResponse {
    Assigned(AssignedWork),
    Idle(WorkStatus),
}

impl From<WorkOffer> for WorkResponse {
    fn from(offer: WorkOffer) -> Self {
        match offer {
            WorkOffer::Assigned(job) => match job.lease_expires_at() {
                Some(lease_expires_at) => Self::Assigned(AssignedWork {
                    ticket_num: job.key().ticket_num().to_string(),
                    plate_num: job.key().plate_num().to_string(),
                    lease_expires_at,
                }),
                None => Self::Idle(WorkStatus {
                    status: "none".to_string(),
                    current: None,
                }),
            },
            WorkOffer::Busy(key) => Self::Idle(WorkStatus {
                status: "busy".to_string(),
                current: Some(TicketKey::from(&key)),
            }),
            WorkOffer::NoneAvailable => Self::Idle(WorkStatus {
                status: "none".to_string(),
                current: None,
            }),
        }
    }
}

/// Renewed lease.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatResponse {
    pub ok: bool,
    pub lease_expires_at: DateTime<Utc>,
}

/// Accepted result.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResultResponse {
    pub ok: bool,
    /// `completed` or `failed`.
    pub status: String,
}

/// Disconnect outcome.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DisconnectResponse {
    pub ok: bool,
    /// Job whose lease was released, if any.
    pub released: Option<TicketKey>,
}

/// Worker snapshot.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkerResponse {
    pub client_id: String,
    pub registered_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub current_job: Option<TicketKey>,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
}

impl From<&WorkerInfo> for WorkerResponse {
    fn from(info: &WorkerInfo) -> Self {
        Self {
            client_id: info.id.to_string(),
            registered_at: info.registered_at,
            last_seen_at: info.last_seen_at,
            current_job: info.current_job.as_ref().map(TicketKey::from),
            jobs_completed: info.jobs_completed,
            jobs_failed: info.jobs_failed,
        }
    }
}

/// Known workers.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WorkersResponse {
    pub workers: Vec<WorkerResponse>,
}

// ============================================================================
// Handler Functions
// ============================================================================

/// Register a worker, or refresh one already known.
#[utoipa::path(
    post,
    path = "/register",
    tag = "workers",
    request_body = ClientRequest,
    responses(
        (status = 200, description = "Worker registered", body = OkResponse),
        (status = 400, description = "Missing clientId", body = ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<ClientRequest>,
) -> ApiResult<OkResponse> {
    state.gateway.register_worker(&request.client_id)?;
    ok(OkResponse { ok: true })
}

/// Poll for work.
#[utoipa::path(
    get,
    path = "/work/{client_id}",
    tag = "workers",
    params(("client_id" = String, Path, description = "Worker ID")),
    responses(
        (status = 200, description = "Leased job, or busy/none", body = WorkResponse),
        (status = 400, description = "Blank clientId", body = ErrorResponse)
    )
)]
pub async fn request_work(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> ApiResult<WorkResponse> {
    let offer = state.gateway.request_work(&client_id)?;
    ok(WorkResponse::from(offer))
}

/// Renew the caller's lease.
#[utoipa::path(
    post,
    path = "/heartbeat",
    tag = "workers",
    request_body = HeartbeatRequest,
    responses(
        (status = 200, description = "Lease renewed", body = HeartbeatResponse),
        (status = 400, description = "Missing field", body = ErrorResponse),
        (status = 404, description = "Caller does not hold the lease", body = ErrorResponse)
    )
)]
pub async fn heartbeat(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<HeartbeatRequest>,
) -> ApiResult<HeartbeatResponse> {
    let lease_expires_at =
        state
            .gateway
            .heartbeat(&request.client_id, &request.ticket_num, &request.plate_num)?;

    ok(HeartbeatResponse {
        ok: true,
        lease_expires_at,
    })
}

/// Report a lookup outcome.
#[utoipa::path(
    post,
    path = "/result",
    tag = "workers",
    request_body = ResultRequest,
    responses(
        (status = 200, description = "Result recorded", body = ResultResponse),
        (status = 400, description = "Missing field", body = ErrorResponse),
        (status = 404, description = "Caller does not hold the lease", body = ErrorResponse)
    )
)]
pub async fn submit_result(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<ResultRequest>,
) -> ApiResult<ResultResponse> {
    let status = state.gateway.submit_result(
        &request.client_id,
        &request.ticket_num,
        &request.plate_num,
        request.outcome(),
    )?;

    ok(ResultResponse {
        ok: true,
        status: status.to_string(),
    })
}

/// Drop a worker and release its lease now.
#[utoipa::path(
    post,
    path = "/disconnect",
    tag = "workers",
    request_body = ClientRequest,
    responses(
        (status = 200, description = "Worker removed", body = DisconnectResponse),
        (status = 400, description = "Missing clientId", body = ErrorResponse)
    )
)]
pub async fn disconnect(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<ClientRequest>,
) -> ApiResult<DisconnectResponse> {
    debug!(client_id = %request.client_id, "Disconnect request");

    let released = state.gateway.disconnect(&request.client_id)?;
    ok(DisconnectResponse {
        ok: true,
        released: released.as_ref().map(TicketKey::from),
    })
}

/// List known workers.
#[utoipa::path(
    get,
    path = "/workers",
    tag = "workers",
    responses(
        (status = 200, description = "Known workers", body = WorkersResponse)
    )
)]
pub async fn list_workers(State(state): State<AppState>) -> ApiResult<WorkersResponse> {
    let workers = state
        .gateway
        .workers()
        .iter()
        .map(WorkerResponse::from)
        .collect();
    ok(WorkersResponse { workers })
}
