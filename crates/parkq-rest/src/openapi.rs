//! OpenAPI documentation configuration.

use crate::controllers::{
    health_controller::HealthResponse,
    queue_controller::{
        EnqueueRequest, EnqueueResponse, PendingResponse, StatsResponse, TicketKey,
        TicketStatusResponse,
    },
    worker_controller::{
        AssignedWork, ClientRequest, DisconnectResponse, HeartbeatRequest, HeartbeatResponse,
        OkResponse, ResultRequest, ResultResponse, WorkResponse, WorkStatus, WorkerResponse,
        WorkersResponse,
    },
};
use parkq_core::{ErrorResponse, FieldError};
use utoipa::OpenApi;

/// OpenAPI documentation for the parkq API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Parkq API",
        version = "1.0.0",
        description = "Lease-coordinated parking ticket lookup queue",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Producer endpoints
        crate::controllers::queue_controller::enqueue,
        crate::controllers::queue_controller::ticket_status,
        crate::controllers::queue_controller::pending,
        crate::controllers::queue_controller::stats,
        // Worker endpoints
        crate::controllers::worker_controller::register,
        crate::controllers::worker_controller::request_work,
        crate::controllers::worker_controller::heartbeat,
        crate::controllers::worker_controller::submit_result,
        crate::controllers::worker_controller::disconnect,
        crate::controllers::worker_controller::list_workers,
        // Health endpoints
        crate::controllers::health_controller::health_check,
        crate::controllers::health_controller::readiness_check,
        crate::controllers::health_controller::liveness_check,
    ),
    components(
        schemas(
            ErrorResponse,
            FieldError,
            HealthResponse,
            EnqueueRequest,
            EnqueueResponse,
            TicketKey,
            TicketStatusResponse,
            PendingResponse,
            StatsResponse,
            ClientRequest,
            HeartbeatRequest,
            ResultRequest,
            OkResponse,
            AssignedWork,
            WorkStatus,
            WorkResponse,
            HeartbeatResponse,
            ResultResponse,
            DisconnectResponse,
            WorkerResponse,
            WorkersResponse,
        )
    ),
    tags(
        (name = "queue", description = "Producer endpoints"),
        (name = "workers", description = "Worker lease endpoints"),
        (name = "health", description = "Health check endpoints")
    )
)]
pub struct ApiDoc;
