//! Main application router.

use crate::{
    controllers::{health_controller, queue_controller, worker_controller},
    middleware::logging_middleware,
    openapi::ApiDoc,
    state::AppState,
};
use axum::{http::HeaderValue, middleware, routing::get, Router};
use parkq_config::{ObservabilityConfig, ServerConfig};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Creates the main application router.
pub fn create_router(
    state: AppState,
    server_config: &ServerConfig,
    observability: &ObservabilityConfig,
) -> Router {
    let cors = create_cors_layer(server_config);

    let api_router = Router::new()
        .merge(queue_controller::router())
        .merge(worker_controller::router());

    let metrics_path = observability
        .metrics_enabled
        .then_some(observability.metrics_path.as_str());

    let router = Router::new()
        // Health and metrics endpoints
        .merge(health_controller::router(metrics_path))
        // API v1
        .nest("/api/v1", api_router)
        // Root endpoint
        .route("/", get(root))
        .with_state(state)
        // Swagger UI and OpenAPI document
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add middleware layers
        .layer(TimeoutLayer::new(server_config.request_timeout()))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(logging_middleware));

    info!("Router created with REST endpoints and Swagger UI at /swagger-ui");
    router
}

/// Creates a CORS layer based on server configuration.
fn create_cors_layer(server_config: &ServerConfig) -> CorsLayer {
    if !server_config.cors_enabled {
        return CorsLayer::new();
    }

    if server_config.cors_origins.iter().any(|origin| origin == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = server_config
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Root endpoint handler.
async fn root() -> &'static str {
    "Parkq lookup queue API v1"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use parkq_config::{DuplicatePolicy, TimeoutPolicy};
    use parkq_jobs::{LeaseConfig, LeaseGateway};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    fn app_observed(observability: &ObservabilityConfig) -> Router {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        create_router(
            AppState::new(LeaseGateway::new(LeaseConfig::default())).with_metrics(handle),
            &ServerConfig::default(),
            observability,
        )
    }

    fn app_with(config: LeaseConfig) -> (Router, LeaseGateway) {
        let gateway = LeaseGateway::new(config);
        let router = create_router(
            AppState::new(gateway.clone()),
            &ServerConfig::default(),
            &ObservabilityConfig::default(),
        );
        (router, gateway)
    }

    fn app() -> Router {
        app_with(LeaseConfig::default()).0
    }

    async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn post(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        send(router, Method::POST, uri, Some(body)).await
    }

    async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
        send(router, Method::GET, uri, None).await
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let router = app();
        let (status, body) = get(&router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        assert_eq!(get(&router, "/ready").await.0, StatusCode::OK);
        assert_eq!(get(&router, "/live").await.0, StatusCode::OK);
        // No recorder attached.
        assert_eq!(get(&router, "/metrics").await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_disabled_metrics_path_is_not_mounted() {
        let observability = ObservabilityConfig {
            metrics_enabled: false,
            metrics_path: "metrics".to_string(),
            ..Default::default()
        };
        let router = app_observed(&observability);

        assert_eq!(get(&router, "/health").await.0, StatusCode::OK);
        assert_eq!(get(&router, "/metrics").await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_custom_metrics_path() {
        let observability = ObservabilityConfig {
            metrics_path: "/internal/metrics".to_string(),
            ..Default::default()
        };
        let router = app_observed(&observability);

        assert_eq!(get(&router, "/internal/metrics").await.0, StatusCode::OK);
        assert_eq!(get(&router, "/metrics").await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_full_lookup_cycle() {
        let router = app();
        let key = json!({"ticketNum": "PM451052", "plateNum": "CZCL340"});

        let (status, body) = post(&router, "/api/v1/enqueue", key.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"queued": true}));

        let (_, body) = post(&router, "/api/v1/enqueue", key).await;
        assert_eq!(body, json!({"queued": false}));

        let (status, body) = post(&router, "/api/v1/register", json!({"clientId": "w1"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true}));

        let (_, work) = get(&router, "/api/v1/work/w1").await;
        assert_eq!(work["ticketNum"], "PM451052");
        assert_eq!(work["plateNum"], "CZCL340");
        assert!(work["leaseExpiresAt"].is_string());

        let (_, busy) = get(&router, "/api/v1/work/w1").await;
        assert_eq!(busy["status"], "busy");

        let (_, status_body) = get(&router, "/api/v1/ticket/PM451052/CZCL340").await;
        assert_eq!(status_body["status"], "assigned");
        assert_eq!(status_body["assignedTo"], "w1");

        let (status, hb) = post(
            &router,
            "/api/v1/heartbeat",
            json!({"clientId": "w1", "ticketNum": "PM451052", "plateNum": "CZCL340"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(hb["ok"], true);

        let (status, result) = post(
            &router,
            "/api/v1/result",
            json!({
                "clientId": "w1",
                "ticketNum": "PM451052",
                "plateNum": "CZCL340",
                "response": {"amount": "30.00"}
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(result, json!({"ok": true, "status": "completed"}));

        let (status, body) = get(&router, "/api/v1/ticket/PM451052/CZCL340").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["response"]["amount"], "30.00");

        let (status, body) = get(&router, "/api/v1/ticket/PM451052/CZCL340").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_idle_worker_gets_none() {
        let (status, body) = get(&app(), "/api/v1/work/w1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "none"}));
    }

    #[tokio::test]
    async fn test_non_owner_is_not_assigned() {
        let router = app();
        post(&router, "/api/v1/enqueue", json!({"ticketNum": "PM1", "plateNum": "AAA"})).await;
        get(&router, "/api/v1/work/w1").await;

        let (status, body) = post(
            &router,
            "/api/v1/heartbeat",
            json!({"clientId": "w2", "ticketNum": "PM1", "plateNum": "AAA"}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_ASSIGNED");

        let (status, body) = post(
            &router,
            "/api/v1/result",
            json!({"clientId": "w2", "ticketNum": "PM1", "plateNum": "AAA", "response": {}}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_ASSIGNED");
    }

    #[tokio::test]
    async fn test_reports_for_unknown_key_are_not_found() {
        let router = app();
        post(&router, "/api/v1/register", json!({"clientId": "w1"})).await;

        let (status, body) = post(
            &router,
            "/api/v1/heartbeat",
            json!({"clientId": "w1", "ticketNum": "PM404", "plateNum": "ZZZ"}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");

        let (status, body) = post(
            &router,
            "/api/v1/result",
            json!({"clientId": "w1", "ticketNum": "PM404", "plateNum": "ZZZ", "response": {}}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_error_result_marks_failed() {
        let router = app();
        post(&router, "/api/v1/enqueue", json!({"ticketNum": "PM1", "plateNum": "AAA"})).await;
        get(&router, "/api/v1/work/w1").await;

        let (_, result) = post(
            &router,
            "/api/v1/result",
            json!({"clientId": "w1", "ticketNum": "PM1", "plateNum": "AAA", "error": "captcha"}),
        )
        .await;
        assert_eq!(result["status"], "failed");

        let (_, body) = get(&router, "/api/v1/ticket/PM1/AAA").await;
        assert_eq!(body["status"], "failed");
        assert_eq!(body["response"], json!({"error": "captcha"}));
    }

    #[tokio::test]
    async fn test_missing_fields_are_validation_errors() {
        let router = app();

        let (status, body) = post(&router, "/api/v1/enqueue", json!({"ticketNum": "PM1"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["details"][0]["field"], "plate_num");

        let (status, body) = post(&router, "/api/v1/register", json!({"clientId": "  "})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, body) = get(&router, "/api/v1/work/%20").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_reject_policy_conflict() {
        let config = LeaseConfig::default().with_duplicate_policy(DuplicatePolicy::Reject);
        let (router, _) = app_with(config);
        let key = json!({"ticketNum": "PM1", "plateNum": "AAA"});

        assert_eq!(post(&router, "/api/v1/enqueue", key.clone()).await.0, StatusCode::OK);
        let (status, body) = post(&router, "/api/v1/enqueue", key).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_queue_full() {
        let (router, _) = app_with(LeaseConfig::default().with_max_jobs(1));
        post(&router, "/api/v1/enqueue", json!({"ticketNum": "PM1", "plateNum": "AAA"})).await;

        let (status, body) =
            post(&router, "/api/v1/enqueue", json!({"ticketNum": "PM2", "plateNum": "AAA"})).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "QUEUE_FULL");
    }

    #[tokio::test]
    async fn test_disconnect_and_listings() {
        let config = LeaseConfig::default().with_timeout_policy(TimeoutPolicy::Requeue);
        let (router, _) = app_with(config);
        post(&router, "/api/v1/enqueue", json!({"ticketNum": "PM1", "plateNum": "AAA"})).await;
        post(&router, "/api/v1/enqueue", json!({"ticketNum": "PM2", "plateNum": "AAA"})).await;
        get(&router, "/api/v1/work/w1").await;

        let (_, workers) = get(&router, "/api/v1/workers").await;
        assert_eq!(workers["workers"][0]["clientId"], "w1");
        assert_eq!(workers["workers"][0]["currentJob"]["ticketNum"], "PM1");

        let (_, stats) = get(&router, "/api/v1/stats").await;
        assert_eq!(stats["pending"], 1);
        assert_eq!(stats["assigned"], 1);
        assert_eq!(stats["busyWorkers"], 1);

        let (status, body) = post(&router, "/api/v1/disconnect", json!({"clientId": "w1"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["released"], json!({"ticketNum": "PM1", "plateNum": "AAA"}));

        let (_, queue) = get(&router, "/api/v1/queue").await;
        assert_eq!(
            queue,
            json!({"pending": [
                {"ticketNum": "PM1", "plateNum": "AAA"},
                {"ticketNum": "PM2", "plateNum": "AAA"}
            ]})
        );
    }

    #[tokio::test]
    async fn test_expired_lease_visible_over_http() {
        let mut config = LeaseConfig::default();
        config.lease_timeout = Duration::from_millis(50);
        config.heartbeat_interval = Duration::from_millis(10);
        let (router, gateway) = app_with(config);
        let monitor = gateway.lease_monitor();

        post(&router, "/api/v1/enqueue", json!({"ticketNum": "PM1", "plateNum": "AAA"})).await;
        get(&router, "/api/v1/work/w1").await;

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(monitor.sweep().reclaimed.len(), 1);

        let (_, body) = get(&router, "/api/v1/work/w2").await;
        assert_eq!(body["ticketNum"], "PM1");
    }
}
