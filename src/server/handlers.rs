use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::parse_config;
use crate::server::state::AppState;

/// Query parameters of GET /faas
#[derive(Debug, Deserialize)]
pub struct BestFaasParams {
    #[serde(default)]
    pub function_name: Option<String>,
}

/// Successful GET /faas response
#[derive(Debug, Serialize)]
pub struct BestFaasResponse {
    pub function_name: String,
    pub best_faas_url: String,
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

/// Service status endpoint
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.status_snapshot().await)
}

/// GET /faas - look up the cached best URL for a function
pub async fn best_faas(
    State(state): State<AppState>,
    Query(params): Query<BestFaasParams>,
) -> Response {
    if !state.is_configured() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "waiting",
                "message": "the server has not received an initial configuration"
            })),
        )
            .into_response();
    }

    let Some(function_name) = params.function_name else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "the 'function_name' parameter is required"})),
        )
            .into_response();
    };

    match state.cached_url(&function_name).await {
        Some(best_faas_url) => Json(BestFaasResponse {
            function_name,
            best_faas_url,
        })
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": format!("no host available or function '{function_name}' not found")
            })),
        )
            .into_response(),
    }
}

/// POST /faas - replace the active configuration.
/// All-or-nothing: on any parse or validation error the previously active
/// registry keeps serving.
pub async fn reload_config(State(state): State<AppState>, body: String) -> Response {
    if body.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "request body is empty"})),
        )
            .into_response();
    }

    match parse_config(&body) {
        Ok(registry) => {
            state.install_registry(registry).await;
            state.mark_configured();
            Json(json!({"status": "success"})).into_response()
        }
        Err(error) => {
            warn!(%error, "rejected configuration upload");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "failed to process the configuration",
                    "details": error.to_string()
                })),
            )
                .into_response()
        }
    }
}

/// Create the Axum router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/faas", get(best_faas).post(reload_config))
        .route("/health", get(health))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    const CONFIG: &str = r#"
refresh_interval_secs: 5
hosts:
  edge-1:
    layer: edge
    priority: high
    faas_urls: ["http://edge-1/function/resize"]
    prometheus_api_url: http://edge-1:9090/api/v1/query
    max_cpu_use: 80
    max_ram_use: 80
  nuvem:
    layer: cloud
    faas_urls: ["http://nuvem/function/resize"]
"#;

    fn create_test_app() -> (AppState, Router) {
        let state = AppState::new(Duration::from_secs(5));
        let app = create_router(state.clone());
        (state, app)
    }

    async fn get_faas(app: &Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn post_config(app: &Router, body: &str) -> StatusCode {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/faas")
                    .header("content-type", "text/plain")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        response.status()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (_state, app) = create_test_app();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_get_before_configuration() {
        let (_state, app) = create_test_app();
        let (status, body) = get_faas(&app, "/faas?function_name=resize").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "waiting");
    }

    #[tokio::test]
    async fn test_post_empty_body_does_not_configure() {
        let (state, app) = create_test_app();
        assert_eq!(post_config(&app, "").await, StatusCode::BAD_REQUEST);
        assert!(!state.is_configured());

        // GET still reports the service as unconfigured
        let (status, _) = get_faas(&app, "/faas?function_name=resize").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_post_invalid_config_preserves_state() {
        let (state, app) = create_test_app();
        assert_eq!(
            post_config(&app, "refresh_interval_secs: [").await,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert!(!state.is_configured());
    }

    #[tokio::test]
    async fn test_post_invalid_reload_keeps_prior_registry() {
        let (state, app) = create_test_app();
        assert_eq!(post_config(&app, CONFIG).await, StatusCode::OK);
        state.rebuild_routing_cache().await;

        // A broken reload is rejected and the prior config keeps serving
        assert_eq!(
            post_config(&app, "not a config").await,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let (status, body) = get_faas(&app, "/faas?function_name=resize").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["best_faas_url"], "http://edge-1/function/resize");
    }

    #[tokio::test]
    async fn test_get_missing_parameter() {
        let (_state, app) = create_test_app();
        assert_eq!(post_config(&app, CONFIG).await, StatusCode::OK);

        let (status, body) = get_faas(&app, "/faas").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("function_name"));
    }

    #[tokio::test]
    async fn test_get_unknown_function_is_not_found() {
        let (state, app) = create_test_app();
        assert_eq!(post_config(&app, CONFIG).await, StatusCode::OK);
        state.rebuild_routing_cache().await;

        let (status, _) = get_faas(&app, "/faas?function_name=transcode").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_served_from_cache_after_refresh() {
        let (state, app) = create_test_app();
        assert_eq!(post_config(&app, CONFIG).await, StatusCode::OK);

        // Before the first refresh cycle the cache is empty
        let (status, _) = get_faas(&app, "/faas?function_name=resize").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        state.rebuild_routing_cache().await;
        let (status, body) = get_faas(&app, "/faas?function_name=resize").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["function_name"], "resize");
        assert_eq!(body["best_faas_url"], "http://edge-1/function/resize");
    }

    #[tokio::test]
    async fn test_status_endpoint_reflects_configuration() {
        let (_state, app) = create_test_app();

        let (status, body) = get_faas(&app, "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["configured"], false);

        assert_eq!(post_config(&app, CONFIG).await, StatusCode::OK);
        let (_, body) = get_faas(&app, "/status").await;
        assert_eq!(body["configured"], true);
        assert_eq!(body["hosts"], 1);
        assert_eq!(body["cloud"], true);
        assert_eq!(body["functions"], 1);
    }
}
