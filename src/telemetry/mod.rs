//! Telemetry collection from per-host Prometheus endpoints
//!
//! A recurring background task polls every edge/fog host's monitoring
//! endpoint for current CPU and RAM utilization and writes the readings
//! into the active registry. A host whose endpoint is unreachable, slow,
//! or returns anything unexpected has both utilizations poisoned to
//! `+inf`, which keeps it unselectable until a later cycle succeeds.
//!
//! This is a collector, not a decision-maker: it never chooses a URL.
//! The cache rebuild that follows each poll cycle is driven from here but
//! implemented by the routing module.

use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::registry::PollTarget;
use crate::server::AppState;

/// Default bound on each telemetry request, in seconds
pub const POLL_TIMEOUT_SECS: u64 = 5;

/// Prometheus instant query for CPU utilization as a percentage
pub const CPU_UTILIZATION_QUERY: &str =
    "(1 - avg by (instance) (rate(node_cpu_seconds_total{mode=\"idle\"}[15s]))) * 100";

/// Prometheus instant query for RAM utilization as a percentage
pub const RAM_UTILIZATION_QUERY: &str = "((avg_over_time(node_memory_MemTotal_bytes[15s]) - avg_over_time(node_memory_MemAvailable_bytes[15s]))/ avg_over_time(node_memory_MemTotal_bytes[15s])) * 100";

/// Reasons a telemetry poll can fail; every one of them poisons the host
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("monitoring endpoint returned HTTP {0}")]
    BadStatus(u16),

    #[error("malformed utilization response: {0}")]
    Malformed(String),
}

/// Result of polling one host for one cycle
#[derive(Debug)]
pub struct HostReading {
    /// Index into the polled registry's host list
    pub host_index: usize,
    pub name: String,
    pub result: Result<(f64, f64), TelemetryError>,
}

// Prometheus instant-vector response:
// {"status":"success","data":{"resultType":"vector",
//  "result":[{"metric":{...},"value":[1759941647.139,"24.2"]}]}}
#[derive(Debug, Deserialize)]
struct QueryResponse {
    data: QueryData,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    result: Vec<InstantSample>,
}

#[derive(Debug, Deserialize)]
struct InstantSample {
    value: (f64, String),
}

/// Extract the utilization reading from a Prometheus instant-query body.
/// This is a pure function - no I/O.
pub fn unpack_utilization(body: &str) -> Result<f64, TelemetryError> {
    let response: QueryResponse =
        serde_json::from_str(body).map_err(|e| TelemetryError::Malformed(e.to_string()))?;

    let sample = response
        .data
        .result
        .first()
        .ok_or_else(|| TelemetryError::Malformed("empty result set".to_string()))?;

    let value: f64 = sample.value.1.parse().map_err(|_| {
        TelemetryError::Malformed(format!("non-numeric utilization '{}'", sample.value.1))
    })?;

    // A stored utilization is always a non-negative reading or +inf
    if value.is_nan() || value < 0.0 {
        return Err(TelemetryError::Malformed(format!(
            "utilization out of range: {value}"
        )));
    }
    Ok(value)
}

/// Run one instant query against a host's monitoring endpoint
pub async fn query_utilization(
    client: &Client,
    endpoint: &str,
    query: &str,
) -> Result<f64, TelemetryError> {
    let response = client.get(endpoint).query(&[("query", query)]).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(TelemetryError::BadStatus(status.as_u16()));
    }

    let body = response.text().await?;
    unpack_utilization(&body)
}

/// Poll one host: two independent queries, CPU then RAM.
/// A failure of either poisons both readings.
pub async fn poll_host(client: &Client, target: &PollTarget) -> Result<(f64, f64), TelemetryError> {
    tokio::try_join!(
        query_utilization(client, &target.prometheus_api_url, CPU_UTILIZATION_QUERY),
        query_utilization(client, &target.prometheus_api_url, RAM_UTILIZATION_QUERY),
    )
}

/// Poll all targets concurrently and collect per-host readings
pub async fn poll_hosts(client: &Client, targets: &[PollTarget]) -> Vec<HostReading> {
    let polls = targets.iter().map(|target| async move {
        HostReading {
            host_index: target.host_index,
            name: target.name.clone(),
            result: poll_host(client, target).await,
        }
    });

    join_all(polls).await
}

/// The refresh loop: wait for the first configuration, then poll, write
/// telemetry, rebuild the routing cache, and sleep for the configured
/// interval. One full pass always completes before the sleep; a reload
/// that lands mid-poll discards that cycle's readings and re-polls the
/// new registry immediately.
pub async fn run_refresher(state: AppState) {
    state.wait_until_configured().await;
    info!("configuration received; starting telemetry refresh loop");

    loop {
        let Some(snapshot) = state.poll_snapshot().await else {
            // Configured but no registry yet; the installer holds the lock
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            continue;
        };

        debug!(
            hosts = snapshot.targets.len(),
            generation = snapshot.generation,
            "polling host telemetry"
        );
        let readings = poll_hosts(state.http(), &snapshot.targets).await;

        if !state.apply_readings(snapshot.generation, readings).await {
            continue;
        }

        state.rebuild_routing_cache().await;
        tokio::time::sleep(snapshot.refresh_interval).await;
    }
}

/// Spawn the refresh loop as a background task
pub fn spawn_refresher(state: AppState) -> JoinHandle<()> {
    tokio::spawn(run_refresher(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::time::Duration;

    const SAMPLE_BODY: &str = r#"{"status":"success","data":{"resultType":"vector","result":[{"metric":{"instance":"localhost:9001"},"value":[1759941647.139,"24.200000000003"]}]}}"#;

    #[test]
    fn test_unpack_real_sample() {
        let value = unpack_utilization(SAMPLE_BODY).unwrap();
        assert!((value - 24.2).abs() < 0.001);
    }

    #[test]
    fn test_unpack_empty_result_set() {
        let body = r#"{"status":"success","data":{"resultType":"vector","result":[]}}"#;
        let err = unpack_utilization(body).unwrap_err();
        assert!(matches!(err, TelemetryError::Malformed(_)));
        assert!(err.to_string().contains("empty result set"));
    }

    #[test]
    fn test_unpack_missing_data_field() {
        let err = unpack_utilization(r#"{"status":"error"}"#).unwrap_err();
        assert!(matches!(err, TelemetryError::Malformed(_)));
    }

    #[test]
    fn test_unpack_non_numeric_value() {
        let body = r#"{"status":"success","data":{"result":[{"metric":{},"value":[0,"many"]}]}}"#;
        let err = unpack_utilization(body).unwrap_err();
        assert!(err.to_string().contains("non-numeric"));
    }

    #[test]
    fn test_unpack_nan_rejected() {
        let body = r#"{"status":"success","data":{"result":[{"metric":{},"value":[0,"NaN"]}]}}"#;
        assert!(unpack_utilization(body).is_err());
    }

    #[test]
    fn test_unpack_negative_rejected() {
        let body = r#"{"status":"success","data":{"result":[{"metric":{},"value":[0,"-3.5"]}]}}"#;
        assert!(unpack_utilization(body).is_err());
    }

    #[test]
    fn test_unpack_not_json() {
        assert!(unpack_utilization("<html>busy</html>").is_err());
    }

    /// Serve a fixed pair of utilization readings the way Prometheus would
    async fn spawn_stub(cpu: f64, ram: f64) -> String {
        let handler = move |Query(params): Query<HashMap<String, String>>| async move {
            let is_cpu = params
                .get("query")
                .is_some_and(|q| q.contains("node_cpu_seconds_total"));
            let value = if is_cpu { cpu } else { ram };
            Json(serde_json::json!({
                "status": "success",
                "data": {
                    "resultType": "vector",
                    "result": [{"metric": {}, "value": [1759941647.139, value.to_string()]}]
                }
            }))
        };

        let app = Router::new().route("/api/v1/query", get(handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}/api/v1/query")
    }

    fn target(endpoint: String) -> PollTarget {
        PollTarget {
            host_index: 0,
            name: "edge-1".to_string(),
            prometheus_api_url: endpoint,
        }
    }

    fn test_client() -> Client {
        Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_poll_host_reads_both_utilizations() {
        let endpoint = spawn_stub(24.2, 51.5).await;
        let (cpu, ram) = poll_host(&test_client(), &target(endpoint)).await.unwrap();
        assert!((cpu - 24.2).abs() < 0.001);
        assert!((ram - 51.5).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_poll_host_unreachable_endpoint() {
        // Nothing listens here; connection is refused
        let result = poll_host(
            &test_client(),
            &target("http://127.0.0.1:9/api/v1/query".to_string()),
        )
        .await;
        assert!(matches!(result, Err(TelemetryError::Request(_))));
    }

    #[tokio::test]
    async fn test_poll_host_error_status() {
        let app = Router::new().route(
            "/api/v1/query",
            get(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let result = poll_host(
            &test_client(),
            &target(format!("http://{addr}/api/v1/query")),
        )
        .await;
        assert!(matches!(result, Err(TelemetryError::BadStatus(500))));
    }

    #[tokio::test]
    async fn test_poll_hosts_mixes_successes_and_failures() {
        let good = spawn_stub(10.0, 20.0).await;
        let targets = vec![
            PollTarget {
                host_index: 0,
                name: "good".to_string(),
                prometheus_api_url: good,
            },
            PollTarget {
                host_index: 1,
                name: "bad".to_string(),
                prometheus_api_url: "http://127.0.0.1:9/api/v1/query".to_string(),
            },
        ];

        let readings = poll_hosts(&test_client(), &targets).await;
        assert_eq!(readings.len(), 2);
        assert!(readings[0].result.is_ok());
        assert_eq!(readings[1].host_index, 1);
        assert!(readings[1].result.is_err());
    }
}
