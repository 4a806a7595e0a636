//! API Routes
//!
//! HTTP endpoints for health checks, status and metrics

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tracing::info;

use crate::api::Metrics;
use crate::config::ResolverConfig;

/// Shared API state
pub struct ApiState {
    pub config: Arc<ResolverConfig>,
    pub metrics: Arc<Metrics>,
}

/// Build the API router
pub fn router(config: Arc<ResolverConfig>, metrics: Arc<Metrics>) -> Router {
    let state = Arc::new(ApiState { config, metrics });

    Router::new()
        // Health & Status
        .route("/health", get(health_check))
        .route("/status", get(get_status))

        // Metrics
        .route("/metrics", get(get_metrics_prometheus))
        .route("/metrics/json", get(get_metrics_json))

        .with_state(state)
}

/// Run the HTTP API server on `port`
pub async fn run_api_server(
    config: Arc<ResolverConfig>,
    metrics: Arc<Metrics>,
    port: u16,
) -> anyhow::Result<()> {
    let addr = std::net::SocketAddr::new(config.listen_addr, port);
    let app = router(config, metrics);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("📊 HTTP API server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// GET /health - Simple health check
async fn health_check() -> impl IntoResponse {
    "OK"
}

/// GET /status - Detailed status
async fn get_status(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(status_json(&state))
}

fn status_json(state: &ApiState) -> serde_json::Value {
    serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.metrics.uptime_secs(),
        "resolver": {
            "network_prefix": state.config.network_prefix,
            "alias_suffix": state.config.alias_suffix,
            "upstream": state.config.upstream.to_string(),
            "workers": state.config.workers.len(),
            "controllers": state.config.controllers.len(),
        }
    })
}

/// GET /metrics - Prometheus format metrics
async fn get_metrics_prometheus(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.metrics.to_prometheus(),
    )
}

/// GET /metrics/json - JSON format metrics
async fn get_metrics_json(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(state.metrics.to_json())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_format() {
        let config = ResolverConfig::default()
            .with_workers(Some("worker-1 worker-2 worker-3".to_string()));
        let state = ApiState {
            config: Arc::new(config),
            metrics: Arc::new(Metrics::new()),
        };

        let status = status_json(&state);

        assert_eq!(status["status"], "healthy");
        assert_eq!(status["resolver"]["workers"], 3);
        assert_eq!(status["resolver"]["alias_suffix"], "k8s");
    }

    #[tokio::test]
    async fn test_api_serves_metrics() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let metrics = Arc::new(Metrics::new());
        metrics.inc_proxied();
        let app = router(Arc::new(ResolverConfig::default()), metrics);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /metrics HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut body = String::new();
        stream.read_to_string(&mut body).await.unwrap();

        assert!(body.starts_with("HTTP/1.1 200"));
        assert!(body.contains("cluster_dns_proxied_total 1"));
    }
}
