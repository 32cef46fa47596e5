//! Healthcheck HTTP surface.
//!
//! One endpoint for liveness probes: runs the worker's aggregate healthcheck
//! (repository + processor) under a timeout and maps the outcome to
//! 200/503. Intended for load balancers and orchestration systems.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::worker::Worker;

pub const HEALTHCHECK_PATH: &str = "/healthcheck";
pub const HEALTHCHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Serve the healthcheck endpoint until the token is cancelled.
pub async fn serve(
    addr: SocketAddr,
    worker: Arc<Worker>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "healthcheck endpoint listening");
    axum::serve(listener, router(worker))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}

pub fn router(worker: Arc<Worker>) -> Router {
    Router::new()
        .route(HEALTHCHECK_PATH, get(healthcheck_handler))
        .with_state(worker)
}

async fn healthcheck_handler(State(worker): State<Arc<Worker>>) -> (StatusCode, String) {
    match timeout(HEALTHCHECK_TIMEOUT, worker.healthcheck()).await {
        Ok(Ok(())) => (StatusCode::OK, "OK".to_string()),
        Ok(Err(err)) => (StatusCode::SERVICE_UNAVAILABLE, format!("{err:#}")),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "healthcheck timed out".to_string(),
        ),
    }
}
