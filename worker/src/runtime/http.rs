use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use crate::{handler::JobHandler, output::JobResponse};

const REQUEST_ID: &str = "x-request-id";

/// Routes for local serving. `job_timeout` bounds each request.
pub fn router(handler: Arc<JobHandler>, job_timeout: Duration) -> Router {
    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(job_timeout))
        .into_inner();

    Router::new()
        .route("/health", get(health))
        .route("/runsync", post(run_job))
        .route("/run", post(run_job))
        .layer(axum::middleware::from_fn(add_request_id))
        .layer(middleware_stack)
        .with_state(handler)
}

pub async fn serve(handler: Arc<JobHandler>, port: u16, job_timeout: Duration) -> anyhow::Result<()> {
    let app = router(handler, job_timeout);
    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT."))?;

    info!("Worker listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn health(State(handler): State<Arc<JobHandler>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "backend": handler.lifecycle().phase(),
    }))
}

/// Job failures are results, so this always answers 200.
async fn run_job(State(handler): State<Arc<JobHandler>>, Json(job): Json<Value>) -> Json<JobResponse> {
    Json(handler.handle(&job).await)
}

async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let header = HeaderValue::from_str(&request_id).ok();
    if let Some(value) = header.clone() {
        request.headers_mut().insert(REQUEST_ID, value);
    }
    let mut response = next.run(request).await;
    if let Some(value) = header {
        response.headers_mut().insert(REQUEST_ID, value);
    }
    response
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        // No signal handler, so run until killed.
        Err(_) => std::future::pending::<()>().await,
    }
}
