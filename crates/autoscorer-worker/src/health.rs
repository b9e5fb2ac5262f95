//! Health and metrics HTTP endpoints (Axum). `/health` reports process
//! liveness unconditionally; `/ready` additionally requires a live broker
//! consumer, since a worker with no broker connection can't pull jobs and
//! shouldn't receive traffic from a load balancer fronting several workers.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::metrics::WorkerMetrics;

pub struct HealthState {
    pub metrics: WorkerMetrics,
    pub ready: Arc<AtomicBool>,
}

pub fn health_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        .with_state(state)
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    service: &'static str,
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "up", service: "autoscorer-worker" })
}

#[derive(Serialize)]
struct ReadyBody {
    broker_connected: bool,
}

async fn ready(State(state): State<Arc<HealthState>>) -> Result<Json<ReadyBody>, StatusCode> {
    let broker_connected = state.ready.load(Ordering::Relaxed);
    if broker_connected {
        Ok(Json(ReadyBody { broker_connected }))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

async fn metrics(State(state): State<Arc<HealthState>>) -> String {
    state.metrics.encode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::WorkerMetrics;

    #[tokio::test]
    async fn ready_reflects_broker_flag() {
        let state = Arc::new(HealthState { metrics: WorkerMetrics::new(), ready: Arc::new(AtomicBool::new(false)) });
        assert!(ready(State(Arc::clone(&state))).await.is_err());

        state.ready.store(true, Ordering::Relaxed);
        let body = ready(State(state)).await.unwrap();
        assert!(body.0.broker_connected);
    }
}
