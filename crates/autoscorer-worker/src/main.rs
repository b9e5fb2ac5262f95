//! autoscorer-worker binary — pulls jobs submitted via the Async Task
//! Adapter's broker and runs them against the Scheduler out of process
//! (spec §4.5: "an external worker fleet may pull from the broker instead").

mod health;
mod job_loop;
mod metrics;
mod queue;
mod runtime;

use anyhow::{Context, Result};
use autoscorer_core::Config;
use autoscorer_queue::{CallbackClient, QueueAdapter};
use autoscorer_scheduler::RetryPolicy;
use health::HealthState;
use metrics::WorkerMetrics;
use queue::BrokerClient;
use runtime::Runtime;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::load();
    let nats_url = config.get_str("TASK_BROKER").unwrap_or("nats://127.0.0.1:4222").to_string();

    info!("starting autoscorer-worker, broker {nats_url}");

    let runtime = Runtime::build(config).await;
    let callback = CallbackClient::new(RetryPolicy::default());
    let adapter = Arc::new(QueueAdapter::new(Arc::clone(&runtime.scheduler), callback, None));

    let worker_metrics = WorkerMetrics::new();
    let ready = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let health_state = Arc::new(HealthState { metrics: worker_metrics.clone(), ready: ready.clone() });

    let metrics_port = runtime.config.get_int("METRICS_PORT").unwrap_or(9090) as u16;
    let health_router = health::health_router(health_state);
    tokio::spawn(async move {
        let addr = format!("0.0.0.0:{metrics_port}");
        info!("metrics server listening on {addr}");
        match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => {
                if let Err(e) = axum::serve(listener, health_router).await {
                    tracing::error!(error = %e, "metrics server stopped");
                }
            }
            Err(e) => tracing::error!(error = %e, "failed to bind metrics server"),
        }
    });

    let broker = Arc::new(BrokerClient::connect(&nats_url).await.context("connecting to task broker")?);
    ready.store(true, std::sync::atomic::Ordering::Relaxed);
    info!("connected to broker, consumer {}", queue::CONSUMER_NAME);

    job_loop::run_job_loop(broker, adapter, worker_metrics).await
}
