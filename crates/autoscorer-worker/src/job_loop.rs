//! Job loop — pulls `JobMessage`s from the broker's durable consumer and
//! runs each one to completion through the shared [`QueueAdapter`], the
//! same code path a locally-dispatched (in-process) submission takes.

use autoscorer_queue::{JobMessage, QueueAdapter, TaskStatus};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::metrics::{ActionLabel, WorkerMetrics};
use crate::queue::BrokerClient;

/// Run the main job loop. Blocks forever pulling from the broker.
pub async fn run_job_loop(broker: Arc<BrokerClient>, adapter: Arc<QueueAdapter>, metrics: WorkerMetrics) -> anyhow::Result<()> {
    let consumer = broker.job_consumer().await?;
    let mut messages = consumer.messages().await?;

    info!("job loop started");

    loop {
        if let Ok(depth) = broker.queue_depth().await {
            metrics.queue_depth.set(depth as i64);
        }

        match messages.next().await {
            Some(Ok(msg)) => {
                let payload: Result<JobMessage, _> = serde_json::from_slice(&msg.payload);
                match payload {
                    Ok(job) => {
                        let task_id = job.task_id;
                        let label = ActionLabel(action_label(job.action));
                        metrics.active_jobs.inc();
                        let delivered = adapter.execute(job).await;
                        metrics.active_jobs.dec();
                        if delivered {
                            metrics.callback_deliveries.inc();
                        }

                        match adapter.status(task_id).map(|record| record.status) {
                            Some(TaskStatus::Succeeded) => metrics.jobs_completed.get_or_create(&label).inc(),
                            _ => metrics.jobs_failed.get_or_create(&label).inc(),
                        };

                        if let Err(e) = msg.ack().await {
                            error!(error = %e, "failed to ack job message");
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "dropping unparseable job message");
                        msg.ack().await.ok();
                    }
                }
            }
            Some(Err(e)) => warn!(error = %e, "consumer error"),
            None => break,
        }
    }

    Ok(())
}

fn action_label(action: autoscorer_queue::Action) -> String {
    match action {
        autoscorer_queue::Action::Run => "run".to_string(),
        autoscorer_queue::Action::Score => "score".to_string(),
        autoscorer_queue::Action::Pipeline => "pipeline".to_string(),
    }
}
