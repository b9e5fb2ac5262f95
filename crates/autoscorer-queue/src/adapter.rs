//! The Async Task Adapter (C5, spec §4.5): bridges synchronous Scheduler
//! operations to `submit`/`status` plus best-effort callback delivery.
//! Dispatch is in-process by default (a spawned tokio task per submission);
//! when a NATS JetStream URL is configured, `submit` instead publishes a
//! `JobMessage` for an external `autoscorer-worker` to pull and execute.

use crate::callback::CallbackClient;
use crate::message::{Action, CallbackEnvelope, JobMessage};
use crate::task_table::{Admission, TaskRecord, TaskTable};
use autoscorer_scheduler::Scheduler;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

pub const JOB_STREAM: &str = "AUTOSCORER_JOBS";
pub const JOB_SUBJECT: &str = "autoscorer.jobs";

/// Request shape for [`QueueAdapter::submit`], matching spec §4.5's
/// `submit({workspace, action, params?, executor?, callback_url?})`.
pub struct SubmitRequest {
    pub workspace: PathBuf,
    pub action: Action,
    pub params: Option<serde_json::Map<String, serde_json::Value>>,
    pub executor: Option<String>,
    pub callback_url: Option<String>,
}

pub struct SubmitResponse {
    pub task_id: Uuid,
    pub deduped: bool,
}

/// Published to a JetStream subject when the adapter is configured with a
/// NATS connection, for an `autoscorer-worker` to consume.
pub struct JetStreamProducer {
    jetstream: async_nats::jetstream::Context,
}

impl JetStreamProducer {
    pub async fn connect(nats_url: &str) -> anyhow::Result<Self> {
        let client = async_nats::connect(nats_url).await?;
        let jetstream = async_nats::jetstream::new(client);
        jetstream
            .get_or_create_stream(async_nats::jetstream::stream::Config {
                name: JOB_STREAM.to_string(),
                subjects: vec![JOB_SUBJECT.to_string()],
                retention: async_nats::jetstream::stream::RetentionPolicy::WorkQueue,
                ..Default::default()
            })
            .await?;
        Ok(Self { jetstream })
    }

    async fn publish(&self, message: &JobMessage) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(message)?;
        self.jetstream.publish(JOB_SUBJECT, payload.into()).await?.await?;
        Ok(())
    }
}

pub struct QueueAdapter {
    scheduler: Arc<Scheduler>,
    tasks: TaskTable,
    callback: CallbackClient,
    broker: Option<JetStreamProducer>,
}

impl QueueAdapter {
    pub fn new(scheduler: Arc<Scheduler>, callback: CallbackClient, broker: Option<JetStreamProducer>) -> Self {
        Self { scheduler, tasks: TaskTable::new(), callback, broker }
    }

    /// `submit`: dedupes against an in-flight task for the same
    /// `(workspace, action)`, else admits a new one and dispatches it —
    /// either to the configured broker, or in-process.
    pub async fn submit(self: &Arc<Self>, request: SubmitRequest) -> SubmitResponse {
        let task_id = Uuid::new_v4();
        match self.tasks.admit(request.workspace.clone(), request.action, task_id) {
            Admission::Deduped(existing) => SubmitResponse { task_id: existing, deduped: true },
            Admission::New(task_id) => {
                let message = JobMessage {
                    task_id,
                    workspace: request.workspace,
                    action: request.action,
                    params: request.params,
                    executor: request.executor,
                    callback_url: request.callback_url,
                };
                self.dispatch(message).await;
                SubmitResponse { task_id, deduped: false }
            }
        }
    }

    pub fn status(&self, task_id: Uuid) -> Option<TaskRecord> {
        self.tasks.status(task_id)
    }

    async fn dispatch(self: &Arc<Self>, message: JobMessage) {
        if let Some(broker) = &self.broker {
            if let Err(e) = broker.publish(&message).await {
                error!(task_id = %message.task_id, error = %e, "failed to publish job to broker, executing in-process instead");
            } else {
                info!(task_id = %message.task_id, "published job to broker");
                return;
            }
        }

        let adapter = Arc::clone(self);
        tokio::spawn(async move {
            adapter.execute(message).await;
        });
    }

    /// Run a `JobMessage` to completion against the Scheduler. Called
    /// in-process for locally dispatched submissions, and by
    /// `autoscorer-worker`'s job loop for broker-delivered ones. Returns
    /// whether a result callback was attempted and accepted.
    pub async fn execute(&self, message: JobMessage) -> bool {
        self.tasks.mark_running(message.task_id);

        let outcome = match message.action {
            Action::Run => {
                let report = self.scheduler.run(&message.workspace, message.executor.as_deref()).await;
                if report.is_success() {
                    Ok(serde_json::to_value(&report).unwrap_or(serde_json::Value::Null))
                } else {
                    Err(report.error.unwrap_or_else(|| unhandled_execution_error()))
                }
            }
            Action::Score => {
                let result = self.scheduler.score(&message.workspace, None, message.params.as_ref()).await;
                result_to_outcome(result)
            }
            Action::Pipeline => {
                let result = self
                    .scheduler
                    .pipeline(&message.workspace, None, message.executor.as_deref(), message.params.as_ref())
                    .await;
                result_to_outcome(result)
            }
        };

        self.tasks.complete(message.task_id, outcome.clone());

        if let Some(callback_url) = &message.callback_url {
            let envelope = match outcome {
                Ok(data) => CallbackEnvelope::success(message.task_id, data),
                Err(error) => CallbackEnvelope::failure(message.task_id, error),
            };
            self.callback.deliver(callback_url, &envelope).await
        } else {
            false
        }
    }
}

fn result_to_outcome(result: autoscorer_core::ScoreResult) -> Result<serde_json::Value, autoscorer_core::ErrorBlock> {
    if result.is_success() {
        Ok(serde_json::to_value(&result).unwrap_or(serde_json::Value::Null))
    } else {
        Err(result.error.unwrap_or_else(unhandled_execution_error))
    }
}

fn unhandled_execution_error() -> autoscorer_core::ErrorBlock {
    autoscorer_core::ErrorBlock::new(
        autoscorer_core::ErrorCode::UnhandledError,
        autoscorer_core::Stage::System,
        "task failed with no error detail",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_stream_constants_are_stable() {
        assert_eq!(JOB_STREAM, "AUTOSCORER_JOBS");
        assert_eq!(JOB_SUBJECT, "autoscorer.jobs");
    }
}
