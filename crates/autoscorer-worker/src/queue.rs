//! Broker connection — ensures the job stream and a shared durable pull
//! consumer exist, and reports queue depth for [`crate::metrics`].

use async_nats::jetstream::{self, consumer::PullConsumer, stream::Stream as JsStream};
use autoscorer_queue::{JOB_STREAM, JOB_SUBJECT};

pub const CONSUMER_NAME: &str = "autoscorer-workers";

pub struct BrokerClient {
    job_stream: tokio::sync::Mutex<JsStream>,
}

impl BrokerClient {
    /// Connect to NATS and ensure the job stream exists.
    pub async fn connect(nats_url: &str) -> anyhow::Result<Self> {
        let client = async_nats::connect(nats_url).await?;
        let jetstream = jetstream::new(client);

        let job_stream = jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: JOB_STREAM.to_string(),
                subjects: vec![JOB_SUBJECT.to_string()],
                retention: jetstream::stream::RetentionPolicy::WorkQueue,
                ..Default::default()
            })
            .await?;

        Ok(Self { job_stream: tokio::sync::Mutex::new(job_stream) })
    }

    /// Create (or attach to) the shared durable pull consumer. Multiple
    /// worker processes share the same durable name, so the broker
    /// distributes messages across the fleet instead of each worker
    /// re-reading the whole stream.
    pub async fn job_consumer(&self) -> anyhow::Result<PullConsumer> {
        let stream = self.job_stream.lock().await;
        let consumer = stream
            .get_or_create_consumer(
                CONSUMER_NAME,
                jetstream::consumer::pull::Config {
                    durable_name: Some(CONSUMER_NAME.to_string()),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ack_wait: std::time::Duration::from_secs(300),
                    max_deliver: 3,
                    ..Default::default()
                },
            )
            .await?;
        Ok(consumer)
    }

    /// Current pending message count on the job stream.
    pub async fn queue_depth(&self) -> anyhow::Result<u64> {
        let mut stream = self.job_stream.lock().await;
        let info = stream.info().await?;
        Ok(info.state.messages)
    }
}
