//! Best-effort callback delivery (spec §4.5): POST the result envelope to
//! `callback_url` exactly once on terminal state, retried with exponential
//! backoff up to a fixed attempt count. Delivery never alters task state —
//! callers persist the terminal state before calling this.

use crate::message::CallbackEnvelope;
use autoscorer_scheduler::RetryPolicy;
use tracing::warn;

pub struct CallbackClient {
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl CallbackClient {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { http: reqwest::Client::new(), retry }
    }

    /// POST `envelope` to `callback_url`, retrying transport/5xx failures.
    /// Errors are logged and swallowed — callback delivery is best-effort.
    /// Returns whether the callback was ultimately accepted.
    pub async fn deliver(&self, callback_url: &str, envelope: &CallbackEnvelope) -> bool {
        let mut attempt = 0u32;
        loop {
            match self.http.post(callback_url).json(envelope).send().await {
                Ok(resp) if resp.status().is_success() => return true,
                Ok(resp) => {
                    warn!(callback_url, status = %resp.status(), attempt, "callback rejected");
                }
                Err(e) => {
                    warn!(callback_url, error = %e, attempt, "callback delivery failed");
                }
            }

            attempt += 1;
            if attempt >= self.retry.max_attempts {
                warn!(callback_url, attempts = attempt, "giving up on callback delivery");
                return false;
            }
            tokio::time::sleep(self.retry.backoff_for(attempt - 1)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;

    #[tokio::test]
    async fn delivery_to_unreachable_url_gives_up_without_panicking() {
        let client = CallbackClient::new(RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(5)));
        let envelope = CallbackEnvelope::success(Uuid::nil(), serde_json::json!({"score": 1.0}));
        client.deliver("http://127.0.0.1:1/unreachable", &envelope).await;
    }
}
