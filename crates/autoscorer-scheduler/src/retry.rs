//! Retry policy: exponential backoff with jitter, scoped to the error
//! codes the spec marks retryable (spec §4.4).

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_backoff: Duration, max_backoff: Duration) -> Self {
        Self { max_attempts, base_backoff, max_backoff }
    }

    /// Backoff before attempt `attempt` (0-indexed retry count, not
    /// counting the initial try): `base * 2^attempt`, capped, plus up to
    /// 20% jitter.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = self.base_backoff.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
        let capped = exp.min(self.max_backoff);
        let jitter_fraction = rand::rng().random_range(0.0..0.2);
        capped.mul_f64(1.0 + jitter_fraction)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1), Duration::from_secs(10));
        assert!(policy.backoff_for(0) >= Duration::from_secs(1));
        assert!(policy.backoff_for(0) < Duration::from_secs(2));
        assert!(policy.backoff_for(10) <= Duration::from_secs(12));
    }
}
