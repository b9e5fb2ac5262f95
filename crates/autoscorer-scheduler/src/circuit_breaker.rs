//! Circuit breaker scoped per `(executor_kind, image_registry)` (spec
//! §4.4): opens after K consecutive failures, redirects to the fallback
//! executor for a cool-down window.

use autoscorer_executor::ExecutorKind;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CircuitKey {
    pub executor_kind: ExecutorKind,
    pub image_registry: String,
}

impl CircuitKey {
    pub fn new(executor_kind: ExecutorKind, image_registry: impl Into<String>) -> Self {
        Self { executor_kind, image_registry: image_registry.into() }
    }
}

struct CircuitState {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Thread-safe breaker bank, one entry per `(executor_kind, image_registry)`.
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    states: Mutex<HashMap<CircuitKey, CircuitState>>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self { threshold, cooldown, states: Mutex::new(HashMap::new()) }
    }

    /// `true` if calls for this key should be redirected to the fallback
    /// executor right now.
    pub fn is_open(&self, key: &CircuitKey) -> bool {
        let mut states = self.states.lock().unwrap();
        let Some(state) = states.get_mut(key) else { return false };
        match state.opened_at {
            Some(opened_at) if opened_at.elapsed() >= self.cooldown => {
                // Cool-down elapsed: half-open, let the next call probe it.
                state.opened_at = None;
                state.consecutive_failures = 0;
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    pub fn record_success(&self, key: &CircuitKey) {
        let mut states = self.states.lock().unwrap();
        states.remove(key);
    }

    pub fn record_failure(&self, key: &CircuitKey) {
        let mut states = self.states.lock().unwrap();
        let state = states.entry(key.clone()).or_insert(CircuitState { consecutive_failures: 0, opened_at: None });
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.threshold {
            state.opened_at = Some(Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> CircuitKey {
        CircuitKey::new(ExecutorKind::Container, "registry.example.com".to_string())
    }

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        let key = key();
        assert!(!breaker.is_open(&key));
        breaker.record_failure(&key);
        breaker.record_failure(&key);
        assert!(!breaker.is_open(&key));
        breaker.record_failure(&key);
        assert!(breaker.is_open(&key));
    }

    #[test]
    fn success_resets_the_counter() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(60));
        let key = key();
        breaker.record_failure(&key);
        breaker.record_success(&key);
        breaker.record_failure(&key);
        assert!(!breaker.is_open(&key));
    }

    #[test]
    fn closes_after_cooldown_elapses() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10));
        let key = key();
        breaker.record_failure(&key);
        assert!(breaker.is_open(&key));
        std::thread::sleep(Duration::from_millis(20));
        assert!(!breaker.is_open(&key));
    }
}
