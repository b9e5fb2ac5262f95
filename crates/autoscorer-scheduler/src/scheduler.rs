//! Scheduler (C3) — wires workspace locking, executor selection, retry and
//! circuit breaking and scorer invocation into the `run`/`score`/`pipeline`
//! pipeline described in spec §4.4.

use crate::circuit_breaker::{CircuitBreaker, CircuitKey};
use crate::retry::RetryPolicy;
use crate::workspace_lock::WorkspaceLocks;
use autoscorer_core::{
    ErrorBlock, ErrorCode, ExecutionReport, JobSpec, ScoreResult, Stage, Versioning, Workspace,
    WorkspaceManager,
};
use autoscorer_executor::ExecutorSelector;
use autoscorer_registry::Registry;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub struct Scheduler {
    registry: Arc<Registry>,
    selector: Arc<ExecutorSelector>,
    locks: WorkspaceLocks,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
    scorer_timeout: Duration,
}

impl Scheduler {
    pub fn new(
        registry: Arc<Registry>,
        selector: Arc<ExecutorSelector>,
        retry: RetryPolicy,
        breaker: CircuitBreaker,
        scorer_timeout: Duration,
    ) -> Self {
        Self { registry, selector, locks: WorkspaceLocks::new(), retry, breaker, scorer_timeout }
    }

    /// Validate, then execute, returning the executor's `ExecutionReport`
    /// without invoking a scorer. `executor_override`, if given, takes
    /// precedence over `meta.json`'s own `executor` field.
    pub async fn run(&self, workspace_path: &Path, executor_override: Option<&str>) -> ExecutionReport {
        let _guard = self.locks.acquire(workspace_path).await;
        let mut spec = match WorkspaceManager::validate(workspace_path) {
            Ok(spec) => spec,
            Err(e) => return ExecutionReport::failure(e, std::time::Duration::ZERO),
        };
        if let Some(executor) = executor_override {
            spec.executor = Some(executor.to_string());
        }
        self.execute_with_retry(&spec, workspace_path).await
    }

    /// Run the scorer named in `meta.json` (or `scorer_override`) against an
    /// already-produced `output/`, skipping execution entirely.
    pub async fn score(
        &self,
        workspace_path: &Path,
        scorer_override: Option<&str>,
        params: Option<&serde_json::Map<String, serde_json::Value>>,
    ) -> ScoreResult {
        let _guard = self.locks.acquire(workspace_path).await;
        let spec = match WorkspaceManager::validate(workspace_path) {
            Ok(spec) => spec,
            Err(e) => return ScoreResult::failure(e),
        };
        self.invoke_scorer(&spec, workspace_path, scorer_override, params).await
    }

    /// The full six-step pipeline: validate, select an executor, run with
    /// retry/circuit-breaking, resolve a scorer, invoke it, persist
    /// `result.json`.
    pub async fn pipeline(
        &self,
        workspace_path: &Path,
        scorer_override: Option<&str>,
        executor_override: Option<&str>,
        params: Option<&serde_json::Map<String, serde_json::Value>>,
    ) -> ScoreResult {
        let _guard = self.locks.acquire(workspace_path).await;

        let mut spec = match WorkspaceManager::validate(workspace_path) {
            Ok(spec) => spec,
            Err(e) => return self.persist(workspace_path, ScoreResult::failure(e)),
        };
        if let Some(executor) = executor_override {
            spec.executor = Some(executor.to_string());
        }

        let report = self.execute_with_retry(&spec, workspace_path).await;
        if !report.is_success() {
            let error = report.error.unwrap_or_else(|| {
                ErrorBlock::new(ErrorCode::UnhandledError, Stage::Execution, "execution failed with no error detail")
            });
            return self.persist(workspace_path, ScoreResult::failure(error));
        }

        let result = self.invoke_scorer(&spec, workspace_path, scorer_override, params).await;
        self.persist(workspace_path, result)
    }

    /// Select an executor (excluding any whose circuit is open for this
    /// job's image registry), run it, and retry retryable failures per
    /// `RetryPolicy`, recording outcomes against the breaker.
    async fn execute_with_retry(&self, spec: &JobSpec, workspace_path: &Path) -> ExecutionReport {
        let registry_host = image_registry_host(&spec.container.image);
        let mut excluded = Vec::new();
        let mut attempt = 0u32;

        loop {
            let executor = match self.selector.select_excluding(spec, &excluded).await {
                Ok(executor) => executor,
                Err(e) => return ExecutionReport::failure(e, std::time::Duration::ZERO),
            };
            let key = CircuitKey::new(executor.kind(), registry_host.clone());

            if self.breaker.is_open(&key) {
                warn!(kind = ?executor.kind(), registry = %registry_host, "circuit open, excluding executor");
                excluded.push(executor.kind());
                continue;
            }

            let started = Instant::now();
            let report = executor.run(spec, workspace_path).await;

            if report.is_success() {
                self.breaker.record_success(&key);
                return report;
            }

            self.breaker.record_failure(&key);
            let retryable = report.error.as_ref().map(|e| e.is_retryable()).unwrap_or(false);
            attempt += 1;

            if !retryable || attempt >= self.retry.max_attempts {
                return report;
            }

            let backoff = self.retry.backoff_for(attempt - 1);
            info!(kind = ?executor.kind(), attempt, elapsed = ?started.elapsed(), backoff = ?backoff, "retrying job execution");
            tokio::time::sleep(backoff).await;
        }
    }

    /// Look up and invoke the scorer off the async runtime (`spawn_blocking`),
    /// bounded by `scorer_timeout`. An unexpected panic, and an elapsed
    /// timeout, both normalize into `SCORE_ERROR` rather than crossing the
    /// caller boundary raw. A timed-out scorer task is left detached to run
    /// to completion rather than aborted.
    async fn invoke_scorer(
        &self,
        spec: &JobSpec,
        workspace_path: &Path,
        scorer_override: Option<&str>,
        params: Option<&serde_json::Map<String, serde_json::Value>>,
    ) -> ScoreResult {
        let name = scorer_override.unwrap_or(&spec.scorer_name).to_string();
        let Some(entry) = self.registry.get(&name) else {
            return ScoreResult::failure(ErrorBlock::new(
                ErrorCode::ScorerNotFound,
                Stage::Scoring,
                format!("no scorer registered under {name:?}"),
            ));
        };

        let effective_params = params.cloned().unwrap_or_else(|| spec.scorer_params.clone());
        let workspace_path = workspace_path.to_path_buf();
        let scorer = entry.implementation.clone();

        let task = tokio::task::spawn_blocking(move || {
            panic::catch_unwind(AssertUnwindSafe(|| scorer.score(&workspace_path, &effective_params)))
        });

        let outcome = match tokio::time::timeout(self.scorer_timeout, task).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_error)) => {
                warn!(scorer = %entry.name, error = %join_error, "scorer task failed to join");
                return ScoreResult::failure(ErrorBlock::new(
                    ErrorCode::ScoreError,
                    Stage::Scoring,
                    join_error.to_string(),
                ));
            }
            Err(_) => {
                warn!(scorer = %entry.name, timeout = ?self.scorer_timeout, "scorer timed out");
                return ScoreResult::failure(ErrorBlock::new(
                    ErrorCode::ScoreError,
                    Stage::Scoring,
                    format!("scorer {:?} did not finish within {:?}", entry.name, self.scorer_timeout),
                ));
            }
        };

        match outcome {
            Ok(Ok(mut result)) => {
                result.versioning.get_or_insert_with(|| Versioning {
                    scorer: entry.name.clone(),
                    version: entry.version.clone(),
                    algorithm: None,
                    timestamp: chrono::Utc::now().to_rfc3339(),
                });
                result
            }
            Ok(Err(e)) => ScoreResult::failure(e),
            Err(panic) => {
                let message = panic_message(&panic);
                let digest = panic_digest(&message);
                warn!(scorer = %entry.name, %message, digest = %digest, "scorer panicked");
                ScoreResult::failure(
                    ErrorBlock::new(ErrorCode::ScoreError, Stage::Scoring, message)
                        .with_detail("scorer_name", entry.name.clone())
                        .with_detail("scorer_version", entry.version.clone())
                        .with_detail("stack_digest", digest),
                )
            }
        }
    }

    fn persist(&self, workspace_path: &Path, result: ScoreResult) -> ScoreResult {
        let ws = Workspace::at(workspace_path);
        match serde_json::to_vec_pretty(&result) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(ws.result_path(), bytes) {
                    warn!(path = ?ws.result_path(), error = %e, "failed to persist result.json");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize result.json"),
        }
        result
    }
}

/// The host/registry component of an image reference, used as half of the
/// circuit breaker's key. `docker.io` for unqualified references, matching
/// Docker's own default.
fn image_registry_host(image: &str) -> String {
    let before_tag = image.split('@').next().unwrap_or(image);
    let repo = before_tag.split(':').next().unwrap_or(before_tag);
    match repo.split_once('/') {
        Some((first, _rest)) if first.contains('.') || first.contains(':') || first == "localhost" => first.to_string(),
        _ => "docker.io".to_string(),
    }
}

/// A short, stable fingerprint of a panic message — not a real stack trace
/// (caught panics carry no backtrace by default), but enough to group
/// repeated occurrences of the same failure in logs/alerts.
fn panic_digest(message: &str) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    message.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "scorer panicked with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_host_defaults_to_docker_io() {
        assert_eq!(image_registry_host("scorer-runtime:1.0"), "docker.io");
        assert_eq!(image_registry_host("library/python:3.11"), "docker.io");
    }

    #[test]
    fn registry_host_detects_qualified_registries() {
        assert_eq!(image_registry_host("ghcr.io/org/scorer:1.0"), "ghcr.io");
        assert_eq!(image_registry_host("localhost:5000/scorer:1.0"), "localhost:5000");
    }
}
