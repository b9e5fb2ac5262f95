//! Executor selection policy (spec §4.3.4).

use crate::executor::{Executor, ExecutorKind};
use autoscorer_core::{ErrorBlock, ErrorCode, JobSpec, Stage};
use std::collections::HashMap;
use std::sync::Arc;

/// Fallback order consulted when the preferred executor is unhealthy.
const FALLBACK_ORDER: [ExecutorKind; 3] = [ExecutorKind::Cluster, ExecutorKind::Container, ExecutorKind::Local];

pub struct ExecutorSelector {
    executors: HashMap<ExecutorKind, Arc<dyn Executor>>,
    default_executor: ExecutorKind,
    memory_threshold_bytes: u64,
}

impl ExecutorSelector {
    pub fn new(
        executors: HashMap<ExecutorKind, Arc<dyn Executor>>,
        default_executor: ExecutorKind,
        memory_threshold_bytes: u64,
    ) -> Self {
        Self { executors, default_executor, memory_threshold_bytes }
    }

    /// Resolve a `JobSpec` to a live `Executor`, applying the four-step
    /// policy in spec §4.3.4.
    pub async fn select(&self, spec: &JobSpec) -> Result<Arc<dyn Executor>, ErrorBlock> {
        self.select_excluding(spec, &[]).await
    }

    /// Same as [`Self::select`], but treats `excluded` kinds as though
    /// their health check failed. Used by the Scheduler to route around a
    /// kind whose circuit breaker is open without tearing down its health.
    pub async fn select_excluding(&self, spec: &JobSpec, excluded: &[ExecutorKind]) -> Result<Arc<dyn Executor>, ErrorBlock> {
        let preferred = self.preferred_kind(spec)?;

        if !excluded.contains(&preferred) {
            if let Some(executor) = self.healthy(preferred).await {
                return Ok(executor);
            }
        }

        for kind in FALLBACK_ORDER {
            if kind == preferred || excluded.contains(&kind) {
                continue;
            }
            if let Some(executor) = self.healthy(kind).await {
                return Ok(executor);
            }
        }

        Err(ErrorBlock::new(
            ErrorCode::NoExecutorAvailable,
            Stage::Execution,
            "no configured executor passed its health check",
        ))
    }

    fn preferred_kind(&self, spec: &JobSpec) -> Result<ExecutorKind, ErrorBlock> {
        if let Some(explicit) = &spec.executor {
            let kind: ExecutorKind = explicit.parse().map_err(|msg| {
                ErrorBlock::new(ErrorCode::InvalidValue, Stage::Execution, msg)
            })?;
            if !self.executors.contains_key(&kind) {
                return Err(ErrorBlock::new(
                    ErrorCode::NoExecutorAvailable,
                    Stage::Execution,
                    format!("requested executor {:?} is not configured", kind),
                ));
            }
            return Ok(kind);
        }

        let memory_bytes = spec.resources.memory_bytes().unwrap_or(0);
        if spec.resources.gpu > 0 || memory_bytes > self.memory_threshold_bytes {
            return Ok(ExecutorKind::Cluster);
        }

        Ok(self.default_executor)
    }

    async fn healthy(&self, kind: ExecutorKind) -> Option<Arc<dyn Executor>> {
        let executor = self.executors.get(&kind)?;
        if executor.health_check().await {
            Some(Arc::clone(executor))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use autoscorer_core::{ContainerSpec, ExecutionReport, NetworkPolicy, ResourceSpec};
    use std::path::Path;

    struct Stub {
        kind: ExecutorKind,
        healthy: bool,
    }

    #[async_trait]
    impl Executor for Stub {
        fn kind(&self) -> ExecutorKind {
            self.kind
        }
        async fn run(&self, _spec: &JobSpec, _workspace_path: &Path) -> ExecutionReport {
            unimplemented!()
        }
        async fn health_check(&self) -> bool {
            self.healthy
        }
    }

    fn base_spec() -> JobSpec {
        JobSpec {
            job_id: "job-1".to_string(),
            task_type: "classification".to_string(),
            scorer_name: "classification_f1".to_string(),
            container: ContainerSpec {
                image: "x".to_string(),
                cmd: vec![],
                env: Default::default(),
                working_dir: "/workspace".to_string(),
                shm_size: None,
            },
            resources: ResourceSpec { cpu: 1.0, memory: "1Gi".to_string(), gpu: 0, disk: None },
            time_limit_seconds: 60,
            network_policy: NetworkPolicy::None,
            scorer_params: serde_json::Map::new(),
            executor: None,
        }
    }

    fn selector(executors: Vec<(ExecutorKind, bool)>) -> ExecutorSelector {
        let map = executors
            .into_iter()
            .map(|(kind, healthy)| (kind, Arc::new(Stub { kind, healthy }) as Arc<dyn Executor>))
            .collect();
        ExecutorSelector::new(map, ExecutorKind::Container, 16 * 1024 * 1024 * 1024)
    }

    #[tokio::test]
    async fn default_executor_used_when_healthy() {
        let sel = selector(vec![(ExecutorKind::Container, true)]);
        let picked = sel.select(&base_spec()).await.unwrap();
        assert_eq!(picked.kind(), ExecutorKind::Container);
    }

    #[tokio::test]
    async fn gpu_request_prefers_cluster() {
        let sel = selector(vec![(ExecutorKind::Container, true), (ExecutorKind::Cluster, true)]);
        let mut spec = base_spec();
        spec.resources.gpu = 1;
        let picked = sel.select(&spec).await.unwrap();
        assert_eq!(picked.kind(), ExecutorKind::Cluster);
    }

    #[tokio::test]
    async fn falls_back_when_preferred_unhealthy() {
        let sel = selector(vec![(ExecutorKind::Container, false), (ExecutorKind::Local, true)]);
        let picked = sel.select(&base_spec()).await.unwrap();
        assert_eq!(picked.kind(), ExecutorKind::Local);
    }

    #[tokio::test]
    async fn no_healthy_executor_is_no_executor_available() {
        let sel = selector(vec![(ExecutorKind::Container, false)]);
        let err = sel.select(&base_spec()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NoExecutorAvailable);
    }

    #[tokio::test]
    async fn explicit_override_is_honored() {
        let sel = selector(vec![(ExecutorKind::Container, true), (ExecutorKind::Local, true)]);
        let mut spec = base_spec();
        spec.executor = Some("local".to_string());
        let picked = sel.select(&spec).await.unwrap();
        assert_eq!(picked.kind(), ExecutorKind::Local);
    }
}
