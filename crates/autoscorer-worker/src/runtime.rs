//! Wires a loaded [`Config`] into the library crates' runtime types: the
//! Registry, the executor fleet, the Scheduler. Mirrors `autoscorer-cli`'s
//! own wiring module — each binary builds its own copy from the same
//! config keys, since neither side's `main` is importable by the other.

use autoscorer_core::Config;
use autoscorer_executor::{
    ClusterExecutor, ClusterExecutorConfig, ContainerExecutor, ContainerExecutorConfig, Executor,
    ExecutorKind, ExecutorSelector, LocalExecutor, PullPolicy,
};
use autoscorer_registry::{register_builtin_scorers, Registry};
use autoscorer_scheduler::{CircuitBreaker, RetryPolicy, Scheduler};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub struct Runtime {
    pub config: Config,
    pub registry: Arc<Registry>,
    pub scheduler: Arc<Scheduler>,
}

impl Runtime {
    /// Build the full runtime from a loaded config. Executor backends that
    /// fail to connect are logged and dropped from the fleet rather than
    /// failing startup — a worker that can only reach Local or Container
    /// still drains the queue for jobs that don't need the missing backend.
    pub async fn build(config: Config) -> Self {
        let registry = Registry::new();
        register_builtin_scorers(&registry);

        let mut executors: HashMap<ExecutorKind, Arc<dyn Executor>> = HashMap::new();
        executors.insert(ExecutorKind::Local, Arc::new(LocalExecutor));

        let pull_policy = config
            .get_str("IMAGE_PULL_POLICY")
            .and_then(|s| s.parse::<PullPolicy>().ok())
            .unwrap_or(PullPolicy::IfNotPresent);
        let memory_threshold = config
            .get_str("MEMORY_THRESHOLD")
            .and_then(|s| autoscorer_core::size::parse_memory(s).ok())
            .unwrap_or(16 * 1024 * 1024 * 1024);
        let container_config = ContainerExecutorConfig { pull_policy, ..Default::default() };
        match ContainerExecutor::connect(container_config) {
            Ok(executor) => {
                executors.insert(ExecutorKind::Container, Arc::new(executor));
            }
            Err(e) => warn!(error = %e.message, "container executor unavailable, dropping from fleet"),
        }

        if config.get_bool("CLUSTER_ENABLED").unwrap_or(false) {
            let namespace = config.get_str("CLUSTER_NAMESPACE").unwrap_or("default").to_string();
            let cluster_config = ClusterExecutorConfig { namespace, ..Default::default() };
            match ClusterExecutor::connect(cluster_config).await {
                Ok(executor) => {
                    executors.insert(ExecutorKind::Cluster, Arc::new(executor));
                }
                Err(e) => warn!(error = %e.message, "cluster executor unavailable, dropping from fleet"),
            }
        }

        let default_executor = config
            .get_str("DEFAULT_EXECUTOR")
            .and_then(|s| s.parse::<ExecutorKind>().ok())
            .unwrap_or(ExecutorKind::Container);
        let selector = Arc::new(ExecutorSelector::new(executors, default_executor, memory_threshold));

        let retry = RetryPolicy::new(
            config.get_int("RETRY_MAX_ATTEMPTS").unwrap_or(3) as u32,
            Duration::from_secs_f64(config.get_float("RETRY_BASE_BACKOFF_SECS").unwrap_or(1.0)),
            Duration::from_secs_f64(config.get_float("RETRY_MAX_BACKOFF_SECS").unwrap_or(30.0)),
        );
        let breaker = CircuitBreaker::new(
            config.get_int("CIRCUIT_BREAKER_THRESHOLD").unwrap_or(5) as u32,
            Duration::from_secs(config.get_int("CIRCUIT_BREAKER_COOLDOWN_SECS").unwrap_or(60) as u64),
        );
        let scorer_timeout = Duration::from_secs(config.get_int("SCORER_TIMEOUT_SECS").unwrap_or(300) as u64);

        let scheduler = Arc::new(Scheduler::new(Arc::clone(&registry), selector, retry, breaker, scorer_timeout));

        Self { config, registry, scheduler }
    }
}
