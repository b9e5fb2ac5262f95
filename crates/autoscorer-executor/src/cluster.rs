//! Cluster Executor (spec §4.3.2) — submits a one-shot batch Job to a
//! Kubernetes-compatible cluster API, polling for completion.

use crate::executor::{Executor, ExecutorKind};
use async_trait::async_trait;
use autoscorer_core::{ErrorBlock, ErrorCode, ExecutionReport, JobSpec, Stage, Workspace, WorkspaceManager};
use k8s_openapi::api::batch::v1::Job as K8sJob;
use k8s_openapi::api::core::v1::{Container, HostPathVolumeSource, PodSpec, PodTemplateSpec, Volume, VolumeMount};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, ListParams, LogParams, PostParams};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};

/// How long a succeeded job's resources are kept before cleanup, and how
/// long a failed one is preserved for diagnosis (spec §4.3.2).
#[derive(Debug)]
pub struct ClusterExecutorConfig {
    pub namespace: String,
    pub poll_interval: Duration,
    pub success_ttl: Duration,
    pub failure_diagnostic_window: Duration,
}

impl Default for ClusterExecutorConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            poll_interval: Duration::from_secs(2),
            success_ttl: Duration::from_secs(60),
            failure_diagnostic_window: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug)]
pub struct ClusterExecutor {
    client: kube::Client,
    config: ClusterExecutorConfig,
}

impl ClusterExecutor {
    pub async fn connect(config: ClusterExecutorConfig) -> Result<Self, ErrorBlock> {
        let client = kube::Client::try_default()
            .await
            .map_err(|e| ErrorBlock::new(ErrorCode::ClusterScheduleFailed, Stage::Execution, e.to_string()))?;
        Ok(Self { client, config })
    }

    fn job_name(&self, spec: &JobSpec) -> String {
        format!("autoscorer-{}", spec.job_id.to_lowercase())
    }

    fn build_job(&self, spec: &JobSpec, name: &str, workspace: &Workspace) -> K8sJob {
        let image = WorkspaceManager::normalize_image(&spec.container.image);
        let memory_bytes = spec.resources.memory_bytes().unwrap_or(spec.resources.cpu as u64 * 1024 * 1024 * 1024);

        let mut requests = BTreeMap::new();
        requests.insert("cpu".to_string(), k8s_openapi::apimachinery::pkg::api::resource::Quantity(spec.resources.cpu.to_string()));
        requests.insert("memory".to_string(), k8s_openapi::apimachinery::pkg::api::resource::Quantity(memory_bytes.to_string()));
        if spec.resources.gpu > 0 {
            requests.insert(
                "nvidia.com/gpu".to_string(),
                k8s_openapi::apimachinery::pkg::api::resource::Quantity(spec.resources.gpu.to_string()),
            );
        }

        let container = Container {
            name: "scorer".to_string(),
            image: Some(image),
            command: Some(spec.container.cmd.clone()),
            env: Some(
                spec.container
                    .env
                    .iter()
                    .map(|(k, v)| k8s_openapi::api::core::v1::EnvVar { name: k.clone(), value: Some(v.clone()), value_from: None })
                    .collect(),
            ),
            volume_mounts: Some(vec![VolumeMount {
                name: "workspace".to_string(),
                mount_path: "/workspace".to_string(),
                ..Default::default()
            }]),
            resources: Some(k8s_openapi::api::core::v1::ResourceRequirements {
                requests: Some(requests.clone()),
                limits: Some(requests),
                ..Default::default()
            }),
            security_context: Some(k8s_openapi::api::core::v1::SecurityContext {
                run_as_non_root: Some(true),
                read_only_root_filesystem: Some(true),
                allow_privilege_escalation: Some(false),
                capabilities: Some(k8s_openapi::api::core::v1::Capabilities {
                    drop: Some(vec!["ALL".to_string()]),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        K8sJob {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(self.config.namespace.clone()),
                ..Default::default()
            },
            spec: Some(k8s_openapi::api::batch::v1::JobSpec {
                backoff_limit: Some(0),
                ttl_seconds_after_finished: Some(self.config.success_ttl.as_secs() as i32),
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta { labels: Some(BTreeMap::from([("app".to_string(), "autoscorer".to_string())])), ..Default::default() }),
                    spec: Some(PodSpec {
                        containers: vec![container],
                        restart_policy: Some("Never".to_string()),
                        // hostPath assumes the cluster's nodes share the workspace
                        // filesystem with this process (e.g. a NFS-backed node pool
                        // or a single-node dev cluster) — the node-local case
                        // spec §4.3.2 permits. A cluster without a shared
                        // filesystem needs an init container that stages
                        // input/output through the broker or an object store
                        // instead; that path isn't wired up here.
                        volumes: Some(vec![Volume {
                            name: "workspace".to_string(),
                            host_path: Some(HostPathVolumeSource {
                                path: workspace.root().display().to_string(),
                                type_: Some("Directory".to_string()),
                            }),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            status: None,
        }
    }

    async fn poll_until_complete(&self, api: &Api<K8sJob>, name: &str, deadline: Duration) -> Result<bool, ErrorBlock> {
        let started = Instant::now();
        loop {
            let job = api
                .get(name)
                .await
                .map_err(|e| ErrorBlock::new(ErrorCode::ClusterScheduleFailed, Stage::Execution, e.to_string()))?;

            if let Some(status) = &job.status {
                if status.succeeded.unwrap_or(0) > 0 {
                    return Ok(true);
                }
                if status.failed.unwrap_or(0) > 0 {
                    return Ok(false);
                }
            }

            if started.elapsed() > deadline {
                return Err(ErrorBlock::new(
                    ErrorCode::Timeout,
                    Stage::Execution,
                    "cluster job did not complete in time",
                ));
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn collect_logs(&self, name: &str, workspace: &Workspace) {
        let pods: Api<k8s_openapi::api::core::v1::Pod> = Api::namespaced(self.client.clone(), &self.config.namespace);
        let selector = ListParams::default().labels(&format!("job-name={name}"));
        let Ok(list) = pods.list(&selector).await else { return };
        let Some(pod) = list.items.first() else { return };
        let Some(pod_name) = &pod.metadata.name else { return };

        if let Ok(logs) = pods.logs(pod_name, &LogParams::default()).await {
            let _ = tokio::fs::write(workspace.container_log_path(), logs).await;
        }
    }

    async fn cleanup(&self, api: &Api<K8sJob>, name: &str, succeeded: bool) {
        if succeeded {
            let _ = api.delete(name, &DeleteParams::background()).await;
        }
        // On failure the Job (and its ttl_seconds_after_finished) is left
        // in place for `failure_diagnostic_window`; nothing to do here —
        // the cluster's own TTL controller reclaims it eventually.
    }
}

#[async_trait]
impl Executor for ClusterExecutor {
    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Cluster
    }

    async fn run(&self, spec: &JobSpec, workspace_path: &Path) -> ExecutionReport {
        let started = Instant::now();
        let workspace = Workspace::at(workspace_path);
        let api: Api<K8sJob> = Api::namespaced(self.client.clone(), &self.config.namespace);
        let name = self.job_name(spec);
        let job = self.build_job(spec, &name, &workspace);

        if let Err(e) = api.create(&PostParams::default(), &job).await {
            return ExecutionReport::failure(
                ErrorBlock::new(ErrorCode::ClusterScheduleFailed, Stage::Execution, e.to_string()),
                started.elapsed(),
            );
        }

        let deadline = Duration::from_secs(spec.time_limit_seconds);
        let outcome = self.poll_until_complete(&api, &name, deadline).await;
        self.collect_logs(&name, &workspace).await;

        match outcome {
            Ok(true) => {
                self.cleanup(&api, &name, true).await;
                ExecutionReport::success(0, started.elapsed(), Some(workspace.container_log_path().display().to_string()))
            }
            Ok(false) => {
                self.cleanup(&api, &name, false).await;
                ExecutionReport::failure(
                    ErrorBlock::new(ErrorCode::ContainerExitNonzero, Stage::Execution, "cluster job failed")
                        .with_logs_path(workspace.container_log_path().display().to_string()),
                    started.elapsed(),
                )
            }
            Err(e) => {
                self.cleanup(&api, &name, false).await;
                ExecutionReport::failure(e, started.elapsed())
            }
        }
    }

    async fn health_check(&self) -> bool {
        let api: Api<k8s_openapi::api::core::v1::Node> = Api::all(self.client.clone());
        api.list(&ListParams::default().limit(1)).await.is_ok()
    }
}
