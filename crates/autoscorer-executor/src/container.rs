//! Container Executor (spec §4.3.1) — the primary executor, launching
//! jobs as Docker containers via `bollard`.

use crate::executor::{Executor, ExecutorKind, PullPolicy};
use async_trait::async_trait;
use autoscorer_core::{ErrorBlock, ErrorCode, ExecutionReport, JobSpec, Stage, Workspace, WorkspaceManager};
use bollard::models::{ContainerCreateBody, DeviceRequest, HostConfig};
use bollard::query_parameters::{
    CreateContainerOptionsBuilder, LogsOptionsBuilder, RemoveContainerOptionsBuilder,
    StartContainerOptions, StopContainerOptionsBuilder,
};
use bollard::Docker;
use futures::StreamExt;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;

const CONTAINER_WORKSPACE: &str = "/workspace";

#[derive(Debug)]
pub struct ContainerExecutorConfig {
    pub pull_policy: PullPolicy,
    /// Hard ceilings independent of any per-job request; requests above
    /// these are rejected with `RESOURCE_QUOTA_EXCEEDED`.
    pub memory_ceiling_bytes: u64,
    pub cpu_ceiling: f64,
}

impl Default for ContainerExecutorConfig {
    fn default() -> Self {
        Self {
            pull_policy: PullPolicy::IfNotPresent,
            memory_ceiling_bytes: 64 * 1024 * 1024 * 1024,
            cpu_ceiling: 32.0,
        }
    }
}

#[derive(Debug)]
pub struct ContainerExecutor {
    docker: Docker,
    config: ContainerExecutorConfig,
}

impl ContainerExecutor {
    pub fn connect(config: ContainerExecutorConfig) -> Result<Self, ErrorBlock> {
        let docker = Docker::connect_with_local_defaults().map_err(|e| {
            ErrorBlock::new(ErrorCode::ContainerCreateFailed, Stage::Execution, e.to_string())
        })?;
        Ok(Self { docker, config })
    }

    async fn ensure_image(&self, image: &str, workspace: &Workspace) -> Result<(), ErrorBlock> {
        let tarball = [workspace.root().join("image.tar"), workspace.root().join("image.tar.gz")]
            .into_iter()
            .find(|p| p.is_file());

        if let Some(tar_path) = tarball {
            let bytes = tokio::fs::read(&tar_path)
                .await
                .map_err(|e| ErrorBlock::new(ErrorCode::ImagePullFailed, Stage::Execution, e.to_string()))?;
            let mut stream = self.docker.import_image(
                bollard::query_parameters::ImportImageOptions::default(),
                bollard::body_full(bytes.into()),
                None,
            );
            while let Some(item) = stream.next().await {
                item.map_err(|e| ErrorBlock::new(ErrorCode::ImagePullFailed, Stage::Execution, e.to_string()))?;
            }
            return Ok(());
        }

        let present = self.docker.inspect_image(image).await.is_ok();
        match self.config.pull_policy {
            PullPolicy::Never if !present => Err(ErrorBlock::new(
                ErrorCode::ImageNotPresent,
                Stage::Execution,
                format!("image {image} not present locally and pull policy is never"),
            )),
            PullPolicy::IfNotPresent if present => Ok(()),
            _ => self.pull(image).await,
        }
    }

    async fn pull(&self, image: &str) -> Result<(), ErrorBlock> {
        let options = bollard::query_parameters::CreateImageOptionsBuilder::default()
            .from_image(image)
            .build();
        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(item) = stream.next().await {
            item.map_err(|e| ErrorBlock::new(ErrorCode::ImagePullFailed, Stage::Execution, e.to_string()))?;
        }
        Ok(())
    }

    fn build_host_config(&self, spec: &JobSpec, workspace: &Workspace) -> Result<HostConfig, ErrorBlock> {
        let memory_bytes = spec.resources.memory_bytes().map_err(ErrorBlock::from)?;
        if memory_bytes > self.config.memory_ceiling_bytes {
            return Err(ErrorBlock::new(
                ErrorCode::ResourceQuotaExceeded,
                Stage::Execution,
                format!("memory request {memory_bytes} exceeds ceiling {}", self.config.memory_ceiling_bytes),
            ));
        }
        if spec.resources.cpu > self.config.cpu_ceiling {
            return Err(ErrorBlock::new(
                ErrorCode::ResourceQuotaExceeded,
                Stage::Execution,
                format!("cpu request {} exceeds ceiling {}", spec.resources.cpu, self.config.cpu_ceiling),
            ));
        }

        let network_mode = match spec.network_policy {
            autoscorer_core::NetworkPolicy::None => "none",
            autoscorer_core::NetworkPolicy::Restricted => "bridge",
            autoscorer_core::NetworkPolicy::Bridge => "bridge",
        };

        let device_requests = (spec.resources.gpu > 0).then(|| {
            vec![DeviceRequest {
                driver: Some("nvidia".to_string()),
                count: Some(spec.resources.gpu as i64),
                capabilities: Some(vec![vec!["gpu".to_string()]]),
                ..Default::default()
            }]
        });

        Ok(HostConfig {
            binds: Some(vec![
                format!("{}:{CONTAINER_WORKSPACE}/input:ro", workspace.input_dir().display()),
                format!("{}:{CONTAINER_WORKSPACE}/output:rw", workspace.output_dir().display()),
                format!("{}:{CONTAINER_WORKSPACE}/logs:rw", workspace.logs_dir().display()),
                format!("{}:{CONTAINER_WORKSPACE}/meta.json:ro", workspace.meta_path().display()),
            ]),
            network_mode: Some(network_mode.to_string()),
            memory: Some(memory_bytes as i64),
            memory_swap: Some(memory_bytes as i64),
            nano_cpus: Some((spec.resources.cpu * 1_000_000_000.0) as i64),
            shm_size: spec.container.shm_size.as_ref().and_then(|s| autoscorer_core::size::parse_memory(s).ok()).map(|b| b as i64),
            device_requests,
            cap_drop: Some(vec!["ALL".to_string()]),
            security_opt: Some(vec!["no-new-privileges".to_string()]),
            readonly_rootfs: Some(true),
            ..Default::default()
        })
    }

    async fn stream_logs(&self, container_id: &str, logs_path: &Path) -> std::io::Result<()> {
        let mut file = tokio::fs::File::create(logs_path).await?;
        let options = LogsOptionsBuilder::default()
            .follow(true)
            .stdout(true)
            .stderr(true)
            .build();
        let mut stream = self.docker.logs(container_id, Some(options));
        while let Some(chunk) = stream.next().await {
            if let Ok(log) = chunk {
                file.write_all(log.to_string().as_bytes()).await?;
            }
        }
        Ok(())
    }

    async fn cleanup(&self, container_id: &str) {
        let _ = self
            .docker
            .stop_container(container_id, Some(StopContainerOptionsBuilder::default().t(5).build()))
            .await;
        let _ = self
            .docker
            .remove_container(container_id, Some(RemoveContainerOptionsBuilder::default().force(true).build()))
            .await;
    }
}

#[async_trait]
impl Executor for ContainerExecutor {
    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Container
    }

    async fn run(&self, spec: &JobSpec, workspace_path: &Path) -> ExecutionReport {
        let started = Instant::now();
        let workspace = Workspace::at(workspace_path);
        let image = WorkspaceManager::normalize_image(&spec.container.image);

        if let Err(e) = self.ensure_image(&image, &workspace).await {
            return ExecutionReport::failure(e, started.elapsed());
        }

        let host_config = match self.build_host_config(spec, &workspace) {
            Ok(hc) => hc,
            Err(e) => return ExecutionReport::failure(e, started.elapsed()),
        };

        let create_options = CreateContainerOptionsBuilder::default()
            .name(&format!("autoscorer-{}", spec.job_id))
            .build();
        let body = ContainerCreateBody {
            image: Some(image),
            cmd: Some(spec.container.cmd.clone()),
            env: Some(spec.container.env.iter().map(|(k, v)| format!("{k}={v}")).collect()),
            working_dir: Some(spec.container.working_dir.clone()),
            user: Some("1000:1000".to_string()),
            host_config: Some(host_config),
            ..Default::default()
        };

        let container = match self.docker.create_container(Some(create_options), body).await {
            Ok(c) => c,
            Err(e) => {
                return ExecutionReport::failure(
                    ErrorBlock::new(ErrorCode::ContainerCreateFailed, Stage::Execution, e.to_string()),
                    started.elapsed(),
                )
            }
        };

        if let Err(e) = self.docker.start_container(&container.id, None::<StartContainerOptions>).await {
            self.cleanup(&container.id).await;
            return ExecutionReport::failure(
                ErrorBlock::new(ErrorCode::ContainerCreateFailed, Stage::Execution, e.to_string()),
                started.elapsed(),
            );
        }

        let log_path = workspace.container_log_path();
        let log_task = tokio::spawn({
            let this_docker = self.docker.clone();
            let container_id = container.id.clone();
            let log_path = log_path.clone();
            async move {
                let executor = ContainerExecutor { docker: this_docker, config: ContainerExecutorConfig::default() };
                let _ = executor.stream_logs(&container_id, &log_path).await;
            }
        });

        let timeout = Duration::from_secs(spec.time_limit_seconds);
        let mut wait_stream = self.docker.wait_container(&container.id, None::<bollard::query_parameters::WaitContainerOptions>);
        let wait_result = tokio::time::timeout(timeout, async {
            let mut exit_code = 0i64;
            let mut wait_error = None;
            while let Some(item) = wait_stream.next().await {
                match item {
                    Ok(status) => exit_code = status.status_code,
                    Err(e) => wait_error = Some(e.to_string()),
                }
            }
            (exit_code, wait_error)
        })
        .await;
        log_task.abort();

        let report = match wait_result {
            Err(_) => {
                self.cleanup(&container.id).await;
                ExecutionReport::failure(
                    ErrorBlock::new(
                        ErrorCode::Timeout,
                        Stage::Execution,
                        format!("exceeded time_limit_seconds={}", spec.time_limit_seconds),
                    )
                    .with_logs_path(log_path.display().to_string()),
                    started.elapsed(),
                )
            }
            Ok((exit_code, wait_error)) => {
                if let Some(err) = wait_error {
                    self.cleanup(&container.id).await;
                    ExecutionReport::failure(
                        ErrorBlock::new(ErrorCode::ContainerCreateFailed, Stage::Execution, err),
                        started.elapsed(),
                    )
                } else if exit_code == 0 {
                    self.cleanup(&container.id).await;
                    ExecutionReport::success(0, started.elapsed(), Some(log_path.display().to_string()))
                } else {
                    if let Ok(inspect) = self
                        .docker
                        .inspect_container(&container.id, None::<bollard::query_parameters::InspectContainerOptions>)
                        .await
                    {
                        if let Ok(json) = serde_json::to_vec_pretty(&inspect) {
                            let _ = tokio::fs::write(workspace.inspect_path(), json).await;
                        }
                    }
                    self.cleanup(&container.id).await;
                    ExecutionReport::failure(
                        ErrorBlock::new(
                            ErrorCode::ContainerExitNonzero,
                            Stage::Execution,
                            format!("container exited with status {exit_code}"),
                        )
                        .with_logs_path(log_path.display().to_string()),
                        started.elapsed(),
                    )
                }
            }
        };

        report
    }

    async fn health_check(&self) -> bool {
        self.docker.ping().await.is_ok()
    }
}
