//! Local Executor (spec §4.3.3) — a child process with coarse OS-level
//! resource limits and no container-grade isolation. Development/CI only;
//! callers are expected to keep this out of the default executor chain
//! in production configuration.

use crate::executor::{Executor, ExecutorKind};
use async_trait::async_trait;
use autoscorer_core::{ErrorBlock, ErrorCode, ExecutionReport, JobSpec, Stage};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::process::Command;

#[derive(Debug)]
pub struct LocalExecutor;

#[async_trait]
impl Executor for LocalExecutor {
    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Local
    }

    async fn run(&self, spec: &JobSpec, workspace_path: &Path) -> ExecutionReport {
        let started = Instant::now();
        let timeout = Duration::from_secs(spec.time_limit_seconds);

        let Some(program) = spec.container.cmd.first() else {
            return ExecutionReport::failure(
                ErrorBlock::new(ErrorCode::ContainerCreateFailed, Stage::Execution, "empty command"),
                started.elapsed(),
            );
        };

        let mut command = Command::new(program);
        command
            .args(&spec.container.cmd[1..])
            .current_dir(workspace_path)
            .envs(&spec.container.env)
            // a timed-out wait_with_output future drops the child; without
            // this the process would keep running past time_limit_seconds.
            .kill_on_drop(true);

        unsafe {
            apply_memory_rlimit(&mut command, &spec.resources);
        }

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ExecutionReport::failure(
                    ErrorBlock::new(ErrorCode::ContainerCreateFailed, Stage::Execution, e.to_string()),
                    started.elapsed(),
                );
            }
        };

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) if output.status.success() => {
                ExecutionReport::success(output.status.code().unwrap_or(0), started.elapsed(), None)
            }
            Ok(Ok(output)) => ExecutionReport::failure(
                ErrorBlock::new(
                    ErrorCode::ContainerExitNonzero,
                    Stage::Execution,
                    format!("process exited with status {}", output.status),
                )
                .with_detail("stderr_tail", tail(&output.stderr)),
                started.elapsed(),
            ),
            Ok(Err(e)) => ExecutionReport::failure(
                ErrorBlock::new(ErrorCode::ContainerCreateFailed, Stage::Execution, e.to_string()),
                started.elapsed(),
            ),
            Err(_) => ExecutionReport::failure(
                ErrorBlock::new(
                    ErrorCode::Timeout,
                    Stage::Execution,
                    format!("exceeded time_limit_seconds={}", spec.time_limit_seconds),
                ),
                started.elapsed(),
            ),
        }
    }

    async fn health_check(&self) -> bool {
        true
    }
}

fn tail(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.lines().rev().take(20).collect::<Vec<_>>().into_iter().rev().collect::<Vec<_>>().join("\n")
}

/// Best-effort `RLIMIT_AS` cap, applied in the forked child before exec via
/// `pre_exec`. Coarse — unlike the Container Executor's cgroup-based memory
/// limit, this bounds virtual address space, not resident memory.
#[cfg(unix)]
unsafe fn apply_memory_rlimit(command: &mut Command, resources: &autoscorer_core::ResourceSpec) {
    use std::os::unix::process::CommandExt;

    let Ok(bytes) = resources.memory_bytes() else {
        return;
    };
    unsafe {
        command.pre_exec(move || {
            let limit = libc::rlimit {
                rlim_cur: bytes as libc::rlim_t,
                rlim_max: bytes as libc::rlim_t,
            };
            if libc::setrlimit(libc::RLIMIT_AS, &limit) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
unsafe fn apply_memory_rlimit(_command: &mut Command, _resources: &autoscorer_core::ResourceSpec) {}

#[cfg(test)]
mod tests {
    use super::*;
    use autoscorer_core::{ContainerSpec, NetworkPolicy, ResourceSpec};
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn spec_with_cmd(cmd: Vec<&str>, time_limit_seconds: u64) -> JobSpec {
        JobSpec {
            job_id: "job-1".to_string(),
            task_type: "classification".to_string(),
            scorer_name: "classification_f1".to_string(),
            container: ContainerSpec {
                image: "unused".to_string(),
                cmd: cmd.into_iter().map(str::to_string).collect(),
                env: HashMap::new(),
                working_dir: "/workspace".to_string(),
                shm_size: None,
            },
            resources: ResourceSpec { cpu: 1.0, memory: "256Mi".to_string(), gpu: 0, disk: None },
            time_limit_seconds,
            network_policy: NetworkPolicy::None,
            scorer_params: serde_json::Map::new(),
            executor: None,
        }
    }

    #[tokio::test]
    async fn successful_command_reports_success() {
        let dir = tempdir().unwrap();
        let spec = spec_with_cmd(vec!["true"], 5);
        let report = LocalExecutor.run(&spec, dir.path()).await;
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn nonzero_exit_reports_container_exit_nonzero() {
        let dir = tempdir().unwrap();
        let spec = spec_with_cmd(vec!["false"], 5);
        let report = LocalExecutor.run(&spec, dir.path()).await;
        assert!(!report.is_success());
        assert_eq!(report.error.unwrap().code, ErrorCode::ContainerExitNonzero);
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let dir = tempdir().unwrap();
        let spec = spec_with_cmd(vec!["sleep", "5"], 1);
        let report = LocalExecutor.run(&spec, dir.path()).await;
        assert_eq!(report.error.unwrap().code, ErrorCode::Timeout);
    }
}
