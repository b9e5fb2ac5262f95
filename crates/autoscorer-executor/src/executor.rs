//! The `Executor` capability every backend (local, container, cluster)
//! implements (spec §4.3).

use async_trait::async_trait;
use autoscorer_core::{ExecutionReport, JobSpec};
use std::path::Path;

/// Which executor backend ran, or is asked to run, a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    Local,
    Container,
    Cluster,
}

impl ExecutorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutorKind::Local => "local",
            ExecutorKind::Container => "container",
            ExecutorKind::Cluster => "cluster",
        }
    }
}

impl std::str::FromStr for ExecutorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(ExecutorKind::Local),
            "container" => Ok(ExecutorKind::Container),
            "cluster" => Ok(ExecutorKind::Cluster),
            other => Err(format!("unknown executor kind {other:?}")),
        }
    }
}

/// Image pull policy (spec §4.3.1 step 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PullPolicy {
    Always,
    IfNotPresent,
    Never,
}

impl std::str::FromStr for PullPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(PullPolicy::Always),
            "if-not-present" => Ok(PullPolicy::IfNotPresent),
            "never" => Ok(PullPolicy::Never),
            other => Err(format!("unknown pull policy {other:?}")),
        }
    }
}

/// The common contract every executor variant exposes.
#[async_trait]
pub trait Executor: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> ExecutorKind;

    async fn run(&self, spec: &JobSpec, workspace_path: &Path) -> ExecutionReport;

    async fn health_check(&self) -> bool;
}
