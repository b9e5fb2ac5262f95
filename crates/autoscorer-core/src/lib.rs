//! AutoScorer Core - shared data model, workspace contract and config layer.
//!
//! This crate provides the types every other AutoScorer component builds
//! on: the job specification parsed from `meta.json`, the canonical result
//! and execution-report envelopes, the workspace filesystem contract, the
//! error taxonomy, and the layered configuration store.

pub mod config;
pub mod error;
pub mod jobspec;
pub mod result;
pub mod size;
pub mod workspace;

pub use config::{Config, ConfigValue};
pub use error::{CoreError, ErrorBlock, ErrorCode, Stage};
pub use jobspec::{ContainerSpec, JobSpec, NetworkPolicy, ResourceSpec};
pub use result::{Artifact, ExecutionReport, ExecutionStatus, ScoreResult, Summary, Versioning};
pub use workspace::{Workspace, WorkspaceManager};
