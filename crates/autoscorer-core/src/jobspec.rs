//! `JobSpec` — the parsed, validated form of a workspace's `meta.json`.

use crate::error::CoreError;
use crate::size::parse_memory;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Container launch parameters for a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub image: String,
    #[serde(default)]
    pub cmd: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default = "default_working_dir")]
    pub working_dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shm_size: Option<String>,
}

fn default_working_dir() -> String {
    "/workspace".to_string()
}

/// Raw resource request, as written in `meta.json`. Byte/core values are
/// derived on demand via [`ResourceSpec::memory_bytes`] rather than stored
/// redundantly, so a spec round-trips byte-for-byte through serde.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub cpu: f64,
    pub memory: String,
    #[serde(default)]
    pub gpu: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk: Option<String>,
}

impl ResourceSpec {
    pub fn memory_bytes(&self) -> Result<u64, CoreError> {
        parse_memory(&self.memory)
    }
}

/// Network exposure for the executed container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkPolicy {
    #[default]
    None,
    Restricted,
    Bridge,
}

/// The parsed, validated form of `meta.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub job_id: String,
    pub task_type: String,
    pub scorer_name: String,
    pub container: ContainerSpec,
    pub resources: ResourceSpec,
    pub time_limit_seconds: u64,
    #[serde(default)]
    pub network_policy: NetworkPolicy,
    #[serde(default)]
    pub scorer_params: serde_json::Map<String, serde_json::Value>,
    /// Explicit executor selection override (spec §4.3.4 step 1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor: Option<String>,
}

/// A job identifier is accepted if it reads as an RFC 1123 DNS label: lower-
/// or mixed-case alphanumerics, `-` and `_`, non-empty, at most 253 chars.
/// This is the same shape the Cluster Executor needs to derive a Kubernetes
/// Job resource name from, so validating it here keeps that executor from
/// having to re-derive a sanitized name later.
fn is_rfc_compatible_job_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 253
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl JobSpec {
    /// Parse `meta.json` bytes into a `JobSpec`. Unknown fields are ignored
    /// (plain `Deserialize`, no `deny_unknown_fields`).
    pub fn from_json(bytes: &[u8]) -> Result<Self, CoreError> {
        serde_json::from_slice(bytes).map_err(|e| CoreError::BadFormat(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String, CoreError> {
        serde_json::to_string_pretty(self).map_err(|e| CoreError::BadFormat(e.to_string()))
    }

    /// Check the invariants from spec §3. Returns every violation found
    /// rather than short-circuiting on the first, accumulating a `Vec` of
    /// problems so a caller can report them all at once.
    pub fn check_invariants(&self) -> Result<(), Vec<CoreError>> {
        let mut errors = Vec::new();

        if !is_rfc_compatible_job_id(&self.job_id) {
            errors.push(CoreError::InvalidValue(format!(
                "job_id {:?} is not RFC-compatible",
                self.job_id
            )));
        }

        if let Err(e) = self.resources.memory_bytes() {
            errors.push(e);
        }

        if self.resources.cpu <= 0.0 {
            errors.push(CoreError::InvalidValue(format!(
                "cpu must be > 0, got {}",
                self.resources.cpu
            )));
        }

        // gpu is unsigned; `>= 0` is automatic, but keep the check explicit
        // so a future signed-width change doesn't silently drop it.
        if (self.resources.gpu as i64) < 0 {
            errors.push(CoreError::InvalidValue("gpu must be >= 0".to_string()));
        }

        if self.time_limit_seconds == 0 {
            errors.push(CoreError::InvalidValue(
                "time_limit_seconds must be > 0".to_string(),
            ));
        }

        if self.scorer_name.trim().is_empty() {
            errors.push(CoreError::InvalidValue(
                "scorer_name must not be empty".to_string(),
            ));
        }

        if self.container.image.trim().is_empty() {
            errors.push(CoreError::InvalidValue(
                "container.image must not be empty".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_spec() -> JobSpec {
        JobSpec {
            job_id: "job-123".to_string(),
            task_type: "classification".to_string(),
            scorer_name: "classification_f1".to_string(),
            container: ContainerSpec {
                image: "scorer-runtime:1.0".to_string(),
                cmd: vec!["python".to_string(), "run.py".to_string()],
                env: HashMap::new(),
                working_dir: default_working_dir(),
                shm_size: None,
            },
            resources: ResourceSpec {
                cpu: 0.5,
                memory: "4Gi".to_string(),
                gpu: 0,
                disk: None,
            },
            time_limit_seconds: 60,
            network_policy: NetworkPolicy::None,
            scorer_params: serde_json::Map::new(),
            executor: None,
        }
    }

    #[test]
    fn valid_spec_passes_invariants() {
        assert!(base_spec().check_invariants().is_ok());
    }

    #[test]
    fn cpu_zero_rejected_half_accepted() {
        let mut spec = base_spec();
        spec.resources.cpu = 0.0;
        assert!(spec.check_invariants().is_err());

        spec.resources.cpu = 0.5;
        assert!(spec.check_invariants().is_ok());
    }

    #[test]
    fn time_limit_zero_rejected() {
        let mut spec = base_spec();
        spec.time_limit_seconds = 0;
        assert!(spec.check_invariants().is_err());
    }

    #[test]
    fn bad_memory_suffix_rejected() {
        let mut spec = base_spec();
        spec.resources.memory = "4GB".to_string();
        let errors = spec.check_invariants().unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn unknown_fields_in_json_are_ignored() {
        let json = serde_json::json!({
            "job_id": "job-1",
            "task_type": "regression",
            "scorer_name": "regression_rmse",
            "container": {"image": "r:1.0", "cmd": []},
            "resources": {"cpu": 1.0, "memory": "1Gi"},
            "time_limit_seconds": 30,
            "totally_unrecognized_field": {"nested": true},
        });
        let spec = JobSpec::from_json(json.to_string().as_bytes()).unwrap();
        assert_eq!(spec.job_id, "job-1");
    }

    #[test]
    fn job_id_rejects_path_separators() {
        let mut spec = base_spec();
        spec.job_id = "../etc/passwd".to_string();
        assert!(spec.check_invariants().is_err());
    }
}
