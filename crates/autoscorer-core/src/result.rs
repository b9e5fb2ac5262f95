//! The canonical `Result` written to `output/result.json`, and the
//! `ExecutionReport` an Executor hands back to the Scheduler.

use crate::error::ErrorBlock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Summary {
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub path: String,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Versioning {
    pub scorer: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    pub timestamp: String,
}

/// The canonical scoring output. Exactly one of `summary` or `error` is the
/// authoritative status indicator (spec §3) — enforced by only constructing
/// this type through [`ScoreResult::success`] / [`ScoreResult::failure`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metrics: HashMap<String, f64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub artifacts: HashMap<String, Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versioning: Option<Versioning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBlock>,
}

impl ScoreResult {
    pub fn success(summary: Summary, metrics: HashMap<String, f64>, versioning: Versioning) -> Self {
        Self {
            summary: Some(summary),
            metrics,
            artifacts: HashMap::new(),
            timing: None,
            resources: None,
            versioning: Some(versioning),
            error: None,
        }
    }

    pub fn failure(error: ErrorBlock) -> Self {
        Self {
            summary: None,
            metrics: HashMap::new(),
            artifacts: HashMap::new(),
            timing: None,
            resources: None,
            versioning: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.summary.is_some() && self.error.is_none()
    }

    pub fn with_artifact(mut self, name: impl Into<String>, artifact: Artifact) -> Self {
        self.artifacts.insert(name.into(), artifact);
        self
    }

    pub fn with_timing(mut self, timing: serde_json::Value) -> Self {
        self.timing = Some(timing);
        self
    }
}

/// Status an [`ExecutionReport`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failure,
}

/// What an Executor hands back to the Scheduler after `run()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_usage: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBlock>,
}

impl ExecutionReport {
    pub fn success(exit_code: i32, duration: Duration, log_path: Option<String>) -> Self {
        Self {
            status: ExecutionStatus::Success,
            exit_code: Some(exit_code),
            duration,
            resource_usage: None,
            log_path,
            error: None,
        }
    }

    pub fn failure(error: ErrorBlock, duration: Duration) -> Self {
        Self {
            status: ExecutionStatus::Failure,
            exit_code: None,
            duration,
            resource_usage: None,
            log_path: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, ExecutionStatus::Success)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, Stage};

    #[test]
    fn success_and_error_are_mutually_exclusive_by_construction() {
        let result = ScoreResult::success(
            Summary { score: 1.0, ..Default::default() },
            HashMap::from([("f1".to_string(), 1.0)]),
            Versioning {
                scorer: "classification_f1".to_string(),
                version: "1.0".to_string(),
                algorithm: None,
                timestamp: "2026-01-01T00:00:00Z".to_string(),
            },
        );
        assert!(result.is_success());
        assert!(result.error.is_none());

        let failed = ScoreResult::failure(ErrorBlock::new(
            ErrorCode::ScoreError,
            Stage::Scoring,
            "boom",
        ));
        assert!(!failed.is_success());
        assert!(failed.summary.is_none());
    }

    #[test]
    fn execution_report_round_trips_duration_as_seconds() {
        let report = ExecutionReport::success(0, Duration::from_millis(1500), None);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("1.5"));
        let parsed: ExecutionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.duration, Duration::from_millis(1500));
    }
}
