//! Error taxonomy shared by every AutoScorer component.
//!
//! Every fallible boundary in the system ultimately normalizes into an
//! [`ErrorBlock`] — the type written into `result.json` and task envelopes.
//! Component-local error enums (in the executor, registry and scheduler
//! crates) convert `Into<ErrorBlock>` rather than leaking their own shape
//! across crate boundaries.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One code per failure mode, matching the taxonomy table in the spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // validation
    MissingFile,
    BadFormat,
    InvalidValue,
    ParseError,
    // execution
    ImageNotPresent,
    ImagePullFailed,
    ContainerCreateFailed,
    ContainerExitNonzero,
    Timeout,
    ResourceQuotaExceeded,
    PermissionDenied,
    ClusterScheduleFailed,
    NoExecutorAvailable,
    NetworkTransient,
    // scoring
    ScorerNotFound,
    Mismatch,
    ScoreError,
    // config
    ConfigValidationError,
    // system
    UnhandledError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MissingFile => "MISSING_FILE",
            ErrorCode::BadFormat => "BAD_FORMAT",
            ErrorCode::InvalidValue => "INVALID_VALUE",
            ErrorCode::ParseError => "PARSE_ERROR",
            ErrorCode::ImageNotPresent => "IMAGE_NOT_PRESENT",
            ErrorCode::ImagePullFailed => "IMAGE_PULL_FAILED",
            ErrorCode::ContainerCreateFailed => "CONTAINER_CREATE_FAILED",
            ErrorCode::ContainerExitNonzero => "CONTAINER_EXIT_NONZERO",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::ResourceQuotaExceeded => "RESOURCE_QUOTA_EXCEEDED",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::ClusterScheduleFailed => "CLUSTER_SCHEDULE_FAILED",
            ErrorCode::NoExecutorAvailable => "NO_EXECUTOR_AVAILABLE",
            ErrorCode::NetworkTransient => "NETWORK_TRANSIENT",
            ErrorCode::ScorerNotFound => "SCORER_NOT_FOUND",
            ErrorCode::Mismatch => "MISMATCH",
            ErrorCode::ScoreError => "SCORE_ERROR",
            ErrorCode::ConfigValidationError => "CONFIG_VALIDATION_ERROR",
            ErrorCode::UnhandledError => "UNHANDLED_ERROR",
        }
    }

    /// Retryable per the Scheduler's retry policy (spec §4.4).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::ImagePullFailed
                | ErrorCode::NetworkTransient
                | ErrorCode::ClusterScheduleFailed
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stage a failure originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Validation,
    Execution,
    Scoring,
    Config,
    System,
}

/// Normalized error envelope, written into `result.json` and task responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBlock {
    pub code: ErrorCode,
    pub message: String,
    pub stage: Stage,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs_path: Option<String>,
}

impl ErrorBlock {
    pub fn new(code: ErrorCode, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            stage,
            details: HashMap::new(),
            logs_path: None,
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn with_logs_path(mut self, path: impl Into<String>) -> Self {
        self.logs_path = Some(path.into());
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for ErrorBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}/{}] {}", self.stage, self.code, self.message)
    }
}

impl std::error::Error for ErrorBlock {}

/// Crate-local error type for `autoscorer-core` operations (workspace
/// validation, size/cpu parsing, config loading).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("missing file: {0}")]
    MissingFile(String),

    #[error("bad format: {0}")]
    BadFormat(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<CoreError> for ErrorBlock {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::MissingFile(msg) => ErrorBlock::new(ErrorCode::MissingFile, Stage::Validation, msg),
            CoreError::BadFormat(msg) => ErrorBlock::new(ErrorCode::BadFormat, Stage::Validation, msg),
            CoreError::InvalidValue(msg) => ErrorBlock::new(ErrorCode::InvalidValue, Stage::Validation, msg),
            CoreError::Config(msg) => ErrorBlock::new(ErrorCode::ConfigValidationError, Stage::Config, msg),
            CoreError::Io(e) => ErrorBlock::new(ErrorCode::MissingFile, Stage::Validation, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_codes() {
        assert!(ErrorCode::ImagePullFailed.is_retryable());
        assert!(ErrorCode::NetworkTransient.is_retryable());
        assert!(ErrorCode::ClusterScheduleFailed.is_retryable());
        assert!(!ErrorCode::Timeout.is_retryable());
        assert!(!ErrorCode::ContainerExitNonzero.is_retryable());
        assert!(!ErrorCode::PermissionDenied.is_retryable());
    }

    #[test]
    fn error_block_serializes_code_as_screaming_snake() {
        let block = ErrorBlock::new(ErrorCode::MissingFile, Stage::Scoring, "no pred.csv");
        let json = serde_json::to_string(&block).unwrap();
        assert!(json.contains("\"MISSING_FILE\""));
        assert!(json.contains("\"scoring\""));
    }

    #[test]
    fn core_error_converts_to_error_block_stage() {
        let block: ErrorBlock = CoreError::InvalidValue("cpu must be > 0".into()).into();
        assert_eq!(block.code, ErrorCode::InvalidValue);
        assert_eq!(block.stage, Stage::Validation);
    }
}
