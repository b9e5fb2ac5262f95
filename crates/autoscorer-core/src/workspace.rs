//! Workspace Manager (C1) — validates and materializes the standardized
//! on-disk workspace contract described in spec §3/§4.1/§6.

use crate::error::{CoreError, ErrorBlock, ErrorCode, Stage};
use crate::jobspec::JobSpec;
use std::fs;
use std::path::{Path, PathBuf};

/// A filesystem tree rooted at `root`, conforming to the workspace layout:
/// `meta.json`, `input/`, `output/`, `logs/`.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta_path(&self) -> PathBuf {
        self.root.join("meta.json")
    }

    pub fn input_dir(&self) -> PathBuf {
        self.root.join("input")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn result_path(&self) -> PathBuf {
        self.output_dir().join("result.json")
    }

    pub fn container_log_path(&self) -> PathBuf {
        self.logs_dir().join("container.log")
    }

    pub fn run_info_path(&self) -> PathBuf {
        self.logs_dir().join("run_info.json")
    }

    pub fn inspect_path(&self) -> PathBuf {
        self.logs_dir().join("inspect.json")
    }
}

/// Validates a directory is a conforming workspace and produces a parsed
/// `JobSpec`. Stateless — holds no data of its own, just free functions
/// grouped under a zero-sized unit struct, since validation has no
/// external dependency to inject.
pub struct WorkspaceManager;

impl WorkspaceManager {
    /// `validate(path) -> JobSpec | ValidationError`. May create empty
    /// `output/` and `logs/` directories; never touches `input/` or
    /// `meta.json`.
    pub fn validate(root: impl Into<PathBuf>) -> Result<JobSpec, ErrorBlock> {
        let ws = Workspace::at(root);

        if !ws.meta_path().is_file() {
            return Err(ErrorBlock::new(
                ErrorCode::MissingFile,
                Stage::Validation,
                format!("meta.json not found at {:?}", ws.meta_path()),
            ));
        }

        let bytes = fs::read(ws.meta_path()).map_err(|e| {
            ErrorBlock::new(ErrorCode::MissingFile, Stage::Validation, e.to_string())
        })?;

        let spec = JobSpec::from_json(&bytes).map_err(|e: CoreError| ErrorBlock::from(e))?;

        if !ws.input_dir().is_dir() {
            return Err(ErrorBlock::new(
                ErrorCode::MissingFile,
                Stage::Validation,
                format!("input/ directory not found at {:?}", ws.input_dir()),
            ));
        }

        let input_populated = fs::read_dir(ws.input_dir())
            .map_err(|e| ErrorBlock::new(ErrorCode::MissingFile, Stage::Validation, e.to_string()))?
            .next()
            .is_some();
        if !input_populated {
            return Err(ErrorBlock::new(
                ErrorCode::MissingFile,
                Stage::Validation,
                "input/ directory is empty",
            ));
        }

        fs::create_dir_all(ws.output_dir()).map_err(|e| {
            ErrorBlock::new(ErrorCode::MissingFile, Stage::Validation, e.to_string())
        })?;
        fs::create_dir_all(ws.logs_dir()).map_err(|e| {
            ErrorBlock::new(ErrorCode::MissingFile, Stage::Validation, e.to_string())
        })?;

        spec.check_invariants().map_err(|errors| {
            let message = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            ErrorBlock::new(ErrorCode::InvalidValue, Stage::Validation, message)
        })?;

        Ok(spec)
    }

    /// See [`crate::size::normalize_image`].
    pub fn normalize_image(image: &str) -> String {
        crate::size::normalize_image(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_meta(dir: &Path, job_id: &str) {
        let meta = serde_json::json!({
            "job_id": job_id,
            "task_type": "classification",
            "scorer_name": "classification_f1",
            "container": {"image": "scorer:1.0", "cmd": ["run"]},
            "resources": {"cpu": 1.0, "memory": "1Gi"},
            "time_limit_seconds": 30,
        });
        fs::write(dir.join("meta.json"), meta.to_string()).unwrap();
    }

    #[test]
    fn validate_creates_missing_output_and_logs_dirs() {
        let dir = tempdir().unwrap();
        write_meta(dir.path(), "job-1");
        fs::create_dir(dir.path().join("input")).unwrap();
        fs::write(dir.path().join("input/gt.csv"), "id,label\n1,cat\n").unwrap();

        assert!(!dir.path().join("output").exists());
        let spec = WorkspaceManager::validate(dir.path()).unwrap();
        assert_eq!(spec.job_id, "job-1");
        assert!(dir.path().join("output").is_dir());
        assert!(dir.path().join("logs").is_dir());
    }

    #[test]
    fn validate_is_idempotent() {
        let dir = tempdir().unwrap();
        write_meta(dir.path(), "job-1");
        fs::create_dir(dir.path().join("input")).unwrap();
        fs::write(dir.path().join("input/gt.csv"), "id,label\n1,cat\n").unwrap();

        let first = WorkspaceManager::validate(dir.path()).unwrap();
        let second = WorkspaceManager::validate(dir.path()).unwrap();
        assert_eq!(first.job_id, second.job_id);
    }

    #[test]
    fn validate_never_touches_input_dir() {
        let dir = tempdir().unwrap();
        write_meta(dir.path(), "job-1");
        fs::create_dir(dir.path().join("input")).unwrap();
        fs::write(dir.path().join("input/gt.csv"), "id,label\n1,cat\n").unwrap();
        let meta_before = fs::metadata(dir.path().join("input/gt.csv")).unwrap().len();

        WorkspaceManager::validate(dir.path()).unwrap();

        let meta_after = fs::metadata(dir.path().join("input/gt.csv")).unwrap().len();
        assert_eq!(meta_before, meta_after);
    }

    #[test]
    fn missing_meta_json_fails_with_missing_file() {
        let dir = tempdir().unwrap();
        let err = WorkspaceManager::validate(dir.path()).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::MissingFile);
    }

    #[test]
    fn empty_input_dir_fails() {
        let dir = tempdir().unwrap();
        write_meta(dir.path(), "job-1");
        fs::create_dir(dir.path().join("input")).unwrap();
        let err = WorkspaceManager::validate(dir.path()).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::MissingFile);
    }

    #[test]
    fn bad_json_fails_with_bad_format() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("meta.json"), "{not json").unwrap();
        fs::create_dir(dir.path().join("input")).unwrap();
        fs::write(dir.path().join("input/gt.csv"), "x").unwrap();
        let err = WorkspaceManager::validate(dir.path()).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::BadFormat);
    }

    #[test]
    fn invalid_cpu_fails_with_invalid_value() {
        let dir = tempdir().unwrap();
        let meta = serde_json::json!({
            "job_id": "job-1",
            "task_type": "classification",
            "scorer_name": "classification_f1",
            "container": {"image": "scorer:1.0", "cmd": ["run"]},
            "resources": {"cpu": 0.0, "memory": "1Gi"},
            "time_limit_seconds": 30,
        });
        fs::write(dir.path().join("meta.json"), meta.to_string()).unwrap();
        fs::create_dir(dir.path().join("input")).unwrap();
        fs::write(dir.path().join("input/gt.csv"), "x").unwrap();
        let err = WorkspaceManager::validate(dir.path()).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidValue);
    }
}
