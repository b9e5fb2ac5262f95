//! The `Scorer` capability and the registry's bookkeeping entry for it.

use autoscorer_core::ErrorBlock;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A scorer: a pure function over `(workspace_path, params)`, producing a
/// `ScoreResult`. Implementations never panic across this boundary on
/// expected failure modes (missing file, ID mismatch) — they return a
/// specific `ErrorBlock` instead, so the Scheduler only has to normalize
/// genuine panics into `SCORE_ERROR`.
pub trait Scorer: Send + Sync {
    fn name(&self) -> &str;
    fn version(&self) -> &str;

    fn score(
        &self,
        workspace_path: &Path,
        params: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<autoscorer_core::ScoreResult, ErrorBlock>;
}

/// A registered scorer plus where it came from. `source_file` is `None` for
/// built-ins registered in-process.
#[derive(Clone)]
pub struct ScorerEntry {
    pub name: String,
    pub version: String,
    pub implementation: std::sync::Arc<dyn Scorer>,
    pub source_file: Option<PathBuf>,
    pub mtime: Option<SystemTime>,
}

impl std::fmt::Debug for ScorerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScorerEntry")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("source_file", &self.source_file)
            .field("mtime", &self.mtime)
            .finish()
    }
}

/// What `Registry::list` returns — the public-facing subset of a
/// `ScorerEntry` (no implementation handle).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScorerListing {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<PathBuf>,
}

impl From<&ScorerEntry> for ScorerListing {
    fn from(entry: &ScorerEntry) -> Self {
        Self {
            name: entry.name.clone(),
            version: entry.version.clone(),
            source_file: entry.source_file.clone(),
        }
    }
}
