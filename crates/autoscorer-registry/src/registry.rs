//! Process-wide scorer registry (spec §4.2).
//!
//! A single `std::sync::Mutex` guards a named-entry map, last-writer-wins
//! on re-registration. Every critical section is a map lookup/insert,
//! never I/O, matching the "short critical sections only" rule in spec §5.

use crate::plugin::{self, PluginError};
use crate::scorer::{Scorer, ScorerEntry, ScorerListing};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Plugin(#[from] PluginError),
}

struct State {
    entries: HashMap<String, ScorerEntry>,
    /// Libraries kept alive for the process lifetime — see `plugin` module.
    libraries: Vec<libloading::Library>,
    watchers: HashMap<PathBuf, watch::Sender<()>>,
}

/// Default poll interval for a file watcher started without an explicit one.
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(1);

pub struct Registry {
    state: Mutex<State>,
}

impl Registry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                entries: HashMap::new(),
                libraries: Vec::new(),
                watchers: HashMap::new(),
            }),
        })
    }

    /// Insert or replace. Last-writer-wins, atomic with respect to `get`.
    pub fn register(&self, scorer: Arc<dyn Scorer>) {
        let entry = ScorerEntry {
            name: scorer.name().to_string(),
            version: scorer.version().to_string(),
            implementation: scorer,
            source_file: None,
            mtime: None,
        };
        let mut state = self.state.lock().unwrap();
        info!(scorer = %entry.name, version = %entry.version, "registered scorer");
        state.entries.insert(entry.name.clone(), entry);
    }

    pub fn get(&self, name: &str) -> Option<ScorerEntry> {
        self.state.lock().unwrap().entries.get(name).cloned()
    }

    pub fn list(&self) -> Vec<ScorerListing> {
        let state = self.state.lock().unwrap();
        let mut out: Vec<_> = state.entries.values().map(ScorerListing::from).collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Load a plugin shared library from `path`, registering every scorer
    /// it defines. If `watch` is true, also starts a background poller.
    pub fn load_file(self: &Arc<Self>, path: impl Into<PathBuf>, watch: bool) -> Result<Vec<String>, RegistryError> {
        let path = path.into();
        let names = self.install_from_file(&path)?;
        if watch {
            self.watch(path, DEFAULT_WATCH_INTERVAL);
        }
        Ok(names)
    }

    /// Re-execute the load, replacing existing entries whose `source_file`
    /// matches `path`. On failure, existing registrations are untouched.
    pub fn reload_file(&self, path: impl AsRef<Path>) -> Result<Vec<String>, RegistryError> {
        self.install_from_file(path.as_ref())
    }

    fn install_from_file(&self, path: &Path) -> Result<Vec<String>, RegistryError> {
        let loaded = plugin::load(path)?;
        let mtime = std::fs::metadata(path).and_then(|m| m.modified()).ok();

        let mut state = self.state.lock().unwrap();
        state
            .entries
            .retain(|_, entry| entry.source_file.as_deref() != Some(path));

        let mut names = Vec::with_capacity(loaded.scorers.len());
        for scorer in loaded.scorers {
            let scorer: Arc<dyn Scorer> = Arc::from(scorer);
            let entry = ScorerEntry {
                name: scorer.name().to_string(),
                version: scorer.version().to_string(),
                implementation: scorer,
                source_file: Some(path.to_path_buf()),
                mtime,
            };
            names.push(entry.name.clone());
            state.entries.insert(entry.name.clone(), entry);
        }
        state.libraries.push(loaded.library);

        Ok(names)
    }

    /// Start a background poller sampling `path`'s mtime every `interval`.
    /// The first sample establishes the baseline and never triggers a
    /// reload. A poller already running for `path` is left in place.
    pub fn watch(self: &Arc<Self>, path: impl Into<PathBuf>, interval: Duration) {
        let path = path.into();
        let mut state = self.state.lock().unwrap();
        if state.watchers.contains_key(&path) {
            return;
        }
        let (stop_tx, mut stop_rx) = watch::channel(());
        state.watchers.insert(path.clone(), stop_tx);
        drop(state);

        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut baseline: Option<SystemTime> = None;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let mtime = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
                        match baseline {
                            None => baseline = mtime,
                            Some(prev) if mtime != Some(prev) => {
                                match registry.reload_file(&path) {
                                    Ok(names) => info!(path = %path.display(), scorers = ?names, "scorer hot-reloaded"),
                                    Err(e) => warn!(path = %path.display(), error = %e, "scorer hot-reload failed"),
                                }
                                baseline = mtime;
                            }
                            _ => {}
                        }
                    }
                    _ = stop_rx.changed() => {
                        break;
                    }
                }
            }
        });
    }

    /// Stop the poller for `path`, if any. Already-registered scorers are
    /// unaffected.
    pub fn unwatch(&self, path: impl AsRef<Path>) {
        self.state.lock().unwrap().watchers.remove(path.as_ref());
    }

    pub fn watched_files(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().watchers.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoscorer_core::ScoreResult;

    struct Stub(&'static str, &'static str);

    impl Scorer for Stub {
        fn name(&self) -> &str {
            self.0
        }
        fn version(&self) -> &str {
            self.1
        }
        fn score(
            &self,
            _workspace_path: &Path,
            _params: &serde_json::Map<String, serde_json::Value>,
        ) -> Result<ScoreResult, autoscorer_core::ErrorBlock> {
            unimplemented!("stub")
        }
    }

    #[test]
    fn register_then_get_sees_it_immediately() {
        let registry = Registry::new();
        registry.register(Arc::new(Stub("s1", "1.0")));
        let entry = registry.get("s1").unwrap();
        assert_eq!(entry.version, "1.0");
    }

    #[test]
    fn register_is_last_writer_wins() {
        let registry = Registry::new();
        registry.register(Arc::new(Stub("s1", "1.0")));
        registry.register(Arc::new(Stub("s1", "2.0")));
        assert_eq!(registry.get("s1").unwrap().version, "2.0");
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn get_of_unknown_name_is_none_not_panic() {
        let registry = Registry::new();
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn list_is_sorted_by_name() {
        let registry = Registry::new();
        registry.register(Arc::new(Stub("zeta", "1.0")));
        registry.register(Arc::new(Stub("alpha", "1.0")));
        let names: Vec<_> = registry.list().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[tokio::test]
    async fn watch_and_unwatch_update_watched_files() {
        let registry = Registry::new();
        let path = PathBuf::from("/nonexistent/scorer.so");
        registry.watch(path.clone(), Duration::from_secs(60));
        assert_eq!(registry.watched_files(), vec![path.clone()]);

        registry.unwatch(&path);
        assert!(registry.watched_files().is_empty());
    }

    #[test]
    fn load_file_reports_missing_library() {
        let registry = Registry::new();
        let err = registry.load_file("/nonexistent/scorer.so", false).unwrap_err();
        assert!(matches!(err, RegistryError::Plugin(PluginError::Load { .. })));
    }
}
