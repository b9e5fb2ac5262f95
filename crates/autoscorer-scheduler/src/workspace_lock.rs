//! Per-workspace serialization (spec §4.4): `run`/`score`/`pipeline` on the
//! same workspace path are serialized within a single process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct WorkspaceLocks {
    locks: Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl WorkspaceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `path`, creating it on first use. Held until
    /// the returned guard is dropped. Keyed on the canonicalized path so
    /// two different spellings of the same workspace (a relative path, an
    /// absolute path, a path through a symlink) serialize against each
    /// other instead of getting distinct locks.
    pub async fn acquire(&self, path: &Path) -> OwnedMutexGuard<()> {
        let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let lock = {
            let mut locks = self.locks.lock().unwrap();
            Arc::clone(locks.entry(key).or_insert_with(|| Arc::new(AsyncMutex::new(()))))
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn second_acquire_waits_for_first_to_release() {
        let locks = Arc::new(WorkspaceLocks::new());
        let path = PathBuf::from("/tmp/ws-a");

        let guard = locks.acquire(&path).await;
        let locks2 = Arc::clone(&locks);
        let path2 = path.clone();
        let handle = tokio::spawn(async move {
            let _guard = locks2.acquire(&path2).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        drop(guard);
        handle.await.unwrap();
    }
}
