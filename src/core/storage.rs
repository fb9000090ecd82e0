//! Downloads root, per-fetch working directories and their reclamation
//!
//! Every fetch writes into its own UUID-named directory below the downloads
//! root. Directories are removed through [`DownloadsRoot::reclaim_blocking`],
//! which refuses anything that is not a strict descendant of the canonical
//! root. [`ReclaimGuard`] ties removal to the lifetime of a response body.

use futures::Stream;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::models::AppResult;
use crate::utils::file_utils::{ensure_dir_exists, is_strict_descendant};

#[derive(Debug, Clone)]
pub struct DownloadsRoot {
    path: PathBuf,
}

impl DownloadsRoot {
    /// Create the directory if needed and remember its canonical form
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        ensure_dir_exists(path)?;
        let canonical = std::fs::canonicalize(path)?;
        info!("📁 Downloads root: {}", canonical.display());
        Ok(Self { path: canonical })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fresh `<uuid>` directory for one engine run
    pub async fn create_working_dir(&self) -> AppResult<PathBuf> {
        self.create_named_dir("").await
    }

    /// Fresh `<prefix><uuid>` directory, e.g. for export scratch space
    pub async fn create_named_dir(&self, prefix: &str) -> AppResult<PathBuf> {
        let dir = self.path.join(format!("{prefix}{}", Uuid::new_v4()));
        tokio::fs::create_dir(&dir).await?;
        debug!("Created working directory {}", dir.display());
        Ok(dir)
    }

    /// Whether an existing path resolves to somewhere below the root
    pub async fn contains(&self, candidate: &Path) -> bool {
        match tokio::fs::canonicalize(candidate).await {
            Ok(canonical) => is_strict_descendant(&self.path, &canonical),
            Err(_) => false,
        }
    }

    /// Remove `dir` recursively if it lies strictly below the root.
    /// Returns whether anything was removed; failures are logged only.
    pub fn reclaim_blocking(&self, dir: &Path) -> bool {
        let canonical = match std::fs::canonicalize(dir) {
            Ok(canonical) => canonical,
            Err(e) => {
                debug!("Nothing to reclaim at {}: {}", dir.display(), e);
                return false;
            }
        };

        if !is_strict_descendant(&self.path, &canonical) {
            warn!(
                "🛑 Refusing to remove {} outside downloads root {}",
                canonical.display(),
                self.path.display()
            );
            return false;
        }

        match std::fs::remove_dir_all(&canonical) {
            Ok(()) => {
                debug!("🧹 Reclaimed {}", canonical.display());
                true
            }
            Err(e) => {
                warn!("Failed to remove {}: {}", canonical.display(), e);
                false
            }
        }
    }

    pub async fn reclaim(&self, dir: &Path) -> bool {
        let root = self.clone();
        let dir = dir.to_path_buf();
        match tokio::task::spawn_blocking(move || root.reclaim_blocking(&dir)).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Reclaim task failed: {}", e);
                false
            }
        }
    }

    /// Reclaim the working directory an undeliverable artifact lives in
    pub async fn reclaim_artifact(&self, artifact: &Path) -> bool {
        let removed = self.reclaim(&working_dir_of(artifact)).await;
        if removed {
            debug!("Dropped undeliverable artifact {}", artifact.display());
        }
        removed
    }

    pub fn reclaim_guard(&self, dir: PathBuf) -> ReclaimGuard {
        ReclaimGuard {
            root: self.clone(),
            dir: Some(dir),
        }
    }

    /// Remove direct children of the root whose modification time is older
    /// than `max_age`. Returns the number of directories removed.
    pub async fn sweep_stale(&self, max_age: Duration) -> usize {
        let root = self.clone();
        let swept = tokio::task::spawn_blocking(move || {
            let now = SystemTime::now();
            let entries = match std::fs::read_dir(&root.path) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Cannot scan {}: {}", root.path.display(), e);
                    return 0;
                }
            };

            let mut removed = 0;
            for entry in entries.flatten() {
                let Ok(metadata) = entry.metadata() else {
                    continue;
                };
                if !metadata.is_dir() {
                    continue;
                }
                let age = metadata
                    .modified()
                    .ok()
                    .and_then(|modified| now.duration_since(modified).ok());
                if matches!(age, Some(age) if age >= max_age) && root.reclaim_blocking(&entry.path())
                {
                    removed += 1;
                }
            }
            removed
        })
        .await;

        match swept {
            Ok(removed) => {
                if removed > 0 {
                    info!("🧹 Removed {} stale working directories", removed);
                }
                removed
            }
            Err(e) => {
                warn!("Stale directory sweep failed: {}", e);
                0
            }
        }
    }
}

/// The working directory holding `artifact`
pub fn working_dir_of(artifact: &Path) -> PathBuf {
    artifact
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| artifact.to_path_buf())
}

/// Removes its directory when dropped, exactly once
#[derive(Debug)]
pub struct ReclaimGuard {
    root: DownloadsRoot,
    dir: Option<PathBuf>,
}

impl Drop for ReclaimGuard {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        let root = self.root.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || root.reclaim_blocking(&dir));
            }
            Err(_) => {
                root.reclaim_blocking(&dir);
            }
        }
    }
}

/// Byte stream that owns a [`ReclaimGuard`]; the directory goes away when
/// the stream is dropped, whether it was drained or abandoned.
pub struct ReclaimingStream<S> {
    inner: S,
    _guard: ReclaimGuard,
}

impl<S> ReclaimingStream<S> {
    pub fn new(inner: S, guard: ReclaimGuard) -> Self {
        Self {
            inner,
            _guard: guard,
        }
    }
}

impl<S> Stream for ReclaimingStream<S>
where
    S: Stream + Unpin,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.inner).poll_next(cx)
    }
}

/// Poll until `path` disappears; reclamation runs on the blocking pool.
#[cfg(test)]
pub async fn wait_until_removed(path: &Path) -> bool {
    for _ in 0..100 {
        if !path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    !path.exists()
}
