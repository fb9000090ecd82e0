//! Fetch execution: one engine run into a private working directory, then
//! artifact discovery.

use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::core::engine::{EngineJob, MediaEngine};
use crate::core::format_selector::artifact_extensions;
use crate::core::models::{AppError, AppResult, FetchRequest, FetchResult, MediaKind};
use crate::core::progress_tracker::{logging_progress_callback, ProgressCallback};
use crate::core::storage::DownloadsRoot;
use crate::utils::file_utils::list_files_with_extensions;
use crate::utils::formatting::{format_duration_clock, format_file_size};

pub const DEFAULT_SINGLE_TITLE: &str = "Video";
pub const DEFAULT_COLLECTION_TITLE: &str = "Playlist";

#[derive(Clone)]
pub struct FetchExecutor {
    engine: Arc<dyn MediaEngine>,
    root: DownloadsRoot,
    progress: ProgressCallback,
}

impl FetchExecutor {
    pub fn new(engine: Arc<dyn MediaEngine>, root: DownloadsRoot) -> Self {
        Self {
            engine,
            root,
            progress: logging_progress_callback(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    pub fn root(&self) -> &DownloadsRoot {
        &self.root
    }

    pub async fn fetch(&self, request: FetchRequest) -> AppResult<FetchResult> {
        let working_dir = self.root.create_working_dir().await?;
        info!(
            "⬇️ Fetching {} as {} into {}",
            request.url,
            request.kind,
            working_dir.display()
        );

        let job = EngineJob::for_request(&request, &working_dir);
        let info = match self.engine.download(&job, self.progress.clone()).await {
            Ok(info) => info,
            Err(e) => {
                error!("❌ {} fetch failed for {}: {}", self.engine.name(), request.url, e);
                self.root.reclaim(&working_dir).await;
                return Err(AppError::FetchFailed(e.to_string()));
            }
        };

        let artifact_path = match discover_artifact(&working_dir, request.kind).await {
            Ok(Some(path)) => path,
            Ok(None) => {
                warn!("No media file produced in {}", working_dir.display());
                self.root.reclaim(&working_dir).await;
                return Err(AppError::NoArtifactProduced(working_dir));
            }
            Err(e) => {
                self.root.reclaim(&working_dir).await;
                return Err(e.into());
            }
        };

        let display_name = artifact_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let duration = format_duration_clock(info.duration);
        let title = if request.allow_collection && info.entries.is_some() {
            info.title.unwrap_or_else(|| DEFAULT_COLLECTION_TITLE.to_string())
        } else {
            info.title.unwrap_or_else(|| DEFAULT_SINGLE_TITLE.to_string())
        };

        let size = tokio::fs::metadata(&artifact_path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        info!(
            "✅ Artifact ready: {} ({}, {})",
            display_name,
            format_file_size(size),
            duration
        );

        Ok(FetchResult {
            artifact_path,
            display_name,
            title,
            working_dir,
        })
    }
}

/// First file, by name, whose extension suits `kind`
async fn discover_artifact(
    dir: &Path,
    kind: MediaKind,
) -> std::io::Result<Option<std::path::PathBuf>> {
    let files = list_files_with_extensions(dir, artifact_extensions(kind)).await?;
    if files.len() > 1 {
        info!("{} media files produced, delivering the first", files.len());
    }
    Ok(files.into_iter().next())
}
