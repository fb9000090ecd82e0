//! Media engine abstraction
//!
//! The extraction engine is an external program. [`MediaEngine`] is the seam
//! between it and the rest of the core, so resolver and fetcher can be driven
//! by a stub in tests.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::core::format_selector::{self, AudioExtraction};
use crate::core::models::FetchRequest;
use crate::core::progress_tracker::ProgressCallback;

/// Output file name template inside a working directory
pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Metadata document printed by the engine. Collections carry `entries`;
/// unavailable entries come through as `null`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMediaInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub upload_date: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub entries: Option<Vec<Option<RawMediaInfo>>>,
}

/// One download invocation
#[derive(Debug, Clone)]
pub struct EngineJob {
    pub url: String,
    pub format_selector: String,
    pub output_dir: PathBuf,
    pub output_template: String,
    pub allow_collection: bool,
    pub audio: Option<AudioExtraction>,
}

impl EngineJob {
    pub fn for_request(request: &FetchRequest, output_dir: &Path) -> Self {
        Self {
            url: request.url.clone(),
            format_selector: request.format_selector.clone(),
            output_dir: output_dir.to_path_buf(),
            output_template: OUTPUT_TEMPLATE.to_string(),
            allow_collection: request.allow_collection,
            audio: format_selector::post_processing_for(request.kind),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Failed(String),

    #[error("engine timed out after {0:?}")]
    TimedOut(Duration),

    #[error("unreadable engine output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("engine IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait MediaEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Metadata-only run. Anything the engine writes goes into `scratch_dir`.
    async fn probe(&self, url: &str, scratch_dir: &Path) -> Result<RawMediaInfo, EngineError>;

    /// Download (and post-process) into `job.output_dir`, reporting progress.
    /// Returns the metadata of what was fetched.
    async fn download(
        &self,
        job: &EngineJob,
        progress: ProgressCallback,
    ) -> Result<RawMediaInfo, EngineError>;
}
