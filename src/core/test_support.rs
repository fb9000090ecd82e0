//! Shared helpers for unit and integration tests

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::core::engine::{EngineError, EngineJob, MediaEngine, RawMediaInfo};
use crate::core::progress_tracker::{ProgressCallback, ProgressStatus, ProgressUpdate};

pub const STUB_MEDIA_BYTES: &[u8] = b"stub media bytes";

/// In-process engine: returns canned metadata and writes placeholder files
pub struct StubEngine {
    metadata: RawMediaInfo,
    failure: Option<String>,
    files: Option<Vec<String>>,
    probe_calls: AtomicUsize,
    download_calls: AtomicUsize,
    last_probe_dir: Mutex<Option<PathBuf>>,
    jobs: Mutex<Vec<EngineJob>>,
}

impl StubEngine {
    pub fn with_metadata(metadata: RawMediaInfo) -> Self {
        Self {
            metadata,
            failure: None,
            files: None,
            probe_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
            last_probe_dir: Mutex::new(None),
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn titled(title: &str) -> Self {
        Self::with_metadata(RawMediaInfo {
            title: Some(title.to_string()),
            duration: Some(212.0),
            ..Default::default()
        })
    }

    pub fn failing(message: &str) -> Self {
        let mut engine = Self::with_metadata(RawMediaInfo::default());
        engine.failure = Some(message.to_string());
        engine
    }

    /// Write exactly these file names on download instead of `<title>.<ext>`
    pub fn writing(mut self, files: &[&str]) -> Self {
        self.files = Some(files.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    pub fn last_probe_dir(&self) -> Option<PathBuf> {
        self.last_probe_dir.lock().unwrap().clone()
    }

    pub fn jobs(&self) -> Vec<EngineJob> {
        self.jobs.lock().unwrap().clone()
    }

    fn default_file_name(&self, job: &EngineJob) -> String {
        let title = self.metadata.title.as_deref().unwrap_or("NA");
        let ext = job.audio.map(|a| a.codec).unwrap_or("mp4");
        format!("{title}.{ext}")
    }
}

#[async_trait]
impl MediaEngine for StubEngine {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn probe(&self, _url: &str, scratch_dir: &Path) -> Result<RawMediaInfo, EngineError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_probe_dir.lock().unwrap() = Some(scratch_dir.to_path_buf());
        std::fs::write(scratch_dir.join("probe.info.json"), b"{}")?;

        match &self.failure {
            Some(message) => Err(EngineError::Failed(message.clone())),
            None => Ok(self.metadata.clone()),
        }
    }

    async fn download(
        &self,
        job: &EngineJob,
        progress: ProgressCallback,
    ) -> Result<RawMediaInfo, EngineError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.jobs.lock().unwrap().push(job.clone());

        if let Some(message) = &self.failure {
            return Err(EngineError::Failed(message.clone()));
        }

        let names = self
            .files
            .clone()
            .unwrap_or_else(|| vec![self.default_file_name(job)]);
        for name in &names {
            tokio::fs::write(job.output_dir.join(name), STUB_MEDIA_BYTES).await?;
        }

        progress(ProgressUpdate {
            status: ProgressStatus::Downloading,
            downloaded_bytes: Some(8),
            total_bytes: Some(STUB_MEDIA_BYTES.len() as u64),
            total_bytes_estimate: None,
            elapsed: Some(0.1),
            eta: Some(0.1),
            speed: Some(80.0),
            percent: Some(50.0),
            filename: names.first().cloned(),
        });
        progress(ProgressUpdate::finished());

        Ok(self.metadata.clone())
    }
}
