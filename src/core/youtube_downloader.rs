//! YouTube Downloader Module
//!
//! Drives the `yt-dlp` command line program as a child process. Metadata
//! lookups use `-J`; downloads add `--no-simulate` so the same JSON document is
//! printed after the media has been written, while progress ticks stream on
//! stdout in the format described by [`PROGRESS_TEMPLATE`].

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::core::config::EngineConfig;
use crate::core::engine::{EngineError, EngineJob, MediaEngine, RawMediaInfo};
use crate::core::progress_tracker::{
    parse_progress_line, ProgressCallback, ProgressUpdate, PROGRESS_TEMPLATE,
};

/// Lines an engine run printed that were not progress ticks
#[derive(Debug, Default)]
struct EngineOutput {
    stdout: Vec<String>,
    stderr: Vec<String>,
}

/// [`MediaEngine`] backed by the `yt-dlp` executable
#[derive(Debug, Clone)]
pub struct YtDlpEngine {
    program: String,
    fetch_timeout: Duration,
    metadata_timeout: Duration,
}

impl YtDlpEngine {
    pub fn new(config: &EngineConfig) -> Self {
        info!(
            "🎬 yt-dlp engine configured: program={}, fetch timeout={}s, metadata timeout={}s",
            config.ytdlp_path, config.fetch_timeout_secs, config.metadata_timeout_secs
        );
        Self {
            program: config.ytdlp_path.clone(),
            fetch_timeout: config.fetch_timeout(),
            metadata_timeout: config.metadata_timeout(),
        }
    }

    pub fn build_probe_args(url: &str, scratch_dir: &Path) -> Vec<String> {
        vec![
            "-J".to_string(),
            "--no-warnings".to_string(),
            "--yes-playlist".to_string(),
            "--paths".to_string(),
            scratch_dir.to_string_lossy().into_owned(),
            "--".to_string(),
            url.to_string(),
        ]
    }

    pub fn build_download_args(job: &EngineJob) -> Vec<String> {
        let mut args = vec![
            "-J".to_string(),
            "--no-simulate".to_string(),
            "--no-warnings".to_string(),
            "--newline".to_string(),
            "--progress".to_string(),
            "--progress-template".to_string(),
            PROGRESS_TEMPLATE.to_string(),
            "-f".to_string(),
            job.format_selector.clone(),
            "--paths".to_string(),
            job.output_dir.to_string_lossy().into_owned(),
            "-o".to_string(),
            job.output_template.clone(),
        ];

        args.push(if job.allow_collection {
            "--yes-playlist".to_string()
        } else {
            "--no-playlist".to_string()
        });

        if let Some(audio) = job.audio {
            args.extend([
                "-x".to_string(),
                "--audio-format".to_string(),
                audio.codec.to_string(),
                "--audio-quality".to_string(),
                format!("{}K", audio.quality_kbps),
            ]);
        }

        args.push("--".to_string());
        args.push(job.url.clone());
        args
    }

    async fn run(
        &self,
        args: Vec<String>,
        limit: Duration,
        progress: Option<ProgressCallback>,
    ) -> Result<EngineOutput, EngineError> {
        debug!("Running {} {:?}", self.program, args);

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Failed("stdout of engine not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::Failed("stderr of engine not captured".into()))?;

        // quiet mode (-J) may route progress to stderr, so both streams are scanned
        let stdout_task = tokio::spawn(collect_lines(stdout, progress.clone()));
        let stderr_task = tokio::spawn(collect_lines(stderr, progress));

        let status = match timeout(limit, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!("⏱️ {} exceeded {:?}, killing it", self.program, limit);
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill {}: {}", self.program, e);
                }
                stdout_task.abort();
                stderr_task.abort();
                return Err(EngineError::TimedOut(limit));
            }
        };

        let output = EngineOutput {
            stdout: join_lines(stdout_task).await?,
            stderr: join_lines(stderr_task).await?,
        };

        if !status.success() {
            let message = failure_message(&output.stderr)
                .unwrap_or_else(|| format!("{} exited with {}", self.program, status));
            error!("❌ {} failed: {}", self.program, message);
            return Err(EngineError::Failed(message));
        }

        Ok(output)
    }
}

async fn collect_lines<R>(reader: R, progress: Option<ProgressCallback>) -> std::io::Result<Vec<String>>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut collected = Vec::new();

    while let Some(line) = lines.next_line().await? {
        if let Some(update) = parse_progress_line(&line) {
            if let Some(callback) = &progress {
                callback(update);
            }
            continue;
        }
        collected.push(line);
    }

    Ok(collected)
}

async fn join_lines(
    task: tokio::task::JoinHandle<std::io::Result<Vec<String>>>,
) -> Result<Vec<String>, EngineError> {
    task.await
        .map_err(|e| EngineError::Failed(format!("engine output reader failed: {e}")))?
        .map_err(EngineError::from)
}

/// Prefer the engine's own `ERROR:` line, else the last thing it printed
fn failure_message(stderr: &[String]) -> Option<String> {
    let lines = stderr.iter().map(|l| l.trim()).filter(|l| !l.is_empty());
    lines
        .clone()
        .filter(|l| l.starts_with("ERROR:"))
        .last()
        .or_else(|| lines.last())
        .map(str::to_string)
}

/// The JSON document is the last line of stdout that looks like one
fn parse_info_document(stdout: &[String]) -> Result<RawMediaInfo, EngineError> {
    let document = stdout
        .iter()
        .rev()
        .map(|l| l.trim())
        .find(|l| l.starts_with('{'))
        .ok_or_else(|| EngineError::Failed("engine printed no metadata".into()))?;
    Ok(serde_json::from_str(document)?)
}

#[async_trait]
impl MediaEngine for YtDlpEngine {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn probe(&self, url: &str, scratch_dir: &Path) -> Result<RawMediaInfo, EngineError> {
        debug!("🔍 Fetching video info for URL: {}", url);
        let output = self
            .run(
                Self::build_probe_args(url, scratch_dir),
                self.metadata_timeout,
                None,
            )
            .await?;
        let info = parse_info_document(&output.stdout)?;
        info!(
            "📋 Fetched video info: {}",
            info.title.as_deref().unwrap_or("<untitled>")
        );
        Ok(info)
    }

    async fn download(
        &self,
        job: &EngineJob,
        progress: ProgressCallback,
    ) -> Result<RawMediaInfo, EngineError> {
        info!(
            "🚀 Starting yt-dlp download into {}",
            job.output_dir.display()
        );
        let output = self
            .run(
                Self::build_download_args(job),
                self.fetch_timeout,
                Some(progress.clone()),
            )
            .await?;
        progress(ProgressUpdate::finished());
        parse_info_document(&output.stdout)
    }
}
