//! Append-only record of completed fetches

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::core::models::AppResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    pub title: String,
    pub client_ip: String,
    pub user_agent: String,
}

impl DownloadRecord {
    pub fn format_line(&self, at: DateTime<Local>) -> String {
        format!(
            "[{}] Video: {} | IP: {} | Agent: {}\n",
            at.format("%Y-%m-%d %H:%M:%S"),
            single_line(&self.title),
            single_line(&self.client_ip),
            single_line(&self.user_agent)
        )
    }
}

/// Keep one record per line whatever the client sent
fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

#[derive(Debug)]
pub struct DownloadLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl DownloadLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, record: &DownloadRecord) -> AppResult<()> {
        let line = record.format_line(Local::now());
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
