//! Progress reporting for engine runs
//!
//! The engine prints one machine-readable line per progress tick (see
//! [`PROGRESS_TEMPLATE`]). Lines are parsed into [`ProgressUpdate`]s and handed
//! to a [`ProgressCallback`]. The default sink only logs.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Prefix that marks progress lines on the engine's stdout
pub const PROGRESS_MARKER: &str = "[vdw-progress]";

/// Template passed to `--progress-template`. The filename goes last because it
/// may itself contain the field separator.
pub const PROGRESS_TEMPLATE: &str = "download:[vdw-progress]%(progress.status)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress.elapsed)s|%(progress.eta)s|%(progress.speed)s|%(progress._percent_str)s|%(progress.filename)s";

const FIELD_COUNT: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Downloading,
    Finished,
    Error,
    Unknown,
}

impl ProgressStatus {
    fn parse(value: &str) -> Self {
        match value {
            "downloading" => ProgressStatus::Downloading,
            "finished" => ProgressStatus::Finished,
            "error" => ProgressStatus::Error,
            _ => ProgressStatus::Unknown,
        }
    }
}

/// One progress tick as reported by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub status: ProgressStatus,
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub total_bytes_estimate: Option<u64>,
    /// Seconds since the item started
    pub elapsed: Option<f64>,
    /// Seconds remaining
    pub eta: Option<f64>,
    /// Bytes per second
    pub speed: Option<f64>,
    pub percent: Option<f64>,
    pub filename: Option<String>,
}

impl ProgressUpdate {
    /// Terminal update emitted once the engine run has completed
    pub fn finished() -> Self {
        Self {
            status: ProgressStatus::Finished,
            downloaded_bytes: None,
            total_bytes: None,
            total_bytes_estimate: None,
            elapsed: None,
            eta: None,
            speed: None,
            percent: Some(100.0),
            filename: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, ProgressStatus::Finished | ProgressStatus::Error)
    }
}

pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Sink that writes every tick to the debug log and never blocks
pub fn logging_progress_callback() -> ProgressCallback {
    Arc::new(|update: ProgressUpdate| {
        if update.is_terminal() {
            debug!(status = ?update.status, file = ?update.filename, "engine progress finished");
        } else {
            debug!(
                downloaded = ?update.downloaded_bytes,
                total = ?update.total_bytes.or(update.total_bytes_estimate),
                percent = ?update.percent,
                speed = ?update.speed,
                eta = ?update.eta,
                "engine progress"
            );
        }
    })
}

fn optional(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.is_empty() || value == "NA" || value == "None" {
        None
    } else {
        Some(value)
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    optional(value).and_then(|v| v.parse::<f64>().ok()).map(|v| v as u64)
}

fn parse_f64(value: &str) -> Option<f64> {
    optional(value).and_then(|v| v.parse::<f64>().ok())
}

fn parse_percent(value: &str) -> Option<f64> {
    optional(value).and_then(|v| v.trim_end_matches('%').trim().parse::<f64>().ok())
}

/// Parse one engine output line; `None` for anything that is not a progress line
pub fn parse_progress_line(line: &str) -> Option<ProgressUpdate> {
    let start = line.find(PROGRESS_MARKER)?;
    let payload = &line[start + PROGRESS_MARKER.len()..];
    let fields: Vec<&str> = payload.splitn(FIELD_COUNT, '|').collect();
    if fields.len() != FIELD_COUNT {
        return None;
    }

    Some(ProgressUpdate {
        status: ProgressStatus::parse(fields[0].trim()),
        downloaded_bytes: parse_u64(fields[1]),
        total_bytes: parse_u64(fields[2]),
        total_bytes_estimate: parse_u64(fields[3]),
        elapsed: parse_f64(fields[4]),
        eta: parse_f64(fields[5]),
        speed: parse_f64(fields[6]),
        percent: parse_percent(fields[7]),
        filename: optional(fields[8]).map(str::to_string),
    })
}
