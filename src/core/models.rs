//! Core data models for the download web front end

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::core::engine::RawMediaInfo;

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_UPLOADER: &str = "Unknown Uploader";
pub const UNKNOWN_COLLECTION: &str = "Unknown Playlist";

/// Which flavour of media the client asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    /// Interpret the `type` form field. Only `"audio"` selects audio.
    pub fn from_form_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("audio") => MediaKind::Audio,
            _ => MediaKind::Video,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the two fixed download choices offered to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOption {
    /// Opaque selector handed to the engine
    pub id: String,
    pub container: String,
    pub kind: MediaKind,
    pub label: String,
}

/// Metadata of one playable item
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaItem {
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub upload_date: Option<String>,
    pub duration: Option<f64>,
    pub thumbnail: Option<String>,
}

impl From<RawMediaInfo> for MediaItem {
    fn from(raw: RawMediaInfo) -> Self {
        Self {
            title: raw.title,
            uploader: raw.uploader,
            upload_date: raw.upload_date,
            duration: raw.duration,
            thumbnail: raw.thumbnail,
        }
    }
}

/// A playlist as reported by the engine. Only built by [`ResolvedMedia::from_raw`].
#[derive(Debug, Clone, PartialEq)]
pub struct MediaCollection {
    title: Option<String>,
    first: MediaItem,
    entry_count: usize,
}

impl MediaCollection {
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// First available entry
    pub fn first(&self) -> &MediaItem {
        &self.first
    }

    /// Number of entries, unavailable ones included
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }
}

/// Engine output after the single/collection shape has been decided once.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedMedia {
    Single(MediaItem),
    Collection(MediaCollection),
}

impl ResolvedMedia {
    /// Classify raw engine output. A document carrying an `entries` list is a
    /// collection. Unavailable (null) entries count towards the size but never
    /// stand in for the collection.
    pub fn from_raw(raw: RawMediaInfo) -> AppResult<Self> {
        let RawMediaInfo {
            title,
            uploader,
            upload_date,
            duration,
            thumbnail,
            entries,
        } = raw;

        match entries {
            Some(entries) => {
                let entry_count = entries.len();
                let first = entries
                    .into_iter()
                    .flatten()
                    .next()
                    .map(MediaItem::from)
                    .ok_or(AppError::EmptyCollection)?;
                Ok(ResolvedMedia::Collection(MediaCollection {
                    title,
                    first,
                    entry_count,
                }))
            }
            None => Ok(ResolvedMedia::Single(MediaItem {
                title,
                uploader,
                upload_date,
                duration,
                thumbnail,
            })),
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, ResolvedMedia::Collection(_))
    }

    /// The item whose metadata stands in for the whole resource
    pub fn representative(&self) -> &MediaItem {
        match self {
            ResolvedMedia::Single(item) => item,
            ResolvedMedia::Collection(collection) => collection.first(),
        }
    }

    pub fn item_count(&self) -> usize {
        match self {
            ResolvedMedia::Single(_) => 1,
            ResolvedMedia::Collection(collection) => collection.entry_count(),
        }
    }

    pub fn collection_title(&self) -> Option<&str> {
        match self {
            ResolvedMedia::Single(_) => None,
            ResolvedMedia::Collection(collection) => {
                Some(collection.title().unwrap_or(UNKNOWN_COLLECTION))
            }
        }
    }
}

/// Display-ready summary of a resolved resource. Recomputed per request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    pub title: String,
    pub uploader_name: String,
    pub upload_date: Option<String>,
    pub duration_display: String,
    pub thumbnail_url: Option<String>,
    pub is_collection: bool,
    pub collection_title: Option<String>,
    pub item_count: usize,
    pub video_option: FormatOption,
    pub audio_option: FormatOption,
}

/// Parameters of a single engine download run
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub format_selector: String,
    pub kind: MediaKind,
    pub allow_collection: bool,
}

/// What a successful fetch left on disk
#[derive(Debug)]
pub struct FetchResult {
    pub artifact_path: PathBuf,
    /// File name of the artifact, shown to the client
    pub display_name: String,
    pub title: String,
    pub working_dir: PathBuf,
}

/// Errors surfaced by the application core
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Malformed form submission: {0}")]
    InvalidForm(String),

    #[error("URL is required")]
    MissingUrl,

    #[error("Invalid YouTube URL: {0}")]
    InvalidUrl(String),

    #[error("Playlist contains no available entries")]
    EmptyCollection,

    #[error("Metadata unavailable: {0}")]
    MetadataUnavailable(String),

    #[error("No resolved URL in session")]
    MissingSessionUrl,

    #[error("No format selected")]
    MissingFormat,

    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("Engine run left no media file in {0}")]
    NoArtifactProduced(PathBuf),

    #[error("Artifact expired or missing")]
    ExpiredOrMissingArtifact,

    #[error("Export failed: {0}")]
    ExportFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
