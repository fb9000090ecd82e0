//! Error classification for the HTTP surface
//!
//! Every [`AppError`] belongs to one [`ErrorCategory`], which decides the
//! status code, and carries a German message that is safe to show to users.
//! Engine detail is kept for `FetchFailed` and for the logs.

use serde::{Deserialize, Serialize};

use crate::core::models::AppError;

pub const MSG_INVALID_FORM: &str = "Ungültige Anfrage";
pub const MSG_MISSING_URL: &str = "URL wird benötigt";
pub const MSG_INVALID_URL: &str = "Ungültige YouTube-URL";
pub const MSG_EMPTY_COLLECTION: &str = "Die Playlist enthält keine verfügbaren Videos";
pub const MSG_METADATA_UNAVAILABLE: &str = "Video-Informationen konnten nicht abgerufen werden";
pub const MSG_MISSING_SESSION_URL: &str = "Keine Video-URL in der Sitzung gefunden";
pub const MSG_MISSING_FORMAT: &str = "Kein Format ausgewählt";
pub const MSG_NO_ARTIFACT: &str = "Download fehlgeschlagen oder keine Dateien gefunden";
pub const MSG_EXPIRED_ARTIFACT: &str = "Datei nicht gefunden oder Download-Link abgelaufen";
pub const MSG_NOT_FOUND: &str = "Ressource nicht gefunden";
pub const MSG_INTERNAL: &str = "Interner Serverfehler";

/// Coarse error classes, one per response status family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// The request itself is unusable
    ClientInput,
    /// The requested thing does not exist (any more)
    NotFound,
    /// Engine, storage or configuration trouble on our side
    Internal,
}

impl AppError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::InvalidForm(_)
            | AppError::MissingUrl
            | AppError::InvalidUrl(_)
            | AppError::EmptyCollection
            | AppError::MetadataUnavailable(_)
            | AppError::MissingSessionUrl
            | AppError::MissingFormat => ErrorCategory::ClientInput,
            AppError::ExpiredOrMissingArtifact => ErrorCategory::NotFound,
            AppError::FetchFailed(_)
            | AppError::NoArtifactProduced(_)
            | AppError::ExportFailed(_)
            | AppError::Config(_)
            | AppError::Io(_) => ErrorCategory::Internal,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            AppError::InvalidForm(_) => MSG_INVALID_FORM.to_string(),
            AppError::MissingUrl => MSG_MISSING_URL.to_string(),
            AppError::InvalidUrl(_) => MSG_INVALID_URL.to_string(),
            AppError::EmptyCollection => MSG_EMPTY_COLLECTION.to_string(),
            AppError::MetadataUnavailable(_) => MSG_METADATA_UNAVAILABLE.to_string(),
            AppError::MissingSessionUrl => MSG_MISSING_SESSION_URL.to_string(),
            AppError::MissingFormat => MSG_MISSING_FORMAT.to_string(),
            AppError::FetchFailed(detail) => format!("Download fehlgeschlagen: {detail}"),
            AppError::NoArtifactProduced(_) => MSG_NO_ARTIFACT.to_string(),
            AppError::ExpiredOrMissingArtifact => MSG_EXPIRED_ARTIFACT.to_string(),
            AppError::ExportFailed(detail) => format!("Export fehlgeschlagen: {detail}"),
            AppError::Config(_) | AppError::Io(_) => MSG_INTERNAL.to_string(),
        }
    }
}
