//! One-shot artifact delivery
//!
//! Delivering takes the artifact out of the session before a single byte is
//! sent, so a second request for the same artifact gets nothing. The body
//! stream owns a reclaim guard for the working directory.

use std::path::Path;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::core::models::{AppError, AppResult};
use crate::core::session::{SessionId, SessionStore};
use crate::core::storage::{working_dir_of, DownloadsRoot, ReclaimGuard, ReclaimingStream};
use crate::utils::file_utils::content_type_for_filename;

pub type DeliveryBody = ReclaimingStream<ReaderStream<tokio::fs::File>>;

/// An open file ready to be streamed to the client
pub struct Delivery {
    pub display_name: String,
    pub content_type: &'static str,
    pub content_length: u64,
    pub body: DeliveryBody,
}

impl Delivery {
    /// Open `path` for streaming. If it cannot be opened the guard is dropped
    /// here and the directory is reclaimed immediately.
    pub async fn open(path: &Path, display_name: String, guard: ReclaimGuard) -> AppResult<Self> {
        let file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(e) => {
                debug!("Artifact {} unavailable: {}", path.display(), e);
                return Err(AppError::ExpiredOrMissingArtifact);
            }
        };

        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(AppError::ExpiredOrMissingArtifact);
        }

        Ok(Self {
            content_type: content_type_for_filename(&display_name),
            content_length: metadata.len(),
            display_name,
            body: ReclaimingStream::new(ReaderStream::new(file), guard),
        })
    }
}

#[derive(Clone)]
pub struct DeliveryService {
    sessions: Arc<dyn SessionStore>,
    root: DownloadsRoot,
}

impl DeliveryService {
    pub fn new(sessions: Arc<dyn SessionStore>, root: DownloadsRoot) -> Self {
        Self { sessions, root }
    }

    pub async fn deliver(&self, session: SessionId) -> AppResult<Delivery> {
        let artifact = self
            .sessions
            .take_artifact(session)
            .ok_or(AppError::ExpiredOrMissingArtifact)?;

        let working_dir = working_dir_of(&artifact.path);
        if !self.root.contains(&working_dir).await {
            warn!(
                "🛑 Session {} points at {} outside the downloads root",
                session,
                artifact.path.display()
            );
            return Err(AppError::ExpiredOrMissingArtifact);
        }

        let guard = self.root.reclaim_guard(working_dir);
        let delivery = Delivery::open(&artifact.path, artifact.display_name, guard).await?;
        info!(
            "📤 Delivering {} ({} bytes) to session {}",
            delivery.display_name, delivery.content_length, session
        );
        Ok(delivery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::{Artifact, InMemorySessionStore};
    use crate::core::storage::wait_until_removed;
    use futures::StreamExt;
    use std::time::Duration;

    async fn setup() -> (tempfile::TempDir, DownloadsRoot, Arc<InMemorySessionStore>, DeliveryService) {
        let tmp = tempfile::tempdir().unwrap();
        let root = DownloadsRoot::open(tmp.path().join("downloads")).unwrap();
        let sessions = Arc::new(InMemorySessionStore::new(Duration::from_secs(60)));
        let service = DeliveryService::new(sessions.clone(), root.clone());
        (tmp, root, sessions, service)
    }

    async fn drain(mut delivery: Delivery) -> Vec<u8> {
        let mut bytes = Vec::new();
        while let Some(chunk) = delivery.body.next().await {
            bytes.extend_from_slice(&chunk.unwrap());
        }
        bytes
    }

    #[tokio::test]
    async fn test_delivery_streams_then_reclaims() {
        let (_tmp, root, sessions, service) = setup().await;
        let dir = root.create_working_dir().await.unwrap();
        let path = dir.join("Song.mp3");
        std::fs::write(&path, b"mp3 bytes").unwrap();

        let id = SessionId::new();
        sessions.set_artifact(
            id,
            Artifact {
                path: path.clone(),
                display_name: "Song.mp3".into(),
            },
        );

        let delivery = service.deliver(id).await.unwrap();
        assert_eq!(delivery.content_type, "audio/mpeg");
        assert_eq!(delivery.content_length, 9);
        assert_eq!(drain(delivery).await, b"mp3 bytes");
        assert!(wait_until_removed(&dir).await);
    }

    #[tokio::test]
    async fn test_second_delivery_is_not_found() {
        let (_tmp, root, sessions, service) = setup().await;
        let dir = root.create_working_dir().await.unwrap();
        let path = dir.join("Clip.mp4");
        std::fs::write(&path, b"mp4").unwrap();
        let id = SessionId::new();
        sessions.set_artifact(
            id,
            Artifact {
                path,
                display_name: "Clip.mp4".into(),
            },
        );

        let first = service.deliver(id).await.unwrap();
        let second = service.deliver(id).await;
        assert!(matches!(second, Err(AppError::ExpiredOrMissingArtifact)));
        drop(first);
        assert!(wait_until_removed(&dir).await);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found_and_reclaimed() {
        let (_tmp, root, sessions, service) = setup().await;
        let dir = root.create_working_dir().await.unwrap();
        let id = SessionId::new();
        sessions.set_artifact(
            id,
            Artifact {
                path: dir.join("gone.mp4"),
                display_name: "gone.mp4".into(),
            },
        );

        assert!(matches!(
            service.deliver(id).await,
            Err(AppError::ExpiredOrMissingArtifact)
        ));
        assert!(wait_until_removed(&dir).await);
    }

    #[tokio::test]
    async fn test_no_artifact_is_not_found() {
        let (_tmp, _root, _sessions, service) = setup().await;
        assert!(matches!(
            service.deliver(SessionId::new()).await,
            Err(AppError::ExpiredOrMissingArtifact)
        ));
    }

    #[tokio::test]
    async fn test_corrupted_path_outside_root_is_untouched() {
        let (tmp, _root, sessions, service) = setup().await;
        let outside = tmp.path().join("elsewhere");
        std::fs::create_dir(&outside).unwrap();
        let secret = outside.join("secret.mp4");
        std::fs::write(&secret, b"secret").unwrap();

        let id = SessionId::new();
        sessions.set_artifact(
            id,
            Artifact {
                path: secret.clone(),
                display_name: "secret.mp4".into(),
            },
        );

        assert!(matches!(
            service.deliver(id).await,
            Err(AppError::ExpiredOrMissingArtifact)
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(secret.exists());
        assert!(outside.exists());
    }
}
