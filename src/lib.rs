//! Video Downloader Web - Core Library
//!
//! Resolves YouTube URLs, fetches the chosen format with `yt-dlp` and hands
//! the result to the requesting client exactly once.

pub mod commands;
pub mod core;
pub mod utils;

// Re-export commonly used types
pub use self::core::{
    archive_export::ArchiveExporter,
    config::ServerConfig,
    delivery::DeliveryService,
    download_log::DownloadLog,
    engine::MediaEngine,
    fetcher::FetchExecutor,
    models::{AppError, AppResult, MediaKind, ResourceDescriptor},
    resolver::ResourceResolver,
    runtime::{spawn_housekeeping, HousekeepingHandle},
    session::{InMemorySessionStore, SessionId, SessionStore},
    storage::DownloadsRoot,
    youtube_downloader::YtDlpEngine,
};

use std::sync::Arc;

/// Application state shared between request handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub resolver: ResourceResolver,
    pub fetcher: FetchExecutor,
    pub sessions: Arc<dyn SessionStore>,
    pub delivery: DeliveryService,
    pub exporter: ArchiveExporter,
    pub download_log: Arc<DownloadLog>,
}

impl AppState {
    /// Production wiring: `yt-dlp` engine and in-memory sessions
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let engine: Arc<dyn MediaEngine> = Arc::new(YtDlpEngine::new(&config.engine));
        let sessions: Arc<dyn SessionStore> =
            Arc::new(InMemorySessionStore::new(config.session.ttl()));
        Self::with_engine(config, engine, sessions)
    }

    pub fn with_engine(
        config: ServerConfig,
        engine: Arc<dyn MediaEngine>,
        sessions: Arc<dyn SessionStore>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let root = DownloadsRoot::open(&config.storage.downloads_root)?;

        Ok(Self {
            resolver: ResourceResolver::new(engine.clone()),
            fetcher: FetchExecutor::new(engine, root.clone()),
            delivery: DeliveryService::new(sessions.clone(), root.clone()),
            exporter: ArchiveExporter::new(config.export.source_root.clone(), root),
            download_log: Arc::new(DownloadLog::new(config.storage.download_log_path.clone())),
            sessions,
            config: Arc::new(config),
        })
    }

    pub fn downloads_root(&self) -> &DownloadsRoot {
        self.fetcher.root()
    }

    /// Start the periodic session/working-directory sweep
    pub fn spawn_housekeeping(&self) -> HousekeepingHandle {
        spawn_housekeeping(
            self.sessions.clone(),
            self.downloads_root().clone(),
            self.config.session.housekeeping_interval(),
            self.config.session.stale_working_dir_age(),
        )
    }
}

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");
