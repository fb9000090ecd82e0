//! Resource resolution: URL in, display-ready descriptor out. No media bytes
//! are transferred.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::core::engine::MediaEngine;
use crate::core::format_selector;
use crate::core::models::{
    AppError, AppResult, ResolvedMedia, ResourceDescriptor, UNKNOWN_TITLE, UNKNOWN_UPLOADER,
};
use crate::utils::formatting::{format_duration, format_upload_date};
use crate::utils::validation::is_valid_youtube_url;

#[derive(Clone)]
pub struct ResourceResolver {
    engine: Arc<dyn MediaEngine>,
}

impl ResourceResolver {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        Self { engine }
    }

    pub async fn resolve(&self, url: &str) -> AppResult<ResourceDescriptor> {
        let url = url.trim();
        if url.is_empty() {
            return Err(AppError::MissingUrl);
        }
        if !is_valid_youtube_url(url) {
            debug!("Rejected URL {:?}", url);
            return Err(AppError::InvalidUrl(url.to_string()));
        }

        let scratch = tempfile::Builder::new().prefix("vdw-probe-").tempdir()?;
        let probed = self.engine.probe(url, scratch.path()).await;
        if let Err(e) = scratch.close() {
            warn!("Failed to remove metadata scratch directory: {}", e);
        }

        let raw = probed.map_err(|e| {
            error!("{} metadata lookup failed for {}: {}", self.engine.name(), url, e);
            AppError::MetadataUnavailable(e.to_string())
        })?;

        let media = ResolvedMedia::from_raw(raw)?;
        let descriptor = describe(&media);
        info!(
            "Resolved {} ({} item(s), collection: {})",
            descriptor.title, descriptor.item_count, descriptor.is_collection
        );
        Ok(descriptor)
    }
}

/// Build the descriptor from the representative item of `media`
pub fn describe(media: &ResolvedMedia) -> ResourceDescriptor {
    let item = media.representative();

    ResourceDescriptor {
        title: item.title.clone().unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
        uploader_name: item
            .uploader
            .clone()
            .unwrap_or_else(|| UNKNOWN_UPLOADER.to_string()),
        upload_date: item.upload_date.as_deref().map(format_upload_date),
        duration_display: format_duration(item.duration),
        thumbnail_url: item.thumbnail.clone(),
        is_collection: media.is_collection(),
        collection_title: media.collection_title().map(str::to_string),
        item_count: media.item_count(),
        video_option: format_selector::video_option(),
        audio_option: format_selector::audio_option(),
    }
}
