//! Video information handler
//!
//! Resolves the submitted URL, remembers it in the caller's session and
//! returns the descriptor in the shape the web client expects.

use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::commands::{ApiError, ClientSession};
use crate::core::models::{AppResult, FormatOption, MediaKind, ResourceDescriptor};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct VideoInfoForm {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatOptionBody {
    pub id: String,
    pub note: String,
    pub ext: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
}

impl From<FormatOption> for FormatOptionBody {
    fn from(option: FormatOption) -> Self {
        Self {
            id: option.id,
            note: option.label,
            ext: option.container,
            kind: option.kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfoResponse {
    pub title: String,
    pub uploader: String,
    pub upload_date: String,
    pub duration: String,
    pub thumbnail: String,
    pub is_playlist: bool,
    pub playlist_title: Option<String>,
    pub video_count: usize,
    pub formats: Vec<FormatOptionBody>,
    pub audio_formats: Vec<FormatOptionBody>,
}

impl From<ResourceDescriptor> for VideoInfoResponse {
    fn from(d: ResourceDescriptor) -> Self {
        Self {
            title: d.title,
            uploader: d.uploader_name,
            upload_date: d.upload_date.unwrap_or_default(),
            duration: d.duration_display,
            thumbnail: d.thumbnail_url.unwrap_or_default(),
            is_playlist: d.is_collection,
            playlist_title: d.collection_title,
            video_count: d.item_count,
            formats: vec![d.video_option.into()],
            audio_formats: vec![d.audio_option.into()],
        }
    }
}

/// `POST /get_video_info`
pub async fn get_video_info(
    State(state): State<AppState>,
    session: ClientSession,
    form: Result<Form<VideoInfoForm>, FormRejection>,
) -> Response {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => {
            warn!("Rejected video info form: {}", rejection);
            return ApiError::from(rejection).into_response();
        }
    };
    let url = form.url.unwrap_or_default();
    info!("📺 Getting video info for: {}", url);

    match get_video_info_impl(&state, session, &url).await {
        Ok(body) => {
            info!("✅ Retrieved video info: {}", body.title);
            session.attach(&state.config.session, Json(body).into_response())
        }
        Err(e) => {
            error!("❌ Failed to get video info: {}", e);
            ApiError::from(e).into_response()
        }
    }
}

async fn get_video_info_impl(
    state: &AppState,
    session: ClientSession,
    url: &str,
) -> AppResult<VideoInfoResponse> {
    let descriptor = state.resolver.resolve(url).await?;
    state
        .sessions
        .set_resolved_url(session.id, url.trim().to_string());
    Ok(descriptor.into())
}
