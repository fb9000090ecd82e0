//! Fetch and hand-off handlers

use axum::body::Body;
use axum::extract::rejection::FormRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::{error, info, warn};

use crate::commands::client::{client_ip, user_agent};
use crate::commands::{ApiError, ClientSession};
use crate::core::delivery::Delivery;
use crate::core::download_log::DownloadRecord;
use crate::core::error_handling::MSG_EXPIRED_ARTIFACT;
use crate::core::models::{AppError, AppResult, FetchRequest, MediaKind};
use crate::core::session::Artifact;
use crate::utils::file_utils::build_content_disposition;
use crate::utils::validation::parse_form_bool;
use crate::AppState;

pub const SERVE_DOWNLOAD_PATH: &str = "/serve_download";

#[derive(Debug, Default, Deserialize)]
pub struct DownloadForm {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub is_playlist: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadResponse {
    pub success: bool,
    pub download_link: String,
    pub filename: String,
}

/// Who asked for a fetch, for the download log
#[derive(Debug, Clone)]
pub struct RequestOrigin {
    pub client_ip: String,
    pub user_agent: String,
}

/// `POST /download`
pub async fn download(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    session: ClientSession,
    form: Result<Form<DownloadForm>, FormRejection>,
) -> Response {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => {
            warn!("Rejected download form: {}", rejection);
            return ApiError::from(rejection).into_response();
        }
    };
    let origin = RequestOrigin {
        client_ip: client_ip(&headers, peer, state.config.server.trust_proxy_headers),
        user_agent: user_agent(&headers),
    };

    match download_impl(&state, session, form, origin).await {
        Ok(body) => session.attach(&state.config.session, Json(body).into_response()),
        Err(e) => {
            error!("❌ Download request failed: {}", e);
            ApiError::from(e).into_response()
        }
    }
}

async fn download_impl(
    state: &AppState,
    session: ClientSession,
    form: DownloadForm,
    origin: RequestOrigin,
) -> AppResult<DownloadResponse> {
    let url = state
        .sessions
        .resolved_url(session.id)
        .ok_or(AppError::MissingSessionUrl)?;
    let format_selector = form
        .format
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .ok_or(AppError::MissingFormat)?;
    let kind = MediaKind::from_form_value(form.kind.as_deref());
    let allow_collection = parse_form_bool(form.is_playlist.as_deref());

    info!(
        "⬇️ Download requested: {} as {} (playlist: {})",
        url, kind, allow_collection
    );

    let result = state
        .fetcher
        .fetch(FetchRequest {
            url,
            format_selector,
            kind,
            allow_collection,
        })
        .await?;

    let replaced = state.sessions.set_artifact(
        session.id,
        Artifact {
            path: result.artifact_path.clone(),
            display_name: result.display_name.clone(),
        },
    );
    if let Some(previous) = replaced {
        info!("Replacing undelivered {} for session {}", previous.display_name, session.id);
        state.fetcher.root().reclaim_artifact(&previous.path).await;
    }

    let record = DownloadRecord {
        title: result.title.clone(),
        client_ip: origin.client_ip,
        user_agent: origin.user_agent,
    };
    if let Err(e) = state.download_log.append(&record).await {
        warn!(
            "Failed to write download log {}: {}",
            state.download_log.path().display(),
            e
        );
    }

    Ok(DownloadResponse {
        success: true,
        download_link: SERVE_DOWNLOAD_PATH.to_string(),
        filename: result.display_name,
    })
}

/// `GET /serve_download`. A missing artifact is a plain-text 404.
pub async fn serve_download(State(state): State<AppState>, session: ClientSession) -> Response {
    match state.delivery.deliver(session.id).await {
        Ok(delivery) => file_response(delivery),
        Err(AppError::ExpiredOrMissingArtifact) => {
            info!("Download link for session {} expired or unknown", session.id);
            (StatusCode::NOT_FOUND, MSG_EXPIRED_ARTIFACT).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Stream a [`Delivery`] as an attachment
pub fn file_response(delivery: Delivery) -> Response {
    let disposition = build_content_disposition(&delivery.display_name);
    let mut response = Response::new(Body::from_stream(delivery.body));
    let headers = response.headers_mut();

    headers.insert(CONTENT_TYPE, HeaderValue::from_static(delivery.content_type));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(delivery.content_length));
    let disposition = HeaderValue::from_str(&disposition)
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    headers.insert(CONTENT_DISPOSITION, disposition);

    response
}
