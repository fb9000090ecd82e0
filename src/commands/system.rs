//! System handlers
//!
//! Landing page, health probe, source export and the JSON 404 fallback.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::info;

use crate::commands::download::file_response;
use crate::commands::{ApiError, ErrorBody};
use crate::core::error_handling::MSG_NOT_FOUND;
use crate::AppState;

const INDEX_HTML: &str = include_str!("../../assets/index.html");

/// `GET /`
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "name": crate::NAME,
        "version": crate::VERSION,
    }))
}

/// `GET /cloudflare_export`
pub async fn cloudflare_export(State(state): State<AppState>) -> Response {
    info!("📦 Building source export");
    match state.exporter.export().await {
        Ok(delivery) => file_response(delivery),
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: MSG_NOT_FOUND.to_string(),
        }),
    )
        .into_response()
}
