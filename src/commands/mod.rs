//! HTTP command handlers
//!
//! This module contains the request handlers behind the web front end.
//! Handlers are organized into modules based on their functionality; every
//! failure leaves as a JSON `{"error": ...}` envelope unless noted otherwise.

pub mod client;
pub mod download;
pub mod system;
pub mod youtube;

use axum::extract::rejection::FormRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::core::error_handling::ErrorCategory;
use crate::core::models::AppError;
use crate::AppState;

pub use client::ClientSession;

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(system::index))
        .route("/health", get(system::health))
        .route("/get_video_info", post(youtube::get_video_info))
        .route("/download", post(download::download))
        .route("/serve_download", get(download::serve_download))
        .route("/cloudflare_export", get(system::cloudflare_export))
        .fallback(system::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// [`AppError`] rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(error: AppError) -> Self {
        Self(error)
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        Self(AppError::InvalidForm(rejection.body_text()))
    }
}

pub fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::ClientInput => StatusCode::BAD_REQUEST,
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.category());
        if status.is_server_error() {
            error!("❌ {} -> {}", self.0, status);
        } else {
            debug!("{} -> {}", self.0, status);
        }

        (
            status,
            Json(ErrorBody {
                error: self.0.user_message(),
            }),
        )
            .into_response()
    }
}
