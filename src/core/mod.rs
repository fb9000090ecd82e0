//! Core business logic module
//!
//! This module contains the domain models, the engine seam, and the
//! resolve / fetch / hand-off pipeline behind the HTTP surface.

pub mod archive_export;
pub mod config;
pub mod delivery;
pub mod download_log;
pub mod engine;
pub mod error_handling;
pub mod fetcher;
pub mod format_selector;
pub mod models;
pub mod progress_tracker;
pub mod resolver;
pub mod runtime;
pub mod session;
pub mod storage;
pub mod youtube_downloader;

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
mod integration_tests;

// Re-export commonly used types
pub use self::config::ServerConfig;
pub use self::models::{AppError, AppResult};
