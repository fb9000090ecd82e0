//! Server configuration management

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "VDW_CONFIG";
/// Prefix of environment overrides, e.g. `VDW__SERVER__BIND_ADDR`
pub const ENV_PREFIX: &str = "VDW";
const DEFAULT_CONFIG_FILE: &str = "config/server";

/// Main server configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: HttpConfig,
    pub storage: StorageConfig,
    pub engine: EngineConfig,
    pub session: SessionConfig,
    pub export: ExportConfig,
}

/// Listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind_addr: String,
    /// Take the client address from `X-Forwarded-For` (behind a reverse proxy)
    pub trust_proxy_headers: bool,
}

/// Where fetched media and the download log live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub downloads_root: PathBuf,
    pub download_log_path: PathBuf,
}

/// External engine invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub ytdlp_path: String,
    pub fetch_timeout_secs: u64,
    pub metadata_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub ttl_secs: u64,
    pub cookie_name: String,
    pub housekeeping_interval_secs: u64,
    /// Working directories older than this are swept by housekeeping
    pub stale_working_dir_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Root of the deployable source tree packed by the archive export
    pub source_root: PathBuf,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            trust_proxy_headers: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            downloads_root: PathBuf::from("downloads"),
            download_log_path: PathBuf::from("logs/downloads.log"),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: "yt-dlp".to_string(),
            fetch_timeout_secs: 30 * 60,
            metadata_timeout_secs: 60,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 60 * 60,
            cookie_name: "vdw_session".to_string(),
            housekeeping_interval_secs: 5 * 60,
            stale_working_dir_secs: 2 * 60 * 60,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("."),
        }
    }
}

impl EngineConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn housekeeping_interval(&self) -> Duration {
        Duration::from_secs(self.housekeeping_interval_secs)
    }

    pub fn stale_working_dir_age(&self) -> Duration {
        Duration::from_secs(self.stale_working_dir_secs)
    }
}

impl ServerConfig {
    /// Load configuration from the optional config file and `VDW__*` overrides
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        Self::load_from(&file)
    }

    pub fn load_from(file: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {file}"))?;

        let config: ServerConfig = settings
            .try_deserialize()
            .context("Failed to parse server configuration")?;
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.bind_addr.trim().is_empty() {
            anyhow::bail!("Bind address must not be empty");
        }

        if self.storage.downloads_root.as_os_str().is_empty() {
            anyhow::bail!("Downloads root must not be empty");
        }

        if self.storage.download_log_path.as_os_str().is_empty() {
            anyhow::bail!("Download log path must not be empty");
        }

        if self.engine.ytdlp_path.trim().is_empty() {
            anyhow::bail!("yt-dlp path must not be empty");
        }

        if self.engine.fetch_timeout_secs == 0 || self.engine.metadata_timeout_secs == 0 {
            anyhow::bail!("Engine timeouts must be greater than 0");
        }

        if self.session.ttl_secs == 0 {
            anyhow::bail!("Session TTL must be greater than 0");
        }

        if self.session.housekeeping_interval_secs == 0 {
            anyhow::bail!("Housekeeping interval must be greater than 0");
        }

        if self.session.stale_working_dir_secs == 0 {
            anyhow::bail!("Stale working directory age must be greater than 0");
        }

        // the sweep must never see a fetch that is still running
        if self.session.stale_working_dir_secs <= self.engine.fetch_timeout_secs {
            anyhow::bail!(
                "Stale working directory age ({}s) must exceed the fetch timeout ({}s)",
                self.session.stale_working_dir_secs,
                self.engine.fetch_timeout_secs
            );
        }

        let cookie = self.session.cookie_name.trim();
        if cookie.is_empty()
            || !cookie
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            anyhow::bail!("Invalid cookie name: {cookie:?}");
        }

        Ok(())
    }
}
