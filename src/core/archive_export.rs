//! Deployable source archive
//!
//! Packs the server's own source tree plus generated deployment notes into a
//! zip inside an `export_<uuid>` scratch directory under the downloads root.
//! The scratch directory is reclaimed when the response body is dropped.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::core::delivery::Delivery;
use crate::core::models::{AppError, AppResult};
use crate::core::storage::DownloadsRoot;

pub const EXPORT_FILE_NAME: &str = "video_downloader_web_export.zip";
pub const EXPORT_DIR_PREFIX: &str = "export_";

const TOP_LEVEL_FILES: &[&str] = &["Cargo.toml", "Cargo.lock"];
const SOURCE_DIRS: &[&str] = &["src", "assets", "config"];

const ENV_EXAMPLE: &str = "\
# Umgebungsvariablen für die Bereitstellung
VDW__SERVER__BIND_ADDR=0.0.0.0:5000
VDW__SERVER__TRUST_PROXY_HEADERS=true
VDW__STORAGE__DOWNLOADS_ROOT=downloads
VDW__ENGINE__YTDLP_PATH=yt-dlp
RUST_LOG=video_downloader_web=info,tower_http=info
";

const README: &str = "\
# Video Downloader Web

## Anleitung zur Bereitstellung

1. Entpacken Sie dieses ZIP-Archiv in ein Verzeichnis
2. Erstellen Sie eine Datei `.env` basierend auf `.env.example`
3. Bauen und starten Sie den Server:
   ```
   cargo build --release
   ./target/release/video-downloader-web
   ```

## Anforderungen

- Rust (stable)
- yt-dlp
- ffmpeg (für Audio-Konvertierung)

## Hinweise

Diese Anwendung ist als Demonstration gedacht. Bitte beachten Sie die
Urheberrechte und Nutzungsbedingungen von YouTube.
";

const WRANGLER_TOML: &str = "\
name = \"video-downloader-web\"
compatibility_date = \"2025-03-20\"

[vars]
# Setzen Sie Umgebungsvariablen in der Datei .env oder in der Cloudflare-Konsole

[env.production]
workers_dev = true
";

#[derive(Debug, Clone)]
pub struct ArchiveExporter {
    source_root: PathBuf,
    root: DownloadsRoot,
}

impl ArchiveExporter {
    pub fn new(source_root: impl Into<PathBuf>, root: DownloadsRoot) -> Self {
        Self {
            source_root: source_root.into(),
            root,
        }
    }

    pub async fn export(&self) -> AppResult<Delivery> {
        let scratch = self.root.create_named_dir(EXPORT_DIR_PREFIX).await?;
        let guard = self.root.reclaim_guard(scratch.clone());
        let archive_path = scratch.join(EXPORT_FILE_NAME);

        let source_root = self.source_root.clone();
        let target = archive_path.clone();
        let written = tokio::task::spawn_blocking(move || write_archive(&source_root, &target))
            .await
            .map_err(|e| AppError::ExportFailed(e.to_string()))?;

        let entries = match written {
            Ok(entries) => entries,
            Err(e) => {
                error!("❌ Export failed: {}", e);
                return Err(AppError::ExportFailed(e.to_string()));
            }
        };
        info!("📦 Export archive with {} entries ready", entries);

        Delivery::open(&archive_path, EXPORT_FILE_NAME.to_string(), guard).await
    }
}

/// Zip entry name: forward slashes, relative to the source root
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Write the archive and return how many entries it holds
pub fn write_archive(source_root: &Path, target: &Path) -> zip::result::ZipResult<usize> {
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(File::create(target)?);
    let mut entries = 0;

    let mut sources: Vec<PathBuf> = TOP_LEVEL_FILES
        .iter()
        .map(|name| source_root.join(name))
        .filter(|path| path.is_file())
        .collect();

    for dir in SOURCE_DIRS {
        let dir = source_root.join(dir);
        if !dir.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&dir).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_file() {
                sources.push(entry.into_path());
            }
        }
    }

    for path in sources {
        let Ok(relative) = path.strip_prefix(source_root) else {
            continue;
        };
        writer.start_file(entry_name(relative), options)?;
        let mut file = File::open(&path)?;
        io::copy(&mut file, &mut writer)?;
        entries += 1;
    }

    for (name, content) in [
        (".env.example", ENV_EXAMPLE),
        ("README.md", README),
        ("wrangler.toml", WRANGLER_TOML),
    ] {
        writer.start_file(name, options)?;
        writer.write_all(content.as_bytes())?;
        entries += 1;
    }

    writer.finish()?;
    Ok(entries)
}
