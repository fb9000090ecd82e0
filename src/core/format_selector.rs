//! The two fixed download choices and the engine arguments they imply

use crate::core::models::{FormatOption, MediaKind};

pub const VIDEO_SELECTOR: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";
pub const AUDIO_SELECTOR: &str = "bestaudio/best";

/// Audio post-processing applied to every audio fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioExtraction {
    pub codec: &'static str,
    pub quality_kbps: u32,
}

pub const MP3_192: AudioExtraction = AudioExtraction {
    codec: "mp3",
    quality_kbps: 192,
};

pub fn video_option() -> FormatOption {
    FormatOption {
        id: VIDEO_SELECTOR.to_string(),
        container: "mp4".to_string(),
        kind: MediaKind::Video,
        label: "Höchste Qualität".to_string(),
    }
}

pub fn audio_option() -> FormatOption {
    FormatOption {
        id: AUDIO_SELECTOR.to_string(),
        container: "mp3".to_string(),
        kind: MediaKind::Audio,
        label: "Beste Audioqualität".to_string(),
    }
}

/// Post-processing for a kind; only audio is transcoded
pub fn post_processing_for(kind: MediaKind) -> Option<AudioExtraction> {
    match kind {
        MediaKind::Video => None,
        MediaKind::Audio => Some(MP3_192),
    }
}

/// Extensions an artifact of this kind may carry
pub fn artifact_extensions(kind: MediaKind) -> &'static [&'static str] {
    match kind {
        MediaKind::Video => crate::utils::file_utils::MEDIA_EXTENSIONS,
        MediaKind::Audio => &["mp3"],
    }
}
