//! Display formatting for durations, dates and sizes

pub const UNKNOWN_DURATION: &str = "Unknown";

fn clock(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

fn whole_seconds(seconds: Option<f64>) -> Option<u64> {
    seconds
        .filter(|s| s.is_finite() && *s >= 1.0)
        .map(|s| s.floor() as u64)
}

/// `H:MM:SS` from one hour upwards, `M:SS` below, `"Unknown"` when absent or zero
pub fn format_duration(seconds: Option<f64>) -> String {
    whole_seconds(seconds)
        .map(clock)
        .unwrap_or_else(|| UNKNOWN_DURATION.to_string())
}

/// Same as [`format_duration`] but renders absent or zero as `"00:00"`
pub fn format_duration_clock(seconds: Option<f64>) -> String {
    whole_seconds(seconds)
        .map(clock)
        .unwrap_or_else(|| "00:00".to_string())
}

/// `YYYYMMDD` becomes `DD.MM.YYYY`; anything else is passed through
pub fn format_upload_date(date: &str) -> String {
    if date.len() == 8 && date.bytes().all(|b| b.is_ascii_digit()) {
        format!("{}.{}.{}", &date[6..8], &date[4..6], &date[0..4])
    } else {
        date.to_string()
    }
}

/// Human readable byte count (`B`, `KB`, `MB`, `GB`, `TB`)
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;

    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}
