//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod exec;
pub mod init;
pub mod list;
pub mod show;

use chrono::{DateTime, Utc};

/// `2024-01-18 09:30:00 UTC`, or `-` when unknown
pub(crate) fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Seconds rendered as milliseconds, or `-` when unknown
pub(crate) fn format_duration(seconds: Option<f64>) -> String {
    seconds
        .map(|s| format!("{:.1}ms", s * 1000.0))
        .unwrap_or_else(|| "-".to_string())
}

/// Bytes rendered in KiB/MiB, or `-` when unknown
pub(crate) fn format_bytes(bytes: Option<u64>) -> String {
    match bytes {
        None => "-".to_string(),
        Some(b) if b >= 1024 * 1024 => format!("{:.1} MiB", b as f64 / (1024.0 * 1024.0)),
        Some(b) if b >= 1024 => format!("{:.1} KiB", b as f64 / 1024.0),
        Some(b) => format!("{} B", b),
    }
}
