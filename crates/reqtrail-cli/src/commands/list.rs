//! `reqtrail list` command implementation

use super::{format_duration, format_timestamp};
use crate::config::open_existing_store;
use crate::error::Result;
use colored::Colorize;
use reqtrail_core::store::MAX_LIST_LIMIT;
use reqtrail_core::types::AuditEntry;
use reqtrail_core::AuditEntryStore;
use std::path::Path;

/// Print the most recent entries, newest first
pub async fn run(database: &Path, limit: usize) -> Result<()> {
    let store = open_existing_store(database)?;
    let entries = store.list_entries(limit.min(MAX_LIST_LIMIT)).await?;

    if entries.is_empty() {
        println!("{} No audit entries found", "→".cyan());
        return Ok(());
    }

    for entry in &entries {
        println!("{}", summary_line(entry));
    }

    Ok(())
}

/// `#12  2024-01-18 09:30:00 UTC  GET  /product?id=5  12.5ms  user 0`
fn summary_line(entry: &AuditEntry) -> String {
    let id = entry
        .id
        .map(|id| format!("#{}", id))
        .unwrap_or_else(|| "#?".to_string());
    let user = entry
        .user_id
        .map(|u| format!("user {}", u))
        .unwrap_or_default();

    format!(
        "{}  {}  {:<6} {}  {}  {}",
        id.bright_black(),
        format_timestamp(entry.created).dimmed(),
        entry.request_method.as_deref().unwrap_or("-").bold(),
        entry.url.as_deref().unwrap_or("-"),
        format_duration(entry.duration),
        user.dimmed(),
    )
    .trim_end()
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_line() {
        colored::control::set_override(false);
        let entry = AuditEntry {
            id: Some(12),
            request_method: Some("GET".into()),
            url: Some("/product?id=5".into()),
            duration: Some(0.0125),
            user_id: Some(0),
            ..Default::default()
        };

        let line = summary_line(&entry);
        assert!(line.starts_with("#12  -  GET"));
        assert!(line.contains("/product?id=5  12.5ms  user 0"));
    }

    #[test]
    fn test_summary_line_without_user() {
        colored::control::set_override(false);
        let entry = AuditEntry {
            id: Some(3),
            request_method: Some("CLI".into()),
            url: Some("make".into()),
            ..Default::default()
        };

        assert!(summary_line(&entry).ends_with("make  -"));
    }
}
