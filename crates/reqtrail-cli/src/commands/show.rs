//! `reqtrail show` command implementation

use super::{format_bytes, format_duration, format_timestamp};
use crate::config::open_existing_store;
use crate::error::{CliError, Result};
use colored::Colorize;
use reqtrail_core::types::{
    AuditData, AuditEntry, AuditError, AuditJavascript, AuditTrail, User, ANONYMOUS_USER_ID,
};
use reqtrail_core::AuditEntryStore;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::path::Path;

/// An entry with every child collection loaded
#[derive(Debug, Serialize)]
pub struct EntryReport {
    pub entry: AuditEntry,
    pub user: Option<User>,
    pub data: Vec<AuditData>,
    pub errors: Vec<AuditError>,
    pub trail: Vec<AuditTrail>,
    pub javascript: Vec<AuditJavascript>,
}

impl EntryReport {
    pub async fn load(store: &dyn AuditEntryStore, id: i64) -> Result<Self> {
        let entry = store
            .find_entry(id)
            .await?
            .ok_or(CliError::EntryNotFound(id))?;

        let user = match entry.user_id {
            Some(user_id) if user_id != ANONYMOUS_USER_ID => store.find_user(user_id).await?,
            _ => None,
        };

        Ok(Self {
            user,
            data: store.find_data(id).await?,
            errors: store.find_errors(id).await?,
            trail: store.find_trail(id).await?,
            javascript: store.find_javascript(id).await?,
            entry,
        })
    }
}

/// Print one entry in full
pub async fn run(database: &Path, id: i64, json: bool) -> Result<()> {
    let store = open_existing_store(database)?;
    let report = EntryReport::load(&store, id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &EntryReport) {
    let entry = &report.entry;
    let field = |label: &str, value: String| println!("  {} {}", format!("{label}:").cyan(), value);
    let text = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());

    println!(
        "{} {} {}",
        format!("#{}", entry.id.unwrap_or_default()).bright_black(),
        entry.request_method.as_deref().unwrap_or("-").bold(),
        text(&entry.url)
    );
    field("Created", format_timestamp(entry.created));
    field("Route", text(&entry.route));
    field(
        "User",
        match (&report.user, entry.user_id) {
            (Some(user), _) => format!("{} ({})", user.username, user.id),
            (None, Some(id)) => id.to_string(),
            (None, None) => "-".to_string(),
        },
    );
    field("IP", text(&entry.ip));
    field("Referrer", text(&entry.referrer));
    field("Redirect", text(&entry.redirect));
    field("Duration", format_duration(entry.duration));
    field(
        "Memory",
        format!(
            "{} (peak {})",
            format_bytes(entry.memory),
            format_bytes(entry.memory_max)
        ),
    );

    if !report.data.is_empty() {
        println!();
        println!("{}", "Captured data".bold());
        for data in &report.data {
            let tag = data.data_type.map(|t| t.to_string()).unwrap_or_default();
            println!("  {} {}", data.name.cyan(), format!("[{tag}]").dimmed());
            println!("    {}", preview(&data.data));
        }
    }

    if !report.errors.is_empty() {
        println!();
        println!("{}", "Errors".bold().red());
        for error in &report.errors {
            let location = match (&error.file, error.line) {
                (Some(file), Some(line)) => format!(" at {file}:{line}"),
                (Some(file), None) => format!(" at {file}"),
                _ => String::new(),
            };
            println!("  {} {}{}", format!("[{}]", error.code).red(), error.message, location.dimmed());
        }
    }

    if !report.trail.is_empty() {
        println!();
        println!("{}", "Trail".bold());
        for point in &report.trail {
            let target = match &point.model_id {
                Some(model_id) => format!("{}#{}", point.model, model_id),
                None => point.model.clone(),
            };
            let change = match &point.field {
                Some(field) => format!(
                    " {}: {} -> {}",
                    field,
                    point.old_value.as_deref().unwrap_or("null"),
                    point.new_value.as_deref().unwrap_or("null")
                ),
                None => String::new(),
            };
            println!("  {} {}{}", point.action.bold(), target, change);
        }
    }

    if !report.javascript.is_empty() {
        println!();
        println!("{}", "Javascript".bold());
        for event in &report.javascript {
            println!(
                "  {} {} {}",
                format!("[{}]", event.event_type).yellow(),
                event.message,
                event.origin.as_deref().unwrap_or_default().dimmed()
            );
        }
    }
}

/// Single-line JSON, shortened for terminal output
fn preview(value: &JsonValue) -> String {
    const MAX_CHARS: usize = 160;

    let text = value.to_string();
    if text.chars().count() <= MAX_CHARS {
        return text;
    }
    let cut: String = text.chars().take(MAX_CHARS).collect();
    format!("{cut}…")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use reqtrail_core::types::{DataType, NewAuditData, NewAuditTrail};
    use reqtrail_core::{SqliteAuditStore, SqliteStoreOptions};
    use serde_json::json;

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview(&json!({"a": 1})), r#"{"a":1}"#);
        let long = json!("x".repeat(500));
        let shown = preview(&long);
        assert_eq!(shown.chars().count(), 161);
        assert!(shown.ends_with('…'));
    }

    #[tokio::test]
    async fn test_report_loads_children() {
        let store = SqliteAuditStore::open_in_memory(SqliteStoreOptions::default()).unwrap();
        let entry = AuditEntry {
            user_id: Some(0),
            url: Some("/orders".into()),
            ..Default::default()
        };
        let (id, _) = store.insert_entry(&entry).await.unwrap();
        store
            .insert_data(id, &NewAuditData::new("$_GET", json!({}), Some(DataType::Get)))
            .await
            .unwrap();
        store
            .insert_trail(id, &NewAuditTrail::new("INSERT", "Order"))
            .await
            .unwrap();

        let report = EntryReport::load(&store, id).await.unwrap();
        assert_eq!(report.entry.url.as_deref(), Some("/orders"));
        assert!(report.user.is_none());
        assert_eq!(report.data.len(), 1);
        assert_eq!(report.trail.len(), 1);
        assert!(report.errors.is_empty());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["data"][0]["type"], json!("get"));
    }

    #[tokio::test]
    async fn test_report_for_missing_entry() {
        let store = SqliteAuditStore::open_in_memory(SqliteStoreOptions::default()).unwrap();
        assert!(matches!(
            EntryReport::load(&store, 41).await,
            Err(CliError::EntryNotFound(41))
        ));
    }
}
