//! `reqtrail init` command implementation
//!
//! Creates the audit database and its schema.

use crate::config::open_store;
use crate::error::Result;
use colored::Colorize;
use reqtrail_core::AuditEntryStore;
use std::path::Path;
use tracing::info;

/// Create (or open) the audit database
pub async fn run(database: &Path) -> Result<()> {
    let existed = database.exists();
    let store = open_store(database)?;
    let entries = store.list_entries(1).await?.len();

    info!(path = %database.display(), existed, "Audit database ready");

    if existed {
        println!(
            "{} Audit database already initialized: {}",
            "→".cyan(),
            database.display()
        );
        if entries > 0 {
            println!("  {} Run 'reqtrail list' to see recorded entries", "→".cyan());
        }
    } else {
        println!("{} Created audit database: {}", "✓".green().bold(), database.display());
    }

    Ok(())
}
