//! Database location and store opening for the CLI

use crate::error::{CliError, Result};
use reqtrail_core::{SqliteAuditStore, SqliteStoreOptions};
use std::path::{Path, PathBuf};

// ============================================================================
// CLI Configuration Constants
// ============================================================================

/// Directory under the platform data dir holding the database.
pub const DATA_DIR_NAME: &str = "reqtrail";

/// Database file name.
pub const DATABASE_FILE: &str = "audit.db";

/// Default database path, `<data dir>/reqtrail/audit.db`
pub fn default_database_path() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join(DATA_DIR_NAME).join(DATABASE_FILE))
        .ok_or_else(|| CliError::config("Could not determine data directory"))
}

/// The explicit path if given, otherwise the default
pub fn resolve_database(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_database_path(),
    }
}

/// Open the store, creating the database file when it does not exist
pub fn open_store(path: &Path) -> Result<SqliteAuditStore> {
    Ok(SqliteAuditStore::open(path, store_options())?)
}

/// Open the store only if the database already exists
pub fn open_existing_store(path: &Path) -> Result<SqliteAuditStore> {
    if !path.exists() {
        return Err(CliError::NotInitialized(path.display().to_string()));
    }
    open_store(path)
}

fn store_options() -> SqliteStoreOptions {
    SqliteStoreOptions {
        user_table: std::env::var("REQTRAIL_USER_TABLE")
            .ok()
            .filter(|s| !s.is_empty()),
        ..SqliteStoreOptions::default()
    }
}
