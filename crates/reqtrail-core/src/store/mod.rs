//! Storage contract for audit entries and their child records
//!
//! The recorder talks to storage only through [`AuditEntryStore`]. Entry
//! writes go through the lenient `insert_entry` / `update_entry` pair, which
//! never apply field validation: an audit write must not be rejected by rules
//! meant for ordinary records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{
    AuditData, AuditEntry, AuditError, AuditJavascript, AuditTrail, EntryField, NewAuditData,
    NewAuditError, NewAuditJavascript, NewAuditTrail, User,
};

pub mod schema;
mod sqlite;

pub use sqlite::{SqliteAuditStore, SqliteStoreOptions};

/// Default number of entries returned by [`AuditEntryStore::list_entries`]
pub const DEFAULT_LIST_LIMIT: usize = 20;

/// Upper bound for a single listing
pub const MAX_LIST_LIMIT: usize = 1000;

/// Trait for audit persistence (dependency injection)
#[async_trait]
pub trait AuditEntryStore: Send + Sync {
    /// Insert a new entry, returning the generated id and insert timestamp
    async fn insert_entry(&self, entry: &AuditEntry) -> Result<(i64, DateTime<Utc>)>;

    /// Update only the named columns of a saved entry
    async fn update_entry(&self, entry: &AuditEntry, fields: &[EntryField]) -> Result<()>;

    /// Insert one extra-data row for a saved entry
    async fn insert_data(&self, entry_id: i64, data: &NewAuditData) -> Result<AuditData>;

    /// Insert one error row for a saved entry
    async fn insert_error(&self, entry_id: i64, error: &NewAuditError) -> Result<AuditError>;

    /// Insert one trail row for a saved entry
    async fn insert_trail(&self, entry_id: i64, trail: &NewAuditTrail) -> Result<AuditTrail>;

    /// Insert one javascript event row for a saved entry
    async fn insert_javascript(
        &self,
        entry_id: i64,
        event: &NewAuditJavascript,
    ) -> Result<AuditJavascript>;

    async fn find_entry(&self, id: i64) -> Result<Option<AuditEntry>>;

    /// Most recent entries first
    async fn list_entries(&self, limit: usize) -> Result<Vec<AuditEntry>>;

    async fn find_data(&self, entry_id: i64) -> Result<Vec<AuditData>>;

    async fn find_errors(&self, entry_id: i64) -> Result<Vec<AuditError>>;

    async fn find_trail(&self, entry_id: i64) -> Result<Vec<AuditTrail>>;

    async fn find_javascript(&self, entry_id: i64) -> Result<Vec<AuditJavascript>>;

    /// Look up the external user an entry refers to
    async fn find_user(&self, user_id: i64) -> Result<Option<User>>;
}
