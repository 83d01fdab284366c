//! SQLite-backed audit store

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value as SqlValue};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde_json::Value as JsonValue;
use tracing::debug;

use super::{schema, AuditEntryStore, MAX_LIST_LIMIT};
use crate::codec::{decode_payload, encode_payload};
use crate::error::{Result, TrailError};
use crate::types::{
    AuditData, AuditEntry, AuditError, AuditJavascript, AuditTrail, DataType, EntryField,
    NewAuditData, NewAuditError, NewAuditJavascript, NewAuditTrail, User,
};

const ENTRY_COLUMNS: &str = "id, created, start_time, end_time, duration, user_id, ip, referrer, \
                             redirect, url, route, request_method, memory, memory_max";

/// Options for [`SqliteAuditStore`]
#[derive(Debug, Clone)]
pub struct SqliteStoreOptions {
    /// zlib-compress captured payloads
    pub compress_data: bool,
    /// External table holding `id` and `username` columns
    pub user_table: Option<String>,
}

impl Default for SqliteStoreOptions {
    fn default() -> Self {
        Self {
            compress_data: true,
            user_table: None,
        }
    }
}

/// Audit store on a single SQLite connection
#[derive(Clone)]
pub struct SqliteAuditStore {
    db: Arc<Mutex<Connection>>,
    options: SqliteStoreOptions,
}

impl SqliteAuditStore {
    /// Open (or create) a database file
    pub fn open(db_path: impl AsRef<Path>, options: SqliteStoreOptions) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        debug!(path = %db_path.display(), "Opened audit database");
        Self::from_connection(conn, options)
    }

    /// Private in-memory database
    pub fn open_in_memory(options: SqliteStoreOptions) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, options)
    }

    fn from_connection(conn: Connection, options: SqliteStoreOptions) -> Result<Self> {
        if let Some(table) = &options.user_table {
            if !is_identifier(table) {
                return Err(TrailError::InvalidIdentifier(table.clone()));
            }
        }

        schema::init_schema(&conn)?;

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            options,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|e| TrailError::lock(format!("Failed to acquire database lock: {}", e)))
    }

    fn encode(&self, value: &JsonValue) -> Result<Vec<u8>> {
        encode_payload(value, self.options.compress_data)
    }
}

#[async_trait]
impl AuditEntryStore for SqliteAuditStore {
    async fn insert_entry(&self, entry: &AuditEntry) -> Result<(i64, DateTime<Utc>)> {
        let conn = self.conn()?;
        let created = Utc::now();

        conn.execute(
            r#"
            INSERT INTO audit_entry (
                created, start_time, end_time, duration, user_id, ip, referrer,
                redirect, url, route, request_method, memory, memory_max
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                created.to_rfc3339(),
                entry.start_time,
                entry.end_time,
                entry.duration,
                entry.user_id,
                entry.ip,
                entry.referrer,
                entry.redirect,
                entry.url,
                entry.route,
                entry.request_method,
                entry.memory.map(bytes_to_sql),
                entry.memory_max.map(bytes_to_sql),
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!(entry_id = id, "Inserted audit entry");
        Ok((id, created))
    }

    async fn update_entry(&self, entry: &AuditEntry, fields: &[EntryField]) -> Result<()> {
        let id = entry.id.ok_or(TrailError::UnsavedEntry)?;
        if fields.is_empty() {
            return Ok(());
        }

        let assignments = fields
            .iter()
            .enumerate()
            .map(|(i, field)| format!("{} = ?{}", field.column(), i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE audit_entry SET {} WHERE id = ?{}",
            assignments,
            fields.len() + 1
        );

        let mut values: Vec<SqlValue> = fields.iter().map(|f| field_value(entry, *f)).collect();
        values.push(SqlValue::Integer(id));

        let changed = self.conn()?.execute(&sql, params_from_iter(values))?;
        if changed == 0 {
            return Err(TrailError::EntryNotFound(id));
        }

        debug!(entry_id = id, fields = fields.len(), "Updated audit entry");
        Ok(())
    }

    async fn insert_data(&self, entry_id: i64, data: &NewAuditData) -> Result<AuditData> {
        let payload = self.encode(&data.data)?;
        let created = Utc::now();
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO audit_data (entry_id, type, name, data, created) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry_id,
                data.data_type.map(|t| t.as_str()),
                data.name,
                payload,
                created.to_rfc3339(),
            ],
        )?;

        Ok(AuditData {
            id: conn.last_insert_rowid(),
            entry_id,
            name: data.name.clone(),
            data: data.data.clone(),
            data_type: data.data_type,
            created,
        })
    }

    async fn insert_error(&self, entry_id: i64, error: &NewAuditError) -> Result<AuditError> {
        let trace = error.trace.as_ref().map(|t| self.encode(t)).transpose()?;
        let hash = error.compute_hash();
        let created = Utc::now();
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO audit_error (entry_id, created, message, code, file, line, hash, trace)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                entry_id,
                created.to_rfc3339(),
                error.message,
                error.code,
                error.file,
                error.line,
                hash,
                trace,
            ],
        )?;

        Ok(AuditError {
            id: conn.last_insert_rowid(),
            entry_id,
            created,
            message: error.message.clone(),
            code: error.code,
            file: error.file.clone(),
            line: error.line,
            hash,
            trace: error.trace.clone(),
        })
    }

    async fn insert_trail(&self, entry_id: i64, trail: &NewAuditTrail) -> Result<AuditTrail> {
        let stamp = Utc::now();
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO audit_trail (
                entry_id, user_id, action, model, model_id, field, old_value, new_value, stamp
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                entry_id,
                trail.user_id,
                trail.action,
                trail.model,
                trail.model_id,
                trail.field,
                trail.old_value,
                trail.new_value,
                stamp.to_rfc3339(),
            ],
        )?;

        Ok(AuditTrail {
            id: conn.last_insert_rowid(),
            entry_id,
            user_id: trail.user_id,
            action: trail.action.clone(),
            model: trail.model.clone(),
            model_id: trail.model_id.clone(),
            field: trail.field.clone(),
            old_value: trail.old_value.clone(),
            new_value: trail.new_value.clone(),
            stamp,
        })
    }

    async fn insert_javascript(
        &self,
        entry_id: i64,
        event: &NewAuditJavascript,
    ) -> Result<AuditJavascript> {
        let data = event.data.as_ref().map(|d| self.encode(d)).transpose()?;
        let created = Utc::now();
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO audit_javascript (entry_id, created, type, message, origin, data)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                entry_id,
                created.to_rfc3339(),
                event.event_type,
                event.message,
                event.origin,
                data,
            ],
        )?;

        Ok(AuditJavascript {
            id: conn.last_insert_rowid(),
            entry_id,
            created,
            event_type: event.event_type.clone(),
            message: event.message.clone(),
            origin: event.origin.clone(),
            data: event.data.clone(),
        })
    }

    async fn find_entry(&self, id: i64) -> Result<Option<AuditEntry>> {
        let conn = self.conn()?;
        let entry = conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM audit_entry WHERE id = ?1"),
                [id],
                entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    async fn list_entries(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        let limit = limit.min(MAX_LIST_LIMIT) as i64;
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM audit_entry ORDER BY id DESC LIMIT ?1"
        ))?;
        let entries = stmt
            .query_map([limit], entry_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    async fn find_data(&self, entry_id: i64) -> Result<Vec<AuditData>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, entry_id, name, data, type, created FROM audit_data WHERE entry_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([entry_id], |row| {
                let data_type = row
                    .get::<_, Option<String>>(4)?
                    .map(|tag| {
                        tag.parse::<DataType>().map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e))
                        })
                    })
                    .transpose()?;

                Ok(AuditData {
                    id: row.get(0)?,
                    entry_id: row.get(1)?,
                    name: row.get(2)?,
                    data: payload_column(row, 3)?.unwrap_or(JsonValue::Null),
                    data_type,
                    created: timestamp_column(row, 5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    async fn find_errors(&self, entry_id: i64) -> Result<Vec<AuditError>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, entry_id, created, message, code, file, line, hash, trace
            FROM audit_error WHERE entry_id = ?1 ORDER BY id
            "#,
        )?;
        let rows = stmt
            .query_map([entry_id], |row| {
                Ok(AuditError {
                    id: row.get(0)?,
                    entry_id: row.get(1)?,
                    created: timestamp_column(row, 2)?,
                    message: row.get(3)?,
                    code: row.get(4)?,
                    file: row.get(5)?,
                    line: row.get(6)?,
                    hash: row.get(7)?,
                    trace: payload_column(row, 8)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    async fn find_trail(&self, entry_id: i64) -> Result<Vec<AuditTrail>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, entry_id, user_id, action, model, model_id, field, old_value, new_value, stamp
            FROM audit_trail WHERE entry_id = ?1 ORDER BY id
            "#,
        )?;
        let rows = stmt
            .query_map([entry_id], |row| {
                Ok(AuditTrail {
                    id: row.get(0)?,
                    entry_id: row.get(1)?,
                    user_id: row.get(2)?,
                    action: row.get(3)?,
                    model: row.get(4)?,
                    model_id: row.get(5)?,
                    field: row.get(6)?,
                    old_value: row.get(7)?,
                    new_value: row.get(8)?,
                    stamp: timestamp_column(row, 9)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    async fn find_javascript(&self, entry_id: i64) -> Result<Vec<AuditJavascript>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, entry_id, created, type, message, origin, data
            FROM audit_javascript WHERE entry_id = ?1 ORDER BY id
            "#,
        )?;
        let rows = stmt
            .query_map([entry_id], |row| {
                Ok(AuditJavascript {
                    id: row.get(0)?,
                    entry_id: row.get(1)?,
                    created: timestamp_column(row, 2)?,
                    event_type: row.get(3)?,
                    message: row.get(4)?,
                    origin: row.get(5)?,
                    data: payload_column(row, 6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    async fn find_user(&self, user_id: i64) -> Result<Option<User>> {
        let Some(table) = &self.options.user_table else {
            return Ok(None);
        };
        if user_id == crate::types::ANONYMOUS_USER_ID {
            return Ok(None);
        }

        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT id, username FROM {table} WHERE id = ?1"),
                [user_id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        username: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn bytes_to_sql(bytes: u64) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}

fn field_value(entry: &AuditEntry, field: EntryField) -> SqlValue {
    fn real(v: Option<f64>) -> SqlValue {
        v.map_or(SqlValue::Null, SqlValue::Real)
    }
    fn text(v: &Option<String>) -> SqlValue {
        v.clone().map_or(SqlValue::Null, SqlValue::Text)
    }
    fn int(v: Option<i64>) -> SqlValue {
        v.map_or(SqlValue::Null, SqlValue::Integer)
    }

    match field {
        EntryField::StartTime => real(entry.start_time),
        EntryField::EndTime => real(entry.end_time),
        EntryField::Duration => real(entry.duration),
        EntryField::UserId => int(entry.user_id),
        EntryField::Ip => text(&entry.ip),
        EntryField::Referrer => text(&entry.referrer),
        EntryField::Redirect => text(&entry.redirect),
        EntryField::Url => text(&entry.url),
        EntryField::Route => text(&entry.route),
        EntryField::RequestMethod => text(&entry.request_method),
        EntryField::Memory => int(entry.memory.map(bytes_to_sql)),
        EntryField::MemoryMax => int(entry.memory_max.map(bytes_to_sql)),
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    Ok(AuditEntry {
        id: Some(row.get(0)?),
        created: Some(timestamp_column(row, 1)?),
        start_time: row.get(2)?,
        end_time: row.get(3)?,
        duration: row.get(4)?,
        user_id: row.get(5)?,
        ip: row.get(6)?,
        referrer: row.get(7)?,
        redirect: row.get(8)?,
        url: row.get(9)?,
        route: row.get(10)?,
        request_method: row.get(11)?,
        memory: row.get::<_, Option<i64>>(12)?.map(|m| m.max(0) as u64),
        memory_max: row.get::<_, Option<i64>>(13)?.map(|m| m.max(0) as u64),
    })
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw = row.get::<_, String>(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn payload_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<JsonValue>> {
    row.get::<_, Option<Vec<u8>>>(idx)?
        .map(|bytes| {
            decode_payload(&bytes)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Blob, Box::new(e)))
        })
        .transpose()
}
