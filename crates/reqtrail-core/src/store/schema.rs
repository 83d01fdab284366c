//! SQLite schema for the audit tables

use crate::error::Result;
use rusqlite::Connection;

/// Initialize audit database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    // One row per request or command
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS audit_entry (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created TEXT NOT NULL,

            -- Timing (epoch seconds)
            start_time REAL,
            end_time REAL,
            duration REAL,

            -- Who and where
            user_id INTEGER,
            ip TEXT,
            referrer TEXT,
            redirect TEXT,
            url TEXT,
            route TEXT,
            request_method TEXT,

            -- Bytes
            memory INTEGER,
            memory_max INTEGER
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS audit_data (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_id INTEGER NOT NULL,
            type TEXT,
            name TEXT NOT NULL,
            data BLOB NOT NULL,  -- JSON, optionally zlib-compressed
            created TEXT NOT NULL,

            FOREIGN KEY(entry_id) REFERENCES audit_entry(id) ON DELETE CASCADE
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS audit_error (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_id INTEGER NOT NULL,
            created TEXT NOT NULL,
            message TEXT NOT NULL,
            code INTEGER NOT NULL DEFAULT 0,
            file TEXT,
            line INTEGER,
            hash TEXT NOT NULL,
            trace BLOB,

            FOREIGN KEY(entry_id) REFERENCES audit_entry(id) ON DELETE CASCADE
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS audit_trail (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_id INTEGER NOT NULL,
            user_id INTEGER,
            action TEXT NOT NULL,
            model TEXT NOT NULL,
            model_id TEXT,
            field TEXT,
            old_value TEXT,
            new_value TEXT,
            stamp TEXT NOT NULL,

            FOREIGN KEY(entry_id) REFERENCES audit_entry(id) ON DELETE CASCADE
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS audit_javascript (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_id INTEGER NOT NULL,
            created TEXT NOT NULL,
            type TEXT NOT NULL,
            message TEXT NOT NULL,
            origin TEXT,
            data BLOB,

            FOREIGN KEY(entry_id) REFERENCES audit_entry(id) ON DELETE CASCADE
        )
        "#,
        [],
    )?;

    for (index, table) in [
        ("idx_data_entry", "audit_data"),
        ("idx_error_entry", "audit_error"),
        ("idx_trail_entry", "audit_trail"),
        ("idx_javascript_entry", "audit_javascript"),
    ] {
        conn.execute(
            &format!("CREATE INDEX IF NOT EXISTS {index} ON {table}(entry_id)"),
            [],
        )?;
    }

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_error_hash ON audit_error(hash)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_init_schema() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap();

        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "audit_entry",
            "audit_data",
            "audit_error",
            "audit_trail",
            "audit_javascript",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        init_schema(&conn).unwrap();
        assert!(init_schema(&conn).is_ok());
    }

    #[test]
    fn test_children_require_existing_entry() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO audit_data (entry_id, type, name, data, created) VALUES (99, 'get', '$_GET', x'7b7d', 'now')",
            [],
        );
        assert!(result.is_err());
    }
}
