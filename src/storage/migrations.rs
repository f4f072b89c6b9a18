//! Schema migrations for SQLite storage
//!
//! The base schema (`INIT_SCHEMA`) is version 1 and matches the layout of the
//! first hosted deployment: a category table and a todo table keyed by
//! `(category_name, todo_id)`. Later columns arrive through `MIGRATIONS`.
//!
//! # Adding a migration
//!
//! Append an entry with the next version number:
//!
//! ```text
//! Migration {
//!     version: 4,
//!     up: "ALTER TABLE todos ADD COLUMN due_date TEXT;",
//! }
//! ```
//!
//! Pending migrations are applied in order inside a single transaction, and
//! `schema_version` is bumped after each one.

use super::StorageError;
use rusqlite::{Connection, Transaction};
use tracing::info;

pub const INIT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS categories (
    name TEXT PRIMARY KEY,
    next_id INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS todos (
    category_name TEXT NOT NULL,
    todo_id INTEGER NOT NULL,
    text TEXT NOT NULL,
    completed BOOLEAN NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    PRIMARY KEY (category_name, todo_id)
);
"#;

/// A forward-only schema change.
#[derive(Debug)]
pub struct Migration {
    pub version: i32,
    pub up: &'static str,
}

/// All migrations in order of application
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 2,
        up: r#"
            ALTER TABLE todos ADD COLUMN urgent BOOLEAN NOT NULL DEFAULT 0;
            ALTER TABLE todos ADD COLUMN position INTEGER;
        "#,
    },
    Migration {
        version: 3,
        up: "CREATE INDEX IF NOT EXISTS idx_todos_category ON todos(category_name);",
    },
];

pub fn latest_version() -> i32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(1)
}

/// Creates the base schema on a fresh database and records it as version 1.
pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(INIT_SCHEMA)
        .map_err(|e| StorageError::Storage(format!("Failed to create schema: {}", e)))?;

    let rows: i64 = conn.query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))?;
    if rows == 0 {
        conn.execute("INSERT INTO schema_version (version) VALUES (1)", [])?;
    }
    Ok(())
}

pub fn get_current_version(conn: &Connection) -> Result<i32, StorageError> {
    let version: i32 = conn
        .query_row("SELECT version FROM schema_version", [], |row| row.get(0))
        .map_err(|e| StorageError::Storage(format!("Failed to get schema version: {}", e)))?;
    Ok(version)
}

pub fn apply_migrations(conn: &mut Connection) -> Result<(), StorageError> {
    let current_version = get_current_version(conn)?;
    if current_version >= latest_version() {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .map_err(|e| StorageError::Storage(format!("Failed to start transaction: {}", e)))?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current_version) {
        apply_migration(&tx, migration)?;
    }

    tx.commit()
        .map_err(|e| StorageError::Storage(format!("Failed to commit transaction: {}", e)))?;

    info!(from = current_version, to = latest_version(), "migrated sqlite schema");
    Ok(())
}

fn apply_migration(tx: &Transaction, migration: &Migration) -> Result<(), StorageError> {
    tx.execute_batch(migration.up).map_err(|e| {
        StorageError::Storage(format!(
            "Failed to apply migration {}: {}",
            migration.version, e
        ))
    })?;

    tx.execute("UPDATE schema_version SET version = ?1", [migration.version])
        .map_err(|e| {
            StorageError::Storage(format!(
                "Failed to update schema version to {}: {}",
                migration.version, e
            ))
        })?;

    Ok(())
}
