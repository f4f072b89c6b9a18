use super::migrations;
use super::{check_write, Store, StorageError};
use crate::models::{CategoryRecord, Todo};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| StorageError::Storage(format!("Failed to open database: {}", e)))?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::Storage(format!("Failed to open database: {}", e)))?;
        Self::with_connection(conn)
    }

    fn with_connection(mut conn: Connection) -> Result<Self, StorageError> {
        migrations::init_schema(&conn)?;
        migrations::apply_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn get_connection(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Storage(format!("Failed to lock connection: {}", e)))
    }

    fn load_todos(conn: &Connection, name: &str) -> Result<Vec<Todo>, StorageError> {
        let mut stmt = conn
            .prepare(
                "SELECT todo_id, text, completed, urgent, position, created_at
                 FROM todos WHERE category_name = ?1 ORDER BY todo_id",
            )
            .map_err(|e| StorageError::Storage(format!("Failed to prepare todos query: {}", e)))?;

        let todo_iter = stmt
            .query_map([name], |row| {
                Ok(Todo {
                    id: row.get(0)?,
                    text: row.get(1)?,
                    completed: row.get(2)?,
                    urgent: row.get(3)?,
                    position: row.get(4)?,
                    created_at: Some(parse_timestamp(&row.get::<_, String>(5)?, 5)?),
                })
            })
            .map_err(|e| StorageError::Storage(format!("Failed to query todos: {}", e)))?;

        let mut todos = Vec::new();
        for todo in todo_iter {
            todos.push(todo.map_err(|e| StorageError::Storage(format!("Failed to read todo: {}", e)))?);
        }
        Ok(todos)
    }

    /// Upserts the category row and swaps its todos. Callers own the transaction.
    fn write_category(conn: &Connection, name: &str, record: &CategoryRecord) -> Result<(), StorageError> {
        let now = Utc::now();
        conn.execute(
            "INSERT INTO categories (name, next_id, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET next_id = excluded.next_id",
            params![name, record.next_id, now.to_rfc3339()],
        )?;
        conn.execute("DELETE FROM todos WHERE category_name = ?1", [name])?;

        let mut insert = conn.prepare(
            "INSERT INTO todos (category_name, todo_id, text, completed, urgent, position, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for todo in &record.todos {
            insert.execute(params![
                name,
                todo.id,
                todo.text,
                todo.completed,
                todo.urgent,
                todo.position,
                todo.created_at.unwrap_or(now).to_rfc3339(),
            ])?;
        }
        Ok(())
    }
}

fn parse_timestamp(value: &str, column: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
        })
}

impl Store for SqliteStorage {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn list_categories(&self) -> Result<Vec<String>, StorageError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare("SELECT name FROM categories ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn contains_category(&self, name: &str) -> Result<bool, StorageError> {
        let conn = self.get_connection()?;
        let found = conn
            .query_row("SELECT 1 FROM categories WHERE name = ?1", [name], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    fn get_category(&self, name: &str) -> Result<CategoryRecord, StorageError> {
        let conn = self.get_connection()?;
        let next_id: Option<u64> = conn
            .query_row("SELECT next_id FROM categories WHERE name = ?1", [name], |row| row.get(0))
            .optional()?;
        let todos = Self::load_todos(&conn, name)?;
        Ok(CategoryRecord::new(todos, next_id.unwrap_or(1)).reconciled())
    }

    fn put_category(&self, name: &str, record: &CategoryRecord) -> Result<(), StorageError> {
        check_write(name, record)?;
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;
        Self::write_category(&tx, name, record)?;
        tx.commit()?;
        debug!(category = name, todos = record.todos.len(), "saved category");
        Ok(())
    }

    fn delete_category(&self, name: &str) -> Result<(), StorageError> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM todos WHERE category_name = ?1", [name])?;
        tx.execute("DELETE FROM categories WHERE name = ?1", [name])?;
        tx.commit()?;
        Ok(())
    }

    fn rename_category(&self, old_name: &str, new_name: &str) -> Result<(), StorageError> {
        crate::models::validate_category_name(new_name)?;
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;

        let exists = tx
            .query_row("SELECT 1 FROM categories WHERE name = ?1", [new_name], |_| Ok(()))
            .optional()?;
        if exists.is_some() {
            return Err(StorageError::Conflict(new_name.to_string()));
        }

        tx.execute("UPDATE categories SET name = ?1 WHERE name = ?2", [new_name, old_name])?;
        tx.execute(
            "UPDATE todos SET category_name = ?1 WHERE category_name = ?2",
            [new_name, old_name],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn replace_all(&self, records: &BTreeMap<String, CategoryRecord>) -> Result<(), StorageError> {
        for (name, record) in records {
            check_write(name, record)?;
        }
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;
        for (name, record) in records {
            Self::write_category(&tx, name, record)?;
        }
        tx.commit()?;
        Ok(())
    }
}
