//! PostgreSQL (Supabase) storage.
//!
//! `Store` is synchronous, so the pool runs on a small runtime owned by this
//! struct. Store methods must therefore be called from blocking threads
//! (`spawn_blocking` in the server), never from inside an async task.

use super::{check_write, Store, StorageError};
use crate::models::{CategoryRecord, Todo};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::collections::BTreeMap;
use std::future::Future;
use tracing::info;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS categories (
        id SERIAL PRIMARY KEY,
        name VARCHAR(255) UNIQUE NOT NULL,
        next_id BIGINT NOT NULL DEFAULT 1,
        created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS todos (
        id SERIAL PRIMARY KEY,
        category_name VARCHAR(255) NOT NULL,
        todo_id BIGINT NOT NULL,
        text TEXT NOT NULL,
        completed BOOLEAN NOT NULL DEFAULT FALSE,
        urgent BOOLEAN NOT NULL DEFAULT FALSE,
        position BIGINT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (category_name, todo_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_todos_category ON todos(category_name)",
];

/// Brings tables created by the earlier Node deployment (no counters, no
/// urgent/position columns, 32-bit ids, naive timestamps) up to the current
/// layout. Every statement is a no-op on an up-to-date database.
const UPGRADE: &[&str] = &[
    "ALTER TABLE categories ADD COLUMN IF NOT EXISTS next_id BIGINT NOT NULL DEFAULT 1",
    "ALTER TABLE todos ADD COLUMN IF NOT EXISTS urgent BOOLEAN NOT NULL DEFAULT FALSE",
    "ALTER TABLE todos ADD COLUMN IF NOT EXISTS position BIGINT",
    "DO $$
     BEGIN
        IF EXISTS (SELECT 1 FROM information_schema.columns
                   WHERE table_schema = current_schema() AND table_name = 'todos'
                     AND column_name = 'todo_id' AND data_type = 'integer') THEN
            ALTER TABLE todos ALTER COLUMN todo_id TYPE BIGINT;
        END IF;
        IF EXISTS (SELECT 1 FROM information_schema.columns
                   WHERE table_schema = current_schema() AND table_name = 'todos'
                     AND column_name = 'created_at'
                     AND data_type = 'timestamp without time zone') THEN
            ALTER TABLE todos ALTER COLUMN created_at TYPE TIMESTAMPTZ
                USING created_at AT TIME ZONE 'UTC';
        END IF;
     END $$",
    "UPDATE todos SET completed = FALSE WHERE completed IS NULL",
    "UPDATE todos SET created_at = CURRENT_TIMESTAMP WHERE created_at IS NULL",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_todos_category_todo_id ON todos(category_name, todo_id)",
    // categories that only ever existed as todo rows
    "INSERT INTO categories (name)
     SELECT DISTINCT category_name FROM todos
     ON CONFLICT (name) DO NOTHING",
];

type TodoRow = (i64, String, bool, bool, Option<i64>, DateTime<Utc>);

pub struct PostgresStorage {
    pool: PgPool,
    runtime: tokio::runtime::Runtime,
}

impl PostgresStorage {
    pub fn connect(database_url: &str) -> Result<Self, StorageError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;
        let pool = runtime.block_on(
            PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url),
        )?;
        runtime.block_on(async {
            for statement in SCHEMA.iter().chain(UPGRADE) {
                sqlx::raw_sql(statement).execute(&pool).await?;
            }
            Ok::<_, sqlx::Error>(())
        })?;
        info!("connected to PostgreSQL");
        Ok(Self { pool, runtime })
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

async fn write_category(
    tx: &mut Transaction<'_, Postgres>,
    name: &str,
    record: &CategoryRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO categories (name, next_id) VALUES ($1, $2)
         ON CONFLICT (name) DO UPDATE SET next_id = EXCLUDED.next_id",
    )
    .bind(name)
    .bind(record.next_id as i64)
    .execute(&mut **tx)
    .await?;

    sqlx::query("DELETE FROM todos WHERE category_name = $1")
        .bind(name)
        .execute(&mut **tx)
        .await?;

    let now = Utc::now();
    for todo in &record.todos {
        sqlx::query(
            "INSERT INTO todos (category_name, todo_id, text, completed, urgent, position, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (category_name, todo_id) DO UPDATE SET
                text = EXCLUDED.text,
                completed = EXCLUDED.completed,
                urgent = EXCLUDED.urgent,
                position = EXCLUDED.position",
        )
        .bind(name)
        .bind(todo.id as i64)
        .bind(&todo.text)
        .bind(todo.completed)
        .bind(todo.urgent)
        .bind(todo.position)
        .bind(todo.created_at.unwrap_or(now))
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

impl Store for PostgresStorage {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    fn list_categories(&self) -> Result<Vec<String>, StorageError> {
        let names = self.block_on(
            sqlx::query_scalar::<_, String>("SELECT name FROM categories ORDER BY name")
                .fetch_all(&self.pool),
        )?;
        Ok(names)
    }

    fn contains_category(&self, name: &str) -> Result<bool, StorageError> {
        let found = self.block_on(
            sqlx::query_scalar::<_, i32>("SELECT 1 FROM categories WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool),
        )?;
        Ok(found.is_some())
    }

    fn get_category(&self, name: &str) -> Result<CategoryRecord, StorageError> {
        let (next_id, rows) = self.block_on(async {
            let next_id = sqlx::query_scalar::<_, i64>("SELECT next_id FROM categories WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
            let rows = sqlx::query_as::<_, TodoRow>(
                "SELECT todo_id, text, completed, urgent, position, created_at
                 FROM todos WHERE category_name = $1 ORDER BY todo_id",
            )
            .bind(name)
            .fetch_all(&self.pool)
            .await?;
            Ok::<_, sqlx::Error>((next_id, rows))
        })?;

        let todos = rows
            .into_iter()
            .map(|(id, text, completed, urgent, position, created_at)| Todo {
                id: id as u64,
                text,
                completed,
                urgent,
                position,
                created_at: Some(created_at),
            })
            .collect();
        Ok(CategoryRecord::new(todos, next_id.unwrap_or(1) as u64).reconciled())
    }

    fn put_category(&self, name: &str, record: &CategoryRecord) -> Result<(), StorageError> {
        check_write(name, record)?;
        self.block_on(async {
            let mut tx = self.pool.begin().await?;
            write_category(&mut tx, name, record).await?;
            tx.commit().await
        })?;
        Ok(())
    }

    fn delete_category(&self, name: &str) -> Result<(), StorageError> {
        self.block_on(async {
            let mut tx = self.pool.begin().await?;
            sqlx::query("DELETE FROM todos WHERE category_name = $1")
                .bind(name)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM categories WHERE name = $1")
                .bind(name)
                .execute(&mut *tx)
                .await?;
            tx.commit().await
        })?;
        Ok(())
    }

    fn rename_category(&self, old_name: &str, new_name: &str) -> Result<(), StorageError> {
        crate::models::validate_category_name(new_name)?;
        self.block_on(async {
            let mut tx = self.pool.begin().await?;
            let exists = sqlx::query_scalar::<_, i32>("SELECT 1 FROM categories WHERE name = $1")
                .bind(new_name)
                .fetch_optional(&mut *tx)
                .await?;
            if exists.is_some() {
                return Err(StorageError::Conflict(new_name.to_string()));
            }
            sqlx::query("UPDATE categories SET name = $1 WHERE name = $2")
                .bind(new_name)
                .bind(old_name)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE todos SET category_name = $1 WHERE category_name = $2")
                .bind(new_name)
                .bind(old_name)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok::<_, StorageError>(())
        })
    }

    fn replace_all(&self, records: &BTreeMap<String, CategoryRecord>) -> Result<(), StorageError> {
        for (name, record) in records {
            check_write(name, record)?;
        }
        self.block_on(async {
            let mut tx = self.pool.begin().await?;
            for (name, record) in records {
                write_category(&mut tx, name, record).await?;
            }
            tx.commit().await
        })?;
        Ok(())
    }
}
