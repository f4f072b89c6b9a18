use crate::models::{CategoryRecord, ValidationError};
use std::collections::BTreeMap;
use thiserror::Error;

#[cfg(test)]
pub(crate) mod test_utils;

pub mod config;
pub mod json;
pub mod memory;
mod migrations;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod sqlite;

pub use config::StorageConfig;
pub use json::JsonStorage;
pub use memory::MemoryStorage;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[cfg(feature = "postgres")]
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),
    #[error("Invalid data: {0}")]
    Validation(#[from] ValidationError),
    #[error("Category with new name already exists: {0}")]
    Conflict(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    Memory,
    Json,
    Sqlite,
    Postgres,
}

impl StorageType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Some(StorageType::Memory),
            "json" => Some(StorageType::Json),
            "sqlite" => Some(StorageType::Sqlite),
            "postgres" | "supabase" => Some(StorageType::Postgres),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StorageType::Memory => "memory",
            StorageType::Json => "json",
            StorageType::Sqlite => "sqlite",
            StorageType::Postgres => "postgres",
        }
    }
}

/// Persistence of `{category -> {todos, nextId}}`.
///
/// Every write is a full replacement of the category record and must be
/// atomic: a failed `put_category` leaves the previous record in place.
/// Reads return the record with `next_id` reconciled against the stored todos.
pub trait Store: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// All category names, sorted.
    fn list_categories(&self) -> Result<Vec<String>, StorageError>;

    fn contains_category(&self, name: &str) -> Result<bool, StorageError>;

    /// The record for `name`, or the empty default when it does not exist.
    fn get_category(&self, name: &str) -> Result<CategoryRecord, StorageError>;

    fn put_category(&self, name: &str, record: &CategoryRecord) -> Result<(), StorageError>;

    /// Removes the category and its todos. Missing categories are not an error.
    fn delete_category(&self, name: &str) -> Result<(), StorageError>;

    /// Fails with `Conflict` when `new_name` exists; succeeds without
    /// changes when `old_name` does not.
    fn rename_category(&self, old_name: &str, new_name: &str) -> Result<(), StorageError>;

    fn replace_all(&self, records: &BTreeMap<String, CategoryRecord>) -> Result<(), StorageError> {
        for (name, record) in records {
            self.put_category(name, record)?;
        }
        Ok(())
    }

    fn snapshot(&self) -> Result<BTreeMap<String, CategoryRecord>, StorageError> {
        let mut all = BTreeMap::new();
        for name in self.list_categories()? {
            let record = self.get_category(&name)?;
            all.insert(name, record);
        }
        Ok(all)
    }
}

pub(crate) fn check_write(name: &str, record: &CategoryRecord) -> Result<(), StorageError> {
    crate::models::validate_category_name(name)?;
    record.validate()?;
    Ok(())
}

pub fn create_storage(config: &StorageConfig) -> Result<Box<dyn Store>, StorageError> {
    match config.storage_type {
        StorageType::Memory => Ok(Box::new(MemoryStorage::new())),
        StorageType::Json => {
            let storage = JsonStorage::new(&config.path)?;
            Ok(Box::new(storage))
        }
        StorageType::Sqlite => {
            let storage = SqliteStorage::new(&config.path)?;
            Ok(Box::new(storage))
        }
        #[cfg(feature = "postgres")]
        StorageType::Postgres => {
            let url = config.database_url.as_deref().ok_or_else(|| {
                StorageError::Storage("database.url is required for postgres storage".to_string())
            })?;
            let storage = PostgresStorage::connect(url)?;
            Ok(Box::new(storage))
        }
        #[cfg(not(feature = "postgres"))]
        StorageType::Postgres => Err(StorageError::Storage(
            "postgres storage requires building with the `postgres` feature".to_string(),
        )),
    }
}
