//! Bulk movement of todo data in and out of a [`Store`].
//!
//! Exports are versioned JSON documents covering every category. Imports
//! validate the document up front, then merge it category by category; each
//! category is written with a single `put_category` call, so a failing
//! category is left exactly as it was while the others still go through.

use crate::models::{validate_category_name, CategoryRecord, Todo, ValidationError};
use crate::storage::{Store, StorageError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

mod export;
mod import;

pub use export::export;
pub use import::{import, ImportFailure, ImportOptions, ImportResult, MergeStrategy};

pub const CURRENT_VERSION: &str = "1.0.0";
pub const SUPPORTED_VERSIONS: &[&str] = &[CURRENT_VERSION];
pub const EXPORTED_BY: &str = "rusty_todo_web";

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Invalid import document: missing {0}")]
    MissingField(&'static str),
    #[error("Unsupported export version {found}; supported versions: {supported}")]
    UnsupportedVersion { found: String, supported: String },
    #[error("Invalid import document: {0} must be an object")]
    InvalidField(&'static str),
    #[error("Malformed category data: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TodoStats {
    pub total: usize,
    pub completed: usize,
    pub open: usize,
    pub urgent: usize,
}

impl TodoStats {
    pub fn from_todos(todos: &[Todo]) -> Self {
        let completed = todos.iter().filter(|t| t.completed).count();
        Self {
            total: todos.len(),
            completed,
            open: todos.len() - completed,
            urgent: todos.iter().filter(|t| t.urgent).count(),
        }
    }

    fn add(&mut self, other: &TodoStats) {
        self.total += other.total;
        self.completed += other.completed;
        self.open += other.open;
        self.urgent += other.urgent;
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportedCategory {
    pub name: String,
    pub todos: Vec<Todo>,
    pub stats: TodoStats,
    pub next_id: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub exported_by: String,
    pub include_completed: bool,
    pub total_categories: usize,
    pub total_todos: usize,
    pub completed_todos: usize,
    pub open_todos: usize,
    pub urgent_todos: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: String,
    pub export_date: DateTime<Utc>,
    pub metadata: ExportMetadata,
    pub categories: BTreeMap<String, ExportedCategory>,
}

/// Incoming document as received. Fields stay raw JSON so a missing or
/// mistyped `version` or `categories` is reported as a validation failure,
/// and each category is only parsed when it is processed on its own.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ImportDocument {
    #[serde(default)]
    pub version: Option<serde_json::Value>,
    #[serde(default)]
    pub categories: Option<serde_json::Value>,
}

impl ImportDocument {
    /// Checks everything that must hold before any write happens, and
    /// returns the categories in name order.
    pub fn validate(&self) -> Result<BTreeMap<&str, &serde_json::Value>, TransferError> {
        let version = self
            .version
            .as_ref()
            .filter(|v| !v.is_null())
            .ok_or(TransferError::MissingField("version"))?;
        let categories = self
            .categories
            .as_ref()
            .filter(|c| !c.is_null())
            .ok_or(TransferError::MissingField("categories"))?;
        let supported = version
            .as_str()
            .map_or(false, |v| SUPPORTED_VERSIONS.contains(&v));
        if !supported {
            return Err(TransferError::UnsupportedVersion {
                found: version.as_str().map_or_else(|| version.to_string(), str::to_string),
                supported: SUPPORTED_VERSIONS.join(", "),
            });
        }
        let categories = categories
            .as_object()
            .ok_or(TransferError::InvalidField("categories"))?;
        Ok(categories.iter().map(|(name, raw)| (name.as_str(), raw)).collect())
    }
}

impl TryFrom<&ExportDocument> for ImportDocument {
    type Error = serde_json::Error;

    fn try_from(document: &ExportDocument) -> Result<Self, Self::Error> {
        serde_json::from_value(serde_json::to_value(document)?)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total_categories: usize,
    pub total_todos: usize,
    pub completed_todos: usize,
    pub open_todos: usize,
    pub urgent_todos: usize,
    pub per_category: BTreeMap<String, TodoStats>,
    pub oldest_todo: Option<DateTime<Utc>>,
    pub newest_todo: Option<DateTime<Utc>>,
}

pub fn stats(store: &dyn Store) -> Result<StoreStats, StorageError> {
    let mut totals = TodoStats::default();
    let mut per_category = BTreeMap::new();
    let mut oldest: Option<DateTime<Utc>> = None;
    let mut newest: Option<DateTime<Utc>> = None;

    for (name, record) in store.snapshot()? {
        let category_stats = TodoStats::from_todos(&record.todos);
        totals.add(&category_stats);
        for created in record.todos.iter().filter_map(|t| t.created_at) {
            oldest = Some(oldest.map_or(created, |o| o.min(created)));
            newest = Some(newest.map_or(created, |n| n.max(created)));
        }
        per_category.insert(name, category_stats);
    }

    Ok(StoreStats {
        total_categories: per_category.len(),
        total_todos: totals.total,
        completed_todos: totals.completed,
        open_todos: totals.open,
        urgent_todos: totals.urgent,
        per_category,
        oldest_todo: oldest,
        newest_todo: newest,
    })
}

/// Body of a sync upload: the full local state, category by category.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SyncUpload {
    pub data: BTreeMap<String, CategoryRecord>,
}

/// Replaces every uploaded category wholesale. All records are validated
/// before the first write; returns the number of categories synced.
pub fn sync_upload(store: &dyn Store, upload: &SyncUpload) -> Result<usize, TransferError> {
    for (name, record) in &upload.data {
        validate_category_name(name)?;
        record.validate()?;
    }
    store.replace_all(&upload.data)?;
    Ok(upload.data.len())
}
