use super::{ImportDocument, TransferError};
use crate::models::{ordering, validate_category_name, CategoryRecord, Todo};
use crate::storage::Store;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Drop the existing todos of a category before importing it.
    Replace,
    /// Keep existing todos and add the imported ones alongside.
    #[default]
    Merge,
    /// Leave existing categories untouched.
    Skip,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportOptions {
    pub overwrite_existing: bool,
    pub skip_completed: bool,
    pub merge_strategy: MergeStrategy,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ImportFailure {
    pub category: String,
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub categories_processed: usize,
    pub categories_created: usize,
    pub categories_skipped: usize,
    pub todos_imported: usize,
    pub todos_skipped: usize,
    pub errors: Vec<ImportFailure>,
}

impl ImportResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportedCategory {
    #[serde(default)]
    todos: Vec<Todo>,
    #[serde(default)]
    next_id: Option<u64>,
}

#[derive(Debug, Default)]
struct CategoryOutcome {
    created: bool,
    skipped: bool,
    imported: usize,
    skipped_todos: usize,
}

/// Merges `document` into `store`.
///
/// Nothing is written unless the document passes [`ImportDocument::validate`].
/// Categories are then processed in name order, each in its own write; a
/// failure is recorded in [`ImportResult::errors`] and processing moves on.
pub fn import(
    store: &dyn Store,
    document: &ImportDocument,
    options: &ImportOptions,
) -> Result<ImportResult, TransferError> {
    let categories = document.validate()?;
    let mut result = ImportResult::default();

    for (name, raw) in categories {
        match import_category(store, name, raw, options) {
            Ok(outcome) => {
                result.categories_processed += 1;
                if outcome.created {
                    result.categories_created += 1;
                }
                if outcome.skipped {
                    result.categories_skipped += 1;
                }
                result.todos_imported += outcome.imported;
                result.todos_skipped += outcome.skipped_todos;
            }
            Err(e) => {
                warn!(category = %name, error = %e, "category import failed");
                result.errors.push(ImportFailure {
                    category: name.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        processed = result.categories_processed,
        created = result.categories_created,
        imported = result.todos_imported,
        failed = result.errors.len(),
        "import finished"
    );
    Ok(result)
}

fn import_category(
    store: &dyn Store,
    name: &str,
    raw: &serde_json::Value,
    options: &ImportOptions,
) -> Result<CategoryOutcome, TransferError> {
    validate_category_name(name)?;
    let incoming = ImportedCategory::deserialize(raw)?;
    let mut outcome = CategoryOutcome::default();

    let exists = store.contains_category(name)?;
    if exists && options.merge_strategy == MergeStrategy::Skip {
        outcome.skipped = true;
        return Ok(outcome);
    }
    outcome.created = !exists;

    let existing = if exists {
        store.get_category(name)?
    } else {
        CategoryRecord::default()
    };
    let replace = options.merge_strategy == MergeStrategy::Replace || options.overwrite_existing;
    let mut todos = if replace { Vec::new() } else { existing.todos };
    let keep_existing =
        options.merge_strategy == MergeStrategy::Merge && !options.overwrite_existing;

    for todo in incoming.todos {
        todo.validate()?;
        if options.skip_completed && todo.completed {
            outcome.skipped_todos += 1;
            continue;
        }
        match todos.iter_mut().find(|t| t.id == todo.id) {
            Some(_) if keep_existing => outcome.skipped_todos += 1,
            Some(current) => {
                current.text = todo.text;
                current.completed = todo.completed;
                current.urgent = todo.urgent;
                current.position = todo.position;
                outcome.imported += 1;
            }
            None => {
                todos.push(todo);
                outcome.imported += 1;
            }
        }
    }

    let next_id = existing
        .next_id
        .max(incoming.next_id.unwrap_or(1))
        .max(ordering::next_id(&todos));
    store.put_category(name, &CategoryRecord::new(todos, next_id))?;
    Ok(outcome)
}
