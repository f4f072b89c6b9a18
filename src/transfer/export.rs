use super::{
    ExportDocument, ExportMetadata, ExportedCategory, TodoStats, CURRENT_VERSION, EXPORTED_BY,
};
use crate::models::ordering;
use crate::storage::{Store, StorageError};
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::info;

/// Snapshot of every category. With `include_completed = false` completed
/// todos are left out. Per-category `nextId` is recomputed from the exported
/// todos rather than copied from the stored counter.
pub fn export(store: &dyn Store, include_completed: bool) -> Result<ExportDocument, StorageError> {
    let mut categories = BTreeMap::new();
    let mut totals = TodoStats::default();

    for (name, record) in store.snapshot()? {
        let kept: Vec<_> = record
            .todos
            .into_iter()
            .filter(|t| include_completed || !t.completed)
            .collect();
        let todos = ordering::order(&kept);
        let stats = TodoStats::from_todos(&todos);
        totals.add(&stats);

        categories.insert(
            name.clone(),
            ExportedCategory {
                name,
                next_id: ordering::next_id(&todos),
                stats,
                todos,
            },
        );
    }

    info!(
        categories = categories.len(),
        todos = totals.total,
        include_completed,
        "exported todos"
    );

    Ok(ExportDocument {
        version: CURRENT_VERSION.to_string(),
        export_date: Utc::now(),
        metadata: ExportMetadata {
            exported_by: EXPORTED_BY.to_string(),
            include_completed,
            total_categories: categories.len(),
            total_todos: totals.total,
            completed_todos: totals.completed,
            open_todos: totals.open,
            urgent_todos: totals.urgent,
        },
        categories,
    })
}
