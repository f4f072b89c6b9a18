use crate::models::{CategoryRecord, Todo};
use crate::storage::{create_storage, Store, StorageConfig, StorageError, StorageType};
use chrono::{TimeZone, Utc};
use std::path::PathBuf;
use tempfile::TempDir;

pub struct TestStorage {
    temp_dir: TempDir,
    storage: Box<dyn Store>,
}

impl TestStorage {
    pub fn new(storage_type: StorageType) -> Self {
        let temp_dir = tempfile::Builder::new()
            .prefix("rtw_test")
            .tempdir()
            .expect("Failed to create temporary directory");

        let path = match storage_type {
            StorageType::Sqlite => temp_dir.path().join("test.db"),
            _ => temp_dir.path().join("data"),
        };
        let config = StorageConfig {
            storage_type,
            path,
            database_url: None,
        };
        let storage = create_storage(&config).expect("Failed to create test storage");

        Self { temp_dir, storage }
    }

    pub fn storage(&self) -> &dyn Store {
        &*self.storage
    }

    pub fn path(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }
}

pub fn todo(id: u64, text: &str, completed: bool) -> Todo {
    Todo {
        id,
        text: text.to_string(),
        completed,
        urgent: false,
        position: None,
        created_at: Some(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + chrono::Duration::minutes(id as i64)),
    }
}

pub fn record(todos: Vec<Todo>, next_id: u64) -> CategoryRecord {
    CategoryRecord::new(todos, next_id)
}

/// Behaviour every backend must share.
pub fn run_store_contract(storage: &dyn Store) {
    assert!(storage.list_categories().unwrap().is_empty());
    assert_eq!(storage.get_category("missing").unwrap(), CategoryRecord::default());
    assert!(!storage.contains_category("work").unwrap());

    let work = record(vec![todo(1, "A", false)], 2);
    storage.put_category("work", &work).unwrap();
    assert!(storage.contains_category("work").unwrap());
    assert_eq!(storage.get_category("work").unwrap(), work);

    // full replacement: todo 1 is gone
    let mut urgent = todo(3, "C", true);
    urgent.urgent = true;
    urgent.position = Some(0);
    let work = record(vec![todo(2, "B", false), urgent], 4);
    storage.put_category("work", &work).unwrap();
    assert_eq!(storage.get_category("work").unwrap(), work);

    let home = record(vec![todo(1, "Dishes", true)], 2);
    storage.put_category("home", &home).unwrap();
    assert_eq!(storage.list_categories().unwrap(), vec!["home", "work"]);

    let err = storage.rename_category("work", "home").unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)));
    assert_eq!(storage.get_category("work").unwrap(), work);
    assert_eq!(storage.get_category("home").unwrap(), home);

    storage.rename_category("nope", "other").unwrap();
    assert_eq!(storage.list_categories().unwrap(), vec!["home", "work"]);

    storage.rename_category("work", "office").unwrap();
    assert_eq!(storage.list_categories().unwrap(), vec!["home", "office"]);
    assert_eq!(storage.get_category("office").unwrap(), work);
    assert_eq!(storage.get_category("work").unwrap(), CategoryRecord::default());

    storage.delete_category("office").unwrap();
    assert_eq!(storage.get_category("office").unwrap(), CategoryRecord::default());
    storage.delete_category("office").unwrap();
    assert_eq!(storage.list_categories().unwrap(), vec!["home"]);

    let err = storage.put_category("../escape", &CategoryRecord::default()).unwrap_err();
    assert!(matches!(err, StorageError::Validation(_)));
    let err = storage
        .put_category("bad", &record(vec![todo(1, " ", false)], 2))
        .unwrap_err();
    assert!(matches!(err, StorageError::Validation(_)));
    assert!(!storage.contains_category("bad").unwrap());

    // names that can never be written read as absent and delete as a no-op
    for name in ["../escape", "a/b", ""] {
        assert!(!storage.contains_category(name).unwrap());
        assert_eq!(storage.get_category(name).unwrap(), CategoryRecord::default());
        storage.delete_category(name).unwrap();
        storage.rename_category(name, "renamed").unwrap();
    }
    assert!(!storage.contains_category("renamed").unwrap());

    // a stale counter is raised to max(id) + 1 on read
    storage.put_category("stale", &record(vec![todo(5, "E", false)], 1)).unwrap();
    assert_eq!(storage.get_category("stale").unwrap().next_id, 6);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_initialization() {
        let test_storage = TestStorage::new(StorageType::Json);
        assert!(test_storage.path().exists());
        assert!(test_storage.storage().list_categories().unwrap().is_empty());
    }
}
