use super::{check_write, Store, StorageError};
use crate::models::CategoryRecord;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Process-local store; contents are lost on restart.
#[derive(Default)]
pub struct MemoryStorage {
    categories: RwLock<BTreeMap<String, CategoryRecord>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, CategoryRecord>>, StorageError> {
        self.categories
            .read()
            .map_err(|e| StorageError::Storage(format!("Failed to lock categories: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, CategoryRecord>>, StorageError> {
        self.categories
            .write()
            .map_err(|e| StorageError::Storage(format!("Failed to lock categories: {}", e)))
    }
}

impl Store for MemoryStorage {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn list_categories(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.read()?.keys().cloned().collect())
    }

    fn contains_category(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.read()?.contains_key(name))
    }

    fn get_category(&self, name: &str) -> Result<CategoryRecord, StorageError> {
        Ok(self
            .read()?
            .get(name)
            .cloned()
            .map(CategoryRecord::reconciled)
            .unwrap_or_default())
    }

    fn put_category(&self, name: &str, record: &CategoryRecord) -> Result<(), StorageError> {
        check_write(name, record)?;
        self.write()?.insert(name.to_string(), record.clone());
        Ok(())
    }

    fn delete_category(&self, name: &str) -> Result<(), StorageError> {
        self.write()?.remove(name);
        Ok(())
    }

    fn rename_category(&self, old_name: &str, new_name: &str) -> Result<(), StorageError> {
        crate::models::validate_category_name(new_name)?;
        let mut categories = self.write()?;
        if categories.contains_key(new_name) {
            return Err(StorageError::Conflict(new_name.to_string()));
        }
        if let Some(record) = categories.remove(old_name) {
            categories.insert(new_name.to_string(), record);
        }
        Ok(())
    }

    fn replace_all(&self, records: &BTreeMap<String, CategoryRecord>) -> Result<(), StorageError> {
        for (name, record) in records {
            check_write(name, record)?;
        }
        let mut categories = self.write()?;
        for (name, record) in records {
            categories.insert(name.clone(), record.clone());
        }
        Ok(())
    }
}
