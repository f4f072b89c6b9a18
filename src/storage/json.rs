use super::{check_write, Store, StorageError};
use crate::models::{validate_category_name, CategoryRecord};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One `<category>.json` file per category under a data directory.
pub struct JsonStorage {
    dir: PathBuf,
}

impl JsonStorage {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_category_name(name)?;
        Ok(self.dir.join(format!("{}.json", name)))
    }

    /// Path of an existing file only; names that fail validation can
    /// never have been written, so they read as absent.
    fn existing_path(&self, name: &str) -> Option<PathBuf> {
        self.path_for(name).ok().filter(|path| path.exists())
    }

    fn write_file(&self, path: &Path, record: &CategoryRecord) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(record)?;

        // Write next to the target and rename so readers never see a torn file
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| StorageError::Io(e.error))?;
        Ok(())
    }
}

impl Store for JsonStorage {
    fn backend_name(&self) -> &'static str {
        "json"
    }

    fn list_categories(&self) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn contains_category(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.existing_path(name).is_some())
    }

    fn get_category(&self, name: &str) -> Result<CategoryRecord, StorageError> {
        let Some(path) = self.existing_path(name) else {
            return Ok(CategoryRecord::default());
        };

        let contents = std::fs::read_to_string(&path)?;
        if contents.trim().is_empty() {
            return Ok(CategoryRecord::default());
        }

        let record: CategoryRecord = serde_json::from_str(&contents)?;
        Ok(record.reconciled())
    }

    fn put_category(&self, name: &str, record: &CategoryRecord) -> Result<(), StorageError> {
        check_write(name, record)?;
        let path = self.path_for(name)?;
        self.write_file(&path, record)?;
        debug!(category = name, todos = record.todos.len(), "wrote category file");
        Ok(())
    }

    fn delete_category(&self, name: &str) -> Result<(), StorageError> {
        let Some(path) = self.existing_path(name) else {
            return Ok(());
        };
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn rename_category(&self, old_name: &str, new_name: &str) -> Result<(), StorageError> {
        let new_path = self.path_for(new_name)?;
        if new_path.exists() {
            return Err(StorageError::Conflict(new_name.to_string()));
        }
        let Some(old_path) = self.existing_path(old_name) else {
            return Ok(());
        };
        std::fs::rename(&old_path, &new_path)?;
        Ok(())
    }
}
