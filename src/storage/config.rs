use crate::config::{default_storage_path, Config, ConfigError};
use crate::storage::StorageType;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    pub storage_type: StorageType,
    pub path: PathBuf,
    pub database_url: Option<String>,
}

impl StorageConfig {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let storage_type = config.storage_type()?;

        let path = config
            .storage_path
            .clone()
            .or_else(|| default_storage_path(storage_type))
            .map(|s| PathBuf::from(shellexpand::tilde(&s).to_string()))
            .ok_or_else(|| ConfigError::InvalidConfig("storage.path is not configured".to_string()))?;

        if storage_type == StorageType::Postgres && config.database_url.is_none() {
            return Err(ConfigError::InvalidConfig(
                "Missing DATABASE_URL or SUPABASE_DB_URL for postgres storage".to_string(),
            ));
        }

        Ok(Self {
            storage_type,
            path,
            database_url: config.database_url.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_from_config() {
        let config = Config {
            storage_type: Some("sqlite".to_string()),
            storage_path: Some("/tmp/rtw/todos.db".to_string()),
            ..Default::default()
        };
        let storage = StorageConfig::from_config(&config).unwrap();
        assert_eq!(storage.storage_type, StorageType::Sqlite);
        assert_eq!(storage.path, PathBuf::from("/tmp/rtw/todos.db"));
    }

    #[test]
    fn test_storage_config_expands_tilde() {
        let config = Config {
            storage_path: Some("~/todo-data".to_string()),
            ..Default::default()
        };
        let storage = StorageConfig::from_config(&config).unwrap();
        assert_eq!(storage.storage_type, StorageType::Json);
        assert!(!storage.path.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn test_storage_config_with_invalid_type() {
        let config = Config {
            storage_type: Some("invalid".to_string()),
            storage_path: Some("/tmp/x".to_string()),
            ..Default::default()
        };
        assert!(StorageConfig::from_config(&config).is_err());
    }

    #[test]
    fn test_postgres_needs_url() {
        let mut config = Config {
            storage_type: Some("postgres".to_string()),
            storage_path: Some("/tmp/x".to_string()),
            ..Default::default()
        };
        assert!(StorageConfig::from_config(&config).is_err());

        config.database_url = Some("postgres://localhost/todos".to_string());
        let storage = StorageConfig::from_config(&config).unwrap();
        assert_eq!(storage.database_url.as_deref(), Some("postgres://localhost/todos"));
    }
}
