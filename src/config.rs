use crate::storage::{StorageError, StorageType};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_ENV: &str = "RUSTY_TODO_CONFIG";
pub const DEFAULT_PASSWORD: &str = "your-secure-password-here";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

impl From<StorageError> for ConfigError {
    fn from(error: StorageError) -> Self {
        ConfigError::Storage(error.to_string())
    }
}

pub const KEYS: &[&str] = &[
    "storage.type",
    "storage.path",
    "database.url",
    "server.port",
    "server.password",
];

const VALID_STORAGE_TYPES: &[&str] = &["memory", "json", "sqlite", "postgres"];

fn validate_storage_path(path: &str) -> Result<PathBuf, ConfigError> {
    if path.contains('\0') {
        return Err(ConfigError::InvalidConfig(
            "Path contains invalid characters".to_string(),
        ));
    }
    if path.trim().is_empty() {
        return Err(ConfigError::InvalidConfig(
            "Path cannot be empty".to_string(),
        ));
    }

    Ok(PathBuf::from(shellexpand::tilde(path).as_ref()))
}

fn validate_storage_type(value: &str) -> Result<StorageType, ConfigError> {
    StorageType::from_str(value).ok_or_else(|| {
        ConfigError::InvalidConfig(format!(
            "storage.type must be one of: {}",
            VALID_STORAGE_TYPES.join(", ")
        ))
    })
}

fn validate_port(value: &str) -> Result<u16, ConfigError> {
    value.parse().map_err(|_| {
        ConfigError::InvalidConfig("server.port must be an integer between 0 and 65535".to_string())
    })
}

fn validate_password(value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::InvalidConfig(
            "server.password cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Settings as stored in the config file. Unset keys fall back to defaults.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub storage_type: Option<String>,
    #[serde(default)]
    pub storage_path: Option<String>,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Config {
    pub fn with_defaults() -> Self {
        Self {
            storage_type: Some("json".to_string()),
            storage_path: default_storage_path(StorageType::Json),
            database_url: None,
            port: Some(DEFAULT_PORT),
            password: Some(DEFAULT_PASSWORD.to_string()),
        }
    }

    /// Applies the deployment environment variables on top of file settings.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(password) = lookup("APP_PASSWORD").filter(|p| !p.is_empty()) {
            self.password = Some(password);
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.port = Some(port);
        }
        if let Some(url) = lookup("DATABASE_URL").or_else(|| lookup("SUPABASE_DB_URL")) {
            self.database_url = Some(url);
        }
    }

    pub fn storage_type(&self) -> Result<StorageType, ConfigError> {
        self.storage_type
            .as_deref()
            .map(validate_storage_type)
            .unwrap_or(Ok(StorageType::Json))
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn password(&self) -> &str {
        self.password.as_deref().unwrap_or(DEFAULT_PASSWORD)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref storage_type) = self.storage_type {
            validate_storage_type(storage_type)?;
        }
        if let Some(ref path) = self.storage_path {
            validate_storage_path(path)?;
        }
        if let Some(ref password) = self.password {
            validate_password(password)?;
        }
        Ok(())
    }
}

fn app_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("rusty_todo_web"))
}

pub fn default_storage_path(storage_type: StorageType) -> Option<String> {
    let dir = app_config_dir()?;
    let path = match storage_type {
        StorageType::Sqlite => dir.join("todos.db"),
        _ => dir.join("data"),
    };
    Some(path.to_string_lossy().to_string())
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(shellexpand::tilde(&path).as_ref()));
    }
    app_config_dir()
        .map(|dir| dir.join("config.json"))
        .ok_or_else(|| ConfigError::InvalidConfig("Could not determine home directory".to_string()))
}

/// Reads and edits the JSON config file.
pub struct ConfigManager {
    path: PathBuf,
    config: Config,
}

impl ConfigManager {
    pub fn new(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => default_config_path()?,
        };

        let config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            if contents.trim().is_empty() {
                Config::default()
            } else {
                serde_json::from_str(&contents)?
            }
        } else {
            Config::default()
        };
        config.validate()?;

        Ok(Self { path, config })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// File settings merged over defaults, with environment overrides applied.
    pub fn effective(&self) -> Config {
        let defaults = Config::with_defaults();
        let file = self.config.clone();
        let storage_type = file.storage_type.clone().or(defaults.storage_type);
        let storage_path = file.storage_path.clone().or_else(|| {
            storage_type
                .as_deref()
                .and_then(StorageType::from_str)
                .and_then(default_storage_path)
        });
        let mut config = Config {
            storage_type,
            storage_path,
            database_url: file.database_url,
            port: file.port.or(defaults.port),
            password: file.password.or(defaults.password),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.config)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let config = &self.config;
        match key {
            "storage.type" => config.storage_type.clone(),
            "storage.path" => config.storage_path.clone(),
            "database.url" => config.database_url.clone(),
            "server.port" => config.port.map(|v| v.to_string()),
            "server.password" => config.password.clone(),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut config = self.config.clone();

        match key {
            "storage.type" => {
                let storage_type = validate_storage_type(value)?;
                config.storage_type = Some(storage_type.as_str().to_string());
            }
            "storage.path" => {
                let path = validate_storage_path(value)?;
                config.storage_path = Some(path.to_string_lossy().to_string());
            }
            "database.url" => {
                config.database_url = Some(value.to_string());
            }
            "server.port" => {
                config.port = Some(validate_port(value)?);
            }
            "server.password" => {
                validate_password(value)?;
                config.password = Some(value.to_string());
            }
            _ => {
                return Err(ConfigError::InvalidKey(key.to_string()));
            }
        }
        config.validate()?;
        self.config = config;
        self.save()
    }

    pub fn unset(&mut self, key: &str) -> Result<(), ConfigError> {
        match key {
            "storage.type" => self.config.storage_type = None,
            "storage.path" => self.config.storage_path = None,
            "database.url" => self.config.database_url = None,
            "server.port" => self.config.port = None,
            "server.password" => self.config.password = None,
            _ => return Err(ConfigError::InvalidKey(key.to_string())),
        }
        self.save()
    }

    /// `(key, effective value, is_default)` for every known key.
    pub fn list(&self) -> Vec<(String, String, bool)> {
        let effective = self.effective();
        KEYS.iter()
            .map(|key| {
                let value = match *key {
                    "storage.type" => effective.storage_type.clone(),
                    "storage.path" => effective.storage_path.clone(),
                    "database.url" => effective.database_url.clone(),
                    "server.port" => effective.port.map(|v| v.to_string()),
                    "server.password" => effective.password.as_ref().map(|_| "********".to_string()),
                    _ => None,
                };
                (
                    key.to_string(),
                    value.unwrap_or_else(|| "null".to_string()),
                    self.get(key).is_none(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config_manager() -> (ConfigManager, tempfile::TempDir) {
        let temp_dir = tempfile::Builder::new()
            .prefix("rtw_test")
            .tempdir()
            .expect("Failed to create temporary directory");
        let manager = ConfigManager::new(Some(&temp_dir.path().join("config.json")))
            .expect("Failed to create config manager");
        (manager, temp_dir)
    }

    #[test]
    fn test_config_manager() {
        let (mut manager, temp_dir) = create_test_config_manager();

        assert!(manager.set("storage.type", "sqlite").is_ok());
        assert_eq!(manager.get("storage.type"), Some("sqlite".to_string()));

        let storage_path = "~/.config/rusty_todo_web/todos.db";
        assert!(manager.set("storage.path", storage_path).is_ok());
        assert_eq!(
            manager.get("storage.path"),
            Some(shellexpand::tilde(storage_path).to_string())
        );

        assert!(manager.set("server.port", "8080").is_ok());
        assert_eq!(manager.get("server.port"), Some("8080".to_string()));

        assert!(manager.set("server.password", "hunter2").is_ok());
        assert!(manager.unset("server.password").is_ok());
        assert_eq!(manager.get("server.password"), None);

        // persisted to disk
        let reloaded = ConfigManager::new(Some(&temp_dir.path().join("config.json"))).unwrap();
        assert_eq!(reloaded.get("server.port"), Some("8080".to_string()));
        assert_eq!(reloaded.config().storage_type.as_deref(), Some("sqlite"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let (mut manager, _temp_dir) = create_test_config_manager();

        assert!(matches!(
            manager.set("storage.type", "redis"),
            Err(ConfigError::InvalidConfig(_))
        ));
        assert!(matches!(
            manager.set("server.port", "seventy"),
            Err(ConfigError::InvalidConfig(_))
        ));
        assert!(matches!(
            manager.set("server.password", ""),
            Err(ConfigError::InvalidConfig(_))
        ));
        assert!(matches!(
            manager.set("no.such.key", "1"),
            Err(ConfigError::InvalidKey(_))
        ));
        assert_eq!(manager.get("storage.type"), None);
    }

    #[test]
    fn test_config_manager_defaults() {
        let (manager, _temp_dir) = create_test_config_manager();
        let list = manager.list();
        assert_eq!(list.len(), KEYS.len());
        assert!(list.iter().all(|(_, _, is_default)| *is_default));

        let has_port = list
            .iter()
            .any(|(key, value, _)| key == "server.port" && !value.is_empty());
        assert!(has_port, "server.port should be listed");

        let password = list.iter().find(|(key, _, _)| key == "server.password").unwrap();
        assert_eq!(password.1, "********");
    }

    #[test]
    fn test_apply_env_overrides() {
        let mut config = Config::with_defaults();
        config.apply_env(|key| match key {
            "APP_PASSWORD" => Some("from-env".to_string()),
            "PORT" => Some("4100".to_string()),
            "SUPABASE_DB_URL" => Some("postgres://db/todos".to_string()),
            _ => None,
        });
        assert_eq!(config.password(), "from-env");
        assert_eq!(config.port(), 4100);
        assert_eq!(config.database_url.as_deref(), Some("postgres://db/todos"));
    }

    #[test]
    fn test_apply_env_ignores_garbage() {
        let mut config = Config::with_defaults();
        config.apply_env(|key| match key {
            "APP_PASSWORD" => Some(String::new()),
            "PORT" => Some("not-a-port".to_string()),
            _ => None,
        });
        assert_eq!(config.password(), DEFAULT_PASSWORD);
        assert_eq!(config.port(), DEFAULT_PORT);
    }

    #[test]
    fn test_storage_type_defaults_to_json() {
        let config = Config::default();
        assert_eq!(config.storage_type().unwrap(), StorageType::Json);
    }
}
