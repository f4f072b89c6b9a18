use crate::config::{ConfigError, ConfigManager, KEYS};
use crate::server::{self, AppState};
use crate::storage::{create_storage, Store, StorageConfig, StorageError};
use crate::sync::{SyncClient, SyncError};
use crate::transfer::{self, ImportDocument, ImportOptions, MergeStrategy, TransferError};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Categorized todo lists behind a password-protected HTTP API.
#[derive(Parser, Debug)]
#[command(name = "rusty_todo_web")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to ~/.config/rusty_todo_web/config.json)
    #[arg(global = true, long)]
    pub config: Option<PathBuf>,

    /// Storage backend, overriding the config file
    #[arg(global = true, long)]
    pub storage: Option<String>,

    /// Data directory or database file, overriding the config file
    #[arg(global = true, long)]
    pub path: Option<String>,

    /// Enable debug logging
    #[arg(global = true, short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Write every category to an export document
    Export {
        /// Leave completed todos out
        #[arg(long)]
        exclude_completed: bool,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Merge an export document into the store
    Import {
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = StrategyArg::Merge)]
        strategy: StrategyArg,
        #[arg(long)]
        overwrite: bool,
        #[arg(long)]
        skip_completed: bool,
    },
    /// Print aggregate statistics
    Stats,
    /// Upload all local categories to a remote server
    Sync { url: String, password: String },
    /// Read or change configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    Get { key: String },
    Set { key: String, value: String },
    Unset { key: String },
    List,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyArg {
    Replace,
    Merge,
    Skip,
}

impl From<StrategyArg> for MergeStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Replace => MergeStrategy::Replace,
            StrategyArg::Merge => MergeStrategy::Merge,
            StrategyArg::Skip => MergeStrategy::Skip,
        }
    }
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{0} categories failed to import")]
    PartialImport(usize),
}

impl Cli {
    fn open_store(&self, manager: &ConfigManager) -> Result<Box<dyn Store>, CliError> {
        let mut config = manager.effective();
        if let Some(ref storage) = self.storage {
            config.storage_type = Some(storage.clone());
            if self.path.is_none() {
                config.storage_path = None;
            }
        }
        if let Some(ref path) = self.path {
            config.storage_path = Some(path.clone());
        }
        let storage_config = StorageConfig::from_config(&config)?;
        Ok(create_storage(&storage_config)?)
    }
}

pub fn run(cli: Cli) -> Result<(), CliError> {
    let mut manager = ConfigManager::new(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { port } => {
            let store: Arc<dyn Store> = Arc::from(cli.open_store(&manager)?);
            let config = manager.effective();
            let port = port.unwrap_or_else(|| config.port());
            let state = AppState::new(Arc::clone(&store), config.password());

            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(async {
                let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
                server::run(listener, state).await
            })?;
            // the store may own its own runtime, so it is dropped out here
            drop(runtime);
            drop(store);
        }
        Command::Export {
            exclude_completed,
            ref output,
        } => {
            let store = cli.open_store(&manager)?;
            let document = transfer::export(&*store, !exclude_completed)?;
            let json = serde_json::to_string_pretty(&document)?;
            match output {
                Some(path) => {
                    std::fs::write(path, json)?;
                    info!(path = %path.display(), "export written");
                }
                None => println!("{}", json),
            }
        }
        Command::Import {
            ref file,
            strategy,
            overwrite,
            skip_completed,
        } => {
            let store = cli.open_store(&manager)?;
            let contents = std::fs::read_to_string(file)?;
            let document: ImportDocument = serde_json::from_str(&contents)?;
            let options = ImportOptions {
                overwrite_existing: overwrite,
                skip_completed,
                merge_strategy: strategy.into(),
            };
            let result = transfer::import(&*store, &document, &options)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.is_clean() {
                return Err(CliError::PartialImport(result.errors.len()));
            }
        }
        Command::Stats => {
            let store = cli.open_store(&manager)?;
            let stats = transfer::stats(&*store)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Sync {
            ref url,
            ref password,
        } => {
            let store = cli.open_store(&manager)?;
            let report = SyncClient::new(url).sync_store(&*store, password)?;
            match report.message {
                Some(message) => println!("Sync successful: {}", message),
                None => println!("No local data found to sync"),
            }
        }
        Command::Config { ref action } => match action {
            ConfigAction::Get { key } => match manager.get(key) {
                Some(value) => println!("{}", value),
                None if KEYS.contains(&key.as_str()) => println!("(not set)"),
                None => return Err(ConfigError::InvalidKey(key.clone()).into()),
            },
            ConfigAction::Set { key, value } => {
                manager.set(key, value)?;
                println!("{} = {}", key, value);
            }
            ConfigAction::Unset { key } => {
                manager.unset(key)?;
                println!("{} unset", key);
            }
            ConfigAction::List => {
                for (key, value, is_default) in manager.list() {
                    let marker = if is_default { " (default)" } else { "" };
                    println!("{} = {}{}", key, value, marker);
                }
            }
        },
    }

    Ok(())
}
