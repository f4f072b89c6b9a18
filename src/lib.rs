//! Categorized todo lists with pluggable persistence.
//!
//! - [`storage`]: the `Store` trait and its memory, JSON-directory, SQLite
//!   and (feature `postgres`) PostgreSQL backends
//! - [`transfer`]: versioned export documents, merge-strategy imports, stats
//! - [`server`]: the password-gated HTTP API
//! - [`sync`]: client that pushes a local store to a remote server

pub mod cli;
pub mod config;
pub mod models;
pub mod server;
pub mod storage;
pub mod sync;
pub mod transfer;
