//! Pushes a local store to a remote server.
//!
//! One pass, no retries: snapshot every local category, log in with the
//! shared password, then POST the snapshot to `/api/sync/upload`, which
//! replaces the uploaded categories on the remote side.

use crate::server::auth::LoginResponse;
use crate::server::handlers::SyncResponse;
use crate::storage::{Store, StorageError};
use crate::transfer::SyncUpload;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("HTTP transport error: {0}")]
    Transport(#[from] ureq::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Login failed with HTTP {status}: {body}")]
    LoginFailed { status: u16, body: String },
    #[error("Upload failed with HTTP {status}: {body}")]
    UploadFailed { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub categories: Vec<String>,
    /// Server message; `None` when there was nothing to upload.
    pub message: Option<String>,
}

pub struct SyncClient {
    base_url: String,
    agent: ureq::Agent,
}

impl SyncClient {
    pub fn new(base_url: &str) -> Self {
        // 4xx/5xx come back as data so the status can be reported
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post_json(
        &self,
        path: &str,
        token: Option<&str>,
        body: String,
    ) -> Result<(u16, String), SyncError> {
        let mut request = self
            .agent
            .post(&format!("{}{}", self.base_url, path))
            .content_type("application/json");
        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        let mut response = request.send(body.as_bytes())?;
        let status = response.status().as_u16();
        let text = response.body_mut().read_to_string()?;
        Ok((status, text))
    }

    pub fn login(&self, password: &str) -> Result<String, SyncError> {
        let body = serde_json::json!({ "password": password }).to_string();
        let (status, text) = self.post_json("/api/login", None, body)?;
        if status != 200 {
            return Err(SyncError::LoginFailed { status, body: text });
        }
        let login: LoginResponse = serde_json::from_str(&text)?;
        Ok(login.token)
    }

    pub fn upload(&self, token: &str, upload: &SyncUpload) -> Result<String, SyncError> {
        let body = serde_json::to_string(upload)?;
        let (status, text) = self.post_json("/api/sync/upload", Some(token), body)?;
        if status != 200 {
            return Err(SyncError::UploadFailed { status, body: text });
        }
        let response: SyncResponse = serde_json::from_str(&text)?;
        Ok(response.message)
    }

    pub fn sync_store(&self, store: &dyn Store, password: &str) -> Result<SyncReport, SyncError> {
        let data = store.snapshot()?;
        let categories: Vec<String> = data.keys().cloned().collect();
        if categories.is_empty() {
            info!("no local data found to sync");
            return Ok(SyncReport {
                categories,
                message: None,
            });
        }
        info!(count = categories.len(), ?categories, "found categories to sync");

        let token = self.login(password).map_err(|e| {
            warn!(error = %e, "login failed");
            e
        })?;

        info!(url = %self.base_url, "uploading data");
        let message = self.upload(&token, &SyncUpload { data })?;
        info!(%message, "sync successful");

        Ok(SyncReport {
            categories,
            message: Some(message),
        })
    }
}
