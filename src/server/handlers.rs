use super::{ApiError, AppState};
use crate::models::{ordering, CategoryRecord};
use crate::storage::Store;
use crate::transfer::{self, ExportDocument, ImportDocument, ImportOptions, ImportResult, StoreStats, SyncUpload};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_DISPOSITION;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
pub struct Success {
    pub success: bool,
}

impl Success {
    fn ok() -> Json<Self> {
        Json(Self { success: true })
    }
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    #[serde(rename = "newName")]
    pub new_name: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct ExportQuery {
    #[serde(rename = "includeCompleted")]
    pub include_completed: Option<String>,
}

impl ExportQuery {
    /// Only an explicit `false` leaves completed todos out.
    pub fn include_completed(&self) -> bool {
        self.include_completed.as_deref() != Some("false")
    }
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    #[serde(default)]
    pub data: ImportDocument,
    #[serde(default)]
    pub options: ImportOptions,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncResponse {
    pub success: bool,
    pub message: String,
}

/// Runs a store call on the blocking pool.
async fn with_store<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&dyn Store) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let store = state.store();
    tokio::task::spawn_blocking(move || f(&*store))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
}

pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let names = with_store(&state, |store| Ok(store.list_categories()?)).await?;
    Ok(Json(names))
}

pub async fn get_todos(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<CategoryRecord>, ApiError> {
    let record = with_store(&state, move |store| Ok(store.get_category(&category)?)).await?;
    let todos = ordering::order(&record.todos);
    Ok(Json(CategoryRecord::new(todos, record.next_id)))
}

pub async fn save_todos(
    State(state): State<AppState>,
    Path(category): Path<String>,
    payload: Result<Json<CategoryRecord>, JsonRejection>,
) -> Result<Json<Success>, ApiError> {
    let Json(record) = payload?;
    with_store(&state, move |store| Ok(store.put_category(&category, &record)?)).await?;
    Ok(Success::ok())
}

pub async fn delete_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<Success>, ApiError> {
    with_store(&state, move |store| Ok(store.delete_category(&category)?)).await?;
    Ok(Success::ok())
}

pub async fn rename_category(
    State(state): State<AppState>,
    Path(old_name): Path<String>,
    payload: Result<Json<RenameRequest>, JsonRejection>,
) -> Result<Json<Success>, ApiError> {
    let Json(input) = payload?;
    let new_name = input.new_name;
    with_store(&state, move |store| Ok(store.rename_category(&old_name, &new_name)?)).await?;
    Ok(Success::ok())
}

pub async fn sync_upload(
    State(state): State<AppState>,
    payload: Result<Json<SyncUpload>, JsonRejection>,
) -> Result<Json<SyncResponse>, ApiError> {
    let Json(upload) = payload?;
    let synced = with_store(&state, move |store| Ok(transfer::sync_upload(store, &upload)?)).await?;
    info!(categories = synced, "sync upload applied");
    Ok(Json(SyncResponse {
        success: true,
        message: format!("Synced {} categories to {}", synced, state.backend_name()),
    }))
}

pub async fn export(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let include_completed = query.include_completed();
    let document: ExportDocument =
        with_store(&state, move |store| Ok(transfer::export(store, include_completed)?)).await?;
    let disposition = format!(
        "attachment; filename=\"todos-export-{}.json\"",
        document.export_date.format("%Y-%m-%d")
    );
    Ok(([(CONTENT_DISPOSITION, disposition)], Json(document)))
}

pub async fn export_stats(State(state): State<AppState>) -> Result<Json<StoreStats>, ApiError> {
    let stats = with_store(&state, |store| Ok(transfer::stats(store)?)).await?;
    Ok(Json(stats))
}

pub async fn import(
    State(state): State<AppState>,
    payload: Result<Json<ImportRequest>, JsonRejection>,
) -> Result<Json<ImportResult>, ApiError> {
    let Json(request) = payload?;
    let result = with_store(&state, move |store| {
        Ok(transfer::import(store, &request.data, &request.options)?)
    })
    .await?;
    Ok(Json(result))
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let backend = state.backend_name();
    match with_store(&state, |store| Ok(store.list_categories()?)).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "timestamp": Utc::now(), "storage": backend })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "error", "timestamp": Utc::now(), "error": e.to_string() })),
        ),
    }
}
