//! HTTP API over a [`Store`].
//!
//! Everything under `/api` except `/api/login` requires
//! `Authorization: Bearer <password>`. Store calls run on the blocking pool.

use crate::storage::Store;
use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub mod auth;
mod error;
pub mod handlers;

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn Store>,
    password: Arc<str>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, password: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            password: password.into(),
        }
    }

    pub fn store(&self) -> Arc<dyn Store> {
        Arc::clone(&self.store)
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }
}

pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/categories", get(handlers::list_categories))
        .route(
            "/categories/{category}",
            put(handlers::rename_category).delete(handlers::delete_category),
        )
        .route(
            "/todos/{category}",
            get(handlers::get_todos).post(handlers::save_todos),
        )
        .route("/sync/upload", post(handlers::sync_upload))
        .route("/export", get(handlers::export))
        .route("/export/stats", get(handlers::export_stats))
        .route("/import", post(handlers::import))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    let api = Router::new()
        .route("/login", post(auth::login))
        .merge(protected);

    Router::new()
        .nest("/api", api)
        .route("/health", get(handlers::health))
        .with_state(state)
}

pub async fn run(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, storage = state.backend_name(), "todo server listening");
    }
    axum::serve(listener, app(state)).await
}
