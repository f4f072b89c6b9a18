//! Shared-password gate. The password doubles as the bearer token.

use super::{ApiError, AppState};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub message: String,
}

pub fn check_bearer(header: Option<&str>, password: &str) -> Result<(), ApiError> {
    let token = header
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthenticated)?;
    if token != password {
        return Err(ApiError::InvalidToken);
    }
    Ok(())
}

pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    check_bearer(header, state.password())?;
    Ok(next.run(request).await)
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(input) = payload?;
    if input.password != state.password() {
        return Err(ApiError::InvalidCredentials);
    }
    Ok(Json(LoginResponse {
        success: true,
        token: state.password().to_string(),
        message: "Login successful".to_string(),
    }))
}
