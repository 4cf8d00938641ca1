//! User endpoints
//! CRUD over the flat-file users list consumed by the management UI.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::models::User;

use super::{ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub struct UserPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl UserPayload {
    fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::bad_request("Name is required"));
        }
        if self.email.trim().is_empty() {
            return Err(ApiError::bad_request("Email is required"));
        }
        Ok(())
    }
}

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<User>>>, ApiError> {
    let users = state.users.list().map_err(ApiError::internal)?;
    Ok(ApiResponse::ok(users))
}

/// GET /api/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    match state.users.get(&id).map_err(ApiError::internal)? {
        Some(user) => Ok(ApiResponse::ok(user)),
        None => Err(ApiError::not_found("User not found")),
    }
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<UserPayload>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    payload.validate()?;
    let user = state
        .users
        .create(payload.name.trim(), payload.email.trim())
        .map_err(ApiError::internal)?;
    log::info!("created user {}", user.id);
    Ok(ApiResponse::ok(user))
}

/// PUT /api/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UserPayload>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    payload.validate()?;
    match state
        .users
        .update(&id, payload.name.trim(), payload.email.trim())
        .map_err(ApiError::internal)?
    {
        Some(user) => Ok(ApiResponse::ok(user)),
        None => Err(ApiError::not_found("User not found")),
    }
}
