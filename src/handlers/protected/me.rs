use axum::{extract::State, Extension};
use serde_json::Value;

use crate::api::JsonBody;
use crate::database::Row;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::{Entity, Settings, User};
use crate::services::UserService;
use crate::state::AppState;

async fn with_settings(users: &UserService, row: Row, user_id: i64) -> Result<Value, ApiError> {
    let settings = users.ensure_settings(user_id).await?;
    let mut rendered = User::render(row)?;
    rendered["settings"] = Settings::render(settings)?;
    Ok(rendered)
}

/// GET /api/v1/auth/me - the caller's account with settings attached
pub async fn me_get(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<Value> {
    let users = UserService::new(state.store.clone());
    let row = users
        .find_by_id(user.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(ApiResponse::success(with_settings(&users, row, user.user_id).await?))
}

/// PUT /api/v1/auth/me - change the caller's username, email or password
pub async fn me_put(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<Value> {
    let users = UserService::new(state.store.clone());
    let row = users.update_profile(user.user_id, body).await?;
    Ok(ApiResponse::success(with_settings(&users, row, user.user_id).await?))
}

/// DELETE /api/v1/auth/me - remove the caller's account and everything it owns
pub async fn me_delete(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<Value> {
    UserService::new(state.store.clone()).delete_user(user.user_id).await?;
    Ok(ApiResponse::message("Account deleted successfully"))
}
