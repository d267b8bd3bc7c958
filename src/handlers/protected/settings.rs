use axum::{
    extract::{Path, State},
    Extension,
};
use serde_json::Value;

use crate::api::JsonBody;
use crate::database::{row_id, Store};
use crate::engine::{parse_id, Record};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::{Entity, Settings};
use crate::services::UserService;
use crate::state::AppState;
use crate::types::Operation;

/// Non-admins may only touch their own settings
async fn authorize(state: &AppState, user: &AuthUser, raw_id: &str) -> Result<i64, ApiError> {
    let user_id = parse_id(raw_id)?;
    if !user.is_admin() && user.user_id != user_id {
        return Err(ApiError::forbidden("Access denied"));
    }
    if UserService::new(state.store.clone()).find_by_id(user_id).await?.is_none() {
        return Err(ApiError::not_found("User not found"));
    }
    Ok(user_id)
}

/// GET /api/v1/users/:id/settings, created with defaults on first access
pub async fn settings_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let user_id = authorize(&state, &user, &id).await?;
    let settings = UserService::new(state.store.clone()).ensure_settings(user_id).await?;
    Ok(ApiResponse::success(Settings::render(settings)?))
}

/// PUT /api/v1/users/:id/settings - partial update of theme and language
pub async fn settings_put(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<Value> {
    let user_id = authorize(&state, &user, &id).await?;
    let current = UserService::new(state.store.clone()).ensure_settings(user_id).await?;
    let settings_id = row_id(&current).ok_or_else(|| ApiError::internal_server_error("Settings row has no id"))?;

    // user_id is the owner field and never bound from the payload
    let record = Record::bind_entity::<Settings>(body, Operation::Update)?;
    let schema = Settings::schema();
    let store: &dyn Store = state.store.as_ref();
    store.update(&schema, settings_id, record.into_values()).await?;

    let updated = store
        .select_by_id(&schema, settings_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Settings not found"))?;
    Ok(ApiResponse::success(Settings::render(updated)?))
}
