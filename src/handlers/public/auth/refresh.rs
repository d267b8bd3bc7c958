use axum::extract::State;
use serde::Deserialize;

use super::{issue_for, AuthPayload};
use crate::api::JsonBody;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::UserService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// POST /api/v1/auth/refresh
///
/// Role and email are re-read from the user record, so a refreshed token
/// reflects any change made since the original login.
pub async fn refresh_post(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RefreshRequest>,
) -> ApiResult<AuthPayload> {
    let claims = state.tokens.validate_refresh_token(&payload.refresh_token)?;

    let users = UserService::new(state.store.clone());
    let row = users
        .find_by_id(claims.user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User no longer exists"))?;

    Ok(ApiResponse::success(issue_for(&state, row)?))
}
