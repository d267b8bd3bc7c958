use axum::extract::State;
use serde::Deserialize;

use super::{issue_for, AuthPayload};
use crate::api::JsonBody;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::UserService;
use crate::state::AppState;
use crate::types::Role;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// POST /api/v1/auth/register
///
/// Always creates a `user` role account with default settings; any role in
/// the body is ignored.
pub async fn register_post(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> ApiResult<AuthPayload> {
    let users = UserService::new(state.store.clone());
    let row = users
        .create_user(&payload.username, &payload.email, &payload.password, Role::User)
        .await?;

    tracing::info!(email = %payload.email.trim().to_lowercase(), "Registered new account");
    Ok(ApiResponse::created(issue_for(&state, row)?))
}
