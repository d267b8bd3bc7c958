use axum::extract::State;
use serde::Deserialize;
use serde_json::Value;

use super::{issue_for, AuthPayload};
use crate::api::JsonBody;
use crate::auth::{verify_password, AuthError};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::UserService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/v1/auth/login
///
/// Unknown email and wrong password produce the same 401.
pub async fn login_post(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> ApiResult<AuthPayload> {
    let users = UserService::new(state.store.clone());

    let Some(row) = users.find_by_email(&payload.email).await? else {
        tracing::debug!("Login rejected: unknown email");
        return Err(AuthError::InvalidCredentials.into());
    };
    let hash = row.get("password").and_then(Value::as_str).unwrap_or_default();
    if !verify_password(&payload.password, hash)? {
        tracing::debug!("Login rejected: wrong password");
        return Err(AuthError::InvalidCredentials.into());
    }

    Ok(ApiResponse::success(issue_for(&state, row)?))
}
