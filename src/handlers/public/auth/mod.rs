// Token acquisition endpoints under /api/v1/auth

pub mod login;
pub mod refresh;
pub mod register;

pub use login::login_post;
pub use refresh::refresh_post;
pub use register::register_post;

use serde::Serialize;
use serde_json::Value;

use crate::auth::TokenPair;
use crate::database::Row;
use crate::error::ApiError;
use crate::models::{Entity, User};
use crate::state::AppState;

/// Body returned by register, login and refresh
#[derive(Debug, Serialize)]
pub struct AuthPayload {
    pub token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub user: Value,
}

/// Issue a token pair for a stored user row and render the user
pub(crate) fn issue_for(state: &AppState, row: Row) -> Result<AuthPayload, ApiError> {
    let user = User::from_row(row)?;
    let TokenPair { token, refresh_token, expires_at } =
        state.tokens.issue_pair(user.model.id, &user.email, user.role)?;
    Ok(AuthPayload {
        token,
        refresh_token,
        expires_at,
        user: serde_json::to_value(&user)?,
    })
}
