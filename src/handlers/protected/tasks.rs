use axum::{
    extract::{Path, State},
    Extension,
};
use serde_json::{json, Map, Value};

use crate::database::Row;
use crate::engine::parse_id;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::{Entity, Task};
use crate::state::AppState;

/// PATCH /api/v1/task/:id/toggle - flip `completed` on one of the caller's tasks
pub async fn toggle_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    let schema = Task::schema();

    let mut scope = Map::new();
    scope.insert("id".to_string(), json!(id));
    if !user.is_admin() {
        scope.insert("user_id".to_string(), json!(user.user_id));
    }
    let task = state
        .store
        .select_one(&schema, Value::Object(scope))
        .await?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    let completed = task.get("completed").and_then(Value::as_bool).unwrap_or(false);
    let mut changes = Row::new();
    changes.insert("completed".to_string(), json!(!completed));
    if state.store.update(&schema, id, changes).await? == 0 {
        return Err(ApiError::not_found("Task not found"));
    }

    let updated = state
        .store
        .select_by_id(&schema, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;
    Ok(ApiResponse::success(Task::render(updated)?))
}
